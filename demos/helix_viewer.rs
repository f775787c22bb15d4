#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
//! Interactive view of a short RNA duplex.
//!
//! The backbone is drawn as ball+stick, each nucleotide as a base ellipsoid.
//! Left drag orbits, right drag pans, the wheel zooms and a click on an atom,
//! bond or base logs its label.
//!
//! Run with: cargo run --example `helix_viewer`

use std::f32::consts::TAU;

use glam::Vec3;
use molscope::{
    init_logging, run_app, AppOptions, Atom, ColorScheme, MemoryStructure, RepresentationParameters,
};

const STRAND: [&str; 8] = ["G", "C", "A", "U", "G", "G", "C", "A"];
const RISE: f32 = 2.8;
const TWIST: f32 = TAU / 11.0;
const BACKBONE_RADIUS: f32 = 9.0;
const BASE_RADIUS: f32 = 2.0;

fn partner(resname: &str) -> &'static str {
    match resname {
        "G" => "C",
        "C" => "G",
        "A" => "U",
        _ => "A",
    }
}

/// Appends one strand; `phase` rotates it half a turn for the complementary strand.
fn add_strand(s: &mut MemoryStructure, chain: &str, bases: &[&str], phase: f32) {
    let mut previous_sugar = None;
    for (i, resname) in bases.iter().enumerate() {
        let resno = i as i32 + 1;
        let step = if phase == 0.0 { i } else { bases.len() - 1 - i };
        let angle = step as f32 * TWIST + phase;
        let radial = Vec3::new(angle.cos(), angle.sin(), 0.0);
        let height = Vec3::Z * step as f32 * RISE;

        let p = s.add_atom(Atom::new("P", resname, resno, chain, radial * BACKBONE_RADIUS + height));
        let sugar = s.add_atom(Atom::new(
            "C4'",
            resname,
            resno,
            chain,
            radial * (BACKBONE_RADIUS - 2.0) + height + Vec3::Z * 0.8,
        ));
        let nitrogen = if matches!(*resname, "A" | "G") { "N1" } else { "N3" };
        let base = s.add_atom(Atom::new(
            nitrogen,
            resname,
            resno,
            chain,
            radial * BASE_RADIUS + height + Vec3::Z * 0.8,
        ));

        let bonds = [(p, sugar), (sugar, base)];
        for (a, b) in bonds {
            if let Err(e) = s.add_bond(a, b, 1) {
                log::warn!("skipping bond: {e}");
            }
        }
        if let Some(prev) = previous_sugar {
            if let Err(e) = s.add_bond(prev, p, 1) {
                log::warn!("skipping backbone link: {e}");
            }
        }
        previous_sugar = Some(sugar);
    }
}

fn duplex() -> MemoryStructure {
    let mut s = MemoryStructure::new("duplex");
    add_strand(&mut s, "A", &STRAND, 0.0);
    let complement: Vec<&str> = STRAND.iter().rev().map(|r| partner(r)).collect();
    add_strand(&mut s, "B", &complement, TAU / 2.0);
    s
}

fn main() {
    init_logging();

    let options = AppOptions {
        title: "molscope - RNA duplex".to_string(),
        ..AppOptions::default()
    };
    let result = run_app(options, |stage| {
        let id = stage.add_structure(duplex());
        let backbone = RepresentationParameters {
            color: Some(ColorScheme::ResidueIndex),
            aspect_ratio: Some(1.5),
            ..RepresentationParameters::default()
        };
        stage.add_representation(id, "ball+stick", ".P or .C4'", &backbone)?;
        let bases = RepresentationParameters {
            color: Some(ColorScheme::ResidueName),
            ..RepresentationParameters::default()
        };
        stage.add_representation(id, "base", "", &bases)?;
        log::info!("loaded {} atoms", stage.component(id).map_or(0, |c| c.structure().atoms().len()));
        Ok(())
    });
    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}
