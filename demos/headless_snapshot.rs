//! Renders a small molecule to a PNG without opening a window.
//!
//! Uses the wgpu backend when an adapter is available and the CPU backend
//! otherwise. Optional viewer parameters are read from the JSON file named by
//! the first argument.
//!
//! Run with: cargo run --example `headless_snapshot` -- [params.json]

use glam::Vec3;
use molscope::{
    gpu_stage, init_logging, load_parameters, render_to_file, software_stage, Atom, ImageParams,
    MemoryStructure, MultipleBond, RenderBackend, RepresentationParameters, Result, Stage,
    ViewerParameters,
};

fn formaldehyde() -> MemoryStructure {
    let mut s = MemoryStructure::new("formaldehyde");
    let c = s.add_atom(Atom::new("C", "FOR", 1, "A", Vec3::ZERO));
    let o = s.add_atom(Atom::new("O", "FOR", 1, "A", Vec3::new(0.0, 1.21, 0.0)));
    let h1 = s.add_atom(Atom::new("H1", "FOR", 1, "A", Vec3::new(0.94, -0.54, 0.0)));
    let h2 = s.add_atom(Atom::new("H2", "FOR", 1, "A", Vec3::new(-0.94, -0.54, 0.0)));
    s.add_bond(c, o, 2).ok();
    s.add_bond(c, h1, 1).ok();
    s.add_bond(c, h2, 1).ok();
    s
}

fn snapshot<B: RenderBackend>(stage: &mut Stage<B>, path: &str) -> Result<()> {
    let id = stage.add_structure(formaldehyde());
    let params = RepresentationParameters {
        multiple_bond: Some(MultipleBond::Symmetric),
        ..RepresentationParameters::default()
    };
    stage.add_representation(id, "ball+stick", "", &params)?;
    stage.auto_view();
    stage.viewer_mut().camera_mut().orbit(0.4, 0.2);
    render_to_file(
        stage,
        path,
        &ImageParams {
            sample_level: Some(2),
            trim: true,
            ..ImageParams::default()
        },
    )
}

fn main() -> Result<()> {
    init_logging();

    let params = match std::env::args().nth(1) {
        Some(path) => load_parameters(path)?,
        None => ViewerParameters::default(),
    };
    match gpu_stage(800, 600, params.clone()) {
        Ok(mut stage) => snapshot(&mut stage, "formaldehyde.png"),
        Err(e) => {
            log::warn!("falling back to the software backend: {e}");
            snapshot(&mut software_stage(800, 600, params), "formaldehyde.png")
        }
    }
}
