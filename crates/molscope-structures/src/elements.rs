//! Element and residue lookup tables.

use glam::Vec3;
use molscope_core::hex_color;

/// Van der Waals radius used for unknown elements.
pub const DEFAULT_VDW_RADIUS: f32 = 2.0;
/// Covalent radius used for unknown elements.
pub const DEFAULT_COVALENT_RADIUS: f32 = 1.6;
/// Color of unknown elements.
pub const DEFAULT_ELEMENT_COLOR: u32 = 0xFF_FF_FF;

struct Element {
    symbol: &'static str,
    vdw: f32,
    covalent: f32,
    color: u32,
}

const ELEMENTS: &[Element] = &[
    Element { symbol: "H", vdw: 1.1, covalent: 0.31, color: 0xFF_FF_FF },
    Element { symbol: "C", vdw: 1.7, covalent: 0.76, color: 0x90_90_90 },
    Element { symbol: "N", vdw: 1.55, covalent: 0.71, color: 0x30_50_F8 },
    Element { symbol: "O", vdw: 1.52, covalent: 0.66, color: 0xFF_0D_0D },
    Element { symbol: "F", vdw: 1.47, covalent: 0.57, color: 0x90_E0_50 },
    Element { symbol: "NA", vdw: 2.27, covalent: 1.66, color: 0xAB_5C_F2 },
    Element { symbol: "MG", vdw: 1.73, covalent: 1.41, color: 0x8A_FF_00 },
    Element { symbol: "P", vdw: 1.8, covalent: 1.07, color: 0xFF_80_00 },
    Element { symbol: "S", vdw: 1.8, covalent: 1.05, color: 0xFF_FF_30 },
    Element { symbol: "CL", vdw: 1.75, covalent: 1.02, color: 0x1F_F0_1F },
    Element { symbol: "K", vdw: 2.75, covalent: 2.03, color: 0x8F_40_D4 },
    Element { symbol: "CA", vdw: 2.31, covalent: 1.76, color: 0x3D_FF_00 },
    Element { symbol: "MN", vdw: 2.05, covalent: 1.39, color: 0x9C_7A_C7 },
    Element { symbol: "FE", vdw: 2.04, covalent: 1.32, color: 0xE0_66_33 },
    Element { symbol: "ZN", vdw: 2.01, covalent: 1.22, color: 0x7D_80_B0 },
];

fn lookup(symbol: &str) -> Option<&'static Element> {
    ELEMENTS
        .iter()
        .find(|e| e.symbol.eq_ignore_ascii_case(symbol.trim()))
}

/// Van der Waals radius in Ångström.
#[must_use]
pub fn vdw_radius(element: &str) -> f32 {
    lookup(element).map_or(DEFAULT_VDW_RADIUS, |e| e.vdw)
}

/// Covalent radius in Ångström.
#[must_use]
pub fn covalent_radius(element: &str) -> f32 {
    lookup(element).map_or(DEFAULT_COVALENT_RADIUS, |e| e.covalent)
}

/// CPK color.
#[must_use]
pub fn element_color(element: &str) -> Vec3 {
    hex_color(lookup(element).map_or(DEFAULT_ELEMENT_COLOR, |e| e.color))
}

/// Guesses the element from a PDB style atom name ("CA" is carbon, "C4'" is carbon).
#[must_use]
pub fn element_from_name(name: &str) -> String {
    name.trim()
        .chars()
        .find(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}

/// Purine or pyrimidine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nucleobase {
    Purine,
    Pyrimidine,
}

impl Nucleobase {
    /// Classifies a residue name; `None` for anything that is not a nucleotide.
    #[must_use]
    pub fn of(resname: &str) -> Option<Self> {
        match resname.trim().to_ascii_uppercase().as_str() {
            "A" | "G" | "DA" | "DG" | "ADE" | "GUA" => Some(Nucleobase::Purine),
            "C" | "U" | "T" | "DC" | "DT" | "DU" | "CYT" | "URA" | "THY" => {
                Some(Nucleobase::Pyrimidine)
            }
            _ => None,
        }
    }

    /// The base nitrogen a rung ends on.
    #[must_use]
    pub fn rung_nitrogen(self) -> &'static str {
        match self {
            Nucleobase::Purine => "N1",
            Nucleobase::Pyrimidine => "N3",
        }
    }
}

/// Nucleotide color by residue name.
#[must_use]
pub fn nucleotide_color(resname: &str) -> Option<Vec3> {
    let hex = match resname.trim().to_ascii_uppercase().trim_start_matches('D') {
        "A" | "ADE" => 0xFF_FF_33,
        "U" | "URA" | "T" | "THY" => 0x33_66_FF,
        "G" | "GUA" => 0xFF_33_33,
        "C" | "CYT" => 0x33_CC_33,
        _ => return None,
    };
    Some(hex_color(hex))
}

/// Blue to red rainbow; `t` is clamped to [0, 1].
#[must_use]
pub fn rainbow(t: f32) -> Vec3 {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    // hue 240 degrees (blue) down to 0 (red) at full saturation and value
    let hue = (1.0 - t) * 4.0;
    let x = 1.0 - (hue % 2.0 - 1.0).abs();
    match hue {
        h if h < 1.0 => Vec3::new(1.0, x, 0.0),
        h if h < 2.0 => Vec3::new(x, 1.0, 0.0),
        h if h < 3.0 => Vec3::new(0.0, 1.0, x),
        _ => Vec3::new(0.0, x, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_elements() {
        assert!((vdw_radius("C") - 1.7).abs() < 1e-6);
        assert!((vdw_radius("mg") - 1.73).abs() < 1e-6);
        assert!((vdw_radius("Xx") - DEFAULT_VDW_RADIUS).abs() < 1e-6);
        assert!((covalent_radius("O") - 0.66).abs() < 1e-6);
        assert_eq!(element_color("Zz"), Vec3::ONE);
    }

    #[test]
    fn test_element_from_name() {
        assert_eq!(element_from_name(" CA "), "C");
        assert_eq!(element_from_name("C4'"), "C");
        assert_eq!(element_from_name("1HB"), "H");
        assert_eq!(element_from_name("'"), "");
    }

    #[test]
    fn test_nucleobase() {
        assert_eq!(Nucleobase::of("G"), Some(Nucleobase::Purine));
        assert_eq!(Nucleobase::of("dt"), Some(Nucleobase::Pyrimidine));
        assert_eq!(Nucleobase::of("ALA"), None);
        assert_eq!(Nucleobase::Pyrimidine.rung_nitrogen(), "N3");
        assert!(nucleotide_color("DG").is_some());
        assert!(nucleotide_color("GLY").is_none());
    }

    #[test]
    fn test_rainbow_ends() {
        assert_eq!(rainbow(0.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(rainbow(1.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(rainbow(f32::NAN), rainbow(0.0));
        let mid = rainbow(0.5);
        assert!(mid.y > 0.99);
    }
}
