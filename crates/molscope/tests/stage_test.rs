//! Stage integration tests: representations, updates and picking back to atoms.

use molscope::*;

fn stage() -> Stage<SoftwareBackend> {
    software_stage(64, 64, ViewerParameters::default())
}

fn ethanol() -> MemoryStructure {
    let mut s = MemoryStructure::new("ethanol");
    let c1 = s.add_atom(Atom::new("C1", "EOH", 1, "A", Vec3::new(-1.2, 0.0, 0.0)));
    let c2 = s.add_atom(Atom::new("C2", "EOH", 1, "A", Vec3::new(0.3, 0.0, 0.0)));
    let o = s.add_atom(Atom::new("O", "EOH", 1, "A", Vec3::new(0.9, 1.2, 0.0)));
    let h = s.add_atom(Atom::new("HO", "EOH", 1, "A", Vec3::new(1.8, 1.2, 0.0)));
    s.add_bond(c1, c2, 1).unwrap();
    s.add_bond(c2, o, 2).unwrap();
    s.add_bond(o, h, 1).unwrap();
    s
}

/// A cytidine whose rung runs through the origin along +Y.
fn cytidine() -> MemoryStructure {
    let mut s = MemoryStructure::new("cytidine");
    s.add_atom(Atom::new("C4'", "C", 1, "A", Vec3::new(0.0, -4.0, 0.0)));
    let n3 = s.add_atom(Atom::new("N3", "C", 1, "A", Vec3::new(0.0, 4.0, 0.0)));
    let c2 = s.add_atom(Atom::new("C2", "C", 1, "A", Vec3::new(1.0, 5.0, 0.0)));
    s.add_bond(n3, c2, 1).unwrap();
    s
}

fn buffer_ids(stage: &Stage<SoftwareBackend>, repr: ReprId) -> Vec<u64> {
    stage
        .representation(repr)
        .unwrap()
        .buffers()
        .iter()
        .map(|b| b.borrow().id())
        .collect()
}

#[test]
fn test_pick_atom() {
    let mut stage = stage();
    let mut s = MemoryStructure::new("ion");
    s.add_atom(Atom::new("ZN", "ZN", 7, "B", Vec3::new(5.0, 5.0, 5.0)).with_element("ZN"));
    let id = stage.add_structure(s);
    let repr = stage
        .add_representation(id, "spacefill", "", &RepresentationParameters::default())
        .unwrap();
    stage.auto_view();

    let picked = stage.pick(32.0, 32.0).unwrap().unwrap();
    match &picked {
        PickedPrimitive::Atom { owner, atom, position } => {
            assert_eq!(*owner, id);
            assert_eq!(atom.name, "ZN");
            assert_eq!(atom.resno, 7);
            assert_eq!(*position, Vec3::new(5.0, 5.0, 5.0));
        }
        other => panic!("expected an atom, got {other:?}"),
    }
    assert_eq!(picked.label(), "[ZN]7:B.ZN");

    let (highlighted, slots) = stage.viewer().highlight().unwrap();
    assert_eq!(highlighted, buffer_ids(&stage, repr)[0]);
    assert_eq!(slots, &[0]);

    assert!(stage.pick(0.0, 0.0).unwrap().is_none());
    assert!(stage.viewer().highlight().is_none());
    assert!(stage.controls().last().is_none());
}

#[test]
fn test_pick_bond() {
    let mut stage = stage();
    let mut s = MemoryStructure::new("rod");
    let a = s.add_atom(Atom::new("C1", "ROD", 1, "A", Vec3::new(-2.0, 0.0, 0.0)));
    let b = s.add_atom(Atom::new("C2", "ROD", 1, "A", Vec3::new(2.0, 0.0, 0.0)));
    s.add_bond(a, b, 1).unwrap();
    let id = stage.add_structure(s);
    let params = RepresentationParameters {
        cylinder_only: Some(true),
        radius_type: Some(RadiusType::Size(1.5)),
        ..RepresentationParameters::default()
    };
    stage.add_representation(id, "ball+stick", "", &params).unwrap();
    stage.auto_view();

    let picked = stage.pick(32.0, 32.0).unwrap().unwrap();
    let PickedPrimitive::Bond { bond, atoms, position, .. } = &picked else {
        panic!("expected a bond, got {picked:?}");
    };
    assert_eq!(*bond, 0);
    assert_eq!(atoms[0].name, "C1");
    assert_eq!(atoms[1].name, "C2");
    assert_eq!(*position, Vec3::ZERO);
}

#[test]
fn test_pick_base() {
    let mut stage = stage();
    let id = stage.add_structure(cytidine());
    stage
        .add_representation(id, "base", "", &RepresentationParameters::default())
        .unwrap();
    stage.auto_view();

    let picked = stage.pick(32.0, 32.0).unwrap().unwrap();
    let PickedPrimitive::Ellipsoid { bond, base, .. } = &picked else {
        panic!("expected an ellipsoid, got {picked:?}");
    };
    // one real bond, so the rung is row 1
    assert_eq!(*bond, 1);
    assert_eq!(base.as_ref().unwrap().resname, "C");
    assert_eq!(picked.label(), "1: C");
}

#[test]
fn test_color_update_keeps_buffers() {
    let mut stage = stage();
    let id = stage.add_structure(ethanol());
    let repr = stage
        .add_representation(id, "ball+stick", "", &RepresentationParameters::default())
        .unwrap();
    let ids = buffer_ids(&stage, repr);
    let bounds = stage.viewer().bounding_box();

    let rebuild = stage
        .set_parameters(
            repr,
            &RepresentationParameters {
                color: Some(ColorScheme::Uniform(Vec3::new(0.0, 1.0, 0.0))),
                ..RepresentationParameters::default()
            },
        )
        .unwrap();
    assert_eq!(rebuild, Rebuild::Update(DataFields::COLOR));
    assert_eq!(buffer_ids(&stage, repr), ids);
    assert_eq!(stage.viewer().bounding_box(), bounds);
    let bound = stage.representation(repr).unwrap();
    let spheres = bound.buffers()[1].borrow();
    assert!(spheres.data().color.iter().all(|c| *c == Vec3::new(0.0, 1.0, 0.0)));
}

#[test]
fn test_impostor_toggle_rebuilds() {
    let mut stage = stage();
    let id = stage.add_structure(ethanol());
    let repr = stage
        .add_representation(id, "spacefill", "", &RepresentationParameters::default())
        .unwrap();
    let old = stage.representation(repr).unwrap().buffers()[0].clone();
    assert!(old.borrow().mode().is_impostor());

    let rebuild = stage
        .set_parameters(
            repr,
            &RepresentationParameters {
                disable_impostor: Some(true),
                ..RepresentationParameters::default()
            },
        )
        .unwrap();
    assert_eq!(rebuild, Rebuild::Full);
    assert!(old.borrow().is_disposed());
    let new = stage.representation(repr).unwrap().buffers()[0].clone();
    assert!(matches!(new.borrow().mode(), BufferMode::Geometry { detail: 2, .. }));
    assert_eq!(stage.viewer().scene().buffer_count(), 1);
}

#[test]
fn test_multiple_bonds_rebuild() {
    let mut stage = stage();
    let id = stage.add_structure(ethanol());
    let repr = stage
        .add_representation(id, "ball+stick", "", &RepresentationParameters::default())
        .unwrap();
    let cylinders = |stage: &Stage<SoftwareBackend>| {
        stage.representation(repr).unwrap().buffers()[0].borrow().count()
    };
    assert_eq!(cylinders(&stage), 3);

    stage
        .set_parameters(
            repr,
            &RepresentationParameters {
                multiple_bond: Some(MultipleBond::Symmetric),
                ..RepresentationParameters::default()
            },
        )
        .unwrap();
    // the C=O double bond becomes two cylinders
    assert_eq!(cylinders(&stage), 4);
}

#[test]
fn test_selection_rebuilds() {
    let mut stage = stage();
    let id = stage.add_structure(ethanol());
    let repr = stage
        .add_representation(id, "spacefill", "", &RepresentationParameters::default())
        .unwrap();
    let ids = buffer_ids(&stage, repr);

    stage.set_selection(repr, "_C").unwrap();
    let bound = stage.representation(repr).unwrap();
    assert_eq!(bound.selection().string(), "_C");
    assert_eq!(bound.buffers()[0].borrow().count(), 2);
    assert_ne!(buffer_ids(&stage, repr), ids);

    let err = stage.set_selection(repr, "(_C").unwrap_err();
    assert!(matches!(err, MolscopeError::InvalidSelection { .. }));
    assert_eq!(stage.viewer().scene().buffer_count(), 1);
}

#[test]
fn test_positions_follow_atoms() {
    let mut stage = stage();
    let id = stage.add_structure(ethanol());
    stage
        .add_representation(id, "ball+stick", "", &RepresentationParameters::default())
        .unwrap();
    stage
        .add_representation(id, "spacefill", "not _H", &RepresentationParameters::default())
        .unwrap();
    let before = stage.viewer().bounding_box();

    let shift = Vec3::new(0.0, 0.0, 10.0);
    let moved: Vec<Vec3> = stage
        .component(id)
        .unwrap()
        .structure()
        .atoms()
        .iter()
        .map(|a| a.position + shift)
        .collect();
    stage.set_positions(id, &moved).unwrap();

    let after = stage.viewer().bounding_box();
    assert!((after.center() - before.center() - shift).length() < 1e-4);
    assert_eq!(stage.viewer().scene().buffer_count(), 3);

    let err = stage.set_positions(id, &moved[..2]).unwrap_err();
    assert!(matches!(err, MolscopeError::SizeMismatch { .. }));
}

#[test]
fn test_snapshot_shows_structure() {
    let mut stage = stage();
    let id = stage.add_structure(ethanol());
    stage
        .add_representation(id, "spacefill", "", &RepresentationParameters::default())
        .unwrap();
    stage.auto_view();
    let pixels = render_to_rgba(&mut stage, &ImageParams::default()).unwrap();
    assert_eq!(pixels.len(), 64 * 64 * 4);
    let first = &pixels[..4];
    assert!(pixels.chunks(4).any(|px| px != first));
}

mod pick_anywhere {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn picks_resolve_to_ethanol(x in 0.0f32..64.0, y in 0.0f32..64.0) {
            let mut stage = stage();
            let id = stage.add_structure(ethanol());
            stage
                .add_representation(id, "ball+stick", "", &RepresentationParameters::default())
                .unwrap();
            stage.auto_view();

            match stage.pick(x, y).unwrap() {
                None => prop_assert!(stage.viewer().highlight().is_none()),
                Some(PickedPrimitive::Atom { owner, atom, .. }) => {
                    prop_assert_eq!(owner, id);
                    prop_assert_eq!(atom.resname.as_str(), "EOH");
                    prop_assert!(stage.viewer().highlight().is_some());
                }
                Some(PickedPrimitive::Bond { owner, bond, .. }) => {
                    prop_assert_eq!(owner, id);
                    prop_assert!(bond < 3);
                }
                Some(other) => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
