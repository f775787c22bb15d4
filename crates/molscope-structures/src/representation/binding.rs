//! Ties one representation of one structure to a viewer.

use glam::Mat4;
use molscope_core::{DataFields, Result, Selection, StructureView};
use molscope_render::{BufferHandle, RenderBackend, Viewer};

use super::{Rebuild, Representation, RepresentationData, RepresentationParameters};
use crate::structure::MemoryStructure;

/// A representation bound to a selection and, once built, to viewer buffers.
///
/// The binding owns the buffers: it attaches them on [`build`](Self::build),
/// updates them in place on [`update`](Self::update) and detaches and disposes
/// them on rebuild or [`dispose`](Self::dispose).
pub struct StructureRepresentation {
    repr: Box<dyn Representation>,
    selection: Selection,
    /// Selection version the current buffers were built for.
    built_version: Option<u64>,
    data: Option<RepresentationData>,
    instances: Option<Vec<Mat4>>,
}

impl StructureRepresentation {
    pub fn new(repr: Box<dyn Representation>, selection: Selection) -> Self {
        Self {
            repr,
            selection,
            built_version: None,
            data: None,
            instances: None,
        }
    }

    /// Draws every buffer once per matrix in `instances`.
    #[must_use]
    pub fn with_instances(mut self, instances: Vec<Mat4>) -> Self {
        self.instances = Some(instances);
        self
    }

    /// The wrapped representation.
    pub fn representation(&self) -> &dyn Representation {
        self.repr.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Buffers currently built, empty before the first build.
    pub fn buffers(&self) -> &[BufferHandle] {
        self.data.as_ref().map_or(&[], |d| d.buffers.as_slice())
    }

    /// Checks if the buffers are stale against the selection.
    pub fn needs_build(&self) -> bool {
        self.built_version != Some(self.selection.version())
    }

    /// Builds fresh buffers and swaps them into the viewer.
    ///
    /// On error the previous buffers stay attached.
    pub fn build<B: RenderBackend>(
        &mut self,
        structure: &MemoryStructure,
        viewer: &mut Viewer<B>,
    ) -> Result<()> {
        let view = structure.view(&self.selection)?;
        let data = self.repr.create_data(&view)?;
        self.dispose(viewer);
        for buffer in &data.buffers {
            viewer.add(buffer, self.instances.as_deref())?;
        }
        log::debug!(
            "built {} of '{}' into {} buffers",
            self.repr.kind(),
            structure.name(),
            data.buffers.len()
        );
        self.data = Some(data);
        self.built_version = Some(self.selection.version());
        Ok(())
    }

    /// Recomputes `what` in place, or builds when nothing usable is there.
    pub fn update<B: RenderBackend>(
        &mut self,
        what: DataFields,
        structure: &MemoryStructure,
        viewer: &mut Viewer<B>,
    ) -> Result<()> {
        if self.needs_build() {
            return self.build(structure, viewer);
        }
        let Some(data) = &self.data else {
            return self.build(structure, viewer);
        };
        let view = structure.view(&self.selection)?;
        self.repr.update_data(what, &view, data)?;
        if what.position || what.radius {
            viewer.update_bounding_box(None, None);
        }
        viewer.request_render();
        Ok(())
    }

    /// Applies a parameter change and brings the buffers up to date.
    pub fn set_parameters<B: RenderBackend>(
        &mut self,
        params: &RepresentationParameters,
        structure: &MemoryStructure,
        viewer: &mut Viewer<B>,
    ) -> Result<Rebuild> {
        let rebuild = self.repr.set_parameters(params);
        match rebuild {
            Rebuild::Nothing => {}
            Rebuild::Update(what) => self.update(what, structure, viewer)?,
            Rebuild::Full => self.build(structure, viewer)?,
        }
        Ok(rebuild)
    }

    /// Changes the selection and rebuilds if it differs.
    pub fn set_selection<B: RenderBackend>(
        &mut self,
        string: &str,
        structure: &MemoryStructure,
        viewer: &mut Viewer<B>,
    ) -> Result<()> {
        if !self.selection.set_string(string) {
            return Ok(());
        }
        self.build(structure, viewer)
    }

    /// Detaches and disposes the buffers.
    pub fn dispose<B: RenderBackend>(&mut self, viewer: &mut Viewer<B>) {
        let Some(data) = self.data.take() else {
            return;
        };
        for buffer in &data.buffers {
            let id = buffer.borrow().id();
            if viewer.scene().contains(id) {
                // attached above, so removal cannot fail
                let _ = viewer.remove(buffer);
            }
            buffer.borrow_mut().dispose();
        }
        self.built_version = None;
    }
}

impl std::fmt::Debug for StructureRepresentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructureRepresentation")
            .field("kind", &self.repr.kind())
            .field("selection", &self.selection)
            .field("buffers", &self.buffers().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::representation::RepresentationRegistry;
    use crate::structure::Atom;
    use glam::Vec3;
    use molscope_core::{ColorScheme, MolscopeError, ViewerParameters};
    use molscope_render::SoftwareBackend;

    fn viewer() -> Viewer<SoftwareBackend> {
        Viewer::new(SoftwareBackend::new(32, 32), ViewerParameters::default())
    }

    fn chain() -> MemoryStructure {
        let mut s = MemoryStructure::new("chain");
        for i in 0..4 {
            let x = i as f32 * 1.5;
            s.add_atom(Atom::new("CA", "ALA", i + 1, "A", Vec3::new(x, 0.0, 0.0)));
        }
        for i in 0..3 {
            s.add_bond(i, i + 1, 1).unwrap();
        }
        s
    }

    fn bound(name: &str, selection: &str) -> StructureRepresentation {
        let registry = RepresentationRegistry::with_defaults();
        let repr = registry
            .create(name, 1, &RepresentationParameters::default())
            .unwrap();
        StructureRepresentation::new(repr, Selection::new(selection))
    }

    #[test]
    fn test_build_attaches_buffers() {
        let s = chain();
        let mut viewer = viewer();
        let mut repr = bound("ball+stick", "");
        assert!(repr.needs_build());
        repr.build(&s, &mut viewer).unwrap();
        assert!(!repr.needs_build());
        assert_eq!(repr.buffers().len(), 2);
        for buffer in repr.buffers() {
            assert!(viewer.scene().contains(buffer.borrow().id()));
        }
        assert!(!viewer.bounding_box().is_empty());
    }

    #[test]
    fn test_rebuild_disposes_old_buffers() {
        let s = chain();
        let mut viewer = viewer();
        let mut repr = bound("spacefill", "");
        repr.build(&s, &mut viewer).unwrap();
        let old = repr.buffers()[0].clone();

        repr.set_selection("1-2", &s, &mut viewer).unwrap();
        assert!(old.borrow().is_disposed());
        assert!(!viewer.scene().contains(old.borrow().id()));
        assert_eq!(repr.buffers()[0].borrow().count(), 2);
        assert_eq!(viewer.scene().buffer_count(), 1);
    }

    #[test]
    fn test_same_selection_keeps_buffers() {
        let s = chain();
        let mut viewer = viewer();
        let mut repr = bound("spacefill", "");
        repr.build(&s, &mut viewer).unwrap();
        let id = repr.buffers()[0].borrow().id();
        repr.set_selection("", &s, &mut viewer).unwrap();
        assert_eq!(repr.buffers()[0].borrow().id(), id);
    }

    #[test]
    fn test_invalid_selection_keeps_scene() {
        let s = chain();
        let mut viewer = viewer();
        let mut repr = bound("spacefill", "");
        repr.build(&s, &mut viewer).unwrap();
        let id = repr.buffers()[0].borrow().id();

        let err = repr.set_selection("[ALA", &s, &mut viewer).unwrap_err();
        assert!(matches!(err, MolscopeError::InvalidSelection { .. }));
        assert!(viewer.scene().contains(id));
        assert!(!repr.buffers()[0].borrow().is_disposed());
    }

    #[test]
    fn test_color_change_updates_in_place() {
        let s = chain();
        let mut viewer = viewer();
        let mut repr = bound("spacefill", "");
        repr.build(&s, &mut viewer).unwrap();
        let id = repr.buffers()[0].borrow().id();
        let before = viewer.bounding_box();

        let red = Vec3::new(1.0, 0.0, 0.0);
        let params = RepresentationParameters {
            color: Some(ColorScheme::Uniform(red)),
            ..RepresentationParameters::default()
        };
        let rebuild = repr.set_parameters(&params, &s, &mut viewer).unwrap();
        assert_eq!(rebuild, Rebuild::Update(DataFields::COLOR));
        let buffer = repr.buffers()[0].borrow();
        assert_eq!(buffer.id(), id);
        assert!(buffer.data().color.iter().all(|c| *c == red));
        assert_eq!(viewer.bounding_box(), before);
        assert!(viewer.render_pending());
    }

    #[test]
    fn test_position_update_refreshes_bounds() {
        let mut s = chain();
        let mut viewer = viewer();
        let mut repr = bound("spacefill", "");
        repr.build(&s, &mut viewer).unwrap();
        let before = viewer.bounding_box();

        let moved: Vec<Vec3> = s.atoms().iter().map(|a| a.position + Vec3::Y * 10.0).collect();
        s.set_positions(&moved).unwrap();
        repr.update(DataFields::POSITION, &s, &mut viewer).unwrap();
        let after = viewer.bounding_box();
        assert!((after.min.y - before.min.y - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_dispose_detaches() {
        let s = chain();
        let mut viewer = viewer();
        let mut repr = bound("ball+stick", "").with_instances(vec![
            Mat4::IDENTITY,
            Mat4::from_translation(Vec3::X * 20.0),
        ]);
        repr.build(&s, &mut viewer).unwrap();
        let handles: Vec<BufferHandle> = repr.buffers().to_vec();
        repr.dispose(&mut viewer);
        assert!(repr.buffers().is_empty());
        assert!(repr.needs_build());
        assert_eq!(viewer.scene().buffer_count(), 0);
        assert!(handles.iter().all(|h| h.borrow().is_disposed()));
    }
}
