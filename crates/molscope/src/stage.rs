//! The stage: a viewer plus the structures and representations shown in it.

use std::sync::Arc;

use glam::Vec3;
use image::RgbaImage;
use molscope_core::{
    DataFields, MolscopeError, OwnerId, PickedPrimitive, Picker, Result, Selection,
    StructureView, ViewerParameters,
};
use molscope_render::{BufferHandle, ImageParams, RenderBackend, Viewer};
use molscope_structures::{
    MemoryStructure, Rebuild, RepresentationParameters, RepresentationRegistry,
    StructureRepresentation,
};

use crate::controls::PickingControls;

/// Identifies a structure on the stage. Also the owner id of its pickers.
pub type ComponentId = OwnerId;

/// Identifies one representation on the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReprId(u64);

impl ReprId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A structure and the representations built from it.
#[derive(Debug)]
pub struct Component {
    id: ComponentId,
    structure: MemoryStructure,
    reprs: Vec<(ReprId, StructureRepresentation)>,
}

impl Component {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    pub fn structure(&self) -> &MemoryStructure {
        &self.structure
    }

    pub fn representations(&self) -> impl Iterator<Item = (ReprId, &StructureRepresentation)> {
        self.reprs.iter().map(|(id, r)| (*id, r))
    }

    /// The buffer whose picker is `picker`.
    fn buffer_for(&self, picker: &Arc<Picker>) -> Option<BufferHandle> {
        self.reprs
            .iter()
            .flat_map(|(_, r)| r.buffers())
            .find(|b| b.borrow().picker().is_some_and(|p| Arc::ptr_eq(p, picker)))
            .cloned()
    }
}

/// Loaded structures, their representations and the viewer drawing them.
pub struct Stage<B: RenderBackend> {
    viewer: Viewer<B>,
    registry: RepresentationRegistry,
    controls: PickingControls,
    components: Vec<Component>,
    next_component: ComponentId,
    next_repr: u64,
}

impl<B: RenderBackend> Stage<B> {
    /// Creates a stage with the default representations.
    pub fn new(backend: B, params: ViewerParameters) -> Self {
        Self::from_viewer(
            Viewer::new(backend, params),
            RepresentationRegistry::with_defaults(),
        )
    }

    /// Creates a stage around an existing viewer and registry.
    pub fn from_viewer(viewer: Viewer<B>, registry: RepresentationRegistry) -> Self {
        let controls = PickingControls::new(viewer.parameters().highlight_timeout_ms);
        Self {
            viewer,
            registry,
            controls,
            components: Vec::new(),
            next_component: 1,
            next_repr: 1,
        }
    }

    pub fn viewer(&self) -> &Viewer<B> {
        &self.viewer
    }

    pub fn viewer_mut(&mut self) -> &mut Viewer<B> {
        &mut self.viewer
    }

    pub fn registry_mut(&mut self) -> &mut RepresentationRegistry {
        &mut self.registry
    }

    pub fn controls(&self) -> &PickingControls {
        &self.controls
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Adds a structure without any representation.
    pub fn add_structure(&mut self, structure: MemoryStructure) -> ComponentId {
        let id = self.next_component;
        self.next_component += 1;
        log::debug!(
            "component {id}: '{}' with {} atoms",
            structure.name(),
            structure.atoms().len()
        );
        self.components.push(Component {
            id,
            structure,
            reprs: Vec::new(),
        });
        id
    }

    /// Removes a structure and disposes all its representations.
    pub fn remove_structure(&mut self, id: ComponentId) -> Result<MemoryStructure> {
        let Some(index) = self.components.iter().position(|c| c.id == id) else {
            log::error!("cannot remove component {id}: not on stage");
            return Err(MolscopeError::ComponentNotFound(id));
        };
        let mut component = self.components.remove(index);
        for (_, repr) in &mut component.reprs {
            repr.dispose(&mut self.viewer);
        }
        Ok(component.structure)
    }

    /// Builds a representation registered as `name` over `selection`.
    pub fn add_representation(
        &mut self,
        id: ComponentId,
        name: &str,
        selection: &str,
        params: &RepresentationParameters,
    ) -> Result<ReprId> {
        let repr = self.registry.create(name, id, params)?;
        let repr_id = ReprId(self.next_repr);
        let component = self
            .components
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(MolscopeError::ComponentNotFound(id))?;
        let mut bound = StructureRepresentation::new(repr, Selection::new(selection));
        bound.build(&component.structure, &mut self.viewer)?;
        component.reprs.push((repr_id, bound));
        self.next_repr += 1;
        Ok(repr_id)
    }

    /// Looks up a representation.
    pub fn representation(&self, repr: ReprId) -> Option<&StructureRepresentation> {
        self.components
            .iter()
            .flat_map(|c| c.reprs.iter())
            .find(|(id, _)| *id == repr)
            .map(|(_, r)| r)
    }

    fn with_repr<T>(
        &mut self,
        repr: ReprId,
        f: impl FnOnce(&mut StructureRepresentation, &MemoryStructure, &mut Viewer<B>) -> Result<T>,
    ) -> Result<T> {
        for component in &mut self.components {
            if let Some((_, bound)) = component.reprs.iter_mut().find(|(id, _)| *id == repr) {
                return f(bound, &component.structure, &mut self.viewer);
            }
        }
        log::error!("representation {} is not on stage", repr.0);
        Err(MolscopeError::RepresentationNotFound(repr.0))
    }

    /// Changes representation parameters, updating or rebuilding as needed.
    pub fn set_parameters(
        &mut self,
        repr: ReprId,
        params: &RepresentationParameters,
    ) -> Result<Rebuild> {
        self.with_repr(repr, |bound, structure, viewer| {
            bound.set_parameters(params, structure, viewer)
        })
    }

    /// Changes the selection of a representation.
    pub fn set_selection(&mut self, repr: ReprId, selection: &str) -> Result<()> {
        self.with_repr(repr, |bound, structure, viewer| {
            bound.set_selection(selection, structure, viewer)
        })
    }

    /// Disposes one representation.
    pub fn remove_representation(&mut self, repr: ReprId) -> Result<()> {
        for component in &mut self.components {
            if let Some(index) = component.reprs.iter().position(|(id, _)| *id == repr) {
                let (_, mut bound) = component.reprs.remove(index);
                bound.dispose(&mut self.viewer);
                return Ok(());
            }
        }
        log::error!("cannot remove representation {}: not on stage", repr.0);
        Err(MolscopeError::RepresentationNotFound(repr.0))
    }

    /// Moves the atoms of a structure and updates its representations in place.
    pub fn set_positions(&mut self, id: ComponentId, positions: &[Vec3]) -> Result<()> {
        let component = self
            .components
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(MolscopeError::ComponentNotFound(id))?;
        component.structure.set_positions(positions)?;
        for (_, bound) in &mut component.reprs {
            bound.update(DataFields::POSITION, &component.structure, &mut self.viewer)?;
        }
        Ok(())
    }

    /// Frames the camera on everything shown.
    pub fn auto_view(&mut self) {
        self.viewer.frame_scene();
    }

    /// Runs one frame of the viewer loop.
    pub fn tick(&mut self) -> Result<()> {
        self.viewer.tick()?;
        Ok(())
    }

    /// Resolves the primitive under `(x, y)` and highlights it.
    ///
    /// A miss clears the current highlight.
    pub fn pick(&mut self, x: f32, y: f32) -> Result<Option<PickedPrimitive>> {
        let Some(proxy) = self.controls.pick(&mut self.viewer, x, y)? else {
            self.controls.clear(&mut self.viewer);
            return Ok(None);
        };
        let Some(component) = self.components.iter().find(|c| c.id == proxy.owner()) else {
            log::debug!("picked owner {} is not a stage component", proxy.owner());
            return Ok(None);
        };
        let picked = proxy.resolve(&component.structure);
        if picked.is_some() {
            if let Some(handle) = component.buffer_for(&proxy.data().picker) {
                self.controls
                    .highlight(&mut self.viewer, &handle, proxy.row())?;
            }
        }
        Ok(picked)
    }

    /// Renders the stage into an image.
    pub fn make_image(&mut self, params: &ImageParams) -> Result<RgbaImage> {
        self.viewer
            .make_image(params)
            .map_err(|e| MolscopeError::RenderError(e.to_string()))
    }
}

impl<B: RenderBackend> std::fmt::Debug for Stage<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stage")
            .field("registry", &self.registry)
            .field("components", &self.components)
            .finish_non_exhaustive()
    }
}
