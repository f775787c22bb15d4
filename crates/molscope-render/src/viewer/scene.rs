//! Scene groups and object ids.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use glam::Mat4;

use molscope_core::BoundingBox;

use crate::buffer::{Buffer, BufferHandle, BufferId};

/// Render groups. One buffer instance lives in at most one drawing group plus
/// the picking group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Group {
    Model,
    Background,
    Wireframe,
    Picking,
}

/// One attached copy of a buffer.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub object_id: u32,
    pub group: Group,
    pub buffer: BufferHandle,
    pub buffer_id: BufferId,
    pub instance: Option<Mat4>,
}

impl SceneObject {
    /// World matrix: the instance applied after the buffer matrix.
    #[must_use]
    pub fn model_matrix(&self, buffer: &Buffer) -> Mat4 {
        self.instance.map_or(buffer.matrix(), |i| i * buffer.matrix())
    }
}

/// Attached buffers, split into groups.
#[derive(Debug, Default)]
pub struct SceneGraph {
    objects: Vec<SceneObject>,
    /// Instances each buffer was added with, in attach order.
    attached: Vec<(BufferHandle, Vec<Mat4>)>,
    next_object_id: u32,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            attached: Vec::new(),
            next_object_id: 1,
        }
    }

    /// Returns true if the buffer is attached.
    #[must_use]
    pub fn contains(&self, id: BufferId) -> bool {
        self.attached.iter().any(|(h, _)| h.borrow().id() == id)
    }

    /// Number of attached buffers.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.attached.len()
    }

    /// Adds one object per instance (one without instances) to the drawing
    /// group the buffer's parameters select, plus the picking group when pickable.
    pub fn attach(&mut self, handle: &BufferHandle, instances: &[Mat4]) {
        let (id, group, pickable) = {
            let buffer = handle.borrow();
            let params = buffer.params();
            let group = if params.wireframe {
                Group::Wireframe
            } else if params.background {
                Group::Background
            } else {
                Group::Model
            };
            (buffer.id(), group, buffer.pickable())
        };
        let copies: Vec<Option<Mat4>> = if instances.is_empty() {
            vec![None]
        } else {
            instances.iter().copied().map(Some).collect()
        };
        for instance in copies {
            self.push(handle, id, group, instance);
            if pickable {
                self.push(handle, id, Group::Picking, instance);
            }
        }
        self.attached.push((Rc::clone(handle), instances.to_vec()));
    }

    fn push(&mut self, handle: &BufferHandle, buffer_id: BufferId, group: Group, instance: Option<Mat4>) {
        let object_id = self.next_object_id;
        self.next_object_id = self.next_object_id.wrapping_add(1).max(1);
        self.objects.push(SceneObject {
            object_id,
            group,
            buffer: Rc::clone(handle),
            buffer_id,
            instance,
        });
    }

    /// Removes the buffer from every group. Returns false if it was not attached.
    pub fn detach(&mut self, id: BufferId) -> bool {
        let before = self.attached.len();
        self.attached.retain(|(h, _)| h.borrow().id() != id);
        self.objects.retain(|o| o.buffer_id != id);
        before != self.attached.len()
    }

    /// Objects of one group, in attach order.
    pub fn group(&self, group: Group) -> impl Iterator<Item = &SceneObject> {
        self.objects.iter().filter(move |o| o.group == group)
    }

    /// The picking object with this id.
    #[must_use]
    pub fn picking_object(&self, object_id: u32) -> Option<&SceneObject> {
        self.objects
            .iter()
            .find(|o| o.group == Group::Picking && o.object_id == object_id)
    }

    /// Largest object id handed out so far.
    #[must_use]
    pub fn max_object_id(&self) -> u32 {
        self.objects.iter().map(|o| o.object_id).max().unwrap_or(0)
    }

    /// Attached buffers with the instances they were added with.
    pub fn attached(&self) -> impl Iterator<Item = (&BufferHandle, &[Mat4])> {
        self.attached.iter().map(|(h, i)| (h, i.as_slice()))
    }

    /// Union of the bounds of buffers drawn in the model or background group.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        self.attached
            .iter()
            .filter(|(h, _)| {
                let id = h.borrow().id();
                self.objects
                    .iter()
                    .any(|o| o.buffer_id == id && matches!(o.group, Group::Model | Group::Background))
            })
            .fold(BoundingBox::EMPTY, |bb, (h, instances)| {
                bb.union(&buffer_bounds(&h.borrow(), instances))
            })
    }

    /// Hash of everything the picking pass depends on besides the camera.
    #[must_use]
    pub fn picking_signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for object in self.group(Group::Picking) {
            object.object_id.hash(&mut hasher);
            object.buffer.borrow().version().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Bounds of a buffer after its matrix and then each instance.
///
/// Point-sized geometry bounds are expanded first.
#[must_use]
pub fn buffer_bounds(buffer: &Buffer, instances: &[Mat4]) -> BoundingBox {
    let local = buffer
        .geometry_bounds()
        .non_degenerate()
        .transformed(&buffer.matrix());
    if instances.is_empty() {
        local
    } else {
        instances
            .iter()
            .fold(BoundingBox::EMPTY, |bb, m| bb.union(&local.transformed(m)))
    }
}
