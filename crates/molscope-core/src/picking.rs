//! Picking metadata carried by pickable buffers.

use std::sync::Arc;

use glam::Mat4;

use crate::error::{MolscopeError, Result};

/// Identifies the structure (or other owner) a picker belongs to.
pub type OwnerId = u64;

/// What kind of domain rows a picker's array refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickerKind {
    /// Rows are atom indices.
    Atom,
    /// Rows are bond indices.
    Bond,
    /// Rows are bond indices of the bond an ellipsoid was built around.
    Ellipsoid,
    /// Pickable for occlusion but never reported.
    Ignore,
}

impl PickerKind {
    /// Returns the kind name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PickerKind::Atom => "atom",
            PickerKind::Bond => "bond",
            PickerKind::Ellipsoid => "ellipsoid",
            PickerKind::Ignore => "ignore",
        }
    }
}

/// Maps primitive slots of one buffer back to domain rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picker {
    pub kind: PickerKind,
    /// `array[slot]` is the domain row of primitive `slot`.
    pub array: Vec<u32>,
    pub owner: OwnerId,
}

impl Picker {
    /// Creates a picker.
    #[must_use]
    pub fn new(kind: PickerKind, array: Vec<u32>, owner: OwnerId) -> Self {
        Self { kind, array, owner }
    }

    /// Domain row of primitive `pid`.
    pub fn row(&self, pid: u32) -> Result<u32> {
        self.array
            .get(pid as usize)
            .copied()
            .ok_or(MolscopeError::PickIndexOutOfRange {
                id: pid,
                len: self.array.len(),
            })
    }

    /// Slots whose domain row is in `rows`.
    #[must_use]
    pub fn slots_for_rows(&self, rows: &[u32]) -> Vec<u32> {
        self.array
            .iter()
            .enumerate()
            .filter(|(_, row)| rows.contains(row))
            .filter_map(|(slot, _)| u32::try_from(slot).ok())
            .collect()
    }
}

/// The result of decoding one picking pixel.
///
/// Built inside a single pick call and handed straight to a picking proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct PickingData {
    /// Primitive slot inside the picked buffer.
    pub pid: u32,
    /// Instance matrix of the picked copy, if the buffer is instanced.
    pub instance: Option<Mat4>,
    pub picker: Arc<Picker>,
}

impl PickingData {
    /// Domain row of the picked primitive.
    pub fn row(&self) -> Result<u32> {
        self.picker.row(self.pid)
    }
}

/// Outcome of a pick that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum PickOutcome {
    Hit(PickingData),
    /// No pickable object under the cursor.
    Nothing,
}

impl PickOutcome {
    /// Returns the hit, if any.
    #[must_use]
    pub fn hit(&self) -> Option<&PickingData> {
        match self {
            PickOutcome::Hit(data) => Some(data),
            PickOutcome::Nothing => None,
        }
    }

    /// Returns true if nothing was hit.
    #[must_use]
    pub fn is_nothing(&self) -> bool {
        matches!(self, PickOutcome::Nothing)
    }
}
