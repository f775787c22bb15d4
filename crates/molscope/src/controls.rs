//! Pointer picking on top of the viewer.

use std::time::Duration;

use molscope_core::{PickOutcome, PickingProxy, Result};
use molscope_render::{BufferHandle, RenderBackend, Viewer};

/// Picks through [`Viewer::pick`] and keeps the last hit.
#[derive(Debug, Clone, Default)]
pub struct PickingControls {
    /// `None` keeps highlights until the next pick.
    highlight_timeout: Option<Duration>,
    last: Option<PickingProxy>,
}

impl PickingControls {
    /// A zero timeout keeps highlights until cleared.
    pub fn new(highlight_timeout_ms: u64) -> Self {
        Self {
            highlight_timeout: (highlight_timeout_ms > 0)
                .then(|| Duration::from_millis(highlight_timeout_ms)),
            last: None,
        }
    }

    pub fn highlight_timeout(&self) -> Option<Duration> {
        self.highlight_timeout
    }

    /// The last successful pick.
    pub fn last(&self) -> Option<&PickingProxy> {
        self.last.as_ref()
    }

    /// Picks at canvas position `(x, y)` in CSS pixels.
    pub fn pick<B: RenderBackend>(
        &mut self,
        viewer: &mut Viewer<B>,
        x: f32,
        y: f32,
    ) -> Result<Option<PickingProxy>> {
        let proxy = match viewer.pick(x, y)? {
            PickOutcome::Nothing => None,
            PickOutcome::Hit(data) => Some(PickingProxy::new(data)?),
        };
        if let Some(proxy) = &proxy {
            log::debug!(
                "picked {} row {} of owner {}",
                proxy.kind().name(),
                proxy.row(),
                proxy.owner()
            );
        }
        self.last.clone_from(&proxy);
        Ok(proxy)
    }

    /// Outlines `row` of `buffer` for the configured timeout.
    pub fn highlight<B: RenderBackend>(
        &self,
        viewer: &mut Viewer<B>,
        buffer: &BufferHandle,
        row: u32,
    ) -> Result<()> {
        viewer.set_highlight(buffer, &[row], self.highlight_timeout)
    }

    /// Forgets the last pick and removes its outline.
    pub fn clear<B: RenderBackend>(&mut self, viewer: &mut Viewer<B>) {
        self.last = None;
        viewer.clear_highlight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use molscope_core::{AttributeArrays, Picker, PickerKind, ViewerParameters};
    use molscope_render::{Buffer, BufferKind, BufferParams, SoftwareBackend};
    use std::sync::Arc;

    fn viewer_with_sphere() -> (Viewer<SoftwareBackend>, BufferHandle) {
        let mut viewer = Viewer::new(SoftwareBackend::new(64, 64), ViewerParameters::default());
        let mut data = AttributeArrays::spheres(vec![Vec3::ZERO], vec![Vec3::ONE], vec![150.0]);
        data.picking = Some(Arc::new(Picker::new(PickerKind::Atom, vec![7], 4)));
        let buffer = Buffer::shared(BufferKind::Sphere, data, BufferParams::default()).unwrap();
        viewer.add(&buffer, None).unwrap();
        (viewer, buffer)
    }

    #[test]
    fn test_zero_timeout_is_persistent() {
        assert_eq!(PickingControls::new(0).highlight_timeout(), None);
        assert_eq!(
            PickingControls::new(3000).highlight_timeout(),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_pick_center_and_corner() {
        let (mut viewer, _) = viewer_with_sphere();
        let mut controls = PickingControls::new(3000);
        let proxy = controls.pick(&mut viewer, 32.0, 32.0).unwrap().unwrap();
        assert_eq!(proxy.row(), 7);
        assert_eq!(proxy.owner(), 4);
        assert_eq!(controls.last().unwrap().row(), 7);

        assert!(controls.pick(&mut viewer, 0.0, 0.0).unwrap().is_none());
        assert!(controls.last().is_none());
    }

    #[test]
    fn test_highlight_and_clear() {
        let (mut viewer, buffer) = viewer_with_sphere();
        let mut controls = PickingControls::new(0);
        controls.highlight(&mut viewer, &buffer, 7).unwrap();
        let (id, slots) = viewer.highlight().unwrap();
        assert_eq!(id, buffer.borrow().id());
        assert_eq!(slots, &[0]);
        controls.clear(&mut viewer);
        assert!(viewer.highlight().is_none());
    }
}
