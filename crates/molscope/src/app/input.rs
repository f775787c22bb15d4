use std::time::Duration;

use molscope_render::{Viewer, WgpuBackend};
use molscope_structures::RepresentationRegistry;

use super::{
    ActiveEventLoop, App, AppError, ApplicationHandler, Arc, ControlFlow, ElementState,
    FutureExt, KeyCode, LogicalSize, MouseButton, MouseScrollDelta, PhysicalKey, Window,
    WindowEvent, WindowId, CLICK_SLOP,
};
use crate::stage::Stage;

/// Radians of orbit per logical pixel of drag.
const ORBIT_SPEED: f64 = 0.005;
/// Pan distance per logical pixel, relative to the camera distance.
const PAN_SPEED: f32 = 0.0015;
/// Zoom distance per wheel line, relative to the camera distance.
const ZOOM_SPEED: f32 = 0.1;

/// Wakes the loop often enough for still frames and highlight timeouts.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

impl App {
    fn create_stage(&mut self, window: &Arc<Window>) -> Result<Stage<WgpuBackend>, AppError> {
        let backend = WgpuBackend::new_windowed(window.clone()).block_on()?;
        let mut params = self.options.params.clone();
        params.pixel_ratio = window.scale_factor() as f32;
        let mut viewer = Viewer::new(backend, params);
        let logical: LogicalSize<u32> = window.inner_size().to_logical(window.scale_factor());
        viewer.set_size(logical.width, logical.height);

        let mut stage = Stage::from_viewer(viewer, RepresentationRegistry::with_defaults());
        if let Some(setup) = self.setup.take() {
            setup(&mut stage)?;
        }
        stage.auto_view();
        Ok(stage)
    }

    fn on_cursor_moved(&mut self, x: f64, y: f64) {
        let (dx, dy) = (x - self.mouse_pos.0, y - self.mouse_pos.1);
        self.mouse_pos = (x, y);
        if !(self.left_mouse_down || self.right_mouse_down) {
            return;
        }
        self.drag_distance += (dx * dx + dy * dy).sqrt();
        let Some(stage) = &mut self.stage else {
            return;
        };
        let viewer = stage.viewer_mut();
        if self.left_mouse_down {
            viewer
                .camera_mut()
                .orbit((dx * ORBIT_SPEED) as f32, (-dy * ORBIT_SPEED) as f32);
        } else {
            let camera = viewer.camera_mut();
            let scale = camera.distance() * PAN_SPEED;
            camera.pan(-dx as f32 * scale, dy as f32 * scale);
        }
        viewer.request_render();
    }

    fn on_scroll(&mut self, lines: f32) {
        let Some(stage) = &mut self.stage else {
            return;
        };
        let viewer = stage.viewer_mut();
        let camera = viewer.camera_mut();
        let step = camera.distance() * ZOOM_SPEED * lines;
        camera.zoom(step);
        viewer.request_render();
    }

    fn on_click(&mut self) {
        let Some(stage) = &mut self.stage else {
            return;
        };
        let (x, y) = (self.mouse_pos.0 as f32, self.mouse_pos.1 as f32);
        match stage.pick(x, y) {
            Ok(Some(picked)) => log::info!("picked {}", picked.label()),
            Ok(None) => log::debug!("nothing at {x:.0},{y:.0}"),
            Err(e) => log::warn!("pick failed: {e}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title(self.options.title.clone())
            .with_inner_size(LogicalSize::new(self.options.width, self.options.height));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };
        match self.create_stage(&window) {
            Ok(stage) => self.stage = Some(stage),
            Err(e) => return self.fail(event_loop, e),
        }
        window.request_redraw();
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let scale = self.window.as_ref().map_or(1.0, |w| w.scale_factor());
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(stage) = &mut self.stage {
                    let logical: LogicalSize<u32> = size.to_logical(scale);
                    stage.viewer_mut().set_size(logical.width, logical.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f64>(scale);
                self.on_cursor_moved(logical.x, logical.y);
            }
            WindowEvent::MouseInput { state, button, .. } => match (button, state) {
                (MouseButton::Left, ElementState::Pressed) => {
                    self.left_mouse_down = true;
                    self.drag_distance = 0.0;
                }
                (MouseButton::Left, ElementState::Released) => {
                    self.left_mouse_down = false;
                    if self.drag_distance < CLICK_SLOP {
                        self.on_click();
                    }
                }
                (MouseButton::Right, ElementState::Pressed) => {
                    self.right_mouse_down = true;
                    self.drag_distance = 0.0;
                }
                (MouseButton::Right, ElementState::Released) => {
                    self.right_mouse_down = false;
                }
                _ => {}
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => (p.y / 50.0) as f32,
                };
                self.on_scroll(lines);
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::Escape) => event_loop.exit(),
                    PhysicalKey::Code(KeyCode::KeyR) => {
                        if let Some(stage) = &mut self.stage {
                            stage.auto_view();
                        }
                    }
                    PhysicalKey::Code(KeyCode::KeyP) => self.save_screenshot(),
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(stage) = &mut self.stage {
                    if let Err(e) = stage.tick() {
                        log::warn!("frame failed: {e}");
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::wait_duration(TICK_INTERVAL));
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}
