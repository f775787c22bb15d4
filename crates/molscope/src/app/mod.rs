//! Windowed viewer: a winit event loop driving a stage on the wgpu backend.

mod input;

pub(super) use std::sync::Arc;

pub(super) use pollster::FutureExt;
pub(super) use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use molscope_core::{MolscopeError, ViewerParameters};
use molscope_render::{RenderError, WgpuBackend};
use thiserror::Error;

use crate::stage::Stage;

/// Fills the stage once the window and device exist.
pub type SetupFn = Box<dyn FnOnce(&mut Stage<WgpuBackend>) -> molscope_core::Result<()>>;

/// Errors that end the windowed viewer.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Model(#[from] MolscopeError),
}

/// Window settings for [`run_app`].
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub title: String,
    /// Initial inner size in logical pixels.
    pub width: u32,
    pub height: u32,
    pub params: ViewerParameters,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            title: "molscope".to_string(),
            width: 1280,
            height: 720,
            params: ViewerParameters::default(),
        }
    }
}

/// Pointer travel, in logical pixels, below which a press and release is a click.
pub(super) const CLICK_SLOP: f64 = 4.0;

/// The windowed application state.
pub struct App {
    pub(super) options: AppOptions,
    pub(super) setup: Option<SetupFn>,
    pub(super) window: Option<Arc<Window>>,
    pub(super) stage: Option<Stage<WgpuBackend>>,
    pub(super) error: Option<AppError>,
    // Mouse state in logical pixels
    pub(super) mouse_pos: (f64, f64),
    pub(super) left_mouse_down: bool,
    pub(super) right_mouse_down: bool,
    // Drag tracking - accumulated distance since mouse press
    pub(super) drag_distance: f64,
    pub(super) screenshot_counter: u32,
}

impl App {
    /// Creates a new application.
    pub fn new(options: AppOptions, setup: SetupFn) -> Self {
        Self {
            options,
            setup: Some(setup),
            window: None,
            stage: None,
            error: None,
            mouse_pos: (0.0, 0.0),
            left_mouse_down: false,
            right_mouse_down: false,
            drag_distance: 0.0,
            screenshot_counter: 0,
        }
    }

    /// Records a fatal error and stops the loop.
    pub(super) fn fail(&mut self, event_loop: &ActiveEventLoop, error: AppError) {
        log::error!("{error}");
        if self.error.is_none() {
            self.error = Some(error);
        }
        event_loop.exit();
    }

    /// Saves a screenshot with an auto-generated filename.
    pub(super) fn save_screenshot(&mut self) {
        let Some(stage) = &mut self.stage else {
            return;
        };
        let filename = format!("screenshot_{:04}.png", self.screenshot_counter);
        self.screenshot_counter += 1;
        if let Err(e) = crate::render_to_file(stage, &filename, &molscope_render::ImageParams::default()) {
            log::warn!("screenshot failed: {e}");
        }
    }
}

/// Opens a window, runs `setup` on its stage and blocks until the window closes.
///
/// Left drag orbits, right drag pans, the wheel zooms and a left click picks.
/// `R` re-frames the scene, `P` saves a screenshot, `Escape` quits.
pub fn run_app(
    options: AppOptions,
    setup: impl FnOnce(&mut Stage<WgpuBackend>) -> molscope_core::Result<()> + 'static,
) -> Result<(), AppError> {
    let event_loop = EventLoop::new()?;
    let mut app = App::new(options, Box::new(setup));
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
