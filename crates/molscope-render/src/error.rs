//! Rendering error types.

use thiserror::Error;

use molscope_core::MolscopeError;

/// Errors raised by render backends and the viewer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failed to create wgpu adapter.
    #[error("failed to create graphics adapter")]
    AdapterCreationFailed,

    /// Failed to create wgpu device.
    #[error("failed to create graphics device: {0}")]
    DeviceCreationFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create surface.
    #[error("failed to create surface: {0}")]
    SurfaceCreationFailed(#[from] wgpu::CreateSurfaceError),

    /// The adapter cannot render to a required target format.
    #[error("render targets of format {0:?} are not supported by this adapter")]
    UnsupportedFormat(wgpu::TextureFormat),

    /// Surface configuration failed.
    #[error("surface configuration failed")]
    SurfaceConfigurationFailed,

    /// Surface lost.
    #[error("surface lost")]
    SurfaceLost,

    /// Surface outdated.
    #[error("surface outdated")]
    SurfaceOutdated,

    /// Out of memory.
    #[error("out of memory")]
    OutOfMemory,

    /// Timeout waiting for GPU.
    #[error("timeout waiting for GPU")]
    Timeout,

    /// Mapping a readback buffer failed.
    #[error("readback buffer mapping failed")]
    BufferMapFailed,

    /// A pixel region outside the render target was requested.
    #[error("region {x},{y} {width}x{height} outside target {target_width}x{target_height}")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        target_width: u32,
        target_height: u32,
    },

    /// The render target has zero area.
    #[error("render target has zero size")]
    EmptyTarget,

    /// A data model error surfaced while rendering or picking.
    #[error(transparent)]
    Model(#[from] MolscopeError),
}

/// A specialized Result type for rendering operations.
pub type RenderResult<T> = std::result::Result<T, RenderError>;

impl From<RenderError> for MolscopeError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Model(inner) => inner,
            other => MolscopeError::RenderError(other.to_string()),
        }
    }
}
