//! Error types for molscope.

use thiserror::Error;

use crate::attributes::Channel;

/// The main error type for molscope operations.
#[derive(Error, Debug)]
pub enum MolscopeError {
    /// Per-primitive attribute channels disagree on the primitive count.
    #[error("attribute '{channel}' has {actual} entries, expected {expected}")]
    SizeMismatch {
        channel: Channel,
        expected: usize,
        actual: usize,
    },

    /// A channel required by the buffer kind is missing.
    #[error("buffer kind '{kind}' requires attribute '{channel}'")]
    MissingChannel { kind: &'static str, channel: Channel },

    /// A decoded picking id points outside its picker's array.
    #[error("picking id {id} out of range for picker of length {len}")]
    PickIndexOutOfRange { id: u32, len: usize },

    /// Operation on a buffer that has already been disposed.
    #[error("buffer {0} has been disposed")]
    BufferDisposed(u64),

    /// The buffer is not attached to the viewer.
    #[error("buffer {0} is not attached")]
    BufferNotAttached(u64),

    /// No representation factory registered for the name.
    #[error("unknown representation type '{0}'")]
    UnknownRepresentation(String),

    /// No structure component with this id is loaded.
    #[error("no component with id {0}")]
    ComponentNotFound(u64),

    /// No representation with this id is bound.
    #[error("no representation with id {0}")]
    RepresentationNotFound(u64),

    /// A selection string could not be parsed.
    #[error("invalid selection '{input}': {reason}")]
    InvalidSelection { input: String, reason: String },

    /// An atom or bond index outside the structure.
    #[error("index {index} out of range for {what} (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Rendering error.
    #[error("render error: {0}")]
    RenderError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for molscope operations.
pub type Result<T> = std::result::Result<T, MolscopeError>;
