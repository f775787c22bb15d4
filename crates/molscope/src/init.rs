//! Logging and configuration setup for applications embedding molscope.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use molscope_core::{Result, ViewerParameters};

/// Installs `env_logger` with an `info` default, overridable via `RUST_LOG`.
///
/// Library crates never call this; it is meant for binaries and demos.
/// Calling it twice is harmless.
pub fn init_logging() {
    let env = env_logger::Env::default().default_filter_or("info");
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("logger already initialized");
    }
}

/// Reads viewer parameters from a JSON file. Missing fields take their defaults.
///
/// # Example
///
/// ```no_run
/// let params = molscope::load_parameters("viewer.json").unwrap();
/// assert!(params.camera_fov > 0.0);
/// ```
pub fn load_parameters(path: impl AsRef<Path>) -> Result<ViewerParameters> {
    let file = File::open(path.as_ref())?;
    let params: ViewerParameters = serde_json::from_reader(BufReader::new(file))?;
    log::debug!("loaded viewer parameters from {}", path.as_ref().display());
    Ok(params)
}

/// Writes viewer parameters as pretty JSON.
pub fn save_parameters(path: impl AsRef<Path>, params: &ViewerParameters) -> Result<()> {
    std::fs::write(path, params.to_json()?)?;
    Ok(())
}
