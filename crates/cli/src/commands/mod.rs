pub mod ask;
pub mod catalog;
pub mod doctor;
pub mod init;

use clarion_config::AppConfig;
use std::path::Path;

/// Load configuration from `path`, or from the default location. Environment
/// overrides apply either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_overrides(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}
