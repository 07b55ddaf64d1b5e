//! Mapping file loading and first-run creation

mod schema;

pub use schema::*;

use std::path::Path;

/// The mapping file written on first run and by `init`.
pub const DEFAULT_MAPPING: &str = include_str!("../../faderlink.example.txt");

/// Load and parse a mapping file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    Config::parse(&contents)
}

/// Write the default mapping file if `path` does not exist yet.
///
/// Returns true when a new file was created.
pub fn ensure_config(path: &Path) -> std::io::Result<bool> {
    if path.is_file() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, DEFAULT_MAPPING)?;
    Ok(true)
}
