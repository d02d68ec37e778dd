//! Cross-platform configuration paths using the `dirs` crate.
//!
//! Config dir:
//!   Windows: %APPDATA%\media-pipeline\
//!   macOS:   ~/Library/Application Support/media-pipeline/
//!   Linux:   ~/.config/media-pipeline/

use std::path::PathBuf;

/// Resolved configuration directory and settings file.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory holding `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "media-pipeline";

    /// Falls back to the current directory if the platform cannot provide a
    /// standard config path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);
        let settings_file = config_dir.join("settings.toml");

        Self {
            config_dir,
            settings_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
