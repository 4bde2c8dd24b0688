//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\dance-trainer\
//!   macOS:   ~/Library/Application Support/dance-trainer/
//!   Linux:   ~/.config/dance-trainer/
//!
//! Data dir (catalog + music library):
//!   Windows: %LOCALAPPDATA%\dance-trainer\
//!   macOS:   ~/Library/Application Support/dance-trainer/
//!   Linux:   ~/.local/share/dance-trainer/

use std::path::{Path, PathBuf};

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Root of everything the trainer persists between runs.
    pub data_dir: PathBuf,
    /// Full path to `catalog.json` (dances and their elements).
    pub catalog_file: PathBuf,
    /// Directory backing the durable music store.
    pub music_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "dance-trainer";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self::with_dirs(config_dir, data_dir)
    }

    /// Same as [`AppPaths::new`] but with the data directory replaced, used
    /// when `storage.data_dir` is set in the settings file.
    pub fn with_data_dir(self, data_dir: &Path) -> Self {
        Self::with_dirs(self.config_dir, data_dir.to_path_buf())
    }

    fn with_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        let settings_file = config_dir.join("settings.toml");
        let catalog_file = data_dir.join("catalog.json");
        let music_dir = data_dir.join("music");

        Self {
            config_dir,
            settings_file,
            data_dir,
            catalog_file,
            music_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.data_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .catalog_file
            .file_name()
            .is_some_and(|n| n == "catalog.json"));
    }

    #[test]
    fn data_dir_override_moves_catalog_and_music() {
        let paths = AppPaths::new().with_data_dir(Path::new("/tmp/trainer-data"));
        assert_eq!(paths.catalog_file, Path::new("/tmp/trainer-data/catalog.json"));
        assert_eq!(paths.music_dir, Path::new("/tmp/trainer-data/music"));
        assert!(paths.settings_file.ends_with("settings.toml"));
    }
}
