//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across tasks.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// OverlapPolicy
// ---------------------------------------------------------------------------

/// What the scheduler does when a tick fires while the previous
/// announcement is still being synthesized or played.
///
/// | Variant         | Behaviour                                          |
/// |-----------------|----------------------------------------------------|
/// | `SkipWhileBusy` | The tick is dropped; the next one fires on time.   |
/// | `AllowOverlap`  | A second announcement starts; audio may interleave.|
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    SkipWhileBusy,
    AllowOverlap,
}

impl Default for OverlapPolicy {
    fn default() -> Self {
        Self::SkipWhileBusy
    }
}

// ---------------------------------------------------------------------------
// TrainingConfig
// ---------------------------------------------------------------------------

/// Pacing of a training session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Seconds of music before the first call-out.
    pub warmup_secs: u64,
    /// Interval offered when the user does not pick one.
    pub default_interval_secs: i64,
    /// Back-pressure policy for slow announcements.
    pub overlap: OverlapPolicy,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            warmup_secs: 20,
            default_interval_secs: 8,
            overlap: OverlapPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for the remote text-to-speech service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Base URL of the Generative Language API.
    pub base_url: String,
    /// API key.  When `None`, the key is read from the environment variable
    /// named by `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable consulted when `api_key` is unset.
    pub api_key_env: String,
    /// TTS-capable model identifier.
    pub model: String,
    /// Prebuilt voice name.
    pub voice: String,
    /// Instruction prepended to every element name.
    pub prompt_prefix: String,
    /// Maximum seconds to wait for one synthesis request.
    pub timeout_secs: u64,
    /// Sample rate assumed when the response does not state one.
    pub sample_rate: u32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            api_key_env: "GEMINI_API_KEY".into(),
            model: "gemini-2.5-flash-preview-tts".into(),
            voice: "Kore".into(),
            prompt_prefix: "Говори четко и энергично:".into(),
            timeout_secs: 15,
            sample_rate: 24_000,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Output device and levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name; `None` means the system default.
    pub output_device: Option<String>,
    /// Gain applied to announcements (0.0 – 1.0).
    pub speech_volume: f32,
    /// Gain applied to the music track (0.0 – 1.0).
    pub music_volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_device: None,
            speech_volume: 1.0,
            music_volume: 0.8,
        }
    }
}

// ---------------------------------------------------------------------------
// StorageConfig
// ---------------------------------------------------------------------------

/// Where the catalog and the music library live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use dance_trainer::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Session pacing.
    pub training: TrainingConfig,
    /// Speech synthesis settings.
    pub tts: TtsConfig,
    /// Audio output settings.
    pub audio: AudioConfig,
    /// Storage locations.
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario).
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolved paths, honouring `storage.data_dir`.
    pub fn paths(&self) -> AppPaths {
        let paths = AppPaths::new();
        match &self.storage.data_dir {
            Some(dir) => paths.with_data_dir(dir),
            None => paths,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.training.warmup_secs, loaded.training.warmup_secs);
        assert_eq!(
            original.training.default_interval_secs,
            loaded.training.default_interval_secs
        );
        assert_eq!(original.training.overlap, loaded.training.overlap);

        assert_eq!(original.tts.base_url, loaded.tts.base_url);
        assert_eq!(original.tts.api_key, loaded.tts.api_key);
        assert_eq!(original.tts.model, loaded.tts.model);
        assert_eq!(original.tts.voice, loaded.tts.voice);
        assert_eq!(original.tts.prompt_prefix, loaded.tts.prompt_prefix);
        assert_eq!(original.tts.sample_rate, loaded.tts.sample_rate);

        assert_eq!(original.audio.output_device, loaded.audio.output_device);
        assert_eq!(original.audio.music_volume, loaded.audio.music_volume);
        assert_eq!(original.storage.data_dir, loaded.storage.data_dir);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.training.warmup_secs, 20);
        assert_eq!(config.tts.sample_rate, 24_000);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.training.warmup_secs, 20);
        assert_eq!(cfg.training.default_interval_secs, 8);
        assert_eq!(cfg.training.overlap, OverlapPolicy::SkipWhileBusy);
        assert_eq!(cfg.tts.model, "gemini-2.5-flash-preview-tts");
        assert_eq!(cfg.tts.voice, "Kore");
        assert_eq!(cfg.tts.api_key_env, "GEMINI_API_KEY");
        assert!(cfg.tts.api_key.is_none());
        assert!(cfg.audio.output_device.is_none());
        assert!(cfg.storage.data_dir.is_none());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[training]\nwarmup_secs = 5\noverlap = \"allow_overlap\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.training.warmup_secs, 5);
        assert_eq!(cfg.training.overlap, OverlapPolicy::AllowOverlap);
        assert_eq!(cfg.training.default_interval_secs, 8);
        assert_eq!(cfg.tts.voice, "Kore");
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.training.warmup_secs = 10;
        cfg.tts.api_key = Some("key-test".into());
        cfg.tts.voice = "Puck".into();
        cfg.audio.output_device = Some("USB Speakers".into());
        cfg.storage.data_dir = Some(PathBuf::from("/srv/trainer"));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.training.warmup_secs, 10);
        assert_eq!(loaded.tts.api_key, Some("key-test".into()));
        assert_eq!(loaded.tts.voice, "Puck");
        assert_eq!(loaded.audio.output_device.as_deref(), Some("USB Speakers"));
        assert_eq!(loaded.paths().catalog_file, PathBuf::from("/srv/trainer/catalog.json"));
    }
}
