//! Pipeline settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Missing sections or fields in a TOML file fall back to their defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for the capture-side resampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output sample rate in Hz handed to transcription (16 000).
    pub target_sample_rate: u32,
    /// PCM16 samples per emitted chunk (800 = 50 ms at 16 kHz).
    pub chunk_samples: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16_000,
            chunk_samples: 800,
        }
    }
}

// ---------------------------------------------------------------------------
// CodecConfig
// ---------------------------------------------------------------------------

/// Wire-format limits applied by the sending side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Largest payload accepted for encoding, in bytes (default: 2 MiB).
    pub max_payload_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 2 * 1024 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// QueueConfig
// ---------------------------------------------------------------------------

/// Settings for the video frame queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Frames held before the oldest is evicted (default: `20`).
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 20 }
    }
}

// ---------------------------------------------------------------------------
// QualityConfig
// ---------------------------------------------------------------------------

/// Video-quality grading thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Nominal sampling rate the client sends frames at, in frames/second.
    pub frame_rate: f64,
    /// Seconds without a frame after which the camera counts as dropped.
    pub camera_drop_timeout_secs: f64,
    /// Minimum fraction of face-checked frames that must contain a face for
    /// a session to stay `good`.  Only used when a face detector is attached.
    pub min_face_visibility: f64,
    /// Keypoints below this confidence are ignored by gaze classification.
    pub min_keypoint_confidence: f32,
    /// Largest horizontal nose offset from the shoulder midpoint, as a
    /// fraction of shoulder width, still classified as facing the camera.
    pub max_nose_offset: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            frame_rate: 2.0,
            camera_drop_timeout_secs: 5.0,
            min_face_visibility: 0.6,
            min_keypoint_confidence: 0.3,
            max_nose_offset: 0.35,
        }
    }
}

// ---------------------------------------------------------------------------
// MonitorConfig
// ---------------------------------------------------------------------------

/// Settings for the `media-monitor` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// How long the microphone loopback runs, in seconds.
    pub duration_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { duration_secs: 10 }
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level configuration, serialised as `settings.toml`.
///
/// ```rust,no_run
/// use media_pipeline::config::PipelineConfig;
///
/// // Load (returns Default when file is missing)
/// let config = PipelineConfig::load().unwrap();
/// assert_eq!(config.queue.capacity, 20);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub audio: AudioConfig,
    pub codec: CodecConfig,
    pub queue: QueueConfig,
    pub quality: QualityConfig,
    pub monitor: MonitorConfig,
}

impl PipelineConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(PipelineConfig::default())` when the file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
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

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
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

        let original = PipelineConfig::default();
        original.save_to(&path).expect("save");

        let loaded = PipelineConfig::load_from(&path).expect("load");
        assert_eq!(loaded, original);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = PipelineConfig::load_from(&path).expect("should not error");
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn default_values() {
        let cfg = PipelineConfig::default();

        assert_eq!(cfg.audio.target_sample_rate, 16_000);
        assert_eq!(cfg.audio.chunk_samples, 800);
        assert_eq!(cfg.codec.max_payload_bytes, 2_097_152);
        assert_eq!(cfg.queue.capacity, 20);
        assert_eq!(cfg.quality.frame_rate, 2.0);
        assert_eq!(cfg.quality.camera_drop_timeout_secs, 5.0);
        assert_eq!(cfg.monitor.duration_secs, 10);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[queue]\ncapacity = 5\n\n[quality]\nframe_rate = 4.0\n")
            .expect("write");

        let cfg = PipelineConfig::load_from(&path).expect("load");
        assert_eq!(cfg.queue.capacity, 5);
        assert_eq!(cfg.quality.frame_rate, 4.0);
        assert_eq!(cfg.quality.camera_drop_timeout_secs, 5.0);
        assert_eq!(cfg.audio, AudioConfig::default());
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("modified.toml");

        let mut cfg = PipelineConfig::default();
        cfg.queue.capacity = 8;
        cfg.quality.camera_drop_timeout_secs = 2.5;
        cfg.quality.min_face_visibility = 0.75;
        cfg.codec.max_payload_bytes = 1_000;

        cfg.save_to(&path).expect("save");
        let loaded = PipelineConfig::load_from(&path).expect("load");

        assert_eq!(loaded.queue.capacity, 8);
        assert_eq!(loaded.quality.camera_drop_timeout_secs, 2.5);
        assert_eq!(loaded.quality.min_face_visibility, 0.75);
        assert_eq!(loaded.codec.max_payload_bytes, 1_000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[queue\ncapacity = ").expect("write");

        assert!(PipelineConfig::load_from(&path).is_err());
    }
}
