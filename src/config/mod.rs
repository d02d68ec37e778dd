//! Configuration module.
//!
//! Provides `PipelineConfig` (top-level settings), sub-configs for each
//! subsystem, `AppPaths` for the platform config directory, and TOML
//! persistence via `PipelineConfig::load` / `PipelineConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AudioConfig, CodecConfig, MonitorConfig, PipelineConfig, QualityConfig, QueueConfig,
};
