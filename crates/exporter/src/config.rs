use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the recording export service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory where finished exports (and in-progress temp files) live
    pub export_dir: PathBuf,
    /// Directory where job state JSON files are stored
    pub job_state_dir: PathBuf,
    /// Base URL of the VOD playlist service (no trailing slash)
    pub vod_base_url: String,
    /// Maximum time span in seconds a single VOD playlist request may cover.
    /// Longer export ranges are split into consecutive chunks of this size.
    pub max_playlist_seconds: i64,
    /// Path to the ffmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// Maximum wall-clock seconds a transcode may run before being killed (0 = unlimited)
    pub timeout_secs: u64,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ExportConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            export_dir: PathBuf::from("/media/recordings/exports"),
            job_state_dir: PathBuf::from("/tmp/recexport-jobs"),
            vod_base_url: "http://127.0.0.1:5000".to_string(),
            max_playlist_seconds: 7200,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            timeout_secs: 0,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // Try TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    let file_config: ExportConfig = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                    config = file_config;
                } else {
                    let file_config: ExportConfig = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                    config = file_config;
                }
            }
        }

        Ok(config)
    }
}
