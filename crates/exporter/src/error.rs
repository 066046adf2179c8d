use std::path::PathBuf;
use thiserror::Error;

/// Everything that can end an export job without a finished artifact.
///
/// None of these cross the job boundary: detached jobs record the failure on
/// their job record and log it, they never panic or propagate upward.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Request rejected before any process was spawned
    #[error("invalid export request: {0}")]
    InvalidRequest(String),

    /// ffmpeg binary missing or not executable
    #[error("failed to launch {bin}: {source}")]
    ProcessLaunch {
        bin: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ffmpeg ran but returned a non-zero exit status
    #[error("ffmpeg exited with code {exit_code}")]
    Transcode { exit_code: i32, stderr: String },

    /// ffmpeg exceeded the configured wall-clock budget and was killed
    #[error("ffmpeg timed out after {0} seconds and was killed")]
    Timeout(u64),

    /// Transcode succeeded but the temp -> final rename failed; the artifact
    /// is stuck at the temp path
    #[error("failed to finalize export at {path}: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExportError {
    /// Pipeline stage name, used for log context on failed jobs
    pub fn stage(&self) -> &'static str {
        match self {
            ExportError::InvalidRequest(_) => "validate",
            ExportError::ProcessLaunch { .. } => "launch",
            ExportError::Transcode { .. } => "transcode",
            ExportError::Timeout(_) => "timeout",
            ExportError::Finalize { .. } => "finalize",
        }
    }
}
