use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::error::ExportError;

/// Output transform applied to the exported footage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackMode {
    /// Stream copy, original timing preserved
    Realtime,
    /// Re-encode at 25x speed: PTS scaled by 0.04, 30 fps output, audio dropped
    Timelapse25x,
}

/// A single export request: one camera, one time range, one playback mode
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRequest {
    pub camera: String,
    /// Unix seconds, inclusive start of the export window
    pub start_time: i64,
    /// Unix seconds, exclusive end of the export window
    pub end_time: i64,
    pub playback_mode: PlaybackMode,
}

impl ExportRequest {
    /// Reject malformed requests before any job record is created or any
    /// process is spawned
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.camera.is_empty() {
            return Err(ExportError::InvalidRequest("camera must not be empty".to_string()));
        }
        // Camera names flow into VOD URLs and the ASCII concat manifest
        if !self.camera.is_ascii() || self.camera.contains(char::is_whitespace) || self.camera.contains('/') {
            return Err(ExportError::InvalidRequest(format!(
                "camera name is not URL-safe: {:?}",
                self.camera
            )));
        }
        if self.end_time <= self.start_time {
            return Err(ExportError::InvalidRequest(format!(
                "end_time ({}) must be after start_time ({})",
                self.end_time, self.start_time
            )));
        }
        Ok(())
    }
}

/// Status of an export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

/// Persistent record of one export job.
///
/// Jobs run detached from their caller, so outcomes are written back here
/// (one JSON file per job under the job state directory) instead of being
/// returned. Transitions only ever move forward:
/// Pending -> Running -> Complete | Failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    pub id: String,
    pub camera: String,
    pub start_time: i64,
    pub end_time: i64,
    pub playback_mode: PlaybackMode,
    pub status: JobStatus,
    /// Failure detail for Failed jobs, prefixed with the pipeline stage
    pub reason: Option<String>,
    /// Final artifact path, set once the job is Complete
    pub output_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExportJob {
    pub fn new(request: ExportRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            camera: request.camera,
            start_time: request.start_time,
            end_time: request.end_time,
            playback_mode: request.playback_mode,
            status: JobStatus::Pending,
            reason: None,
            output_path: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Temp path the transcode writes to while running. Includes a short
    /// slice of the job id so two jobs with identical camera and labels
    /// never collide on the same in-progress file.
    pub fn temp_path(&self, export_dir: &Path) -> PathBuf {
        export_dir.join(format!(
            "in_progress.{}@{}__{}.{}.mp4",
            self.camera,
            timestamp_label(self.start_time),
            timestamp_label(self.end_time),
            self.id.get(..8).unwrap_or(&self.id),
        ))
    }

    /// Permanent artifact path. Only ever created by the finalize rename,
    /// so a file at this name is always complete.
    pub fn final_path(&self, export_dir: &Path) -> PathBuf {
        export_dir.join(format!(
            "{}_{}__{}.mp4",
            self.camera,
            timestamp_label(self.start_time),
            timestamp_label(self.end_time),
        ))
    }
}

/// Human-readable calendar-local label for a unix timestamp, minute granularity.
/// Falls back to the raw seconds for timestamps chrono cannot represent.
pub fn timestamp_label(timestamp: i64) -> String {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.format("%Y_%m_%d_%I:%M").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Save a job record to the state directory as {id}.json
pub fn save_job(job: &ExportJob, state_dir: &Path) -> Result<()> {
    let path = state_dir.join(format!("{}.json", job.id));
    let content = serde_json::to_string_pretty(job)
        .with_context(|| format!("Failed to serialize job: {}", job.id))?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write job file: {}", path.display()))?;
    Ok(())
}

/// Load all job records from the state directory, skipping unreadable files
pub fn load_all_jobs(state_dir: &Path) -> Result<Vec<ExportJob>> {
    let mut jobs = Vec::new();

    if !state_dir.exists() {
        return Ok(jobs);
    }

    let entries = std::fs::read_dir(state_dir)
        .with_context(|| format!("Failed to read job state directory: {}", state_dir.display()))?;

    for entry in entries {
        let entry = entry.with_context(|| "Failed to read job state entry")?;
        let path = entry.path();

        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to read job file {}: {}", path.display(), e);
                continue;
            }
        };

        match serde_json::from_str::<ExportJob>(&content) {
            Ok(job) => jobs.push(job),
            Err(e) => log::warn!("Failed to parse job file {}: {}", path.display(), e),
        }
    }

    Ok(jobs)
}
