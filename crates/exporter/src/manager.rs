use std::path::PathBuf;
use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, error, info, warn};
use walkdir::WalkDir;
use crate::command::build_export_command;
use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::job::{self, ExportJob, ExportRequest, JobStatus};
use crate::playlist::build_playlist_source;
use crate::runner::{finalize_export, run_export_process};

/// Supervises export jobs: validates requests, persists job records, runs
/// the pipeline on the tokio runtime, and writes outcomes back to the
/// records so detached jobs stay observable.
pub struct ExportManager {
    cfg: ExportConfig,
}

impl ExportManager {
    pub fn new(cfg: ExportConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.cfg
    }

    /// Create the export and job state directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.cfg.export_dir).with_context(|| {
            format!("Failed to create export directory: {}", self.cfg.export_dir.display())
        })?;
        std::fs::create_dir_all(&self.cfg.job_state_dir).with_context(|| {
            format!("Failed to create job state directory: {}", self.cfg.job_state_dir.display())
        })?;
        Ok(())
    }

    /// Delete in-progress temp files left behind by a previous crashed run.
    /// Finished exports never carry the in_progress prefix, so they are safe.
    /// Returns the number of files removed.
    pub fn recover_on_startup(&self) -> Result<usize> {
        let mut cleaned_count = 0;

        if !self.cfg.export_dir.exists() {
            return Ok(0);
        }

        for entry in WalkDir::new(&self.cfg.export_dir)
            .max_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let is_stale = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("in_progress."))
                .unwrap_or(false);

            if is_stale {
                std::fs::remove_file(path).with_context(|| {
                    format!("Failed to delete stale in-progress export: {}", path.display())
                })?;
                info!("🗑️  Deleted stale in-progress export: {}", path.display());
                cleaned_count += 1;
            }
        }

        if cleaned_count > 0 {
            info!("Startup recovery complete: {} stale temp file(s) removed", cleaned_count);
        } else {
            debug!("Startup recovery complete: no stale temp files found");
        }

        Ok(cleaned_count)
    }

    /// Validate and start an export in the background. Returns the job id;
    /// the outcome lands on the persisted job record, never on the caller.
    pub fn submit(&self, request: ExportRequest) -> Result<String, ExportError> {
        request.validate()?;

        let job = ExportJob::new(request);
        persist(&job, &self.cfg);
        let id = job.id.clone();

        let cfg = self.cfg.clone();
        tokio::spawn(async move {
            execute_job(cfg, job).await;
        });

        Ok(id)
    }

    /// Validate and run an export to completion, returning the finished job
    /// record. Only validation errors are returned as Err; pipeline failures
    /// are recorded on the job.
    pub async fn run_to_completion(&self, request: ExportRequest) -> Result<ExportJob, ExportError> {
        request.validate()?;

        let job = ExportJob::new(request);
        persist(&job, &self.cfg);

        Ok(execute_job(self.cfg.clone(), job).await)
    }

    /// All known job records
    pub fn jobs(&self) -> Result<Vec<ExportJob>> {
        job::load_all_jobs(&self.cfg.job_state_dir)
    }
}

/// Run one job through the pipeline and record the outcome
async fn execute_job(cfg: ExportConfig, mut job: ExportJob) -> ExportJob {
    job.status = JobStatus::Running;
    job.started_at = Some(Utc::now());
    persist(&job, &cfg);

    info!(
        "Job {}: beginning export for {} from {} to {}",
        job.id, job.camera, job.start_time, job.end_time
    );

    match run_pipeline(&cfg, &job).await {
        Ok(final_path) => {
            info!("Job {}: ✅ export finished: {}", job.id, final_path.display());
            job.status = JobStatus::Complete;
            job.output_path = Some(final_path);
        }
        Err(e) => {
            error!(
                "Job {}: ❌ export failed for {} [{} - {}] at stage {}: {}",
                job.id, job.camera, job.start_time, job.end_time, e.stage(), e
            );
            if let ExportError::Transcode { stderr, .. } = &e {
                if !stderr.is_empty() {
                    error!("Job {}: ffmpeg stderr:\n{}", job.id, stderr);
                }
            }
            job.status = JobStatus::Failed;
            job.reason = Some(format!("{}: {}", e.stage(), e));
        }
    }

    job.finished_at = Some(Utc::now());
    persist(&job, &cfg);
    job
}

/// The export pipeline: naming, playlist construction, command construction,
/// execution, atomic finalize
async fn run_pipeline(cfg: &ExportConfig, job: &ExportJob) -> Result<PathBuf, ExportError> {
    let temp_path = job.temp_path(&cfg.export_dir);
    let final_path = job.final_path(&cfg.export_dir);

    let source = build_playlist_source(cfg, &job.camera, job.start_time, job.end_time);
    debug!("Job {}: export spans {} playlist chunk(s)", job.id, source.chunk_count());

    let args = build_export_command(&source, job.playback_mode, &temp_path);
    let manifest = source.manifest();

    run_export_process(cfg, &args, manifest.as_deref(), &temp_path).await?;

    debug!("Job {}: finalizing {}", job.id, temp_path.display());
    finalize_export(&temp_path, &final_path)?;

    Ok(final_path)
}

/// Job records are best-effort observability: a failed save must never take
/// the export down with it
fn persist(job: &ExportJob, cfg: &ExportConfig) {
    if let Err(e) = job::save_job(job, &cfg.job_state_dir) {
        warn!("Job {}: failed to save job record: {:#}", job.id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::PlaybackMode;
    use std::path::Path;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("recexport-manager-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_manager(dir: &Path, ffmpeg_bin: PathBuf) -> ExportManager {
        let cfg = ExportConfig {
            export_dir: dir.join("exports"),
            job_state_dir: dir.join("jobs"),
            ffmpeg_bin,
            ..ExportConfig::default()
        };
        let manager = ExportManager::new(cfg);
        manager.ensure_directories().unwrap();
        manager
    }

    fn request(camera: &str, start: i64, end: i64, mode: PlaybackMode) -> ExportRequest {
        ExportRequest {
            camera: camera.to_string(),
            start_time: start,
            end_time: end,
            playback_mode: mode,
        }
    }

    /// Stand-in for ffmpeg that creates its output (last argument) and exits 0
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-ffmpeg");
        std::fs::write(&script, "#!/bin/sh\nfor arg in \"$@\"; do out=\"$arg\"; done\n: > \"$out\"\n")
            .unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        script
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected_before_spawn() {
        let dir = scratch_dir();
        let manager = test_manager(&dir, PathBuf::from("/nonexistent/ffmpeg"));

        let err = manager
            .submit(request("front", 2000, 1000, PlaybackMode::Realtime))
            .unwrap_err();
        assert!(matches!(err, ExportError::InvalidRequest(_)));

        // No job record was created for the rejected request
        assert!(manager.jobs().unwrap().is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_export_finalizes_and_records_complete() {
        let dir = scratch_dir();
        let ffmpeg = fake_ffmpeg(&dir);
        let manager = test_manager(&dir, ffmpeg);

        let job = manager
            .run_to_completion(request("front", 1000, 2000, PlaybackMode::Realtime))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Complete);
        let final_path = job.output_path.clone().expect("complete job records its output path");
        assert!(final_path.exists());
        assert!(final_path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("front_"));
        assert!(!job.temp_path(&manager.config().export_dir).exists());

        // The persisted record matches the returned one
        let records = manager.jobs().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, JobStatus::Complete);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transcode_failure_records_failed_and_no_final_file() {
        let dir = scratch_dir();
        let manager = test_manager(&dir, PathBuf::from("false"));

        let job = manager
            .run_to_completion(request("back", 0, 60, PlaybackMode::Timelapse25x))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        let reason = job.reason.as_deref().unwrap();
        assert!(reason.starts_with("transcode:"), "unexpected reason: {}", reason);
        assert!(!job.final_path(&manager.config().export_dir).exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launch_failure_records_failed() {
        let dir = scratch_dir();
        let manager = test_manager(&dir, PathBuf::from("/nonexistent/ffmpeg-not-here"));

        let job = manager
            .run_to_completion(request("front", 0, 60, PlaybackMode::Realtime))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.reason.as_deref().unwrap().starts_with("launch:"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_finalize_failure_when_transcode_produced_nothing() {
        let dir = scratch_dir();
        // "true" exits 0 without creating the output, so the rename fails
        let manager = test_manager(&dir, PathBuf::from("true"));

        let job = manager
            .run_to_completion(request("front", 0, 60, PlaybackMode::Realtime))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.reason.as_deref().unwrap().starts_with("finalize:"));
        assert!(!job.final_path(&manager.config().export_dir).exists());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_submit_runs_detached_and_records_outcome() {
        let dir = scratch_dir();
        let ffmpeg = fake_ffmpeg(&dir);
        let manager = test_manager(&dir, ffmpeg);

        let id = manager
            .submit(request("side", 100, 200, PlaybackMode::Realtime))
            .unwrap();

        // Poll the job record until the detached task finishes
        let mut status = JobStatus::Pending;
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            let jobs = manager.jobs().unwrap();
            if let Some(job) = jobs.iter().find(|j| j.id == id) {
                status = job.status;
                if matches!(status, JobStatus::Complete | JobStatus::Failed) {
                    break;
                }
            }
        }
        assert_eq!(status, JobStatus::Complete);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_recover_on_startup_removes_only_in_progress_files() {
        let dir = scratch_dir();
        let export_dir = dir.join("exports");
        std::fs::create_dir_all(&export_dir).unwrap();

        let stale = export_dir.join("in_progress.front@a__b.abcd1234.mp4");
        let finished = export_dir.join("front_a__b.mp4");
        std::fs::write(&stale, b"partial").unwrap();
        std::fs::write(&finished, b"complete").unwrap();

        let cfg = ExportConfig {
            export_dir: export_dir.clone(),
            job_state_dir: dir.join("jobs"),
            ..ExportConfig::default()
        };
        let manager = ExportManager::new(cfg);

        let cleaned = manager.recover_on_startup().unwrap();
        assert_eq!(cleaned, 1);
        assert!(!stale.exists());
        assert!(finished.exists(), "finished exports must survive recovery");

        std::fs::remove_dir_all(&dir).ok();
    }
}
