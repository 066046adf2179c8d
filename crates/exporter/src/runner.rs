use std::path::Path;
use std::process::Stdio;
use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use crate::config::ExportConfig;
use crate::error::ExportError;

/// Run the transcode as a child process and wait for it to finish.
///
/// For multi-chunk exports the concat manifest is written to the child's
/// stdin and the pipe is closed; stderr is captured for failure diagnostics
/// and stdout is discarded. A configured timeout kills the child and removes
/// the temp file. On any other failure the temp file is left where it is.
pub async fn run_export_process(
    cfg: &ExportConfig,
    args: &[String],
    manifest: Option<&str>,
    temp_path: &Path,
) -> Result<(), ExportError> {
    debug!("Executing ffmpeg: {} {}", cfg.ffmpeg_bin.display(), args.join(" "));

    let mut cmd = Command::new(&cfg.ffmpeg_bin);
    cmd.args(args);
    cmd.stdin(if manifest.is_some() { Stdio::piped() } else { Stdio::null() });
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| ExportError::ProcessLaunch {
        bin: cfg.ffmpeg_bin.clone(),
        source,
    })?;

    if let Some(manifest) = manifest {
        if let Some(mut stdin) = child.stdin.take() {
            // Dropping the handle after the write closes the pipe and marks
            // the end of the manifest. A write error means ffmpeg already
            // exited; its exit status carries the real diagnosis.
            if let Err(e) = stdin.write_all(manifest.as_bytes()).await {
                warn!("Failed to write concat manifest to ffmpeg stdin: {}", e);
            }
        }
    }

    let stderr = child.stderr.take();
    let stderr_handle = tokio::spawn(async move {
        let mut lines = Vec::new();
        if let Some(stderr) = stderr {
            let reader = BufReader::new(stderr);
            let mut line_stream = reader.lines();
            while let Ok(Some(line)) = line_stream.next_line().await {
                lines.push(line);
            }
        }
        lines.join("\n")
    });

    let status = if cfg.timeout_secs > 0 {
        match timeout(Duration::from_secs(cfg.timeout_secs), child.wait()).await {
            Ok(result) => result.map_err(|source| ExportError::ProcessLaunch {
                bin: cfg.ffmpeg_bin.clone(),
                source,
            })?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out ffmpeg process: {}", e);
                }
                if temp_path.exists() {
                    if let Err(e) = std::fs::remove_file(temp_path) {
                        warn!(
                            "Failed to remove temp file after timeout {}: {}",
                            temp_path.display(),
                            e
                        );
                    }
                }
                return Err(ExportError::Timeout(cfg.timeout_secs));
            }
        }
    } else {
        child.wait().await.map_err(|source| ExportError::ProcessLaunch {
            bin: cfg.ffmpeg_bin.clone(),
            source,
        })?
    };

    let stderr = stderr_handle.await.unwrap_or_default();

    if !status.success() {
        return Err(ExportError::Transcode {
            exit_code: status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(())
}

/// Commit the finished artifact: atomically rename temp -> final within the
/// export directory. This is the only operation that ever creates the final
/// name, so a file at the final path is always a complete export.
pub fn finalize_export(temp_path: &Path, final_path: &Path) -> Result<(), ExportError> {
    std::fs::rename(temp_path, final_path).map_err(|source| ExportError::Finalize {
        path: final_path.to_path_buf(),
        source,
    })
}
