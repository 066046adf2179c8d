use std::path::Path;
use crate::job::PlaybackMode;
use crate::playlist::PlaylistSource;

/// Standard input path handed to the concat demuxer for multi-chunk sources
const STDIN_PATH: &str = "/dev/stdin";

/// Transport schemes ffmpeg is allowed to open: the manifest pipe, local
/// files, and the HTTP VOD playlists with their underlying TCP segments
const PROTOCOL_WHITELIST: &str = "pipe,file,http,tcp";

/// Build the full ffmpeg argument vector for one export.
///
/// Input shape follows the playlist source (direct URL, or a concat manifest
/// read from stdin) and the output transform follows the playback mode.
/// The temp path is always the last argument; the final path never appears
/// in the command, it only ever comes into existence through the finalize
/// rename.
pub fn build_export_command(
    source: &PlaylistSource,
    playback_mode: PlaybackMode,
    temp_path: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-y".to_string(),
        "-protocol_whitelist".to_string(),
        PROTOCOL_WHITELIST.to_string(),
    ];

    match source {
        PlaylistSource::Single(url) => {
            args.push("-i".to_string());
            args.push(url.clone());
        }
        PlaylistSource::Concat(_) => {
            args.push("-f".to_string());
            args.push("concat".to_string());
            args.push("-safe".to_string());
            args.push("0".to_string());
            args.push("-i".to_string());
            args.push(STDIN_PATH.to_string());
        }
    }

    match playback_mode {
        PlaybackMode::Realtime => {
            args.push("-c".to_string());
            args.push("copy".to_string());
        }
        PlaybackMode::Timelapse25x => {
            args.push("-vf".to_string());
            args.push("setpts=0.04*PTS".to_string());
            args.push("-r".to_string());
            args.push("30".to_string());
            args.push("-an".to_string());
        }
    }

    args.push(temp_path.to_string_lossy().to_string());
    args
}
