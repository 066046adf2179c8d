use crate::config::ExportConfig;

/// Input source for the transcode: either one VOD playlist URL covering the
/// whole range, or an ordered chunk sequence joined through a concat manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistSource {
    Single(String),
    Concat(Vec<String>),
}

impl PlaylistSource {
    /// Concat manifest text fed to ffmpeg on stdin, one `file <url>` line per
    /// chunk in ascending time order. None for single-URL sources.
    pub fn manifest(&self) -> Option<String> {
        match self {
            PlaylistSource::Single(_) => None,
            PlaylistSource::Concat(urls) => Some(
                urls.iter()
                    .map(|url| format!("file {}", url))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
        }
    }

    pub fn chunk_count(&self) -> usize {
        match self {
            PlaylistSource::Single(_) => 1,
            PlaylistSource::Concat(urls) => urls.len(),
        }
    }
}

/// VOD playlist URL for one camera and half-open time window
pub fn vod_playlist_url(base_url: &str, camera: &str, start_time: i64, end_time: i64) -> String {
    format!(
        "{}/vod/{}/start/{}/end/{}/index.m3u8",
        base_url, camera, start_time, end_time
    )
}

/// Partition `[start_time, end_time)` into consecutive chunks of at most
/// `span` seconds, last chunk clipped to `end_time`. No gaps, no overlap,
/// ascending order.
pub fn chunk_ranges(start_time: i64, end_time: i64, span: i64) -> Vec<(i64, i64)> {
    // A non-positive span would never advance
    let span = span.max(1);
    let mut ranges = Vec::new();
    let mut chunk_start = start_time;

    while chunk_start < end_time {
        let chunk_end = (chunk_start + span).min(end_time);
        ranges.push((chunk_start, chunk_end));
        chunk_start += span;
    }

    ranges
}

/// Build the playlist source for an export range: one URL when the range fits
/// in a single playlist request, a chunked concat source otherwise
pub fn build_playlist_source(
    cfg: &ExportConfig,
    camera: &str,
    start_time: i64,
    end_time: i64,
) -> PlaylistSource {
    if end_time - start_time <= cfg.max_playlist_seconds {
        return PlaylistSource::Single(vod_playlist_url(
            &cfg.vod_base_url,
            camera,
            start_time,
            end_time,
        ));
    }

    let urls = chunk_ranges(start_time, end_time, cfg.max_playlist_seconds)
        .into_iter()
        .map(|(chunk_start, chunk_end)| {
            vod_playlist_url(&cfg.vod_base_url, camera, chunk_start, chunk_end)
        })
        .collect();

    PlaylistSource::Concat(urls)
}
