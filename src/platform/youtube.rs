use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use super::classifier::youtube_video_id;
use super::{Platform, PlatformResolver, ResolvedMedia};
use crate::error::MediaError;

#[derive(Debug, Deserialize)]
struct DumpedVideo {
    id: String,
    title: Option<String>,
    url: Option<String>,
}

/// Resolves YouTube links through an external yt-dlp binary
pub struct YouTubeResolver {
    ytdlp_path: String,
    timeout: Duration,
}

impl YouTubeResolver {
    /// `timeout` bounds the whole yt-dlp run, the child is killed when it expires
    pub fn new(ytdlp_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
            timeout,
        }
    }
}

impl PlatformResolver for YouTubeResolver {
    fn platform(&self) -> Platform {
        Platform::YouTube
    }

    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, MediaError> {
        debug!(url, ytdlp = %self.ytdlp_path, "querying yt-dlp");
        let run = Command::new(&self.ytdlp_path)
            .arg("--ignore-config")
            .arg("--dump-json")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .args(["-f", "best[ext=mp4]/best"])
            .arg(url)
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| MediaError::Timeout)?
            .map_err(|e| MediaError::Extractor(format!("could not run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MediaError::Extractor(stderr.trim().to_owned()));
        }

        parse_dump(&String::from_utf8_lossy(&output.stdout), youtube_video_id(url))
    }
}

fn parse_dump(stdout: &str, url_id: Option<&str>) -> Result<ResolvedMedia, MediaError> {
    let line = stdout.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
    let video: DumpedVideo =
        serde_json::from_str(line).map_err(|_| MediaError::Parse("yt-dlp output"))?;
    let media_url = video
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or(MediaError::NotFound("a downloadable format"))?;

    let id = url_id.unwrap_or(video.id.as_str());
    Ok(ResolvedMedia::new(Platform::YouTube, id, media_url, true)
        .with_title(video.title.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::fixture_server::executable;

    #[test]
    fn parses_dump() {
        let stdout = r#"{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","url":"https://rr1.googlevideo.com/videoplayback?itag=18","ext":"mp4"}
"#;
        let media = parse_dump(stdout, None).unwrap();
        assert_eq!("dQw4w9WgXcQ", media.external_id);
        assert_eq!(Some("Never Gonna Give You Up".to_owned()), media.title);
        assert!(media.is_video);
        assert_eq!("mp4", media.extension());
    }

    #[test]
    fn url_id_wins() {
        let stdout = r#"{"id":"other","url":"https://rr1.googlevideo.com/v"}"#;
        let media = parse_dump(stdout, Some("dQw4w9WgXcQ")).unwrap();
        assert_eq!("dQw4w9WgXcQ", media.external_id);
    }

    #[test]
    fn bad_output() {
        assert!(matches!(parse_dump("", None), Err(MediaError::Parse(_))));
        assert!(matches!(
            parse_dump(r#"{"id":"x"}"#, None),
            Err(MediaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_binary() {
        let resolver = YouTubeResolver::new("/nonexistent/yt-dlp", Duration::from_secs(5));
        let err = resolver
            .resolve("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Extractor(_)));
    }

    #[tokio::test]
    async fn stalled_extractor_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let ytdlp = executable(dir.path(), "yt-dlp", "sleep 30");
        let resolver = YouTubeResolver::new(ytdlp.to_str().unwrap(), Duration::from_millis(300));

        let started = std::time::Instant::now();
        let err = resolver
            .resolve("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Timeout));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn failing_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let ytdlp = executable(dir.path(), "yt-dlp", "echo 'ERROR: Video unavailable' >&2; exit 1");
        let resolver = YouTubeResolver::new(ytdlp.to_str().unwrap(), Duration::from_secs(5));

        let err = resolver
            .resolve("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap_err();
        assert_eq!("Extractor failed: ERROR: Video unavailable", err.to_string());
    }
}
