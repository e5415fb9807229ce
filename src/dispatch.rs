use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::download::Downloader;
use crate::error::MediaError;
use crate::platform::classifier::{classify, is_valid_url, normalize};
use crate::platform::{
    InstagramResolver, PinterestResolver, Platform, PlatformResolver, ResolvedMedia,
    TikTokResolver, YouTubeResolver,
};
use crate::storage::safe_filename;

pub use crate::download::MediaType;

/// Outcome of a single request, handed to the messaging layer.
///
/// Either `file_path` and `media_type` are set (success) or `error` is (failure), never a mix.
#[derive(Debug, Serialize)]
pub struct DownloadResult {
    success: bool,
    file_path: Option<PathBuf>,
    media_type: Option<MediaType>,
    title: Option<String>,
    error: Option<String>,
}

impl DownloadResult {
    pub fn success(file_path: PathBuf, media_type: MediaType, title: String) -> Self {
        Self {
            success: true,
            file_path: Some(file_path),
            media_type: Some(media_type),
            title: Some(title),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            file_path: None,
            media_type: None,
            title: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn media_type(&self) -> Option<MediaType> {
        self.media_type
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Registered resolvers, one variant per platform
pub enum Resolver {
    YouTube(YouTubeResolver),
    TikTok(TikTokResolver),
    Instagram(InstagramResolver),
    Pinterest(PinterestResolver),
}

impl PlatformResolver for Resolver {
    fn platform(&self) -> Platform {
        match self {
            Self::YouTube(r) => r.platform(),
            Self::TikTok(r) => r.platform(),
            Self::Instagram(r) => r.platform(),
            Self::Pinterest(r) => r.platform(),
        }
    }

    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, MediaError> {
        match self {
            Self::YouTube(r) => r.resolve(url).await,
            Self::TikTok(r) => r.resolve(url).await,
            Self::Instagram(r) => r.resolve(url).await,
            Self::Pinterest(r) => r.resolve(url).await,
        }
    }
}

pub struct Dispatcher {
    resolvers: Vec<Resolver>,
    downloader: Downloader,
    max_video_size: u64,
    max_photo_size: u64,
}

impl Dispatcher {
    pub fn new(client: Client, config: &Config) -> Self {
        let resolvers = vec![
            Resolver::YouTube(YouTubeResolver::new(
                config.ytdlp_path.clone(),
                config.request_timeout(),
            )),
            Resolver::TikTok(TikTokResolver::new(client.clone())),
            Resolver::Instagram(InstagramResolver::new(client.clone())),
            Resolver::Pinterest(PinterestResolver::new(client.clone())),
        ];
        let downloader = Downloader::new(
            client,
            config.download_dir.clone(),
            config.precheck_content_length,
        );
        Self {
            resolvers,
            downloader,
            max_video_size: config.size_limit(true),
            max_photo_size: config.size_limit(false),
        }
    }

    /// Resolve and download the media behind `raw_url`. Never fails, errors end up in the result.
    pub async fn handle(&self, raw_url: &str) -> DownloadResult {
        let raw_url = raw_url.trim();
        let Some(platform) = classify(raw_url) else {
            info!(url = raw_url, "unsupported platform");
            return DownloadResult::failure(MediaError::UnsupportedPlatform.to_string());
        };

        info!(url = raw_url, %platform, "handling request");
        match self.stage(platform, raw_url).await {
            Ok(result) => result,
            Err(e) if e.is_policy() => {
                warn!(url = raw_url, %platform, error = %e, "download rejected");
                DownloadResult::failure(e.to_string())
            }
            Err(e) => {
                warn!(url = raw_url, %platform, error = %e, "download failed");
                DownloadResult::failure(format!("{} download failed: {}", platform, e))
            }
        }
    }

    async fn stage(&self, platform: Platform, raw_url: &str) -> Result<DownloadResult, MediaError> {
        // YouTube keeps its video id in the query string
        let url = if platform == Platform::YouTube {
            raw_url.to_owned()
        } else {
            normalize(raw_url)
        };
        if !is_valid_url(&url) {
            return Err(MediaError::InvalidUrl("a host"));
        }

        let resolver = self
            .resolvers
            .iter()
            .find(|r| r.can_handle(&url))
            .ok_or(MediaError::UnsupportedPlatform)?;
        let media = resolver.resolve(&url).await?;
        self.download(media).await
    }

    /// Download resolved media and apply the size policy.
    ///
    /// The limit follows what the body turned out to be, not what the resolver expected.
    async fn download(&self, media: ResolvedMedia) -> Result<DownloadResult, MediaError> {
        let expected_limit = if media.is_video {
            self.max_video_size
        } else {
            self.max_photo_size
        };
        let file_name = safe_filename(&format!(
            "{}_{}.{}",
            media.platform.tag(),
            media.external_id,
            media.extension()
        ));

        let (mut staged, media_type) = self
            .downloader
            .fetch(&media.media_url, &file_name, expected_limit)
            .await?;
        let limit = match media_type {
            MediaType::Video => self.max_video_size,
            MediaType::Photo => self.max_photo_size,
        };
        if staged.len() > limit {
            let actual = staged.len();
            staged.discard();
            return Err(MediaError::SizeExceeded { actual, limit });
        }

        let is_video = media_type == MediaType::Video;
        if is_video != media.is_video {
            let extension = if is_video { "mp4" } else { "jpg" };
            let file_name = format!("{}_{}.{}", media.platform.tag(), media.external_id, extension);
            staged.set_file_name(&safe_filename(&file_name));
        }
        let title = media
            .title
            .unwrap_or_else(|| media.platform.default_title(is_video).into());
        Ok(DownloadResult::success(staged.persist()?, media_type, title))
    }
}
