pub mod classifier;
pub mod instagram;
pub mod pinterest;
pub mod tiktok;
pub mod youtube;

use std::fmt::Display;

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::MediaError;

pub use self::instagram::InstagramResolver;
pub use self::pinterest::PinterestResolver;
pub use self::tiktok::TikTokResolver;
pub use self::youtube::YouTubeResolver;

const TITLE_MAX_LEN: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    YouTube,
    TikTok,
    Instagram,
    Pinterest,
}

impl Platform {
    /// Lowercase tag used in file names
    pub fn tag(&self) -> &'static str {
        match self {
            Self::YouTube => "youtube",
            Self::TikTok => "tiktok",
            Self::Instagram => "instagram",
            Self::Pinterest => "pinterest",
        }
    }

    pub fn default_title(&self, is_video: bool) -> &'static str {
        match (self, is_video) {
            (Self::YouTube, _) => "YouTube Video",
            (Self::TikTok, _) => "TikTok Video",
            (Self::Instagram, true) => "Instagram Video",
            (Self::Instagram, false) => "Instagram Photo",
            (Self::Pinterest, _) => "Pinterest Media",
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::YouTube => write!(f, "YouTube"),
            Self::TikTok => write!(f, "TikTok"),
            Self::Instagram => write!(f, "Instagram"),
            Self::Pinterest => write!(f, "Pinterest"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub platform: Platform,
    pub external_id: String,
    pub media_url: String,
    pub is_video: bool,
    pub title: Option<String>,
}

impl ResolvedMedia {
    pub fn new(platform: Platform, external_id: &str, media_url: &str, is_video: bool) -> Self {
        Self {
            platform,
            external_id: external_id.to_owned(),
            media_url: unescape_url(media_url),
            is_video,
            title: None,
        }
    }

    pub fn with_title(mut self, title: Option<&str>) -> Self {
        self.title = title.and_then(truncate_title);
        self
    }

    /// File extension for the staged file
    pub fn extension(&self) -> &'static str {
        if self.is_video {
            return "mp4";
        }
        let url = self.media_url.to_lowercase();
        if url.contains(".png") {
            "png"
        } else if url.contains(".webp") {
            "webp"
        } else if url.contains(".gif") {
            "gif"
        } else {
            "jpg"
        }
    }
}

/// A page extraction strategy: page body and content id in, media out.
///
/// `Ok(None)` passes control to the next strategy, an error stops the chain.
pub type Strategy = fn(&str, &str) -> Result<Option<ResolvedMedia>, MediaError>;

/// Run strategies in order and take the first hit
pub fn run_strategies(
    strategies: &[Strategy],
    body: &str,
    id: &str,
    missing: &'static str,
) -> Result<ResolvedMedia, MediaError> {
    for strategy in strategies {
        if let Some(media) = strategy(body, id)? {
            return Ok(media);
        }
    }
    Err(MediaError::NotFound(missing))
}

#[allow(async_fn_in_trait)]
pub trait PlatformResolver {
    fn platform(&self) -> Platform;

    fn can_handle(&self, url: &str) -> bool {
        classifier::classify(url) == Some(self.platform())
    }

    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, MediaError>;
}

/// GET a page and return its body, anything but 200 is an error
pub(crate) async fn fetch_page(
    client: &Client,
    url: &str,
    headers: HeaderMap,
) -> Result<String, MediaError> {
    let response = client.get(url).headers(headers).send().await?;
    if response.status() != StatusCode::OK {
        return Err(MediaError::HttpStatus(response.status().as_u16()));
    }
    Ok(response.text().await?)
}

/// Follow redirects of a short link and return where it lands
pub(crate) async fn resolve_redirects(client: &Client, url: &str) -> Result<String, MediaError> {
    let response = client.get(url).send().await?;
    Ok(response.url().as_str().to_owned())
}

pub(crate) fn unescape_url(url: &str) -> String {
    url.replace("\\u0026", "&").replace("\\/", "/")
}

fn truncate_title(title: &str) -> Option<String> {
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    let mut graphemes = title.graphemes(true);
    let head: String = graphemes.by_ref().take(TITLE_MAX_LEN).collect();
    if graphemes.next().is_some() {
        Some(format!("{}...", head))
    } else {
        Some(head)
    }
}
