use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::classifier::tiktok_video_id;
use super::{fetch_page, resolve_redirects, Platform, PlatformResolver, ResolvedMedia};
use crate::error::MediaError;

static STATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<script id="SIGI_STATE"[^>]*>(.*?)</script>"#).unwrap());

#[derive(Debug, Deserialize)]
struct SigiState {
    #[serde(rename = "ItemModule", default)]
    item_module: HashMap<String, Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    desc: Option<String>,
    #[serde(default)]
    video: Option<Video>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Video {
    download_addr: Option<String>,
    play_addr: Option<String>,
}

pub struct TikTokResolver {
    client: Client,
}

impl TikTokResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl PlatformResolver for TikTokResolver {
    fn platform(&self) -> Platform {
        Platform::TikTok
    }

    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, MediaError> {
        // Short links (vm./vt.) only carry the video id after redirecting
        let final_url = resolve_redirects(&self.client, url).await?;
        let video_id = tiktok_video_id(&final_url).ok_or(MediaError::InvalidUrl("video ID"))?;
        debug!(url = %final_url, video_id, "resolved tiktok url");

        let page = fetch_page(&self.client, &final_url, HeaderMap::new()).await?;
        extract_video(&page, video_id)
    }
}

/// Find the video in the page's embedded SIGI_STATE blob
fn extract_video(page: &str, video_id: &str) -> Result<ResolvedMedia, MediaError> {
    let blob = STATE_RE
        .captures(page)
        .and_then(|cap| cap.get(1))
        .ok_or(MediaError::NotFound("video data in page"))?;

    let state: SigiState =
        serde_json::from_str(blob.as_str()).map_err(|_| MediaError::Parse("video data"))?;
    let item = state
        .item_module
        .get(video_id)
        .ok_or(MediaError::NotFound("video data"))?;

    let media_url = item
        .video
        .as_ref()
        .and_then(|v| {
            v.download_addr
                .as_deref()
                .filter(|a| !a.is_empty())
                .or_else(|| v.play_addr.as_deref().filter(|a| !a.is_empty()))
        })
        .ok_or(MediaError::NotFound("video download URL"))?;

    Ok(ResolvedMedia::new(Platform::TikTok, video_id, media_url, true)
        .with_title(item.desc.as_deref()))
}
