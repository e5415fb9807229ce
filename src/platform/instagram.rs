use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::classifier::instagram_shortcode;
use super::{fetch_page, run_strategies, Platform, PlatformResolver, ResolvedMedia, Strategy};
use crate::error::MediaError;

static EMBED_BASE: &str = "https://www.instagram.com";

static ADDITIONAL_DATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"window\.__additionalDataLoaded\([^,]+,(\{.*?\})\);").unwrap());
static GRAPH_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""GraphImage"[^}]+display_url":"([^"]+)""#).unwrap());
static GRAPH_VIDEO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""GraphVideo"[^}]+video_url":"([^"]+)""#).unwrap());

const STRATEGIES: [Strategy; 3] = [additional_data, graph_image, graph_video];

#[derive(Debug, Deserialize)]
struct AdditionalData {
    graphql: Option<Graphql>,
}

#[derive(Debug, Deserialize)]
struct Graphql {
    shortcode_media: Option<ShortcodeMedia>,
}

#[derive(Debug, Deserialize)]
struct ShortcodeMedia {
    #[serde(default)]
    is_video: bool,
    video_url: Option<String>,
    display_url: Option<String>,
    edge_media_to_caption: Option<Edges>,
}

#[derive(Debug, Deserialize)]
struct Edges {
    #[serde(default)]
    edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: Node,
}

#[derive(Debug, Deserialize)]
struct Node {
    #[serde(default)]
    text: String,
}

pub struct InstagramResolver {
    client: Client,
    embed_base: String,
}

impl InstagramResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            embed_base: EMBED_BASE.to_owned(),
        }
    }
}

impl PlatformResolver for InstagramResolver {
    fn platform(&self) -> Platform {
        Platform::Instagram
    }

    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, MediaError> {
        let shortcode = instagram_shortcode(url).ok_or(MediaError::InvalidUrl("media shortcode"))?;

        // The embed page is much lighter than the post page and needs no login
        let embed_url = format!("{}/p/{}/embed/", self.embed_base, shortcode);
        debug!(url = %embed_url, shortcode, "fetching instagram embed");
        let page = fetch_page(&self.client, &embed_url, HeaderMap::new()).await?;

        run_strategies(&STRATEGIES, &page, shortcode, "media data in embed page")
    }
}

fn additional_data(page: &str, shortcode: &str) -> Result<Option<ResolvedMedia>, MediaError> {
    let Some(blob) = ADDITIONAL_DATA_RE.captures(page).and_then(|cap| cap.get(1)) else {
        return Ok(None);
    };
    let data: AdditionalData =
        serde_json::from_str(blob.as_str()).map_err(|_| MediaError::Parse("media data"))?;

    let Some(media) = data.graphql.and_then(|g| g.shortcode_media) else {
        return Ok(None);
    };
    let media_url = if media.is_video {
        media.video_url.as_deref()
    } else {
        media.display_url.as_deref()
    };
    let Some(media_url) = media_url else {
        return Ok(None);
    };

    let caption = media
        .edge_media_to_caption
        .as_ref()
        .and_then(|c| c.edges.first())
        .map(|e| e.node.text.as_str());

    Ok(Some(
        ResolvedMedia::new(Platform::Instagram, shortcode, media_url, media.is_video)
            .with_title(caption),
    ))
}

fn graph_image(page: &str, shortcode: &str) -> Result<Option<ResolvedMedia>, MediaError> {
    Ok(GRAPH_IMAGE_RE
        .captures(page)
        .and_then(|cap| cap.get(1))
        .map(|m| ResolvedMedia::new(Platform::Instagram, shortcode, m.as_str(), false)))
}

fn graph_video(page: &str, shortcode: &str) -> Result<Option<ResolvedMedia>, MediaError> {
    Ok(GRAPH_VIDEO_RE
        .captures(page)
        .and_then(|cap| cap.get(1))
        .map(|m| ResolvedMedia::new(Platform::Instagram, shortcode, m.as_str(), true)))
}
