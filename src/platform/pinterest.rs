use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::debug;

use super::classifier::pinterest_pin_id;
use super::{
    fetch_page, resolve_redirects, run_strategies, Platform, PlatformResolver, ResolvedMedia,
    Strategy,
};
use crate::error::MediaError;

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<script[^>]*>([^<]*)</script>").unwrap());
static IMAGES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\{[^}]*"images"[^}]*\}"#).unwrap());
static MEDIA_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""url":\s*"([^"]+\.(?:jpg|jpeg|png|mp4|webm)[^"]*)""#).unwrap()
});
static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#""title":\s*"([^"]*)""#).unwrap());
static OG_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<meta property="og:image" content="([^"]+)""#).unwrap());

const STRATEGIES: [Strategy; 2] = [pin_script, og_image];

pub struct PinterestResolver {
    client: Client,
}

impl PinterestResolver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl PlatformResolver for PinterestResolver {
    fn platform(&self) -> Platform {
        Platform::Pinterest
    }

    async fn resolve(&self, url: &str) -> Result<ResolvedMedia, MediaError> {
        let url = if url.contains("pin.it") {
            resolve_redirects(&self.client, url).await?
        } else {
            url.to_owned()
        };
        let pin_id = pinterest_pin_id(&url).ok_or(MediaError::InvalidUrl("pin ID"))?;
        debug!(url = %url, pin_id, "fetching pinterest pin");

        let page = fetch_page(&self.client, &url, browser_headers()).await?;
        run_strategies(&STRATEGIES, &page, pin_id, "media data in Pinterest page")
    }
}

/// Pinterest serves a stripped page to clients that do not look like a browser
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers
}

fn pin_script(page: &str, pin_id: &str) -> Result<Option<ResolvedMedia>, MediaError> {
    let media = SCRIPT_RE
        .captures_iter(page)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|script| script.contains("pinterestapp:pins") || script.contains("\"Pin\""))
        .filter(|script| IMAGES_RE.is_match(script))
        .find_map(|script| {
            let media_url = MEDIA_URL_RE.captures(script)?.get(1)?.as_str();
            let title = TITLE_RE
                .captures(script)
                .and_then(|cap| cap.get(1))
                .map(|m| m.as_str());

            let lower = media_url.to_lowercase();
            let is_video = lower.contains(".mp4") || lower.contains(".webm");
            Some(
                ResolvedMedia::new(Platform::Pinterest, pin_id, media_url, is_video)
                    .with_title(title),
            )
        });
    Ok(media)
}

fn og_image(page: &str, pin_id: &str) -> Result<Option<ResolvedMedia>, MediaError> {
    Ok(OG_IMAGE_RE
        .captures(page)
        .and_then(|cap| cap.get(1))
        .map(|m| ResolvedMedia::new(Platform::Pinterest, pin_id, m.as_str(), false)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::fixture_server::{client, serve, Route};

    fn extract(page: &str) -> Result<ResolvedMedia, MediaError> {
        run_strategies(&STRATEGIES, page, "123", "media")
    }

    #[test]
    fn script_image_with_title() {
        let page = r#"<html><script type="application/json">{"type":"Pin","images":{"orig":1}, "url": "https:\/\/i.pinimg.com\/originals\/ab\/cd.png", "title": "Blue kitchen"}</script></html>"#;
        let media = extract(page).unwrap();
        assert_eq!("https://i.pinimg.com/originals/ab/cd.png", media.media_url);
        assert!(!media.is_video);
        assert_eq!(Some("Blue kitchen".to_owned()), media.title);
        assert_eq!("png", media.extension());
    }

    #[test]
    fn script_video() {
        let page = r#"<script>pinterestapp:pins {"images":"x"} "url":"https://v.pinimg.com/videos/mc/hls/1.mp4"</script>"#;
        let media = extract(page).unwrap();
        assert!(media.is_video);
        assert_eq!(None, media.title);
    }

    #[test]
    fn unmarked_scripts_are_skipped() {
        let page = r#"<script>{"images":1} "url": "https://i.pinimg.com/a.jpg"</script><meta property="og:image" content="https://i.pinimg.com/og.jpg">"#;
        let media = extract(page).unwrap();
        assert_eq!("https://i.pinimg.com/og.jpg", media.media_url);
        assert_eq!(None, media.title);
        assert!(!media.is_video);
    }

    #[test]
    fn nothing_found() {
        assert!(matches!(
            extract("<html><script>var x = 1;</script></html>"),
            Err(MediaError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resolves_pin_page() {
        let page = r#"<meta property="og:image" content="https://i.pinimg.com/og.jpg">"#;
        let server = serve(vec![Route::ok("/pin/123/", page)]).await;
        let resolver = PinterestResolver::new(client());

        let media = resolver.resolve(&server.url("/pin/123/")).await.unwrap();
        assert_eq!("123", media.external_id);
        assert_eq!("https://i.pinimg.com/og.jpg", media.media_url);
    }

    #[tokio::test]
    async fn missing_pin_id() {
        let server = serve(vec![]).await;
        let resolver = PinterestResolver::new(client());
        let err = resolver.resolve(&server.url("/someone/")).await.unwrap_err();
        assert!(matches!(err, MediaError::InvalidUrl(_)));
        assert_eq!(0, server.hits());
    }

    #[tokio::test]
    async fn expands_short_link() {
        let page = r#"<meta property="og:image" content="https://i.pinimg.com/og.jpg">"#;
        let server = serve(vec![
            Route::redirect("/pin.it/4xYz", "/pin/987/"),
            Route::ok("/pin/987/", page),
        ])
        .await;
        let resolver = PinterestResolver::new(client());

        let media = resolver.resolve(&server.url("/pin.it/4xYz")).await.unwrap();
        assert_eq!("987", media.external_id);
        assert_eq!("https://i.pinimg.com/og.jpg", media.media_url);
    }

    /// zlib stream holding `data` in a single stored block
    fn zlib_stored(data: &[u8]) -> Vec<u8> {
        let len = data.len() as u16;
        let mut out = vec![0x78, 0x01, 0x01];
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(data);
        let (mut a, mut b) = (1u32, 0u32);
        for byte in data {
            a = (a + *byte as u32) % 65521;
            b = (b + a) % 65521;
        }
        out.extend_from_slice(&((b << 16) | a).to_be_bytes());
        out
    }

    #[tokio::test]
    async fn decodes_deflate_page() {
        let page = br#"<meta property="og:image" content="https://i.pinimg.com/og.jpg">"#;
        let route = Route::ok("/pin/123/", zlib_stored(page))
            .with_header("Content-Encoding", "deflate");
        let server = serve(vec![route]).await;
        let resolver = PinterestResolver::new(client());

        let media = resolver.resolve(&server.url("/pin/123/")).await.unwrap();
        assert_eq!("https://i.pinimg.com/og.jpg", media.media_url);
    }
}
