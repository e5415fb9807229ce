use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use super::Platform;

static PINTEREST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"pinterest\.[a-z]+|pin\.it").unwrap());

static YOUTUBE_ID_RES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(
            r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)(?P<id>[a-zA-Z0-9_-]{11})",
        )
        .unwrap(),
        Regex::new(r"youtube\.com/shorts/(?P<id>[a-zA-Z0-9_-]{11})").unwrap(),
    ]
});
static TIKTOK_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/video/(?P<id>\d+)").unwrap());
static INSTAGRAM_CODE_RES: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"/p/(?P<id>[A-Za-z0-9_-]+)").unwrap(),
        Regex::new(r"/reel/(?P<id>[A-Za-z0-9_-]+)").unwrap(),
        Regex::new(r"/tv/(?P<id>[A-Za-z0-9_-]+)").unwrap(),
    ]
});
static PINTEREST_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/pin/(?P<id>\d+)").unwrap());

/// Map a URL to the platform hosting it.
///
/// Platforms are checked in a fixed order (YouTube, TikTok, Instagram, Pinterest) and the first
/// match wins. The domain patterns do not overlap so the order only matters for odd inputs that
/// mention several domains.
pub fn classify(url: &str) -> Option<Platform> {
    let url = url.to_lowercase();
    let contains_any = |domains: &[&str]| domains.iter().any(|d| url.contains(d));

    if contains_any(&["youtube.com", "youtu.be"]) {
        Some(Platform::YouTube)
    } else if contains_any(&["tiktok.com"]) {
        Some(Platform::TikTok)
    } else if contains_any(&["instagram.com", "instagr.am"]) {
        Some(Platform::Instagram)
    } else if PINTEREST_RE.is_match(&url) {
        Some(Platform::Pinterest)
    } else {
        None
    }
}

/// True if the input parses as a URL with both a scheme and a host
pub fn is_valid_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| !u.scheme().is_empty() && u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

/// Drop the query string and fragment, and force https
pub fn normalize(url: &str) -> String {
    let url = url.split('?').next().unwrap_or_default();
    let url = url.split('#').next().unwrap_or_default();

    if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{}", rest)
    } else if url.starts_with("https://") {
        url.to_owned()
    } else {
        format!("https://{}", url)
    }
}

fn first_capture<'a>(patterns: &[Regex], url: &'a str) -> Option<&'a str> {
    patterns
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|cap| cap.name("id"))
        .map(|id| id.as_str())
}

pub fn youtube_video_id(url: &str) -> Option<&str> {
    first_capture(&*YOUTUBE_ID_RES, url)
}

pub fn tiktok_video_id(url: &str) -> Option<&str> {
    first_capture(std::slice::from_ref(&*TIKTOK_ID_RE), url)
}

pub fn instagram_shortcode(url: &str) -> Option<&str> {
    first_capture(&*INSTAGRAM_CODE_RES, url)
}

pub fn pinterest_pin_id(url: &str) -> Option<&str> {
    first_capture(std::slice::from_ref(&*PINTEREST_ID_RE), url)
}
