use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

pub static CONFIG_FILE: &str = "config.toml";
pub static ENV_PREFIX: &str = "MEDIA_STASH_";

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Total timeout for a single HTTP call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_video_size")]
    pub max_video_size: u64,
    #[serde(default = "default_max_photo_size")]
    pub max_photo_size: u64,
    #[serde(default = "default_cleanup_max_age_hours")]
    pub cleanup_max_age_hours: u64,
    #[serde(default = "default_cleanup_interval_minutes")]
    pub cleanup_interval_minutes: u64,
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    /// Reject media whose advertised Content-Length is already over the limit
    #[serde(default)]
    pub precheck_content_length: bool,
}

fn default_download_dir() -> PathBuf {
    "downloads".into()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".into()
}

fn default_max_video_size() -> u64 {
    50 * MIB
}

fn default_max_photo_size() -> u64 {
    10 * MIB
}

fn default_cleanup_max_age_hours() -> u64 {
    24
}

fn default_cleanup_interval_minutes() -> u64 {
    60
}

fn default_ytdlp_path() -> String {
    "yt-dlp".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            max_video_size: default_max_video_size(),
            max_photo_size: default_max_photo_size(),
            cleanup_max_age_hours: default_cleanup_max_age_hours(),
            cleanup_interval_minutes: default_cleanup_interval_minutes(),
            ytdlp_path: default_ytdlp_path(),
            precheck_content_length: false,
        }
    }
}

impl Config {
    pub fn get_config() -> Result<Self> {
        Ok(Self::figment().extract()?)
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn cleanup_max_age(&self) -> Duration {
        Duration::from_secs(self.cleanup_max_age_hours * 60 * 60)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_minutes * 60)
    }

    pub fn size_limit(&self, is_video: bool) -> u64 {
        if is_video {
            self.max_video_size
        } else {
            self.max_photo_size
        }
    }
}
