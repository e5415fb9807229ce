use std::{error::Error, fmt::Display};

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug)]
pub enum MediaError {
    InvalidUrl(&'static str),
    HttpStatus(u16),
    Timeout,
    Network(String),
    NotFound(&'static str),
    Parse(&'static str),
    SizeExceeded { actual: u64, limit: u64 },
    UnsupportedPlatform,
    Extractor(String),
    NotMedia(String),
    Io(std::io::Error),
}

impl MediaError {
    /// Errors whose message is shown as-is instead of being prefixed with the platform
    pub fn is_policy(&self) -> bool {
        matches!(self, Self::SizeExceeded { .. } | Self::UnsupportedPlatform)
    }
}

impl Display for MediaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl(what) => write!(f, "Could not extract {} from URL", what),
            Self::HttpStatus(status) => write!(f, "HTTP {}", status),
            Self::Timeout => write!(f, "Request timed out"),
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::NotFound(what) => write!(f, "Could not find {}", what),
            Self::Parse(what) => write!(f, "Failed to parse {}", what),
            Self::SizeExceeded { actual, .. } => {
                write!(f, "File too large ({:.1}MB)", *actual as f64 / MIB)
            }
            Self::UnsupportedPlatform => write!(f, "This platform is not supported yet"),
            Self::Extractor(msg) => write!(f, "Extractor failed: {}", msg),
            Self::NotMedia(content_type) => {
                write!(f, "Downloaded file is not a photo or video ({})", content_type)
            }
            Self::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for MediaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if let Some(status) = e.status() {
            Self::HttpStatus(status.as_u16())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<std::io::Error> for MediaError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
