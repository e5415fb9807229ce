pub mod config;
pub mod dispatch;
pub mod download;
pub mod error;
pub mod platform;
pub mod storage;
mod util;

pub use dispatch::{Dispatcher, DownloadResult, MediaType};
pub use error::MediaError;
