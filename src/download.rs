use std::path::{Path, PathBuf};

use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::error::MediaError;

/// Write buffer size, the body is flushed to disk in chunks of this size
const CHUNK_SIZE: usize = 8 * 1024;
/// Leading bytes kept for content sniffing
const SNIFF_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
}

/// A download written to a hidden `.part` file in the download directory.
///
/// The file only gets its final name through [`StagedFile::persist`]. Dropping it, including when
/// the request future is dropped mid-transfer, deletes the part file and nothing else, so requests
/// for the same media never clobber each other's results.
#[derive(Debug)]
pub struct StagedFile {
    temp: TempPath,
    target: PathBuf,
    len: u64,
    head: Vec<u8>,
}

impl StagedFile {
    /// Final path once persisted
    pub fn path(&self) -> &Path {
        &self.target
    }

    pub fn set_file_name(&mut self, file_name: &str) {
        self.target.set_file_name(file_name);
    }

    /// Bytes written
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn head(&self) -> &[u8] {
        &self.head
    }

    /// Rename the part file to its final name, replacing an earlier download of the same media
    pub fn persist(self) -> Result<PathBuf, MediaError> {
        self.temp
            .persist(&self.target)
            .map_err(|e| MediaError::Io(e.error))?;
        Ok(self.target)
    }

    /// Delete the part file now
    pub fn discard(self) {
        let target = self.target;
        if let Err(e) = self.temp.close() {
            debug!(path = %target.display(), error = %e, "could not remove staged file");
        }
    }
}

/// Decide whether a body is a photo or a video.
///
/// An `image/*` or `video/*` Content-Type is trusted, text-like types are rejected, and anything
/// else (missing, `application/octet-stream`, ...) falls back to the leading bytes.
pub fn detect_media_type(content_type: Option<&str>, head: &[u8]) -> Option<MediaType> {
    let ct = content_type.unwrap_or_default().to_lowercase();
    if ct.starts_with("image/") {
        return Some(MediaType::Photo);
    }
    if ct.starts_with("video/") {
        return Some(MediaType::Video);
    }
    if ct.starts_with("text/") || ct.contains("html") || ct.contains("json") || ct.contains("xml") {
        return None;
    }
    sniff(head)
}

fn sniff(head: &[u8]) -> Option<MediaType> {
    const PHOTO_MAGIC: [&[u8]; 3] = [b"\xff\xd8\xff", b"\x89PNG\r\n\x1a\n", b"GIF8"];
    const WEBM_MAGIC: &[u8] = b"\x1a\x45\xdf\xa3";

    let webp = head.starts_with(b"RIFF") && head.get(8..12) == Some(&b"WEBP"[..]);
    if webp || PHOTO_MAGIC.iter().any(|magic| head.starts_with(magic)) {
        Some(MediaType::Photo)
    } else if head.get(4..8) == Some(&b"ftyp"[..]) || head.starts_with(WEBM_MAGIC) {
        Some(MediaType::Video)
    } else {
        None
    }
}

#[derive(Clone)]
pub struct Downloader {
    client: Client,
    download_dir: PathBuf,
    precheck_content_length: bool,
}

impl Downloader {
    pub fn new(client: Client, download_dir: PathBuf, precheck_content_length: bool) -> Self {
        Self {
            client,
            download_dir,
            precheck_content_length,
        }
    }

    /// Stream `media_url` into a staged `file_name` under the download directory and check that
    /// it is a photo or a video.
    ///
    /// `size_limit` is only consulted when Content-Length prechecking is enabled; the final size
    /// policy is the caller's.
    pub async fn fetch(
        &self,
        media_url: &str,
        file_name: &str,
        size_limit: u64,
    ) -> Result<(StagedFile, MediaType), MediaError> {
        let response = self.client.get(media_url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(MediaError::HttpStatus(response.status().as_u16()));
        }

        if self.precheck_content_length {
            if let Some(len) = response.content_length().filter(|len| *len > size_limit) {
                return Err(MediaError::SizeExceeded {
                    actual: len,
                    limit: size_limit,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let staged = write_stream(response.bytes_stream(), &self.download_dir, file_name).await?;
        let Some(media_type) = detect_media_type(content_type.as_deref(), staged.head()) else {
            return Err(MediaError::NotMedia(
                content_type.unwrap_or_else(|| "unknown type".into()),
            ));
        };

        info!(
            path = %staged.path().display(),
            bytes = staged.len(),
            ?media_type,
            "downloaded media"
        );
        Ok((staged, media_type))
    }
}

/// Drain a byte stream into a new part file for `file_name` in `dir`
pub(crate) async fn write_stream<S, B, E>(
    stream: S,
    dir: &Path,
    file_name: &str,
) -> Result<StagedFile, MediaError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    MediaError: From<E>,
{
    futures::pin_mut!(stream);
    let prefix = format!(".{}.", file_name);
    let (file, temp) = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".part")
        .tempfile_in(dir)?
        .into_parts();
    let mut staged = StagedFile {
        temp,
        target: dir.join(file_name),
        len: 0,
        head: Vec::with_capacity(SNIFF_LEN),
    };
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, File::from_std(file));

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        if staged.head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - staged.head.len()).min(chunk.len());
            staged.head.extend_from_slice(&chunk[..take]);
        }
        writer.write_all(chunk).await?;
        staged.len += chunk.len() as u64;
    }
    writer.flush().await?;
    writer.into_inner().sync_all().await?;

    Ok(staged)
}
