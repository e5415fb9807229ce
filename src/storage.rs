use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use time::OffsetDateTime;
use tracing::{debug, warn};

static UNSAFE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s.-]").unwrap());
static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-\s]+").unwrap());

const MAX_FILENAME_LEN: usize = 100;

/// Make a file name safe to create in the download directory
pub fn safe_filename(name: &str) -> String {
    let name = UNSAFE_RE.replace_all(name, "");
    let name = SEPARATOR_RE.replace_all(&name, "-").into_owned();

    if name.chars().count() <= MAX_FILENAME_LEN {
        return if name.is_empty() { "media".into() } else { name };
    }

    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name.as_str(), ""),
    };
    let stem: String = stem.chars().take(MAX_FILENAME_LEN - 5).collect();
    format!("{}{}", stem, ext)
}

/// Delete regular files in `dir` last modified more than `max_age` ago.
///
/// Returns the number of files removed. Errors on individual files are logged and skipped.
pub async fn sweep_old_files(dir: &Path, max_age: Duration) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let now = OffsetDateTime::now_utc();
    let max_age = time::Duration::try_from(max_age).unwrap_or(time::Duration::MAX);
    let mut removed = 0;

    while let Some(entry) = entries.next_entry().await? {
        let metadata = match entry.metadata().await {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if now - OffsetDateTime::from(modified) <= max_age {
            continue;
        }

        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed stale file");
                removed += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove stale file"),
        }
    }

    Ok(removed)
}
