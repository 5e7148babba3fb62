// src/repository/client.rs

//! HTTP client for fetching published packages
//!
//! Downloads are conditional: when a local copy exists its modification time
//! is sent as `If-Modified-Since`, and a `304 Not Modified` keeps the local
//! file. A fresh download is streamed to a temp file beside the destination,
//! renamed into place, and stamped with the server's `Last-Modified` time so
//! the next run can skip it.

use crate::error::{Error, Result};
use crate::spk::archive::OUTPUT_MODE;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use reqwest::blocking::{Client, Response};
use reqwest::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use reqwest::StatusCode;
use std::fs;
use std::io::{BufWriter, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for HTTP requests (5 minutes, packages can be large)
const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Buffer size for streaming downloads (64 KB)
const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// HTTP date format (RFC 7231 IMF-fixdate)
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// What a conditional fetch did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New content written, with its byte count
    Downloaded(u64),
    /// Server reported the local copy as current
    NotModified,
}

/// HTTP client wrapper for package downloads
pub struct RepositoryClient {
    client: Client,
}

impl RepositoryClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::DownloadError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Fetch `url` into `dest` unless the local copy is already current
    pub fn fetch_if_modified(&self, url: &str, dest: &Path) -> Result<FetchOutcome> {
        let mut request = self.client.get(url);

        if let Some(since) = local_mtime(dest) {
            let since = since.format(HTTP_DATE_FORMAT).to_string();
            debug!("Requesting {} if modified since {}", url, since);
            request = request.header(IF_MODIFIED_SINCE, since);
        }

        let response = request
            .send()
            .map_err(|e| Error::DownloadError(format!("Failed to fetch {url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED && dest.exists() {
            info!("Not modified: {}", url);
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(Error::DownloadError(format!("HTTP {status} from {url}")));
        }

        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
            .map(|t| t.with_timezone(&Utc));

        info!("Downloading {} to {}", url, dest.display());
        let size = stream_to_file(response, dest)?;

        if let Some(time) = last_modified {
            let mtime = FileTime::from_unix_time(time.timestamp(), 0);
            filetime::set_file_mtime(dest, mtime).map_err(|e| {
                Error::IoError(format!("Failed to set mtime of {}: {}", dest.display(), e))
            })?;
        }

        Ok(FetchOutcome::Downloaded(size))
    }
}

/// Modification time of an existing file
fn local_mtime(path: &Path) -> Option<DateTime<Utc>> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Stream the response body into `dest` through a temp file
fn stream_to_file(mut response: Response, dest: &Path) -> Result<u64> {
    let parent = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .map_err(|e| Error::IoError(format!("Failed to create {}: {}", parent.display(), e)))?;

    let temp = tempfile::Builder::new()
        .prefix(".spkit-download-")
        .tempfile_in(parent)
        .map_err(|e| Error::IoError(format!("Failed to create temp file: {e}")))?;

    let mut writer = BufWriter::new(temp);
    let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];
    let mut downloaded: u64 = 0;

    loop {
        let n = response
            .read(&mut buffer)
            .map_err(|e| Error::DownloadError(format!("Failed to read response: {e}")))?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buffer[..n])
            .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;
        downloaded += n as u64;
    }

    let temp = writer
        .into_inner()
        .map_err(|e| Error::IoError(format!("Failed to flush download: {}", e.error())))?;
    fs::set_permissions(temp.path(), fs::Permissions::from_mode(OUTPUT_MODE))
        .map_err(|e| Error::IoError(format!("Failed to set permissions on download: {e}")))?;
    temp.persist(dest).map_err(|e| {
        Error::IoError(format!("Failed to move download to {}: {}", dest.display(), e.error))
    })?;

    Ok(downloaded)
}
