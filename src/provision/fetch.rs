//! Artifact download
//!
//! Ensures the weights file exists at its destination, streaming it from the
//! configured URL only when absent. Failures are reported as values, never
//! raised past this boundary: a network hiccup during boot must degrade the
//! service, not crash it.

use std::fs;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

/// Result of one artifact-acquisition attempt
#[derive(Debug)]
pub enum FetchOutcome {
    /// A non-empty file was already at the destination; no network call made
    AlreadyPresent(PathBuf),
    /// The artifact was downloaded to the destination (realized path, bytes)
    Downloaded(PathBuf, u64),
    /// The artifact could not be obtained
    Failed(String),
}

/// Make sure the artifact exists at `dest`, downloading it when absent.
///
/// The progress callback receives `(downloaded, total)` per chunk whenever
/// the server reports a content length; with an unknown length the download
/// still proceeds, just without progress events.
pub async fn ensure(
    dest: &Path,
    url: &str,
    progress_callback: impl Fn(u64, u64) + Send,
) -> FetchOutcome {
    if is_present(dest) {
        tracing::info!("Model already exists: {}", dest.display());
        return FetchOutcome::AlreadyPresent(dest.to_path_buf());
    }

    match download(dest, url, progress_callback).await {
        Ok(bytes) => FetchOutcome::Downloaded(dest.to_path_buf(), bytes),
        Err(reason) => FetchOutcome::Failed(reason),
    }
}

/// An existing file counts only when non-empty; a zero-length leftover from
/// an interrupted run is treated as absent and re-fetched.
fn is_present(dest: &Path) -> bool {
    dest.is_file() && fs::metadata(dest).map(|m| m.len() > 0).unwrap_or(false)
}

async fn download(
    dest: &Path,
    url: &str,
    progress_callback: impl Fn(u64, u64) + Send,
) -> Result<u64, String> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }

    tracing::info!("Downloading model from: {}", url);
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(3600)) // 1 hour timeout for large models
        .build()
        .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

    let response = client
        .get(url)
        .header("User-Agent", concat!("modelgate/", env!("CARGO_PKG_VERSION")))
        .send()
        .await
        .map_err(|e| format!("Download failed: {}", e))?;

    if !response.status().is_success() {
        return Err(format!("Download failed with status: {}", response.status()));
    }

    let total_size = response.content_length();
    match total_size {
        Some(total) => {
            tracing::info!("File size: {} ({} bytes)", format_size(total), total)
        }
        None => tracing::info!("File size unknown, downloading without progress"),
    }

    // Stream to a sibling .tmp file; the final path only ever holds a
    // complete artifact.
    let tmp_path = tmp_sibling(dest);
    let mut tmp_file = File::create(&tmp_path)
        .await
        .map_err(|e| format!("Failed to create temp file: {}", e))?;

    let mut response = response;
    let mut downloaded: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| cleanup_on(&tmp_path, format!("Download error: {}", e)))?
    {
        tmp_file
            .write_all(&chunk)
            .await
            .map_err(|e| cleanup_on(&tmp_path, format!("Write error: {}", e)))?;
        downloaded += chunk.len() as u64;
        if let Some(total) = total_size {
            progress_callback(downloaded, total);
        }
    }
    tmp_file
        .flush()
        .await
        .map_err(|e| cleanup_on(&tmp_path, format!("Write error: {}", e)))?;
    drop(tmp_file);

    if let Some(total) = total_size {
        if downloaded != total {
            return Err(cleanup_on(
                &tmp_path,
                format!("Download incomplete: got {} bytes, expected {}", downloaded, total),
            ));
        }
    }

    fs::rename(&tmp_path, dest)
        .map_err(|e| cleanup_on(&tmp_path, format!("Failed to move downloaded file: {}", e)))?;

    tracing::info!("Download complete: {}", dest.display());
    Ok(downloaded)
}

fn tmp_sibling(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    dest.with_file_name(format!("{}.tmp", name))
}

/// Best-effort removal of the partial temp file, passing the reason through
fn cleanup_on(tmp_path: &Path, reason: String) -> String {
    let _ = fs::remove_file(tmp_path);
    reason
}

/// Get a human-readable size string
pub fn format_size(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes as u64)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.2} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.2} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}
