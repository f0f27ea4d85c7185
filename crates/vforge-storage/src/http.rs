//! Plain HTTP retrieval.

use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::error::{StorageError, StorageResult};

/// Timeout for every network operation.
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP client shared by a store: fixed timeout, cookie jar for the
/// Google Drive confirmation flow.
pub fn build_http_client() -> StorageResult<Client> {
    Client::builder()
        .timeout(NETWORK_TIMEOUT)
        .connect_timeout(Duration::from_secs(30))
        .cookie_store(true)
        .user_agent(concat!("vforge-storage/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(StorageError::Http)
}

/// Parse a reference and percent-encode any characters that need it
/// (spaces, non-ASCII path segments).
pub fn requote(reference: &str) -> StorageResult<Url> {
    let url = Url::parse(reference.trim())
        .map_err(|e| StorageError::InvalidReference(format!("{}: {}", reference, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(StorageError::InvalidReference(format!(
            "unsupported scheme '{}' in {}",
            other, reference
        ))),
    }
}

/// Download `reference` with a GET request, streaming into `dest`.
pub async fn download_http(client: &Client, reference: &str, dest: &Path) -> StorageResult<u64> {
    let url = requote(reference)?;
    debug!("Downloading {} to {}", url, dest.display());

    let response = client.get(url.clone()).send().await?;
    let response = check_status(response, url.as_str())?;
    if is_html(&response) {
        return Err(StorageError::HtmlResponse(url.to_string()));
    }
    let written = stream_to_file(response, dest).await?;

    info!(bytes = written, "Downloaded {} to {}", url, dest.display());
    Ok(written)
}

pub(crate) fn check_status(response: Response, reference: &str) -> StorageResult<Response> {
    match response.status() {
        StatusCode::NOT_FOUND => Err(StorageError::not_found(reference)),
        status if !status.is_success() => Err(StorageError::download_failed(format!(
            "{} returned HTTP {}",
            reference, status
        ))),
        _ => Ok(response),
    }
}

/// Stream a response body into `dest`. An empty body, or one that turns out
/// to be an HTML page, is an error and leaves no file behind.
pub(crate) async fn stream_to_file(response: Response, dest: &Path) -> StorageResult<u64> {
    let reference = response.url().to_string();

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if written == 0 && looks_like_html(&chunk) {
            drop(file);
            tokio::fs::remove_file(dest).await.ok();
            return Err(StorageError::HtmlResponse(reference));
        }
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    if written == 0 {
        drop(file);
        tokio::fs::remove_file(dest).await.ok();
        return Err(StorageError::EmptyDownload(reference));
    }
    Ok(written)
}

/// Whether the start of a body is an HTML document.
pub(crate) fn looks_like_html(head: &[u8]) -> bool {
    let start = head
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(head.len());
    let head = &head[start..head.len().min(start + 16)];
    let lower = head.to_ascii_lowercase();
    lower.starts_with(b"<!doctype html") || lower.starts_with(b"<html")
}

/// Whether a response advertises an HTML body.
pub(crate) fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_ascii_lowercase().contains("text/html"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requote_encodes_spaces() {
        let url = requote("https://cdn.example.com/media/my clip.mp4").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/media/my%20clip.mp4");
    }

    #[test]
    fn test_requote_keeps_encoded_references() {
        let url = requote("https://cdn.example.com/a%20b.mp4?x=1").unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/a%20b.mp4?x=1");
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html(b"<!DOCTYPE html><html>"));
        assert!(looks_like_html(b"\n  <HTML lang=en>"));
        assert!(!looks_like_html(b"\x00\x00\x00\x20ftypisom"));
        assert!(!looks_like_html(b"ID3\x04"));
        assert!(!looks_like_html(b""));
    }

    #[test]
    fn test_requote_rejects_non_http() {
        assert!(matches!(
            requote("file:///etc/passwd"),
            Err(StorageError::InvalidReference(_))
        ));
        assert!(requote("not a url").is_err());
    }
}
