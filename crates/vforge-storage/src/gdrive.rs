//! Google Drive share-link retrieval.
//!
//! Share links are rewritten to direct download links. Files too large for
//! Drive's virus scan are served behind an HTML interstitial; the
//! confirmation is taken from the page's `uuid`/`id` form fields, or from a
//! `download_warning` cookie on older responses.

use regex::Regex;
use reqwest::header::SET_COOKIE;
use reqwest::{Client, Response};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

use crate::error::{StorageError, StorageResult};
use crate::http::{check_status, is_html, requote, stream_to_file};

/// Base of the confirmed-download endpoint.
pub const CONFIRM_BASE: &str = "https://drive.usercontent.google.com/download";

static FILE_PATH_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/file/d/([A-Za-z0-9_-]+)").unwrap());
static FORM_UUID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="uuid"\s+value="([^"]+)""#).unwrap());
static FORM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="id"\s+value="([^"]+)""#).unwrap());
static WARNING_COOKIE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^download_warning[^=]*=([^;]+)").unwrap());

/// Whether a reference is a Google Drive link.
pub fn is_google_drive(reference: &str) -> bool {
    Url::parse(reference.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case("drive.google.com")))
        .unwrap_or(false)
}

/// Extract the file ID from `/file/d/<id>/...` or `?id=<id>` links.
pub fn extract_file_id(reference: &str) -> Option<String> {
    if let Some(caps) = FILE_PATH_ID.captures(reference) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    Url::parse(reference.trim()).ok().and_then(|u| {
        u.query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned())
    })
}

/// Rewrite a share link to `uc?export=download&id=<id>`. Links that are
/// already direct, or carry no ID, are returned unchanged.
pub fn to_direct_url(reference: &str) -> String {
    if reference.contains("/uc?") {
        return reference.to_string();
    }
    match extract_file_id(reference) {
        Some(id) => format!("https://drive.google.com/uc?export=download&id={}", id),
        None => reference.to_string(),
    }
}

/// Confirmation fields found on the large-file interstitial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interstitial {
    pub file_id: String,
    pub uuid: String,
}

/// Parse the interstitial form. `fallback_id` is used when the form has
/// no `id` field.
pub fn parse_interstitial(html: &str, fallback_id: Option<&str>) -> Option<Interstitial> {
    let uuid = FORM_UUID.captures(html)?.get(1)?.as_str().to_string();
    let file_id = FORM_ID
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .or_else(|| fallback_id.map(str::to_string))?;
    Some(Interstitial { file_id, uuid })
}

/// Token from a `download_warning*` cookie.
fn warning_token(response: &Response) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            WARNING_COOKIE
                .captures(cookie)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// Downloads Google Drive files, following the large-file confirmation.
#[derive(Clone)]
pub struct DriveDownloader {
    http: Client,
    confirm_base: String,
}

impl DriveDownloader {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            confirm_base: CONFIRM_BASE.to_string(),
        }
    }

    /// Point confirmed downloads at another host.
    pub fn with_confirm_base(mut self, base: impl Into<String>) -> Self {
        self.confirm_base = base.into();
        self
    }

    /// Download a Drive link into `dest`. HTML bodies are never written.
    pub async fn download(&self, reference: &str, dest: &Path) -> StorageResult<u64> {
        let direct = to_direct_url(reference);
        let url = requote(&direct)?;
        debug!("Downloading Google Drive file from {}", url);

        let response = check_status(self.http.get(url.clone()).send().await?, url.as_str())?;

        let response = if is_html(&response) {
            info!("Large Google Drive file, resolving download confirmation");
            self.confirm(response, &direct).await?
        } else {
            response
        };

        if is_html(&response) {
            return Err(StorageError::HtmlResponse(format!(
                "{} (file may be private or restricted)",
                reference
            )));
        }

        let written = stream_to_file(response, dest).await?;
        info!(bytes = written, "Downloaded Google Drive file to {}", dest.display());
        Ok(written)
    }

    async fn confirm(&self, response: Response, direct: &str) -> StorageResult<Response> {
        let cookie_token = warning_token(&response);
        let page_url = response.url().to_string();
        let html = response.text().await?;
        let fallback_id = extract_file_id(direct).or_else(|| extract_file_id(&page_url));

        let confirm_url = if let Some(form) = parse_interstitial(&html, fallback_id.as_deref()) {
            format!(
                "{}?id={}&export=download&confirm=t&uuid={}",
                self.confirm_base,
                urlencoding::encode(&form.file_id),
                urlencoding::encode(&form.uuid)
            )
        } else if let Some(token) = cookie_token {
            let separator = if direct.contains('?') { '&' } else { '?' };
            format!("{}{}confirm={}", direct, separator, urlencoding::encode(&token))
        } else {
            return Err(StorageError::download_failed(
                "Could not extract confirmation token from Google Drive. File may be private or restricted.",
            ));
        };

        let response = self.http.get(&confirm_url).send().await?;
        check_status(response, &confirm_url)
    }
}
