//! S3 object store client.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use reqwest::Client as HttpClient;
use tracing::{debug, info};
use url::Url;

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::gdrive::{is_google_drive, DriveDownloader};
use crate::http::{build_http_client, download_http, NETWORK_TIMEOUT};

/// Where job inputs come from and where outputs go.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch `reference` into `dest`, returning the byte count. Empty
    /// downloads are errors.
    async fn download(&self, reference: &str, dest: &Path) -> StorageResult<u64>;

    /// Upload `path` under `key`, returning the object's public URL.
    async fn upload(&self, path: &Path, key: &str) -> StorageResult<String>;
}

/// Join an output prefix and a file name into an object key.
pub fn object_key(prefix: &str, filename: &str) -> String {
    let prefix = prefix.trim_start_matches('/');
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{}{}", prefix, filename)
    } else {
        format!("{}/{}", prefix, filename)
    }
}

fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mp3") => "audio/mpeg",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

/// S3-compatible object store.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    endpoint: String,
    endpoint_authority: Option<(String, u16)>,
    http: HttpClient,
    drive: DriveDownloader,
}

impl S3Store {
    /// Create a store for one job's configuration.
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        let endpoint = config.endpoint()?.to_string();
        let bucket = config.bucket()?.to_string();
        let (access_key, secret_key) = config.credentials()?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "vforge");

        let timeouts = aws_sdk_s3::config::timeout::TimeoutConfig::builder()
            .operation_timeout(NETWORK_TIMEOUT)
            .build();

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&endpoint)
            .region(Region::new(config.region().to_string()))
            .credentials_provider(credentials)
            .timeout_config(timeouts)
            .force_path_style(true)
            .build();

        let http = build_http_client()?;

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket,
            endpoint_authority: config.endpoint_authority(),
            endpoint,
            drive: DriveDownloader::new(http.clone()),
            http,
        })
    }

    /// Public URL of an object in this store.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }

    /// `(bucket, key)` when `reference` points into this store's endpoint.
    pub fn s3_location(&self, reference: &str) -> Option<(String, String)> {
        let (host, port) = self.endpoint_authority.as_ref()?;
        s3_location(host, *port, reference)
    }

    async fn download_object(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64> {
        debug!("Downloading s3://{}/{} to {}", bucket, key, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let message = format!("{:?}", e);
                if message.contains("NoSuchKey") {
                    StorageError::not_found(format!("{}/{}", bucket, key))
                } else {
                    StorageError::download_failed(format!("s3://{}/{}: {}", bucket, key, e))
                }
            })?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut reader = response.body.into_async_read();
        let mut file = tokio::fs::File::create(dest).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;

        if written == 0 {
            return Err(StorageError::EmptyDownload(format!("s3://{}/{}", bucket, key)));
        }
        Ok(written)
    }
}

/// Match a reference against an endpoint's host and port; the path's first
/// segment is the bucket and the remainder the (decoded) key.
fn s3_location(endpoint_host: &str, endpoint_port: u16, reference: &str) -> Option<(String, String)> {
    let url = Url::parse(reference.trim()).ok()?;
    if !url.host_str()?.eq_ignore_ascii_case(endpoint_host)
        || url.port_or_known_default()? != endpoint_port
    {
        return None;
    }

    let path = url.path().trim_start_matches('/');
    let (bucket, key) = path.split_once('/')?;
    if bucket.is_empty() || key.is_empty() {
        return None;
    }

    let key = urlencoding::decode(key).ok()?.into_owned();
    Some((bucket.to_string(), key))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn download(&self, reference: &str, dest: &Path) -> StorageResult<u64> {
        if is_google_drive(reference) {
            return self.drive.download(reference, dest).await;
        }
        if let Some((bucket, key)) = self.s3_location(reference) {
            return self.download_object(&bucket, &key, dest).await;
        }
        download_http(&self.http, reference, dest).await
    }

    async fn upload(&self, path: &Path, key: &str) -> StorageResult<String> {
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type_for(key))
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;

        let url = self.public_url(key);
        info!("Uploaded {} to {}", path.display(), url);
        Ok(url)
    }
}
