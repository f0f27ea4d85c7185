//! Storage configuration.

use std::fmt;
use vforge_models::S3Overrides;

use crate::error::{StorageError, StorageResult};

/// Region used when neither the environment nor the job names one.
pub const DEFAULT_REGION: &str = "us-east-1";

const REDACTED: &str = "<redacted>";

/// Object store settings for one job.
///
/// Built from environment defaults, then narrowed by a job's
/// `s3_config`. Never shared mutably between jobs.
#[derive(Clone, Default, PartialEq)]
pub struct StorageConfig {
    /// S3 API endpoint, also the base of public URLs
    pub endpoint_url: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket_name: Option<String>,
    pub region: Option<String>,
}

/// Credentials are never printed; this value ends up in startup logs.
impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| REDACTED);
        f.debug_struct("StorageConfig")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key", &redact(&self.access_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .finish()
    }
}

impl StorageConfig {
    /// Read `S3_ENDPOINT_URL`, `S3_ACCESS_KEY`, `S3_SECRET_KEY`,
    /// `S3_BUCKET_NAME` and `S3_REGION`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            endpoint_url: var("S3_ENDPOINT_URL"),
            access_key: var("S3_ACCESS_KEY"),
            secret_key: var("S3_SECRET_KEY"),
            bucket_name: var("S3_BUCKET_NAME"),
            region: var("S3_REGION"),
        }
    }

    /// Copy of this config with every field the job sets replaced.
    pub fn with_overrides(&self, overrides: &S3Overrides) -> Self {
        let pick = |job: &Option<String>, default: &Option<String>| {
            job.clone()
                .filter(|v| !v.trim().is_empty())
                .or_else(|| default.clone())
        };
        Self {
            endpoint_url: pick(&overrides.endpoint_url, &self.endpoint_url),
            access_key: pick(&overrides.access_key, &self.access_key),
            secret_key: pick(&overrides.secret_key, &self.secret_key),
            bucket_name: pick(&overrides.bucket_name, &self.bucket_name),
            region: pick(&overrides.region, &self.region),
        }
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// Endpoint with any trailing slash removed.
    pub fn endpoint(&self) -> StorageResult<&str> {
        self.endpoint_url
            .as_deref()
            .map(|e| e.trim_end_matches('/'))
            .ok_or_else(|| StorageError::config_error("S3_ENDPOINT_URL not set"))
    }

    pub fn bucket(&self) -> StorageResult<&str> {
        self.bucket_name
            .as_deref()
            .ok_or_else(|| StorageError::config_error("S3_BUCKET_NAME not set"))
    }

    pub(crate) fn credentials(&self) -> StorageResult<(&str, &str)> {
        let access = self
            .access_key
            .as_deref()
            .ok_or_else(|| StorageError::config_error("S3_ACCESS_KEY not set"))?;
        let secret = self
            .secret_key
            .as_deref()
            .ok_or_else(|| StorageError::config_error("S3_SECRET_KEY not set"))?;
        Ok((access, secret))
    }

    /// Host and port of the configured endpoint, used to recognize
    /// references that point into this store.
    pub fn endpoint_authority(&self) -> Option<(String, u16)> {
        let url = url::Url::parse(self.endpoint_url.as_deref()?).ok()?;
        Some((url.host_str()?.to_ascii_lowercase(), url.port_or_known_default()?))
    }
}
