//! Per-job object store overrides.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Object store settings supplied with a single job.
///
/// Every field is optional; unset fields fall back to the worker's
/// environment defaults.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct S3Overrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl fmt::Debug for S3Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("S3Overrides")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key", &redact(&self.access_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("bucket_name", &self.bucket_name)
            .field("region", &self.region)
            .finish()
    }
}

impl S3Overrides {
    /// Whether no field is overridden.
    pub fn is_empty(&self) -> bool {
        self.endpoint_url.is_none()
            && self.access_key.is_none()
            && self.secret_key.is_none()
            && self.bucket_name.is_none()
            && self.region.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_job_credentials() {
        let overrides = S3Overrides {
            access_key: Some("job-access".to_string()),
            secret_key: Some("job-secret".to_string()),
            bucket_name: Some("clips".to_string()),
            ..Default::default()
        };
        let printed = format!("{:?}", overrides);
        assert!(!printed.contains("job-access"));
        assert!(!printed.contains("job-secret"));
        assert!(printed.contains("clips"));
    }
}
