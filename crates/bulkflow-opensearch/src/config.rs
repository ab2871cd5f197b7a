//! Writer configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Credentials for HTTP basic authentication.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for [`BulkWriter`](crate::BulkWriter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkWriterConfig {
    /// Cluster URL, e.g. `"https://localhost:9200"`.
    pub host: String,
    /// Target index; created with dynamic mappings if it does not exist.
    pub index: String,
    /// Optional basic auth credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<BasicAuth>,
    /// Skip TLS certificate verification.
    #[serde(default = "bool_true")]
    pub accept_invalid_certs: bool,
    /// Timeout for a single bulk request.
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,
}

fn bool_true() -> bool {
    true
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

impl BulkWriterConfig {
    pub fn new(host: impl Into<String>, index: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            index: index.into(),
            auth: None,
            accept_invalid_certs: true,
            request_timeout: default_request_timeout(),
        }
    }

    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(BasicAuth {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// URL of the `_bulk` endpoint.
    pub fn bulk_url(&self) -> String {
        format!("{}/_bulk", self.host.trim_end_matches('/'))
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_url_tolerates_trailing_slash() {
        assert_eq!(
            BulkWriterConfig::new("http://localhost:9200/", "x").bulk_url(),
            "http://localhost:9200/_bulk"
        );
        assert_eq!(
            BulkWriterConfig::new("http://localhost:9200", "x").bulk_url(),
            "http://localhost:9200/_bulk"
        );
    }

    #[test]
    fn debug_redacts_password() {
        let cfg = BulkWriterConfig::new("h", "i").with_basic_auth("admin", "s3cret");
        let printed = format!("{cfg:?}");
        assert!(printed.contains("admin"));
        assert!(!printed.contains("s3cret"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: BulkWriterConfig =
            serde_json::from_str(r#"{"host":"http://os:9200","index":"people"}"#).unwrap();
        assert!(cfg.accept_invalid_certs);
        assert_eq!(cfg.request_timeout, Duration::from_secs(60));
        assert!(cfg.auth.is_none());
    }
}
