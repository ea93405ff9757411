//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::{ClientError, ClientResult};

/// Default backend address used when none is configured.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
/// Default HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default location of the durable client state file.
pub const DEFAULT_STATE_FILE: &str = ".intrix/state.json";

/// Settings needed to talk to the analysis backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL.
    pub base_url: Url,
    /// Identity of the user the session acts for.
    pub user_id: String,
    /// Optional token forwarded in the `auth-token` header.
    pub auth_token: Option<String>,
    /// Per-request timeout enforced by the HTTP client.
    pub timeout: Duration,
    /// Request identifier attached to every call as `x-request-id`.
    pub request_id: Option<String>,
    /// Durable state file holding the download cooldown.
    pub state_path: PathBuf,
    /// Directory receiving downloaded archives and reports.
    pub download_dir: PathBuf,
}

impl ClientConfig {
    /// Configuration with defaults for everything except identity and address.
    #[must_use]
    pub fn new(base_url: Url, user_id: impl Into<String>) -> Self {
        Self {
            base_url,
            user_id: user_id.into(),
            auth_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            request_id: None,
            state_path: PathBuf::from(DEFAULT_STATE_FILE),
            download_dir: PathBuf::from("."),
        }
    }

    /// Check the invariants the rest of the client relies on.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidConfig`] or [`ClientError::BaseUrl`] when a
    /// field is unusable.
    pub fn validate(&self) -> ClientResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(ClientError::InvalidConfig {
                field: "user_id",
                reason: "must not be empty",
            });
        }
        if self.base_url.cannot_be_a_base() {
            return Err(ClientError::BaseUrl {
                url: self.base_url.to_string(),
            });
        }
        if !matches!(self.base_url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfig {
                field: "base_url",
                reason: "scheme must be http or https",
            });
        }
        if self.timeout.is_zero() {
            return Err(ClientError::InvalidConfig {
                field: "timeout",
                reason: "must be greater than zero",
            });
        }
        if self
            .auth_token
            .as_deref()
            .is_some_and(|token| token.trim().is_empty())
        {
            return Err(ClientError::InvalidConfig {
                field: "auth_token",
                reason: "must not be blank when provided",
            });
        }
        Ok(())
    }

    /// File name used when saving the favorites archive.
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("favorite_reports_{}.zip", self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn validate_rejects_unusable_fields() -> Result<()> {
        let base: Url = DEFAULT_API_URL.parse()?;
        assert!(ClientConfig::new(base.clone(), "user1").validate().is_ok());

        let err = ClientConfig::new(base.clone(), "  ")
            .validate()
            .expect_err("blank user");
        assert!(matches!(err, ClientError::InvalidConfig { field: "user_id", .. }));

        let err = ClientConfig::new("ftp://example.com".parse()?, "user1")
            .validate()
            .expect_err("ftp scheme");
        assert!(matches!(err, ClientError::InvalidConfig { field: "base_url", .. }));

        let err = ClientConfig::new("mailto:ops@example.com".parse()?, "user1")
            .validate()
            .expect_err("opaque url");
        assert!(matches!(err, ClientError::BaseUrl { .. }));

        let mut config = ClientConfig::new(base, "user1");
        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        Ok(())
    }

    #[test]
    fn archive_name_embeds_user() -> Result<()> {
        let config = ClientConfig::new(DEFAULT_API_URL.parse()?, "user1");
        assert_eq!(config.archive_name(), "favorite_reports_user1.zip");
        Ok(())
    }
}
