//! Shared client wiring, error types, and telemetry helpers for the CLI.

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use intrix_client::{
    AnalysisApi, AnalysisListSession, ClientConfig, ClientError, DirectorySink,
    FileCooldownStore, HttpAnalysisApi, SessionDeps, SystemClock,
};
use reqwest::Client;
use serde::Serialize;
use url::Url;

/// CLI-level error type to distinguish validation from operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::InvalidConfig { field, reason } => {
                Self::validation(format!("invalid {field}: {reason}"))
            }
            ClientError::BaseUrl { url } => {
                Self::validation(format!("API URL '{url}' cannot be used as a base"))
            }
            ClientError::ArchiveName { name } => {
                Self::validation(format!("refusing to write file named '{name}'"))
            }
            ClientError::Status {
                operation,
                status,
                message,
            } => {
                let detail = message.unwrap_or_else(|| "no error message".to_string());
                if matches!(status, 400 | 404 | 409 | 422) {
                    Self::validation(format!("{detail} (status {status})"))
                } else {
                    Self::failure(anyhow!("{operation} failed: {detail} (status {status})"))
                }
            }
            other => Self::failure(other),
        }
    }
}

/// Application context passed to command handlers.
#[derive(Clone)]
pub(crate) struct AppContext {
    pub(crate) config: ClientConfig,
    pub(crate) api: Arc<dyn AnalysisApi>,
}

impl AppContext {
    /// Validate `config` and build the HTTP-backed context.
    pub(crate) fn new(config: ClientConfig) -> CliResult<Self> {
        let api = HttpAnalysisApi::new(&config)?;
        Ok(Self {
            config,
            api: Arc::new(api),
        })
    }

    /// Collaborators for a session backed by the state file and download directory.
    pub(crate) fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            api: Arc::clone(&self.api),
            clock: Arc::new(SystemClock),
            cooldown_store: Arc::new(FileCooldownStore::new(&self.config.state_path)),
            sink: Arc::new(DirectorySink::new(&self.config.download_dir)),
            archive_name: self.config.archive_name(),
        }
    }

    /// Fresh, unmounted session.
    pub(crate) fn session(&self) -> AnalysisListSession {
        AnalysisListSession::new(&self.session_deps())
    }
}

/// Telemetry emitter used to forward CLI outcomes.
#[derive(Clone)]
pub(crate) struct TelemetryEmitter {
    pub(crate) client: Client,
    pub(crate) endpoint: Url,
}

impl TelemetryEmitter {
    #[must_use]
    pub(crate) fn from_env() -> Option<Self> {
        let endpoint = std::env::var("INTRIX_TELEMETRY_ENDPOINT").ok()?;
        let endpoint = endpoint.parse().ok()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .ok()?;
        Some(Self { client, endpoint })
    }

    pub(crate) async fn emit(
        &self,
        trace_id: &str,
        command: &str,
        outcome: &str,
        exit_code: i32,
        message: Option<&str>,
    ) {
        let event = TelemetryEvent {
            command,
            outcome,
            trace_id,
            exit_code,
            message,
            timestamp_ms: timestamp_now_ms(),
        };

        if let Err(err) = self
            .client
            .post(self.endpoint.clone())
            .json(&event)
            .send()
            .await
        {
            tracing::debug!(error = %err, "telemetry emit failed");
        }
    }
}

#[derive(Serialize)]
struct TelemetryEvent<'a> {
    command: &'a str,
    outcome: &'a str,
    trace_id: &'a str,
    exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    timestamp_ms: u64,
}

/// Parse the API URL provided to the CLI.
pub(crate) fn parse_url(input: &str) -> Result<Url, String> {
    input
        .parse::<Url>()
        .map_err(|err| format!("invalid URL '{input}': {err}"))
}

/// Resolve the user id, which every command needs.
pub(crate) fn require_user_id(input: Option<String>) -> CliResult<String> {
    input
        .map(|raw| raw.trim().to_string())
        .filter(|user_id| !user_id.is_empty())
        .ok_or_else(|| {
            CliError::validation("user id is required (pass --user-id or set INTRIX_USER_ID)")
        })
}

/// Millisecond timestamp helper for telemetry.
#[must_use]
pub(crate) fn timestamp_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::MockServer;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn telemetry_emitter_emits_event() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/telemetry")
                .body_includes(r#""command":"export""#);
            then.status(200);
        });

        let emitter = TelemetryEmitter {
            client: Client::new(),
            endpoint: format!("{}/telemetry", server.base_url())
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid URL"))?,
        };

        emitter
            .emit("trace", "export", "success", 0, Some("message"))
            .await;

        mock.assert();
        Ok(())
    }

    #[test]
    fn client_errors_map_to_exit_classes() {
        let not_found: CliError = ClientError::Status {
            operation: "favorite_add",
            status: 404,
            message: Some("Analysis not found".to_string()),
        }
        .into();
        assert_eq!(not_found.exit_code(), 2);
        assert_eq!(not_found.display_message(), "Analysis not found (status 404)");

        let server: CliError = ClientError::Status {
            operation: "fetch_history",
            status: 500,
            message: None,
        }
        .into();
        assert_eq!(server.exit_code(), 3);
        assert_eq!(
            server.display_message(),
            "fetch_history failed: no error message (status 500)"
        );

        let config: CliError = ClientError::InvalidConfig {
            field: "user_id",
            reason: "must not be empty",
        }
        .into();
        assert_eq!(config.exit_code(), 2);
    }

    #[test]
    fn require_user_id_rejects_blank_values() {
        assert!(require_user_id(None).is_err());
        assert!(require_user_id(Some("  ".to_string())).is_err());
        assert_eq!(
            require_user_id(Some(" user1 ".to_string())).ok().as_deref(),
            Some("user1")
        );
    }

    #[test]
    fn parse_url_rejects_invalid_input() {
        assert!(parse_url("not a url").is_err());
        assert!(parse_url("http://127.0.0.1:8000").is_ok());
    }

    #[test]
    fn timestamp_now_ms_returns_positive_value() {
        assert!(timestamp_now_ms() > 0);
    }
}
