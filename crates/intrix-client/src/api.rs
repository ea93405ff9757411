//! HTTP client for the analysis backend.
//!
//! # Design
//! - [`AnalysisApi`] is the seam the favorites store and exporter depend on;
//!   tests swap in a scripted fake.
//! - Export responses are classified into [`ExportResponse`] instead of errors:
//!   a 429 is an expected outcome, not a failure.

use async_trait::async_trait;
use intrix_api_models::{
    AnalysisSummary, ErrorBody, ErrorEnvelope, ExportRequest, FavoriteStatus, HistoryResponse,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

pub(crate) const HEADER_AUTH_TOKEN: &str = "auth-token";
pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";

/// Classified outcome of a batch export request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportResponse {
    /// The backend produced the archive.
    Archive(Vec<u8>),
    /// The backend refused with 429.
    RateLimited(ErrorBody),
    /// Any other non-success status.
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error message decoded from the body, when present.
        message: Option<String>,
    },
}

/// Remote operations consumed by the analysis list.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Whether `analysis_id` is favorited by the configured user.
    async fn favorite_status(&self, analysis_id: &str) -> ClientResult<bool>;
    /// Add `analysis_id` to the user's favorites.
    async fn add_favorite(&self, analysis_id: &str) -> ClientResult<()>;
    /// Remove `analysis_id` from the user's favorites.
    async fn remove_favorite(&self, analysis_id: &str) -> ClientResult<()>;
    /// Request the favorites archive for `analysis_ids`.
    async fn export_favorites(&self, analysis_ids: &[String]) -> ClientResult<ExportResponse>;
    /// The user's analysis history.
    async fn fetch_history(&self) -> ClientResult<Vec<AnalysisSummary>>;
    /// Rendered PDF report for a single analysis.
    async fn download_report(&self, analysis_id: &str) -> ClientResult<Vec<u8>>;
}

/// `reqwest`-backed [`AnalysisApi`].
#[derive(Clone, Debug)]
pub struct HttpAnalysisApi {
    client: Client,
    base_url: Url,
    user_id: String,
}

impl HttpAnalysisApi {
    /// Build a client from validated configuration.
    ///
    /// # Errors
    /// Returns an error when the configuration is invalid or the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let mut default_headers = HeaderMap::new();
        if let Some(request_id) = &config.request_id {
            let value = HeaderValue::from_str(request_id).map_err(|_| {
                ClientError::InvalidConfig {
                    field: "request_id",
                    reason: "contains characters not allowed in headers",
                }
            })?;
            default_headers.insert(HEADER_REQUEST_ID, value);
        }
        if let Some(token) = &config.auth_token {
            let mut value = HeaderValue::from_str(token.trim()).map_err(|_| {
                ClientError::InvalidConfig {
                    field: "auth_token",
                    reason: "contains characters not allowed in headers",
                }
            })?;
            value.set_sensitive(true);
            default_headers.insert(HEADER_AUTH_TOKEN, value);
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|source| ClientError::HttpClient { source })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            user_id: config.user_id.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::BaseUrl {
                url: self.base_url.to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> ClientResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|source| ClientError::Transport { operation, source })?;
        debug!(operation, status = response.status().as_u16(), "backend responded");
        Ok(response)
    }

    async fn expect_success(operation: &'static str, response: Response) -> ClientResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let message = read_error_body(response).await.map(|body| body.error);
            Err(ClientError::Status {
                operation,
                status,
                message,
            })
        }
    }

    async fn toggle(
        &self,
        operation: &'static str,
        method: reqwest::Method,
        analysis_id: &str,
    ) -> ClientResult<()> {
        let url = self.endpoint(&["api", "favorite", analysis_id])?;
        let request = self
            .client
            .request(method, url)
            .query(&[("user_id", self.user_id.as_str())]);
        let response = self.send(operation, request).await?;
        Self::expect_success(operation, response).await?;
        Ok(())
    }
}

#[async_trait]
impl AnalysisApi for HttpAnalysisApi {
    async fn favorite_status(&self, analysis_id: &str) -> ClientResult<bool> {
        const OPERATION: &str = "favorite_status";
        let url = self.endpoint(&["api", "favorite", "status"])?;
        let request = self.client.get(url).query(&[
            ("user_id", self.user_id.as_str()),
            ("analysis_id", analysis_id),
        ]);
        let response = self.send(OPERATION, request).await?;
        let response = Self::expect_success(OPERATION, response).await?;
        let status = response
            .json::<FavoriteStatus>()
            .await
            .map_err(|source| ClientError::Decode {
                operation: OPERATION,
                source,
            })?;
        Ok(status.favorited)
    }

    async fn add_favorite(&self, analysis_id: &str) -> ClientResult<()> {
        self.toggle("favorite_add", reqwest::Method::POST, analysis_id)
            .await
    }

    async fn remove_favorite(&self, analysis_id: &str) -> ClientResult<()> {
        self.toggle("favorite_remove", reqwest::Method::DELETE, analysis_id)
            .await
    }

    async fn export_favorites(&self, analysis_ids: &[String]) -> ClientResult<ExportResponse> {
        const OPERATION: &str = "export_favorites";
        let url = self.endpoint(&["api", "download", "favorites"])?;
        let body = ExportRequest {
            user_id: self.user_id.clone(),
            analysis_ids: analysis_ids.to_vec(),
        };
        let response = self
            .send(OPERATION, self.client.post(url).json(&body))
            .await?;

        let status = response.status();
        if status.is_success() {
            let bytes = response
                .bytes()
                .await
                .map_err(|source| ClientError::Decode {
                    operation: OPERATION,
                    source,
                })?;
            return Ok(ExportResponse::Archive(bytes.to_vec()));
        }

        let body = read_error_body(response).await;
        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = body.unwrap_or_else(|| ErrorBody {
                error: "Too many download requests".to_string(),
                remaining_seconds: None,
            });
            Ok(ExportResponse::RateLimited(body))
        } else {
            Ok(ExportResponse::Rejected {
                status: status.as_u16(),
                message: body.map(|body| body.error),
            })
        }
    }

    async fn fetch_history(&self) -> ClientResult<Vec<AnalysisSummary>> {
        const OPERATION: &str = "fetch_history";
        let url = self.endpoint(&["user", &self.user_id, "history"])?;
        let response = self.send(OPERATION, self.client.get(url)).await?;
        let response = Self::expect_success(OPERATION, response).await?;
        let history = response
            .json::<HistoryResponse>()
            .await
            .map_err(|source| ClientError::Decode {
                operation: OPERATION,
                source,
            })?;
        Ok(history.into_items())
    }

    async fn download_report(&self, analysis_id: &str) -> ClientResult<Vec<u8>> {
        const OPERATION: &str = "download_report";
        let url = self.endpoint(&["user", &self.user_id, "download", analysis_id])?;
        let response = self.send(OPERATION, self.client.get(url)).await?;
        let response = Self::expect_success(OPERATION, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::Decode {
                operation: OPERATION,
                source,
            })?;
        Ok(bytes.to_vec())
    }
}

/// Decode an error document, tolerating empty or non-JSON bodies.
async fn read_error_body(response: Response) -> Option<ErrorBody> {
    let bytes = response.bytes().await.ok()?;
    serde_json::from_slice::<ErrorEnvelope>(&bytes)
        .ok()
        .map(ErrorEnvelope::into_body)
        .filter(|body| !body.error.trim().is_empty())
}
