#![forbid(unsafe_code)]
#![warn(
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
//! Shared HTTP DTOs for the Intrix analysis API.
//!
//! The analysis backend is an external service; these types pin down the parts
//! of its contract the client depends on. Error documents come in two shapes
//! (flat and nested under `detail`), so decoding goes through
//! [`ErrorEnvelope`] rather than a single struct.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary row for a completed analysis as returned by the history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisSummary {
    /// Stable analysis identifier.
    pub id: String,
    /// Creation timestamp (RFC 3339, naive datetime, or `YYYY-MM-DD`).
    pub date: String,
    /// Marketing channels the strategy targets.
    #[serde(default)]
    pub channels: Vec<String>,
    /// Headline copy produced for the analysis.
    #[serde(default)]
    pub copy: String,
    /// Short strategy summary.
    #[serde(default, alias = "strategySummary")]
    pub strategy_summary: String,
    /// Copy style label.
    #[serde(default)]
    pub style: String,
}

impl AnalysisSummary {
    /// Parse [`AnalysisSummary::date`] into a UTC timestamp.
    ///
    /// Naive values are interpreted as UTC; bare dates as midnight UTC.
    #[must_use]
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.date)
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(parsed.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Response of the favorite status lookup.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FavoriteStatus {
    /// Whether the analysis is currently favorited by the user.
    pub favorited: bool,
}

/// Body of the batch export request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportRequest {
    /// Identity of the requesting user.
    pub user_id: String,
    /// Favorited analysis identifiers to bundle.
    pub analysis_ids: Vec<String>,
}

/// Error document emitted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
    /// Seconds until the server-side rate limit lifts (429 only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
}

/// Payload found under FastAPI's `detail` key.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ErrorDetail {
    /// Structured error document.
    Body(ErrorBody),
    /// Plain message string.
    Message(String),
}

/// Any of the error shapes the backend is known to produce.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ErrorEnvelope {
    /// `{ "detail": ... }`
    Nested {
        /// Nested error payload.
        detail: ErrorDetail,
    },
    /// `{ "error": ..., "remaining_seconds": ... }`
    Flat(ErrorBody),
}

impl ErrorEnvelope {
    /// Flatten the envelope into a single [`ErrorBody`].
    #[must_use]
    pub fn into_body(self) -> ErrorBody {
        match self {
            Self::Flat(body) | Self::Nested {
                detail: ErrorDetail::Body(body),
            } => body,
            Self::Nested {
                detail: ErrorDetail::Message(error),
            } => ErrorBody {
                error,
                remaining_seconds: None,
            },
        }
    }
}

/// History listing, either wrapped in a status envelope or as a bare array.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum HistoryResponse {
    /// `{ "status": "success", "data": [...] }`
    Envelope {
        /// Backend status label.
        #[serde(default)]
        status: Option<String>,
        /// Analysis rows.
        data: Vec<AnalysisSummary>,
    },
    /// `[...]`
    Bare(Vec<AnalysisSummary>),
}

impl HistoryResponse {
    /// Extract the analysis rows regardless of shape.
    #[must_use]
    pub fn into_items(self) -> Vec<AnalysisSummary> {
        match self {
            Self::Envelope { data, .. } | Self::Bare(data) => data,
        }
    }
}
