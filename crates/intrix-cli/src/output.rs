//! Output renderers and formatting helpers for CLI commands.

use std::path::Path;

use anyhow::anyhow;
use intrix_api_models::AnalysisSummary;
use intrix_client::{ExportState, Notification, ToggleOutcome, format_mm_ss};
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// One rendered history row.
#[derive(Debug, Serialize)]
pub(crate) struct HistoryRow<'a> {
    pub(crate) id: &'a str,
    pub(crate) date: &'a str,
    pub(crate) favorite: bool,
    pub(crate) channels: &'a [String],
    pub(crate) style: &'a str,
    pub(crate) strategy_summary: &'a str,
}

impl<'a> HistoryRow<'a> {
    pub(crate) fn new(analysis: &'a AnalysisSummary, favorite: bool) -> Self {
        Self {
            id: &analysis.id,
            date: &analysis.date,
            favorite,
            channels: &analysis.channels,
            style: &analysis.style,
            strategy_summary: &analysis.strategy_summary,
        }
    }
}

fn print_json(value: &impl Serialize) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_history(
    rows: &[HistoryRow<'_>],
    countdown: Option<&str>,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "analyses": rows,
            "download_available_in": countdown,
        })),
        OutputFormat::Table => {
            println!("{:<3} {:<24} {:<20} {:<28} STYLE", "FAV", "ID", "DATE", "CHANNELS");
            for row in rows {
                println!(
                    "{:<3} {:<24} {:<20} {:<28} {}",
                    if row.favorite { "*" } else { "" },
                    row.id,
                    row.date,
                    format_channels(row.channels),
                    row.style
                );
            }
            if rows.is_empty() {
                println!("(no analyses)");
            }
            if let Some(label) = countdown {
                println!("batch download available in {label}");
            }
            Ok(())
        }
    }
}

pub(crate) fn render_toggle(
    analysis_id: &str,
    outcome: ToggleOutcome,
    format: OutputFormat,
) -> CliResult<()> {
    let favorited = matches!(outcome, ToggleOutcome::Added);
    match format {
        OutputFormat::Json => print_json(&json!({
            "analysis_id": analysis_id,
            "favorited": favorited,
        })),
        OutputFormat::Table => {
            let verb = if favorited { "added to" } else { "removed from" };
            println!("{analysis_id} {verb} favorites");
            Ok(())
        }
    }
}

pub(crate) fn render_favorite_status(
    analysis_id: &str,
    favorited: bool,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "analysis_id": analysis_id,
            "favorited": favorited,
        })),
        OutputFormat::Table => {
            println!("{analysis_id}: {}", if favorited { "favorite" } else { "not a favorite" });
            Ok(())
        }
    }
}

pub(crate) fn render_saved(
    kind: &str,
    path: &Path,
    bytes: usize,
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "kind": kind,
            "path": path.display().to_string(),
            "bytes": bytes,
        })),
        OutputFormat::Table => {
            println!("saved {kind} to {} ({})", path.display(), format_bytes(bytes));
            Ok(())
        }
    }
}

pub(crate) fn render_cooldown(state: ExportState, format: OutputFormat) -> CliResult<()> {
    match (state, format) {
        (
            ExportState::Cooldown {
                expires_at_ms,
                remaining_secs,
            },
            OutputFormat::Json,
        ) => print_json(&json!({
            "available": false,
            "expires_at_ms": expires_at_ms,
            "remaining": format_mm_ss(remaining_secs),
        })),
        (ExportState::Cooldown { remaining_secs, .. }, OutputFormat::Table) => {
            println!("batch download disabled for {}", format_mm_ss(remaining_secs));
            Ok(())
        }
        (ExportState::Idle | ExportState::Requesting, OutputFormat::Json) => {
            print_json(&json!({ "available": true }))
        }
        (ExportState::Idle | ExportState::Requesting, OutputFormat::Table) => {
            println!("batch download available");
            Ok(())
        }
    }
}

/// Notifications go to stderr so stdout stays parseable.
pub(crate) fn render_notifications(notifications: &[Notification]) {
    for notification in notifications {
        eprintln!("[{}] {}", notification.kind.as_str(), notification.message);
    }
}

pub(crate) fn format_channels(channels: &[String]) -> String {
    if channels.is_empty() {
        "-".to_string()
    } else {
        channels.join(", ")
    }
}

pub(crate) fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes_to_f64(bytes);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[allow(clippy::cast_precision_loss)]
const fn bytes_to_f64(value: usize) -> f64 {
    value as f64
}
