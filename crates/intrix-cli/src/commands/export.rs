use anyhow::anyhow;
use intrix_client::export::NOTHING_TO_EXPORT_MESSAGE;
use intrix_client::{ExportOutcome, format_mm_ss};

use crate::cli::OutputFormat;
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{render_notifications, render_saved};

pub(crate) async fn handle_export(ctx: &AppContext, output: OutputFormat) -> CliResult<()> {
    let mut session = ctx.session();
    session.load().await?;
    session.settle().await;

    let outcome = session.export().await;
    let notifications = session.notifications().drain();
    match outcome {
        ExportOutcome::Saved { path, bytes } => {
            render_saved("archive", &path, bytes, output)?;
            render_notifications(&notifications);
            Ok(())
        }
        ExportOutcome::NothingToExport => Err(CliError::validation(NOTHING_TO_EXPORT_MESSAGE)),
        ExportOutcome::CoolingDown { remaining_secs } => Err(CliError::validation(format!(
            "batch download disabled for {}",
            format_mm_ss(remaining_secs)
        ))),
        ExportOutcome::RateLimited { .. } => {
            let label = session.countdown().unwrap_or_else(|| format_mm_ss(0));
            let reason = notifications
                .first()
                .map_or("download rate limited", |notification| {
                    notification.message.as_str()
                });
            Err(CliError::failure(anyhow!(
                "{reason}; batch download disabled for {label}"
            )))
        }
        ExportOutcome::Failed { message } => Err(CliError::failure(anyhow!(message))),
        ExportOutcome::Busy | ExportOutcome::Abandoned => {
            Err(CliError::failure(anyhow!("export did not complete")))
        }
    }
}
