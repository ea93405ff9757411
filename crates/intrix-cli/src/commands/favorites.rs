use anyhow::anyhow;
use intrix_client::ToggleOutcome;
use intrix_client::favorites::TOGGLE_FAILED_MESSAGE;

use crate::cli::{FavoriteArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{render_favorite_status, render_notifications, render_toggle};

fn analysis_id(args: &FavoriteArgs) -> CliResult<&str> {
    let id = args.id.trim();
    if id.is_empty() {
        return Err(CliError::validation("analysis id must not be empty"));
    }
    Ok(id)
}

pub(crate) async fn handle_favorite_toggle(
    ctx: &AppContext,
    args: FavoriteArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let id = analysis_id(&args)?;
    // The direction depends on the current value, so an unknown status aborts.
    let favorited = ctx.api.favorite_status(id).await?;
    let session = ctx.session();
    session.favorites().confirm(id, favorited);

    let outcome = session.toggle_favorite(id).await;
    let notifications = session.notifications().drain();
    match outcome {
        ToggleOutcome::Added | ToggleOutcome::Removed => {
            render_toggle(id, outcome, output)?;
            render_notifications(&notifications);
            Ok(())
        }
        ToggleOutcome::RolledBack { .. } => Err(CliError::failure(anyhow!(
            "{TOGGLE_FAILED_MESSAGE} for {id}"
        ))),
        ToggleOutcome::Ignored | ToggleOutcome::Abandoned => Err(CliError::failure(anyhow!(
            "favorite update for {id} did not complete"
        ))),
    }
}

pub(crate) async fn handle_favorite_status(
    ctx: &AppContext,
    args: FavoriteArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let id = analysis_id(&args)?;
    let favorited = ctx.api.favorite_status(id).await?;
    render_favorite_status(id, favorited, output)
}
