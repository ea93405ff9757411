use crate::cli::{HistoryArgs, OutputFormat};
use crate::client::{AppContext, CliResult};
use crate::output::{HistoryRow, render_history, render_notifications};

pub(crate) async fn handle_history(
    ctx: &AppContext,
    args: HistoryArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let mut session = ctx.session();
    session.load().await?;
    session.settle().await;
    session.set_favorites_only(args.favorites_only);

    let favorites = session.favorites().snapshot();
    let rows: Vec<HistoryRow<'_>> = session
        .visible()
        .into_iter()
        .map(|analysis| HistoryRow::new(analysis, favorites.is_favorite(&analysis.id)))
        .collect();
    render_history(&rows, session.countdown().as_deref(), output)?;
    render_notifications(&session.notifications().drain());
    Ok(())
}
