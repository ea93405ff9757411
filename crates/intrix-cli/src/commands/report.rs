use std::fs;

use anyhow::anyhow;

use crate::cli::{OutputFormat, ReportArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_saved;

pub(crate) async fn handle_report(
    ctx: &AppContext,
    args: ReportArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let id = args.id.trim();
    if id.is_empty() {
        return Err(CliError::validation("analysis id must not be empty"));
    }

    let session = ctx.session();
    let path = session.download_report(id).await?;
    let bytes = fs::metadata(&path)
        .map_err(|err| CliError::failure(anyhow!("failed to stat {}: {err}", path.display())))?
        .len();
    render_saved(
        "report",
        &path,
        usize::try_from(bytes).unwrap_or(usize::MAX),
        output,
    )
}
