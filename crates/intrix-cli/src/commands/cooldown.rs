use intrix_client::{ExportState, format_mm_ss};
use tracing::debug;

use crate::cli::{CooldownArgs, OutputFormat};
use crate::client::{AppContext, CliResult};
use crate::output::{render_cooldown, render_notifications};

pub(crate) async fn handle_cooldown(
    ctx: &AppContext,
    args: CooldownArgs,
    output: OutputFormat,
) -> CliResult<()> {
    let mut session = ctx.session();
    let state = session.mount(Vec::new());
    debug!(?state, "restored download cooldown");

    if args.wait {
        let mut states = session.subscribe();
        loop {
            let state = *states.borrow_and_update();
            let ExportState::Cooldown { remaining_secs, .. } = state else {
                break;
            };
            eprintln!("batch download available in {}", format_mm_ss(remaining_secs));
            if states.changed().await.is_err() {
                break;
            }
        }
    }

    render_cooldown(session.export_state(), output)?;
    render_notifications(&session.notifications().drain());
    Ok(())
}
