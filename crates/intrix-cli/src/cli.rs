//! Argument parsing and command dispatch.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use intrix_client::ClientConfig;
use intrix_client::config::{DEFAULT_API_URL, DEFAULT_STATE_FILE, DEFAULT_TIMEOUT_SECS};
use intrix_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, init_logging};
use url::Url;
use uuid::Uuid;

use crate::client::{
    AppContext, CliError, CliResult, TelemetryEmitter, parse_url, require_user_id,
};
use crate::commands::cooldown::handle_cooldown;
use crate::commands::export::handle_export;
use crate::commands::favorites::{handle_favorite_status, handle_favorite_toggle};
use crate::commands::history::handle_history;
use crate::commands::report::handle_report;

const DEFAULT_CLI_LOG_LEVEL: &str = "warn";

/// Parses CLI arguments, executes the requested command, and handles
/// user-facing telemetry emission. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format,
        build_sha: option_env!("INTRIX_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err}");
    }

    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    let _context = GlobalContextGuard::new(command_name, trace_id.as_str());
    let telemetry = TelemetryEmitter::from_env();

    let result = dispatch(cli, &trace_id).await;

    let (exit_code, message, outcome) = match result {
        Ok(()) => (0, None, "success"),
        Err(err) => {
            let exit_code = err.exit_code();
            let message = err.display_message();
            eprintln!("error: {message}");
            (exit_code, Some(message), "error")
        }
    };

    if let Some(emitter) = &telemetry {
        emitter
            .emit(
                &trace_id,
                command_name,
                outcome,
                exit_code,
                message.as_deref(),
            )
            .await;
    }

    exit_code
}

async fn dispatch(cli: Cli, trace_id: &str) -> CliResult<()> {
    let ctx = AppContext::new(build_config(&cli, trace_id)?)?;
    let output = cli.output;

    match cli.command {
        Command::History(args) => handle_history(&ctx, args, output).await,
        Command::Favorite(favorite) => match favorite {
            FavoriteCommand::Toggle(args) => handle_favorite_toggle(&ctx, args, output).await,
            FavoriteCommand::Status(args) => handle_favorite_status(&ctx, args, output).await,
        },
        Command::Export => handle_export(&ctx, output).await,
        Command::Cooldown(args) => handle_cooldown(&ctx, args, output).await,
        Command::Report(args) => handle_report(&ctx, args, output).await,
    }
}

fn build_config(cli: &Cli, trace_id: &str) -> CliResult<ClientConfig> {
    let user_id = require_user_id(cli.user_id.clone())?;
    if cli.timeout == 0 {
        return Err(CliError::validation("--timeout must be greater than zero"));
    }
    let mut config = ClientConfig::new(cli.api_url.clone(), user_id);
    config.auth_token.clone_from(&cli.auth_token);
    config.timeout = Duration::from_secs(cli.timeout);
    config.request_id = Some(trace_id.to_string());
    config.state_path.clone_from(&cli.state_file);
    config.download_dir.clone_from(&cli.download_dir);
    Ok(config)
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::History(_) => "history",
        Command::Favorite(FavoriteCommand::Toggle(_)) => "favorite_toggle",
        Command::Favorite(FavoriteCommand::Status(_)) => "favorite_status",
        Command::Export => "export",
        Command::Cooldown(_) => "cooldown",
        Command::Report(_) => "report",
    }
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input.parse::<LogFormat>().map_err(|err| err.to_string())
}

#[derive(Parser)]
#[command(name = "intrix", about = "Favorites and report export client for Intrix")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "INTRIX_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    api_url: Url,
    #[arg(long, global = true, env = "INTRIX_USER_ID")]
    user_id: Option<String>,
    #[arg(long, global = true, env = "INTRIX_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,
    #[arg(
        long,
        global = true,
        env = "INTRIX_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    timeout: u64,
    #[arg(
        long,
        global = true,
        env = "INTRIX_STATE_FILE",
        default_value = DEFAULT_STATE_FILE,
        help = "File holding the persisted download cooldown"
    )]
    state_file: PathBuf,
    #[arg(
        long,
        global = true,
        env = "INTRIX_DOWNLOAD_DIR",
        default_value = ".",
        help = "Directory receiving archives and reports"
    )]
    download_dir: PathBuf,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[arg(long, global = true, env = "INTRIX_LOG_LEVEL", default_value = DEFAULT_CLI_LOG_LEVEL)]
    log_level: String,
    #[arg(
        long,
        global = true,
        env = "INTRIX_LOG_FORMAT",
        value_parser = parse_log_format,
        default_value = "auto"
    )]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// List analyses, favorites first.
    History(HistoryArgs),
    /// Inspect or change favorites.
    #[command(subcommand)]
    Favorite(FavoriteCommand),
    /// Download every favorited report as one archive.
    Export,
    /// Show the batch download cooldown.
    Cooldown(CooldownArgs),
    /// Download a single report.
    Report(ReportArgs),
}

#[derive(Subcommand)]
pub(crate) enum FavoriteCommand {
    /// Flip the favorite flag of an analysis.
    Toggle(FavoriteArgs),
    /// Show whether an analysis is a favorite.
    Status(FavoriteArgs),
}

#[derive(Args, Default)]
pub(crate) struct HistoryArgs {
    #[arg(long, help = "Only list favorited analyses")]
    pub(crate) favorites_only: bool,
}

#[derive(Args)]
pub(crate) struct FavoriteArgs {
    #[arg(help = "Analysis identifier")]
    pub(crate) id: String,
}

#[derive(Args)]
pub(crate) struct CooldownArgs {
    #[arg(long, help = "Follow the countdown until downloads are available")]
    pub(crate) wait: bool,
}

#[derive(Args)]
pub(crate) struct ReportArgs {
    #[arg(help = "Analysis identifier")]
    pub(crate) id: String,
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn command_label_matches_variants() {
        let cases = [
            (vec!["intrix", "history"], "history"),
            (vec!["intrix", "favorite", "toggle", "a"], "favorite_toggle"),
            (vec!["intrix", "favorite", "status", "a"], "favorite_status"),
            (vec!["intrix", "export"], "export"),
            (vec!["intrix", "cooldown", "--wait"], "cooldown"),
            (vec!["intrix", "report", "7"], "report"),
        ];
        for (args, label) in cases {
            assert_eq!(command_label(&parse(&args).command), label);
        }
    }

    #[test]
    fn build_config_applies_flags() {
        let cli = parse(&[
            "intrix",
            "--api-url",
            "http://backend:8000/api-root/",
            "--user-id",
            "user1",
            "--auth-token",
            "secret",
            "--timeout",
            "3",
            "--state-file",
            "/tmp/intrix-state.json",
            "--download-dir",
            "/tmp/downloads",
            "export",
        ]);
        let config = build_config(&cli, "trace-1").expect("valid config");
        assert_eq!(config.user_id, "user1");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.request_id.as_deref(), Some("trace-1"));
        assert_eq!(config.state_path, PathBuf::from("/tmp/intrix-state.json"));
        assert_eq!(config.archive_name(), "favorite_reports_user1.zip");
    }

    #[test]
    fn build_config_requires_user_and_positive_timeout() {
        let cli = parse(&["intrix", "--user-id", " ", "export"]);
        assert_eq!(build_config(&cli, "t").map(|_| ()).unwrap_err().exit_code(), 2);

        let cli = parse(&["intrix", "--user-id", "user1", "--timeout", "0", "export"]);
        assert!(matches!(build_config(&cli, "t"), Err(CliError::Validation(_))));
    }

    #[test]
    fn invalid_flags_are_rejected_by_parser() {
        assert!(Cli::try_parse_from(["intrix", "--api-url", "not a url", "export"]).is_err());
        assert!(Cli::try_parse_from(["intrix", "--log-format", "xml", "export"]).is_err());
        assert!(Cli::try_parse_from(["intrix", "favorite", "toggle"]).is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = parse(&["intrix", "history", "--favorites-only", "--output", "json"]);
        assert!(matches!(cli.output, OutputFormat::Json));
        let Command::History(args) = cli.command else {
            panic!("expected history command");
        };
        assert!(args.favorites_only);
    }
}
