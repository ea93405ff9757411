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
//! Telemetry primitives shared across the Intrix workspace.
//!
//! Layout: `init.rs` (subscriber installation + logging config), `error.rs`
//! (telemetry error type).

pub mod error;
pub mod init;

pub use error::{Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging};

use tracing::{Span, span::Entered};

/// Guard that keeps the command-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter a process-wide span tagged with the command and trace identifier.
    #[must_use]
    pub fn new(command: impl Into<String>, trace_id: impl Into<String>) -> Self {
        let command = command.into();
        let trace_id = trace_id.into();
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "intrix",
            command = %command,
            trace_id = %trace_id,
            build_sha = %build_sha()
        )));
        let guard = span.enter();
        Self { _guard: guard }
    }
}
