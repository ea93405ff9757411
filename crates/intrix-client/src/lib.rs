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
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

//! Favorites synchronization and rate-limited export for the Intrix analysis list.
//!
//! Layout: `api.rs` (backend client), `favorites.rs` (optimistic favorite
//! state), `view.rs` (display ordering), `export.rs` (cooldown-aware batch
//! export), `session.rs` (per-mount wiring), with `clock.rs`, `storage.rs`,
//! `sink.rs` and `notify.rs` as injected collaborators.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod favorites;
pub mod notify;
pub mod session;
pub mod sink;
pub mod storage;
pub mod view;

#[cfg(test)]
mod testing;

pub use api::{AnalysisApi, ExportResponse, HttpAnalysisApi};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use export::{BatchExporter, ExportOutcome, ExportState, format_mm_ss};
pub use favorites::{FavoriteEntry, FavoriteSnapshot, FavoriteStore, ToggleOutcome};
pub use notify::{Notification, NotificationKind, Notifications};
pub use session::{AnalysisListSession, SessionDeps};
pub use sink::{ArchiveSink, DirectorySink};
pub use storage::{CooldownStore, FileCooldownStore, MemoryCooldownStore};
pub use view::arrange;
