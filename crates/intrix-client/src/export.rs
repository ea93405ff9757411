//! Rate-limited batch export of favorited analyses.
//!
//! # Design
//! - State lives in a `watch` channel so renderers can follow the countdown
//!   without polling; [`ExportState`] is `Copy` and cheap to publish.
//! - A 429 starts a fixed ten minute cooldown measured from the client clock.
//!   The expiry is persisted so a fresh session resumes the countdown.
//! - At most one ticker task exists; entering a cooldown replaces the previous
//!   one. The ticker only drives [`BatchExporter::tick`], which is also safe to
//!   call directly.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::api::{AnalysisApi, ExportResponse};
use crate::clock::Clock;
use crate::notify::{NotificationKind, Notifications};
use crate::session::SessionDeps;
use crate::sink::ArchiveSink;
use crate::storage::CooldownStore;

/// Client-side cooldown applied after the backend rate-limits an export.
pub const COOLDOWN: Duration = Duration::from_secs(600);
/// Message shown when there is nothing to export.
pub const NOTHING_TO_EXPORT_MESSAGE: &str = "No favorited analyses to download";
/// Message shown after the archive is saved.
pub const EXPORT_SUCCESS_MESSAGE: &str = "Favorited strategies downloaded successfully";
/// Message shown for failures without a backend-provided message.
pub const EXPORT_FAILED_MESSAGE: &str = "An error occurred while downloading";
/// Message shown when the cooldown lapses.
pub const COOLDOWN_OVER_MESSAGE: &str = "Download is available again";

const RATE_LIMIT_TTL: Duration = Duration::from_secs(5);
const COOLDOWN_OVER_TTL: Duration = Duration::from_secs(3);
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Observable exporter state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportState {
    /// Ready for a new request.
    Idle,
    /// An export request is in flight.
    Requesting,
    /// Exports are disabled until `expires_at_ms`.
    Cooldown {
        /// Epoch-ms expiry of the cooldown.
        expires_at_ms: i64,
        /// Whole seconds left, rounded up.
        remaining_secs: i64,
    },
}

/// Result of [`BatchExporter::export`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    /// No favorites were selected; no request was issued.
    NothingToExport,
    /// Another export is already in flight.
    Busy,
    /// A cooldown is active; no request was issued.
    CoolingDown {
        /// Whole seconds left.
        remaining_secs: i64,
    },
    /// The archive was saved.
    Saved {
        /// Where the archive was written.
        path: PathBuf,
        /// Archive size in bytes.
        bytes: usize,
    },
    /// The backend rate-limited the request and a cooldown started.
    RateLimited {
        /// Epoch-ms expiry of the new cooldown.
        expires_at_ms: i64,
        /// Remaining seconds reported by the backend, for display only.
        server_remaining_seconds: Option<u64>,
    },
    /// The request failed; `message` was shown to the user.
    Failed {
        /// User-facing failure message.
        message: String,
    },
    /// The exporter was disposed before the request completed.
    Abandoned,
}

/// Whole seconds until `expires_at_ms`, rounded up; non-positive once expired.
#[must_use]
pub const fn remaining_secs(expires_at_ms: i64, now_ms: i64) -> i64 {
    expires_at_ms
        .saturating_sub(now_ms)
        .saturating_add(999)
        .div_euclid(1000)
}

/// Render seconds as zero-padded `MM:SS`; negative input renders as `00:00`.
#[must_use]
pub fn format_mm_ss(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn cooldown_ms() -> i64 {
    i64::try_from(COOLDOWN.as_millis()).unwrap_or(i64::MAX)
}

struct Inner {
    api: Arc<dyn AnalysisApi>,
    clock: Arc<dyn Clock>,
    store: Arc<dyn CooldownStore>,
    sink: Arc<dyn ArchiveSink>,
    archive_name: String,
    notifications: Notifications,
    state: watch::Sender<ExportState>,
    ticker: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

/// Batch exporter with a persisted cooldown.
#[derive(Clone)]
pub struct BatchExporter {
    inner: Arc<Inner>,
}

impl BatchExporter {
    /// Exporter wired to the collaborators in `deps`.
    #[must_use]
    pub fn new(deps: &SessionDeps, notifications: Notifications) -> Self {
        let (state, _) = watch::channel(ExportState::Idle);
        Self {
            inner: Arc::new(Inner {
                api: Arc::clone(&deps.api),
                clock: Arc::clone(&deps.clock),
                store: Arc::clone(&deps.cooldown_store),
                sink: Arc::clone(&deps.sink),
                archive_name: deps.archive_name.clone(),
                notifications,
                state,
                ticker: Mutex::new(None),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Resume a persisted cooldown, discarding it if it already lapsed.
    pub fn restore(&self) -> ExportState {
        let stored = match self.inner.store.load() {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "failed to read persisted download cooldown");
                None
            }
        };
        let Some(expires_at_ms) = stored else {
            return self.state();
        };
        let now = self.inner.clock.now_ms();
        if remaining_secs(expires_at_ms, now) <= 0 {
            info!(expires_at_ms, "discarding expired download cooldown");
            if let Err(err) = self.inner.store.clear() {
                warn!(error = %err, "failed to clear expired download cooldown");
            }
            return self.state();
        }
        info!(expires_at_ms, "resuming download cooldown");
        self.enter_cooldown(expires_at_ms);
        self.state()
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ExportState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ExportState> {
        self.inner.state.subscribe()
    }

    /// Whether the export control should be enabled for `favorite_count` favorites.
    #[must_use]
    pub fn can_export(&self, favorite_count: usize) -> bool {
        favorite_count > 0 && self.tick() == ExportState::Idle
    }

    /// `MM:SS` label while a cooldown is active.
    #[must_use]
    pub fn countdown_label(&self) -> Option<String> {
        match self.state() {
            ExportState::Cooldown { remaining_secs, .. } => Some(format_mm_ss(remaining_secs)),
            ExportState::Idle | ExportState::Requesting => None,
        }
    }

    /// Export the archive for `analysis_ids`.
    pub async fn export(&self, analysis_ids: Vec<String>) -> ExportOutcome {
        if self.is_disposed() {
            return ExportOutcome::Abandoned;
        }
        if let ExportState::Cooldown { remaining_secs, .. } = self.tick() {
            return ExportOutcome::CoolingDown { remaining_secs };
        }
        if analysis_ids.is_empty() {
            self.inner
                .notifications
                .push(NotificationKind::Warning, NOTHING_TO_EXPORT_MESSAGE);
            return ExportOutcome::NothingToExport;
        }
        let started = self.inner.state.send_if_modified(|state| {
            if *state == ExportState::Idle {
                *state = ExportState::Requesting;
                true
            } else {
                false
            }
        });
        if !started {
            return ExportOutcome::Busy;
        }

        info!(count = analysis_ids.len(), "requesting favorites archive");
        let response = self.inner.api.export_favorites(&analysis_ids).await;
        if self.is_disposed() {
            return ExportOutcome::Abandoned;
        }

        match response {
            Ok(ExportResponse::Archive(bytes)) => self.save_archive(&bytes),
            Ok(ExportResponse::RateLimited(body)) => {
                let expires_at_ms = self.inner.clock.now_ms().saturating_add(cooldown_ms());
                if let Err(err) = self.inner.store.save(expires_at_ms) {
                    warn!(error = %err, "failed to persist download cooldown");
                }
                let shown = body.remaining_seconds.unwrap_or(COOLDOWN.as_secs());
                self.inner.notifications.push_with_ttl(
                    NotificationKind::Warning,
                    format!("{} (remaining: {shown}s)", body.error),
                    RATE_LIMIT_TTL,
                );
                warn!(
                    expires_at_ms,
                    server_remaining_seconds = ?body.remaining_seconds,
                    "favorites export rate limited"
                );
                self.enter_cooldown(expires_at_ms);
                ExportOutcome::RateLimited {
                    expires_at_ms,
                    server_remaining_seconds: body.remaining_seconds,
                }
            }
            Ok(ExportResponse::Rejected { status, message }) => {
                warn!(status, "favorites export rejected");
                self.fail(message.unwrap_or_else(|| EXPORT_FAILED_MESSAGE.to_string()))
            }
            Err(err) => {
                error!(error = %err, "favorites export request failed");
                self.fail(EXPORT_FAILED_MESSAGE.to_string())
            }
        }
    }

    /// Recompute the countdown, ending the cooldown once it lapses.
    pub fn tick(&self) -> ExportState {
        let ExportState::Cooldown { expires_at_ms, .. } = self.state() else {
            return self.state();
        };
        let remaining = remaining_secs(expires_at_ms, self.inner.clock.now_ms());
        if remaining > 0 {
            self.inner.state.send_if_modified(|state| match state {
                ExportState::Cooldown { remaining_secs, .. } if *remaining_secs != remaining => {
                    *remaining_secs = remaining;
                    true
                }
                _ => false,
            });
            return self.state();
        }

        // Only the caller that ends this cooldown clears it and announces it.
        let ended = self.inner.state.send_if_modified(|state| {
            let current = matches!(
                *state,
                ExportState::Cooldown { expires_at_ms: current, .. } if current == expires_at_ms
            );
            if current {
                *state = ExportState::Idle;
            }
            current
        });
        if !ended {
            return self.state();
        }
        if let Err(err) = self.inner.store.clear() {
            warn!(error = %err, "failed to clear download cooldown");
        }
        if let Some(ticker) = self.lock_ticker().take() {
            ticker.abort();
        }
        if !self.is_disposed() {
            self.inner.notifications.push_with_ttl(
                NotificationKind::Success,
                COOLDOWN_OVER_MESSAGE,
                COOLDOWN_OVER_TTL,
            );
        }
        info!("download cooldown lapsed");
        ExportState::Idle
    }

    /// Stop the ticker and ignore any in-flight response.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        if let Some(ticker) = self.lock_ticker().take() {
            ticker.abort();
        }
    }

    /// Whether [`BatchExporter::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    fn save_archive(&self, bytes: &[u8]) -> ExportOutcome {
        match self.inner.sink.save(&self.inner.archive_name, bytes) {
            Ok(path) => {
                self.inner.state.send_replace(ExportState::Idle);
                self.inner
                    .notifications
                    .push(NotificationKind::Success, EXPORT_SUCCESS_MESSAGE);
                ExportOutcome::Saved {
                    path,
                    bytes: bytes.len(),
                }
            }
            Err(err) => {
                error!(error = %err, "failed to save favorites archive");
                self.fail(EXPORT_FAILED_MESSAGE.to_string())
            }
        }
    }

    fn fail(&self, message: String) -> ExportOutcome {
        self.inner.state.send_replace(ExportState::Idle);
        self.inner
            .notifications
            .push(NotificationKind::Error, message.clone());
        ExportOutcome::Failed { message }
    }

    fn enter_cooldown(&self, expires_at_ms: i64) {
        let remaining = remaining_secs(expires_at_ms, self.inner.clock.now_ms());
        self.inner.state.send_replace(ExportState::Cooldown {
            expires_at_ms,
            remaining_secs: remaining,
        });

        let mut ticker = self.lock_ticker();
        if let Some(previous) = ticker.take() {
            previous.abort();
        }
        if self.is_disposed() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                *ticker = Some(handle.spawn(run_ticker(Arc::downgrade(&self.inner))));
            }
            Err(_) => {
                warn!("no async runtime available; countdown advances only on explicit ticks");
            }
        }
    }

    fn lock_ticker(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.inner.ticker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("export ticker mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}

async fn run_ticker(inner: Weak<Inner>) {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let exporter = BatchExporter { inner };
        if !matches!(exporter.tick(), ExportState::Cooldown { .. }) {
            break;
        }
    }
}
