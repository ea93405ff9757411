//! Transient user-facing notifications.
//!
//! # Design
//! - Each notification gets a monotonic id and an absolute dismiss deadline.
//! - Deadlines are computed from the injected [`Clock`]; expired entries are
//!   pruned lazily when the list is read.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tracing::error;

use crate::clock::Clock;

/// Default time a notification stays visible.
pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(4);

/// Severity classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Informational message.
    Info,
    /// Operation completed.
    Success,
    /// Nothing failed, but the user should look.
    Warning,
    /// Operation failed.
    Error,
}

impl NotificationKind {
    /// Lowercase label used by renderers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A single notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Monotonic identifier.
    pub id: u64,
    /// Severity classification.
    pub kind: NotificationKind,
    /// Display message.
    pub message: String,
    /// Epoch-ms deadline after which the notification is dismissed.
    pub dismiss_at_ms: i64,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    items: Vec<Notification>,
}

/// Shared notification queue.
#[derive(Clone)]
pub struct Notifications {
    inner: Arc<Mutex<Inner>>,
    clock: Arc<dyn Clock>,
}

impl Notifications {
    /// Create an empty queue reading time from `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            clock,
        }
    }

    /// Push a notification with the default time-to-live.
    pub fn push(&self, kind: NotificationKind, message: impl Into<String>) -> u64 {
        self.push_with_ttl(kind, message, DEFAULT_NOTIFICATION_TTL)
    }

    /// Push a notification that auto-dismisses after `ttl`.
    pub fn push_with_ttl(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        ttl: Duration,
    ) -> u64 {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let dismiss_at_ms = self.clock.now_ms().saturating_add(ttl_ms);
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.items.push(Notification {
            id,
            kind,
            message: message.into(),
            dismiss_at_ms,
        });
        id
    }

    /// Dismiss a notification before its deadline.
    pub fn dismiss(&self, id: u64) {
        self.lock().items.retain(|item| item.id != id);
    }

    /// Notifications still visible at the current time, oldest first.
    #[must_use]
    pub fn active(&self) -> Vec<Notification> {
        let now = self.clock.now_ms();
        let mut inner = self.lock();
        inner.items.retain(|item| item.dismiss_at_ms > now);
        inner.items.clone()
    }

    /// Take every queued notification regardless of deadline.
    #[must_use]
    pub fn drain(&self) -> Vec<Notification> {
        std::mem::take(&mut self.lock().items)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("notification mutex poisoned; continuing with recovered guard");
                poisoned.into_inner()
            }
        }
    }
}
