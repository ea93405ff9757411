//! Per-analysis favorite state with optimistic toggles.
//!
//! # Design
//! - Every id maps to a [`FavoriteEntry`] that records where its value came
//!   from; rendering only ever needs [`FavoriteEntry::value`].
//! - Status lookups run as independent Tokio tasks keyed by id. A lookup only
//!   writes while its entry is still [`FavoriteEntry::Pending`] and no toggle is
//!   in flight, so a slow lookup never overwrites a user action.
//! - Once disposed, no task or toggle mutates state or emits notifications.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::api::AnalysisApi;
use crate::notify::{NotificationKind, Notifications};

/// Message shown after a successful add.
pub const ADDED_MESSAGE: &str = "Added to favorites";
/// Message shown after a successful removal.
pub const REMOVED_MESSAGE: &str = "Removed from favorites";
/// Message shown when a toggle is rolled back.
pub const TOGGLE_FAILED_MESSAGE: &str = "Failed to update favorite status";

/// Favorite value for one analysis, tagged with its provenance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FavoriteEntry {
    /// Awaiting the remote lookup or an in-flight toggle; holds the value shown meanwhile.
    Pending(bool),
    /// Confirmed by the backend.
    Committed(bool),
    /// A toggle failed and the previous value was restored.
    RolledBack(bool),
}

impl FavoriteEntry {
    /// Value to render.
    #[must_use]
    pub const fn value(self) -> bool {
        match self {
            Self::Pending(value) | Self::Committed(value) | Self::RolledBack(value) => value,
        }
    }

    /// Whether the entry is still waiting on the backend.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

/// Result of [`FavoriteStore::toggle`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The analysis is now a favorite.
    Added,
    /// The analysis is no longer a favorite.
    Removed,
    /// The backend rejected the change; `restored` is the value put back.
    RolledBack {
        /// Value restored after the failure.
        restored: bool,
    },
    /// A toggle for the same id was already in flight.
    Ignored,
    /// The store was disposed before the toggle completed.
    Abandoned,
}

/// Point-in-time copy of favorite values, detached from the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FavoriteSnapshot {
    values: HashMap<String, bool>,
}

impl FavoriteSnapshot {
    /// Whether `id` is favorited; unknown ids are not.
    #[must_use]
    pub fn is_favorite(&self, id: &str) -> bool {
        self.values.get(id).copied().unwrap_or(false)
    }

    /// Favorited ids in lexical order.
    #[must_use]
    pub fn favorited_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .values
            .iter()
            .filter(|(_, favorited)| **favorited)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Number of favorited ids.
    #[must_use]
    pub fn favorite_count(&self) -> usize {
        self.values.values().filter(|favorited| **favorited).count()
    }
}

impl FromIterator<(String, bool)> for FavoriteSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, bool)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[derive(Default)]
struct State {
    entries: HashMap<String, FavoriteEntry>,
    loading: HashSet<String>,
    lookup_tokens: HashMap<String, u64>,
    lookups: HashMap<String, JoinHandle<()>>,
    generation: u64,
}

/// Favorite state for the analyses shown in one list.
pub struct FavoriteStore {
    api: Arc<dyn AnalysisApi>,
    notifications: Notifications,
    state: Arc<Mutex<State>>,
    next_token: AtomicU64,
    disposed: Arc<AtomicBool>,
}

impl FavoriteStore {
    /// Empty store issuing requests through `api`.
    #[must_use]
    pub fn new(api: Arc<dyn AnalysisApi>, notifications: Notifications) -> Self {
        Self {
            api,
            notifications,
            state: Arc::new(Mutex::new(State::default())),
            next_token: AtomicU64::new(0),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start an independent status lookup for each id.
    ///
    /// Entries are created as `Pending(false)` until their lookup lands. A
    /// failed lookup commits `false` for that id only. Re-syncing an id aborts
    /// its previous lookup. Must be called from within a Tokio runtime.
    pub fn sync_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.is_disposed() {
            return;
        }
        for id in ids {
            self.sync(id.into());
        }
    }

    /// Start (or restart) the status lookup for a single id.
    pub fn sync(&self, id: String) {
        if self.is_disposed() {
            return;
        }
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut state = lock_state(&self.state);
        let current = state.entries.get(&id).is_some_and(|entry| entry.value());
        state.entries.insert(id.clone(), FavoriteEntry::Pending(current));
        state.lookup_tokens.insert(id.clone(), token);

        let api = Arc::clone(&self.api);
        let shared = Arc::clone(&self.state);
        let disposed = Arc::clone(&self.disposed);
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            let favorited = match api.favorite_status(&task_id).await {
                Ok(favorited) => favorited,
                Err(err) => {
                    warn!(
                        analysis_id = %task_id,
                        error = %err,
                        "favorite lookup failed; defaulting to false"
                    );
                    false
                }
            };
            if disposed.load(Ordering::SeqCst) {
                return;
            }
            let mut state = lock_state(&shared);
            if state.lookup_tokens.get(&task_id) != Some(&token) {
                return;
            }
            state.lookup_tokens.remove(&task_id);
            let still_pending = state
                .entries
                .get(&task_id)
                .is_some_and(|entry| entry.is_pending());
            if still_pending && !state.loading.contains(&task_id) {
                state
                    .entries
                    .insert(task_id, FavoriteEntry::Committed(favorited));
            }
        });

        if let Some(previous) = state.lookups.insert(id, handle) {
            previous.abort();
        }
    }

    /// Record a value the backend already confirmed, cancelling any lookup
    /// for `id`. Ignored while a toggle for `id` is in flight.
    pub fn confirm(&self, id: &str, favorited: bool) {
        if self.is_disposed() {
            return;
        }
        let mut state = lock_state(&self.state);
        if state.loading.contains(id) {
            return;
        }
        state.lookup_tokens.remove(id);
        if let Some(lookup) = state.lookups.remove(id) {
            lookup.abort();
        }
        state
            .entries
            .insert(id.to_string(), FavoriteEntry::Committed(favorited));
    }

    /// Drop every entry and cancel outstanding lookups.
    ///
    /// Toggles still in flight complete remotely but no longer touch state and
    /// report [`ToggleOutcome::Abandoned`].
    pub fn reset(&self) {
        let mut state = lock_state(&self.state);
        for (_, handle) in state.lookups.drain() {
            handle.abort();
        }
        state.entries.clear();
        state.loading.clear();
        state.lookup_tokens.clear();
        state.generation = state.generation.wrapping_add(1);
    }

    /// Wait for every lookup started so far.
    pub async fn settle(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut state = lock_state(&self.state);
            state.lookups.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!(error = %err, "favorite lookup task panicked");
                }
            }
        }
    }

    /// Flip the favorite flag for `id` optimistically and confirm it remotely.
    ///
    /// While a toggle for `id` is in flight, further toggles for the same id
    /// return [`ToggleOutcome::Ignored`] without touching state.
    pub async fn toggle(&self, id: &str) -> ToggleOutcome {
        if self.is_disposed() {
            return ToggleOutcome::Abandoned;
        }
        let (previous, generation) = {
            let mut state = lock_state(&self.state);
            if state.loading.contains(id) {
                debug!(analysis_id = %id, "toggle ignored while previous request is in flight");
                return ToggleOutcome::Ignored;
            }
            let previous = state.entries.get(id).is_some_and(|entry| entry.value());
            state
                .entries
                .insert(id.to_string(), FavoriteEntry::Pending(!previous));
            state.loading.insert(id.to_string());
            (previous, state.generation)
        };
        let next = !previous;

        let result = if next {
            self.api.add_favorite(id).await
        } else {
            self.api.remove_favorite(id).await
        };

        if self.is_disposed() {
            return ToggleOutcome::Abandoned;
        }

        let mut state = lock_state(&self.state);
        if state.generation != generation {
            debug!(analysis_id = %id, "favorite state was reset during toggle");
            return ToggleOutcome::Abandoned;
        }
        state.loading.remove(id);
        match result {
            Ok(()) => {
                state
                    .entries
                    .insert(id.to_string(), FavoriteEntry::Committed(next));
                drop(state);
                if next {
                    self.notifications.push(NotificationKind::Success, ADDED_MESSAGE);
                    ToggleOutcome::Added
                } else {
                    self.notifications
                        .push(NotificationKind::Success, REMOVED_MESSAGE);
                    ToggleOutcome::Removed
                }
            }
            Err(err) => {
                state
                    .entries
                    .insert(id.to_string(), FavoriteEntry::RolledBack(previous));
                drop(state);
                warn!(analysis_id = %id, error = %err, "favorite toggle failed; rolled back");
                self.notifications
                    .push(NotificationKind::Error, TOGGLE_FAILED_MESSAGE);
                ToggleOutcome::RolledBack { restored: previous }
            }
        }
    }

    /// Current entry for `id`.
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<FavoriteEntry> {
        lock_state(&self.state).entries.get(id).copied()
    }

    /// Whether `id` renders as a favorite.
    #[must_use]
    pub fn is_favorite(&self, id: &str) -> bool {
        self.entry(id).is_some_and(FavoriteEntry::value)
    }

    /// Whether a toggle for `id` is in flight.
    #[must_use]
    pub fn is_loading(&self, id: &str) -> bool {
        lock_state(&self.state).loading.contains(id)
    }

    /// Detached copy of every favorite value.
    #[must_use]
    pub fn snapshot(&self) -> FavoriteSnapshot {
        lock_state(&self.state)
            .entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.value()))
            .collect()
    }

    /// Favorited ids in lexical order.
    #[must_use]
    pub fn favorited_ids(&self) -> Vec<String> {
        self.snapshot().favorited_ids()
    }

    /// Number of favorited ids.
    #[must_use]
    pub fn favorite_count(&self) -> usize {
        lock_state(&self.state)
            .entries
            .values()
            .filter(|entry| entry.value())
            .count()
    }

    /// Cancel outstanding lookups and stop all further state changes.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut state = lock_state(&self.state);
        for (_, handle) in state.lookups.drain() {
            handle.abort();
        }
        state.lookup_tokens.clear();
    }

    /// Whether [`FavoriteStore::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Drop for FavoriteStore {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn lock_state(state: &Mutex<State>) -> MutexGuard<'_, State> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!("favorite state mutex poisoned; continuing with recovered guard");
            poisoned.into_inner()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::{Call, FakeApi};

    fn store_with(api: &Arc<FakeApi>) -> (FavoriteStore, Notifications) {
        let notifications = Notifications::new(Arc::new(ManualClock::new(0)));
        let store = FavoriteStore::new(api.clone(), notifications.clone());
        (store, notifications)
    }

    #[tokio::test]
    async fn lookups_populate_entries_and_isolate_failures() {
        let api = Arc::new(FakeApi::with_statuses([("a", true), ("b", false), ("c", true)]));
        api.fail_lookup("c");
        let (store, notifications) = store_with(&api);

        store.sync_ids(["a", "b", "c"]);
        store.settle().await;

        assert_eq!(store.entry("a"), Some(FavoriteEntry::Committed(true)));
        assert_eq!(store.entry("b"), Some(FavoriteEntry::Committed(false)));
        assert_eq!(store.entry("c"), Some(FavoriteEntry::Committed(false)));
        assert_eq!(store.favorited_ids(), vec!["a".to_string()]);
        assert!(notifications.drain().is_empty());
    }

    #[tokio::test]
    async fn entries_are_pending_false_until_lookup_lands() {
        let api = Arc::new(FakeApi::with_statuses([("a", true)]));
        let gate = api.close_gate();
        let (store, _) = store_with(&api);

        store.sync_ids(["a"]);
        assert_eq!(store.entry("a"), Some(FavoriteEntry::Pending(false)));
        assert!(!store.is_favorite("a"));

        gate.add_permits(1);
        store.settle().await;
        assert!(store.is_favorite("a"));
    }

    #[tokio::test]
    async fn toggle_twice_returns_to_original_value() {
        let api = Arc::new(FakeApi::with_statuses([("a", false)]));
        let (store, notifications) = store_with(&api);
        store.sync_ids(["a"]);
        store.settle().await;

        assert_eq!(store.toggle("a").await, ToggleOutcome::Added);
        assert!(store.is_favorite("a"));
        assert_eq!(store.toggle("a").await, ToggleOutcome::Removed);
        assert_eq!(store.entry("a"), Some(FavoriteEntry::Committed(false)));

        let messages: Vec<_> = notifications
            .drain()
            .into_iter()
            .map(|item| item.message)
            .collect();
        assert_eq!(messages, vec![ADDED_MESSAGE, REMOVED_MESSAGE]);
        assert_eq!(
            api.calls()[1..],
            [Call::Add("a".to_string()), Call::Remove("a".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_toggle_rolls_back_and_notifies() {
        let api = Arc::new(FakeApi::with_statuses([("a", true)]));
        let (store, notifications) = store_with(&api);
        store.sync_ids(["a"]);
        store.settle().await;
        api.fail_toggles(true);

        let outcome = store.toggle("a").await;

        assert_eq!(outcome, ToggleOutcome::RolledBack { restored: true });
        assert_eq!(store.entry("a"), Some(FavoriteEntry::RolledBack(true)));
        assert!(!store.is_loading("a"));
        let drained = notifications.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].kind, NotificationKind::Error);
        assert_eq!(drained[0].message, TOGGLE_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn toggles_while_loading_are_ignored() {
        let api = Arc::new(FakeApi::default());
        let gate = api.close_gate();
        let (store, _) = store_with(&api);
        let store = Arc::new(store);

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.toggle("a").await }
        });
        while !store.is_loading("a") {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.entry("a"), Some(FavoriteEntry::Pending(true)));
        assert_eq!(store.toggle("a").await, ToggleOutcome::Ignored);

        gate.add_permits(1);
        assert_eq!(first.await.unwrap(), ToggleOutcome::Added);
        assert_eq!(api.count(|call| matches!(call, Call::Add(_))), 1);
    }

    #[tokio::test]
    async fn slow_lookup_does_not_overwrite_user_toggle() {
        let api = Arc::new(FakeApi::with_statuses([("a", false)]));
        let gate = api.close_gate();
        let (store, _) = store_with(&api);
        let store = Arc::new(store);

        store.sync_ids(["a"]);
        let toggle = tokio::spawn({
            let store = store.clone();
            async move { store.toggle("a").await }
        });
        while !store.is_loading("a") {
            tokio::task::yield_now().await;
        }
        gate.add_permits(2);
        assert_eq!(toggle.await.unwrap(), ToggleOutcome::Added);
        store.settle().await;

        assert_eq!(store.entry("a"), Some(FavoriteEntry::Committed(true)));
    }

    #[tokio::test]
    async fn dispose_cancels_lookups_and_abandons_toggles() {
        let api = Arc::new(FakeApi::with_statuses([("a", true)]));
        let gate = api.close_gate();
        let (store, notifications) = store_with(&api);
        let store = Arc::new(store);

        store.sync_ids(["a"]);
        let toggle = tokio::spawn({
            let store = store.clone();
            async move { store.toggle("b").await }
        });
        while !store.is_loading("b") {
            tokio::task::yield_now().await;
        }

        store.dispose();
        gate.add_permits(2);
        assert_eq!(toggle.await.unwrap(), ToggleOutcome::Abandoned);
        store.settle().await;

        assert_eq!(store.entry("a"), Some(FavoriteEntry::Pending(false)));
        assert!(notifications.drain().is_empty());
        assert_eq!(store.toggle("a").await, ToggleOutcome::Abandoned);
    }

    #[tokio::test]
    async fn reset_drops_entries_and_cancels_lookups() {
        let api = Arc::new(FakeApi::with_statuses([("a", true), ("b", true)]));
        let (store, _) = store_with(&api);
        store.sync_ids(["a"]);
        store.settle().await;
        assert_eq!(store.favorited_ids(), vec!["a".to_string()]);

        let gate = api.close_gate();
        store.sync_ids(["b"]);
        store.reset();
        gate.add_permits(2);
        store.settle().await;

        assert_eq!(store.entry("a"), None);
        assert_eq!(store.entry("b"), None);
        assert_eq!(store.favorite_count(), 0);
    }

    #[tokio::test]
    async fn toggle_spanning_reset_leaves_state_untouched() {
        let api = Arc::new(FakeApi::default());
        let gate = api.close_gate();
        let (store, notifications) = store_with(&api);
        let store = Arc::new(store);

        let toggle = tokio::spawn({
            let store = store.clone();
            async move { store.toggle("a").await }
        });
        while !store.is_loading("a") {
            tokio::task::yield_now().await;
        }
        store.reset();
        gate.add_permits(1);

        assert_eq!(toggle.await.unwrap(), ToggleOutcome::Abandoned);
        assert_eq!(store.entry("a"), None);
        assert!(notifications.drain().is_empty());
    }

    #[tokio::test]
    async fn confirm_replaces_pending_lookup() {
        let api = Arc::new(FakeApi::with_statuses([("a", false)]));
        let gate = api.close_gate();
        let (store, _) = store_with(&api);

        store.sync_ids(["a"]);
        store.confirm("a", true);
        gate.add_permits(1);
        store.settle().await;

        assert_eq!(store.entry("a"), Some(FavoriteEntry::Committed(true)));
    }

    #[test]
    fn snapshot_reports_counts_and_sorted_ids() {
        let snapshot: FavoriteSnapshot = [
            ("z".to_string(), true),
            ("a".to_string(), true),
            ("m".to_string(), false),
        ]
        .into_iter()
        .collect();
        assert_eq!(snapshot.favorite_count(), 2);
        assert_eq!(snapshot.favorited_ids(), vec!["a".to_string(), "z".to_string()]);
        assert!(!snapshot.is_favorite("m"));
        assert!(!snapshot.is_favorite("unknown"));
    }
}
