//! One mounted analysis list: favorites, display ordering and export.
//!
//! # Design
//! - The session owns every per-mount resource; dropping it disposes them.
//! - Collaborators are injected through [`SessionDeps`] so tests and the CLI
//!   choose their own clock, storage and download destination.

use std::path::PathBuf;
use std::sync::Arc;

use intrix_api_models::AnalysisSummary;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::api::AnalysisApi;
use crate::clock::Clock;
use crate::error::ClientResult;
use crate::export::{BatchExporter, ExportOutcome, ExportState};
use crate::favorites::{FavoriteStore, ToggleOutcome};
use crate::notify::Notifications;
use crate::sink::ArchiveSink;
use crate::storage::CooldownStore;
use crate::view::arrange;

/// Collaborators shared by the favorites store and the exporter.
#[derive(Clone)]
pub struct SessionDeps {
    /// Backend API.
    pub api: Arc<dyn AnalysisApi>,
    /// Time source for cooldown and notification deadlines.
    pub clock: Arc<dyn Clock>,
    /// Durable cooldown storage.
    pub cooldown_store: Arc<dyn CooldownStore>,
    /// Destination for downloaded files.
    pub sink: Arc<dyn ArchiveSink>,
    /// File name for the favorites archive.
    pub archive_name: String,
}

/// File name used when saving a single analysis report.
#[must_use]
pub fn report_name(analysis_id: &str) -> String {
    format!("analysis_{analysis_id}.pdf")
}

/// State behind one rendering of the analysis list.
pub struct AnalysisListSession {
    api: Arc<dyn AnalysisApi>,
    sink: Arc<dyn ArchiveSink>,
    analyses: Vec<AnalysisSummary>,
    favorites_only: bool,
    favorites: FavoriteStore,
    exporter: BatchExporter,
    notifications: Notifications,
}

impl AnalysisListSession {
    /// Session with no analyses loaded yet.
    #[must_use]
    pub fn new(deps: &SessionDeps) -> Self {
        let notifications = Notifications::new(Arc::clone(&deps.clock));
        Self {
            api: Arc::clone(&deps.api),
            sink: Arc::clone(&deps.sink),
            analyses: Vec::new(),
            favorites_only: false,
            favorites: FavoriteStore::new(Arc::clone(&deps.api), notifications.clone()),
            exporter: BatchExporter::new(deps, notifications.clone()),
            notifications,
        }
    }

    /// Install `analyses`, start their favorite lookups and resume any cooldown.
    ///
    /// Favorite state from a previous mount is discarded first.
    pub fn mount(&mut self, analyses: Vec<AnalysisSummary>) -> ExportState {
        debug!(count = analyses.len(), "mounting analysis list");
        self.favorites.reset();
        self.favorites
            .sync_ids(analyses.iter().map(|analysis| analysis.id.clone()));
        self.analyses = analyses;
        self.exporter.restore()
    }

    /// Fetch the user's history and mount it.
    ///
    /// # Errors
    /// Returns an error when the history request fails.
    pub async fn load(&mut self) -> ClientResult<ExportState> {
        let analyses = self.api.fetch_history().await?;
        info!(count = analyses.len(), "analysis history loaded");
        Ok(self.mount(analyses))
    }

    /// Wait for outstanding favorite lookups.
    pub async fn settle(&self) {
        self.favorites.settle().await;
    }

    /// Analyses in display order.
    #[must_use]
    pub fn visible(&self) -> Vec<&AnalysisSummary> {
        arrange(&self.analyses, &self.favorites.snapshot(), self.favorites_only)
    }

    /// Every mounted analysis in backend order.
    #[must_use]
    pub fn analyses(&self) -> &[AnalysisSummary] {
        &self.analyses
    }

    /// Whether only favorites are shown.
    #[must_use]
    pub const fn favorites_only(&self) -> bool {
        self.favorites_only
    }

    /// Show only favorites, or everything.
    pub fn set_favorites_only(&mut self, favorites_only: bool) {
        self.favorites_only = favorites_only;
    }

    /// Flip the favorites-only filter, returning the new value.
    pub fn toggle_favorites_only(&mut self) -> bool {
        self.favorites_only = !self.favorites_only;
        self.favorites_only
    }

    /// Toggle the favorite flag of one analysis.
    pub async fn toggle_favorite(&self, analysis_id: &str) -> ToggleOutcome {
        self.favorites.toggle(analysis_id).await
    }

    /// Whether the export control is enabled.
    #[must_use]
    pub fn can_export(&self) -> bool {
        self.exporter.can_export(self.favorites.favorite_count())
    }

    /// Export every favorited analysis.
    pub async fn export(&self) -> ExportOutcome {
        self.exporter.export(self.favorites.favorited_ids()).await
    }

    /// Download the rendered report for one analysis.
    ///
    /// # Errors
    /// Returns an error when the download or the write fails.
    pub async fn download_report(&self, analysis_id: &str) -> ClientResult<PathBuf> {
        let bytes = self.api.download_report(analysis_id).await?;
        self.sink.save(&report_name(analysis_id), &bytes)
    }

    /// `MM:SS` countdown while exports are cooling down.
    #[must_use]
    pub fn countdown(&self) -> Option<String> {
        self.exporter.tick();
        self.exporter.countdown_label()
    }

    /// Current exporter state.
    #[must_use]
    pub fn export_state(&self) -> ExportState {
        self.exporter.state()
    }

    /// Follow exporter state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ExportState> {
        self.exporter.subscribe()
    }

    /// Favorite state for the mounted analyses.
    #[must_use]
    pub const fn favorites(&self) -> &FavoriteStore {
        &self.favorites
    }

    /// Notifications raised by this session.
    #[must_use]
    pub const fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    /// Cancel background work; later results are discarded.
    pub fn dispose(&self) {
        self.favorites.dispose();
        self.exporter.dispose();
    }
}

impl Drop for AnalysisListSession {
    fn drop(&mut self) {
        self.dispose();
    }
}
