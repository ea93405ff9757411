//! Scripted [`AnalysisApi`] used by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use intrix_api_models::AnalysisSummary;
use tokio::sync::Semaphore;

use crate::api::{AnalysisApi, ExportResponse};
use crate::error::{ClientError, ClientResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Call {
    Status(String),
    Add(String),
    Remove(String),
    Export(Vec<String>),
    History,
    Report(String),
}

#[derive(Default)]
pub(crate) struct FakeApi {
    statuses: Mutex<HashMap<String, bool>>,
    failing_lookups: Mutex<HashSet<String>>,
    fail_toggles: AtomicBool,
    fail_export: AtomicBool,
    export: Mutex<Option<ExportResponse>>,
    history: Mutex<Vec<AnalysisSummary>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    calls: Mutex<Vec<Call>>,
}

fn unavailable(operation: &'static str) -> ClientError {
    ClientError::Status {
        operation,
        status: 503,
        message: None,
    }
}

impl FakeApi {
    pub(crate) fn with_statuses<'a>(statuses: impl IntoIterator<Item = (&'a str, bool)>) -> Self {
        let api = Self::default();
        api.statuses
            .lock()
            .unwrap()
            .extend(statuses.into_iter().map(|(id, fav)| (id.to_string(), fav)));
        api
    }

    pub(crate) fn fail_lookup(&self, id: &str) {
        self.failing_lookups.lock().unwrap().insert(id.to_string());
    }

    pub(crate) fn fail_toggles(&self, fail: bool) {
        self.fail_toggles.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_export(&self, fail: bool) {
        self.fail_export.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn script_export(&self, response: ExportResponse) {
        *self.export.lock().unwrap() = Some(response);
    }

    pub(crate) fn set_history(&self, items: Vec<AnalysisSummary>) {
        *self.history.lock().unwrap() = items;
    }

    /// Hold every subsequent call until permits are added to the returned gate.
    pub(crate) fn close_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    async fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
    }
}

#[async_trait]
impl AnalysisApi for FakeApi {
    async fn favorite_status(&self, analysis_id: &str) -> ClientResult<bool> {
        self.record(Call::Status(analysis_id.to_string())).await;
        if self.failing_lookups.lock().unwrap().contains(analysis_id) {
            return Err(unavailable("favorite_status"));
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(analysis_id)
            .copied()
            .unwrap_or(false))
    }

    async fn add_favorite(&self, analysis_id: &str) -> ClientResult<()> {
        self.record(Call::Add(analysis_id.to_string())).await;
        if self.fail_toggles.load(Ordering::SeqCst) {
            return Err(unavailable("favorite_add"));
        }
        self.statuses
            .lock()
            .unwrap()
            .insert(analysis_id.to_string(), true);
        Ok(())
    }

    async fn remove_favorite(&self, analysis_id: &str) -> ClientResult<()> {
        self.record(Call::Remove(analysis_id.to_string())).await;
        if self.fail_toggles.load(Ordering::SeqCst) {
            return Err(unavailable("favorite_remove"));
        }
        self.statuses
            .lock()
            .unwrap()
            .insert(analysis_id.to_string(), false);
        Ok(())
    }

    async fn export_favorites(&self, analysis_ids: &[String]) -> ClientResult<ExportResponse> {
        self.record(Call::Export(analysis_ids.to_vec())).await;
        if self.fail_export.load(Ordering::SeqCst) {
            return Err(unavailable("export_favorites"));
        }
        Ok(self
            .export
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ExportResponse::Archive(b"PK\x03\x04".to_vec())))
    }

    async fn fetch_history(&self) -> ClientResult<Vec<AnalysisSummary>> {
        self.record(Call::History).await;
        Ok(self.history.lock().unwrap().clone())
    }

    async fn download_report(&self, analysis_id: &str) -> ClientResult<Vec<u8>> {
        self.record(Call::Report(analysis_id.to_string())).await;
        Ok(format!("%PDF {analysis_id}").into_bytes())
    }
}

pub(crate) fn summary(id: &str, date: &str) -> AnalysisSummary {
    AnalysisSummary {
        id: id.to_string(),
        date: date.to_string(),
        channels: Vec::new(),
        copy: String::new(),
        strategy_summary: String::new(),
        style: String::new(),
    }
}
