//! Debounced remote search.
//!
//! `Idle -> Pending -> Fetching -> Idle`. Every issued request gets a sequence
//! token and a response is applied only while its token is still the latest
//! one. Any query change advances the token too, so a slow answer to an old
//! query never replaces a newer result, local or remote.

use crate::core::normalize::normalize;
use crate::domain::model::{CatalogRecord, SearchContext, SearchRequest};
use crate::domain::ports::SearchBackend;
use crate::utils::error::Result;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_RESULT_LIMIT: usize = 20;
pub const MAX_RESULT_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub debounce: Duration,
    pub result_limit: usize,
}

impl SearchSettings {
    /// Result-size limit sent with every request, capped at [`MAX_RESULT_LIMIT`].
    pub fn limit(&self) -> usize {
        self.result_limit.clamp(1, MAX_RESULT_LIMIT)
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Pending,
    Fetching,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchStatus {
    pub phase: SearchPhase,
    /// Most recent sequence token.
    pub latest_token: u64,
    /// Token of the response currently held as the remote override.
    pub applied_token: Option<u64>,
}

struct ControllerState {
    phase: SearchPhase,
    query: String,
    context: SearchContext,
    generation: u64,
    latest_token: u64,
    debounce: Option<JoinHandle<()>>,
    remote: Option<Arc<Vec<CatalogRecord>>>,
    applied_token: Option<u64>,
}

impl ControllerState {
    fn status(&self) -> SearchStatus {
        SearchStatus {
            phase: self.phase,
            latest_token: self.latest_token,
            applied_token: self.applied_token,
        }
    }

    fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }
}

struct Shared {
    backend: Arc<dyn SearchBackend>,
    settings: SearchSettings,
    state: Mutex<ControllerState>,
    status: watch::Sender<SearchStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, state: &ControllerState) {
        self.status.send_replace(state.status());
    }

    /// Debounce window elapsed: hand out a token and start the request.
    fn issue(shared: Arc<Shared>, generation: u64, request: SearchRequest) {
        let token = {
            let mut state = shared.lock();
            if state.generation != generation {
                return;
            }
            state.debounce = None;
            state.latest_token += 1;
            state.phase = SearchPhase::Fetching;
            shared.publish(&state);
            state.latest_token
        };

        tracing::debug!(query = %request.query, token, "Issuing remote search");

        // In-flight requests are never aborted; the token check neutralizes them.
        tokio::spawn(async move {
            let outcome = shared.backend.search(&request).await;
            shared.settle(token, &request, outcome);
        });
    }

    fn settle(&self, token: u64, request: &SearchRequest, outcome: Result<Vec<serde_json::Value>>) {
        let records = match outcome {
            Ok(raw) => decode_records(raw, request.limit),
            Err(e) => {
                tracing::warn!(query = %request.query, token, "Remote search failed: {}", e);
                Vec::new()
            }
        };

        let mut state = self.lock();
        if token != state.latest_token {
            tracing::debug!(
                token,
                latest = state.latest_token,
                "Discarding stale search response"
            );
            return;
        }

        // A failed search settles as an empty answer.
        tracing::debug!(token, count = records.len(), "Applying remote search results");
        state.remote = Some(Arc::new(records));
        state.applied_token = Some(token);
        if state.phase == SearchPhase::Fetching {
            state.phase = SearchPhase::Idle;
        }
        self.publish(&state);
    }
}

/// Normalizes raw records, skips the ones that do not decode and caps the list at `limit`.
pub fn decode_records(raw: Vec<serde_json::Value>, limit: usize) -> Vec<CatalogRecord> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value(normalize(value)) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("Skipping malformed catalog record: {}", e);
                None
            }
        })
        .take(limit)
        .collect()
}

/// Cheap to clone; clones share one controller.
#[derive(Clone)]
pub struct SearchController {
    shared: Arc<Shared>,
}

impl SearchController {
    pub fn new(backend: Arc<dyn SearchBackend>, settings: SearchSettings) -> Self {
        let state = ControllerState {
            phase: SearchPhase::Idle,
            query: String::new(),
            context: SearchContext::default(),
            generation: 0,
            latest_token: 0,
            debounce: None,
            remote: None,
            applied_token: None,
        };
        let (status, _) = watch::channel(state.status());

        Self {
            shared: Arc::new(Shared {
                backend,
                settings,
                state: Mutex::new(state),
                status,
            }),
        }
    }

    pub fn settings(&self) -> &SearchSettings {
        &self.shared.settings
    }

    /// Feeds a new query. Any change drops the remote override right away, so
    /// the local result shows until the new query settles. A blank query never
    /// reaches the network; anything else restarts the debounce window.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn set_query(&self, query: &str, context: &SearchContext) {
        let query = query.trim();
        let mut state = self.shared.lock();

        if !query.is_empty() && state.query == query && state.context == *context {
            return;
        }

        state.cancel_debounce();
        state.generation += 1;
        // Invalidates whatever is still in flight.
        state.latest_token += 1;
        state.remote = None;
        state.applied_token = None;

        if query.is_empty() {
            state.query.clear();
            state.phase = SearchPhase::Idle;
            self.shared.publish(&state);
            return;
        }

        state.query = query.to_string();
        state.context = context.clone();
        state.phase = SearchPhase::Pending;

        let generation = state.generation;
        let request = SearchRequest {
            query: state.query.clone(),
            context: context.clone(),
            limit: self.shared.settings.limit(),
        };
        let shared = Arc::clone(&self.shared);
        let delay = shared.settings.debounce;
        state.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            Shared::issue(shared, generation, request);
        }));

        self.shared.publish(&state);
    }

    pub fn clear(&self) {
        self.set_query("", &SearchContext::default());
    }

    pub fn query(&self) -> String {
        self.shared.lock().query.clone()
    }

    pub fn phase(&self) -> SearchPhase {
        self.shared.lock().phase
    }

    pub fn status(&self) -> SearchStatus {
        self.shared.lock().status()
    }

    /// The accepted remote response, if any. Authoritative over the local filter.
    pub fn remote_override(&self) -> Option<Arc<Vec<CatalogRecord>>> {
        self.shared.lock().remote.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchStatus> {
        self.shared.status.subscribe()
    }

    /// Resolves once the controller is back to `Idle`.
    pub async fn settled(&self) {
        let mut rx = self.subscribe();
        let _ = rx.wait_for(|status| status.phase == SearchPhase::Idle).await;
    }
}
