//! Job list state and the search state machine.
//!
//! [`JobListController`] owns two lists: every fetched posting, sorted by
//! recency, and the subset currently displayed. Free-text input either resets
//! the displayed list to everything (short input) or starts a remote search
//! that supersedes any search still in flight.
//!
//! Every change is published as a [`JobListView`] snapshot on a
//! `tokio::sync::watch` channel, so renderers only ever read.
//!
//! Supersession uses a generation counter: each `search()` bumps it and a
//! finishing search applies its result only if its generation is still
//! current. The superseded task is also aborted, but the counter alone is
//! enough to keep stale results out.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use crate::api::JobSource;
use crate::models::Job;

/// Inputs of this many characters or fewer show the full list instead of searching.
pub const MIN_SEARCH_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    ShowingAll,
    Pending { query: String },
    ShowingResults { query: String },
}

/// Immutable snapshot handed to subscribers.
#[derive(Debug, Clone)]
pub struct JobListView {
    pub load: LoadState,
    pub search: SearchState,
    pub displayed: Arc<Vec<Job>>,
}

impl JobListView {
    /// First `count` displayed jobs, for the compact widget.
    pub fn preview(&self, count: usize) -> &[Job] {
        &self.displayed[..count.min(self.displayed.len())]
    }

    pub fn is_settled(&self) -> bool {
        self.load != LoadState::Loading && !matches!(self.search, SearchState::Pending { .. })
    }
}

/// What the displayed list currently holds.
#[derive(Debug, Clone)]
enum Shown {
    All,
    Results { query: String },
}

#[derive(Debug)]
struct PendingSearch {
    generation: u64,
    query: String,
    abort: AbortHandle,
}

#[derive(Debug)]
struct State {
    all: Arc<Vec<Job>>,
    displayed: Arc<Vec<Job>>,
    shown: Shown,
    load: LoadState,
    load_generation: u64,
    search_generation: u64,
    pending: Option<PendingSearch>,
    last_navigated: Option<String>,
    navigating: Option<String>,
}

impl State {
    fn search_state(&self) -> SearchState {
        match (&self.pending, &self.shown) {
            (Some(p), _) => SearchState::Pending {
                query: p.query.clone(),
            },
            (None, Shown::All) => SearchState::ShowingAll,
            (None, Shown::Results { query }) => SearchState::ShowingResults {
                query: query.clone(),
            },
        }
    }

    fn view(&self) -> JobListView {
        JobListView {
            load: self.load.clone(),
            search: self.search_state(),
            displayed: Arc::clone(&self.displayed),
        }
    }

    fn cancel_pending(&mut self) {
        self.search_generation += 1;
        if let Some(pending) = self.pending.take() {
            tracing::debug!(query = %pending.query, "canceling superseded search");
            pending.abort.abort();
        }
    }

    fn show_all(&mut self) {
        self.displayed = Arc::new(self.all.as_ref().clone());
        self.shown = Shown::All;
    }
}

struct Inner {
    source: Arc<dyn JobSource>,
    state: Mutex<State>,
    updates: watch::Sender<JobListView>,
}

/// Cloning yields another handle to the same list. Methods that spawn work
/// must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct JobListController {
    inner: Arc<Inner>,
}

impl JobListController {
    pub fn new(source: Arc<dyn JobSource>) -> Self {
        let state = State {
            all: Arc::new(Vec::new()),
            displayed: Arc::new(Vec::new()),
            shown: Shown::All,
            load: LoadState::Idle,
            load_generation: 0,
            search_generation: 0,
            pending: None,
            last_navigated: None,
            navigating: None,
        };
        let (updates, _) = watch::channel(state.view());
        Self {
            inner: Arc::new(Inner {
                source,
                state: Mutex::new(state),
                updates,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &State) {
        self.inner.updates.send_replace(state.view());
    }

    // --- Read side ---

    pub fn subscribe(&self) -> watch::Receiver<JobListView> {
        self.inner.updates.subscribe()
    }

    pub fn view(&self) -> JobListView {
        self.lock().view()
    }

    pub fn displayed_jobs(&self) -> Arc<Vec<Job>> {
        Arc::clone(&self.lock().displayed)
    }

    pub fn all_jobs(&self) -> Arc<Vec<Job>> {
        Arc::clone(&self.lock().all)
    }

    pub fn search_state(&self) -> SearchState {
        self.lock().search_state()
    }

    pub fn load_state(&self) -> LoadState {
        self.lock().load.clone()
    }

    // --- Operations ---

    /// Fetches every posting in the background. Calling it again retries;
    /// a load that finishes after a newer one started is dropped.
    pub fn initialize(&self) -> JoinHandle<()> {
        let generation = {
            let mut state = self.lock();
            state.load_generation += 1;
            state.load = LoadState::Loading;
            self.publish(&state);
            state.load_generation
        };

        let this = self.clone();
        tokio::spawn(async move {
            let result = this.inner.source.list_all().await;
            this.finish_load(generation, result);
        })
    }

    fn finish_load(&self, generation: u64, result: anyhow::Result<Vec<Job>>) {
        let mut state = self.lock();
        if state.load_generation != generation {
            tracing::debug!(generation, "discarding superseded job list");
            return;
        }

        match result {
            Ok(jobs) => {
                tracing::info!(count = jobs.len(), "loaded jobs");
                state.all = Arc::new(sort_by_recency(jobs));
                state.load = LoadState::Loaded;
                // Fresh data always lands in view; a search still in flight
                // was issued against the old list and is dropped.
                state.cancel_pending();
                state.show_all();
            }
            Err(e) => {
                let reason = format!("{:#}", e);
                tracing::warn!("failed to load jobs: {}", reason);
                state.load = LoadState::Failed(reason);
            }
        }
        self.publish(&state);
    }

    /// Shows every posting. A search still in flight is dropped.
    pub fn show_all(&self) {
        let mut state = self.lock();
        state.cancel_pending();
        state.show_all();
        self.publish(&state);
    }

    /// Runs the search state machine for new input.
    ///
    /// Short input cancels any search and shows everything before returning
    /// (`None`). Longer input supersedes the previous search and returns the
    /// handle of the new one.
    pub fn search(&self, text: &str) -> Option<JoinHandle<()>> {
        let mut state = self.lock();
        state.cancel_pending();

        if text.chars().count() <= MIN_SEARCH_LEN {
            state.show_all();
            self.publish(&state);
            return None;
        }

        let generation = state.search_generation;
        let query = text.to_string();
        tracing::debug!(generation, query = %query, "starting search");

        let this = self.clone();
        let task_query = query.clone();
        // Spawned while holding the lock, so the task cannot finish before
        // its pending entry exists.
        let handle = tokio::spawn(async move {
            let result = this.inner.source.search(&task_query).await;
            this.finish_search(generation, task_query, result);
        });
        state.pending = Some(PendingSearch {
            generation,
            query,
            abort: handle.abort_handle(),
        });
        self.publish(&state);
        Some(handle)
    }

    fn finish_search(
        &self,
        generation: u64,
        query: String,
        result: anyhow::Result<Vec<Option<Job>>>,
    ) {
        let mut state = self.lock();
        let current = state
            .pending
            .as_ref()
            .is_some_and(|p| p.generation == generation);
        if !current {
            tracing::debug!(generation, query = %query, "discarding superseded search result");
            return;
        }
        state.pending = None;

        match result {
            Ok(results) => {
                let jobs: Vec<Job> = results.into_iter().flatten().collect();
                tracing::debug!(count = jobs.len(), query = %query, "search finished");
                state.displayed = Arc::new(jobs);
                state.shown = Shown::Results { query };
            }
            Err(e) => {
                tracing::warn!(query = %query, "search failed, keeping current list: {:#}", e);
                if matches!(state.shown, Shown::All) {
                    state.show_all();
                }
            }
        }
        self.publish(&state);
    }

    /// Looks up `id` and hands the job to `on_found`.
    ///
    /// No-op if `id` was the last job navigated to or is already being looked
    /// up, so a re-fired deep link does not open the same page twice.
    pub fn navigate_to_detail<F>(&self, id: &str, on_found: F) -> Option<JoinHandle<()>>
    where
        F: FnOnce(Job) + Send + 'static,
    {
        {
            let mut state = self.lock();
            if state.last_navigated.as_deref() == Some(id) || state.navigating.as_deref() == Some(id)
            {
                tracing::debug!(id, "ignoring repeated navigation");
                return None;
            }
            state.navigating = Some(id.to_string());
        }

        let this = self.clone();
        let id = id.to_string();
        Some(tokio::spawn(async move {
            let found = match this.inner.source.get_by_id(&id).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(id = %id, "failed to fetch job: {:#}", e);
                    None
                }
            };

            {
                let mut state = this.lock();
                if state.navigating.as_deref() == Some(id.as_str()) {
                    state.navigating = None;
                }
                if found.is_some() {
                    state.last_navigated = Some(id.clone());
                }
            }

            match found {
                Some(job) => on_found(job),
                None => tracing::debug!(id = %id, "nothing to navigate to"),
            }
        }))
    }
}

/// Stable sort, newest first; ties keep their source order.
fn sort_by_recency(mut jobs: Vec<Job>) -> Vec<Job> {
    let now = Utc::now();
    jobs.sort_by_cached_key(|job| job.days_since_posted_at(now));
    jobs
}
