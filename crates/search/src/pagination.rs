//! Paged, de-duplicated search results.
//!
//! [`PaginationController::search`] resolves tag filters, runs the first
//! page and stores the resulting query. [`load_more`](PaginationController::load_more)
//! re-runs that same query one page further. Every backend call is its
//! own progress-tracked task started through the [`TaskRunner`].
//!
//! The controller is shared by reference: a UI can call `load_more` from
//! a scroll handler while another caller runs `cancel`. State sits behind
//! a mutex that is never held across an `.await`; a generation counter
//! keeps a superseded search from merging its page.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clipseek_core::search::{SearchQuery, SearchResult, DEFAULT_PAGE_SIZE};
use clipseek_tasks::error::TaskError;
use clipseek_tasks::runner::TaskRunner;
use tokio_util::sync::CancellationToken;

use crate::backend::SearchBackend;
use crate::error::SearchError;
use crate::query::{ResolvedFilters, SearchRequest};

/// Read-only view of the pagination state.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageSnapshot {
    pub results: Vec<SearchResult>,
    /// Number of unique results accumulated so far.
    pub fetched: usize,
    pub has_more: bool,
    pub is_fetching: bool,
    /// Offset of the last page merged.
    pub offset: usize,
    pub error: Option<String>,
}

struct PageState {
    query: Option<SearchQuery>,
    offset: usize,
    results: Vec<SearchResult>,
    seen: HashSet<String>,
    has_more: bool,
    is_fetching: bool,
    error: Option<String>,
    generation: u64,
    cancel: CancellationToken,
    cancelled: bool,
}

impl PageState {
    fn new() -> Self {
        Self {
            query: None,
            offset: 0,
            results: Vec::new(),
            seen: HashSet::new(),
            has_more: false,
            is_fetching: false,
            error: None,
            generation: 0,
            cancel: CancellationToken::new(),
            cancelled: false,
        }
    }

    /// Append the unseen items of `page`; returns how many were added.
    fn merge(&mut self, page: Vec<SearchResult>) -> usize {
        let before = self.results.len();
        for item in page {
            if self.seen.insert(item.id.clone()) {
                self.results.push(item);
            }
        }
        self.results.len() - before
    }

    /// Record the end of a failed fetch.
    fn fail(&mut self, err: &SearchError) {
        self.is_fetching = false;
        self.has_more = false;
        if !err.is_cancelled() {
            self.error = Some(err.to_string());
        }
    }
}

/// Drives one search and its follow-up pages.
pub struct PaginationController {
    backend: Arc<dyn SearchBackend>,
    runner: TaskRunner,
    page_size: usize,
    state: Mutex<PageState>,
}

impl PaginationController {
    pub fn new(backend: Arc<dyn SearchBackend>, runner: TaskRunner) -> Self {
        Self::with_page_size(backend, runner, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(backend: Arc<dyn SearchBackend>, runner: TaskRunner, page_size: usize) -> Self {
        Self {
            backend,
            runner,
            page_size,
            state: Mutex::new(PageState::new()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Start a new search, discarding previous results.
    ///
    /// Tag filters are resolved one after the other before the first page
    /// is requested; a failure there aborts the search. Returns the
    /// number of results on the first page.
    pub async fn search(&self, request: SearchRequest) -> Result<usize, SearchError> {
        let (generation, cancel) = {
            let mut state = self.lock();
            // A running search or page fetch is superseded.
            state.cancel.cancel();
            let generation = state.generation + 1;
            *state = PageState::new();
            state.generation = generation;
            state.is_fetching = true;
            (generation, state.cancel.clone())
        };

        tracing::info!(
            generation,
            inputs = request.inputs.len(),
            sort_order = ?request.sort_order,
            "Starting search",
        );

        let result = self.run_first_page(&request, &cancel).await;

        let mut state = self.lock();
        if state.generation != generation {
            tracing::debug!(generation, "Discarding page of superseded search");
            return Err(SearchError::Superseded);
        }

        match result {
            Ok((query, page)) => {
                state.has_more = page.len() == query.limit;
                state.offset = query.offset;
                state.query = Some(query);
                state.is_fetching = false;
                let added = state.merge(page);
                tracing::info!(generation, added, has_more = state.has_more, "Search page merged");
                Ok(added)
            }
            Err(err) => {
                tracing::warn!(generation, error = %err, "Search failed");
                state.fail(&err);
                Err(err)
            }
        }
    }

    /// Fetch the next page of the current search.
    ///
    /// Returns `Ok(0)` without doing anything when a fetch is already in
    /// flight, no search has run yet, the last page was short, or the
    /// controller was cancelled. The offset only advances once the page
    /// has arrived.
    pub async fn load_more(&self) -> Result<usize, SearchError> {
        let (generation, query, cancel) = {
            let mut state = self.lock();
            let Some(current) = state.query.as_ref() else {
                return Ok(0);
            };
            if state.is_fetching || !state.has_more || state.cancelled {
                return Ok(0);
            }
            let next = current.at_offset(state.offset + current.limit);
            state.is_fetching = true;
            (state.generation, next, state.cancel.clone())
        };

        tracing::debug!(generation, offset = query.offset, limit = query.limit, "Loading more results");

        let result = self.fetch_page(&query, &cancel).await;

        let mut state = self.lock();
        if state.generation != generation {
            return Err(SearchError::Superseded);
        }

        match result {
            Ok(page) => {
                state.has_more = page.len() == query.limit;
                state.offset = query.offset;
                state.is_fetching = false;
                state.error = None;
                let added = state.merge(page);
                tracing::debug!(
                    generation,
                    offset = state.offset,
                    added,
                    has_more = state.has_more,
                    "Page merged",
                );
                Ok(added)
            }
            Err(err) => {
                tracing::warn!(generation, offset = query.offset, error = %err, "Loading page failed");
                state.fail(&err);
                Err(err)
            }
        }
    }

    /// Stop the current search. Waiting tasks unwind with a cancellation
    /// error and no further pages load until the next [`search`](Self::search).
    pub fn cancel(&self) {
        let mut state = self.lock();
        state.cancelled = true;
        state.cancel.cancel();
        tracing::info!(generation = state.generation, "Search cancelled");
    }

    pub fn snapshot(&self) -> PageSnapshot {
        let state = self.lock();
        PageSnapshot {
            results: state.results.clone(),
            fetched: state.results.len(),
            has_more: state.has_more,
            is_fetching: state.is_fetching,
            offset: state.offset,
            error: state.error.clone(),
        }
    }

    pub fn results(&self) -> Vec<SearchResult> {
        self.lock().results.clone()
    }

    pub fn has_more(&self) -> bool {
        self.lock().has_more
    }

    pub fn is_fetching(&self) -> bool {
        self.lock().is_fetching
    }

    // ---- private helpers ----

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run_first_page(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<(SearchQuery, Vec<SearchResult>), SearchError> {
        let mut resolved = ResolvedFilters::default();
        if !request.filters.positive_tags.is_empty() {
            let ids = self
                .resolve_tags(&request.filters.positive_tags, true, cancel)
                .await?;
            resolved.required_image_ids = Some(ids);
        }
        if !request.filters.negative_tags.is_empty() {
            let ids = self
                .resolve_tags(&request.filters.negative_tags, false, cancel)
                .await?;
            resolved.excluded_image_ids = Some(ids);
        }

        let query = request.build_query(resolved, self.page_size)?;
        let page = self.fetch_page(&query, cancel).await?;
        Ok((query, page))
    }

    async fn resolve_tags(
        &self,
        tags: &[String],
        match_all: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, SearchError> {
        let backend = Arc::clone(&self.backend);
        let outcome = self
            .runner
            .run_task(cancel, |task_id, view| async move {
                backend.submit_tag_lookup(tags, match_all, &task_id).await?;
                let ids: Option<Vec<String>> = view.completion().await?;
                Ok::<_, TaskError>(ids.unwrap_or_default())
            })
            .await;

        let ids = outcome.into_result()?;
        tracing::debug!(tag_count = tags.len(), match_all, image_count = ids.len(), "Tag filter resolved");
        Ok(ids)
    }

    async fn fetch_page(
        &self,
        query: &SearchQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let backend = Arc::clone(&self.backend);
        let outcome = self
            .runner
            .run_task(cancel, |task_id, view| async move {
                backend.submit_search(query, &task_id).await?;
                let page: Option<Vec<SearchResult>> = view.completion().await?;
                Ok::<_, TaskError>(page.unwrap_or_default())
            })
            .await;

        Ok(outcome.into_result()?)
    }
}
