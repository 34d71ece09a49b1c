//! Integration tests for `PaginationController` against a scripted
//! backend that answers through the task registry.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use clipseek_progress::registry::TaskRegistry;
use clipseek_search::backend::SearchBackend;
use clipseek_search::error::SearchError;
use clipseek_search::pagination::PaginationController;
use clipseek_search::query::{FilterInput, SearchRequest};
use clipseek_tasks::error::TaskError;
use clipseek_tasks::runner::TaskRunner;
use common::{Call, FakeBackend};

fn controller(backend: &Arc<FakeBackend>, registry: &TaskRegistry, page_size: usize) -> PaginationController {
    let backend: Arc<dyn SearchBackend> = backend.clone();
    PaginationController::with_page_size(backend, TaskRunner::new(registry.clone()), page_size)
}

fn ids(controller: &PaginationController) -> Vec<String> {
    controller.results().into_iter().map(|r| r.id).collect()
}

// ---------------------------------------------------------------------------
// Test: overlapping pages are merged without duplicates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overlapping_pages_are_deduplicated() {
    let registry = TaskRegistry::default();
    let backend = FakeBackend::new(&registry);
    backend.page(0, &["a", "b"]).page(2, &["b", "c"]);
    let controller = controller(&backend, &registry, 2);

    assert_eq!(controller.search(SearchRequest::text("cat")).await.unwrap(), 2);
    assert!(controller.has_more());

    assert_eq!(controller.load_more().await.unwrap(), 1);
    assert_eq!(ids(&controller), vec!["a", "b", "c"]);
    // A full page keeps pagination going even if it added few new items.
    assert!(controller.has_more());

    assert_eq!(controller.load_more().await.unwrap(), 0);
    assert!(!controller.has_more());
    assert_eq!(ids(&controller), vec!["a", "b", "c"]);

    let offsets: Vec<usize> = backend.search_calls().iter().map(|q| q.offset).collect();
    assert_eq!(offsets, vec![0, 2, 4]);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.fetched, 3);
    assert_eq!(snapshot.offset, 4);
    assert!(!snapshot.is_fetching);
    assert_eq!(snapshot.error, None);
}

// ---------------------------------------------------------------------------
// Test: a short page ends pagination and load_more becomes a no-op
// ---------------------------------------------------------------------------

#[tokio::test]
async fn short_page_means_no_more() {
    let registry = TaskRegistry::default();
    let backend = FakeBackend::new(&registry);
    backend.page(0, &["a"]);
    let controller = controller(&backend, &registry, 2);

    controller.search(SearchRequest::text("cat")).await.unwrap();
    assert!(!controller.has_more());

    assert_eq!(controller.load_more().await.unwrap(), 0);
    assert_eq!(backend.search_calls().len(), 1);
}

#[tokio::test]
async fn load_more_without_search_is_noop() {
    let registry = TaskRegistry::default();
    let backend = FakeBackend::new(&registry);
    let controller = controller(&backend, &registry, 2);

    assert_eq!(controller.load_more().await.unwrap(), 0);
    assert!(backend.calls().is_empty());
}

// ---------------------------------------------------------------------------
// Test: tag filters are resolved serially before the first page
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tag_filters_resolve_into_id_sets() {
    let registry = TaskRegistry::default();
    let backend = FakeBackend::new(&registry);
    backend
        .tag_ids(true, &["i1", "i2"])
        .tag_ids(false, &["i3"])
        .page(0, &["i1"]);
    let controller = controller(&backend, &registry, 2);

    let request = SearchRequest::text("sunset").with_filters(FilterInput {
        positive_tags: vec!["beach".into()],
        negative_tags: vec!["blurry".into()],
        ..Default::default()
    });
    controller.search(request).await.unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(
        calls[0],
        Call::Tags {
            tags: vec!["beach".into()],
            match_all: true
        }
    );
    assert_eq!(
        calls[1],
        Call::Tags {
            tags: vec!["blurry".into()],
            match_all: false
        }
    );
    let Call::Search(query) = &calls[2] else {
        panic!("expected search call, got {:?}", calls[2]);
    };
    assert_eq!(query.required_image_ids, Some(vec!["i1".into(), "i2".into()]));
    assert_eq!(query.excluded_image_ids, Some(vec!["i3".into()]));
}

// ---------------------------------------------------------------------------
// Test: a failed filter lookup aborts the search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn filter_failure_aborts_search() {
    let registry = TaskRegistry::default();
    let backend = FakeBackend::new(&registry);
    backend.fail_tag_lookups().page(0, &["a"]);
    let controller = controller(&backend, &registry, 2);

    let request = SearchRequest::text("cat").with_filters(FilterInput {
        positive_tags: vec!["beach".into()],
        ..Default::default()
    });
    let err = controller.search(request).await.unwrap_err();

    assert_matches!(err, SearchError::Task(TaskError::Failed(ref m)) if m == "Get images by tags failed");
    assert!(backend.search_calls().is_empty());

    let snapshot = controller.snapshot();
    assert!(!snapshot.is_fetching);
    assert!(snapshot.results.is_empty());
    assert_eq!(snapshot.error.as_deref(), Some("Get images by tags failed"));
}

// ---------------------------------------------------------------------------
// Test: a failed page keeps what was already fetched
// ---------------------------------------------------------------------------

#[tokio::test]
async fn page_failure_keeps_results() {
    let registry = TaskRegistry::default();
    let backend = FakeBackend::new(&registry);
    backend.page(0, &["a", "b"]).reject_offset(2);
    let controller = controller(&backend, &registry, 2);

    controller.search(SearchRequest::text("cat")).await.unwrap();
    let err = controller.load_more().await.unwrap_err();
    assert_matches!(err, SearchError::Task(TaskError::Submission(_)));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.fetched, 2);
    assert_eq!(snapshot.offset, 0);
    assert!(!snapshot.has_more);
    assert!(snapshot.error.as_deref().unwrap().contains("500"));

    // Pagination stays stopped.
    assert_eq!(controller.load_more().await.unwrap(), 0);
    assert_eq!(backend.search_calls().len(), 2);
}

// ---------------------------------------------------------------------------
// Test: cancel unwinds the waiting search and blocks further pages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancel_stops_waiting_search() {
    let registry = TaskRegistry::default();
    let backend = FakeBackend::new(&registry);
    backend.stall_text("slow");
    let controller = Arc::new(controller(&backend, &registry, 2));

    let running = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.search(SearchRequest::text("slow")).await }
    });

    backend.wait_for_calls(1).await;
    assert!(controller.is_fetching());
    controller.cancel();

    let err = running.await.unwrap().unwrap_err();
    assert!(err.is_cancelled());

    let snapshot = controller.snapshot();
    assert!(!snapshot.is_fetching);
    assert_eq!(snapshot.error, None);
    assert_eq!(controller.load_more().await.unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Test: a newer search supersedes one still in flight
// ---------------------------------------------------------------------------

#[tokio::test]
async fn newer_search_supersedes_older() {
    let registry = TaskRegistry::default();
    let backend = FakeBackend::new(&registry);
    backend.stall_text("slow").page(0, &["fresh"]);
    let controller = Arc::new(controller(&backend, &registry, 2));

    let older = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.search(SearchRequest::text("slow")).await }
    });
    backend.wait_for_calls(1).await;

    controller.search(SearchRequest::text("fast")).await.unwrap();

    assert_matches!(older.await.unwrap(), Err(SearchError::Superseded));
    assert_eq!(ids(&controller), vec!["fresh"]);
    assert!(!controller.is_fetching());
}
