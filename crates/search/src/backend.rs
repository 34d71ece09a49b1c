//! The submission seam the pagination controller depends on.

use async_trait::async_trait;
use clipseek_core::search::SearchQuery;

use crate::api::SearchApi;
use crate::error::SearchApiError;

/// Starts server-side work tagged with a client-generated task id.
///
/// Implementations only submit; results are delivered as progress
/// events for `task_id`.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn submit_search(&self, query: &SearchQuery, task_id: &str) -> Result<(), SearchApiError>;

    async fn submit_tag_lookup(
        &self,
        tags: &[String],
        match_all: bool,
        task_id: &str,
    ) -> Result<(), SearchApiError>;
}

#[async_trait]
impl SearchBackend for SearchApi {
    async fn submit_search(&self, query: &SearchQuery, task_id: &str) -> Result<(), SearchApiError> {
        let ack = SearchApi::submit_search(self, query, task_id).await?;
        tracing::debug!(task_id = %task_id, message = ?ack.message, "Search submitted");
        Ok(())
    }

    async fn submit_tag_lookup(
        &self,
        tags: &[String],
        match_all: bool,
        task_id: &str,
    ) -> Result<(), SearchApiError> {
        let ack = SearchApi::submit_tag_lookup(self, tags, match_all, task_id).await?;
        tracing::debug!(
            task_id = %task_id,
            tag_count = tags.len(),
            match_all,
            message = ?ack.message,
            "Tag lookup submitted",
        );
        Ok(())
    }
}
