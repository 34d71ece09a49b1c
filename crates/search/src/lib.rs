//! Semantic image search on top of progress-tracked tasks.
//!
//! [`api::SearchApi`] submits work to the backend over HTTP,
//! [`query::SearchRequest`] turns user input into an immutable
//! [`SearchQuery`](clipseek_core::search::SearchQuery), and
//! [`pagination::PaginationController`] chains tag-filter lookups and
//! page fetches into one de-duplicated result list.

pub mod api;
pub mod backend;
pub mod error;
pub mod pagination;
pub mod query;
