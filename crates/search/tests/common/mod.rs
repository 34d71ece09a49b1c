//! Scripted in-memory search backend.
//!
//! Submissions are recorded, and unless told otherwise the backend
//! answers by pushing `in_progress` and `completed` events for the
//! submitted task id into the shared registry, the way the real server
//! does over the progress channel.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use clipseek_core::progress::{ProgressEvent, TaskStatus};
use clipseek_core::search::{SearchQuery, SearchResult};
use clipseek_progress::registry::TaskRegistry;
use clipseek_search::backend::SearchBackend;
use clipseek_search::error::SearchApiError;
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Search(SearchQuery),
    Tags { tags: Vec<String>, match_all: bool },
}

#[derive(Default)]
struct Script {
    /// Pages keyed by offset; missing offsets answer with an empty page.
    pages: HashMap<usize, Vec<SearchResult>>,
    /// Image ids returned for a tag lookup, keyed by `match_all`.
    tag_ids: HashMap<bool, Vec<String>>,
    /// Offsets whose submission is rejected with HTTP 500.
    rejected_offsets: HashSet<usize>,
    /// Tag lookups that the server reports as failed.
    failing_tag_lookups: bool,
    /// Searches whose first text matches are accepted but never answered.
    stalled_texts: HashSet<String>,
}

pub struct FakeBackend {
    registry: TaskRegistry,
    script: Mutex<Script>,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    pub fn new(registry: &TaskRegistry) -> Arc<Self> {
        Arc::new(Self {
            registry: registry.clone(),
            script: Mutex::new(Script::default()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn page(&self, offset: usize, ids: &[&str]) -> &Self {
        let page = ids.iter().map(|id| SearchResult::new(*id)).collect();
        self.script.lock().unwrap().pages.insert(offset, page);
        self
    }

    pub fn tag_ids(&self, match_all: bool, ids: &[&str]) -> &Self {
        let ids = ids.iter().map(|s| s.to_string()).collect();
        self.script.lock().unwrap().tag_ids.insert(match_all, ids);
        self
    }

    pub fn reject_offset(&self, offset: usize) -> &Self {
        self.script.lock().unwrap().rejected_offsets.insert(offset);
        self
    }

    pub fn fail_tag_lookups(&self) -> &Self {
        self.script.lock().unwrap().failing_tag_lookups = true;
        self
    }

    pub fn stall_text(&self, text: &str) -> &Self {
        self.script
            .lock()
            .unwrap()
            .stalled_texts
            .insert(text.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn search_calls(&self) -> Vec<SearchQuery> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Search(q) => Some(q),
                Call::Tags { .. } => None,
            })
            .collect()
    }

    /// Wait until at least `n` submissions were made.
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(3), async {
            while self.calls.lock().unwrap().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("backend never saw the expected submissions");
    }

    fn answer(&self, task_id: &str, terminal: ProgressEvent) {
        let registry = self.registry.clone();
        let progress = ProgressEvent::new(task_id, TaskStatus::InProgress).with_progress(50.0);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            registry.record(progress);
            tokio::time::sleep(Duration::from_millis(5)).await;
            registry.record(terminal);
        });
    }
}

#[async_trait]
impl SearchBackend for FakeBackend {
    async fn submit_search(&self, query: &SearchQuery, task_id: &str) -> Result<(), SearchApiError> {
        self.calls.lock().unwrap().push(Call::Search(query.clone()));

        let (rejected, stalled, page) = {
            let script = self.script.lock().unwrap();
            (
                script.rejected_offsets.contains(&query.offset),
                query
                    .texts
                    .first()
                    .is_some_and(|t| script.stalled_texts.contains(t)),
                script.pages.get(&query.offset).cloned().unwrap_or_default(),
            )
        };

        if rejected {
            return Err(SearchApiError::ApiError {
                status: 500,
                body: "internal error".into(),
            });
        }
        if !stalled {
            let completed = ProgressEvent::new(task_id, TaskStatus::Completed)
                .with_progress(100.0)
                .with_data(json!(page));
            self.answer(task_id, completed);
        }
        Ok(())
    }

    async fn submit_tag_lookup(
        &self,
        tags: &[String],
        match_all: bool,
        task_id: &str,
    ) -> Result<(), SearchApiError> {
        self.calls.lock().unwrap().push(Call::Tags {
            tags: tags.to_vec(),
            match_all,
        });

        let (failing, ids) = {
            let script = self.script.lock().unwrap();
            (
                script.failing_tag_lookups,
                script.tag_ids.get(&match_all).cloned().unwrap_or_default(),
            )
        };

        let terminal = if failing {
            ProgressEvent::new(task_id, TaskStatus::Failed).with_message("Get images by tags failed")
        } else {
            ProgressEvent::new(task_id, TaskStatus::Completed).with_data(json!(ids))
        };
        self.answer(task_id, terminal);
        Ok(())
    }
}
