//! Search query and result model shared by the submission API and the
//! pagination controller.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Pagination defaults
// ---------------------------------------------------------------------------

/// Default number of search results requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Upper bound accepted for a page size.
pub const MAX_PAGE_SIZE: usize = 10_000;

// ---------------------------------------------------------------------------
// Sort order
// ---------------------------------------------------------------------------

/// Result ordering understood by the search backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Similarity,
    SimilarityAsc,
    SemanticPage,
    SimilarityMax,
    SimilarityMaxAsc,
    Direction,
}

// ---------------------------------------------------------------------------
// SearchQuery
// ---------------------------------------------------------------------------

/// One immutable search specification plus its page window.
///
/// There is one weight per embedding input, ordered texts, then image
/// ids, then tag groups. Pages of the same search share everything but
/// `offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub texts: Vec<String>,
    #[serde(default)]
    pub image_ids: Vec<String>,
    #[serde(default)]
    pub tags: Vec<Vec<String>>,
    pub weights: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_path_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_path_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_image_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_image_ids: Option<Vec<String>>,
    #[serde(default)]
    pub sort_order: SortOrder,
    pub offset: usize,
    pub limit: usize,
}

impl SearchQuery {
    /// Number of embedding inputs (texts + images + tag groups).
    pub fn input_count(&self) -> usize {
        self.texts.len() + self.image_ids.len() + self.tags.len()
    }

    /// Check the structural invariants the backend relies on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.input_count() == 0 {
            return Err(CoreError::Validation(
                "a search needs at least one text, image or tag input".into(),
            ));
        }
        if self.weights.len() != self.input_count() {
            return Err(CoreError::Validation(format!(
                "expected {} weights, got {}",
                self.input_count(),
                self.weights.len()
            )));
        }
        if self.limit == 0 || self.limit > MAX_PAGE_SIZE {
            return Err(CoreError::Validation(format!(
                "page limit must be between 1 and {MAX_PAGE_SIZE}, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    /// Copy of this query positioned at another page offset.
    pub fn at_offset(&self, offset: usize) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }
}

// ---------------------------------------------------------------------------
// SearchResult
// ---------------------------------------------------------------------------

/// One item of a search page. Identity (for de-duplication) is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Backend-specific ordering key (a number or a vector of numbers).
    #[serde(default)]
    pub order_key: Option<serde_json::Value>,
}

impl SearchResult {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: String::new(),
            distance: None,
            tags: None,
            order_key: None,
        }
    }
}
