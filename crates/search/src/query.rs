//! Turning user input into a [`SearchQuery`].
//!
//! A [`SearchRequest`] holds what the user asked for: embedding inputs
//! with weights, path filters and tag filters. Tag filters have to be
//! resolved into image id sets by the backend first; once they are,
//! [`SearchRequest::build_query`] produces the immutable query that every
//! page of the search reuses.

use clipseek_core::error::CoreError;
use clipseek_core::search::{SearchQuery, SortOrder};

/// One weighted embedding input.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingInput {
    Text { text: String, weight: f64 },
    Image { image_id: String, weight: f64 },
    Tags { tags: Vec<String>, weight: f64 },
}

impl EmbeddingInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text {
            text: text.into(),
            weight: 1.0,
        }
    }

    pub fn image(image_id: impl Into<String>) -> Self {
        Self::Image {
            image_id: image_id.into(),
            weight: 1.0,
        }
    }

    pub fn tags(tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::Tags {
            tags: tags.into_iter().map(Into::into).collect(),
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, new_weight: f64) -> Self {
        match &mut self {
            Self::Text { weight, .. } | Self::Image { weight, .. } | Self::Tags { weight, .. } => {
                *weight = new_weight;
            }
        }
        self
    }
}

/// Filters narrowing the result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterInput {
    pub required_path_contains: Option<String>,
    pub excluded_path_contains: Option<String>,
    /// Images must carry every one of these tags.
    pub positive_tags: Vec<String>,
    /// Images carrying any one of these tags are excluded.
    pub negative_tags: Vec<String>,
}

/// Image id sets produced by resolving the tag filters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedFilters {
    pub required_image_ids: Option<Vec<String>>,
    pub excluded_image_ids: Option<Vec<String>>,
}

/// Everything a user asked for in one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub inputs: Vec<EmbeddingInput>,
    pub filters: FilterInput,
    pub sort_order: SortOrder,
}

impl SearchRequest {
    pub fn new(inputs: Vec<EmbeddingInput>) -> Self {
        Self {
            inputs,
            ..Default::default()
        }
    }

    /// Single text query with weight 1.
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(vec![EmbeddingInput::text(text)])
    }

    pub fn with_filters(mut self, filters: FilterInput) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Build the page-0 query from this request and the resolved tag
    /// filters.
    ///
    /// Weights are emitted texts first, then images, then tag groups,
    /// matching the order of the input lists. Blank path filters are
    /// dropped.
    pub fn build_query(
        &self,
        resolved: ResolvedFilters,
        page_size: usize,
    ) -> Result<SearchQuery, CoreError> {
        let mut texts = Vec::new();
        let mut text_weights = Vec::new();
        let mut image_ids = Vec::new();
        let mut image_weights = Vec::new();
        let mut tags = Vec::new();
        let mut tag_weights = Vec::new();

        for input in &self.inputs {
            match input {
                EmbeddingInput::Text { text, weight } => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    texts.push(text.clone());
                    text_weights.push(*weight);
                }
                EmbeddingInput::Image { image_id, weight } => {
                    image_ids.push(image_id.clone());
                    image_weights.push(*weight);
                }
                EmbeddingInput::Tags { tags: group, weight } => {
                    if group.is_empty() {
                        continue;
                    }
                    tags.push(group.clone());
                    tag_weights.push(*weight);
                }
            }
        }

        let mut weights = text_weights;
        weights.extend(image_weights);
        weights.extend(tag_weights);

        let query = SearchQuery {
            texts,
            image_ids,
            tags,
            weights,
            required_path_contains: non_blank(&self.filters.required_path_contains),
            excluded_path_contains: non_blank(&self.filters.excluded_path_contains),
            required_image_ids: resolved.required_image_ids,
            excluded_image_ids: resolved.excluded_image_ids,
            sort_order: self.sort_order,
            offset: 0,
            limit: page_size,
        };
        query.validate()?;
        Ok(query)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn weights_follow_input_kind_order() {
        let request = SearchRequest::new(vec![
            EmbeddingInput::tags(["beach"]).with_weight(0.5),
            EmbeddingInput::text("sunset").with_weight(2.0),
            EmbeddingInput::image("img-1").with_weight(-1.0),
        ]);

        let query = request.build_query(ResolvedFilters::default(), 200).unwrap();
        assert_eq!(query.texts, vec!["sunset"]);
        assert_eq!(query.image_ids, vec!["img-1"]);
        assert_eq!(query.tags, vec![vec!["beach".to_string()]]);
        assert_eq!(query.weights, vec![2.0, -1.0, 0.5]);
        assert_eq!(query.offset, 0);
        assert_eq!(query.limit, 200);
    }

    #[test]
    fn resolved_filters_are_carried() {
        let request = SearchRequest::text("cat").with_filters(FilterInput {
            required_path_contains: Some("  ".into()),
            excluded_path_contains: Some("/tmp".into()),
            ..Default::default()
        });
        let resolved = ResolvedFilters {
            required_image_ids: Some(vec!["a".into()]),
            excluded_image_ids: Some(vec!["b".into()]),
        };

        let query = request.build_query(resolved, 50).unwrap();
        assert_eq!(query.required_path_contains, None);
        assert_eq!(query.excluded_path_contains.as_deref(), Some("/tmp"));
        assert_eq!(query.required_image_ids, Some(vec!["a".to_string()]));
        assert_eq!(query.excluded_image_ids, Some(vec!["b".to_string()]));
    }

    #[test]
    fn empty_request_is_rejected() {
        let request = SearchRequest::new(vec![EmbeddingInput::text("   ")]);
        assert_matches!(
            request.build_query(ResolvedFilters::default(), 200),
            Err(CoreError::Validation(_))
        );
    }
}
