//! REST client for the search backend.
//!
//! Task-creating endpoints take a client-generated `task_id` and only
//! acknowledge the submission; their results arrive later on the progress
//! channel. The tag helpers answer synchronously.

use clipseek_core::search::SearchQuery;
use serde::{Deserialize, Serialize};

use crate::error::SearchApiError;

/// Default base URL of the search backend.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// HTTP client for one search backend.
#[derive(Clone)]
pub struct SearchApi {
    client: reqwest::Client,
    api_url: String,
}

/// Acknowledgement returned by task-creating endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskAccepted {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize)]
struct SearchBody<'a> {
    #[serde(flatten)]
    query: &'a SearchQuery,
    task_id: &'a str,
}

#[derive(Serialize)]
struct TagLookupBody<'a> {
    tags: &'a [String],
    match_all: bool,
    task_id: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AllTagsResponse {
    Wrapped { all_known_tags: Vec<String> },
    Bare(Vec<String>),
}

#[derive(Deserialize)]
struct ImageTagsResponse {
    #[serde(default)]
    tags: Vec<String>,
}

impl SearchApi {
    /// Create a client for the backend at `api_url`, e.g.
    /// `http://localhost:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Reuse an existing [`reqwest::Client`] and its connection pool.
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Start a search task.
    ///
    /// Sends `POST /api/search` with the query fields and `task_id`.
    pub async fn submit_search(
        &self,
        query: &SearchQuery,
        task_id: &str,
    ) -> Result<TaskAccepted, SearchApiError> {
        let body = SearchBody { query, task_id };

        let response = self
            .client
            .post(format!("{}/api/search", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_ack(response).await
    }

    /// Start a task resolving `tags` to image ids.
    ///
    /// Sends `POST /api/images/by-tags`. With `match_all` an image must
    /// carry every tag, otherwise any one of them.
    pub async fn submit_tag_lookup(
        &self,
        tags: &[String],
        match_all: bool,
        task_id: &str,
    ) -> Result<TaskAccepted, SearchApiError> {
        let body = TagLookupBody {
            tags,
            match_all,
            task_id,
        };

        let response = self
            .client
            .post(format!("{}/api/images/by-tags", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_ack(response).await
    }

    /// Every tag known to the backend. `GET /api/allKnownTags`.
    pub async fn all_known_tags(&self) -> Result<Vec<String>, SearchApiError> {
        let response = self
            .client
            .get(format!("{}/api/allKnownTags", self.api_url))
            .send()
            .await?;

        let tags = match Self::parse_response::<AllTagsResponse>(response).await? {
            AllTagsResponse::Wrapped { all_known_tags } => all_known_tags,
            AllTagsResponse::Bare(tags) => tags,
        };
        Ok(tags)
    }

    /// Tags attached to one image. `GET /api/tags/{image_id}`.
    pub async fn tags_for_image(&self, image_id: &str) -> Result<Vec<String>, SearchApiError> {
        let response = self
            .client
            .get(format!("{}/api/tags/{}", self.api_url, image_id))
            .send()
            .await?;

        Ok(Self::parse_response::<ImageTagsResponse>(response).await?.tags)
    }

    // ---- private helpers ----

    /// Return the response unchanged on success, or an
    /// [`SearchApiError::ApiError`] carrying the status and body text.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, SearchApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SearchApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SearchApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Acknowledgement bodies vary between endpoints; anything that is
    /// not a JSON object is accepted as an empty acknowledgement.
    async fn parse_ack(response: reqwest::Response) -> Result<TaskAccepted, SearchApiError> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_trimmed() {
        let api = SearchApi::new("http://localhost:8000/");
        assert_eq!(api.api_url(), "http://localhost:8000");
    }

    #[test]
    fn search_body_flattens_query() {
        let query = SearchQuery {
            texts: vec!["cat".into()],
            image_ids: vec![],
            tags: vec![],
            weights: vec![1.0],
            required_path_contains: None,
            excluded_path_contains: None,
            required_image_ids: Some(vec!["i1".into()]),
            excluded_image_ids: None,
            sort_order: Default::default(),
            offset: 200,
            limit: 200,
        };
        let body = serde_json::to_value(SearchBody {
            query: &query,
            task_id: "t1",
        })
        .unwrap();

        assert_eq!(body["task_id"], "t1");
        assert_eq!(body["texts"][0], "cat");
        assert_eq!(body["offset"], 200);
        assert_eq!(body["required_image_ids"][0], "i1");
        assert!(body.get("excluded_image_ids").is_none());
        assert_eq!(body["sort_order"], "similarity");
    }

    #[test]
    fn all_tags_accepts_both_shapes() {
        let wrapped: AllTagsResponse =
            serde_json::from_str(r#"{"all_known_tags":["a","b"]}"#).unwrap();
        assert!(matches!(wrapped, AllTagsResponse::Wrapped { all_known_tags } if all_known_tags.len() == 2));

        let bare: AllTagsResponse = serde_json::from_str(r#"["a"]"#).unwrap();
        assert!(matches!(bare, AllTagsResponse::Bare(tags) if tags == vec!["a".to_string()]));
    }
}
