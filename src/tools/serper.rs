//! Serper (Google results API) web and video search

use super::traits::SearchTool;
use crate::error::ToolError;
use crate::network::{Accept, HttpClient, ToolRequest};
use crate::results::{ResultKind, SearchResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://google.serper.dev";

/// Which Serper endpoint to query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerperMode {
    Web,
    Videos,
}

impl SerperMode {
    fn path(self) -> &'static str {
        match self {
            Self::Web => "search",
            Self::Videos => "videos",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperItem>,
    #[serde(default)]
    videos: Vec<SerperItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerperItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

/// Serper API client
pub struct SerperTool {
    client: HttpClient,
    mode: SerperMode,
    api_key: Option<String>,
    base_url: String,
}

impl SerperTool {
    pub fn new(client: HttpClient, mode: SerperMode, api_key: Option<String>) -> Self {
        Self {
            client,
            mode,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn web(client: HttpClient, api_key: Option<String>) -> Self {
        Self::new(client, SerperMode::Web, api_key)
    }

    pub fn videos(client: HttpClient, api_key: Option<String>) -> Self {
        Self::new(client, SerperMode::Videos, api_key)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn parse(&self, response: SerperResponse, max_results: usize) -> Vec<SearchResult> {
        let (items, kind) = match self.mode {
            SerperMode::Web => (response.organic, ResultKind::Text),
            SerperMode::Videos => (response.videos, ResultKind::Video),
        };

        items
            .into_iter()
            .filter(|item| !item.link.is_empty())
            .take(max_results)
            .map(|item| {
                let mut result = SearchResult::new(item.link, item.title, self.name()).with_kind(kind);
                if let Some(snippet) = item.snippet {
                    result = result.with_snippet(snippet);
                }
                if let Some(published) = item.date.as_deref().and_then(parse_date) {
                    result = result.with_published_at(published);
                }
                if let Some(image) = item.image_url {
                    result = result.with_thumbnail(image);
                }
                result
            })
            .collect()
    }
}

/// Serper dates come as RFC 3339 or as "Mar 4, 2024"; relative dates
/// ("3 days ago") are ignored.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%b %d, %Y")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[async_trait]
impl SearchTool for SerperTool {
    fn name(&self) -> &str {
        match self.mode {
            SerperMode::Web => "serper",
            SerperMode::Videos => "serper_videos",
        }
    }

    fn kinds(&self) -> Vec<ResultKind> {
        match self.mode {
            SerperMode::Web => vec![ResultKind::Text],
            SerperMode::Videos => vec![ResultKind::Video],
        }
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ToolError::Configuration("SERPER_API_KEY is not set".to_string()));
        };

        let request = ToolRequest::post(format!("{}/{}", self.base_url, self.mode.path()))
            .accept(Accept::Json)
            .header("X-API-KEY", api_key)
            .json(json!({ "q": query, "num": max_results }));

        let response: SerperResponse = self.client.execute(request).await?.error_for_status()?.json()?;
        Ok(self.parse(response, max_results))
    }
}
