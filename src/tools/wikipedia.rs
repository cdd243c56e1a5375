//! Wikipedia knowledge-base lookup

use super::traits::SearchTool;
use crate::error::ToolError;
use crate::network::{Accept, HttpClient, ToolRequest};
use crate::results::SearchResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

const MAX_SNIPPET_CHARS: usize = 500;

/// Wikipedia search via the MediaWiki API
pub struct Wikipedia {
    client: HttpClient,
    api_url: String,
}

impl Wikipedia {
    pub fn new(client: HttpClient) -> Self {
        Self::with_lang(client, "en")
    }

    /// Search a specific language edition ("en", "de", "en-US" -> "en")
    pub fn with_lang(client: HttpClient, lang: &str) -> Self {
        let lang = lang.split('-').next().filter(|l| !l.is_empty()).unwrap_or("en");
        Self {
            client,
            api_url: format!("https://{}.wikipedia.org/w/api.php", lang),
        }
    }

    /// Point at a different API endpoint
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    fn request(&self, query: &str, max_results: usize) -> ToolRequest {
        let limit = max_results.max(1).to_string();
        ToolRequest::get(&self.api_url)
            .accept(Accept::Json)
            .param("action", "query")
            .param("format", "json")
            .param("generator", "search")
            .param("gsrsearch", query)
            .param("gsrlimit", limit.clone())
            .param("prop", "extracts|pageimages|info")
            .param("exintro", "1")
            .param("explaintext", "1")
            .param("exlimit", limit)
            .param("inprop", "url")
            .param("pithumbsize", "300")
    }

    fn parse(&self, json: &serde_json::Value, max_results: usize) -> Vec<SearchResult> {
        let Some(pages) = json
            .get("query")
            .and_then(|q| q.get("pages"))
            .and_then(|p| p.as_object())
        else {
            return Vec::new();
        };

        // Pages come back keyed by id; "index" carries the search rank.
        let mut page_list: Vec<_> = pages.values().collect();
        page_list.sort_by_key(|p| p.get("index").and_then(|i| i.as_i64()).unwrap_or(i64::MAX));

        page_list
            .into_iter()
            .filter_map(|page| {
                let title = page.get("title").and_then(|t| t.as_str())?;
                let url = page.get("fullurl").and_then(|u| u.as_str())?;

                let mut result = SearchResult::new(url, title, self.name());

                if let Some(extract) = page.get("extract").and_then(|e| e.as_str()) {
                    result = result.with_snippet(truncate(extract, MAX_SNIPPET_CHARS));
                }
                if let Some(thumb) = page
                    .get("thumbnail")
                    .and_then(|t| t.get("source"))
                    .and_then(|s| s.as_str())
                {
                    result = result.with_thumbnail(thumb);
                }
                if let Some(touched) = page
                    .get("touched")
                    .and_then(|t| t.as_str())
                    .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                {
                    result = result.with_published_at(touched.with_timezone(&Utc));
                }

                Some(result)
            })
            .take(max_results)
            .collect()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[async_trait]
impl SearchTool for Wikipedia {
    fn name(&self) -> &str {
        "wikipedia"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        let response = self
            .client
            .execute(self.request(query, max_results))
            .await?
            .error_for_status()?;

        let json: serde_json::Value = response.json()?;
        Ok(self.parse(&json, max_results))
    }
}
