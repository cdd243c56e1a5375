//! Bing image search

use super::traits::SearchTool;
use crate::error::ToolError;
use crate::network::{HttpClient, ToolRequest};
use crate::results::{ResultKind, SearchResult};
use async_trait::async_trait;
use scraper::{Html, Selector};

/// Bing Images, scraped from the HTML results page
pub struct BingImages {
    client: HttpClient,
    base_url: String,
}

impl BingImages {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            base_url: "https://www.bing.com/images/search".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse(&self, html: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        let document = Html::parse_document(html);
        let result_selector = Selector::parse("a.iusc")
            .map_err(|e| ToolError::Parse(format!("invalid selector: {:?}", e)))?;

        // Bing stores each image's metadata as JSON in the "m" attribute.
        let results = document
            .select(&result_selector)
            .filter_map(|element| element.value().attr("m"))
            .filter_map(|m| serde_json::from_str::<serde_json::Value>(m).ok())
            .filter_map(|json| {
                let url = json.get("purl").and_then(|v| v.as_str()).filter(|u| !u.is_empty())?;
                let title = json.get("t").and_then(|v| v.as_str()).unwrap_or("Image");

                let mut result = SearchResult::new(url, title, self.name()).with_kind(ResultKind::Image);
                if let Some(img_src) = json.get("murl").and_then(|v| v.as_str()) {
                    result = result.with_thumbnail(img_src);
                }
                if let Some(desc) = json.get("desc").and_then(|v| v.as_str()) {
                    result = result.with_snippet(desc);
                }
                Some(result)
            })
            .take(max_results)
            .collect();

        Ok(results)
    }
}

#[async_trait]
impl SearchTool for BingImages {
    fn name(&self) -> &str {
        "bing_images"
    }

    fn kinds(&self) -> Vec<ResultKind> {
        vec![ResultKind::Image]
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        let request = ToolRequest::get(&self.base_url)
            .param("q", query)
            .param("form", "HDRSC2");

        let response = self.client.execute(request).await?.error_for_status()?;
        self.parse(&response.text, max_results)
    }
}
