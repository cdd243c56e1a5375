//! DuckDuckGo web search

use super::traits::SearchTool;
use crate::error::ToolError;
use crate::network::{HttpClient, ToolRequest};
use crate::results::SearchResult;
use async_trait::async_trait;
use scraper::{Html, Selector};

/// DuckDuckGo web search via the HTML endpoint
pub struct DuckDuckGo {
    client: HttpClient,
    html_url: String,
}

impl DuckDuckGo {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            html_url: "https://html.duckduckgo.com/html/".to_string(),
        }
    }

    /// Point at a different HTML endpoint
    pub fn with_html_url(mut self, html_url: impl Into<String>) -> Self {
        self.html_url = html_url.into();
        self
    }

    fn parse_html_results(&self, html: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        let document = Html::parse_document(html);
        let result_selector = selector("div.result")?;
        let title_selector = selector("a.result__a")?;
        let snippet_selector = selector("a.result__snippet")?;

        let mut results = Vec::new();

        for element in document.select(&result_selector) {
            if results.len() >= max_results {
                break;
            }

            let Some(title_elem) = element.select(&title_selector).next() else {
                continue;
            };

            let title = title_elem.text().collect::<String>().trim().to_string();
            let url = resolve_redirect(title_elem.value().attr("href").unwrap_or_default());

            // Skip ads and DuckDuckGo internal links
            if title.is_empty() || url.is_empty() || url.contains("duckduckgo.com") {
                continue;
            }

            let mut result = SearchResult::new(url.into_owned(), title, self.name());
            if let Some(snippet) = element.select(&snippet_selector).next() {
                result = result.with_snippet(snippet.text().collect::<String>().trim());
            }

            results.push(result);
        }

        Ok(results)
    }
}

/// Unwrap `//duckduckgo.com/l/?uddg=<target>` redirect links
fn resolve_redirect(href: &str) -> std::borrow::Cow<'_, str> {
    let target = href
        .split_once("uddg=")
        .map(|(_, rest)| rest.split('&').next().unwrap_or(rest));

    match target.and_then(|t| urlencoding::decode(t).ok()) {
        Some(decoded) => decoded,
        None => std::borrow::Cow::Borrowed(href),
    }
}

fn selector(css: &str) -> Result<Selector, ToolError> {
    Selector::parse(css).map_err(|e| ToolError::Parse(format!("invalid selector {}: {:?}", css, e)))
}

#[async_trait]
impl SearchTool for DuckDuckGo {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, ToolError> {
        let request = ToolRequest::post(&self.html_url).form(vec![
            ("q".to_string(), query.to_string()),
            ("b".to_string(), String::new()),
            ("kl".to_string(), "wt-wt".to_string()),
        ]);

        let response = self.client.execute(request).await?.error_for_status()?;
        self.parse_html_results(&response.text, max_results)
    }
}
