//! HTTP client shared by the provider adapters

use super::user_agent::{generate_user_agent, Accept};
use crate::config::OutgoingSettings;
use crate::error::ToolError;
use anyhow::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request body types
#[derive(Debug, Clone)]
pub enum RequestBody {
    Form(Vec<(String, String)>),
    Json(serde_json::Value),
}

/// An outbound provider request
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub url: String,
    pub method: HttpMethod,
    pub accept: Accept,
    pub headers: HashMap<String, String>,
    pub params: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl ToolRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            accept: Accept::Html,
            headers: HashMap::new(),
            params: Vec::new(),
            body: None,
        }
    }

    /// Create a POST request
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Post,
            ..Self::get(url)
        }
    }

    pub fn accept(mut self, accept: Accept) -> Self {
        self.accept = accept;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn form(mut self, data: Vec<(String, String)>) -> Self {
        self.body = Some(RequestBody::Form(data));
        self
    }

    pub fn json(mut self, data: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(data));
        self
    }
}

/// Provider response
#[derive(Debug)]
pub struct ToolResponse {
    pub status: u16,
    pub text: String,
}

impl ToolResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail on any non-2xx status
    pub fn error_for_status(self) -> std::result::Result<Self, ToolError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ToolError::Http(self.status))
        }
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> std::result::Result<T, ToolError> {
        Ok(serde_json::from_str(&self.text)?)
    }
}

/// Connection-pooled HTTP client.
///
/// Requests are plain futures: dropping one (for example when the executor
/// cancels a worker) aborts the underlying connection.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs_f64(settings.request_timeout))
            .pool_max_idle_per_host(settings.pool_maxsize)
            .gzip(true)
            .brotli(true);

        if !settings.verify_ssl {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ref proxy_url) = settings.proxies.all {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        } else {
            if let Some(ref http) = settings.proxies.http {
                builder = builder.proxy(reqwest::Proxy::http(http)?);
            }
            if let Some(ref https) = settings.proxies.https {
                builder = builder.proxy(reqwest::Proxy::https(https)?);
            }
        }

        Ok(Self {
            client: builder.build()?,
            user_agent: generate_user_agent(),
        })
    }

    /// Send a provider request
    pub async fn execute(&self, request: ToolRequest) -> std::result::Result<ToolResponse, ToolError> {
        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        req_builder = req_builder
            .header("User-Agent", &self.user_agent)
            .header("Accept", request.accept.header_value())
            .header("Accept-Language", "en-US,en;q=0.9");

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if !request.params.is_empty() {
            req_builder = req_builder.query(&request.params);
        }

        if let Some(body) = request.body {
            req_builder = match body {
                RequestBody::Form(data) => req_builder.form(&data),
                RequestBody::Json(json) => req_builder.json(&json),
            };
        }

        let response = req_builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;

        Ok(ToolResponse { status, text })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_client_creation() {
        let client = HttpClient::new();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_execute_sends_params_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "rust"))
            .and(header("X-Test", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let request = ToolRequest::get(format!("{}/search", server.uri()))
            .accept(Accept::Json)
            .param("q", "rust")
            .header("X-Test", "1");
        let response = client.execute(request).await.unwrap();

        assert!(response.is_success());
        let json: serde_json::Value = response.json().unwrap();
        assert_eq!(json["ok"], true);
    }

    #[tokio::test]
    async fn test_error_for_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = HttpClient::new().unwrap();
        let response = client
            .execute(ToolRequest::post(server.uri()).form(vec![("q".into(), "x".into())]))
            .await
            .unwrap();

        assert_eq!(response.error_for_status().unwrap_err(), ToolError::Http(429));
    }
}
