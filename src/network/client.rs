//! JSON-over-HTTP client with built-in retry and error handling
//!
//! Shared by the document store, the partition catalog, the dashboards file
//! loader and the gist service.

use super::error::HttpError;
use super::error_handler::ErrorHandler;
use crate::consts::dash_consts::network;
use reqwest::{Client, ClientBuilder, Method, Response};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

// User-Agent string with crate version
const USER_AGENT: &str = concat!("dashboard-state/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct JsonClient {
    client: Client,
    base_url: String,
    max_retries: u32,
    error_handler: ErrorHandler,
}

impl JsonClient {
    pub fn new(base_url: &str, timeout: Duration, max_retries: u32) -> Result<Self, HttpError> {
        let client = ClientBuilder::new()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries: max_retries.max(1),
            error_handler: ErrorHandler::new(),
        })
    }

    /// Client with the default timeout and retry budget.
    pub fn with_defaults(base_url: &str) -> Result<Self, HttpError> {
        Self::new(
            base_url,
            Duration::from_secs(network::REQUEST_TIMEOUT_SECS),
            network::MAX_RETRIES,
        )
    }

    fn build_url(&self, endpoint: &str) -> Result<String, HttpError> {
        if self.base_url.is_empty() {
            return Err(HttpError::InvalidUrl(endpoint.to_string()));
        }
        Ok(format!(
            "{}/{}",
            self.base_url,
            endpoint.trim_start_matches('/')
        ))
    }

    async fn handle_response_status(response: Response) -> Result<Response, HttpError> {
        if !response.status().is_success() {
            return Err(HttpError::from_response(response).await);
        }
        Ok(response)
    }

    async fn send_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, HttpError> {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let response = Self::handle_response_status(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// Sends a request, retrying transient failures with a linear backoff.
    pub async fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, HttpError> {
        let url = self.build_url(endpoint)?;
        let mut attempts = 0;

        loop {
            match self.send_once(method.clone(), &url, body).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempts += 1;
                    let level: log::Level = self.error_handler.classify_error(&e).into();
                    log::log!(
                        level,
                        "{} {} failed (attempt {}/{}): {}",
                        method,
                        url,
                        attempts,
                        self.max_retries,
                        e
                    );

                    if attempts >= self.max_retries || !self.error_handler.should_retry(&e) {
                        return Err(e);
                    }
                    sleep(network::retry_backoff(attempts)).await;
                }
            }
        }
    }

    pub async fn get(&self, endpoint: &str) -> Result<Value, HttpError> {
        self.send(Method::GET, endpoint, None).await
    }

    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, HttpError> {
        self.send(Method::POST, endpoint, Some(body)).await
    }

    pub async fn put(&self, endpoint: &str, body: &Value) -> Result<Value, HttpError> {
        self.send(Method::PUT, endpoint, Some(body)).await
    }

    pub async fn delete(&self, endpoint: &str) -> Result<Value, HttpError> {
        self.send(Method::DELETE, endpoint, None).await
    }
}
