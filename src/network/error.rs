//! Error handling for remote collaborators

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    /// Reqwest error, typically related to network issues or request failures.
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP error with status {status}: {message}")]
    Http { status: u16, message: String },

    /// The response body was not the JSON we expected.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The base URL could not be joined with the endpoint.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    pub async fn from_response(response: reqwest::Response) -> HttpError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read response text".to_string());

        HttpError::Http { status, message }
    }
}
