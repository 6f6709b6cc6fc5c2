// src/services/publisher.rs

//! Publishers for formatted bill posts.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use crate::error::{PublishError, Result};
use crate::models::PublisherConfig;
use crate::services::Publisher;
use crate::utils::{char_len, http, truncate_graphemes};

/// Longest response excerpt carried into an error message.
const BODY_EXCERPT_CHARS: usize = 200;

/// Publisher for the X (Twitter) v2 API using an OAuth 2.0 user token.
pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: String,
    max_length: usize,
}

impl HttpPublisher {
    pub fn new(config: &PublisherConfig, user_agent: &str) -> Result<Self> {
        let client = http::create_async_client(user_agent, config.timeout_secs)?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bearer_token: config.bearer_token.clone(),
            max_length: config.max_length,
        })
    }

    fn ensure_token(&self) -> std::result::Result<(), PublishError> {
        if self.bearer_token.trim().is_empty() {
            return Err(PublishError::Auth("no bearer token configured".into()));
        }
        Ok(())
    }

    async fn finish(
        response: std::result::Result<reqwest::Response, reqwest::Error>,
    ) -> std::result::Result<(), PublishError> {
        let response = response.map_err(|e| PublishError::Transient(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, &body))
    }
}

/// Map a non-success response onto the publish failure taxonomy.
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> PublishError {
    let detail = format!(
        "HTTP {}: {}",
        status.as_u16(),
        truncate_graphemes(body.trim(), BODY_EXCERPT_CHARS)
    );

    match status {
        StatusCode::UNAUTHORIZED => PublishError::Auth(detail),
        StatusCode::FORBIDDEN if body.to_lowercase().contains("duplicate") => {
            PublishError::Rejected(detail)
        }
        StatusCode::FORBIDDEN => PublishError::Auth(detail),
        StatusCode::BAD_REQUEST
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::UNPROCESSABLE_ENTITY => PublishError::Rejected(detail),
        _ => PublishError::Transient(detail),
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn verify_credentials(&self) -> std::result::Result<(), PublishError> {
        self.ensure_token()?;
        let response = self
            .client
            .get(format!("{}/users/me", self.endpoint))
            .bearer_auth(&self.bearer_token)
            .send()
            .await;
        Self::finish(response).await
    }

    async fn publish(&self, text: &str) -> std::result::Result<(), PublishError> {
        self.ensure_token()?;
        let length = char_len(text);
        if length > self.max_length {
            return Err(PublishError::Rejected(format!(
                "{length} characters exceeds limit of {}",
                self.max_length
            )));
        }

        let response = self
            .client
            .post(format!("{}/tweets", self.endpoint))
            .bearer_auth(&self.bearer_token)
            .json(&json!({ "text": text }))
            .send()
            .await;
        Self::finish(response).await
    }
}

/// Dry-run publisher: logs what would have been posted.
#[derive(Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn verify_credentials(&self) -> std::result::Result<(), PublishError> {
        log::info!("Dry run: skipping credential check");
        Ok(())
    }

    async fn publish(&self, text: &str) -> std::result::Result<(), PublishError> {
        log::info!("Dry run post: {}", text);
        Ok(())
    }
}
