//! is.gd link shortener with an hourly request budget.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::time::Instant;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::ShortenerConfig;
use crate::services::LinkShortener;
use crate::utils::http;

/// is.gd error code for "rate limit exceeded".
const ISGD_RATE_LIMITED: u32 = 3;

/// Fixed-window request counter.
#[derive(Debug)]
pub struct RequestBudget {
    limit: u32,
    window: Duration,
    state: Mutex<BudgetState>,
}

#[derive(Debug)]
struct BudgetState {
    window_start: Instant,
    used: u32,
}

impl RequestBudget {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(BudgetState {
                window_start: Instant::now(),
                used: 0,
            }),
        }
    }

    pub fn hourly(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(3600))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut BudgetState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.window_start.elapsed() >= self.window {
            state.window_start = Instant::now();
            state.used = 0;
        }
        f(&mut state)
    }

    /// Take one request from the current window, if any are left.
    pub fn try_acquire(&self) -> bool {
        let limit = self.limit;
        self.with_state(|state| {
            if state.used < limit {
                state.used += 1;
                true
            } else {
                false
            }
        })
    }

    /// Use up the rest of the current window.
    pub fn exhaust(&self) {
        let limit = self.limit;
        self.with_state(|state| state.used = limit);
    }

    pub fn remaining(&self) -> u32 {
        let limit = self.limit;
        self.with_state(|state| limit.saturating_sub(state.used))
    }
}

#[derive(Debug, Deserialize)]
struct IsGdResponse {
    #[serde(default)]
    shorturl: Option<String>,
    #[serde(default)]
    errorcode: Option<u32>,
    #[serde(default)]
    errormessage: Option<String>,
}

/// Shortener backed by the is.gd JSON API.
pub struct IsGdShortener {
    client: reqwest::Client,
    endpoint: String,
    budget: RequestBudget,
}

impl IsGdShortener {
    pub fn new(config: &ShortenerConfig, user_agent: &str) -> Result<Self> {
        let client = http::create_async_client(user_agent, config.timeout_secs)?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            budget: RequestBudget::hourly(config.hourly_limit),
        })
    }

    pub fn budget(&self) -> &RequestBudget {
        &self.budget
    }
}

#[async_trait]
impl LinkShortener for IsGdShortener {
    async fn shorten(&self, long_url: &str) -> Result<String> {
        let parsed = Url::parse(long_url).map_err(|e| AppError::shortening(long_url, e))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::shortening(
                long_url,
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        if !self.budget.try_acquire() {
            return Err(AppError::shortening(
                long_url,
                "hourly request budget exhausted",
            ));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "json"), ("url", long_url), ("logstats", "0")])
            .send()
            .await
            .map_err(|e| AppError::shortening(long_url, e))?;

        // is.gd reports its errors, rate limiting included, with a JSON body
        // on a non-2xx status
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::shortening(long_url, e))?;
        let body: IsGdResponse = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(_) if !status.is_success() => {
                return Err(AppError::shortening(long_url, format!("HTTP {status}")));
            }
            Err(e) => return Err(AppError::shortening(long_url, e)),
        };

        match body.shorturl {
            Some(short) if !short.is_empty() => Ok(short),
            _ if body.errorcode.is_none() && !status.is_success() => {
                Err(AppError::shortening(long_url, format!("HTTP {status}")))
            }
            _ => {
                if body.errorcode == Some(ISGD_RATE_LIMITED) {
                    self.budget.exhaust();
                }
                Err(AppError::shortening(
                    long_url,
                    format!(
                        "is.gd error {}: {}",
                        body.errorcode.unwrap_or_default(),
                        body.errormessage.unwrap_or_default()
                    ),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CannedResponse, serve_canned};

    fn shortener(endpoint: &str, limit: u32) -> IsGdShortener {
        let config = ShortenerConfig {
            endpoint: endpoint.to_string(),
            hourly_limit: limit,
            ..ShortenerConfig::default()
        };
        IsGdShortener::new(&config, "billwatch-test").unwrap()
    }

    #[tokio::test]
    async fn test_budget_window_rolls_over() {
        tokio::time::pause();
        let budget = RequestBudget::new(2, Duration::from_secs(60));

        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert!(!budget.try_acquire());
        assert_eq!(budget.remaining(), 0);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(budget.remaining(), 2);
        assert!(budget.try_acquire());
    }

    #[tokio::test]
    async fn test_exhaust_empties_window() {
        let budget = RequestBudget::hourly(200);
        budget.exhaust();
        assert!(!budget.try_acquire());
    }

    #[tokio::test]
    async fn test_rejects_malformed_url_without_request() {
        let s = shortener("http://127.0.0.1:9/create.php", 5);
        let err = s.shorten("not a url").await.unwrap_err();
        assert!(matches!(err, AppError::ShorteningFailed { .. }));
        let err = s.shorten("ftp://example.com/file").await.unwrap_err();
        assert!(matches!(err, AppError::ShorteningFailed { .. }));
        assert_eq!(s.budget().remaining(), 5);
    }

    #[tokio::test]
    async fn test_exhausted_budget_fails_fast() {
        let s = shortener("http://127.0.0.1:9/create.php", 1);
        s.budget().exhaust();
        let err = s.shorten("https://www.congress.gov/x").await.unwrap_err();
        assert!(err.to_string().contains("budget exhausted"));
    }

    #[tokio::test]
    async fn test_shortens_via_api() {
        let server = serve_canned(vec![CannedResponse::json(
            200,
            r#"{"shorturl": "https://is.gd/abc123"}"#,
        )])
        .await;
        let s = shortener(&format!("{}/create.php", server.base_url), 10);

        let short = s
            .shorten("https://www.congress.gov/bill/115th-congress/house-bill/999")
            .await
            .unwrap();
        assert_eq!(short, "https://is.gd/abc123");

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].line.starts_with("GET /create.php?format=json&url="));
        assert!(requests[0].line.contains("logstats=0"));
        assert_eq!(s.budget().remaining(), 9);
    }

    #[tokio::test]
    async fn test_rate_limit_error_exhausts_budget() {
        let server = serve_canned(vec![CannedResponse::json(
            502,
            r#"{"errorcode": 3, "errormessage": "Rate limit exceeded"}"#,
        )])
        .await;
        let s = shortener(&format!("{}/create.php", server.base_url), 10);

        let err = s.shorten("https://www.congress.gov/x").await.unwrap_err();
        assert!(err.to_string().contains("Rate limit exceeded"));
        assert_eq!(s.budget().remaining(), 0);
    }

    #[tokio::test]
    async fn test_http_error_status_fails() {
        let server = serve_canned(vec![
            CannedResponse::json(502, "{}"),
            CannedResponse::json(503, "<html>Service Unavailable</html>"),
        ])
        .await;
        let s = shortener(&format!("{}/create.php", server.base_url), 10);
        let err = s.shorten("https://www.congress.gov/x").await.unwrap_err();
        assert!(err.to_string().contains("HTTP 502"));
        let err = s.shorten("https://www.congress.gov/y").await.unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
        assert_eq!(s.budget().remaining(), 8);
    }

    #[tokio::test]
    async fn test_other_api_errors_keep_budget() {
        let server = serve_canned(vec![CannedResponse::json(
            400,
            r#"{"errorcode": 1, "errormessage": "Please specify a valid URL"}"#,
        )])
        .await;
        let s = shortener(&format!("{}/create.php", server.base_url), 10);

        let err = s.shorten("https://www.congress.gov/x").await.unwrap_err();
        assert!(err.to_string().contains("is.gd error 1"));
        assert_eq!(s.budget().remaining(), 9);
    }
}
