//! HTTP client for the upstream order service.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::BridgeError;

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(250);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Order as the upstream service reports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamOrder {
    pub id: String,
    pub status: String,
}

/// Client for the upstream order service with bounded-backoff retries.
#[derive(Clone)]
pub struct OrderServiceClient {
    http: reqwest::Client,
    base_url: String,
}

impl OrderServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Issue a request, retrying transient failures (network errors and 5xx)
    /// with exponential backoff.
    async fn send_with_retry(
        &self,
        label: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BridgeError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status().is_server_error() => {
                    tracing::warn!(
                        call = %label,
                        attempt = attempt,
                        status = response.status().as_u16(),
                        "upstream returned a transient error"
                    );
                }
                Ok(response) => return Err(BridgeError::Status(response.status().as_u16())),
                Err(err) => {
                    tracing::warn!(call = %label, attempt = attempt, error = %err, "upstream call failed");
                }
            }

            if attempt >= MAX_ATTEMPTS {
                return Err(BridgeError::RetriesExhausted(label.to_string(), attempt));
            }
            tokio::time::sleep(BASE_BACKOFF * 2u32.pow(attempt - 1)).await;
        }
    }

    /// Mirror an order status change upstream.
    pub async fn update_order_status(
        &self,
        order_id: &str,
        status: &str,
    ) -> Result<(), BridgeError> {
        let url = format!("{}/api/v1/orders/{}/status", self.base_url, order_id);
        self.send_with_retry("update_order_status", || {
            self.http.put(&url).json(&json!({ "status": status }))
        })
        .await?;
        Ok(())
    }

    /// Tell the upstream service an order finished, with its actual time.
    pub async fn notify_completed(
        &self,
        order_id: &str,
        actual_time_secs: i64,
    ) -> Result<(), BridgeError> {
        let url = format!("{}/api/v1/orders/{}/completion", self.base_url, order_id);
        self.send_with_retry("notify_completed", || {
            self.http
                .post(&url)
                .json(&json!({ "actual_time": actual_time_secs }))
        })
        .await?;
        Ok(())
    }

    /// Fetch an order's upstream view; `None` when the upstream forgot it.
    pub async fn fetch_order(&self, order_id: &str) -> Result<Option<UpstreamOrder>, BridgeError> {
        let url = format!("{}/api/v1/orders/{}", self.base_url, order_id);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.http.get(&url).send().await {
                Ok(response) if response.status() == reqwest::StatusCode::NOT_FOUND => {
                    return Ok(None)
                }
                Ok(response) if response.status().is_success() => {
                    return Ok(Some(response.json().await?))
                }
                Ok(response) if !response.status().is_server_error() => {
                    return Err(BridgeError::Status(response.status().as_u16()))
                }
                Ok(response) => {
                    tracing::warn!(
                        order_id = %order_id,
                        attempt = attempt,
                        status = response.status().as_u16(),
                        "upstream fetch returned a transient error"
                    );
                }
                Err(err) => {
                    tracing::warn!(order_id = %order_id, attempt = attempt, error = %err, "upstream fetch failed");
                }
            }

            if attempt >= MAX_ATTEMPTS {
                return Err(BridgeError::RetriesExhausted("fetch_order".into(), attempt));
            }
            tokio::time::sleep(BASE_BACKOFF * 2u32.pow(attempt - 1)).await;
        }
    }
}
