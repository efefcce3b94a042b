use super::{AnalysisResult, AnalyticsEngine, BridgeError, detail_text, parse_document};
use crate::models::EngineHealth;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Talks to a running analytics service over HTTP.
#[derive(Clone)]
pub struct HttpEngine {
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct RemoteError {
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpEngine {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> BridgeError {
        if err.is_timeout() {
            BridgeError::Timeout {
                ceiling: self.timeout,
            }
        } else if err.is_decode() || err.is_body() {
            BridgeError::Malformed(err.to_string())
        } else {
            BridgeError::Unavailable {
                detail: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl AnalyticsEngine for HttpEngine {
    fn mode(&self) -> &'static str {
        "http"
    }

    async fn fetch_daily_analysis(&self, date: &str) -> AnalysisResult {
        let url = format!("{}/api/analytics/daily/{date}", self.base_url);
        debug!(%url, "requesting daily analysis");

        let response = self
            .client
            .get(&url)
            .query(&[("include_charts", "true")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| self.transport_error(err))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| self.transport_error(err))?;

        if !status.is_success() {
            warn!(%status, "analytics service returned an error status");
            let message = serde_json::from_slice::<RemoteError>(&body)
                .ok()
                .and_then(|remote| {
                    remote
                        .detail
                        .as_ref()
                        .and_then(detail_text)
                        .or(remote.message)
                })
                .unwrap_or_else(|| "Analytics service error".to_string());
            return Err(BridgeError::Reported(message));
        }

        parse_document(&body, date)
    }

    async fn check_health(&self) -> EngineHealth {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => EngineHealth {
                available: true,
                details: resp.json::<Value>().await.ok(),
                error: None,
            },
            Ok(resp) => EngineHealth {
                available: false,
                details: None,
                error: Some(format!("health check returned {}", resp.status())),
            },
            Err(err) => EngineHealth {
                available: false,
                details: None,
                error: Some(err.to_string()),
            },
        }
    }
}
