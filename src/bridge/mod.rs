//! Analytics bridge: fetches a day's analytics bundle from the external
//! engine and folds whatever shape it returns into [`DailyAnalysis`] or a
//! [`BridgeError`].
//!
//! Two transports implement [`AnalyticsEngine`]: [`HttpEngine`] talks to a
//! running analytics service, [`ProcessEngine`] runs the analysis script
//! once per request. Which one is used is decided by [`Config`] at startup.

mod http;
mod process;

pub use http::HttpEngine;
pub use process::ProcessEngine;

use crate::config::{AnalyticsMode, Config};
use crate::models::{DailyAnalysis, EngineHealth, NoDataKind, UpstreamPayload};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Analytics service is not available. Please ensure it is running.")]
    Unavailable { detail: String },

    #[error("Analytics service timeout after {}s. Please try again.", .ceiling.as_secs_f64())]
    Timeout { ceiling: Duration },

    #[error("Analytics service returned malformed output: {0}")]
    Malformed(String),

    #[error("{0}")]
    Reported(String),
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Malformed(err.to_string())
    }
}

/// `success | no_data` on the Ok side, the failure category on the Err side.
pub type AnalysisResult = Result<DailyAnalysis, BridgeError>;

#[async_trait]
pub trait AnalyticsEngine: Send + Sync {
    fn mode(&self) -> &'static str;

    /// `date` is expected to be `YYYY-MM-DD` already; it is forwarded as is.
    async fn fetch_daily_analysis(&self, date: &str) -> AnalysisResult;

    async fn check_health(&self) -> EngineHealth;
}

pub fn engine_from_config(config: &Config) -> Arc<dyn AnalyticsEngine> {
    match &config.analytics {
        AnalyticsMode::Http { base_url } => {
            Arc::new(HttpEngine::new(base_url, config.analytics_timeout))
        }
        AnalyticsMode::Process {
            interpreter,
            script,
        } => Arc::new(ProcessEngine::new(
            interpreter.clone(),
            script.clone(),
            config.analytics_timeout,
        )),
    }
}

pub(crate) fn parse_document(bytes: &[u8], requested_date: &str) -> AnalysisResult {
    let payload: UpstreamPayload = serde_json::from_slice(bytes)?;
    normalize(payload, requested_date)
}

pub(crate) fn normalize(payload: UpstreamPayload, requested_date: &str) -> AnalysisResult {
    if payload.error.unwrap_or(false) {
        let message = payload
            .message
            .or_else(|| payload.detail.as_ref().and_then(detail_text))
            .unwrap_or_else(|| "Analytics engine reported an error".to_string());
        return Err(BridgeError::Reported(message));
    }

    let date = payload.date.unwrap_or_else(|| requested_date.to_string());
    let timestamp = payload.timestamp.unwrap_or_else(now_timestamp);

    match payload.status.as_deref() {
        Some("success") => Ok(DailyAnalysis::Success {
            data: payload.data.unwrap_or(Value::Null),
            charts: payload.charts,
            date,
            timestamp,
        }),
        Some("no_data") => {
            let kind = payload
                .kind
                .ok_or_else(|| BridgeError::Malformed("no_data result without a type".into()))
                .and_then(|raw| serde_json::from_value::<NoDataKind>(raw).map_err(Into::into))?;
            Ok(DailyAnalysis::NoData {
                kind,
                message: payload
                    .message
                    .unwrap_or_else(|| default_no_data_message(kind).to_string()),
                date,
                data: payload.data,
                charts: payload.charts,
                timestamp,
            })
        }
        Some(other) => Err(BridgeError::Malformed(format!(
            "unrecognized status '{other}'"
        ))),
        None => Err(BridgeError::Malformed("missing status field".into())),
    }
}

/// FastAPI-style `detail` is either a string or a list of validation items.
pub(crate) fn detail_text(detail: &Value) -> Option<String> {
    match detail {
        Value::String(text) => Some(text.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn default_no_data_message(kind: NoDataKind) -> &'static str {
    match kind {
        NoDataKind::NoFeedback => "No feedback found for this date",
        NoDataKind::FutureDate => "Date is in the future",
    }
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
