use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Charts keyed by name. Entries are whatever the engine rendered (a
/// `data:` URI under `base64`, file paths, word weights, or `null`) and
/// are relayed as-is.
pub type ChartSet = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataKind {
    NoFeedback,
    FutureDate,
}

/// Normalized analytics bundle for a single day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DailyAnalysis {
    Success {
        data: Value,
        charts: Option<ChartSet>,
        date: String,
        timestamp: String,
    },
    NoData {
        #[serde(rename = "type")]
        kind: NoDataKind,
        message: String,
        date: String,
        data: Option<Value>,
        charts: Option<ChartSet>,
        timestamp: String,
    },
}

/// Loosest shape any engine transport can hand back.
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub charts: Option<ChartSet>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub error: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineHealth {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    pub engine_available: bool,
    pub mode: &'static str,
    pub dependencies: EngineHealth,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct ServiceBanner {
    pub service: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

/// Success envelope shared by every JSON route.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn data(data: T) -> Self {
        Self {
            status: "success",
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: Some(message.into()),
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub roll_number: String,
    pub hostel_room: String,
    pub is_admin: bool,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    pub firebase_uid: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

fn active_by_default() -> bool {
    true
}

/// Profile fields supplied by a sign-up flow before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub name: String,
    pub email: String,
    pub roll_number: String,
    pub hostel_room: String,
    pub firebase_uid: String,
    pub last_login: Option<DateTime<Utc>>,
}

/// On-disk profile store, keyed by the identity provider's user id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfileData {
    #[serde(default)]
    pub next_id: u64,
    #[serde(default)]
    pub users: BTreeMap<String, UserProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub roll_number: String,
    #[serde(default)]
    pub hostel_room: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    #[serde(default)]
    pub id_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    pub user: UserProfile,
    pub id_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserPayload {
    pub user: UserProfile,
}
