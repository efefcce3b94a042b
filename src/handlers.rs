use crate::auth::AdminUser;
use crate::bridge::now_timestamp;
use crate::errors::AppError;
use crate::extract::PathParam;
use crate::models::{ApiResponse, DailyAnalysis, ServiceBanner, SystemHealth};
use crate::state::AppState;
use axum::{
    Json,
    extract::State,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info};

static DATE_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date pattern"));

pub async fn index() -> Json<ServiceBanner> {
    Json(ServiceBanner {
        service: "Hostel Flavour API",
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn daily_analysis(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    PathParam(date): PathParam<String>,
) -> Result<Json<DailyAnalysis>, AppError> {
    if !is_valid_date(&date) {
        return Err(AppError::bad_request("Invalid date format. Use YYYY-MM-DD"));
    }

    info!(%date, admin = %admin.email, mode = state.engine.mode(), "daily analysis requested");
    let analysis = state.engine.fetch_daily_analysis(&date).await.map_err(|err| {
        error!(%date, error = ?err, "analytics bridge failed");
        AppError::from(err)
    })?;

    match &analysis {
        DailyAnalysis::Success { charts, .. } => {
            info!(%date, charts = charts.as_ref().map_or(0, |c| c.len()), "analysis ready");
        }
        DailyAnalysis::NoData { kind, .. } => {
            info!(%date, ?kind, "no analysis data");
        }
    }

    Ok(Json(analysis))
}

pub async fn system_health(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Json<ApiResponse<SystemHealth>> {
    let health = state.engine.check_health().await;
    if !health.available {
        error!(error = ?health.error, "analytics engine unreachable");
    }

    Json(ApiResponse::data(SystemHealth {
        engine_available: health.available,
        mode: state.engine.mode(),
        dependencies: health,
        timestamp: now_timestamp(),
    }))
}

/// Shape check only; calendar validity is left to the engine.
pub fn is_valid_date(date: &str) -> bool {
    DATE_FORMAT.is_match(date)
}
