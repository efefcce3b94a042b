use crate::accounts;
use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/analytics/daily/:date", get(handlers::daily_analysis))
        .route("/api/analytics/system/health", get(handlers::system_health))
        .route("/api/auth/register", post(accounts::register))
        .route("/api/auth/login", post(accounts::login))
        .route("/api/auth/google-login", post(accounts::google_login))
        .route("/api/auth/sync-user", post(accounts::sync_user))
        .route("/api/auth/me", get(accounts::me))
        .route("/api/auth/logout", post(accounts::logout))
        .with_state(state)
}
