//! Request extractors for authenticated callers.

use crate::errors::AppError;
use crate::models::UserProfile;
use crate::state::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

/// Raw bearer token from the `Authorization` header.
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        match token {
            Some(token) => Ok(Self(token.to_string())),
            None => Err(AppError::unauthorized("Access token required")),
        }
    }
}

/// Verified caller with an active local profile.
pub struct CurrentUser(pub UserProfile);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;

        let claims = state.identity.verify_token(&token).await.map_err(|err| {
            warn!("token verification failed: {err}");
            AppError::from(err)
        })?;

        let profiles = state.profiles.lock().await;
        profiles
            .by_uid(&claims.uid)
            .filter(|user| user.is_active)
            .cloned()
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("User not found or inactive"))
    }
}

/// Caller whose profile carries the admin flag.
pub struct AdminUser(pub UserProfile);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            warn!(uid = %user.firebase_uid, "non-admin caller rejected");
            return Err(AppError::forbidden("Admin access required"));
        }
        Ok(Self(user))
    }
}
