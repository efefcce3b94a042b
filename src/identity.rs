//! Identity provider seam. Credentials never touch this service's own
//! storage; they are checked by the provider and the local profile is keyed
//! by the provider's user id.

use crate::config::IdentityConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Rejected(String),

    #[error("Identity provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityClaims {
    pub uid: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignedIn {
    pub uid: String,
    pub id_token: String,
    pub refresh_token: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_token(&self, id_token: &str) -> Result<IdentityClaims, IdentityError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<SignedIn, IdentityError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignedIn, IdentityError>;

    /// Removes the account owning `id_token`; used to roll back a sign-up
    /// whose local profile could not be stored.
    async fn delete_account(&self, id_token: &str) -> Result<(), IdentityError>;
}

/// Firebase Authentication through the Identity Toolkit REST API.
#[derive(Clone)]
pub struct FirebaseIdentity {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdTokenRequest<'a> {
    id_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdateRequest<'a> {
    id_token: &'a str,
    display_name: &'a str,
    return_secure_token: bool,
}

impl FirebaseIdentity {
    pub fn new(config: &IdentityConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: reqwest::Client::new(),
        }
    }

    /// POSTs to `accounts:{method}`. The outer error is a transport
    /// failure; the inner one is the provider's error code.
    async fn call<B, R>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<Result<R, String>, IdentityError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/accounts:{method}", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(Ok(response.json::<R>().await?));
        }

        let code = response
            .json::<ErrorResponse>()
            .await
            .map(|body| body.error.message)
            .unwrap_or_else(|_| status.to_string());
        warn!(method, %status, code = %code, "identity provider rejected request");
        Ok(Err(code))
    }
}

/// Maps a provider error code onto a readable rejection message.
fn rejection(code: String) -> IdentityError {
    let message = match code.split(':').next().unwrap_or_default().trim() {
        "EMAIL_EXISTS" => "Email is already registered".to_string(),
        "WEAK_PASSWORD" => "Password must be at least 6 characters".to_string(),
        "INVALID_EMAIL" => "Please provide a valid email".to_string(),
        "OPERATION_NOT_ALLOWED" => "Password sign-up is disabled".to_string(),
        _ => code,
    };
    IdentityError::Rejected(message)
}

#[async_trait]
impl IdentityProvider for FirebaseIdentity {
    async fn verify_token(&self, id_token: &str) -> Result<IdentityClaims, IdentityError> {
        let lookup: LookupResponse = self
            .call("lookup", &IdTokenRequest { id_token })
            .await?
            .map_err(|_| IdentityError::InvalidToken)?;

        let user = lookup
            .users
            .into_iter()
            .next()
            .ok_or(IdentityError::InvalidToken)?;
        Ok(IdentityClaims {
            uid: user.local_id,
            email: user.email,
            email_verified: user.email_verified,
            name: user.display_name,
        })
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<SignedIn, IdentityError> {
        let created: TokenResponse = self
            .call(
                "signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?
            .map_err(rejection)?;

        let update = ProfileUpdateRequest {
            id_token: &created.id_token,
            display_name,
            return_secure_token: false,
        };
        match self.call::<_, serde_json::Value>("update", &update).await {
            Ok(Ok(_)) => {}
            Ok(Err(code)) => warn!(uid = %created.local_id, %code, "failed to set display name"),
            Err(err) => warn!(uid = %created.local_id, "failed to set display name: {err}"),
        }

        Ok(SignedIn {
            uid: created.local_id,
            id_token: created.id_token,
            refresh_token: created.refresh_token,
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignedIn, IdentityError> {
        let session: TokenResponse = self
            .call(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?
            .map_err(|_| IdentityError::InvalidCredentials)?;

        Ok(SignedIn {
            uid: session.local_id,
            id_token: session.id_token,
            refresh_token: session.refresh_token,
        })
    }

    async fn delete_account(&self, id_token: &str) -> Result<(), IdentityError> {
        self.call::<_, serde_json::Value>("delete", &IdTokenRequest { id_token })
            .await?
            .map(|_| ())
            .map_err(rejection)
    }
}
