//! Registration, sign-in and session handlers.

use crate::auth::{BearerToken, CurrentUser};
use crate::errors::AppError;
use crate::extract::JsonBody;
use crate::identity::IdentityError;
use crate::models::{
    ApiResponse, FieldError, GoogleLoginRequest, LoginRequest, NewProfile, RegisterRequest,
    SessionPayload, UserPayload,
};
use crate::state::AppState;
use crate::storage::{persist_data, uid_taken};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{error, info, warn};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern"));
static HOSTEL_ROOM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?i)[AB]-[0-9]+$").expect("room pattern"));

const GOOGLE_ROLL_PREFIX: &str = "GOOGLE-";

type Session = Json<ApiResponse<SessionPayload>>;

#[derive(Debug, PartialEq)]
struct Registration {
    email: String,
    password: String,
    name: String,
    roll_number: String,
    hostel_room: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if !EMAIL.is_match(email) {
        errors.push(FieldError {
            field: "email",
            message: "Please provide a valid email",
        });
    }
}

fn check_password(password: &str, errors: &mut Vec<FieldError>) {
    if password.chars().count() < 6 {
        errors.push(FieldError {
            field: "password",
            message: "Password must be at least 6 characters",
        });
    }
}

impl RegisterRequest {
    fn validate(self) -> Result<Registration, AppError> {
        let mut errors = Vec::new();
        let email = normalize_email(&self.email);
        check_email(&email, &mut errors);
        check_password(&self.password, &mut errors);

        let name = self.name.trim().to_string();
        if !(2..=100).contains(&name.chars().count()) {
            errors.push(FieldError {
                field: "name",
                message: "Name must be between 2 and 100 characters",
            });
        }

        let roll_number = self.roll_number.trim().to_uppercase();
        if roll_number.is_empty() {
            errors.push(FieldError {
                field: "rollNumber",
                message: "Roll number is required",
            });
        }

        let hostel_room = self.hostel_room.trim().to_uppercase();
        if !HOSTEL_ROOM.is_match(&hostel_room) {
            errors.push(FieldError {
                field: "hostelRoom",
                message: "Room format should be like A-101 or B-205",
            });
        }

        if !errors.is_empty() {
            return Err(AppError::validation(errors));
        }
        Ok(Registration {
            email,
            password: self.password,
            name,
            roll_number,
            hostel_room,
        })
    }
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Session), AppError> {
    let form = payload.validate()?;
    let taken = || AppError::bad_request("User already exists with this email or roll number");

    if state
        .profiles
        .lock()
        .await
        .conflicts(&form.email, &form.roll_number)
    {
        return Err(taken());
    }

    let account = state
        .identity
        .sign_up(&form.email, &form.password, &form.name)
        .await
        .map_err(|err| {
            error!("identity sign-up failed: {err}");
            AppError::from(err)
        })?;

    let mut profiles = state.profiles.lock().await;
    // Another request may have claimed the email or roll number meanwhile.
    if profiles.conflicts(&form.email, &form.roll_number) {
        drop(profiles);
        rollback_account(&state, &account.id_token).await;
        return Err(taken());
    }

    let user = profiles.insert(NewProfile {
        name: form.name,
        email: form.email,
        roll_number: form.roll_number,
        hostel_room: form.hostel_room,
        firebase_uid: account.uid.clone(),
        last_login: None,
    });

    if let Err(err) = persist_data(&state.data_path, &profiles).await {
        error!("failed to persist new profile: {}", err.message);
        profiles.remove(&account.uid);
        drop(profiles);
        rollback_account(&state, &account.id_token).await;
        return Err(AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create user profile",
        ));
    }
    drop(profiles);

    info!(uid = %user.firebase_uid, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "User registered successfully",
            SessionPayload {
                user,
                id_token: account.id_token,
                refresh_token: account.refresh_token,
            },
        )),
    ))
}

async fn rollback_account(state: &AppState, id_token: &str) {
    if let Err(err) = state.identity.delete_account(id_token).await {
        error!("failed to roll back identity account: {err}");
    }
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Session, AppError> {
    let email = normalize_email(&payload.email);
    let mut errors = Vec::new();
    check_email(&email, &mut errors);
    check_password(&payload.password, &mut errors);
    if !errors.is_empty() {
        return Err(AppError::validation(errors));
    }

    let invalid = || AppError::unauthorized("Invalid email or password");
    let known = state
        .profiles
        .lock()
        .await
        .by_email(&email)
        .is_some_and(|user| user.is_active);
    if !known {
        return Err(invalid());
    }

    let session = state
        .identity
        .sign_in_with_password(&email, &payload.password)
        .await
        .map_err(|err| match err {
            IdentityError::Transport(_) => AppError::from(err),
            _ => invalid(),
        })?;

    let mut profiles = state.profiles.lock().await;
    let Some(user) = profiles.by_uid_mut(&session.uid) else {
        warn!(uid = %session.uid, "password sign-in for an unmirrored account");
        return Err(invalid());
    };
    user.last_login = Some(Utc::now());
    let user = user.clone();
    persist_data(&state.data_path, &profiles).await?;

    Ok(Json(ApiResponse::with_message(
        "Login successful",
        SessionPayload {
            user,
            id_token: session.id_token,
            refresh_token: session.refresh_token,
        },
    )))
}

pub async fn google_login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<GoogleLoginRequest>,
) -> Result<Session, AppError> {
    let id_token = payload.id_token.trim().to_string();
    if id_token.is_empty() {
        return Err(AppError::validation(vec![FieldError {
            field: "idToken",
            message: "Google ID token is required",
        }]));
    }

    let claims = state.identity.verify_token(&id_token).await.map_err(|err| {
        warn!("google token verification failed: {err}");
        match err {
            IdentityError::Transport(_) => AppError::from(err),
            _ => AppError::unauthorized("Invalid Google token"),
        }
    })?;

    let Some(email) = claims.email.as_deref().map(normalize_email) else {
        return Err(AppError::bad_request("Email not provided by Google"));
    };

    let now = Utc::now();
    let mut profiles = state.profiles.lock().await;
    let existing = profiles.by_email(&email).map(|user| user.firebase_uid.clone());
    let returning = match existing {
        Some(old_uid) => profiles
            .rekey(&old_uid, &claims.uid)
            .inspect_err(|_| warn!(uid = %claims.uid, "google uid already linked elsewhere"))?
            .map(|user| {
                user.last_login = Some(now);
                user.clone()
            }),
        None => None,
    };
    let user = match returning {
        Some(user) => user,
        None if profiles.by_uid(&claims.uid).is_some() => {
            warn!(uid = %claims.uid, "google uid already linked elsewhere");
            return Err(uid_taken());
        }
        None => {
            let name = claims
                .name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
            profiles.insert(NewProfile {
                name,
                email,
                roll_number: format!("{GOOGLE_ROLL_PREFIX}{}", now.timestamp_millis()),
                hostel_room: "NOT-SET".to_string(),
                firebase_uid: claims.uid.clone(),
                last_login: Some(now),
            })
        }
    };
    persist_data(&state.data_path, &profiles).await?;
    drop(profiles);

    let message = if user.roll_number.starts_with(GOOGLE_ROLL_PREFIX) {
        "Please complete your profile"
    } else {
        "Login successful"
    };
    Ok(Json(ApiResponse::with_message(
        message,
        SessionPayload {
            user,
            id_token,
            refresh_token: None,
        },
    )))
}

pub async fn sync_user(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<ApiResponse<UserPayload>>, AppError> {
    let claims = state.identity.verify_token(&token).await.map_err(|err| match err {
        IdentityError::Transport(_) => AppError::from(err),
        _ => AppError::unauthorized("Invalid Firebase token"),
    })?;

    let mut profiles = state.profiles.lock().await;
    let Some(user) = profiles
        .by_uid_mut(&claims.uid)
        .filter(|user| user.is_active)
    else {
        return Err(AppError::registration_required());
    };
    user.last_login = Some(Utc::now());
    let user = user.clone();
    persist_data(&state.data_path, &profiles).await?;

    Ok(Json(ApiResponse::data(UserPayload { user })))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<ApiResponse<UserPayload>> {
    Json(ApiResponse::data(UserPayload { user }))
}

pub async fn logout() -> Json<ApiResponse<()>> {
    Json(ApiResponse::message("Logged out successfully"))
}
