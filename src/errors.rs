use crate::bridge::BridgeError;
use crate::identity::IdentityError;
use crate::models::FieldError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
};
use serde::Serialize;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub errors: Vec<FieldError>,
    pub requires_registration: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    status: &'static str,
    message: &'a str,
    #[serde(skip_serializing_if = "<[FieldError]>::is_empty")]
    errors: &'a [FieldError],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    requires_registration: bool,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: Vec::new(),
            requires_registration: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn validation(errors: Vec<FieldError>) -> Self {
        Self {
            errors,
            ..Self::bad_request("Validation failed")
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn registration_required() -> Self {
        Self {
            requires_registration: true,
            ..Self::new(
                StatusCode::NOT_FOUND,
                "User not found. Please complete registration first.",
            )
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<BridgeError> for AppError {
    fn from(err: BridgeError) -> Self {
        let status = match &err {
            BridgeError::Unavailable { .. } => StatusCode::BAD_GATEWAY,
            BridgeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            BridgeError::Malformed(_) | BridgeError::Reported(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        let status = match &err {
            IdentityError::InvalidToken | IdentityError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            IdentityError::Rejected(_) => StatusCode::BAD_REQUEST,
            IdentityError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            status: "error",
            message: &self.message,
            errors: &self.errors,
            requires_registration: self.requires_registration,
        };
        (self.status, Json(body)).into_response()
    }
}
