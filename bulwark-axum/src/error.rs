use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bulwark::BulwarkError;
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account locked until {locked_until}")]
    AccountLocked { locked_until: DateTime<Utc> },

    #[error("Captcha verification required")]
    CaptchaRequired,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Service unavailable")]
    ServiceUnavailable,
}

impl From<BulwarkError> for ApiError {
    fn from(err: BulwarkError) -> Self {
        match err {
            BulwarkError::InvalidCredentials => ApiError::InvalidCredentials,
            BulwarkError::AccountLocked { locked_until } => ApiError::AccountLocked { locked_until },
            BulwarkError::CaptchaRequired => ApiError::CaptchaRequired,
            BulwarkError::Validation(msg) => ApiError::BadRequest(msg),
            BulwarkError::Storage(msg) | BulwarkError::Event(msg) => {
                // The cause stays in the logs; clients only learn to retry later.
                tracing::error!(error = %msg, "Lockout check unavailable");
                ApiError::ServiceUnavailable
            }
        }
    }
}

impl From<bulwark_core::Error> for ApiError {
    fn from(err: bulwark_core::Error) -> Self {
        BulwarkError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::AccountLocked { .. } => StatusCode::LOCKED,
            ApiError::CaptchaRequired => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
            "code": status.as_u16()
        });

        if let ApiError::AccountLocked { locked_until } = self {
            body["lockoutEndsAt"] = json!(locked_until);
            let retry_after = (locked_until - Utc::now()).num_seconds().max(0);
            return (
                status,
                [(header::RETRY_AFTER, retry_after.to_string())],
                Json(body),
            )
                .into_response();
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
