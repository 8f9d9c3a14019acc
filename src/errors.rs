use actix_web::{
    error,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use derive_more::{Display, Error};

/// Crate-wide error taxonomy. Domain violations get their own variants so
/// callers can match on kinds instead of message content.
#[derive(Debug, Clone, PartialEq, Display, Error, serde::Serialize, serde::Deserialize)]
pub enum AppError {
    #[display(fmt = "not found")]
    NotFound,

    #[display(fmt = "already registered for this event")]
    DuplicateRegistration,

    #[display(fmt = "cannot cancel a completed registration")]
    InvalidStateTransition,

    #[display(fmt = "validation failed: {}", _0)]
    Validation(#[error(not(source))] String),

    #[display(fmt = "record already exists")]
    Conflict,

    #[display(fmt = "invalid email or password")]
    AuthError,

    #[display(fmt = "unauthorized")]
    Unauthorized,

    #[display(fmt = "account is locked, contact support")]
    AccountLocked,

    #[display(fmt = "storage error: {}", _0)]
    Storage(#[error(not(source))] String),

    #[display(fmt = "internal error")]
    InternalError,
}

impl error::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(serde_json::json!({ "error": self.to_string() }))
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::DuplicateRegistration => StatusCode::CONFLICT,
            AppError::InvalidStateTransition => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict => StatusCode::CONFLICT,
            AppError::AuthError => StatusCode::UNAUTHORIZED,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::AccountLocked => StatusCode::FORBIDDEN,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
