//! Errors surfaced by the ledger services.
//!
//! [`NotFound`], [`Forbidden`] and [`InvalidState`] are deterministic lookup
//! or authorization failures and are returned to the caller as-is. The
//! balance computations themselves never fail.
//!
//! [`NotFound`]: LedgerError::NotFound
//! [`Forbidden`]: LedgerError::Forbidden
//! [`InvalidState`]: LedgerError::InvalidState
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use thiserror::Error;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("missing or invalid credentials")]
    Unauthorized,
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Serialization(#[from] bson::ser::Error),
}

impl LedgerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    pub fn invalid_state(reason: impl Into<String>) -> Self {
        Self::InvalidState(reason.into())
    }
}

impl ResponseError for LedgerError {
    fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Forbidden(_) => StatusCode::FORBIDDEN,
            LedgerError::InvalidState(_) | LedgerError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
            LedgerError::Unauthorized => StatusCode::UNAUTHORIZED,
            LedgerError::Database(_) | LedgerError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}
