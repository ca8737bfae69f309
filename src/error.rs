//! Unified application error model and mapping helpers.
//! This module provides a common error enum used across the HTTP boundary and
//! the authorization core, along with a mapper to HTTP status codes.
//!
//! Denial is not an error: `AuthorizationGuard::authorize` returns `Ok(false)`
//! and only the boundary layer turns that into a 403. The `Forbidden` variant
//! exists for the boundary's own use when it emits that response.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Forbidden { code: String, message: String },
    Store { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Store { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Store { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict<S: Into<String>>(code: S, msg: S) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn store<S: Into<String>>(code: S, msg: S) -> Self { AppError::Store { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    pub fn is_not_found(&self) -> bool { matches!(self, AppError::NotFound { .. }) }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Conflict { .. } => 409,
            AppError::Forbidden { .. } => 403,
            AppError::Store { .. } => 500,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: the only anyhow sources in this crate are store-side
        AppError::Store { code: "store_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::conflict("conflict", "dup").http_status(), 409);
        assert_eq!(AppError::forbidden("forbidden", "no").http_status(), 403);
        assert_eq!(AppError::store("store_error", "down").http_status(), 500);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn anyhow_maps_to_store() {
        let e: AppError = anyhow::anyhow!("connection refused").into();
        assert_eq!(e.http_status(), 500);
        assert_eq!(e.code_str(), "store_error");
        assert!(e.message().contains("connection refused"));
    }

    #[test]
    fn display_carries_code_and_message() {
        let e = AppError::not_found("role_not_found", "no such role");
        assert_eq!(format!("{}", e), "role_not_found: no such role");
    }
}
