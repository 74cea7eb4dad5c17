/// Unified error types for the Sabil registry
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No valid caller identity where one is required
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid identity lacking the required role, or a self-action block
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Target entity absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or malformed fields, duplicate unique key on create
    #[error("Validation error: {0}")]
    Validation(String),

    /// Uniqueness violation on update (e.g. sabil collision)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JWT errors
    #[error("JWT error: {0}")]
    Jwt(String),

    /// Rate limiting errors
    #[error("Rate limit exceeded")]
    RateLimitExceeded { retry_after: std::time::Duration },

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Status classification used by the envelope and the HTTP layer
    pub fn status(&self) -> StatusCode {
        match self {
            RegistryError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            RegistryError::Forbidden(_) => StatusCode::FORBIDDEN,
            RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::Validation(_) => StatusCode::BAD_REQUEST,
            RegistryError::Conflict(_) => StatusCode::CONFLICT,
            RegistryError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            RegistryError::Database(_) | RegistryError::Jwt(_) | RegistryError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> String {
        match self {
            RegistryError::Unauthorized(msg)
            | RegistryError::Forbidden(msg)
            | RegistryError::NotFound(msg)
            | RegistryError::Validation(msg)
            | RegistryError::Conflict(msg) => msg.clone(),
            RegistryError::RateLimitExceeded { .. } => "Rate limit exceeded".to_string(),
            // Don't leak details
            RegistryError::Database(_) | RegistryError::Jwt(_) | RegistryError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

/// Error envelope returned on every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: String,
}

/// Convert RegistryError to HTTP response
impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Request failed with internal error");
        }

        let body = Json(ErrorEnvelope {
            success: false,
            error: self.public_message(),
        });

        let mut response = (status, body).into_response();
        if let RegistryError::RateLimitExceeded { retry_after } = self {
            if let Ok(value) = retry_after.as_secs().to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

/// First field message, searched through nested structs and lists
impl From<validator::ValidationErrors> for RegistryError {
    fn from(errors: validator::ValidationErrors) -> Self {
        RegistryError::Validation(
            first_validation_message(&errors).unwrap_or_else(|| "Invalid request".to_string()),
        )
    }
}

/// Fields are visited in name order so the reported message is stable
fn first_validation_message(errors: &validator::ValidationErrors) -> Option<String> {
    use validator::ValidationErrorsKind;

    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|(a, _), (b, _)| a.cmp(b));

    fields.into_iter().find_map(|(_, kind)| match kind {
        ValidationErrorsKind::Field(errs) => errs
            .iter()
            .find_map(|e| e.message.as_ref().map(|m| m.to_string())),
        ValidationErrorsKind::Struct(inner) => first_validation_message(inner),
        ValidationErrorsKind::List(items) => {
            let mut items: Vec<_> = items.iter().collect();
            items.sort_by_key(|(index, _)| **index);
            items
                .into_iter()
                .find_map(|(_, inner)| first_validation_message(inner))
        }
    })
}

/// Malformed request bodies are validation failures
impl From<JsonRejection> for RegistryError {
    fn from(rejection: JsonRejection) -> Self {
        RegistryError::Validation(rejection.body_text())
    }
}

/// Result type alias for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
