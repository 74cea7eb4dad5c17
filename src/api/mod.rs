/// API routes and handlers
pub mod accounts;
pub mod geotags;
pub mod health;
pub mod middleware;
pub mod persons;
pub mod session;
pub mod stats;

use crate::{
    context::AppContext,
    error::RegistryError,
    pagination::{Page, Pagination},
};
use axum::{
    extract::FromRequest,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;

/// Build API routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .merge(health::routes())
        .merge(session::routes())
        .merge(persons::routes())
        .merge(accounts::routes())
        .merge(stats::routes())
        .merge(geotags::routes())
}

/// JSON body extractor whose rejections use the registry error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(RegistryError))]
pub struct ApiJson<T>(pub T);

/// Success envelope: `{success: true, data, message?, pagination?}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip)]
    status: StatusCode,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            pagination: None,
            status: StatusCode::OK,
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(data)
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> ApiResponse<Vec<T>> {
    pub fn paged(page: Page<T>) -> Self {
        Self {
            pagination: Some(page.pagination),
            ..Self::ok(page.data)
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
