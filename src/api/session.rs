/// Login, logout and session introspection
use crate::{
    account::{Caller, LoginRequest, LoginResponse},
    api::{ApiJson, ApiResponse},
    auth::CallerContext,
    context::AppContext,
    error::RegistryResult,
};
use axum::{
    extract::State,
    routing::{get, post},
    Router,
};

/// Build session routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/session", get(get_session))
}

async fn login(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> RegistryResult<ApiResponse<LoginResponse>> {
    let (account, session) = ctx.account_manager.login(&req.username, &req.password).await?;

    Ok(ApiResponse::ok(LoginResponse {
        access_token: session.access_token,
        expires_at: session.expires_at,
        account: account.into(),
    }))
}

async fn logout(
    State(ctx): State<AppContext>,
    CallerContext(caller): CallerContext,
) -> RegistryResult<ApiResponse<serde_json::Value>> {
    ctx.account_manager.delete_session(&caller.session_id).await?;
    tracing::info!(username = %caller.username, "Logged out");

    Ok(ApiResponse::ok(serde_json::json!({})).with_message("Logged out"))
}

async fn get_session(CallerContext(caller): CallerContext) -> ApiResponse<Caller> {
    ApiResponse::ok(caller)
}
