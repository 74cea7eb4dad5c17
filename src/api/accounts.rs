/// Account management endpoints (admin only)
use crate::{
    account::{CreateAccountRequest, SetActiveRequest},
    api::{ApiJson, ApiResponse},
    auth::{AdminCaller, CallerContext},
    context::AppContext,
    db::account::AccountView,
    error::RegistryResult,
};
use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Router,
};

/// Build account routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/accounts", get(list_accounts).post(create_account))
        .route("/api/accounts/:id", patch(set_active).delete(delete_account))
}

async fn list_accounts(
    State(ctx): State<AppContext>,
    AdminCaller(caller): AdminCaller,
) -> RegistryResult<ApiResponse<Vec<AccountView>>> {
    let accounts = ctx.account_manager.list_accounts(Some(&caller)).await?;
    Ok(ApiResponse::ok(accounts))
}

async fn create_account(
    State(ctx): State<AppContext>,
    CallerContext(caller): CallerContext,
    ApiJson(req): ApiJson<CreateAccountRequest>,
) -> RegistryResult<ApiResponse<AccountView>> {
    let account = ctx.account_manager.create_account(Some(&caller), req).await?;
    Ok(ApiResponse::created(account).with_message("Account created successfully"))
}

/// Enable or disable an account
async fn set_active(
    State(ctx): State<AppContext>,
    CallerContext(caller): CallerContext,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SetActiveRequest>,
) -> RegistryResult<ApiResponse<AccountView>> {
    let account = ctx
        .account_manager
        .set_active(Some(&caller), &id, req.is_active)
        .await?;
    let message = if req.is_active {
        "Account enabled successfully"
    } else {
        "Account disabled successfully"
    };
    Ok(ApiResponse::ok(account).with_message(message))
}

async fn delete_account(
    State(ctx): State<AppContext>,
    CallerContext(caller): CallerContext,
    Path(id): Path<String>,
) -> RegistryResult<ApiResponse<serde_json::Value>> {
    ctx.account_manager.delete_account(Some(&caller), &id).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "id": id })).with_message("Account deleted successfully"))
}
