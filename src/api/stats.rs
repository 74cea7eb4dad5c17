/// Dashboard statistics endpoint
use crate::{
    api::ApiResponse,
    auth::AdminCaller,
    context::AppContext,
    error::RegistryResult,
    registry::RegistryStatistics,
};
use axum::{extract::State, routing::get, Router};

pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/dashboard/stats", get(get_stats))
}

async fn get_stats(
    State(ctx): State<AppContext>,
    AdminCaller(caller): AdminCaller,
) -> RegistryResult<ApiResponse<RegistryStatistics>> {
    let stats = ctx.statistics.statistics_for(Some(&caller)).await?;
    Ok(ApiResponse::ok(stats))
}
