/// Geo-tag catalog endpoints
use crate::{
    api::{ApiJson, ApiResponse},
    auth::OptionalCaller,
    context::AppContext,
    error::RegistryResult,
    geotag::{GeoTag, GeoTagChanges, GeoTagQuery, NewGeoTag},
};
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Router,
};

/// Build geo-tag routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/geotags", get(list_geotags).post(create_geotag))
        .route("/api/geotags/categories", get(categories))
        .route(
            "/api/geotags/:id",
            get(get_geotag).put(update_geotag).delete(delete_geotag),
        )
}

async fn list_geotags(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    Query(query): Query<GeoTagQuery>,
) -> RegistryResult<ApiResponse<Vec<GeoTag>>> {
    let page = ctx.geotags.list(caller.as_ref(), &query).await?;
    Ok(ApiResponse::paged(page))
}

async fn get_geotag(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    Path(id): Path<String>,
) -> RegistryResult<ApiResponse<GeoTag>> {
    Ok(ApiResponse::ok(ctx.geotags.get(caller.as_ref(), &id).await?))
}

async fn create_geotag(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    ApiJson(req): ApiJson<NewGeoTag>,
) -> RegistryResult<ApiResponse<GeoTag>> {
    let tag = ctx.geotags.create(caller.as_ref(), req).await?;
    Ok(ApiResponse::created(tag))
}

async fn update_geotag(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    Path(id): Path<String>,
    ApiJson(changes): ApiJson<GeoTagChanges>,
) -> RegistryResult<ApiResponse<GeoTag>> {
    let tag = ctx.geotags.update(caller.as_ref(), &id, changes).await?;
    Ok(ApiResponse::ok(tag))
}

async fn delete_geotag(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
    Path(id): Path<String>,
) -> RegistryResult<ApiResponse<serde_json::Value>> {
    ctx.geotags.delete(caller.as_ref(), &id).await?;
    Ok(ApiResponse::ok(serde_json::json!({ "id": id })).with_message("Geo tag deleted successfully"))
}

async fn categories(
    State(ctx): State<AppContext>,
    caller: OptionalCaller,
) -> RegistryResult<ApiResponse<Vec<String>>> {
    Ok(ApiResponse::ok(ctx.geotags.categories(caller.as_ref()).await?))
}
