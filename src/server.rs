/// HTTP server setup and routing
use crate::{
    api::middleware::authenticate,
    context::AppContext,
    error::{RegistryError, RegistryResult},
    metrics::{metrics_handler, track_http_metrics},
    rate_limit::rate_limit_middleware,
};
use axum::{
    http::{header, Method, Uri},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

/// Build the main application router
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    // Layers run bottom-up: authenticate must see the request before the
    // rate limiter so the caller tier is known.
    Router::new()
        .merge(crate::api::routes())
        .route("/metrics", get(metrics_handler))
        .fallback(not_found)
        .with_state(ctx.clone())
        .layer(middleware::from_fn_with_state(ctx.clone(), rate_limit_middleware))
        .layer(middleware::from_fn_with_state(ctx, authenticate))
        .layer(middleware::from_fn(track_http_metrics))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn not_found(uri: Uri) -> RegistryError {
    RegistryError::NotFound(format!("No route for {}", uri.path()))
}

/// Start the HTTP server
pub async fn serve(ctx: AppContext) -> RegistryResult<()> {
    let addr = format!("{}:{}", ctx.config.service.hostname, ctx.config.service.port);

    info!("Sabil registry listening on {}", addr);
    info!("   Service URL: {}", ctx.service_url());
    info!("   Auth mode: {}", ctx.config.authentication.mode.as_str());

    let app = build_router(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RegistryError::Internal(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| RegistryError::Internal(format!("Server error: {}", e)))?;

    Ok(())
}
