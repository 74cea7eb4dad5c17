/// Metrics and telemetry for the Sabil registry
///
/// Prometheus-compatible counters for:
/// - HTTP request counts
/// - Person edits by scope
/// - Household propagation and verification
/// - Denied requests
/// - Household consistency audits

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// Total HTTP requests by method and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "registry_http_requests_total",
        "Total number of HTTP requests",
        &["method", "status"]
    )
    .expect("metric can be registered");

    /// Person edits by scope (single_record or household)
    pub static ref PERSON_EDITS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "registry_person_edits_total",
        "Person edits by resulting scope",
        &["scope"]
    )
    .expect("metric can be registered");

    /// Household propagations that wrote at least one record
    pub static ref HOUSEHOLD_PROPAGATIONS_TOTAL: IntCounter = register_int_counter!(
        "registry_household_propagations_total",
        "Household propagations that wrote records"
    )
    .expect("metric can be registered");

    /// Person rows written by propagation
    pub static ref RECORDS_PROPAGATED_TOTAL: IntCounter = register_int_counter!(
        "registry_records_propagated_total",
        "Person records written by household propagation"
    )
    .expect("metric can be registered");

    /// Dependent writes that failed after the head write
    pub static ref PROPAGATION_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "registry_propagation_failures_total",
        "Household propagations that failed after the head record was written"
    )
    .expect("metric can be registered");

    /// Household verifications by user-role callers
    pub static ref VERIFICATIONS_TOTAL: IntCounter = register_int_counter!(
        "registry_verifications_total",
        "Household address verifications"
    )
    .expect("metric can be registered");

    /// Requests refused by the authorization policy
    pub static ref DENIED_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "registry_denied_requests_total",
        "Requests refused by the authorization policy",
        &["reason"]
    )
    .expect("metric can be registered");

    /// Households found out of sync by the last consistency audit
    pub static ref INCONSISTENT_HOUSEHOLDS: IntGauge = register_int_gauge!(
        "registry_inconsistent_households",
        "Households whose members disagree on shared fields at the last audit"
    )
    .expect("metric can be registered");
}

/// Count every request by method and status
pub async fn track_http_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let response = next.run(request).await;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();

    response
}

/// Render all registered metrics in the text exposition format
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// GET /metrics
pub async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
