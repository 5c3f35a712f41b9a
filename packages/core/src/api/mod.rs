//! HTTP surface.
//!
//! Every route is scoped under `/users/:user_id`; identifying the caller is
//! left to whatever sits in front of this service. Errors are returned as
//! `{"error": "..."}` with an appropriate status code.

pub mod documents;
pub mod expiry;
pub mod health;
pub mod notifications;
pub mod vehicles;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde_json::Value;
use tower_http::cors::CorsLayer;

use crate::error::AppError;
use crate::expiry::ExpiryService;
use crate::metrics::AppMetrics;
use crate::storage::{Storage, StorageError};

/// Shared state for every route.
#[derive(Clone)]
pub struct ApiState {
    pub storage: Arc<dyn Storage>,
    pub expiry: Arc<ExpiryService>,
    pub metrics: Arc<AppMetrics>,
}

/// Error half of every handler's return type.
pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

pub(crate) fn storage_failure(err: StorageError) -> ApiError {
    tracing::error!("Storage failure while serving request: {}", err);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub(crate) fn reject(err: AppError) -> ApiError {
    match err {
        AppError::InvalidInput(msg) => error_response(StatusCode::BAD_REQUEST, msg),
        AppError::Storage(err) => storage_failure(err),
        other => error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

/// Parse an optional `YYYY-MM-DD` request field.
pub(crate) fn parse_date_field(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AppError::InvalidInput(format!(
                    "Invalid {} '{}'. Expected YYYY-MM-DD",
                    field, value
                ))
            }),
    }
}

/// Assemble the full application router.
pub fn create_router(state: ApiState) -> Router {
    let metrics = state.metrics.clone();

    Router::new()
        .route("/health", get(health::health))
        .route("/metrics", get(render_metrics))
        .route(
            "/users/:user_id/vehicles",
            post(vehicles::create_vehicle).get(vehicles::list_vehicles),
        )
        .route(
            "/users/:user_id/vehicles/:vehicle_id",
            get(vehicles::get_vehicle),
        )
        .route(
            "/users/:user_id/vehicles/:vehicle_id/expiries",
            patch(vehicles::update_expiries),
        )
        .route(
            "/users/:user_id/vehicles/:vehicle_id/documents",
            post(documents::upload_document).get(documents::list_documents),
        )
        .route(
            "/users/:user_id/vehicles/:vehicle_id/notifications",
            get(notifications::list_vehicle_notifications),
        )
        .route(
            "/users/:user_id/notifications",
            get(notifications::list_user_notifications),
        )
        .route(
            "/users/:user_id/notifications/:notification_id/read",
            patch(notifications::mark_read),
        )
        .route(
            "/users/:user_id/expiry-check",
            post(expiry::run_expiry_check),
        )
        .route_layer(middleware::from_fn_with_state(metrics, track_http_metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn render_metrics(State(state): State<ApiState>) -> Response {
    match state.metrics.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .expect("metrics response should be valid"),
        Err(err) => {
            tracing::error!("Failed to render metrics: {}", err);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("metrics error"))
                .expect("metrics error response should be valid")
        }
    }
}

/// Count and time every routed request, labelled by the route template so
/// ids in the path do not explode label cardinality.
async fn track_http_metrics(
    State(metrics): State<Arc<AppMetrics>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let started = Instant::now();
    let response = next.run(request).await;

    metrics
        .http_request_duration
        .observe(started.elapsed().as_secs_f64());
    metrics
        .http_requests_total
        .with_label_values(&[method.as_str(), path.as_str(), response.status().as_str()])
        .inc();

    response
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::body::Body;
    use chrono::NaiveDate;
    use http_body_util::BodyExt;

    use crate::expiry::FixedClock;
    use crate::store::MemoryStore;

    pub fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    pub fn make_state() -> (ApiState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(AppMetrics::new().unwrap());
        let expiry = ExpiryService::new(store.clone(), Arc::new(FixedClock(today())))
            .with_metrics(metrics.clone());
        let state = ApiState {
            storage: store.clone(),
            expiry: Arc::new(expiry),
            metrics,
        };
        (state, store)
    }

    pub async fn body_json(body: Body) -> Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }
}
