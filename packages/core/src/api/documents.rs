//! Document-upload hook and document history.
//!
//! Routes:
//! - `POST /users/:user_id/vehicles/:vehicle_id/documents`              — record an uploaded document
//! - `GET  /users/:user_id/vehicles/:vehicle_id/documents?active=true`  — list recorded documents

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{error_response, parse_date_field, reject, storage_failure, ApiError, ApiState};
use crate::expiry::{DocumentType, DocumentUpload, UploadOutcome};
use crate::storage::DocumentExpiry;

#[derive(Debug, Deserialize)]
pub struct UploadDocumentRequest {
    pub document_type: String,
    pub expiry_date: Option<String>,
    pub issue_date: Option<String>,
    pub amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentsQuery {
    pub active: Option<bool>,
}

/// `POST /users/:user_id/vehicles/:vehicle_id/documents`
///
/// Answers `202 Accepted` with the outcome; an untracked document type is
/// accepted and reported as `ignored`.
pub async fn upload_document(
    State(state): State<ApiState>,
    Path((user_id, vehicle_id)): Path<(i64, i64)>,
    Json(body): Json<UploadDocumentRequest>,
) -> Result<(StatusCode, Json<UploadOutcome>), ApiError> {
    // Dates on untracked document kinds are never read, so they are not validated.
    let (expiry_date, issue_date) = if DocumentType::parse(&body.document_type).is_some() {
        (
            parse_date_field("expiry_date", body.expiry_date.as_deref()).map_err(reject)?,
            parse_date_field("issue_date", body.issue_date.as_deref()).map_err(reject)?,
        )
    } else {
        (None, None)
    };

    let upload = DocumentUpload {
        vehicle_id,
        user_id,
        document_type: body.document_type,
        expiry_date,
        amount: body.amount,
        issue_date,
    };

    match state.expiry.process_document_upload(upload).await {
        UploadOutcome::VehicleNotFound => {
            Err(error_response(StatusCode::NOT_FOUND, "Vehicle not found"))
        }
        UploadOutcome::Failed => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Could not record document",
        )),
        outcome => Ok((StatusCode::ACCEPTED, Json(outcome))),
    }
}

/// `GET /users/:user_id/vehicles/:vehicle_id/documents`
pub async fn list_documents(
    State(state): State<ApiState>,
    Path((user_id, vehicle_id)): Path<(i64, i64)>,
    Query(query): Query<DocumentsQuery>,
) -> Result<Json<Vec<DocumentExpiry>>, ApiError> {
    let owned = state
        .storage
        .get_vehicle(vehicle_id, user_id)
        .await
        .map_err(storage_failure)?;
    if owned.is_none() {
        return Err(error_response(StatusCode::NOT_FOUND, "Vehicle not found"));
    }

    let documents = state
        .storage
        .get_document_expiries(vehicle_id, query.active.unwrap_or(false))
        .await
        .map_err(storage_failure)?;
    Ok(Json(documents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request},
    };
    use tower::ServiceExt;

    use crate::api::create_router;
    use crate::api::test_support::{body_json, make_state};
    use crate::storage::{NewVehicle, Storage};
    use crate::store::MemoryStore;

    async fn seed_vehicle(store: &MemoryStore, user_id: i64) -> i64 {
        store
            .create_vehicle(NewVehicle {
                user_id,
                make: "Maruti".into(),
                model: "Swift".into(),
                year: 2019,
                plate: "MH12AB1234".into(),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    fn upload(user_id: i64, vehicle_id: i64, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/users/{}/vehicles/{}/documents", user_id, vehicle_id))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn upload_near_expiry_tracks_and_notifies() {
        let (state, store) = make_state();
        let vehicle_id = seed_vehicle(&store, 1).await;
        let app = create_router(state);

        let resp = app
            .oneshot(upload(
                1,
                vehicle_id,
                r#"{"document_type":"insurance","expiry_date":"2026-10-27","amount":8500.0}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["status"], "tracked");
        assert_eq!(json["document"]["document_type"], "insurance");
        assert_eq!(json["document"]["reminder_sent"], true);
        assert_eq!(json["notification"]["title"], "Insurance Expiring Soon");

        let stored = store.get_notifications_by_vehicle(vehicle_id).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn repeated_upload_does_not_duplicate_the_reminder() {
        let (state, store) = make_state();
        let vehicle_id = seed_vehicle(&store, 1).await;
        let app = create_router(state);
        let body = r#"{"document_type":"rc_book","expiry_date":"2030-01-01"}"#;

        let first = app
            .clone()
            .oneshot(upload(1, vehicle_id, body))
            .await
            .unwrap();
        let first = body_json(first.into_body()).await;
        assert_eq!(first["notification"]["title"], "RC Book Expiring Soon");

        let second = app.oneshot(upload(1, vehicle_id, body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::ACCEPTED);
        let second = body_json(second.into_body()).await;
        assert_eq!(second["status"], "tracked");
        assert!(second["notification"].is_null());
        assert_eq!(second["document"]["reminder_sent"], false);

        let stored = store.get_notifications_by_vehicle(vehicle_id).await.unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn upload_of_untracked_type_is_ignored() {
        let (state, store) = make_state();
        let vehicle_id = seed_vehicle(&store, 1).await;
        let app = create_router(state);

        let resp = app
            .oneshot(upload(
                1,
                vehicle_id,
                r#"{"document_type":"service_record","expiry_date":"2026-10-20"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["status"], "ignored");
        assert!(store
            .get_document_expiries(vehicle_id, false)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn untracked_type_with_malformed_date_is_still_ignored() {
        let (state, store) = make_state();
        let vehicle_id = seed_vehicle(&store, 1).await;
        let app = create_router(state);

        let resp = app
            .oneshot(upload(
                1,
                vehicle_id,
                r#"{"document_type":"fuel","expiry_date":"n/a"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["status"], "ignored");
        assert!(store
            .get_document_expiries(vehicle_id, false)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn upload_for_foreign_vehicle_returns_404() {
        let (state, store) = make_state();
        let vehicle_id = seed_vehicle(&store, 1).await;
        let app = create_router(state);

        let resp = app
            .oneshot(upload(
                2,
                vehicle_id,
                r#"{"document_type":"emission","expiry_date":"2026-10-20"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upload_with_malformed_date_returns_400() {
        let (state, store) = make_state();
        let vehicle_id = seed_vehicle(&store, 1).await;
        let app = create_router(state);

        let resp = app
            .oneshot(upload(
                1,
                vehicle_id,
                r#"{"document_type":"emission","expiry_date":"20/10/2026"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_filters_inactive_documents_when_asked() {
        let (state, store) = make_state();
        let vehicle_id = seed_vehicle(&store, 1).await;
        let app = create_router(state);

        for date in ["2027-01-01", "2028-01-01"] {
            let body = format!(r#"{{"document_type":"emission","expiry_date":"{}"}}"#, date);
            let resp = app
                .clone()
                .oneshot(upload(1, vehicle_id, &body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::ACCEPTED);
        }

        let all = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/users/1/vehicles/{}/documents", vehicle_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let all = body_json(all.into_body()).await;
        assert_eq!(all.as_array().unwrap().len(), 2);

        let active = app
            .oneshot(
                Request::builder()
                    .uri(format!("/users/1/vehicles/{}/documents?active=true", vehicle_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let active = body_json(active.into_body()).await;
        let active = active.as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["expiry_date"], "2028-01-01");
    }
}
