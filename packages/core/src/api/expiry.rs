//! Expiry sweep trigger.
//!
//! Route:
//! - `POST /users/:user_id/expiry-check` — check every vehicle the user owns and write due reminders

use axum::{
    extract::{Path, State},
    Json,
};

use super::ApiState;
use crate::expiry::SweepReport;

/// `POST /users/:user_id/expiry-check`
///
/// Failures on individual documents are logged and counted in the report;
/// the request itself always succeeds.
pub async fn run_expiry_check(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Json<SweepReport> {
    Json(state.expiry.run_expiry_check_process(user_id).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use chrono::{Duration, NaiveDate};
    use tower::ServiceExt;

    use crate::api::create_router;
    use crate::api::test_support::{body_json, make_state, today};
    use crate::storage::{NewVehicle, Storage};

    fn sweep(user_id: i64) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(format!("/users/{}/expiry-check", user_id))
            .body(Body::empty())
            .unwrap()
    }

    fn days_from_today(days: i64) -> Option<NaiveDate> {
        Some(today() + Duration::days(days))
    }

    #[tokio::test]
    async fn sweep_creates_reminders_and_is_idempotent() {
        let (state, store) = make_state();
        let vehicle = store
            .create_vehicle(NewVehicle {
                user_id: 4,
                make: "Hyundai".into(),
                model: "Creta".into(),
                year: 2021,
                plate: "TN09XY4321".into(),
                emission_expiry: days_from_today(5),
                rc_expiry: days_from_today(-3),
                ..Default::default()
            })
            .await
            .unwrap();
        let app = create_router(state);

        let first = app.clone().oneshot(sweep(4)).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let first = body_json(first.into_body()).await;
        assert_eq!(first["vehicles_checked"], 1);
        assert_eq!(first["notifications_created"], 2);
        assert_eq!(first["today"], "2026-10-17");

        let second = app.oneshot(sweep(4)).await.unwrap();
        let second = body_json(second.into_body()).await;
        assert_eq!(second["notifications_created"], 0);
        assert_eq!(second["duplicates_skipped"], 2);

        let stored = store.get_notifications_by_vehicle(vehicle.id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().any(|n| n.title == "URGENT: RC Book Expired!"));
    }

    #[tokio::test]
    async fn sweep_for_user_without_vehicles_is_empty() {
        let (state, _) = make_state();
        let app = create_router(state);

        let resp = app.oneshot(sweep(99)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["vehicles_checked"], 0);
        assert_eq!(json["notifications_created"], 0);
    }
}
