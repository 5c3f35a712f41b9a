//! Vehicle registration and expiry-date maintenance.
//!
//! Routes:
//! - `POST  /users/:user_id/vehicles`                       — register a vehicle
//! - `GET   /users/:user_id/vehicles`                       — list the user's vehicles
//! - `GET   /users/:user_id/vehicles/:vehicle_id`           — fetch one vehicle
//! - `PATCH /users/:user_id/vehicles/:vehicle_id/expiries`  — set insurance / emission / RC dates

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::{error_response, parse_date_field, reject, storage_failure, ApiError, ApiState};
use crate::error::AppError;
use crate::storage::{NewVehicle, Vehicle, VehicleExpiries};

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;

#[derive(Debug, Deserialize)]
pub struct CreateVehicleRequest {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub plate: String,
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,
    pub insurance_expiry: Option<String>,
    pub emission_expiry: Option<String>,
    pub rc_expiry: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateExpiriesRequest {
    pub insurance_expiry: Option<String>,
    pub emission_expiry: Option<String>,
    pub rc_expiry: Option<String>,
}

fn required(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

impl CreateVehicleRequest {
    fn into_new_vehicle(self, user_id: i64) -> Result<NewVehicle, AppError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(AppError::InvalidInput(format!(
                "year must be between {} and {}",
                MIN_YEAR, MAX_YEAR
            )));
        }

        Ok(NewVehicle {
            user_id,
            make: required("make", &self.make)?,
            model: required("model", &self.model)?,
            year: self.year,
            plate: required("plate", &self.plate)?.to_uppercase(),
            owner_name: self.owner_name,
            owner_phone: self.owner_phone,
            insurance_expiry: parse_date_field("insurance_expiry", self.insurance_expiry.as_deref())?,
            emission_expiry: parse_date_field("emission_expiry", self.emission_expiry.as_deref())?,
            rc_expiry: parse_date_field("rc_expiry", self.rc_expiry.as_deref())?,
        })
    }
}

fn vehicle_not_found() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "Vehicle not found")
}

/// `POST /users/:user_id/vehicles`
pub async fn create_vehicle(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    Json(body): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<Vehicle>), ApiError> {
    let new_vehicle = body.into_new_vehicle(user_id).map_err(reject)?;
    let vehicle = state
        .storage
        .create_vehicle(new_vehicle)
        .await
        .map_err(storage_failure)?;

    tracing::info!("User {} registered vehicle {}", user_id, vehicle.id);
    Ok((StatusCode::CREATED, Json(vehicle)))
}

/// `GET /users/:user_id/vehicles`
pub async fn list_vehicles(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Vehicle>>, ApiError> {
    let vehicles = state
        .storage
        .get_vehicles(user_id)
        .await
        .map_err(storage_failure)?;
    Ok(Json(vehicles))
}

/// `GET /users/:user_id/vehicles/:vehicle_id`
pub async fn get_vehicle(
    State(state): State<ApiState>,
    Path((user_id, vehicle_id)): Path<(i64, i64)>,
) -> Result<Json<Vehicle>, ApiError> {
    state
        .storage
        .get_vehicle(vehicle_id, user_id)
        .await
        .map_err(storage_failure)?
        .map(Json)
        .ok_or_else(vehicle_not_found)
}

/// `PATCH /users/:user_id/vehicles/:vehicle_id/expiries`
///
/// Omitted fields are left as they are.
pub async fn update_expiries(
    State(state): State<ApiState>,
    Path((user_id, vehicle_id)): Path<(i64, i64)>,
    Json(body): Json<UpdateExpiriesRequest>,
) -> Result<Json<Vehicle>, ApiError> {
    let expiries = VehicleExpiries {
        insurance_expiry: parse_date_field("insurance_expiry", body.insurance_expiry.as_deref())
            .map_err(reject)?,
        emission_expiry: parse_date_field("emission_expiry", body.emission_expiry.as_deref())
            .map_err(reject)?,
        rc_expiry: parse_date_field("rc_expiry", body.rc_expiry.as_deref()).map_err(reject)?,
    };

    state
        .storage
        .update_vehicle_expiries(vehicle_id, user_id, expiries)
        .await
        .map_err(storage_failure)?
        .map(Json)
        .ok_or_else(vehicle_not_found)
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

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn post_creates_vehicle_with_parsed_dates() {
        let (state, _) = make_state();
        let app = create_router(state);

        let resp = app
            .oneshot(post_json(
                "/users/7/vehicles",
                r#"{"make":"Honda","model":"City","year":2020,"plate":"ka01ab1234","emission_expiry":"2026-11-30"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CREATED);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["user_id"], 7);
        assert_eq!(json["plate"], "KA01AB1234");
        assert_eq!(json["emission_expiry"], "2026-11-30");
        assert!(json["rc_expiry"].is_null());
    }

    #[tokio::test]
    async fn post_with_malformed_date_returns_400() {
        let (state, _) = make_state();
        let app = create_router(state);

        let resp = app
            .oneshot(post_json(
                "/users/7/vehicles",
                r#"{"make":"Honda","model":"City","year":2020,"plate":"X","rc_expiry":"next year"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp.into_body()).await;
        assert!(json["error"].as_str().unwrap().contains("rc_expiry"));
    }

    #[tokio::test]
    async fn post_with_blank_make_or_bad_year_returns_400() {
        let (state, _) = make_state();
        let app = create_router(state);

        let blank = app
            .clone()
            .oneshot(post_json(
                "/users/7/vehicles",
                r#"{"make":" ","model":"City","year":2020,"plate":"X"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);

        let ancient = app
            .oneshot(post_json(
                "/users/7/vehicles",
                r#"{"make":"Ford","model":"T","year":1850,"plate":"X"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(ancient.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_returns_404_for_other_users_vehicle() {
        let (state, store) = make_state();
        let v = store
            .create_vehicle(NewVehicle {
                user_id: 1,
                make: "Kia".into(),
                model: "Seltos".into(),
                year: 2022,
                plate: "P".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let app = create_router(state);

        let own = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/users/1/vehicles/{}", v.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(own.status(), StatusCode::OK);

        let foreign = app
            .oneshot(
                Request::builder()
                    .uri(format!("/users/2/vehicles/{}", v.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_returns_only_the_users_vehicles() {
        let (state, store) = make_state();
        for user_id in [1, 1, 2] {
            store
                .create_vehicle(NewVehicle {
                    user_id,
                    make: "Kia".into(),
                    model: "Sonet".into(),
                    year: 2021,
                    plate: "P".into(),
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let app = create_router(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/users/1/vehicles")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn patch_sets_only_supplied_expiries() {
        let (state, store) = make_state();
        let v = store
            .create_vehicle(NewVehicle {
                user_id: 1,
                make: "Kia".into(),
                model: "Seltos".into(),
                year: 2022,
                plate: "P".into(),
                insurance_expiry: chrono::NaiveDate::from_ymd_opt(2027, 1, 1),
                ..Default::default()
            })
            .await
            .unwrap();
        let app = create_router(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri(format!("/users/1/vehicles/{}/expiries", v.id))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"rc_expiry":"2030-06-15"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp.into_body()).await;
        assert_eq!(json["rc_expiry"], "2030-06-15");
        assert_eq!(json["insurance_expiry"], "2027-01-01");
    }

    #[tokio::test]
    async fn patch_unknown_vehicle_returns_404() {
        let (state, _) = make_state();
        let app = create_router(state);

        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri("/users/1/vehicles/999/expiries")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"rc_expiry":"2030-06-15"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
