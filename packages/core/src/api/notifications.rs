//! Reminder inbox.
//!
//! Routes:
//! - `GET   /users/:user_id/notifications?unread=true`               — user inbox, newest first
//! - `GET   /users/:user_id/vehicles/:vehicle_id/notifications`      — reminders for one vehicle
//! - `PATCH /users/:user_id/notifications/:notification_id/read`     — mark one as read

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use super::{error_response, storage_failure, ApiError, ApiState};
use crate::storage::Notification;

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    pub unread: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct InboxResponse {
    pub total: usize,
    pub unread: usize,
    pub items: Vec<Notification>,
}

/// `GET /users/:user_id/notifications`
pub async fn list_user_notifications(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
    Query(query): Query<InboxQuery>,
) -> Result<Json<InboxResponse>, ApiError> {
    let items = state
        .storage
        .get_notifications_by_user(user_id, query.unread.unwrap_or(false))
        .await
        .map_err(storage_failure)?;

    Ok(Json(InboxResponse {
        total: items.len(),
        unread: items.iter().filter(|n| !n.is_read).count(),
        items,
    }))
}

/// `GET /users/:user_id/vehicles/:vehicle_id/notifications`
pub async fn list_vehicle_notifications(
    State(state): State<ApiState>,
    Path((user_id, vehicle_id)): Path<(i64, i64)>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    let owned = state
        .storage
        .get_vehicle(vehicle_id, user_id)
        .await
        .map_err(storage_failure)?;
    if owned.is_none() {
        return Err(error_response(StatusCode::NOT_FOUND, "Vehicle not found"));
    }

    let items = state
        .storage
        .get_notifications_by_vehicle(vehicle_id)
        .await
        .map_err(storage_failure)?;
    Ok(Json(items))
}

/// `PATCH /users/:user_id/notifications/:notification_id/read`
pub async fn mark_read(
    State(state): State<ApiState>,
    Path((user_id, notification_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    let updated = state
        .storage
        .mark_notification_read(notification_id, user_id)
        .await
        .map_err(storage_failure)?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(error_response(
            StatusCode::NOT_FOUND,
            "Notification not found",
        ))
    }
}
