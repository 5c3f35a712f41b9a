//! Persistence abstraction shared by the expiry service and the HTTP layer.
//!
//! [`Storage`] is implemented by [`SqliteRepository`](crate::repository::SqliteRepository)
//! for production and by [`MemoryStore`](crate::store::MemoryStore) for
//! tests and throwaway runs. Both enforce the same notification uniqueness
//! rule: one row per `(vehicle_id, notification_type, dedup_key)`.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::expiry::DocumentType;

/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Corrupt {table} row: {message}")]
    CorruptRow { table: &'static str, message: String },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl StorageError {
    pub fn corrupt_row(table: &'static str, message: impl Into<String>) -> Self {
        Self::CorruptRow {
            table,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A registered vehicle. Insurance, emission and RC expiries live directly
/// on the row; other document kinds go through [`DocumentExpiry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: i64,
    pub user_id: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub plate: String,
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,
    pub insurance_expiry: Option<NaiveDate>,
    pub emission_expiry: Option<NaiveDate>,
    pub rc_expiry: Option<NaiveDate>,
    pub created_at: String,
}

impl Vehicle {
    /// Expiry date stored on the vehicle row for `doc_type`, if the type
    /// has a backing column and the column is set.
    pub fn expiry_for(&self, doc_type: DocumentType) -> Option<NaiveDate> {
        match doc_type {
            DocumentType::Emission => self.emission_expiry,
            DocumentType::RcBook => self.rc_expiry,
            DocumentType::Insurance => self.insurance_expiry,
            DocumentType::RoadTax
            | DocumentType::FitnessCertificate
            | DocumentType::TravelPermits => None,
        }
    }

    /// Short human label used in reminder text, e.g. `Honda City (KA01AB1234)`.
    pub fn label(&self) -> String {
        format!("{} {} ({})", self.make, self.model, self.plate)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewVehicle {
    pub user_id: i64,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub plate: String,
    pub owner_name: Option<String>,
    pub owner_phone: Option<String>,
    pub insurance_expiry: Option<NaiveDate>,
    pub emission_expiry: Option<NaiveDate>,
    pub rc_expiry: Option<NaiveDate>,
}

/// Partial update of the expiry columns. `None` leaves a column untouched.
#[derive(Debug, Clone, Default)]
pub struct VehicleExpiries {
    pub insurance_expiry: Option<NaiveDate>,
    pub emission_expiry: Option<NaiveDate>,
    pub rc_expiry: Option<NaiveDate>,
}

/// Tracking record for an uploaded document that has no vehicle column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentExpiry {
    pub id: i64,
    pub vehicle_id: i64,
    pub user_id: i64,
    pub document_type: String,
    pub expiry_date: NaiveDate,
    pub amount: Option<f64>,
    pub issue_date: Option<NaiveDate>,
    pub reminder_sent: bool,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewDocumentExpiry {
    pub vehicle_id: i64,
    pub user_id: i64,
    pub document_type: DocumentType,
    pub expiry_date: NaiveDate,
    pub amount: Option<f64>,
    pub issue_date: Option<NaiveDate>,
}

/// User-facing alert row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub vehicle_id: i64,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub due_date: Option<NaiveDate>,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub vehicle_id: i64,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub due_date: Option<NaiveDate>,
    /// Uniqueness key within `(vehicle_id, notification_type)`.
    pub dedup_key: String,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_vehicle(&self, vehicle: NewVehicle) -> StorageResult<Vehicle>;

    async fn get_vehicles(&self, user_id: i64) -> StorageResult<Vec<Vehicle>>;

    async fn get_vehicle(&self, id: i64, user_id: i64) -> StorageResult<Option<Vehicle>>;

    /// Returns the updated vehicle, or `None` if it does not belong to `user_id`.
    async fn update_vehicle_expiries(
        &self,
        id: i64,
        user_id: i64,
        expiries: VehicleExpiries,
    ) -> StorageResult<Option<Vehicle>>;

    async fn get_notifications_by_vehicle(&self, vehicle_id: i64)
        -> StorageResult<Vec<Notification>>;

    /// Newest first, across every vehicle owned by `user_id`.
    async fn get_notifications_by_user(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> StorageResult<Vec<Notification>>;

    /// Insert unless the `(vehicle_id, notification_type, dedup_key)` key is
    /// already taken, in which case `Ok(None)` is returned.
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> StorageResult<Option<Notification>>;

    /// Returns `false` when no notification with `id` belongs to `user_id`.
    async fn mark_notification_read(&self, id: i64, user_id: i64) -> StorageResult<bool>;

    /// Persist a document record, deactivating any earlier active record of
    /// the same type for the vehicle.
    async fn create_document_expiry(
        &self,
        document: NewDocumentExpiry,
    ) -> StorageResult<DocumentExpiry>;

    async fn get_document_expiries(
        &self,
        vehicle_id: i64,
        active_only: bool,
    ) -> StorageResult<Vec<DocumentExpiry>>;

    async fn mark_reminder_sent(&self, document_id: i64) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle() -> Vehicle {
        Vehicle {
            id: 1,
            user_id: 9,
            make: "Maruti".into(),
            model: "Swift".into(),
            year: 2019,
            plate: "MH12AB1234".into(),
            owner_name: None,
            owner_phone: None,
            insurance_expiry: NaiveDate::from_ymd_opt(2026, 1, 1),
            emission_expiry: NaiveDate::from_ymd_opt(2026, 2, 1),
            rc_expiry: None,
            created_at: "2025-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn expiry_for_reads_backing_columns() {
        let v = vehicle();
        assert_eq!(v.expiry_for(DocumentType::Emission), v.emission_expiry);
        assert_eq!(v.expiry_for(DocumentType::Insurance), v.insurance_expiry);
        assert_eq!(v.expiry_for(DocumentType::RcBook), None);
        assert_eq!(v.expiry_for(DocumentType::RoadTax), None);
    }

    #[test]
    fn label_combines_make_model_and_plate() {
        assert_eq!(vehicle().label(), "Maruti Swift (MH12AB1234)");
    }

    #[test]
    fn notification_serializes_type_field() {
        let n = Notification {
            id: 1,
            vehicle_id: 2,
            notification_type: "emission".into(),
            title: "t".into(),
            message: "m".into(),
            due_date: NaiveDate::from_ymd_opt(2026, 5, 4),
            is_read: false,
            created_at: "now".into(),
        };
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "emission");
        assert_eq!(json["due_date"], "2026-05-04");
    }
}
