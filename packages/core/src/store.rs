//! In-memory storage backend.
//!
//! `MemoryStore` keeps vehicles, document records and notifications in
//! ordered maps behind a single `tokio::sync::RwLock`. It mirrors the SQLite
//! backend's rules (ownership checks, notification uniqueness, renewal
//! deactivation) so the expiry service behaves identically on either.
//!
//! Every successful mutation bumps [`MemoryStore::write_count`], which tests
//! use to assert that a code path touched nothing.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::storage::{
    DocumentExpiry, NewDocumentExpiry, NewNotification, NewVehicle, Notification, Storage,
    StorageError, StorageResult, Vehicle, VehicleExpiries,
};

#[derive(Debug, Default)]
struct Tables {
    vehicles: BTreeMap<i64, Vehicle>,
    documents: BTreeMap<i64, DocumentExpiry>,
    notifications: BTreeMap<i64, Notification>,
    notification_keys: HashSet<(i64, String, String)>,
    next_vehicle_id: i64,
    next_document_id: i64,
    next_notification_id: i64,
}

/// Map-backed [`Storage`] implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful mutations since construction.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

#[async_trait]
impl Storage for MemoryStore {
    async fn create_vehicle(&self, vehicle: NewVehicle) -> StorageResult<Vehicle> {
        let mut tables = self.tables.write().await;
        tables.next_vehicle_id += 1;
        let created = Vehicle {
            id: tables.next_vehicle_id,
            user_id: vehicle.user_id,
            make: vehicle.make,
            model: vehicle.model,
            year: vehicle.year,
            plate: vehicle.plate,
            owner_name: vehicle.owner_name,
            owner_phone: vehicle.owner_phone,
            insurance_expiry: vehicle.insurance_expiry,
            emission_expiry: vehicle.emission_expiry,
            rc_expiry: vehicle.rc_expiry,
            created_at: now_rfc3339(),
        };
        tables.vehicles.insert(created.id, created.clone());
        self.record_write();
        Ok(created)
    }

    async fn get_vehicles(&self, user_id: i64) -> StorageResult<Vec<Vehicle>> {
        let tables = self.tables.read().await;
        Ok(tables
            .vehicles
            .values()
            .filter(|v| v.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_vehicle(&self, id: i64, user_id: i64) -> StorageResult<Option<Vehicle>> {
        let tables = self.tables.read().await;
        Ok(tables
            .vehicles
            .get(&id)
            .filter(|v| v.user_id == user_id)
            .cloned())
    }

    async fn update_vehicle_expiries(
        &self,
        id: i64,
        user_id: i64,
        expiries: VehicleExpiries,
    ) -> StorageResult<Option<Vehicle>> {
        let mut tables = self.tables.write().await;
        let Some(vehicle) = tables
            .vehicles
            .get_mut(&id)
            .filter(|v| v.user_id == user_id)
        else {
            return Ok(None);
        };

        if let Some(date) = expiries.insurance_expiry {
            vehicle.insurance_expiry = Some(date);
        }
        if let Some(date) = expiries.emission_expiry {
            vehicle.emission_expiry = Some(date);
        }
        if let Some(date) = expiries.rc_expiry {
            vehicle.rc_expiry = Some(date);
        }
        let updated = vehicle.clone();
        self.record_write();
        Ok(Some(updated))
    }

    async fn get_notifications_by_vehicle(
        &self,
        vehicle_id: i64,
    ) -> StorageResult<Vec<Notification>> {
        let tables = self.tables.read().await;
        Ok(tables
            .notifications
            .values()
            .filter(|n| n.vehicle_id == vehicle_id)
            .cloned()
            .collect())
    }

    async fn get_notifications_by_user(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> StorageResult<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut found: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| {
                tables
                    .vehicles
                    .get(&n.vehicle_id)
                    .map(|v| v.user_id == user_id)
                    .unwrap_or(false)
            })
            .filter(|n| !unread_only || !n.is_read)
            .cloned()
            .collect();
        found.reverse();
        Ok(found)
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> StorageResult<Option<Notification>> {
        let mut tables = self.tables.write().await;
        if !tables.vehicles.contains_key(&notification.vehicle_id) {
            return Err(StorageError::not_found(format!(
                "vehicle {}",
                notification.vehicle_id
            )));
        }

        let key = (
            notification.vehicle_id,
            notification.notification_type.clone(),
            notification.dedup_key.clone(),
        );
        if !tables.notification_keys.insert(key) {
            return Ok(None);
        }

        tables.next_notification_id += 1;
        let created = Notification {
            id: tables.next_notification_id,
            vehicle_id: notification.vehicle_id,
            notification_type: notification.notification_type,
            title: notification.title,
            message: notification.message,
            due_date: notification.due_date,
            is_read: false,
            created_at: now_rfc3339(),
        };
        tables.notifications.insert(created.id, created.clone());
        self.record_write();
        Ok(Some(created))
    }

    async fn mark_notification_read(&self, id: i64, user_id: i64) -> StorageResult<bool> {
        let mut tables = self.tables.write().await;
        let owned = tables
            .notifications
            .get(&id)
            .and_then(|n| tables.vehicles.get(&n.vehicle_id))
            .map(|v| v.user_id == user_id)
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }

        if let Some(notification) = tables.notifications.get_mut(&id) {
            notification.is_read = true;
        }
        self.record_write();
        Ok(true)
    }

    async fn create_document_expiry(
        &self,
        document: NewDocumentExpiry,
    ) -> StorageResult<DocumentExpiry> {
        let mut tables = self.tables.write().await;
        if !tables.vehicles.contains_key(&document.vehicle_id) {
            return Err(StorageError::not_found(format!(
                "vehicle {}",
                document.vehicle_id
            )));
        }

        let doc_type = document.document_type.as_str();
        for existing in tables.documents.values_mut() {
            if existing.vehicle_id == document.vehicle_id
                && existing.document_type == doc_type
                && existing.is_active
            {
                existing.is_active = false;
            }
        }

        tables.next_document_id += 1;
        let created = DocumentExpiry {
            id: tables.next_document_id,
            vehicle_id: document.vehicle_id,
            user_id: document.user_id,
            document_type: doc_type.to_string(),
            expiry_date: document.expiry_date,
            amount: document.amount,
            issue_date: document.issue_date,
            reminder_sent: false,
            is_active: true,
            created_at: now_rfc3339(),
        };
        tables.documents.insert(created.id, created.clone());
        self.record_write();
        Ok(created)
    }

    async fn get_document_expiries(
        &self,
        vehicle_id: i64,
        active_only: bool,
    ) -> StorageResult<Vec<DocumentExpiry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .documents
            .values()
            .filter(|d| d.vehicle_id == vehicle_id)
            .filter(|d| !active_only || d.is_active)
            .cloned()
            .collect())
    }

    async fn mark_reminder_sent(&self, document_id: i64) -> StorageResult<()> {
        let mut tables = self.tables.write().await;
        let document = tables
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| StorageError::not_found(format!("document {}", document_id)))?;
        document.reminder_sent = true;
        self.record_write();
        Ok(())
    }
}
