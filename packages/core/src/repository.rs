//! SQLite storage backend.
//!
//! All SQL lives here. Dates are stored as `YYYY-MM-DD` text and row
//! timestamps as RFC 3339 strings. Notification uniqueness is enforced by
//! the `idx_notifications_dedup` index, so concurrent sweeps for the same
//! user cannot double-insert a reminder.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::storage::{
    DocumentExpiry, NewDocumentExpiry, NewNotification, NewVehicle, Notification, Storage,
    StorageError, StorageResult, Vehicle, VehicleExpiries,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

const VEHICLE_COLUMNS: &str = "id, user_id, make, model, year, plate, owner_name, owner_phone, \
     insurance_expiry, emission_expiry, rc_expiry, created_at";

const NOTIFICATION_COLUMNS: &str = "n.id, n.vehicle_id, n.notification_type, n.title, n.message, \
     n.due_date, n.is_read, n.created_at";

const DOCUMENT_COLUMNS: &str = "id, vehicle_id, user_id, document_type, expiry_date, amount, \
     issue_date, reminder_sent, is_active, created_at";

/// [`Storage`] over a SQLite pool created by [`crate::db::create_pool`].
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_date(table: &'static str, raw: &str) -> StorageResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|e| StorageError::corrupt_row(table, format!("bad date '{}': {}", raw, e)))
}

fn parse_optional_date(table: &'static str, raw: Option<String>) -> StorageResult<Option<NaiveDate>> {
    raw.map(|r| parse_date(table, &r)).transpose()
}

/// A malformed expiry on a vehicle disables reminders for that document
/// only; the rest of the vehicle stays readable.
fn lenient_vehicle_date(vehicle_id: i64, column: &str, raw: Option<String>) -> Option<NaiveDate> {
    let raw = raw?;
    match NaiveDate::parse_from_str(&raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(err) => {
            tracing::warn!(
                "Ignoring malformed {} '{}' on vehicle {}: {}",
                column,
                raw,
                vehicle_id,
                err
            );
            None
        }
    }
}

fn vehicle_from_row(row: &SqliteRow) -> StorageResult<Vehicle> {
    let id: i64 = row.try_get("id")?;
    Ok(Vehicle {
        id,
        user_id: row.try_get("user_id")?,
        make: row.try_get("make")?,
        model: row.try_get("model")?,
        year: row.try_get("year")?,
        plate: row.try_get("plate")?,
        owner_name: row.try_get("owner_name")?,
        owner_phone: row.try_get("owner_phone")?,
        insurance_expiry: lenient_vehicle_date(id, "insurance_expiry", row.try_get("insurance_expiry")?),
        emission_expiry: lenient_vehicle_date(id, "emission_expiry", row.try_get("emission_expiry")?),
        rc_expiry: lenient_vehicle_date(id, "rc_expiry", row.try_get("rc_expiry")?),
        created_at: row.try_get("created_at")?,
    })
}

fn notification_from_row(row: &SqliteRow) -> StorageResult<Notification> {
    let is_read: i64 = row.try_get("is_read")?;
    Ok(Notification {
        id: row.try_get("id")?,
        vehicle_id: row.try_get("vehicle_id")?,
        notification_type: row.try_get("notification_type")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        due_date: parse_optional_date("notifications", row.try_get("due_date")?)?,
        is_read: is_read != 0,
        created_at: row.try_get("created_at")?,
    })
}

fn document_from_row(row: &SqliteRow) -> StorageResult<DocumentExpiry> {
    let expiry_date: String = row.try_get("expiry_date")?;
    let reminder_sent: i64 = row.try_get("reminder_sent")?;
    let is_active: i64 = row.try_get("is_active")?;
    Ok(DocumentExpiry {
        id: row.try_get("id")?,
        vehicle_id: row.try_get("vehicle_id")?,
        user_id: row.try_get("user_id")?,
        document_type: row.try_get("document_type")?,
        expiry_date: parse_date("document_expiries", &expiry_date)?,
        amount: row.try_get("amount")?,
        issue_date: parse_optional_date("document_expiries", row.try_get("issue_date")?)?,
        reminder_sent: reminder_sent != 0,
        is_active: is_active != 0,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl Storage for SqliteRepository {
    async fn create_vehicle(&self, vehicle: NewVehicle) -> StorageResult<Vehicle> {
        let created_at = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO vehicles
             (user_id, make, model, year, plate, owner_name, owner_phone,
              insurance_expiry, emission_expiry, rc_expiry, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(vehicle.user_id)
        .bind(&vehicle.make)
        .bind(&vehicle.model)
        .bind(vehicle.year)
        .bind(&vehicle.plate)
        .bind(&vehicle.owner_name)
        .bind(&vehicle.owner_phone)
        .bind(format_date(vehicle.insurance_expiry))
        .bind(format_date(vehicle.emission_expiry))
        .bind(format_date(vehicle.rc_expiry))
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        Ok(Vehicle {
            id: result.last_insert_rowid(),
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
            created_at,
        })
    }

    async fn get_vehicles(&self, user_id: i64) -> StorageResult<Vec<Vehicle>> {
        let sql = format!(
            "SELECT {} FROM vehicles WHERE user_id = ? ORDER BY id ASC",
            VEHICLE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(vehicle_from_row).collect()
    }

    async fn get_vehicle(&self, id: i64, user_id: i64) -> StorageResult<Option<Vehicle>> {
        let sql = format!(
            "SELECT {} FROM vehicles WHERE id = ? AND user_id = ?",
            VEHICLE_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(vehicle_from_row).transpose()
    }

    async fn update_vehicle_expiries(
        &self,
        id: i64,
        user_id: i64,
        expiries: VehicleExpiries,
    ) -> StorageResult<Option<Vehicle>> {
        let result = sqlx::query(
            "UPDATE vehicles
             SET insurance_expiry = COALESCE(?, insurance_expiry),
                 emission_expiry  = COALESCE(?, emission_expiry),
                 rc_expiry        = COALESCE(?, rc_expiry)
             WHERE id = ? AND user_id = ?",
        )
        .bind(format_date(expiries.insurance_expiry))
        .bind(format_date(expiries.emission_expiry))
        .bind(format_date(expiries.rc_expiry))
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_vehicle(id, user_id).await
    }

    async fn get_notifications_by_vehicle(
        &self,
        vehicle_id: i64,
    ) -> StorageResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications n WHERE n.vehicle_id = ? ORDER BY n.id ASC",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(vehicle_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn get_notifications_by_user(
        &self,
        user_id: i64,
        unread_only: bool,
    ) -> StorageResult<Vec<Notification>> {
        let sql = format!(
            "SELECT {} FROM notifications n
             JOIN vehicles v ON v.id = n.vehicle_id
             WHERE v.user_id = ? AND (? = 0 OR n.is_read = 0)
             ORDER BY n.id DESC",
            NOTIFICATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(if unread_only { 1i64 } else { 0i64 })
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(notification_from_row).collect()
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> StorageResult<Option<Notification>> {
        let created_at = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO notifications
             (vehicle_id, notification_type, title, message, due_date, dedup_key, is_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, ?)
             ON CONFLICT (vehicle_id, notification_type, dedup_key) DO NOTHING",
        )
        .bind(notification.vehicle_id)
        .bind(&notification.notification_type)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(format_date(notification.due_date))
        .bind(&notification.dedup_key)
        .bind(&created_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(Notification {
            id: result.last_insert_rowid(),
            vehicle_id: notification.vehicle_id,
            notification_type: notification.notification_type,
            title: notification.title,
            message: notification.message,
            due_date: notification.due_date,
            is_read: false,
            created_at,
        }))
    }

    async fn mark_notification_read(&self, id: i64, user_id: i64) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = 1
             WHERE id = ?
               AND vehicle_id IN (SELECT id FROM vehicles WHERE user_id = ?)",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_document_expiry(
        &self,
        document: NewDocumentExpiry,
    ) -> StorageResult<DocumentExpiry> {
        let created_at = Utc::now().to_rfc3339();
        let doc_type = document.document_type.as_str();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE document_expiries SET is_active = 0
             WHERE vehicle_id = ? AND document_type = ? AND is_active = 1",
        )
        .bind(document.vehicle_id)
        .bind(doc_type)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "INSERT INTO document_expiries
             (vehicle_id, user_id, document_type, expiry_date, amount, issue_date,
              reminder_sent, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, 0, 1, ?)",
        )
        .bind(document.vehicle_id)
        .bind(document.user_id)
        .bind(doc_type)
        .bind(document.expiry_date.format(DATE_FORMAT).to_string())
        .bind(document.amount)
        .bind(format_date(document.issue_date))
        .bind(&created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(DocumentExpiry {
            id: result.last_insert_rowid(),
            vehicle_id: document.vehicle_id,
            user_id: document.user_id,
            document_type: doc_type.to_string(),
            expiry_date: document.expiry_date,
            amount: document.amount,
            issue_date: document.issue_date,
            reminder_sent: false,
            is_active: true,
            created_at,
        })
    }

    async fn get_document_expiries(
        &self,
        vehicle_id: i64,
        active_only: bool,
    ) -> StorageResult<Vec<DocumentExpiry>> {
        let sql = format!(
            "SELECT {} FROM document_expiries
             WHERE vehicle_id = ? AND (? = 0 OR is_active = 1)
             ORDER BY id ASC",
            DOCUMENT_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(vehicle_id)
            .bind(if active_only { 1i64 } else { 0i64 })
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn mark_reminder_sent(&self, document_id: i64) -> StorageResult<()> {
        let result = sqlx::query("UPDATE document_expiries SET reminder_sent = 1 WHERE id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("document {}", document_id)));
        }
        Ok(())
    }
}
