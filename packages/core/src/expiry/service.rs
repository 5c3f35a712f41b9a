//! Expiry sweep and document-upload hook.
//!
//! Both entry points are best-effort: storage failures are logged, counted
//! in the returned report, and never propagated. A missed reminder degrades
//! the experience but loses no data, so neither path fails its caller.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::expiry::policy::{days_until, ExpiryStatus, NotificationDraft, ReminderCadence};
use crate::expiry::{Clock, DocumentType, SweepResolution};
use crate::metrics::AppMetrics;
use crate::storage::{DocumentExpiry, NewDocumentExpiry, Notification, Storage, Vehicle};

/// Result of checking one document against today's date.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    Created(Notification),
    /// The same reminder already exists for this vehicle.
    Duplicate,
    /// Filtered out by the reminder cadence.
    NotDue,
    Failed,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SweepReport {
    pub user_id: i64,
    pub today: Option<NaiveDate>,
    pub vehicles_checked: usize,
    pub notifications_created: usize,
    pub duplicates_skipped: usize,
    pub not_due: usize,
    /// Document types with no server-side expiry source (insurance, road
    /// tax, fitness certificate, travel permits), counted per vehicle.
    pub documents_skipped: usize,
    pub errors: usize,
}

impl SweepReport {
    fn new(user_id: i64, today: NaiveDate) -> Self {
        Self {
            user_id,
            today: Some(today),
            ..Default::default()
        }
    }

    fn record(&mut self, outcome: &CheckOutcome) {
        match outcome {
            CheckOutcome::Created(_) => self.notifications_created += 1,
            CheckOutcome::Duplicate => self.duplicates_skipped += 1,
            CheckOutcome::NotDue => self.not_due += 1,
            CheckOutcome::Failed => self.errors += 1,
        }
    }
}

/// Input to [`ExpiryService::process_document_upload`].
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub vehicle_id: i64,
    pub user_id: i64,
    /// Raw type string from the client; untracked kinds are ignored.
    pub document_type: String,
    pub expiry_date: Option<NaiveDate>,
    pub amount: Option<f64>,
    pub issue_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// Untracked document type or no expiry date supplied.
    Ignored,
    VehicleNotFound,
    Tracked {
        document: DocumentExpiry,
        notification: Option<Notification>,
    },
    Failed,
}

impl UploadOutcome {
    fn label(&self) -> &'static str {
        match self {
            UploadOutcome::Ignored => "ignored",
            UploadOutcome::VehicleNotFound => "vehicle_not_found",
            UploadOutcome::Tracked { .. } => "tracked",
            UploadOutcome::Failed => "failed",
        }
    }
}

pub struct ExpiryService {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    cadence: ReminderCadence,
    metrics: Option<Arc<AppMetrics>>,
}

impl ExpiryService {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            cadence: ReminderCadence::default(),
            metrics: None,
        }
    }

    pub fn with_cadence(mut self, cadence: ReminderCadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<AppMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Check every tracked document on every vehicle owned by `user_id`.
    ///
    /// Vehicles and document types are processed one after another; a
    /// failure on one document does not stop the rest of the sweep.
    pub async fn run_expiry_check_process(&self, user_id: i64) -> SweepReport {
        let today = self.clock.today();
        let mut report = SweepReport::new(user_id, today);
        if let Some(m) = &self.metrics {
            m.sweeps_total.inc();
        }

        let vehicles = match self.storage.get_vehicles(user_id).await {
            Ok(vehicles) => vehicles,
            Err(err) => {
                tracing::error!("Expiry sweep for user {} aborted: {}", user_id, err);
                self.count_error();
                report.errors += 1;
                return report;
            }
        };

        if vehicles.is_empty() {
            tracing::debug!("User {} has no vehicles; nothing to check", user_id);
            return report;
        }

        for vehicle in &vehicles {
            report.vehicles_checked += 1;
            self.process_vehicle_expiries(vehicle, today, &mut report)
                .await;
        }

        tracing::info!(
            "Expiry sweep for user {}: {} vehicles, {} created, {} duplicates, {} errors",
            user_id,
            report.vehicles_checked,
            report.notifications_created,
            report.duplicates_skipped,
            report.errors,
        );
        report
    }

    async fn process_vehicle_expiries(
        &self,
        vehicle: &Vehicle,
        today: NaiveDate,
        report: &mut SweepReport,
    ) {
        for doc_type in DocumentType::ALL {
            match doc_type.sweep_resolution() {
                SweepResolution::VehicleField => {}
                SweepResolution::ClientSideOnly | SweepResolution::NotBacked => {
                    report.documents_skipped += 1;
                    continue;
                }
            }

            let Some(expiry) = vehicle.expiry_for(doc_type) else {
                tracing::debug!(
                    "Vehicle {} has no {} set; skipping {}",
                    vehicle.id,
                    doc_type.vehicle_field().unwrap_or("expiry date"),
                    doc_type
                );
                continue;
            };

            let outcome = self.check_document_on(vehicle, doc_type, expiry, today).await;
            report.record(&outcome);
        }
    }

    /// Check a single document against today's date and write a reminder
    /// if one is due and not already present.
    pub async fn check_document(
        &self,
        vehicle: &Vehicle,
        doc_type: DocumentType,
        expiry: NaiveDate,
    ) -> CheckOutcome {
        self.check_document_on(vehicle, doc_type, expiry, self.clock.today())
            .await
    }

    async fn check_document_on(
        &self,
        vehicle: &Vehicle,
        doc_type: DocumentType,
        expiry: NaiveDate,
        today: NaiveDate,
    ) -> CheckOutcome {
        let status = ExpiryStatus::classify(days_until(expiry, today));
        if !self.cadence.should_notify(status) {
            return CheckOutcome::NotDue;
        }

        let draft = NotificationDraft::build(vehicle, doc_type, expiry, status);

        match self.storage.get_notifications_by_vehicle(vehicle.id).await {
            Ok(existing) if draft.is_already_sent(&existing) => {
                self.count_duplicate();
                return CheckOutcome::Duplicate;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(
                    "Could not load notifications for vehicle {} ({}): {}",
                    vehicle.id,
                    doc_type,
                    err
                );
                self.count_error();
                return CheckOutcome::Failed;
            }
        }

        match self
            .storage
            .create_notification(draft.into_new_notification(vehicle.id))
            .await
        {
            Ok(Some(notification)) => {
                tracing::debug!(
                    "Created {} reminder {} for vehicle {}",
                    doc_type,
                    notification.id,
                    vehicle.id
                );
                if let Some(m) = &self.metrics {
                    m.notifications_created_total
                        .with_label_values(&[doc_type.as_str()])
                        .inc();
                }
                CheckOutcome::Created(notification)
            }
            // Lost the race to another sweep.
            Ok(None) => {
                self.count_duplicate();
                CheckOutcome::Duplicate
            }
            Err(err) => {
                tracing::error!(
                    "Could not create {} reminder for vehicle {}: {}",
                    doc_type,
                    vehicle.id,
                    err
                );
                self.count_error();
                CheckOutcome::Failed
            }
        }
    }

    /// Record an uploaded document and immediately check it for a reminder.
    ///
    /// Unlike the sweep, every tracked type (insurance included) is checked
    /// here, because the upload carries its own expiry date.
    pub async fn process_document_upload(&self, upload: DocumentUpload) -> UploadOutcome {
        let outcome = self.track_upload(upload).await;
        if let Some(m) = &self.metrics {
            m.document_uploads_total
                .with_label_values(&[outcome.label()])
                .inc();
        }
        outcome
    }

    async fn track_upload(&self, upload: DocumentUpload) -> UploadOutcome {
        let Some(doc_type) = DocumentType::parse(&upload.document_type) else {
            tracing::debug!(
                "Document type '{}' is not expiry-tracked; ignoring upload",
                upload.document_type
            );
            return UploadOutcome::Ignored;
        };
        let Some(expiry_date) = upload.expiry_date else {
            tracing::debug!("Upload of {} has no expiry date; ignoring", doc_type);
            return UploadOutcome::Ignored;
        };

        let vehicle = match self
            .storage
            .get_vehicle(upload.vehicle_id, upload.user_id)
            .await
        {
            Ok(Some(vehicle)) => vehicle,
            Ok(None) => {
                tracing::warn!(
                    "Upload for unknown vehicle {} (user {})",
                    upload.vehicle_id,
                    upload.user_id
                );
                return UploadOutcome::VehicleNotFound;
            }
            Err(err) => {
                tracing::error!("Could not load vehicle {}: {}", upload.vehicle_id, err);
                self.count_error();
                return UploadOutcome::Failed;
            }
        };

        let mut document = match self
            .storage
            .create_document_expiry(NewDocumentExpiry {
                vehicle_id: vehicle.id,
                user_id: upload.user_id,
                document_type: doc_type,
                expiry_date,
                amount: upload.amount,
                issue_date: upload.issue_date,
            })
            .await
        {
            Ok(document) => document,
            Err(err) => {
                tracing::error!(
                    "Could not record {} expiry for vehicle {}: {}",
                    doc_type,
                    vehicle.id,
                    err
                );
                self.count_error();
                return UploadOutcome::Failed;
            }
        };

        let notification = match self.check_document(&vehicle, doc_type, expiry_date).await {
            CheckOutcome::Created(notification) => {
                match self.storage.mark_reminder_sent(document.id).await {
                    Ok(()) => document.reminder_sent = true,
                    Err(err) => {
                        tracing::warn!(
                            "Could not flag reminder on document {}: {}",
                            document.id,
                            err
                        );
                    }
                }
                Some(notification)
            }
            CheckOutcome::Duplicate | CheckOutcome::NotDue | CheckOutcome::Failed => None,
        };

        UploadOutcome::Tracked {
            document,
            notification,
        }
    }

    fn count_error(&self) {
        if let Some(m) = &self.metrics {
            m.expiry_errors_total.inc();
        }
    }

    fn count_duplicate(&self) {
        if let Some(m) = &self.metrics {
            m.notifications_deduplicated_total.inc();
        }
    }
}
