//! Date arithmetic and reminder wording.

use chrono::NaiveDate;

use crate::expiry::DocumentType;
use crate::storage::{NewNotification, Notification, Vehicle};

/// Days-before-expiry on which the weekly cadence sends upcoming reminders.
pub const WEEKLY_REMINDER_DAYS: [i64; 5] = [30, 23, 16, 9, 2];

/// Whole calendar days from `today` until `expiry`; negative once past.
pub fn days_until(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

pub fn is_weekly_reminder_day(days_remaining: i64) -> bool {
    WEEKLY_REMINDER_DAYS.contains(&days_remaining)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryStatus {
    Upcoming { days_remaining: i64 },
    /// Due today counts as expired with zero days overdue.
    Expired { days_overdue: i64 },
}

impl ExpiryStatus {
    pub fn classify(days_diff: i64) -> Self {
        if days_diff > 0 {
            ExpiryStatus::Upcoming {
                days_remaining: days_diff,
            }
        } else {
            ExpiryStatus::Expired {
                days_overdue: days_diff.abs(),
            }
        }
    }
}

/// How often upcoming reminders are emitted. Expired reminders are never gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReminderCadence {
    /// Every sweep may emit a reminder for any future expiry.
    #[default]
    Always,
    /// Only on the [`WEEKLY_REMINDER_DAYS`] thresholds.
    Weekly,
}

impl ReminderCadence {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "always" => Some(Self::Always),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }

    pub fn should_notify(&self, status: ExpiryStatus) -> bool {
        match (self, status) {
            (ReminderCadence::Always, _) => true,
            (ReminderCadence::Weekly, ExpiryStatus::Upcoming { days_remaining }) => {
                is_weekly_reminder_day(days_remaining)
            }
            (ReminderCadence::Weekly, ExpiryStatus::Expired { .. }) => true,
        }
    }
}

/// A reminder about to be written, before it has a row id.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub doc_type: DocumentType,
    pub status: ExpiryStatus,
    pub expiry_date: NaiveDate,
    pub title: String,
    pub message: String,
    pub dedup_key: String,
}

impl NotificationDraft {
    pub fn build(
        vehicle: &Vehicle,
        doc_type: DocumentType,
        expiry_date: NaiveDate,
        status: ExpiryStatus,
    ) -> Self {
        let name = doc_type.display_name();
        let (title, message, dedup_key) = match status {
            ExpiryStatus::Upcoming { days_remaining } => (
                format!("{} Expiring Soon", name),
                format!(
                    "Your {} for {} {} on {}.",
                    name,
                    vehicle.label(),
                    upcoming_phrase(days_remaining),
                    expiry_date
                ),
                format!("upcoming:{}:{}", expiry_date, days_remaining),
            ),
            ExpiryStatus::Expired { days_overdue } => {
                let when = if days_overdue == 0 {
                    format!("expired today ({})", expiry_date)
                } else {
                    format!("expired {} days ago on {}", days_overdue, expiry_date)
                };
                (
                    format!("URGENT: {} Expired!", name),
                    format!(
                        "Your {} for {} {}. Renew it immediately.",
                        name,
                        vehicle.label(),
                        when
                    ),
                    format!("expired:{}", expiry_date),
                )
            }
        };

        Self {
            doc_type,
            status,
            expiry_date,
            title,
            message,
            dedup_key,
        }
    }

    /// True when one of `existing` already carries this reminder.
    ///
    /// Matches on type, title and due date; upcoming reminders must also
    /// mention the same number of days.
    pub fn is_already_sent(&self, existing: &[Notification]) -> bool {
        existing.iter().any(|n| {
            n.notification_type == self.doc_type.as_str()
                && n.title == self.title
                && n.due_date == Some(self.expiry_date)
                && match self.status {
                    ExpiryStatus::Upcoming { days_remaining } => {
                        n.message.contains(&upcoming_phrase(days_remaining))
                    }
                    ExpiryStatus::Expired { .. } => true,
                }
        })
    }

    pub fn into_new_notification(self, vehicle_id: i64) -> NewNotification {
        NewNotification {
            vehicle_id,
            notification_type: self.doc_type.as_str().to_string(),
            title: self.title,
            message: self.message,
            due_date: Some(self.expiry_date),
            dedup_key: self.dedup_key,
        }
    }
}

fn upcoming_phrase(days_remaining: i64) -> String {
    format!("expires in {} days", days_remaining)
}
