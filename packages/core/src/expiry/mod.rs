//! Document expiry tracking
//!
//! Decides which vehicle documents are close to or past expiry and turns
//! them into notification rows. The sweep runs on demand (login, CLI); it
//! is not a background job.

pub mod clock;
pub mod document_type;
pub mod policy;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use document_type::{DocumentType, SweepResolution};
pub use policy::{ExpiryStatus, NotificationDraft, ReminderCadence};
pub use service::{CheckOutcome, DocumentUpload, ExpiryService, SweepReport, UploadOutcome};
