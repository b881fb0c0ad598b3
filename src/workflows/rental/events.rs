use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{ContractId, DocumentId, DocumentKind, DriverId, VehicleId, VerificationStatus};

/// Notification decisions emitted by the core. Payloads carry only the ids,
/// amounts, and dates a collaborator needs to render a message; templates and
/// delivery live outside this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RentalEvent {
    ContractSent {
        contract_id: ContractId,
        driver_id: DriverId,
    },
    ContractActivated {
        contract_id: ContractId,
        vehicle_id: VehicleId,
        first_due_date: Option<NaiveDate>,
        fee_amount_cents: i64,
    },
    DocumentApproved {
        driver_id: DriverId,
        document_id: DocumentId,
        kind: DocumentKind,
    },
    DocumentRejected {
        driver_id: DriverId,
        document_id: DocumentId,
        kind: DocumentKind,
        note: Option<String>,
    },
    VerificationFinalized {
        driver_id: DriverId,
        status: VerificationStatus,
    },
    PaymentDueSoon {
        contract_id: ContractId,
        due_date: NaiveDate,
        amount_cents: i64,
    },
    PaymentOverdue {
        contract_id: ContractId,
        due_date: NaiveDate,
        amount_cents: i64,
    },
}

impl RentalEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ContractSent { .. } => "contract_sent",
            Self::ContractActivated { .. } => "contract_activated",
            Self::DocumentApproved { .. } => "document_approved",
            Self::DocumentRejected { .. } => "document_rejected",
            Self::VerificationFinalized { .. } => "verification_finalized",
            Self::PaymentDueSoon { .. } => "payment_due_soon",
            Self::PaymentOverdue { .. } => "payment_overdue",
        }
    }
}

/// Notification dispatch error. Delivery failure is non-fatal to the
/// transition that triggered it; the service downgrades it to an advisory.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound hook consumed by the core (e-mail/SMS adapters implement this).
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, event: RentalEvent) -> Result<(), NotifyError>;
}

/// Publisher that records emitted events in the service log only. Useful for
/// the demo server and environments without a delivery adapter.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

impl NotificationPublisher for LoggingNotifier {
    fn publish(&self, event: RentalEvent) -> Result<(), NotifyError> {
        tracing::info!(event = event.name(), payload = ?event, "notification emitted");
        Ok(())
    }
}
