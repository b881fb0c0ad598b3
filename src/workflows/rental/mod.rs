//! Rental coordination core: driver verification, contract lifecycle, vehicle
//! availability, and the recurring-payment schedule that must stay consistent
//! with all three.

pub(crate) mod availability;
pub mod domain;
pub mod events;
pub mod export;
pub(crate) mod lifecycle;
pub mod overdue;
pub mod repository;
pub mod router;
pub mod schedule;
pub mod service;
pub mod verification;

#[cfg(test)]
mod tests;

pub use domain::{
    BillingFrequency, ContractId, ContractStatus, ContractTerms, Document, DocumentId,
    DocumentKind, DocumentStatus, DriverId, DriverProfile, KycDetails, Payment, PaymentStatus,
    RentalContract, SignaturePayload, Vehicle, VehicleId, VehicleStatus, VerificationStatus,
};
pub use events::{LoggingNotifier, NotificationPublisher, NotifyError, RentalEvent};
pub use lifecycle::{ContractEvent, TransitionOutcome};
pub use overdue::{effective_status, is_overdue};
pub use repository::{
    AdmissionOutcome, MemoryStore, RentalStore, RepositoryError, VehicleClaim,
};
pub use router::rental_router;
pub use schedule::{due_dates, generate_payments, validate_terms, ValidationIssue};
pub use service::{
    Advisory, BillingConfig, ContractRequest, ContractStatement, CoreError, NewDriver, NewVehicle,
    OperationsConfig, OperatorVehicleStatus, Outcome, PaymentView, PreconditionFailure,
    RentalService, VerificationDecision,
};
pub use verification::{
    completion_report, CompletionBucket, CompletionComponent, CompletionReport, ReviewDecision,
    VerificationConfig, VerificationWeights,
};
