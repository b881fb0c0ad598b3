use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::availability::resolve_vehicle_status;
use super::domain::{
    ContractId, ContractStatus, ContractTerms, Document, DocumentId, DocumentKind, DocumentStatus,
    DriverId, DriverProfile, KycDetails, Payment, PaymentStatus, RentalContract, SignaturePayload,
    Vehicle, VehicleId, VehicleStatus, VerificationStatus,
};
use super::events::{NotificationPublisher, RentalEvent};
use super::lifecycle::{self, ContractEvent, TransitionOutcome};
use super::overdue::{effective_status, is_overdue};
use super::repository::{AdmissionOutcome, RentalStore, RepositoryError, VehicleClaim};
use super::schedule::{self, ValidationIssue};
use super::verification::{self, CompletionReport, VerificationConfig};

/// A guard that was checked and found false. Display names the exact failed
/// precondition so callers can render actionable guidance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionFailure {
    #[error("driver {driver} is {status}; only verified drivers may be contracted")]
    DriverNotVerified { driver: String, status: &'static str },
    #[error("vehicle {vehicle} is {status}, not available")]
    VehicleNotAvailable {
        vehicle: String,
        status: &'static str,
    },
    #[error("verification completion is {percent}%; finalizing as verified requires 100%")]
    CompletionBelowVerified { percent: u8 },
    #[error("verification completion is {percent}%; resubmission requires at least {required}%")]
    CompletionBelowResubmission { percent: u8, required: u8 },
    #[error("signature payload is missing a signed name")]
    SignatureMissing,
    #[error("driver has not accepted the {flag}")]
    AcceptanceNotConfirmed { flag: &'static str },
    #[error("billing generation is paused while the contract is {status}")]
    BillingPaused { status: &'static str },
    #[error("vehicle {vehicle} still holds a live contract")]
    VehicleStillClaimed { vehicle: String },
}

/// Typed error surface of the core operations, plus the storage escape hatch
/// for infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("event '{event}' is not valid while the {entity} is {state}")]
    InvalidTransition {
        entity: &'static str,
        state: &'static str,
        event: &'static str,
    },
    #[error(transparent)]
    Precondition(#[from] PreconditionFailure),
    #[error("concurrent write on {resource} detected: {detail}")]
    Conflict {
        resource: &'static str,
        detail: String,
    },
    #[error(transparent)]
    Validation(#[from] ValidationIssue),
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl CoreError {
    /// Stable message category for the calling layer.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Precondition(_) => "precondition_failed",
            Self::Conflict { .. } => "conflict",
            Self::Validation(_) => "validation",
            Self::Storage(_) => "storage",
        }
    }
}

fn invalid_transition(entity: &'static str, state: &'static str, event: &'static str) -> CoreError {
    CoreError::InvalidTransition {
        entity,
        state,
        event,
    }
}

/// Soft warning attached to an otherwise successful operation. Notification
/// delivery failures and operator misconfiguration land here instead of
/// rolling back the transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "advisory", rename_all = "snake_case")]
pub enum Advisory {
    NotificationFailed {
        event: &'static str,
        detail: String,
    },
    WeightsMisconfigured {
        total: u16,
    },
}

impl Advisory {
    pub fn message(&self) -> String {
        match self {
            Advisory::NotificationFailed { event, detail } => {
                format!("notification '{event}' was not delivered: {detail}")
            }
            Advisory::WeightsMisconfigured { total } => format!(
                "verification weights sum to {total}, not 100; completion is normalized"
            ),
        }
    }
}

/// Successful operation result: the updated entity plus any soft advisories.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    pub value: T,
    pub advisories: Vec<Advisory>,
}

impl<T> Outcome<T> {
    pub fn clean(value: T) -> Self {
        Self {
            value,
            advisories: Vec::new(),
        }
    }
}

/// Billing knobs consumed (not owned) by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingConfig {
    /// Days after a due date before a Pending payment counts as overdue.
    pub grace_period_days: u32,
    /// Number of periods pre-materialized when a contract activates.
    pub horizon_periods: usize,
    /// Window ahead of a due date in which a reminder fires.
    pub due_soon_window_days: u32,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            grace_period_days: 3,
            horizon_periods: 12,
            due_soon_window_days: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationsConfig {
    pub verification: VerificationConfig,
    pub billing: BillingConfig,
}

/// Finalize decision for a driver's verification. Closed type so invalid
/// targets (e.g. finalizing back to Unverified) are unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationDecision {
    Verified,
    Rejected,
}

/// Statuses an operator may set on a vehicle by hand. Assigned is derived
/// from contract state and never set manually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorVehicleStatus {
    Available,
    Maintenance,
    Inactive,
}

impl OperatorVehicleStatus {
    const fn as_status(self) -> VehicleStatus {
        match self {
            Self::Available => VehicleStatus::Available,
            Self::Maintenance => VehicleStatus::Maintenance,
            Self::Inactive => VehicleStatus::Inactive,
        }
    }
}

/// Intake payload for a new driver account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDriver {
    pub full_name: String,
    pub kyc: KycDetails,
    pub location_checkin: Option<NaiveDate>,
}

/// Intake payload for a fleet vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVehicle {
    pub registration: String,
    pub license_expiry: Option<NaiveDate>,
    pub insurance_expiry: Option<NaiveDate>,
    pub roadworthy_expiry: Option<NaiveDate>,
}

/// Admission request pairing a driver with a vehicle under given terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRequest {
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    pub terms: ContractTerms,
}

/// One payment row with the overdue resolver already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentView {
    pub due_date: NaiveDate,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub paid_at: Option<NaiveDate>,
}

/// Contract snapshot for API responses and reporting reads.
#[derive(Debug, Clone, Serialize)]
pub struct ContractStatement {
    pub contract: RentalContract,
    pub payments: Vec<PaymentView>,
    pub outstanding_cents: i64,
}

static DRIVER_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static VEHICLE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static CONTRACT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static DOCUMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str, sequence: &AtomicU64) -> String {
    let id = sequence.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{id:06}")
}

/// Facade composing the verification engine, contract lifecycle, schedule
/// generator, availability synchronizer, and overdue resolver over a store
/// and a notification publisher.
pub struct RentalService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    config: OperationsConfig,
}

impl<S, N> RentalService<S, N>
where
    S: RentalStore + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>, config: OperationsConfig) -> Self {
        Self {
            store,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &OperationsConfig {
        &self.config
    }

    fn emit(&self, event: RentalEvent, advisories: &mut Vec<Advisory>) {
        let name = event.name();
        if let Err(error) = self.notifier.publish(event) {
            tracing::warn!(event = name, %error, "notification delivery failed");
            advisories.push(Advisory::NotificationFailed {
                event: name,
                detail: error.to_string(),
            });
        }
    }

    fn weights_advisory(&self, report: &CompletionReport, advisories: &mut Vec<Advisory>) {
        if !report.weights_consistent {
            advisories.push(Advisory::WeightsMisconfigured {
                total: self.config.verification.weights.total(),
            });
        }
    }

    fn driver(&self, id: &DriverId) -> Result<DriverProfile, CoreError> {
        self.store
            .fetch_driver(id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "driver",
                id: id.0.clone(),
            })
    }

    fn vehicle(&self, id: &VehicleId) -> Result<Vehicle, CoreError> {
        self.store
            .fetch_vehicle(id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "vehicle",
                id: id.0.clone(),
            })
    }

    fn contract(&self, id: &ContractId) -> Result<RentalContract, CoreError> {
        self.store
            .fetch_contract(id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "contract",
                id: id.0.clone(),
            })
    }

    /// Recompute the vehicle status from its non-terminal contracts and
    /// persist it when it drifted.
    fn reconcile_vehicle(&self, vehicle_id: &VehicleId) -> Result<(), CoreError> {
        let mut vehicle = self.vehicle(vehicle_id)?;
        let claims = self.store.non_terminal_for_vehicle(vehicle_id)?;
        let resolved = resolve_vehicle_status(vehicle.status, &claims);
        if resolved != vehicle.status {
            vehicle.status = resolved;
            self.store.update_vehicle(vehicle)?;
        }
        Ok(())
    }

    // --- verification -----------------------------------------------------

    /// Create a driver account with its derived completion snapshot.
    pub fn register_driver(&self, intake: NewDriver) -> Result<DriverProfile, CoreError> {
        let mut profile = DriverProfile {
            id: DriverId(next_id("drv", &DRIVER_SEQUENCE)),
            full_name: intake.full_name,
            kyc: intake.kyc,
            verification_status: VerificationStatus::Unverified,
            completion_percent: 0,
            verification_note: None,
            documents: Vec::new(),
            location_checkin: intake.location_checkin,
        };
        verification::apply_completion(&mut profile, &self.config.verification);
        Ok(self.store.insert_driver(profile)?)
    }

    /// Attach a fresh pending document, superseding any earlier upload of the
    /// same kind. Never changes the verification status by itself.
    pub fn upload_document(
        &self,
        driver_id: &DriverId,
        kind: DocumentKind,
        today: NaiveDate,
    ) -> Result<Outcome<DriverProfile>, CoreError> {
        let mut profile = self.driver(driver_id)?;

        for document in profile
            .documents
            .iter_mut()
            .filter(|document| document.kind == kind)
        {
            document.superseded = true;
        }
        profile.documents.push(Document {
            id: DocumentId(next_id("doc", &DOCUMENT_SEQUENCE)),
            kind,
            status: DocumentStatus::Pending,
            review_note: None,
            uploaded_on: today,
            superseded: false,
        });

        let report = verification::apply_completion(&mut profile, &self.config.verification);
        self.store.update_driver(profile.clone())?;

        let mut advisories = Vec::new();
        self.weights_advisory(&report, &mut advisories);
        Ok(Outcome {
            value: profile,
            advisories,
        })
    }

    /// Record an operator decision on a pending document and recompute the
    /// driver's completion percentage.
    pub fn review_document(
        &self,
        document_id: &DocumentId,
        decision: verification::ReviewDecision,
        note: Option<String>,
    ) -> Result<Outcome<DriverProfile>, CoreError> {
        let mut profile = self
            .store
            .find_document_owner(document_id)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "document",
                id: document_id.0.clone(),
            })?;

        let (kind, status) = {
            let document = profile
                .documents
                .iter_mut()
                .find(|document| &document.id == document_id)
                .ok_or_else(|| CoreError::NotFound {
                    entity: "document",
                    id: document_id.0.clone(),
                })?;
            if document.status != DocumentStatus::Pending {
                return Err(invalid_transition(
                    "document",
                    document.status.label(),
                    "review",
                ));
            }
            document.status = match decision {
                verification::ReviewDecision::Approved => DocumentStatus::Approved,
                verification::ReviewDecision::Rejected => DocumentStatus::Rejected,
            };
            document.review_note = note.clone();
            (document.kind, document.status)
        };

        let report = verification::apply_completion(&mut profile, &self.config.verification);
        self.store.update_driver(profile.clone())?;

        let mut advisories = Vec::new();
        let event = match status {
            DocumentStatus::Approved => RentalEvent::DocumentApproved {
                driver_id: profile.id.clone(),
                document_id: document_id.clone(),
                kind,
            },
            _ => RentalEvent::DocumentRejected {
                driver_id: profile.id.clone(),
                document_id: document_id.clone(),
                kind,
                note,
            },
        };
        self.emit(event, &mut advisories);
        self.weights_advisory(&report, &mut advisories);

        Ok(Outcome {
            value: profile,
            advisories,
        })
    }

    /// Close a verification review as Verified or Rejected.
    pub fn finalize_verification(
        &self,
        driver_id: &DriverId,
        decision: VerificationDecision,
        note: Option<String>,
    ) -> Result<Outcome<DriverProfile>, CoreError> {
        let mut profile = self.driver(driver_id)?;

        if !matches!(
            profile.verification_status,
            VerificationStatus::Unverified | VerificationStatus::InReview
        ) {
            return Err(invalid_transition(
                "driver verification",
                profile.verification_status.label(),
                "finalize",
            ));
        }

        profile.verification_status = match decision {
            VerificationDecision::Verified => {
                if profile.completion_percent < 100 {
                    return Err(PreconditionFailure::CompletionBelowVerified {
                        percent: profile.completion_percent,
                    }
                    .into());
                }
                VerificationStatus::Verified
            }
            VerificationDecision::Rejected => VerificationStatus::Rejected,
        };
        profile.verification_note = note;
        self.store.update_driver(profile.clone())?;

        let mut advisories = Vec::new();
        self.emit(
            RentalEvent::VerificationFinalized {
                driver_id: profile.id.clone(),
                status: profile.verification_status,
            },
            &mut advisories,
        );
        Ok(Outcome {
            value: profile,
            advisories,
        })
    }

    /// Explicit re-entry into review after a rejection. Gated on the
    /// operator-configured completion threshold so repeated uploads alone
    /// cannot flap the status.
    pub fn resubmit_verification(
        &self,
        driver_id: &DriverId,
    ) -> Result<DriverProfile, CoreError> {
        let mut profile = self.driver(driver_id)?;

        if profile.verification_status != VerificationStatus::Rejected {
            return Err(invalid_transition(
                "driver verification",
                profile.verification_status.label(),
                "resubmit",
            ));
        }

        let report = verification::apply_completion(&mut profile, &self.config.verification);
        let required = self.config.verification.resubmission_threshold_percent;
        if report.percent < required {
            return Err(PreconditionFailure::CompletionBelowResubmission {
                percent: report.percent,
                required,
            }
            .into());
        }

        profile.verification_status = VerificationStatus::InReview;
        self.store.update_driver(profile.clone())?;
        Ok(profile)
    }

    // --- fleet ------------------------------------------------------------

    pub fn register_vehicle(&self, intake: NewVehicle) -> Result<Vehicle, CoreError> {
        let vehicle = Vehicle {
            id: VehicleId(next_id("veh", &VEHICLE_SEQUENCE)),
            registration: intake.registration,
            status: VehicleStatus::Available,
            license_expiry: intake.license_expiry,
            insurance_expiry: intake.insurance_expiry,
            roadworthy_expiry: intake.roadworthy_expiry,
        };
        Ok(self.store.insert_vehicle(vehicle)?)
    }

    /// Operator override of vehicle status, refused while a live contract
    /// still claims the vehicle.
    pub fn set_vehicle_status(
        &self,
        vehicle_id: &VehicleId,
        requested: OperatorVehicleStatus,
    ) -> Result<Vehicle, CoreError> {
        let mut vehicle = self.vehicle(vehicle_id)?;
        let claims = self.store.non_terminal_for_vehicle(vehicle_id)?;
        if resolve_vehicle_status(vehicle.status, &claims) == VehicleStatus::Assigned {
            return Err(PreconditionFailure::VehicleStillClaimed {
                vehicle: vehicle_id.0.clone(),
            }
            .into());
        }
        vehicle.status = requested.as_status();
        self.store.update_vehicle(vehicle.clone())?;
        Ok(vehicle)
    }

    // --- contract lifecycle ----------------------------------------------

    /// Admission: create a Draft contract for a verified driver and an
    /// available vehicle. The uniqueness check against other non-terminal
    /// contracts happens inside the store as one conditional insert.
    pub fn create_contract(&self, request: ContractRequest) -> Result<RentalContract, CoreError> {
        schedule::validate_terms(&request.terms)?;

        let driver = self.driver(&request.driver_id)?;
        if driver.verification_status != VerificationStatus::Verified {
            return Err(PreconditionFailure::DriverNotVerified {
                driver: driver.id.0,
                status: driver.verification_status.label(),
            }
            .into());
        }

        let vehicle = self.vehicle(&request.vehicle_id)?;
        if vehicle.status != VehicleStatus::Available {
            return Err(PreconditionFailure::VehicleNotAvailable {
                vehicle: vehicle.id.0,
                status: vehicle.status.label(),
            }
            .into());
        }

        let contract = RentalContract {
            id: ContractId(next_id("ctr", &CONTRACT_SEQUENCE)),
            driver_id: request.driver_id,
            vehicle_id: request.vehicle_id,
            terms: request.terms,
            status: ContractStatus::Draft,
            driver_signed_at: None,
        };

        match self.store.insert_contract_guarded(contract)? {
            AdmissionOutcome::Admitted(contract) => Ok(contract),
            AdmissionOutcome::ClaimHeld { holder } => Err(CoreError::Conflict {
                resource: "contract admission",
                detail: format!(
                    "non-terminal contract {} already claims this driver or vehicle",
                    holder.0
                ),
            }),
        }
    }

    fn step(
        &self,
        contract: &RentalContract,
        event: ContractEvent,
    ) -> Result<ContractStatus, CoreError> {
        match lifecycle::apply(contract.status, event) {
            Some(TransitionOutcome::Move(next)) => Ok(next),
            _ => Err(invalid_transition(
                "contract",
                contract.status.label(),
                event.label(),
            )),
        }
    }

    /// Send a fully populated draft to the driver for signature.
    pub fn send_contract(
        &self,
        contract_id: &ContractId,
    ) -> Result<Outcome<RentalContract>, CoreError> {
        let mut contract = self.contract(contract_id)?;
        let next = self.step(&contract, ContractEvent::Send)?;
        schedule::validate_terms(&contract.terms)?;

        contract.status = next;
        self.store.update_contract(contract.clone())?;

        let mut advisories = Vec::new();
        self.emit(
            RentalEvent::ContractSent {
                contract_id: contract.id.clone(),
                driver_id: contract.driver_id.clone(),
            },
            &mut advisories,
        );
        Ok(Outcome {
            value: contract,
            advisories,
        })
    }

    /// Countersignature by the driver. Requires a signed name and both
    /// acceptance flags.
    pub fn driver_sign(
        &self,
        contract_id: &ContractId,
        payload: &SignaturePayload,
        today: NaiveDate,
    ) -> Result<RentalContract, CoreError> {
        let mut contract = self.contract(contract_id)?;
        let next = self.step(&contract, ContractEvent::DriverSign)?;

        if payload.signed_name.trim().is_empty() {
            return Err(PreconditionFailure::SignatureMissing.into());
        }
        if !payload.accepted_terms {
            return Err(PreconditionFailure::AcceptanceNotConfirmed {
                flag: "rental terms",
            }
            .into());
        }
        if !payload.accepted_debit_order {
            return Err(PreconditionFailure::AcceptanceNotConfirmed {
                flag: "debit order",
            }
            .into());
        }

        contract.status = next;
        contract.driver_signed_at = Some(today);
        self.store.update_contract(contract.clone())?;
        Ok(contract)
    }

    /// Cancellation before activation, by either party.
    pub fn reject_contract(&self, contract_id: &ContractId) -> Result<RentalContract, CoreError> {
        let mut contract = self.contract(contract_id)?;
        contract.status = self.step(&contract, ContractEvent::Reject)?;
        self.store.update_contract(contract.clone())?;
        self.reconcile_vehicle(&contract.vehicle_id)?;
        Ok(contract)
    }

    /// Activate a signed contract: claim the vehicle with a conditional
    /// write, materialize the payment schedule, then flip the status. On any
    /// failure the claim is released and the contract is left untouched.
    pub fn activate_contract(
        &self,
        contract_id: &ContractId,
    ) -> Result<Outcome<RentalContract>, CoreError> {
        let mut contract = self.contract(contract_id)?;
        let next = self.step(&contract, ContractEvent::Activate)?;

        match self.store.claim_vehicle(
            &contract.vehicle_id,
            VehicleStatus::Available,
            VehicleStatus::Assigned,
        )? {
            VehicleClaim::Granted => {}
            VehicleClaim::Denied { actual } => {
                return Err(PreconditionFailure::VehicleNotAvailable {
                    vehicle: contract.vehicle_id.0.clone(),
                    status: actual.label(),
                }
                .into());
            }
        }

        let activation = (|| -> Result<Option<NaiveDate>, CoreError> {
            let payments = schedule::generate_payments(
                &contract,
                contract.terms.start_date,
                self.config.billing.horizon_periods,
            )?;
            let first_due = payments.first().map(|payment| payment.due_date);
            self.store.append_payments(payments)?;
            contract.status = next;
            self.store.update_contract(contract.clone())?;
            Ok(first_due)
        })();

        let first_due = match activation {
            Ok(first_due) => first_due,
            Err(error) => {
                // Undo the claim so a failed activation leaves no trace.
                let _ = self.store.claim_vehicle(
                    &contract.vehicle_id,
                    VehicleStatus::Assigned,
                    VehicleStatus::Available,
                );
                return Err(error);
            }
        };

        let mut advisories = Vec::new();
        self.emit(
            RentalEvent::ContractActivated {
                contract_id: contract.id.clone(),
                vehicle_id: contract.vehicle_id.clone(),
                first_due_date: first_due,
                fee_amount_cents: contract.terms.fee_amount_cents,
            },
            &mut advisories,
        );
        Ok(Outcome {
            value: contract,
            advisories,
        })
    }

    /// Pause billing generation; the vehicle stays assigned.
    pub fn suspend_contract(&self, contract_id: &ContractId) -> Result<RentalContract, CoreError> {
        let mut contract = self.contract(contract_id)?;
        contract.status = self.step(&contract, ContractEvent::Suspend)?;
        self.store.update_contract(contract.clone())?;
        self.reconcile_vehicle(&contract.vehicle_id)?;
        Ok(contract)
    }

    pub fn resume_contract(&self, contract_id: &ContractId) -> Result<RentalContract, CoreError> {
        let mut contract = self.contract(contract_id)?;
        contract.status = self.step(&contract, ContractEvent::Resume)?;
        self.store.update_contract(contract.clone())?;
        self.reconcile_vehicle(&contract.vehicle_id)?;
        Ok(contract)
    }

    /// End an active or paused rental, releasing the vehicle.
    pub fn end_contract(
        &self,
        contract_id: &ContractId,
        today: NaiveDate,
    ) -> Result<RentalContract, CoreError> {
        let mut contract = self.contract(contract_id)?;
        contract.status = self.step(&contract, ContractEvent::End)?;
        contract.terms.end_date = Some(today);
        self.store.update_contract(contract.clone())?;
        self.reconcile_vehicle(&contract.vehicle_id)?;
        Ok(contract)
    }

    /// Hard delete, allowed for drafts only.
    pub fn delete_draft_contract(&self, contract_id: &ContractId) -> Result<(), CoreError> {
        let contract = self.contract(contract_id)?;
        match lifecycle::apply(contract.status, ContractEvent::Delete) {
            Some(TransitionOutcome::Remove) => Ok(self.store.delete_contract(contract_id)?),
            _ => Err(invalid_transition(
                "contract",
                contract.status.label(),
                ContractEvent::Delete.label(),
            )),
        }
    }

    // --- payments ---------------------------------------------------------

    fn payment(
        &self,
        contract_id: &ContractId,
        due_date: NaiveDate,
    ) -> Result<Payment, CoreError> {
        self.store
            .fetch_payment(contract_id, due_date)?
            .ok_or_else(|| CoreError::NotFound {
                entity: "payment",
                id: format!("{} due {}", contract_id.0, due_date),
            })
    }

    /// Settle a pending or overdue payment.
    pub fn mark_payment_paid(
        &self,
        contract_id: &ContractId,
        due_date: NaiveDate,
        today: NaiveDate,
    ) -> Result<Payment, CoreError> {
        let mut payment = self.payment(contract_id, due_date)?;
        if !matches!(
            payment.status,
            PaymentStatus::Pending | PaymentStatus::Overdue | PaymentStatus::Failed
        ) {
            return Err(invalid_transition(
                "payment",
                payment.status.label(),
                "mark_paid",
            ));
        }
        payment.status = PaymentStatus::Paid;
        payment.paid_at = Some(today);
        self.store.update_payment(payment.clone())?;
        Ok(payment)
    }

    /// Record a failed collection attempt reported by the payment provider.
    pub fn mark_payment_failed(
        &self,
        contract_id: &ContractId,
        due_date: NaiveDate,
    ) -> Result<Payment, CoreError> {
        let mut payment = self.payment(contract_id, due_date)?;
        if !matches!(
            payment.status,
            PaymentStatus::Pending | PaymentStatus::Overdue
        ) {
            return Err(invalid_transition(
                "payment",
                payment.status.label(),
                "mark_failed",
            ));
        }
        payment.status = PaymentStatus::Failed;
        self.store.update_payment(payment.clone())?;
        Ok(payment)
    }

    /// Extend the materialized horizon of an active contract. Idempotent:
    /// the store append skips rows already present, so concurrent calls from
    /// a scheduled job and a manual refresh are safe. Returns the number of
    /// rows actually inserted.
    pub fn extend_payment_horizon(&self, contract_id: &ContractId) -> Result<usize, CoreError> {
        let contract = self.contract(contract_id)?;
        match contract.status {
            ContractStatus::Active => {}
            ContractStatus::Paused => {
                return Err(PreconditionFailure::BillingPaused {
                    status: contract.status.label(),
                }
                .into());
            }
            other => {
                return Err(invalid_transition(
                    "contract",
                    other.label(),
                    "extend_horizon",
                ));
            }
        }

        let existing = self.store.payments_for_contract(contract_id)?;
        let from = existing
            .iter()
            .map(|payment| payment.due_date)
            .max()
            .map(|last| last + chrono::Duration::days(1))
            .unwrap_or(contract.terms.start_date);

        let payments =
            schedule::generate_payments(&contract, from, self.config.billing.horizon_periods)?;
        Ok(self.store.append_payments(payments)?)
    }

    /// Batch persistence of the overdue reclassification. An optimization
    /// only: readers must still apply the resolver predicate themselves.
    /// Idempotent and safe to retry wholesale.
    pub fn persist_overdue(&self, today: NaiveDate) -> Result<Outcome<usize>, CoreError> {
        let grace = self.config.billing.grace_period_days;
        let mut advisories = Vec::new();
        let mut flipped = 0;

        for mut payment in self.store.pending_payments()? {
            if !is_overdue(&payment, grace, today) {
                continue;
            }
            payment.status = PaymentStatus::Overdue;
            self.store.update_payment(payment.clone())?;
            flipped += 1;
            self.emit(
                RentalEvent::PaymentOverdue {
                    contract_id: payment.contract_id.clone(),
                    due_date: payment.due_date,
                    amount_cents: payment.amount_cents,
                },
                &mut advisories,
            );
        }

        Ok(Outcome {
            value: flipped,
            advisories,
        })
    }

    /// Emit due-soon reminders for pending payments inside the configured
    /// window. Returns how many reminders fired.
    pub fn dispatch_due_reminders(&self, today: NaiveDate) -> Result<Outcome<usize>, CoreError> {
        let window = i64::from(self.config.billing.due_soon_window_days);
        let grace = self.config.billing.grace_period_days;
        let mut advisories = Vec::new();
        let mut fired = 0;

        for payment in self.store.pending_payments()? {
            if is_overdue(&payment, grace, today) {
                continue;
            }
            let days_until = (payment.due_date - today).num_days();
            if (0..=window).contains(&days_until) {
                fired += 1;
                self.emit(
                    RentalEvent::PaymentDueSoon {
                        contract_id: payment.contract_id.clone(),
                        due_date: payment.due_date,
                        amount_cents: payment.amount_cents,
                    },
                    &mut advisories,
                );
            }
        }

        Ok(Outcome {
            value: fired,
            advisories,
        })
    }

    /// Read-side contract snapshot with the overdue resolver applied to every
    /// row, so a stale Pending row is never shown as on time.
    pub fn contract_statement(
        &self,
        contract_id: &ContractId,
        today: NaiveDate,
    ) -> Result<ContractStatement, CoreError> {
        let contract = self.contract(contract_id)?;
        let grace = self.config.billing.grace_period_days;

        let payments: Vec<PaymentView> = self
            .store
            .payments_for_contract(contract_id)?
            .iter()
            .map(|payment| PaymentView {
                due_date: payment.due_date,
                amount_cents: payment.amount_cents,
                status: effective_status(payment, grace, today),
                paid_at: payment.paid_at,
            })
            .collect();

        let outstanding_cents = payments
            .iter()
            .filter(|payment| {
                matches!(
                    payment.status,
                    PaymentStatus::Pending | PaymentStatus::Overdue | PaymentStatus::Failed
                )
            })
            .map(|payment| payment.amount_cents)
            .sum();

        Ok(ContractStatement {
            contract,
            payments,
            outstanding_cents,
        })
    }
}
