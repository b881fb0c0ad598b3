use std::sync::Arc;

use super::common::{
    approve_required_documents, available_vehicle, build_service, build_service_with, date,
    draft_contract, equal_weights_config, new_driver, operations_config, signature,
    signed_contract, verified_driver, weekly_terms, FailingNotifier,
};
use crate::workflows::rental::domain::{
    ContractStatus, DocumentKind, DocumentStatus, KycDetails, PaymentStatus, VehicleStatus,
    VerificationStatus,
};
use crate::workflows::rental::repository::{MemoryStore, RentalStore, VehicleClaim};
use crate::workflows::rental::schedule::generate_payments;
use crate::workflows::rental::service::{
    Advisory, ContractRequest, CoreError, NewDriver, OperatorVehicleStatus, PreconditionFailure,
    RentalService, VerificationDecision,
};
use crate::workflows::rental::verification::ReviewDecision;

// --- verification -----------------------------------------------------------

#[test]
fn registration_computes_the_initial_completion() {
    let (service, _, _) = build_service();
    let profile = service.register_driver(new_driver()).expect("registered");

    assert_eq!(profile.verification_status, VerificationStatus::Unverified);
    // Complete profile and check-in, no documents yet: 30 + 20.
    assert_eq!(profile.completion_percent, 50);
}

#[test]
fn reupload_supersedes_the_previous_document() {
    let (service, _, _) = build_service();
    let profile = service.register_driver(new_driver()).expect("registered");

    let first = service
        .upload_document(&profile.id, DocumentKind::DriversLicense, date(2024, 1, 2))
        .expect("upload");
    let first_id = first.value.documents[0].id.clone();
    service
        .review_document(&first_id, ReviewDecision::Approved, None)
        .expect("review");

    let second = service
        .upload_document(&profile.id, DocumentKind::DriversLicense, date(2024, 1, 5))
        .expect("upload");
    let documents = &second.value.documents;
    assert_eq!(documents.len(), 2);
    assert!(documents[0].superseded);
    assert!(!documents[1].superseded);
    assert_eq!(documents[1].status, DocumentStatus::Pending);
    // The approved upload no longer counts towards completion.
    assert_eq!(second.value.completion_percent, 50);
}

#[test]
fn reviewing_a_settled_document_is_rejected() {
    let (service, _, _) = build_service();
    let profile = service.register_driver(new_driver()).expect("registered");
    let uploaded = service
        .upload_document(&profile.id, DocumentKind::NationalId, date(2024, 1, 2))
        .expect("upload");
    let document_id = uploaded.value.documents[0].id.clone();

    service
        .review_document(&document_id, ReviewDecision::Approved, None)
        .expect("first review");
    let err = service
        .review_document(&document_id, ReviewDecision::Rejected, None)
        .expect_err("second review");
    assert!(matches!(err, CoreError::InvalidTransition { .. }));
}

#[test]
fn finalize_verified_requires_full_completion() {
    let (service, _, _) = build_service();
    let profile = service
        .register_driver(NewDriver {
            location_checkin: None,
            ..new_driver()
        })
        .expect("registered");
    approve_required_documents(&service, &profile);

    let err = service
        .finalize_verification(&profile.id, VerificationDecision::Verified, None)
        .expect_err("missing check-in");
    assert!(matches!(
        err,
        CoreError::Precondition(PreconditionFailure::CompletionBelowVerified { percent: 80 })
    ));
}

#[test]
fn finalize_verified_succeeds_at_full_completion() {
    let (service, _, notifier) = build_service();
    let driver = verified_driver(&service);

    assert_eq!(driver.verification_status, VerificationStatus::Verified);
    assert_eq!(driver.completion_percent, 100);
    assert!(notifier
        .event_names()
        .contains(&"verification_finalized"));
}

#[test]
fn finalize_is_one_shot() {
    let (service, _, _) = build_service();
    let driver = verified_driver(&service);

    let err = service
        .finalize_verification(&driver.id, VerificationDecision::Rejected, None)
        .expect_err("already verified");
    assert!(matches!(err, CoreError::InvalidTransition { .. }));
}

#[test]
fn resubmission_is_gated_on_the_completion_threshold() {
    let (service, _, _) = build_service();
    let profile = service
        .register_driver(NewDriver {
            full_name: "Thabo Mokoena".to_string(),
            kyc: KycDetails {
                id_number: None,
                street_address: None,
                city: None,
            },
            location_checkin: None,
        })
        .expect("registered");
    service
        .finalize_verification(
            &profile.id,
            VerificationDecision::Rejected,
            Some("documents unreadable".to_string()),
        )
        .expect("rejected");

    let err = service
        .resubmit_verification(&profile.id)
        .expect_err("nothing improved");
    assert!(matches!(
        err,
        CoreError::Precondition(PreconditionFailure::CompletionBelowResubmission {
            percent: 0,
            required: 50,
        })
    ));
}

#[test]
fn resubmission_reenters_review_once_complete_enough() {
    let (service, _, _) = build_service();
    // Complete profile and check-in alone hit exactly the 50% threshold.
    let profile = service.register_driver(new_driver()).expect("registered");
    service
        .finalize_verification(&profile.id, VerificationDecision::Rejected, None)
        .expect("rejected");

    let profile = service
        .resubmit_verification(&profile.id)
        .expect("resubmitted");
    assert_eq!(profile.verification_status, VerificationStatus::InReview);
}

#[test]
fn misconfigured_weights_surface_as_an_advisory() {
    let (service, _, _) = build_service_with(equal_weights_config());
    let profile = service.register_driver(new_driver()).expect("registered");

    let outcome = service
        .upload_document(&profile.id, DocumentKind::NationalId, date(2024, 1, 2))
        .expect("upload");
    assert!(outcome
        .advisories
        .contains(&Advisory::WeightsMisconfigured { total: 75 }));
}

#[test]
fn notification_failure_does_not_roll_back_the_review() {
    let store = Arc::new(MemoryStore::default());
    let service = RentalService::new(store, Arc::new(FailingNotifier), operations_config());

    let profile = service.register_driver(new_driver()).expect("registered");
    let uploaded = service
        .upload_document(&profile.id, DocumentKind::NationalId, date(2024, 1, 2))
        .expect("upload");
    let document_id = uploaded.value.documents[0].id.clone();

    let outcome = service
        .review_document(&document_id, ReviewDecision::Approved, None)
        .expect("review still succeeds");
    assert_eq!(
        outcome.value.document(&document_id).expect("stored").status,
        DocumentStatus::Approved
    );
    assert!(outcome.advisories.iter().any(|advisory| matches!(
        advisory,
        Advisory::NotificationFailed {
            event: "document_approved",
            ..
        }
    )));
}

// --- admission and lifecycle ------------------------------------------------

#[test]
fn admission_requires_a_verified_driver() {
    let (service, _, _) = build_service();
    let profile = service.register_driver(new_driver()).expect("registered");
    let vehicle = available_vehicle(&service);

    let err = service
        .create_contract(ContractRequest {
            driver_id: profile.id,
            vehicle_id: vehicle.id,
            terms: weekly_terms(),
        })
        .expect_err("driver unverified");
    assert!(matches!(
        err,
        CoreError::Precondition(PreconditionFailure::DriverNotVerified { .. })
    ));
}

#[test]
fn admission_requires_an_available_vehicle() {
    let (service, _, _) = build_service();
    let driver = verified_driver(&service);
    let vehicle = available_vehicle(&service);
    service
        .set_vehicle_status(&vehicle.id, OperatorVehicleStatus::Maintenance)
        .expect("status set");

    let err = service
        .create_contract(ContractRequest {
            driver_id: driver.id,
            vehicle_id: vehicle.id,
            terms: weekly_terms(),
        })
        .expect_err("vehicle in maintenance");
    assert!(matches!(
        err,
        CoreError::Precondition(PreconditionFailure::VehicleNotAvailable { .. })
    ));
}

#[test]
fn a_vehicle_carries_at_most_one_live_contract() {
    let (service, _, _) = build_service();
    let first_driver = verified_driver(&service);
    let second_driver = verified_driver(&service);
    let vehicle = available_vehicle(&service);

    service
        .create_contract(ContractRequest {
            driver_id: first_driver.id,
            vehicle_id: vehicle.id.clone(),
            terms: weekly_terms(),
        })
        .expect("first admission");

    let err = service
        .create_contract(ContractRequest {
            driver_id: second_driver.id,
            vehicle_id: vehicle.id,
            terms: weekly_terms(),
        })
        .expect_err("vehicle already claimed");
    assert!(matches!(err, CoreError::Conflict { .. }));
}

#[test]
fn a_driver_carries_at_most_one_live_contract() {
    let (service, _, _) = build_service();
    let driver = verified_driver(&service);
    let first_vehicle = available_vehicle(&service);
    let second_vehicle = available_vehicle(&service);

    service
        .create_contract(ContractRequest {
            driver_id: driver.id.clone(),
            vehicle_id: first_vehicle.id,
            terms: weekly_terms(),
        })
        .expect("first admission");

    let err = service
        .create_contract(ContractRequest {
            driver_id: driver.id,
            vehicle_id: second_vehicle.id,
            terms: weekly_terms(),
        })
        .expect_err("driver already contracted");
    assert!(matches!(err, CoreError::Conflict { .. }));
}

#[test]
fn signing_requires_both_acceptance_flags() {
    let (service, _, _) = build_service();
    let contract = draft_contract(&service);
    service.send_contract(&contract.id).expect("sent");

    let mut payload = signature();
    payload.accepted_debit_order = false;
    let err = service
        .driver_sign(&contract.id, &payload, date(2024, 1, 2))
        .expect_err("debit order not accepted");
    assert!(matches!(
        err,
        CoreError::Precondition(PreconditionFailure::AcceptanceNotConfirmed { flag: "debit order" })
    ));

    let mut payload = signature();
    payload.signed_name = "  ".to_string();
    let err = service
        .driver_sign(&contract.id, &payload, date(2024, 1, 2))
        .expect_err("blank signature");
    assert!(matches!(
        err,
        CoreError::Precondition(PreconditionFailure::SignatureMissing)
    ));
}

#[test]
fn activation_claims_the_vehicle_and_materializes_the_schedule() {
    let (service, store, notifier) = build_service();
    let contract = signed_contract(&service);

    let outcome = service.activate_contract(&contract.id).expect("activated");
    assert_eq!(outcome.value.status, ContractStatus::Active);

    let vehicle = store
        .fetch_vehicle(&contract.vehicle_id)
        .expect("store read")
        .expect("vehicle exists");
    assert_eq!(vehicle.status, VehicleStatus::Assigned);

    let payments = store
        .payments_for_contract(&contract.id)
        .expect("store read");
    assert_eq!(payments.len(), 12);
    // Start Wednesday 2024-01-03, due Mondays.
    assert_eq!(payments[0].due_date, date(2024, 1, 8));
    assert_eq!(payments[11].due_date, date(2024, 3, 25));

    assert!(notifier.event_names().contains(&"contract_activated"));
}

#[test]
fn activation_loses_the_race_for_a_reassigned_vehicle() {
    let (service, store, _) = build_service();
    let contract = signed_contract(&service);

    // Another writer claims the vehicle between signature and activation.
    let claim = store
        .claim_vehicle(
            &contract.vehicle_id,
            VehicleStatus::Available,
            VehicleStatus::Assigned,
        )
        .expect("store write");
    assert_eq!(claim, VehicleClaim::Granted);

    let err = service
        .activate_contract(&contract.id)
        .expect_err("vehicle gone");
    assert!(matches!(
        err,
        CoreError::Precondition(PreconditionFailure::VehicleNotAvailable { .. })
    ));

    let stored = store
        .fetch_contract(&contract.id)
        .expect("store read")
        .expect("contract exists");
    assert_eq!(stored.status, ContractStatus::SignedByDriver);
    assert!(store
        .payments_for_contract(&contract.id)
        .expect("store read")
        .is_empty());
}

#[test]
fn suspension_keeps_the_vehicle_assigned() {
    let (service, store, _) = build_service();
    let contract = signed_contract(&service);
    service.activate_contract(&contract.id).expect("activated");

    let paused = service.suspend_contract(&contract.id).expect("suspended");
    assert_eq!(paused.status, ContractStatus::Paused);
    let vehicle = store
        .fetch_vehicle(&contract.vehicle_id)
        .expect("store read")
        .expect("vehicle exists");
    assert_eq!(vehicle.status, VehicleStatus::Assigned);

    let resumed = service.resume_contract(&contract.id).expect("resumed");
    assert_eq!(resumed.status, ContractStatus::Active);
}

#[test]
fn ending_releases_the_vehicle() {
    let (service, store, _) = build_service();
    let contract = signed_contract(&service);
    service.activate_contract(&contract.id).expect("activated");

    let ended = service
        .end_contract(&contract.id, date(2024, 3, 1))
        .expect("ended");
    assert_eq!(ended.status, ContractStatus::Ended);
    assert_eq!(ended.terms.end_date, Some(date(2024, 3, 1)));

    let vehicle = store
        .fetch_vehicle(&contract.vehicle_id)
        .expect("store read")
        .expect("vehicle exists");
    assert_eq!(vehicle.status, VehicleStatus::Available);
}

#[test]
fn operator_status_change_is_refused_while_claimed() {
    let (service, _, _) = build_service();
    let contract = signed_contract(&service);
    service.activate_contract(&contract.id).expect("activated");

    let err = service
        .set_vehicle_status(&contract.vehicle_id, OperatorVehicleStatus::Maintenance)
        .expect_err("contract still live");
    assert!(matches!(
        err,
        CoreError::Precondition(PreconditionFailure::VehicleStillClaimed { .. })
    ));

    service
        .end_contract(&contract.id, date(2024, 3, 1))
        .expect("ended");
    let vehicle = service
        .set_vehicle_status(&contract.vehicle_id, OperatorVehicleStatus::Maintenance)
        .expect("now allowed");
    assert_eq!(vehicle.status, VehicleStatus::Maintenance);
}

#[test]
fn only_drafts_can_be_deleted() {
    let (service, store, _) = build_service();
    let contract = draft_contract(&service);
    service.send_contract(&contract.id).expect("sent");

    let err = service
        .delete_draft_contract(&contract.id)
        .expect_err("no longer a draft");
    assert!(matches!(err, CoreError::InvalidTransition { .. }));

    let draft = draft_contract(&service);
    service
        .delete_draft_contract(&draft.id)
        .expect("draft removed");
    assert!(store
        .fetch_contract(&draft.id)
        .expect("store read")
        .is_none());
}

// --- payments ---------------------------------------------------------------

#[test]
fn payment_settlement_transitions() {
    let (service, _, _) = build_service();
    let contract = signed_contract(&service);
    service.activate_contract(&contract.id).expect("activated");
    let due = date(2024, 1, 8);

    let paid = service
        .mark_payment_paid(&contract.id, due, date(2024, 1, 8))
        .expect("settled");
    assert_eq!(paid.status, PaymentStatus::Paid);
    assert_eq!(paid.paid_at, Some(date(2024, 1, 8)));

    let err = service
        .mark_payment_paid(&contract.id, due, date(2024, 1, 9))
        .expect_err("already paid");
    assert!(matches!(err, CoreError::InvalidTransition { .. }));
    let err = service
        .mark_payment_failed(&contract.id, due)
        .expect_err("already paid");
    assert!(matches!(err, CoreError::InvalidTransition { .. }));

    // A failed collection can still be settled later.
    let next_due = date(2024, 1, 15);
    service
        .mark_payment_failed(&contract.id, next_due)
        .expect("collection failed");
    let recovered = service
        .mark_payment_paid(&contract.id, next_due, date(2024, 1, 20))
        .expect("settled after failure");
    assert_eq!(recovered.status, PaymentStatus::Paid);
}

#[test]
fn horizon_extension_appends_after_the_last_row() {
    let (service, store, _) = build_service();
    let contract = signed_contract(&service);
    service.activate_contract(&contract.id).expect("activated");

    let inserted = service
        .extend_payment_horizon(&contract.id)
        .expect("extended");
    assert_eq!(inserted, 12);

    let payments = store
        .payments_for_contract(&contract.id)
        .expect("store read");
    assert_eq!(payments.len(), 24);
    let mut dates: Vec<_> = payments.iter().map(|payment| payment.due_date).collect();
    dates.dedup();
    assert_eq!(dates.len(), 24);
    assert_eq!(payments[12].due_date, date(2024, 4, 1));
}

#[test]
fn horizon_extension_respects_contract_state() {
    let (service, _, _) = build_service();
    let contract = signed_contract(&service);

    let err = service
        .extend_payment_horizon(&contract.id)
        .expect_err("not active yet");
    assert!(matches!(err, CoreError::InvalidTransition { .. }));

    service.activate_contract(&contract.id).expect("activated");
    service.suspend_contract(&contract.id).expect("suspended");
    let err = service
        .extend_payment_horizon(&contract.id)
        .expect_err("billing paused");
    assert!(matches!(
        err,
        CoreError::Precondition(PreconditionFailure::BillingPaused { status: "paused" })
    ));
}

#[test]
fn duplicate_schedule_rows_are_dropped_at_the_store() {
    let (service, store, _) = build_service();
    let contract = signed_contract(&service);
    service.activate_contract(&contract.id).expect("activated");

    let stored = store
        .fetch_contract(&contract.id)
        .expect("store read")
        .expect("contract exists");
    let rows = generate_payments(&stored, stored.terms.start_date, 12).expect("valid terms");

    // Replaying the exact activation batch inserts nothing.
    let inserted = store.append_payments(rows).expect("store write");
    assert_eq!(inserted, 0);
    assert_eq!(
        store
            .payments_for_contract(&contract.id)
            .expect("store read")
            .len(),
        12
    );
}

#[test]
fn overdue_sweep_is_idempotent() {
    let (service, store, notifier) = build_service();
    let contract = signed_contract(&service);
    service.activate_contract(&contract.id).expect("activated");

    // Grace is 3 days: only the 2024-01-08 row is past 2024-01-11.
    let outcome = service.persist_overdue(date(2024, 1, 15)).expect("swept");
    assert_eq!(outcome.value, 1);
    let row = store
        .fetch_payment(&contract.id, date(2024, 1, 8))
        .expect("store read")
        .expect("row exists");
    assert_eq!(row.status, PaymentStatus::Overdue);

    let outcome = service.persist_overdue(date(2024, 1, 15)).expect("swept");
    assert_eq!(outcome.value, 0);
    let overdue_events = notifier
        .event_names()
        .into_iter()
        .filter(|name| *name == "payment_overdue")
        .count();
    assert_eq!(overdue_events, 1);
}

#[test]
fn reminders_fire_only_inside_the_window() {
    let (service, _, notifier) = build_service();
    let contract = signed_contract(&service);
    service.activate_contract(&contract.id).expect("activated");

    // 2024-01-13: the 01-15 row is due in 2 days; 01-08 is already late and
    // 01-22 is beyond the 3-day window.
    let outcome = service
        .dispatch_due_reminders(date(2024, 1, 13))
        .expect("dispatched");
    assert_eq!(outcome.value, 1);
    assert!(notifier.event_names().contains(&"payment_due_soon"));
}

#[test]
fn statement_applies_the_resolver_and_sums_outstanding() {
    let (service, _, _) = build_service();
    let contract = signed_contract(&service);
    service.activate_contract(&contract.id).expect("activated");
    service
        .mark_payment_paid(&contract.id, date(2024, 1, 8), date(2024, 1, 8))
        .expect("settled");

    let statement = service
        .contract_statement(&contract.id, date(2024, 1, 20))
        .expect("statement");
    assert_eq!(statement.payments.len(), 12);
    assert_eq!(statement.payments[0].status, PaymentStatus::Paid);
    // Stored as Pending, but 2024-01-15 + 3 days grace has passed.
    assert_eq!(statement.payments[1].status, PaymentStatus::Overdue);
    assert_eq!(statement.payments[2].status, PaymentStatus::Pending);
    assert_eq!(statement.outstanding_cents, 11 * 50_000);
}

// --- randomized uniqueness --------------------------------------------------

/// Linear congruential generator, good enough to shuffle operations without
/// pulling in a dependency for one test.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn pick(&mut self, bound: usize) -> usize {
        (self.next() % bound as u64) as usize
    }
}

#[test]
fn random_operation_storms_never_double_book() {
    let (service, store, _) = build_service();
    let drivers: Vec<_> = (0..3).map(|_| verified_driver(&service).id).collect();
    let vehicles: Vec<_> = (0..3).map(|_| available_vehicle(&service).id).collect();
    let mut contracts = Vec::new();
    let mut rng = Lcg(0x5eed_cafe);

    for _ in 0..400 {
        match rng.pick(9) {
            0 => {
                let request = ContractRequest {
                    driver_id: drivers[rng.pick(drivers.len())].clone(),
                    vehicle_id: vehicles[rng.pick(vehicles.len())].clone(),
                    terms: weekly_terms(),
                };
                if let Ok(contract) = service.create_contract(request) {
                    contracts.push(contract.id);
                }
            }
            1 if !contracts.is_empty() => {
                let id = &contracts[rng.pick(contracts.len())];
                let _ = service.send_contract(id);
            }
            2 if !contracts.is_empty() => {
                let id = &contracts[rng.pick(contracts.len())];
                let _ = service.driver_sign(id, &signature(), date(2024, 1, 2));
            }
            3 if !contracts.is_empty() => {
                let id = &contracts[rng.pick(contracts.len())];
                let _ = service.activate_contract(id);
            }
            4 if !contracts.is_empty() => {
                let id = &contracts[rng.pick(contracts.len())];
                let _ = service.reject_contract(id);
            }
            5 if !contracts.is_empty() => {
                let id = &contracts[rng.pick(contracts.len())];
                let _ = service.suspend_contract(id);
            }
            6 if !contracts.is_empty() => {
                let id = &contracts[rng.pick(contracts.len())];
                let _ = service.resume_contract(id);
            }
            7 if !contracts.is_empty() => {
                let id = &contracts[rng.pick(contracts.len())];
                let _ = service.end_contract(id, date(2024, 2, 1));
            }
            8 if !contracts.is_empty() => {
                let index = rng.pick(contracts.len());
                if service.delete_draft_contract(&contracts[index]).is_ok() {
                    contracts.remove(index);
                }
            }
            _ => {}
        }

        for vehicle_id in &vehicles {
            let claims = store
                .non_terminal_for_vehicle(vehicle_id)
                .expect("store read");
            assert!(claims.len() <= 1, "vehicle {vehicle_id:?} double-booked");
            let vehicle = store
                .fetch_vehicle(vehicle_id)
                .expect("store read")
                .expect("vehicle exists");
            let live = claims.iter().any(|contract| {
                matches!(
                    contract.status,
                    ContractStatus::Active | ContractStatus::Paused
                )
            });
            if live {
                assert_eq!(vehicle.status, VehicleStatus::Assigned);
            }
        }
        for driver_id in &drivers {
            let claims = store
                .non_terminal_for_driver(driver_id)
                .expect("store read");
            assert!(claims.len() <= 1, "driver {driver_id:?} double-booked");
        }
    }
}
