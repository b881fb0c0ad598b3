use std::sync::{Arc, Mutex};

use chrono::NaiveDate;

use crate::workflows::rental::domain::{
    ContractTerms, DriverProfile, KycDetails, RentalContract, SignaturePayload, Vehicle,
};
use crate::workflows::rental::events::{NotificationPublisher, NotifyError, RentalEvent};
use crate::workflows::rental::repository::MemoryStore;
use crate::workflows::rental::service::{
    BillingConfig, ContractRequest, NewDriver, NewVehicle, OperationsConfig, RentalService,
    VerificationDecision,
};
use crate::workflows::rental::verification::{
    ReviewDecision, VerificationConfig, VerificationWeights,
};
use crate::workflows::rental::BillingFrequency;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn operations_config() -> OperationsConfig {
    OperationsConfig {
        verification: VerificationConfig::default(),
        billing: BillingConfig {
            grace_period_days: 3,
            horizon_periods: 12,
            due_soon_window_days: 3,
        },
    }
}

/// Three equally weighted buckets that do not sum to 100, exercising the
/// normalization and the misconfiguration advisory.
pub(super) fn equal_weights_config() -> OperationsConfig {
    let mut config = operations_config();
    config.verification.weights = VerificationWeights {
        profile_fields: 25,
        required_documents: 25,
        location_checkin: 25,
    };
    config
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<RentalEvent>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<RentalEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn event_names(&self) -> Vec<&'static str> {
        self.events().iter().map(RentalEvent::name).collect()
    }
}

impl NotificationPublisher for MemoryNotifier {
    fn publish(&self, event: RentalEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        Ok(())
    }
}

/// Publisher whose transport is permanently down.
pub(super) struct FailingNotifier;

impl NotificationPublisher for FailingNotifier {
    fn publish(&self, _event: RentalEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) type TestService = RentalService<MemoryStore, MemoryNotifier>;

pub(super) fn build_service() -> (TestService, Arc<MemoryStore>, Arc<MemoryNotifier>) {
    build_service_with(operations_config())
}

pub(super) fn build_service_with(
    config: OperationsConfig,
) -> (TestService, Arc<MemoryStore>, Arc<MemoryNotifier>) {
    let store = Arc::new(MemoryStore::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = RentalService::new(store.clone(), notifier.clone(), config);
    (service, store, notifier)
}

pub(super) fn complete_kyc() -> KycDetails {
    KycDetails {
        id_number: Some("8209155012089".to_string()),
        street_address: Some("14 Marine Drive".to_string()),
        city: Some("Gqeberha".to_string()),
    }
}

pub(super) fn new_driver() -> NewDriver {
    NewDriver {
        full_name: "Sipho Dlamini".to_string(),
        kyc: complete_kyc(),
        location_checkin: Some(date(2023, 12, 20)),
    }
}

pub(super) fn new_vehicle() -> NewVehicle {
    NewVehicle {
        registration: "JDX 441 EC".to_string(),
        license_expiry: Some(date(2025, 6, 30)),
        insurance_expiry: Some(date(2025, 3, 31)),
        roadworthy_expiry: Some(date(2024, 12, 31)),
    }
}

/// Upload and approve every required document for the driver.
pub(super) fn approve_required_documents(service: &TestService, profile: &DriverProfile) {
    let required = service.config().verification.required_documents.clone();
    for kind in required {
        let uploaded = service
            .upload_document(&profile.id, kind, date(2023, 12, 21))
            .expect("upload succeeds");
        let document_id = uploaded
            .value
            .documents
            .last()
            .expect("document stored")
            .id
            .clone();
        service
            .review_document(&document_id, ReviewDecision::Approved, None)
            .expect("review succeeds");
    }
}

/// Register a driver, complete every bucket, and finalize as Verified.
pub(super) fn verified_driver(service: &TestService) -> DriverProfile {
    let profile = service
        .register_driver(new_driver())
        .expect("driver registered");
    approve_required_documents(service, &profile);
    service
        .finalize_verification(&profile.id, VerificationDecision::Verified, None)
        .expect("finalize succeeds")
        .value
}

pub(super) fn available_vehicle(service: &TestService) -> Vehicle {
    service
        .register_vehicle(new_vehicle())
        .expect("vehicle registered")
}

/// Weekly terms from the end-to-end scenario: 50 000 cents, due Mondays,
/// starting Wednesday 2024-01-03.
pub(super) fn weekly_terms() -> ContractTerms {
    ContractTerms {
        fee_amount_cents: 50_000,
        frequency: BillingFrequency::Weekly,
        due_weekday: Some(1),
        due_day_of_month: None,
        start_date: date(2024, 1, 3),
        end_date: None,
    }
}

pub(super) fn monthly_terms(due_day_of_month: u8, start: NaiveDate) -> ContractTerms {
    ContractTerms {
        fee_amount_cents: 120_000,
        frequency: BillingFrequency::Monthly,
        due_weekday: None,
        due_day_of_month: Some(due_day_of_month),
        start_date: start,
        end_date: None,
    }
}

pub(super) fn signature() -> SignaturePayload {
    SignaturePayload {
        signed_name: "Sipho Dlamini".to_string(),
        accepted_terms: true,
        accepted_debit_order: true,
    }
}

pub(super) fn draft_contract(service: &TestService) -> RentalContract {
    let driver = verified_driver(service);
    let vehicle = available_vehicle(service);
    service
        .create_contract(ContractRequest {
            driver_id: driver.id,
            vehicle_id: vehicle.id,
            terms: weekly_terms(),
        })
        .expect("admission succeeds")
}

/// Draft taken through send and driver signature, ready to activate.
pub(super) fn signed_contract(service: &TestService) -> RentalContract {
    let contract = draft_contract(service);
    service
        .send_contract(&contract.id)
        .expect("send succeeds");
    service
        .driver_sign(&contract.id, &signature(), date(2024, 1, 2))
        .expect("sign succeeds")
}
