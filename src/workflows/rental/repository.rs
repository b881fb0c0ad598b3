use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;

use super::domain::{
    ContractId, DocumentId, DriverId, DriverProfile, Payment, PaymentStatus, RentalContract,
    Vehicle, VehicleId, VehicleStatus,
};

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Duplicate,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of the conditional vehicle status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleClaim {
    Granted,
    /// The vehicle was not in the expected status; carries what was found so
    /// the caller can name the failed guard.
    Denied { actual: VehicleStatus },
}

/// Outcome of the guarded contract admission write.
#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionOutcome {
    Admitted(RentalContract),
    /// Another non-terminal contract already claims the vehicle or driver.
    ClaimHeld { holder: ContractId },
}

/// Storage abstraction over the relational store the service runs against.
///
/// Every method models one short serializable transaction. The two conditional
/// writes (`insert_contract_guarded`, `claim_vehicle`) must check and write as
/// a single atomic unit; relational implementations are expected to back them
/// with a unique constraint or conditional UPDATE, never read-then-write.
/// `append_payments` must deduplicate on `(contract_id, due_date)` at the
/// write layer so concurrent horizon extensions stay idempotent.
pub trait RentalStore: Send + Sync {
    fn insert_driver(&self, profile: DriverProfile) -> Result<DriverProfile, RepositoryError>;
    fn fetch_driver(&self, id: &DriverId) -> Result<Option<DriverProfile>, RepositoryError>;
    fn update_driver(&self, profile: DriverProfile) -> Result<(), RepositoryError>;
    fn find_document_owner(&self, id: &DocumentId)
        -> Result<Option<DriverProfile>, RepositoryError>;

    fn insert_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle, RepositoryError>;
    fn fetch_vehicle(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError>;
    fn update_vehicle(&self, vehicle: Vehicle) -> Result<(), RepositoryError>;
    /// Flip the vehicle status only if it currently matches `expected`.
    fn claim_vehicle(
        &self,
        id: &VehicleId,
        expected: VehicleStatus,
        next: VehicleStatus,
    ) -> Result<VehicleClaim, RepositoryError>;

    /// Insert a contract only if neither its driver nor its vehicle already
    /// holds a non-terminal contract.
    fn insert_contract_guarded(
        &self,
        contract: RentalContract,
    ) -> Result<AdmissionOutcome, RepositoryError>;
    fn fetch_contract(&self, id: &ContractId) -> Result<Option<RentalContract>, RepositoryError>;
    fn update_contract(&self, contract: RentalContract) -> Result<(), RepositoryError>;
    fn delete_contract(&self, id: &ContractId) -> Result<(), RepositoryError>;
    fn non_terminal_for_vehicle(
        &self,
        id: &VehicleId,
    ) -> Result<Vec<RentalContract>, RepositoryError>;
    fn non_terminal_for_driver(
        &self,
        id: &DriverId,
    ) -> Result<Vec<RentalContract>, RepositoryError>;

    /// Append payment rows, skipping any `(contract_id, due_date)` already
    /// present. Returns how many rows were actually inserted.
    fn append_payments(&self, rows: Vec<Payment>) -> Result<usize, RepositoryError>;
    fn payments_for_contract(&self, id: &ContractId) -> Result<Vec<Payment>, RepositoryError>;
    fn fetch_payment(
        &self,
        contract_id: &ContractId,
        due_date: NaiveDate,
    ) -> Result<Option<Payment>, RepositoryError>;
    fn update_payment(&self, payment: Payment) -> Result<(), RepositoryError>;
    /// All rows still persisted as Pending, ordered by due date.
    fn pending_payments(&self) -> Result<Vec<Payment>, RepositoryError>;
}

#[derive(Default)]
struct MemoryState {
    drivers: HashMap<DriverId, DriverProfile>,
    vehicles: HashMap<VehicleId, Vehicle>,
    contracts: HashMap<ContractId, RentalContract>,
    payments: BTreeMap<(ContractId, NaiveDate), Payment>,
}

/// Reference implementation of [`RentalStore`] backed by a single mutex, which
/// stands in for the serializable transaction of a relational store. Used by
/// the demo server and the test suite.
#[derive(Default, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

fn non_terminal_holder<'a>(
    contracts: impl Iterator<Item = &'a RentalContract>,
) -> Option<&'a RentalContract> {
    let mut claims: Vec<&RentalContract> = contracts
        .filter(|contract| !contract.status.is_terminal())
        .collect();
    claims.sort_by(|a, b| a.id.cmp(&b.id));
    claims.into_iter().next()
}

impl RentalStore for MemoryStore {
    fn insert_driver(&self, profile: DriverProfile) -> Result<DriverProfile, RepositoryError> {
        let mut state = self.state()?;
        if state.drivers.contains_key(&profile.id) {
            return Err(RepositoryError::Duplicate);
        }
        state.drivers.insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    fn fetch_driver(&self, id: &DriverId) -> Result<Option<DriverProfile>, RepositoryError> {
        Ok(self.state()?.drivers.get(id).cloned())
    }

    fn update_driver(&self, profile: DriverProfile) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if !state.drivers.contains_key(&profile.id) {
            return Err(RepositoryError::NotFound);
        }
        state.drivers.insert(profile.id.clone(), profile);
        Ok(())
    }

    fn find_document_owner(
        &self,
        id: &DocumentId,
    ) -> Result<Option<DriverProfile>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .drivers
            .values()
            .find(|profile| profile.document(id).is_some())
            .cloned())
    }

    fn insert_vehicle(&self, vehicle: Vehicle) -> Result<Vehicle, RepositoryError> {
        let mut state = self.state()?;
        if state.vehicles.contains_key(&vehicle.id) {
            return Err(RepositoryError::Duplicate);
        }
        state.vehicles.insert(vehicle.id.clone(), vehicle.clone());
        Ok(vehicle)
    }

    fn fetch_vehicle(&self, id: &VehicleId) -> Result<Option<Vehicle>, RepositoryError> {
        Ok(self.state()?.vehicles.get(id).cloned())
    }

    fn update_vehicle(&self, vehicle: Vehicle) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if !state.vehicles.contains_key(&vehicle.id) {
            return Err(RepositoryError::NotFound);
        }
        state.vehicles.insert(vehicle.id.clone(), vehicle);
        Ok(())
    }

    fn claim_vehicle(
        &self,
        id: &VehicleId,
        expected: VehicleStatus,
        next: VehicleStatus,
    ) -> Result<VehicleClaim, RepositoryError> {
        let mut state = self.state()?;
        let vehicle = state.vehicles.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if vehicle.status != expected {
            return Ok(VehicleClaim::Denied {
                actual: vehicle.status,
            });
        }
        vehicle.status = next;
        Ok(VehicleClaim::Granted)
    }

    fn insert_contract_guarded(
        &self,
        contract: RentalContract,
    ) -> Result<AdmissionOutcome, RepositoryError> {
        let mut state = self.state()?;
        if state.contracts.contains_key(&contract.id) {
            return Err(RepositoryError::Duplicate);
        }

        let holder = non_terminal_holder(state.contracts.values().filter(|existing| {
            existing.vehicle_id == contract.vehicle_id || existing.driver_id == contract.driver_id
        }));
        if let Some(existing) = holder {
            return Ok(AdmissionOutcome::ClaimHeld {
                holder: existing.id.clone(),
            });
        }

        state
            .contracts
            .insert(contract.id.clone(), contract.clone());
        Ok(AdmissionOutcome::Admitted(contract))
    }

    fn fetch_contract(&self, id: &ContractId) -> Result<Option<RentalContract>, RepositoryError> {
        Ok(self.state()?.contracts.get(id).cloned())
    }

    fn update_contract(&self, contract: RentalContract) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if !state.contracts.contains_key(&contract.id) {
            return Err(RepositoryError::NotFound);
        }
        state.contracts.insert(contract.id.clone(), contract);
        Ok(())
    }

    fn delete_contract(&self, id: &ContractId) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        state
            .contracts
            .remove(id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn non_terminal_for_vehicle(
        &self,
        id: &VehicleId,
    ) -> Result<Vec<RentalContract>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .contracts
            .values()
            .filter(|contract| &contract.vehicle_id == id && !contract.status.is_terminal())
            .cloned()
            .collect())
    }

    fn non_terminal_for_driver(
        &self,
        id: &DriverId,
    ) -> Result<Vec<RentalContract>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .contracts
            .values()
            .filter(|contract| &contract.driver_id == id && !contract.status.is_terminal())
            .cloned()
            .collect())
    }

    fn append_payments(&self, rows: Vec<Payment>) -> Result<usize, RepositoryError> {
        let mut state = self.state()?;
        let mut inserted = 0;
        for payment in rows {
            let key = (payment.contract_id.clone(), payment.due_date);
            if let std::collections::btree_map::Entry::Vacant(slot) = state.payments.entry(key) {
                slot.insert(payment);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn payments_for_contract(&self, id: &ContractId) -> Result<Vec<Payment>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .payments
            .values()
            .filter(|payment| &payment.contract_id == id)
            .cloned()
            .collect())
    }

    fn fetch_payment(
        &self,
        contract_id: &ContractId,
        due_date: NaiveDate,
    ) -> Result<Option<Payment>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .payments
            .get(&(contract_id.clone(), due_date))
            .cloned())
    }

    fn update_payment(&self, payment: Payment) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        let key = (payment.contract_id.clone(), payment.due_date);
        if !state.payments.contains_key(&key) {
            return Err(RepositoryError::NotFound);
        }
        state.payments.insert(key, payment);
        Ok(())
    }

    fn pending_payments(&self) -> Result<Vec<Payment>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .payments
            .values()
            .filter(|payment| payment.status == PaymentStatus::Pending)
            .cloned()
            .collect())
    }
}
