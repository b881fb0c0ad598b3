use super::domain::{ContractStatus, RentalContract, VehicleStatus};

/// Recompute a vehicle's status from its set of non-terminal contracts.
///
/// Called at the end of every contract transition that can affect the vehicle
/// rather than inlining status writes per transition, so the two records
/// cannot drift. An Active or Paused contract keeps the vehicle Assigned (a
/// paused rental still physically holds it); Maintenance and Inactive are
/// operator-set and preserved unless a live claim forces Assigned.
pub fn resolve_vehicle_status(current: VehicleStatus, claims: &[RentalContract]) -> VehicleStatus {
    let held = claims.iter().any(|contract| {
        matches!(
            contract.status,
            ContractStatus::Active | ContractStatus::Paused
        )
    });

    if held {
        VehicleStatus::Assigned
    } else if current == VehicleStatus::Assigned {
        VehicleStatus::Available
    } else {
        current
    }
}
