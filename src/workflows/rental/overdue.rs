use chrono::{Duration, NaiveDate};

use super::domain::{Payment, PaymentStatus};

/// Read-time predicate: a stored Pending row is overdue once `today` passes
/// its due date plus the grace period. Callers must apply this even when the
/// persisted status still says Pending; the batch flip in the service is an
/// optimization, not a correctness requirement.
pub fn is_overdue(payment: &Payment, grace_period_days: u32, today: NaiveDate) -> bool {
    payment.status == PaymentStatus::Pending
        && today > payment.due_date + Duration::days(i64::from(grace_period_days))
}

/// Status the payment should be displayed with, without mutating stored state.
pub fn effective_status(
    payment: &Payment,
    grace_period_days: u32,
    today: NaiveDate,
) -> PaymentStatus {
    if is_overdue(payment, grace_period_days, today) {
        PaymentStatus::Overdue
    } else {
        payment.status
    }
}
