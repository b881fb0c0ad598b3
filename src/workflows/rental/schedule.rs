use chrono::{Datelike, Duration, NaiveDate};

use super::domain::{BillingFrequency, ContractTerms, Payment, PaymentStatus, RentalContract};

/// Malformed contract terms rejected before any schedule math runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationIssue {
    #[error("fee amount must be a positive number of cents, got {0}")]
    NonPositiveFee(i64),
    #[error("due weekday must be 0-6 (0 = Sunday), got {0}")]
    DueWeekdayOutOfRange(u8),
    #[error("due day of month must be 1-31, got {0}")]
    DueDayOfMonthOutOfRange(u8),
    #[error("{frequency} billing requires {field} to be set")]
    MissingFrequencyField {
        frequency: &'static str,
        field: &'static str,
    },
    #[error("end date {end} precedes start date {start}")]
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

/// Validate contract terms against the schedule rules.
pub fn validate_terms(terms: &ContractTerms) -> Result<(), ValidationIssue> {
    if terms.fee_amount_cents <= 0 {
        return Err(ValidationIssue::NonPositiveFee(terms.fee_amount_cents));
    }

    if let Some(end) = terms.end_date {
        if end < terms.start_date {
            return Err(ValidationIssue::EndBeforeStart {
                start: terms.start_date,
                end,
            });
        }
    }

    match terms.frequency {
        BillingFrequency::Daily => {}
        BillingFrequency::Weekly => match terms.due_weekday {
            None => {
                return Err(ValidationIssue::MissingFrequencyField {
                    frequency: "weekly",
                    field: "due_weekday",
                })
            }
            Some(weekday) if weekday > 6 => {
                return Err(ValidationIssue::DueWeekdayOutOfRange(weekday))
            }
            Some(_) => {}
        },
        BillingFrequency::Monthly => match terms.due_day_of_month {
            None => {
                return Err(ValidationIssue::MissingFrequencyField {
                    frequency: "monthly",
                    field: "due_day_of_month",
                })
            }
            Some(day) if day == 0 || day > 31 => {
                return Err(ValidationIssue::DueDayOfMonthOutOfRange(day))
            }
            Some(_) => {}
        },
    }

    Ok(())
}

fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .expect("first of month is always a valid date")
}

/// Due date for a given month, clamping `day` to the month's length.
///
/// Clamping is recomputed from the configured day each month, so a
/// day-of-month of 31 yields Feb 28/29 and then Mar 31 again.
fn month_due_date(year: i32, month: u32, day: u8) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day as u32)
        .unwrap_or_else(|| last_day_of_month(year, month))
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Produce the next `max_periods` due dates for the given terms, starting no
/// earlier than `from` (horizon extension passes the day after the last
/// generated row) and never before the contract start date.
pub fn due_dates(
    terms: &ContractTerms,
    from: NaiveDate,
    max_periods: usize,
) -> Result<Vec<NaiveDate>, ValidationIssue> {
    validate_terms(terms)?;

    let floor = from.max(terms.start_date);
    let within_end = |date: NaiveDate| match terms.end_date {
        Some(end) => date <= end,
        None => true,
    };

    let mut dates = Vec::with_capacity(max_periods);

    match terms.frequency {
        BillingFrequency::Daily => {
            let mut cursor = floor;
            while dates.len() < max_periods && within_end(cursor) {
                dates.push(cursor);
                cursor += Duration::days(1);
            }
        }
        BillingFrequency::Weekly => {
            let target = i64::from(terms.due_weekday.unwrap_or_default());
            let current = i64::from(floor.weekday().num_days_from_sunday());
            let mut cursor = floor + Duration::days((target - current).rem_euclid(7));
            while dates.len() < max_periods && within_end(cursor) {
                dates.push(cursor);
                cursor += Duration::days(7);
            }
        }
        BillingFrequency::Monthly => {
            let day = terms.due_day_of_month.unwrap_or_default();
            let (mut year, mut month) = (floor.year(), floor.month());
            let mut cursor = month_due_date(year, month, day);
            if cursor < floor {
                (year, month) = next_month(year, month);
                cursor = month_due_date(year, month, day);
            }
            while dates.len() < max_periods && within_end(cursor) {
                dates.push(cursor);
                (year, month) = next_month(year, month);
                cursor = month_due_date(year, month, day);
            }
        }
    }

    Ok(dates)
}

/// Materialize pending payment rows for a contract over the given window.
///
/// Pure with respect to storage; idempotency is enforced where the rows are
/// written, by deduplicating on `(contract_id, due_date)`.
pub fn generate_payments(
    contract: &RentalContract,
    from: NaiveDate,
    max_periods: usize,
) -> Result<Vec<Payment>, ValidationIssue> {
    let dates = due_dates(&contract.terms, from, max_periods)?;
    Ok(dates
        .into_iter()
        .map(|due_date| Payment {
            contract_id: contract.id.clone(),
            due_date,
            amount_cents: contract.terms.fee_amount_cents,
            status: PaymentStatus::Pending,
            paid_at: None,
        })
        .collect())
}
