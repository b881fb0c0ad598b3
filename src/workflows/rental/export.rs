use std::io::Write;

use chrono::NaiveDate;
use serde::Serialize;

use super::service::ContractStatement;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv serialization failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv flush failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv output was not valid utf-8")]
    Encoding,
}

#[derive(Debug, Serialize)]
struct StatementRow<'a> {
    contract_id: &'a str,
    due_date: NaiveDate,
    amount_cents: i64,
    status: &'static str,
    paid_at: Option<NaiveDate>,
}

/// Write the payment rows of a statement as CSV. The statement already has the
/// overdue resolver applied, so exported statuses match what the API shows.
pub fn write_statement_csv<W: Write>(
    statement: &ContractStatement,
    writer: W,
) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(writer);
    for payment in &statement.payments {
        writer.serialize(StatementRow {
            contract_id: &statement.contract.id.0,
            due_date: payment.due_date,
            amount_cents: payment.amount_cents,
            status: payment.status.label(),
            paid_at: payment.paid_at,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn statement_csv_string(statement: &ContractStatement) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_statement_csv(statement, &mut buffer)?;
    String::from_utf8(buffer).map_err(|_| ExportError::Encoding)
}
