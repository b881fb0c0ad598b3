use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for driver profiles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DriverId(pub String);

/// Identifier wrapper for fleet vehicles.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub String);

/// Identifier wrapper for rental contracts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractId(pub String);

/// Identifier wrapper for uploaded verification documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(pub String);

/// Lifecycle of a driver's identity verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Unverified,
    InReview,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::InReview => "in_review",
            Self::Verified => "verified",
            Self::Rejected => "rejected",
        }
    }
}

/// Kinds of documents an operator may require before verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    DriversLicense,
    NationalId,
    ProofOfAddress,
    ProofOfIncome,
    ProfilePhoto,
}

impl DocumentKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::DriversLicense => "drivers_license",
            Self::NationalId => "national_id",
            Self::ProofOfAddress => "proof_of_address",
            Self::ProofOfIncome => "proof_of_income",
            Self::ProfilePhoto => "profile_photo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

impl DocumentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// A single uploaded document. Approved documents are never edited in place; a
/// re-upload creates a fresh pending document and marks the old one superseded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub kind: DocumentKind,
    pub status: DocumentStatus,
    pub review_note: Option<String>,
    pub uploaded_on: NaiveDate,
    pub superseded: bool,
}

/// KYC fields collected on the driver profile form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycDetails {
    pub id_number: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
}

impl KycDetails {
    pub fn is_complete(&self) -> bool {
        let filled = |field: &Option<String>| {
            field
                .as_deref()
                .map(|value| !value.trim().is_empty())
                .unwrap_or(false)
        };
        filled(&self.id_number) && filled(&self.street_address) && filled(&self.city)
    }
}

/// Driver account plus everything the verification engine tracks about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverProfile {
    pub id: DriverId,
    pub full_name: String,
    pub kyc: KycDetails,
    pub verification_status: VerificationStatus,
    pub completion_percent: u8,
    pub verification_note: Option<String>,
    pub documents: Vec<Document>,
    pub location_checkin: Option<NaiveDate>,
}

impl DriverProfile {
    /// Latest non-superseded document of the given kind, if any.
    pub fn current_document(&self, kind: DocumentKind) -> Option<&Document> {
        self.documents
            .iter()
            .rev()
            .find(|document| document.kind == kind && !document.superseded)
    }

    pub fn document(&self, id: &DocumentId) -> Option<&Document> {
        self.documents.iter().find(|document| &document.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    Assigned,
    Maintenance,
    Inactive,
}

impl VehicleStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Assigned => "assigned",
            Self::Maintenance => "maintenance",
            Self::Inactive => "inactive",
        }
    }
}

/// Fleet vehicle record. Compliance expiry dates are informational only and do
/// not gate the contract lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub registration: String,
    pub status: VehicleStatus,
    pub license_expiry: Option<NaiveDate>,
    pub insurance_expiry: Option<NaiveDate>,
    pub roadworthy_expiry: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl BillingFrequency {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

/// Commercial terms of a rental contract.
///
/// `due_weekday` uses 0-6 with 0 = Sunday and applies to weekly billing;
/// `due_day_of_month` is 1-31 and applies to monthly billing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractTerms {
    pub fee_amount_cents: i64,
    pub frequency: BillingFrequency,
    pub due_weekday: Option<u8>,
    pub due_day_of_month: Option<u8>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Draft,
    SentToDriver,
    SignedByDriver,
    Active,
    Paused,
    Ended,
    Cancelled,
    Expired,
}

impl ContractStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::SentToDriver => "sent_to_driver",
            Self::SignedByDriver => "signed_by_driver",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Ended => "ended",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Terminal contracts release their claim on the driver and vehicle.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled | Self::Expired)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentalContract {
    pub id: ContractId,
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    pub terms: ContractTerms,
    pub status: ContractStatus,
    pub driver_signed_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Overdue,
    Failed,
}

impl PaymentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Failed => "failed",
        }
    }
}

/// One billing period of a contract. Identity is `(contract_id, due_date)`;
/// rows are appended by the schedule generator and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub contract_id: ContractId,
    pub due_date: NaiveDate,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub paid_at: Option<NaiveDate>,
}

/// Signature payload a driver submits when countersigning a sent contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePayload {
    pub signed_name: String,
    pub accepted_terms: bool,
    pub accepted_debit_order: bool,
}
