use serde::{Deserialize, Serialize};

use super::domain::{DocumentKind, DocumentStatus, DriverProfile};

/// Operator-configured weights for the three completion buckets. Expected to
/// sum to 100; when they do not, the engine normalizes over the actual total
/// and surfaces the inconsistency as an advisory rather than failing reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationWeights {
    pub profile_fields: u8,
    pub required_documents: u8,
    pub location_checkin: u8,
}

impl VerificationWeights {
    pub fn total(&self) -> u16 {
        self.profile_fields as u16 + self.required_documents as u16 + self.location_checkin as u16
    }

    pub fn is_consistent(&self) -> bool {
        self.total() == 100
    }
}

impl Default for VerificationWeights {
    fn default() -> Self {
        Self {
            profile_fields: 30,
            required_documents: 50,
            location_checkin: 20,
        }
    }
}

/// Verification knobs consumed (not owned) by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    pub weights: VerificationWeights,
    pub required_documents: Vec<DocumentKind>,
    /// Minimum completion percent before a rejected driver may resubmit.
    pub resubmission_threshold_percent: u8,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            weights: VerificationWeights::default(),
            required_documents: vec![
                DocumentKind::DriversLicense,
                DocumentKind::NationalId,
                DocumentKind::ProofOfAddress,
                DocumentKind::ProofOfIncome,
            ],
            resubmission_threshold_percent: 50,
        }
    }
}

/// Buckets contributing to the completion percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionBucket {
    ProfileFields,
    RequiredDocuments,
    LocationCheckin,
}

impl CompletionBucket {
    pub const fn label(self) -> &'static str {
        match self {
            Self::ProfileFields => "profile_fields",
            Self::RequiredDocuments => "required_documents",
            Self::LocationCheckin => "location_checkin",
        }
    }
}

/// Discrete contribution of one bucket, kept for operator-facing audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionComponent {
    pub bucket: CompletionBucket,
    pub fraction: f32,
    pub weight: u8,
    pub notes: String,
}

/// Derived completion snapshot for a driver profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub percent: u8,
    pub weights_consistent: bool,
    pub components: Vec<CompletionComponent>,
}

/// Review decision an operator records against a pending document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

/// Count of approved required documents versus the configured requirement.
fn required_document_progress(
    profile: &DriverProfile,
    config: &VerificationConfig,
) -> (usize, usize) {
    let approved = config
        .required_documents
        .iter()
        .filter(|kind| {
            profile
                .current_document(**kind)
                .map(|document| document.status == DocumentStatus::Approved)
                .unwrap_or(false)
        })
        .count();
    (approved, config.required_documents.len())
}

/// Compute the weighted completion percentage for a profile.
///
/// The percentage is normalized over the actual weight total so a misconfigured
/// weight set still yields a meaningful number: 100 is reached exactly when
/// every bucket is complete, regardless of whether the weights sum to 100.
pub fn completion_report(profile: &DriverProfile, config: &VerificationConfig) -> CompletionReport {
    let weights = config.weights;
    let mut components = Vec::with_capacity(3);

    let profile_fraction = if profile.kyc.is_complete() { 1.0 } else { 0.0 };
    components.push(CompletionComponent {
        bucket: CompletionBucket::ProfileFields,
        fraction: profile_fraction,
        weight: weights.profile_fields,
        notes: if profile.kyc.is_complete() {
            "all profile fields captured".to_string()
        } else {
            "id number or address fields missing".to_string()
        },
    });

    let (approved, required) = required_document_progress(profile, config);
    let document_fraction = if required == 0 {
        1.0
    } else {
        approved as f32 / required as f32
    };
    components.push(CompletionComponent {
        bucket: CompletionBucket::RequiredDocuments,
        fraction: document_fraction,
        weight: weights.required_documents,
        notes: format!("{approved}/{required} required documents approved"),
    });

    let checkin_fraction = if profile.location_checkin.is_some() {
        1.0
    } else {
        0.0
    };
    components.push(CompletionComponent {
        bucket: CompletionBucket::LocationCheckin,
        fraction: checkin_fraction,
        weight: weights.location_checkin,
        notes: match profile.location_checkin {
            Some(date) => format!("location check-in recorded on {date}"),
            None => "no location check-in on file".to_string(),
        },
    });

    let total = weights.total() as f32;
    let percent = if total == 0.0 {
        0
    } else {
        let weighted: f32 = components
            .iter()
            .map(|component| component.fraction * component.weight as f32)
            .sum();
        (weighted / total * 100.0).floor().min(100.0) as u8
    };

    CompletionReport {
        percent,
        weights_consistent: weights.is_consistent(),
        components,
    }
}

/// Recompute and store the derived completion percent on the profile.
pub fn apply_completion(profile: &mut DriverProfile, config: &VerificationConfig) -> CompletionReport {
    let report = completion_report(profile, config);
    profile.completion_percent = report.percent;
    report
}
