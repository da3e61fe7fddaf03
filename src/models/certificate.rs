// src/models/certificate.rs
//! Certificate data model.
//!
//! Defines the issued certificate record, the issuer-supplied draft it is
//! built from, the list filter used by dashboards, and the tagged result of a
//! verification lookup.

use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Upper bound on the length of any descriptive field.
pub const MAX_FIELD_LEN: usize = 256;

/// Lifecycle status of a certificate.
///
/// The only transition is `Active -> Revoked`; `Revoked` is terminal.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CertificateStatus {
    Active,
    Revoked,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Active => "active",
            CertificateStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for CertificateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertificateStatus {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(CertificateStatus::Active),
            "revoked" => Ok(CertificateStatus::Revoked),
            other => Err(RegistryError::Validation(format!(
                "unknown certificate status '{}' (expected 'active' or 'revoked')",
                other
            ))),
        }
    }
}

/// An issued certificate.
///
/// Everything except `status`, `revoked_at` and `revoked_by` is immutable once
/// issued, and `integrity_proof` is computed over exactly those immutable
/// fields (see [`crate::utils::crypto::integrity_proof`]).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    /// `CERT-<year>-<sequence>`, e.g. "CERT-2024-001"
    pub id: String,
    pub student_name: String,
    pub course: String,
    pub grade: String,
    /// Opaque date string supplied by the issuer, e.g. "2024-05-15"
    pub completion_date: String,
    /// Name of the issuing institution
    pub institution: String,
    /// Hex fingerprint over the immutable fields, `0x`-prefixed
    pub integrity_proof: String,
    pub status: CertificateStatus,
    pub issued_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_by: Option<String>,
}

impl CertificateRecord {
    pub fn is_revoked(&self) -> bool {
        self.status == CertificateStatus::Revoked
    }
}

/// Issuer-supplied fields of a certificate, before an id or proof exists.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateDraft {
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub completion_date: String,
}

impl CertificateDraft {
    pub fn new(
        student_name: impl Into<String>,
        course: impl Into<String>,
        grade: impl Into<String>,
        completion_date: impl Into<String>,
    ) -> Self {
        Self {
            student_name: student_name.into(),
            course: course.into(),
            grade: grade.into(),
            completion_date: completion_date.into(),
        }
    }

    /// Trims every field and rejects empty or oversized ones.
    ///
    /// # Errors
    /// `RegistryError::Validation` naming the first offending field.
    pub fn validated(self) -> Result<Self, RegistryError> {
        Ok(Self {
            student_name: require_field("studentName", self.student_name)?,
            course: require_field("course", self.course)?,
            grade: require_field("grade", self.grade)?,
            completion_date: require_field("completionDate", self.completion_date)?,
        })
    }
}

pub(crate) fn require_field(name: &str, value: String) -> Result<String, RegistryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::Validation(format!("{} is required", name)));
    }
    if trimmed.chars().count() > MAX_FIELD_LEN {
        return Err(RegistryError::Validation(format!(
            "{} must be at most {} characters",
            name, MAX_FIELD_LEN
        )));
    }
    Ok(trimmed.to_string())
}

/// Formats a certificate id from its issuance year and sequence number.
pub fn format_certificate_id(year: i32, sequence: u64) -> String {
    format!("CERT-{}-{:03}", year, sequence)
}

/// Splits a well-formed certificate id into `(year, sequence)`.
///
/// Returns `None` for any string not shaped like `CERT-<year>-<digits>`.
pub fn parse_certificate_id(id: &str) -> Option<(i32, u64)> {
    let rest = id.strip_prefix("CERT-")?;
    let (year, seq) = rest.split_once('-')?;
    if year.is_empty() || seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((year.parse().ok()?, seq.parse().ok()?))
}

/// Numeric-aware ordering of certificate ids, so `CERT-2024-1000` sorts after
/// `CERT-2024-999`. Ids that do not parse fall back to plain string order and
/// sort before parsed ones.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    match (parse_certificate_id(a), parse_certificate_id(b)) {
        (Some(ka), Some(kb)) => ka.cmp(&kb).then_with(|| a.cmp(b)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Dashboard ordering: newest `issued_date` first, ties broken by id (newest
/// sequence first).
pub fn dashboard_order(a: &CertificateRecord, b: &CertificateRecord) -> Ordering {
    b.issued_date
        .cmp(&a.issued_date)
        .then_with(|| compare_ids(&b.id, &a.id))
}

/// Optional criteria for listing certificates. Empty filter matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateFilter {
    /// Exact issuing institution
    pub institution: Option<String>,
    /// Student name, case-insensitive
    pub student: Option<String>,
    pub status: Option<CertificateStatus>,
}

impl CertificateFilter {
    pub fn matches(&self, record: &CertificateRecord) -> bool {
        if let Some(institution) = &self.institution {
            if &record.institution != institution {
                return false;
            }
        }
        if let Some(student) = &self.student {
            if record.student_name.to_lowercase() != student.trim().to_lowercase() {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        true
    }
}

/// Outcome of a verification lookup.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Valid,
    Tampered,
    Revoked,
    NotFound,
}

impl VerificationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Valid)
    }

    /// Human-readable message shown to the person verifying.
    pub fn message(&self) -> &'static str {
        match self {
            VerificationOutcome::Valid => "Certificate is valid",
            VerificationOutcome::Tampered => {
                "Certificate integrity check failed: record has been tampered with"
            }
            VerificationOutcome::Revoked => "Certificate has been revoked",
            VerificationOutcome::NotFound => "Certificate not found",
        }
    }
}

/// Result of [`crate::services::verifier::Verifier::verify`].
///
/// `record` is present for every outcome except `NotFound`, so a caller can
/// show why a certificate failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub outcome: VerificationOutcome,
    pub record: Option<CertificateRecord>,
}

impl VerificationResult {
    pub fn success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn message(&self) -> &'static str {
        self.outcome.message()
    }
}
