// src/services/verifier.rs
//! Certificate verification service.
//!
//! Answers "is this certificate genuine and still in force?" for any id. The
//! answer is a tagged outcome, never an error: unknown, revoked and tampered
//! certificates are all expected, reportable results.

use crate::error::RegistryError;
use crate::models::certificate::{VerificationOutcome, VerificationResult};
use crate::storage::CertificateStore;
use crate::utils::crypto::proof_matches;
use std::sync::Arc;

/// Read-only verifier over the shared certificate store.
#[derive(Clone)]
pub struct Verifier {
    store: Arc<dyn CertificateStore>,
}

impl Verifier {
    pub fn new(store: Arc<dyn CertificateStore>) -> Self {
        Self { store }
    }

    /// Verifies a certificate by id.
    ///
    /// # Process Flow
    /// 1. Look up the record; absent means `NotFound`
    /// 2. Revoked records are reported as `Revoked`, with the record attached
    /// 3. An active record carrying revocation metadata is `Tampered`
    /// 4. Otherwise recompute the integrity proof from the stored immutable
    ///    fields and compare with the stored proof: `Valid` or `Tampered`
    ///
    /// Pure read: repeated calls on an unchanged record give identical results.
    ///
    /// # Errors
    /// Only `RegistryError::Storage`, when the store itself fails.
    pub fn verify(&self, certificate_id: &str) -> Result<VerificationResult, RegistryError> {
        let record = match self.store.get(certificate_id)? {
            Some(record) => record,
            None => {
                log::debug!("verify {}: not found", certificate_id);
                return Ok(VerificationResult {
                    outcome: VerificationOutcome::NotFound,
                    record: None,
                });
            }
        };

        let outcome = if record.is_revoked() {
            VerificationOutcome::Revoked
        } else if record.revoked_at.is_some() || record.revoked_by.is_some() {
            log::warn!("{} is active but carries revocation metadata", record.id);
            VerificationOutcome::Tampered
        } else if proof_matches(&record) {
            VerificationOutcome::Valid
        } else {
            log::warn!("integrity proof mismatch for {}", record.id);
            VerificationOutcome::Tampered
        };
        log::debug!("verify {}: {:?}", certificate_id, outcome);

        Ok(VerificationResult {
            outcome,
            record: Some(record),
        })
    }
}
