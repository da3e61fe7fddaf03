// src/services/registry.rs
//! Certificate Registry Service
//!
//! This module owns the write side of the certificate registry: issuance and
//! revocation, plus the dashboard listing and single-record lookup.
//!
//! Authorization is enforced here, on every call, as a capability check on the
//! acting [`Identity`]:
//! - Issue: institution-role actors bound to an institution
//! - Revoke: the issuing institution, or an admin

use crate::error::RegistryError;
use crate::models::certificate::{
    dashboard_order, CertificateDraft, CertificateFilter, CertificateRecord, CertificateStatus,
};
use crate::models::identity::Identity;
use crate::storage::CertificateStore;
use crate::utils::crypto::integrity_proof;
use chrono::{Datelike, Utc};
use std::sync::Arc;

/// Service for issuing, revoking and listing certificates.
#[derive(Clone)]
pub struct CertificateRegistry {
    /// Injected storage backend shared with the verifier
    store: Arc<dyn CertificateStore>,
}

impl CertificateRegistry {
    /// Creates a new registry on top of `store`.
    pub fn new(store: Arc<dyn CertificateStore>) -> Self {
        Self { store }
    }

    /// Issues a new certificate on behalf of `issuer`.
    ///
    /// # Arguments
    /// * `draft` - Student name, course, grade and completion date
    /// * `issuer` - Authenticated actor; must have issuance rights
    ///
    /// # Returns
    /// The stored record, `active`, with a fresh id and integrity proof
    ///
    /// # Errors
    /// - `Forbidden` if `issuer` is not an institution bound to an institution name
    /// - `Validation` if any draft field is missing or empty
    /// - `Storage` if the record could not be persisted
    pub fn issue(&self, draft: CertificateDraft, issuer: &Identity) -> Result<CertificateRecord, RegistryError> {
        let institution = issuer.issuing_institution().ok_or_else(|| {
            RegistryError::Forbidden(format!(
                "'{}' ({}) has no issuance rights",
                issuer.subject, issuer.role
            ))
        })?;
        let draft = draft.validated()?;

        let issued_date = Utc::now();
        let record = self.store.append(issued_date.year(), &|id| {
            let mut record = CertificateRecord {
                id,
                student_name: draft.student_name.clone(),
                course: draft.course.clone(),
                grade: draft.grade.clone(),
                completion_date: draft.completion_date.clone(),
                institution: institution.to_string(),
                integrity_proof: String::new(),
                status: CertificateStatus::Active,
                issued_date,
                revoked_at: None,
                revoked_by: None,
            };
            record.integrity_proof = integrity_proof(&record);
            record
        })?;

        log::info!(
            "issued {} to '{}' for '{}' by {}",
            record.id,
            record.student_name,
            record.course,
            issuer.subject
        );
        Ok(record)
    }

    /// Revokes a certificate. Irreversible.
    ///
    /// # Errors
    /// Checked in this order:
    /// - `NotFound` if `certificate_id` is unknown
    /// - `Forbidden` if `actor` is neither the issuing institution nor an admin
    /// - `AlreadyRevoked` if the certificate is already revoked; the stored
    ///   record is left unchanged
    pub fn revoke(&self, certificate_id: &str, actor: &Identity) -> Result<CertificateRecord, RegistryError> {
        let result = self.store.update(certificate_id, &|record| {
            if !actor.can_revoke(&record.institution) {
                return Err(RegistryError::Forbidden(format!(
                    "'{}' ({}) may not revoke certificates issued by '{}'",
                    actor.subject, actor.role, record.institution
                )));
            }
            if record.is_revoked() {
                return Err(RegistryError::AlreadyRevoked(record.id.clone()));
            }
            record.status = CertificateStatus::Revoked;
            record.revoked_at = Some(Utc::now());
            record.revoked_by = Some(actor.subject.clone());
            Ok(())
        });

        match &result {
            Ok(record) => log::info!("revoked {} by {}", record.id, actor.subject),
            Err(e) => log::warn!("revocation of {} by {} refused: {}", certificate_id, actor.subject, e),
        }
        result
    }

    /// Fetches a single certificate as stored, without integrity checking.
    pub fn get(&self, certificate_id: &str) -> Result<CertificateRecord, RegistryError> {
        self.store
            .get(certificate_id)?
            .ok_or_else(|| RegistryError::NotFound(certificate_id.to_string()))
    }

    /// Lists certificates matching `filter`, newest first.
    ///
    /// Records with equal `issued_date` are ordered by id, highest sequence
    /// first, so the order is fully deterministic.
    pub fn list(&self, filter: &CertificateFilter) -> Result<Vec<CertificateRecord>, RegistryError> {
        let mut records: Vec<_> = self
            .store
            .list()?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        records.sort_by(dashboard_order);
        Ok(records)
    }

    /// Number of certificates in the registry.
    pub fn count(&self) -> Result<usize, RegistryError> {
        self.store.len()
    }

    /// Populates an empty registry with the sample certificates shown on the
    /// client's dashboards. Does nothing if any certificate exists.
    ///
    /// # Returns
    /// Number of certificates issued
    pub fn seed_demo(&self) -> Result<usize, RegistryError> {
        if self.store.len()? > 0 {
            return Ok(0);
        }
        let issuer = Identity::institution("demo-seed", "Tech University");
        let samples = [
            ("Alice Johnson", "Bachelor of Computer Science", "First Class Honours", "2024-05-15"),
            ("Bob Smith", "Master of Data Science", "Distinction", "2024-06-10"),
            ("Carol Davis", "Diploma in Web Development", "Pass with Merit", "2024-04-20"),
        ];
        let mut issued = Vec::with_capacity(samples.len());
        for (student, course, grade, completed) in samples {
            issued.push(self.issue(CertificateDraft::new(student, course, grade, completed), &issuer)?);
        }
        if let Some(last) = issued.last() {
            self.revoke(&last.id, &issuer)?;
        }
        log::info!("seeded {} demo certificates", issued.len());
        Ok(issued.len())
    }
}
