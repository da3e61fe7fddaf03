// src/storage/table.rs
//! The certificate table shared by all storage backends.
//!
//! Provides an append-mostly table of certificate records keyed by id, plus
//! the per-year sequence counters used to allocate new ids. The table itself
//! is not synchronized; backends wrap it in a lock.

use crate::error::RegistryError;
use crate::models::certificate::{format_certificate_id, parse_certificate_id, CertificateRecord};
use std::collections::{BTreeMap, HashMap};

/// In-memory table of certificates.
///
/// - O(log n) lookups by id
/// - Records are never removed
/// - Ids are never reused: the next sequence for a year is one past the
///   highest sequence ever stored for that year
#[derive(Debug, Default, Clone)]
pub struct CertificateTable {
    /// Records keyed by certificate id
    records: BTreeMap<String, CertificateRecord>,
    /// Highest sequence number allocated per issuance year
    sequences: HashMap<i32, u64>,
}

impl CertificateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a table from previously stored records.
    ///
    /// # Errors
    /// `RegistryError::Storage` if two records share an id.
    pub fn from_records(records: Vec<CertificateRecord>) -> Result<Self, RegistryError> {
        let mut table = Self::new();
        for record in records {
            table.insert(record)?;
        }
        Ok(table)
    }

    /// Id the next certificate issued in `year` will receive.
    ///
    /// # Errors
    /// `RegistryError::Storage` once the year's sequence space is used up.
    pub fn next_id(&self, year: i32) -> Result<String, RegistryError> {
        let last = self.sequences.get(&year).copied().unwrap_or(0);
        let next = last.checked_add(1).ok_or_else(|| {
            RegistryError::Storage(format!("certificate sequence for {} is exhausted", year))
        })?;
        Ok(format_certificate_id(year, next))
    }

    /// Appends a new record.
    ///
    /// # Errors
    /// `RegistryError::Storage` if the id is already taken; existing records
    /// are never overwritten.
    pub fn insert(&mut self, record: CertificateRecord) -> Result<(), RegistryError> {
        if self.contains(&record.id) {
            return Err(RegistryError::Storage(format!(
                "duplicate certificate id {}",
                record.id
            )));
        }
        if let Some((year, seq)) = parse_certificate_id(&record.id) {
            let last = self.sequences.entry(year).or_insert(0);
            *last = (*last).max(seq);
        }
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Replaces an existing record in place.
    ///
    /// # Errors
    /// `RegistryError::NotFound` if no record has that id.
    pub fn replace(&mut self, record: CertificateRecord) -> Result<(), RegistryError> {
        match self.records.get_mut(&record.id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(RegistryError::NotFound(record.id)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&CertificateRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in id order.
    pub fn records(&self) -> impl Iterator<Item = &CertificateRecord> {
        self.records.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::certificate::CertificateStatus;
    use chrono::Utc;

    fn create_test_record(id: &str) -> CertificateRecord {
        CertificateRecord {
            id: id.to_string(),
            student_name: "Bob Smith".into(),
            course: "Master of Data Science".into(),
            grade: "Distinction".into(),
            completion_date: "2024-06-10".into(),
            institution: "Tech University".into(),
            integrity_proof: "0x00".into(),
            status: CertificateStatus::Active,
            issued_date: Utc::now(),
            revoked_at: None,
            revoked_by: None,
        }
    }

    #[test]
    fn test_next_id_starts_at_one_per_year() {
        let mut table = CertificateTable::new();
        assert_eq!(table.next_id(2024).unwrap(), "CERT-2024-001");

        table.insert(create_test_record("CERT-2024-001")).unwrap();
        assert_eq!(table.next_id(2024).unwrap(), "CERT-2024-002");
        assert_eq!(table.next_id(2025).unwrap(), "CERT-2025-001");
    }

    #[test]
    fn test_next_id_follows_highest_sequence() {
        let table = CertificateTable::from_records(vec![
            create_test_record("CERT-2024-007"),
            create_test_record("CERT-2024-003"),
        ])
        .unwrap();
        assert_eq!(table.next_id(2024).unwrap(), "CERT-2024-008");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_next_id_exhausted_sequence() {
        let last = format!("CERT-2099-{}", u64::MAX);
        let table = CertificateTable::from_records(vec![create_test_record(&last)]).unwrap();

        let err = table.next_id(2099).unwrap_err();
        assert!(matches!(err, RegistryError::Storage(_)));
        assert_eq!(table.next_id(2024).unwrap(), "CERT-2024-001");
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let mut table = CertificateTable::new();
        table.insert(create_test_record("CERT-2024-001")).unwrap();

        let err = table.insert(create_test_record("CERT-2024-001")).unwrap_err();
        assert!(matches!(err, RegistryError::Storage(_)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_replace_requires_existing() {
        let mut table = CertificateTable::new();
        let err = table.replace(create_test_record("CERT-2024-001")).unwrap_err();
        assert_eq!(err, RegistryError::NotFound("CERT-2024-001".into()));

        table.insert(create_test_record("CERT-2024-001")).unwrap();
        let mut updated = create_test_record("CERT-2024-001");
        updated.status = CertificateStatus::Revoked;
        table.replace(updated).unwrap();
        assert!(table.get("CERT-2024-001").unwrap().is_revoked());
    }

    #[test]
    fn test_contains_after_insert() {
        let mut table = CertificateTable::new();
        assert!(table.is_empty());
        assert!(!table.contains("CERT-2024-001"));

        table.insert(create_test_record("CERT-2024-001")).unwrap();
        assert!(table.contains("CERT-2024-001"));
        assert!(table.get("CERT-2024-002").is_none());
    }
}
