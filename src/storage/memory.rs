// src/storage/memory.rs
//! Process-local certificate store.

use crate::error::RegistryError;
use crate::models::certificate::CertificateRecord;
use crate::storage::table::CertificateTable;
use crate::storage::{poisoned, CertificateStore, RecordBuilder, RecordUpdate};
use std::sync::RwLock;

/// Thread-safe in-memory certificate store.
///
/// Reads share the lock; appends and updates take it exclusively.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<CertificateTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Edits a stored record directly, bypassing the registry and without
    /// recomputing its integrity proof.
    #[cfg(test)]
    pub fn tamper(&self, id: &str, edit: impl FnOnce(&mut CertificateRecord)) {
        let mut table = self.table.write().unwrap();
        let mut record = table.get(id).cloned().expect("record to tamper with");
        edit(&mut record);
        table.replace(record).unwrap();
    }
}

impl CertificateStore for MemoryStore {
    fn append(&self, year: i32, build: RecordBuilder<'_>) -> Result<CertificateRecord, RegistryError> {
        let mut table = self.table.write().map_err(poisoned)?;
        let record = build(table.next_id(year)?);
        table.insert(record.clone())?;
        Ok(record)
    }

    fn get(&self, id: &str) -> Result<Option<CertificateRecord>, RegistryError> {
        let table = self.table.read().map_err(poisoned)?;
        Ok(table.get(id).cloned())
    }

    fn update(&self, id: &str, apply: RecordUpdate<'_>) -> Result<CertificateRecord, RegistryError> {
        let mut table = self.table.write().map_err(poisoned)?;
        let mut record = table
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        apply(&mut record)?;
        table.replace(record.clone())?;
        Ok(record)
    }

    fn list(&self) -> Result<Vec<CertificateRecord>, RegistryError> {
        let table = self.table.read().map_err(poisoned)?;
        Ok(table.records().cloned().collect())
    }

    fn len(&self) -> Result<usize, RegistryError> {
        let table = self.table.read().map_err(poisoned)?;
        Ok(table.len())
    }
}
