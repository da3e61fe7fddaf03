// src/storage/file.rs
//! JSON-file-backed certificate store.
//!
//! Keeps the full table in memory and rewrites the backing file on every
//! successful write. The file is replaced atomically (write to a sibling temp
//! file, then rename), so a crash mid-write leaves the previous snapshot
//! intact. A write is only applied to the in-memory table after the new
//! snapshot reached disk.

use crate::error::RegistryError;
use crate::models::certificate::CertificateRecord;
use crate::storage::table::CertificateTable;
use crate::storage::{poisoned, CertificateStore, RecordBuilder, RecordUpdate};
use crate::utils::serialization::{deserialize, serialize};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Durable certificate store persisted as a JSON array of records.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    table: RwLock<CertificateTable>,
}

impl FileStore {
    /// Opens the store at `path`, loading any existing snapshot.
    ///
    /// A missing file is an empty registry; the file is created on the first
    /// write.
    ///
    /// # Errors
    /// `RegistryError::Storage` if the file exists but cannot be read or
    /// parsed, or contains duplicate ids.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let table = if path.exists() {
            let text = fs::read_to_string(&path)?;
            let records: Vec<CertificateRecord> = if text.trim().is_empty() {
                Vec::new()
            } else {
                deserialize(&text)?
            };
            log::info!("loaded {} certificates from {}", records.len(), path.display());
            CertificateTable::from_records(records)?
        } else {
            CertificateTable::new()
        };
        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `records` as the new snapshot.
    fn persist<'a>(&self, records: impl Iterator<Item = &'a CertificateRecord>) -> Result<(), RegistryError> {
        let snapshot: Vec<&CertificateRecord> = records.collect();
        write_snapshot(&self.path, &snapshot)
    }
}

/// Atomically replaces the file at `path` with the JSON encoding of `value`.
///
/// Parent directories are created as needed.
pub(crate) fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<(), RegistryError> {
    let text = serialize(value)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.to_path_buf().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path).map_err(|e| {
        log::error!("failed to replace {}: {}", path.display(), e);
        RegistryError::from(e)
    })
}

impl CertificateStore for FileStore {
    fn append(&self, year: i32, build: RecordBuilder<'_>) -> Result<CertificateRecord, RegistryError> {
        let mut table = self.table.write().map_err(poisoned)?;
        let record = build(table.next_id(year)?);
        if table.contains(&record.id) {
            return Err(RegistryError::Storage(format!(
                "duplicate certificate id {}",
                record.id
            )));
        }
        self.persist(table.records().chain(std::iter::once(&record)))?;
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
        self.persist(
            table
                .records()
                .map(|r| if r.id == record.id { &record } else { r }),
        )?;
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
