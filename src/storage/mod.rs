// src/storage/mod.rs
//! Storage layer for issued certificates.
//!
//! The registry and verifier only see the [`CertificateStore`] trait, so the
//! backing table can be swapped without touching service code:
//! - [`memory::MemoryStore`]: process-local table, lost on restart
//! - [`file::FileStore`]: the same table persisted as a JSON file
//!
//! Login accounts live next to it in [`accounts::AccountStore`].

pub mod accounts;
pub mod file;
pub mod memory;
pub mod table;

use crate::config::{AuthSettings, StorageBackend, StorageSettings};
use crate::error::RegistryError;
use crate::models::account::Account;
use crate::models::certificate::CertificateRecord;
use accounts::AccountStore;
use std::sync::Arc;

/// Builds a record for a freshly allocated id.
pub type RecordBuilder<'a> = &'a dyn Fn(String) -> CertificateRecord;

/// Checked mutation of an existing record. Returning an error aborts the
/// update and leaves the stored record untouched.
pub type RecordUpdate<'a> = &'a dyn Fn(&mut CertificateRecord) -> Result<(), RegistryError>;

/// Durable table of certificate records.
///
/// Implementations must make `append` and `update` mutually exclusive with
/// each other, so that two concurrent issuances never receive the same id and
/// no reader observes a half-applied update. Reads may run concurrently.
pub trait CertificateStore: Send + Sync {
    /// Allocates the next id for `year`, builds the record with it and
    /// appends it, all under a single write lock.
    fn append(&self, year: i32, build: RecordBuilder<'_>) -> Result<CertificateRecord, RegistryError>;

    /// Looks up a record by id.
    fn get(&self, id: &str) -> Result<Option<CertificateRecord>, RegistryError>;

    /// Applies `apply` to the record with `id` and stores the result.
    ///
    /// # Errors
    /// `RegistryError::NotFound` if `id` is unknown, or whatever `apply` returns.
    fn update(&self, id: &str, apply: RecordUpdate<'_>) -> Result<CertificateRecord, RegistryError>;

    /// Snapshot of every stored record, in no particular order.
    fn list(&self) -> Result<Vec<CertificateRecord>, RegistryError>;

    /// Number of stored records.
    fn len(&self) -> Result<usize, RegistryError>;
}

/// Opens the storage backend selected by configuration.
pub fn open_store(settings: &StorageSettings) -> Result<Arc<dyn CertificateStore>, RegistryError> {
    match settings.backend {
        StorageBackend::Memory => {
            log::info!("using in-memory certificate store");
            Ok(Arc::new(memory::MemoryStore::new()))
        }
        StorageBackend::File => {
            log::info!("using file certificate store at {}", settings.path.display());
            Ok(Arc::new(file::FileStore::open(&settings.path)?))
        }
    }
}

/// Opens the account directory: configured accounts, plus registered ones
/// persisted alongside the certificates when the `file` backend is selected.
pub fn open_accounts(storage: &StorageSettings, auth: &AuthSettings) -> Result<Arc<AccountStore>, RegistryError> {
    let configured: Vec<Account> = auth.accounts.iter().map(Account::from).collect();
    match storage.backend {
        StorageBackend::Memory => Ok(Arc::new(AccountStore::new(configured))),
        StorageBackend::File => {
            log::info!("registered accounts stored at {}", storage.accounts_path.display());
            Ok(Arc::new(AccountStore::open(&storage.accounts_path, configured)?))
        }
    }
}

pub(crate) fn poisoned<T>(_: T) -> RegistryError {
    RegistryError::Storage("storage lock poisoned".into())
}
