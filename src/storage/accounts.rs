// src/storage/accounts.rs
//! Login account directory.
//!
//! Holds two sets of accounts under one case-insensitive namespace:
//! - configured accounts, fixed for the life of the process
//! - registered accounts, created through self-registration and, with a
//!   backing file, persisted across restarts

use crate::error::RegistryError;
use crate::models::account::{account_key, Account};
use crate::storage::file::write_snapshot;
use crate::storage::poisoned;
use crate::utils::serialization::deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

#[derive(Debug, Default)]
pub struct AccountStore {
    configured: HashMap<String, Account>,
    registered: RwLock<BTreeMap<String, Account>>,
    /// Snapshot of registered accounts; `None` keeps them in memory only
    path: Option<PathBuf>,
}

impl AccountStore {
    /// Store without persistence for registered accounts.
    pub fn new(configured: Vec<Account>) -> Self {
        Self {
            configured: keyed(configured),
            ..Self::default()
        }
    }

    /// Store whose registered accounts live in the JSON file at `path`.
    ///
    /// # Errors
    /// `RegistryError::Storage` if the file exists but cannot be read or
    /// parsed.
    pub fn open(path: impl AsRef<Path>, configured: Vec<Account>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let configured = keyed(configured);
        let mut registered = BTreeMap::new();
        if path.exists() {
            let text = fs::read_to_string(&path)?;
            let accounts: Vec<Account> = if text.trim().is_empty() {
                Vec::new()
            } else {
                deserialize(&text)?
            };
            for account in accounts {
                let key = account_key(&account.username);
                if configured.contains_key(&key) {
                    log::warn!("registered account '{}' is shadowed by configuration", account.username);
                    continue;
                }
                registered.insert(key, account);
            }
            log::info!("loaded {} registered accounts from {}", registered.len(), path.display());
        }
        Ok(Self {
            configured,
            registered: RwLock::new(registered),
            path: Some(path),
        })
    }

    /// Looks up an account by username, case-insensitively.
    pub fn find(&self, username: &str) -> Result<Option<Account>, RegistryError> {
        let key = account_key(username);
        if let Some(account) = self.configured.get(&key) {
            return Ok(Some(account.clone()));
        }
        let registered = self.registered.read().map_err(poisoned)?;
        Ok(registered.get(&key).cloned())
    }

    /// Adds a registered account.
    ///
    /// # Errors
    /// `RegistryError::Conflict` if the username is taken by any account;
    /// `RegistryError::Storage` if the snapshot cannot be written, in which
    /// case the account is not added.
    pub fn create(&self, account: Account) -> Result<Account, RegistryError> {
        let key = account_key(&account.username);
        let mut registered = self.registered.write().map_err(poisoned)?;
        if self.configured.contains_key(&key) || registered.contains_key(&key) {
            return Err(RegistryError::Conflict(format!(
                "username '{}' is already registered",
                account.username
            )));
        }

        if let Some(path) = &self.path {
            let mut snapshot: Vec<&Account> = registered.values().collect();
            snapshot.push(&account);
            write_snapshot(path, &snapshot)?;
        }
        registered.insert(key, account.clone());
        Ok(account)
    }

    /// Number of known accounts, configured and registered.
    pub fn len(&self) -> Result<usize, RegistryError> {
        let registered = self.registered.read().map_err(poisoned)?;
        Ok(self.configured.len() + registered.len())
    }
}

fn keyed(accounts: Vec<Account>) -> HashMap<String, Account> {
    accounts
        .into_iter()
        .map(|account| (account_key(&account.username), account))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::Role;

    fn account(username: &str, role: Role) -> Account {
        Account {
            username: username.into(),
            name: Some("Test User".into()),
            role,
            institution: None,
            password_hash: "00".repeat(32),
        }
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let store = AccountStore::new(vec![account("root", Role::Admin)]);
        store.create(account("emile@example.org", Role::Student)).unwrap();

        assert_eq!(store.find(" ROOT ").unwrap().unwrap().role, Role::Admin);
        assert_eq!(store.find("Emile@Example.org").unwrap().unwrap().role, Role::Student);
        assert!(store.find("nobody").unwrap().is_none());
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_create_rejects_taken_usernames() {
        let store = AccountStore::new(vec![account("root", Role::Admin)]);
        store.create(account("hr@example.org", Role::Recruiter)).unwrap();

        for taken in ["Root", "HR@example.org"] {
            let err = store.create(account(taken, Role::Student)).unwrap_err();
            assert!(matches!(err, RegistryError::Conflict(_)), "{}", taken);
        }
        assert_eq!(store.find("root").unwrap().unwrap().role, Role::Admin);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_registered_accounts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");

        let store = AccountStore::open(&path, vec![account("root", Role::Admin)]).unwrap();
        let created = store.create(account("emile@example.org", Role::Student)).unwrap();
        drop(store);

        let reopened = AccountStore::open(&path, vec![account("root", Role::Admin)]).unwrap();
        assert_eq!(reopened.find("emile@example.org").unwrap(), Some(created));
        assert_eq!(reopened.len().unwrap(), 2);
    }

    #[test]
    fn test_configuration_shadows_registered_account() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");

        let store = AccountStore::open(&path, Vec::new()).unwrap();
        store.create(account("dean", Role::Student)).unwrap();
        drop(store);

        let reopened = AccountStore::open(&path, vec![account("dean", Role::Admin)]).unwrap();
        assert_eq!(reopened.find("dean").unwrap().unwrap().role, Role::Admin);
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        fs::write(&path, "[{").unwrap();

        let err = AccountStore::open(&path, Vec::new()).unwrap_err();
        assert!(matches!(err, RegistryError::Storage(_)));
    }
}
