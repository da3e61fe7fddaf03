// src/models/account.rs
//! Login accounts and self-registration requests.

use crate::config::AccountSettings;
use crate::error::RegistryError;
use crate::models::certificate::require_field;
use crate::models::identity::{Identity, Role};
use serde::{Deserialize, Serialize};

/// Shortest password accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

/// A stored login account.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Login name; lowercase for registered accounts (their email address)
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    /// Issuing authority, institution role only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    /// SHA-256 hex digest (configured accounts) or PBKDF2 hash (registered ones)
    pub password_hash: String,
}

impl Account {
    pub fn identity(&self) -> Identity {
        Identity::new(&self.username, self.role, self.institution.clone())
    }
}

impl From<&AccountSettings> for Account {
    fn from(settings: &AccountSettings) -> Self {
        Account {
            username: settings.username.trim().to_string(),
            name: None,
            role: settings.role,
            institution: settings.institution.clone(),
            password_hash: settings.password_sha256.trim().to_string(),
        }
    }
}

/// Lookup key of a username: trimmed and lowercased.
pub fn account_key(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Body of a registration request.
#[derive(Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    /// Full name
    pub name: String,
    /// Email address, used as the login name
    pub email: String,
    pub password: String,
    /// Repeated password; checked when present
    pub confirm_password: Option<String>,
    pub role: Option<Role>,
    /// Code handed out to an institution; required for the institution role
    pub institution_code: Option<String>,
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("role", &self.role)
            .field("institution_code", &self.institution_code.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Registration {
    /// Checks the request shape and normalizes name and email.
    ///
    /// # Errors
    /// `RegistryError::Validation` naming the first offending field.
    pub fn validated(self) -> Result<Self, RegistryError> {
        let name = require_field("name", self.name)?;
        let email = account_key(&require_field("email", self.email)?);
        if !is_plausible_email(&email) {
            return Err(RegistryError::Validation("email is not a valid address".into()));
        }
        let role = self
            .role
            .ok_or_else(|| RegistryError::Validation("role is required".into()))?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RegistryError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if let Some(confirm) = &self.confirm_password {
            if confirm != &self.password {
                return Err(RegistryError::Validation("passwords do not match".into()));
            }
        }
        let institution_code = self
            .institution_code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Ok(Registration {
            name,
            email,
            password: self.password,
            confirm_password: None,
            role: Some(role),
            institution_code,
        })
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
