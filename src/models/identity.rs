// src/models/identity.rs
//! Actor identity and role model.
//!
//! Every write against the registry is performed on behalf of an [`Identity`]
//! that was authenticated by the token service. Authorization is a capability
//! check on that identity, evaluated server-side for each operation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Roles known to the certificate platform.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Holder of certificates; read-only.
    Student,
    /// Issuing authority; may issue and revoke its own certificates.
    Institution,
    /// Third party checking certificates; read-only.
    Recruiter,
    /// Platform operator; may revoke any certificate.
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Institution => "institution",
            Role::Recruiter => "recruiter",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated actor.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Account name the identity was issued for
    pub subject: String,
    pub role: Role,
    /// Issuing authority the actor represents (institution role only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
}

impl Identity {
    pub fn new(subject: impl Into<String>, role: Role, institution: Option<String>) -> Self {
        Self {
            subject: subject.into(),
            role,
            institution,
        }
    }

    /// Convenience constructor for an institution actor.
    pub fn institution(subject: impl Into<String>, institution: impl Into<String>) -> Self {
        Self::new(subject, Role::Institution, Some(institution.into()))
    }

    pub fn admin(subject: impl Into<String>) -> Self {
        Self::new(subject, Role::Admin, None)
    }

    /// The institution this actor may issue for, if any.
    ///
    /// Only institution-role actors bound to a non-empty institution name have
    /// issuance rights.
    pub fn issuing_institution(&self) -> Option<&str> {
        match (self.role, self.institution.as_deref()) {
            (Role::Institution, Some(name)) if !name.trim().is_empty() => Some(name),
            _ => None,
        }
    }

    /// Whether this actor may revoke a certificate issued by `institution`.
    pub fn can_revoke(&self, institution: &str) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Institution => self.issuing_institution() == Some(institution),
            Role::Student | Role::Recruiter => false,
        }
    }
}
