// src/services/auth.rs
//! Authentication for the registry API.
//!
//! Turns accounts into signed access tokens and access tokens back into
//! [`Identity`] values:
//! - `login`: username/password check against the account directory
//! - `register`: self-service account creation for students, recruiters and
//!   institutions holding a registration code
//! - `mint`: HS256 JWT carrying subject, role and institution
//! - `validate`: signature and expiry check, then a lookup of the subject so
//!   tokens of removed or changed accounts stop working

use crate::config::{AuthSettings, InstitutionCodeSettings};
use crate::error::RegistryError;
use crate::models::account::{Account, Registration};
use crate::models::identity::{Identity, Role};
use crate::storage::accounts::AccountStore;
use crate::utils::crypto::{hash_password, password_matches, verify_password};
use axum::http::{header, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<String>,
    pub iat: u64,
    pub exp: u64,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity::new(claims.sub, claims.role, claims.institution)
    }
}

/// Issues and validates access tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: u64,
    accounts: Arc<AccountStore>,
    allow_registration: bool,
    institution_codes: Vec<InstitutionCodeSettings>,
}

impl TokenService {
    pub fn new(settings: &AuthSettings, accounts: Arc<AccountStore>) -> Self {
        let secret = settings.jwt_secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs: settings.token_ttl_secs,
            accounts,
            allow_registration: settings.allow_registration,
            institution_codes: settings.institution_codes.clone(),
        }
    }

    /// Checks a username/password pair and mints a token for the account.
    ///
    /// # Errors
    /// `Unauthorized` for an unknown user or wrong password; the message does
    /// not say which.
    pub fn login(&self, username: &str, password: &str) -> Result<(String, Identity), RegistryError> {
        let account = self.accounts.find(username)?;
        let verified = match &account {
            Some(account) => verify_password(password, &account.password_hash),
            None => {
                // keep the unknown-user path as costly as a wrong password
                let _ = password_matches(password, "");
                false
            }
        };

        match account {
            Some(account) if verified => {
                let identity = account.identity();
                let token = self.mint(&identity)?;
                log::info!("login succeeded for {} ({})", identity.subject, identity.role);
                Ok((token, identity))
            }
            _ => {
                log::warn!("login failed for '{}'", username);
                Err(RegistryError::Unauthorized("invalid username or password".into()))
            }
        }
    }

    /// Creates an account from a registration request and logs it in.
    ///
    /// # Process Flow
    /// 1. Reject when registration is disabled or the role is admin
    /// 2. Validate the request fields
    /// 3. Institutions must present a configured registration code, which
    ///    binds the account to that code's institution
    /// 4. Store the account with a salted password hash and mint a token
    ///
    /// # Errors
    /// - `Forbidden`: registration disabled, admin role, or unknown code
    /// - `Validation`: bad fields, or an institution without a code
    /// - `Conflict`: the email is already registered
    pub fn register(&self, registration: Registration) -> Result<(String, Identity), RegistryError> {
        if !self.allow_registration {
            return Err(RegistryError::Forbidden("self-registration is disabled".into()));
        }
        if registration.role == Some(Role::Admin) {
            return Err(RegistryError::Forbidden("admin accounts cannot be self-registered".into()));
        }
        let registration = registration.validated()?;
        let role = registration.role.unwrap_or(Role::Student);

        let institution = match role {
            Role::Institution => {
                let code = registration.institution_code.as_deref().ok_or_else(|| {
                    RegistryError::Validation("institutionCode is required for institutions".into())
                })?;
                Some(self.institution_for_code(code)?)
            }
            _ => None,
        };

        let account = self.accounts.create(Account {
            username: registration.email,
            name: Some(registration.name),
            role,
            institution,
            password_hash: hash_password(&registration.password)?,
        })?;
        let identity = account.identity();
        let token = self.mint(&identity)?;
        log::info!("registered {} ({})", identity.subject, identity.role);
        Ok((token, identity))
    }

    fn institution_for_code(&self, code: &str) -> Result<String, RegistryError> {
        self.institution_codes
            .iter()
            .find(|entry| password_matches(code, &entry.code_sha256))
            .map(|entry| entry.institution.trim().to_string())
            .ok_or_else(|| {
                log::warn!("registration with unknown institution code");
                RegistryError::Forbidden("invalid institution code".into())
            })
    }

    /// Mints an access token for `identity`, valid for the configured TTL.
    pub fn mint(&self, identity: &Identity) -> Result<String, RegistryError> {
        let now = Utc::now().timestamp().max(0) as u64;
        self.encode_claims(&Claims {
            sub: identity.subject.clone(),
            role: identity.role,
            institution: identity.institution.clone(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, RegistryError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| RegistryError::Storage(format!("failed to sign token: {}", e)))
    }

    /// Validates a token and returns the identity of its account.
    ///
    /// # Errors
    /// `Unauthorized` if the token is malformed, badly signed or expired, or
    /// if its subject no longer exists with the role and institution the
    /// token was minted for.
    pub fn validate(&self, token: &str) -> Result<Identity, RegistryError> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                log::debug!("rejected token: {}", e);
                RegistryError::Unauthorized(format!("invalid access token: {}", e))
            })?;

        let account = self.accounts.find(&claims.sub)?.ok_or_else(|| {
            log::warn!("token for unknown account '{}'", claims.sub);
            RegistryError::Unauthorized("invalid access token: unknown account".into())
        })?;
        let identity = account.identity();
        if identity != Identity::from(claims) {
            log::warn!("token for {} no longer matches the account", identity.subject);
            return Err(RegistryError::Unauthorized("invalid access token: account changed".into()));
        }
        Ok(identity)
    }

    /// Extracts and validates the bearer token of a request.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, RegistryError> {
        self.validate(bearer_token(headers)?)
    }
}

/// Returns the token of an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, RegistryError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| RegistryError::Unauthorized("missing Authorization header".into()))?
        .to_str()
        .map_err(|_| RegistryError::Unauthorized("malformed Authorization header".into()))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(RegistryError::Unauthorized("expected a Bearer token".into())),
    }
}
