// src/utils/crypto.rs
//! Hashing utilities for certificate integrity proofs and password checks.
//!
//! Uses SHA-256 (via `ring`) for proofs and configured password digests, and
//! salted PBKDF2-HMAC-SHA256 for passwords of self-registered accounts.

use crate::models::certificate::CertificateRecord;
use crate::utils::serialization::canonical_proof_bytes;
use crate::error::RegistryError;
use ring::digest::{digest, SHA256};
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

/// Prefix of PBKDF2 password hashes: `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`.
const PBKDF2_SCHEME: &str = "pbkdf2-sha256";
const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const CREDENTIAL_LEN: usize = 32;

/// Computes a SHA-256 hash of the input data.
///
/// # Arguments
/// * `data` - Binary data to hash (as bytes slice)
///
/// # Returns
/// Fixed-size 32-byte array (`[u8; 32]`) containing the hash.
pub fn hash_data(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(digest(&SHA256, data).as_ref());
    out
}

/// Lowercase hex SHA-256 digest of `data`, without prefix.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(hash_data(data))
}

/// Computes the integrity proof of a certificate record.
///
/// The proof is `0x` + hex SHA-256 over the canonical encoding of the
/// immutable fields only, so revocation does not change it while any edit of
/// an immutable field does. The stored `integrity_proof` and `status` fields
/// are ignored.
pub fn integrity_proof(record: &CertificateRecord) -> String {
    format!("0x{}", sha256_hex(&canonical_proof_bytes(record)))
}

/// Recomputes the proof of `record` and compares it to the stored one.
pub fn proof_matches(record: &CertificateRecord) -> bool {
    ring::constant_time::verify_slices_are_equal(
        integrity_proof(record).as_bytes(),
        record.integrity_proof.as_bytes(),
    )
    .is_ok()
}

/// Constant-time check of a plaintext password against a stored SHA-256 hex digest.
pub fn password_matches(password: &str, expected_sha256_hex: &str) -> bool {
    let expected = expected_sha256_hex.trim().to_ascii_lowercase();
    ring::constant_time::verify_slices_are_equal(
        sha256_hex(password.as_bytes()).as_bytes(),
        expected.as_bytes(),
    )
    .is_ok()
}

/// Derives a salted PBKDF2 hash of `password` for storage.
pub fn hash_password(password: &str) -> Result<String, RegistryError> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| RegistryError::Storage("system random source unavailable".into()))?;

    let iterations = NonZeroU32::new(PBKDF2_ITERATIONS)
        .ok_or_else(|| RegistryError::Storage("invalid PBKDF2 iteration count".into()))?;
    let mut credential = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &mut credential,
    );
    Ok(format!(
        "{}${}${}${}",
        PBKDF2_SCHEME,
        PBKDF2_ITERATIONS,
        hex::encode(salt),
        hex::encode(credential)
    ))
}

/// Checks `password` against a stored hash: either a PBKDF2 hash produced by
/// [`hash_password`] or a bare SHA-256 hex digest from configuration.
///
/// Malformed stored hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some(rest) = stored.strip_prefix(PBKDF2_SCHEME).and_then(|r| r.strip_prefix('$')) else {
        return password_matches(password, stored);
    };

    let mut parts = rest.split('$');
    let (Some(iterations), Some(salt), Some(credential), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return false;
    };
    let iterations = match iterations.parse::<u32>().ok().and_then(NonZeroU32::new) {
        Some(iterations) => iterations,
        None => return false,
    };
    match (hex::decode(salt), hex::decode(credential)) {
        (Ok(salt), Ok(credential)) => pbkdf2::verify(
            pbkdf2::PBKDF2_HMAC_SHA256,
            iterations,
            &salt,
            password.as_bytes(),
            &credential,
        )
        .is_ok(),
        _ => false,
    }
}
