// src/utils/serialization.rs
//! Serialization utilities for the certificate registry.
//!
//! Provides serialization and deserialization functions for:
//! - JSON data structures (durable store snapshots)
//! - Canonical byte encoding of the fields covered by an integrity proof

use crate::models::certificate::CertificateRecord;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json;

/// Serializes a value to a pretty-printed JSON string.
///
/// # Returns
/// - `Ok(String)` with JSON representation on success
/// - `Err(serde_json::Error)` if serialization fails
pub fn serialize<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(data)
}

/// Deserializes a value from a JSON string.
///
/// # Note
/// The function uses a lifetime parameter to ensure the deserialized value
/// doesn't outlive the input data. This allows borrowing data from the input string.
pub fn deserialize<'a, T: Deserialize<'a>>(data: &'a str) -> Result<T, serde_json::Error> {
    serde_json::from_str(data)
}

/// The immutable fields of a certificate, in proof order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProofFields<'a> {
    id: &'a str,
    student_name: &'a str,
    course: &'a str,
    grade: &'a str,
    completion_date: &'a str,
    institution: &'a str,
    issued_date: String,
}

/// Canonical encoding of the immutable certificate fields.
///
/// Compact JSON object with a fixed key order; the timestamp is rendered as
/// RFC 3339 with nanosecond precision so a record reloaded from storage
/// encodes identically.
pub fn canonical_proof_bytes(record: &CertificateRecord) -> Vec<u8> {
    let fields = ProofFields {
        id: &record.id,
        student_name: &record.student_name,
        course: &record.course,
        grade: &record.grade,
        completion_date: &record.completion_date,
        institution: &record.institution,
        issued_date: record.issued_date.to_rfc3339_opts(SecondsFormat::Nanos, true),
    };
    // A struct of strings cannot fail to serialize.
    serde_json::to_vec(&fields).unwrap_or_default()
}
