// src/models/mod.rs
//! Data structures shared across services and storage.

pub mod account;
pub mod certificate;
pub mod identity;
