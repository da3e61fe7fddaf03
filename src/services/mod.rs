// src/services/mod.rs
//! Business logic and API.

pub mod api_server;
pub mod auth;
pub mod registry;
pub mod verifier;
