// src/main.rs

//! # Certificate Registry - Main Entry Point
//!
//! This module serves as the main entry point for the certificate registry and
//! verification service. It initializes all core components and starts the API
//! server.
//!
//! ## Architecture Overview
//! 1. **Storage Layer**: `CertificateStore` backends (in-memory or JSON file)
//! 2. **Services Layer**: Issuance/revocation, verification, auth and API endpoints
//! 3. **Cryptography Layer**: SHA-256 integrity proofs and HS256 access tokens
//!
//! ## Configuration
//! See [`config`] for the layering. The one required value is the token
//! signing secret:
//! - `REGISTRY__AUTH__JWT_SECRET`: HMAC secret for access tokens
//! - `REGISTRY_CONFIG`: (Optional) settings file (default: registry.toml)
//! - `RUST_LOG`: (Optional) log filter, overrides `log_level`

use crate::config::Settings;
use crate::services::api_server::ApiServer;
use crate::services::auth::TokenService;
use crate::services::registry::CertificateRegistry;
use crate::services::verifier::Verifier;
use crate::storage::{open_accounts, open_store};
use anyhow::Context;
use dotenv::dotenv;

// Module declarations (organized by functional domain)
mod config;        // Layered settings
mod error;         // Error taxonomy and HTTP mapping
mod models;        // Data structures
mod services;      // Business logic and API
mod storage;       // Certificate table backends
mod utils;         // Helper functions

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load environment and configuration
/// 2. Initialize logging
/// 3. Open the certificate store and build services
/// 4. Start API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let settings = Settings::load().context("failed to load configuration")?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_level.as_str()),
    )
    .init();
    log::debug!("loaded settings: {:?}", settings);

    // Storage shared by registry and verifier
    let store = open_store(&settings.storage).context("failed to open certificate store")?;

    let registry = CertificateRegistry::new(store.clone());
    if settings.seed_demo_data {
        registry.seed_demo().context("failed to seed demo certificates")?;
    }
    let verifier = Verifier::new(store);

    let accounts = open_accounts(&settings.storage, &settings.auth).context("failed to open account store")?;
    log::info!("{} login accounts available", accounts.len()?);
    if settings.auth.accounts.is_empty() && settings.auth.institution_codes.is_empty() {
        log::warn!("no institution accounts or codes configured; issuance is unavailable");
    }
    let tokens = TokenService::new(&settings.auth, accounts);

    // Initialize API Server with all dependencies
    let api_server = ApiServer::new(
        registry,
        verifier,
        tokens,
        settings.server.public_base_url.clone(),
    );

    let addr = settings.bind_addr()?;
    log::info!("Available endpoints:");
    log::info!("- GET   /health");
    log::info!("- POST  /login");
    log::info!("- POST  /register");
    log::info!("- POST  /certificates");
    log::info!("- GET   /certificates");
    log::info!("- GET   /certificates/:id");
    log::info!("- PATCH /certificates/:id");
    log::info!("- GET   /certificates/:id/verify");

    api_server
        .run(addr)
        .await
        .with_context(|| format!("API server on {} failed", addr))
}
