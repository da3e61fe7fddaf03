// src/services/api_server.rs
//! API Server for the Certificate Registry
//!
//! This module provides the REST API interface consumed by the certificate
//! web client. The API is built using Axum and includes endpoints for:
//! - Login (access token issuance)
//! - Certificate issuance, revocation and listing
//! - Public certificate verification
//!
//! Reads are public. Issuance and revocation require an
//! `Authorization: Bearer <token>` header obtained from `POST /login` or
//! `POST /register`.

use crate::error::RegistryError;
use crate::models::account::Registration;
use crate::models::certificate::{
    CertificateDraft, CertificateFilter, CertificateRecord, CertificateStatus, VerificationOutcome,
};
use crate::models::identity::{Identity, Role};
use crate::services::auth::TokenService;
use crate::services::registry::CertificateRegistry;
use crate::services::verifier::Verifier;
use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Json, Path, Query, State,
    },
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

// API request and response structures

/// Request payload for logging in
#[derive(Serialize, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

/// Response containing an access token
#[derive(Serialize, Deserialize)]
struct LoginResponse {
    token: String,
    username: String,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    institution: Option<String>,
}

impl LoginResponse {
    fn new(token: String, identity: Identity) -> Self {
        LoginResponse {
            token,
            username: identity.subject,
            role: identity.role,
            institution: identity.institution,
        }
    }
}

/// Response for certificate issuance
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueCertificateResponse {
    success: bool,
    certificate_id: String,
    integrity_proof: String,
    /// Public verification link, suitable for a QR code
    verify_url: String,
}

/// Response for certificate verification
#[derive(Serialize, Deserialize)]
struct VerifyCertificateResponse {
    success: bool,
    result: VerificationOutcome,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<CertificateRecord>,
}

/// Response for certificate revocation
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevokeCertificateResponse {
    success: bool,
    certificate_id: String,
    status: CertificateStatus,
    revoked_at: Option<DateTime<Utc>>,
}

/// Query string of the listing endpoint
#[derive(Deserialize)]
struct ListCertificatesQuery {
    institution: Option<String>,
    student: Option<String>,
    status: Option<String>,
}

impl ListCertificatesQuery {
    fn into_filter(self) -> Result<CertificateFilter, RegistryError> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Ok(CertificateFilter {
            institution: non_empty(self.institution),
            student: non_empty(self.student),
            status: non_empty(self.status).map(|s| s.parse::<CertificateStatus>()).transpose()?,
        })
    }
}

/// Liveness response
#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    certificates: usize,
}

/// Identity of the caller, taken from the request's bearer token.
pub struct Authenticated(pub Identity);

#[async_trait]
impl FromRequestParts<Arc<ApiServer>> for Authenticated {
    type Rejection = RegistryError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<ApiServer>) -> Result<Self, Self::Rejection> {
        state.tokens.authenticate(&parts.headers).map(Authenticated)
    }
}

/// Runs a blocking registry call off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, RegistryError>
where
    F: FnOnce() -> Result<T, RegistryError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RegistryError::Storage(format!("registry task failed: {}", e)))?
}

/// API server state containing all service dependencies
pub struct ApiServer {
    /// Service for issuing, revoking and listing certificates
    registry: Arc<CertificateRegistry>,

    /// Service for verifying certificates
    verifier: Arc<Verifier>,

    /// Service for login and access tokens
    tokens: Arc<TokenService>,

    /// Base URL verification links are built from
    public_base_url: String,
}

impl ApiServer {
    /// Creates a new instance of the API server
    ///
    /// # Arguments
    /// * `registry` - Service for certificate writes and listing
    /// * `verifier` - Service for certificate verification
    /// * `tokens` - Service for login and token validation
    /// * `public_base_url` - Externally reachable URL of the client
    pub fn new(
        registry: CertificateRegistry,
        verifier: Verifier,
        tokens: TokenService,
        public_base_url: String,
    ) -> Self {
        ApiServer {
            registry: Arc::new(registry),
            verifier: Arc::new(verifier),
            tokens: Arc::new(tokens),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Builds the router with all API routes
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(Self::health_handler))
            .route("/login", post(Self::login_handler))
            .route("/register", post(Self::register_handler))
            .route(
                "/certificates",
                post(Self::issue_certificate_handler).get(Self::list_certificates_handler),
            )
            .route(
                "/certificates/:id",
                get(Self::get_certificate_handler).patch(Self::revoke_certificate_handler),
            )
            .route("/certificates/:id/verify", get(Self::verify_certificate_handler))
            .with_state(Arc::new(self.clone())) // Share the entire ApiServer state
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        // The web client is served from a different origin
        let app = self
            .router()
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

        let listener = tokio::net::TcpListener::bind(addr).await?;
        log::info!("API server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, app).await
    }

    fn verify_url(&self, certificate_id: &str) -> String {
        format!("{}/verify/{}", self.public_base_url, certificate_id)
    }

    /// Liveness check with the stored certificate count
    ///
    /// # Endpoint
    /// GET /health
    async fn health_handler(State(state): State<Arc<ApiServer>>) -> Result<impl IntoResponse, RegistryError> {
        let certificates = state.registry.count()?;
        Ok(Json(HealthResponse {
            status: "ok".into(),
            certificates,
        }))
    }

    // =====================
    // Auth Handlers
    // =====================

    /// Authenticates a user and returns an access token
    ///
    /// # Endpoint
    /// POST /login
    ///
    /// # Responses
    /// - 200 OK: Returns token, role and institution
    /// - 401 Unauthorized: Invalid credentials
    /// - 422 Unprocessable Entity: Malformed body
    async fn login_handler(
        State(state): State<Arc<ApiServer>>,
        payload: Result<Json<LoginRequest>, JsonRejection>,
    ) -> Result<impl IntoResponse, RegistryError> {
        let Json(payload) = payload.map_err(|e| RegistryError::Validation(e.body_text()))?;
        let tokens = state.tokens.clone();
        let (token, identity) = blocking(move || tokens.login(&payload.username, &payload.password)).await?;
        Ok(Json(LoginResponse::new(token, identity)))
    }

    /// Creates an account and returns an access token for it
    ///
    /// # Endpoint
    /// POST /register
    ///
    /// # Request Body
    /// `{name, email, password, confirmPassword?, role, institutionCode?}`
    ///
    /// # Responses
    /// - 201 Created: Returns token, username, role and institution
    /// - 403 Forbidden: Registration disabled, admin role or unknown institution code
    /// - 409 Conflict: Email already registered
    /// - 422 Unprocessable Entity: Missing or invalid fields
    async fn register_handler(
        State(state): State<Arc<ApiServer>>,
        payload: Result<Json<Registration>, JsonRejection>,
    ) -> Result<impl IntoResponse, RegistryError> {
        let Json(registration) = payload.map_err(|e| RegistryError::Validation(e.body_text()))?;
        let tokens = state.tokens.clone();
        let (token, identity) = blocking(move || tokens.register(registration)).await?;
        Ok((StatusCode::CREATED, Json(LoginResponse::new(token, identity))))
    }

    // =====================
    // Certificate Handlers
    // =====================

    /// Issues a new certificate for the caller's institution
    ///
    /// # Endpoint
    /// POST /certificates
    ///
    /// # Request Body
    /// `{studentName, course, grade, completionDate}`
    ///
    /// # Responses
    /// - 201 Created: Returns certificate id, integrity proof and verify URL
    /// - 401 Unauthorized: Missing or invalid token
    /// - 403 Forbidden: Caller is not an issuing institution
    /// - 422 Unprocessable Entity: Missing or empty fields
    async fn issue_certificate_handler(
        State(state): State<Arc<ApiServer>>,
        Authenticated(issuer): Authenticated,
        payload: Result<Json<CertificateDraft>, JsonRejection>,
    ) -> Result<impl IntoResponse, RegistryError> {
        let Json(draft) = payload.map_err(|e| RegistryError::Validation(e.body_text()))?;
        let registry = state.registry.clone();
        let record = blocking(move || registry.issue(draft, &issuer)).await?;

        Ok((
            StatusCode::CREATED,
            Json(IssueCertificateResponse {
                success: true,
                verify_url: state.verify_url(&record.id),
                certificate_id: record.id,
                integrity_proof: record.integrity_proof,
            }),
        ))
    }

    /// Lists certificates, newest first
    ///
    /// # Endpoint
    /// GET /certificates?institution=…&student=…&status=…
    ///
    /// # Responses
    /// - 200 OK: Array of certificate records
    /// - 422 Unprocessable Entity: Unknown status value
    async fn list_certificates_handler(
        State(state): State<Arc<ApiServer>>,
        query: Result<Query<ListCertificatesQuery>, QueryRejection>,
    ) -> Result<impl IntoResponse, RegistryError> {
        let Query(query) = query.map_err(|e| RegistryError::Validation(e.body_text()))?;
        let filter = query.into_filter()?;
        Ok(Json(state.registry.list(&filter)?))
    }

    /// Fetches a single certificate record as stored
    ///
    /// # Endpoint
    /// GET /certificates/:id
    ///
    /// # Responses
    /// - 200 OK: Certificate record
    /// - 404 Not Found: Unknown id
    async fn get_certificate_handler(
        Path(id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> Result<impl IntoResponse, RegistryError> {
        Ok(Json(state.registry.get(&id)?))
    }

    /// Verifies a certificate
    ///
    /// # Endpoint
    /// GET /certificates/:id/verify
    ///
    /// # Responses
    /// - 200 OK: `{success, result, message, data?}` for every outcome,
    ///   including not found, revoked and tampered
    async fn verify_certificate_handler(
        Path(id): Path<String>,
        State(state): State<Arc<ApiServer>>,
    ) -> Result<impl IntoResponse, RegistryError> {
        let result = state.verifier.verify(&id)?;
        Ok(Json(VerifyCertificateResponse {
            success: result.success(),
            result: result.outcome,
            message: result.message().to_string(),
            data: result.record,
        }))
    }

    /// Revokes a certificate
    ///
    /// # Endpoint
    /// PATCH /certificates/:id
    ///
    /// # Responses
    /// - 200 OK: Updated status
    /// - 401 Unauthorized: Missing or invalid token
    /// - 403 Forbidden: Caller neither issued the certificate nor is an admin
    /// - 404 Not Found: Unknown id
    /// - 409 Conflict: Already revoked
    async fn revoke_certificate_handler(
        Path(id): Path<String>,
        State(state): State<Arc<ApiServer>>,
        Authenticated(actor): Authenticated,
    ) -> Result<impl IntoResponse, RegistryError> {
        let registry = state.registry.clone();
        let record = blocking(move || registry.revoke(&id, &actor)).await?;
        Ok(Json(RevokeCertificateResponse {
            success: true,
            certificate_id: record.id,
            status: record.status,
            revoked_at: record.revoked_at,
        }))
    }
}

// Implement Clone for ApiServer to use with Axum's State
impl Clone for ApiServer {
    fn clone(&self) -> Self {
        ApiServer {
            registry: Arc::clone(&self.registry),
            verifier: Arc::clone(&self.verifier),
            tokens: Arc::clone(&self.tokens),
            public_base_url: self.public_base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AccountSettings, AuthSettings, InstitutionCodeSettings, StorageBackend, StorageSettings};
    use crate::storage::memory::MemoryStore;
    use crate::storage::open_accounts;
    use crate::utils::crypto::sha256_hex;
    use axum::body::Body;
    use axum::http::{header, Request};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestApp {
        router: Router,
        store: Arc<MemoryStore>,
    }

    fn test_app() -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let auth = AuthSettings {
            jwt_secret: "test-secret".into(),
            token_ttl_secs: 600,
            accounts: vec![
                AccountSettings {
                    username: "registrar".into(),
                    password_sha256: sha256_hex(b"registrar-pass"),
                    role: Role::Institution,
                    institution: Some("Tech University".into()),
                },
                AccountSettings {
                    username: "dean".into(),
                    password_sha256: sha256_hex(b"dean-pass"),
                    role: Role::Institution,
                    institution: Some("Other College".into()),
                },
                AccountSettings {
                    username: "root".into(),
                    password_sha256: sha256_hex(b"root-pass"),
                    role: Role::Admin,
                    institution: None,
                },
                AccountSettings {
                    username: "hr".into(),
                    password_sha256: sha256_hex(b"hr-pass"),
                    role: Role::Recruiter,
                    institution: None,
                },
            ],
            allow_registration: true,
            institution_codes: vec![InstitutionCodeSettings {
                institution: "Tech University".into(),
                code_sha256: sha256_hex(b"INST-12345"),
            }],
        };
        let storage = StorageSettings {
            backend: StorageBackend::Memory,
            path: "certificates.json".into(),
            accounts_path: "accounts.json".into(),
        };
        let accounts = open_accounts(&storage, &auth).unwrap();
        let server = ApiServer::new(
            CertificateRegistry::new(store.clone()),
            Verifier::new(store.clone()),
            TokenService::new(&auth, accounts),
            "https://certs.example.org/".into(),
        );
        TestApp {
            router: server.router(),
            store,
        }
    }

    async fn send(app: &TestApp, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn login(app: &TestApp, username: &str, password: &str) -> String {
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"username": username, "password": password}).to_string()))
            .unwrap();
        let (status, body) = send(app, req).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn register(app: &TestApp, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, req).await
    }

    async fn issue(app: &TestApp, token: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/certificates")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, req).await
    }

    async fn revoke(app: &TestApp, token: Option<&str>, id: &str) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("PATCH").uri(format!("/certificates/{}", id));
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        send(app, builder.body(Body::empty()).unwrap()).await
    }

    async fn get(app: &TestApp, uri: &str) -> (StatusCode, Value) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    fn alice() -> Value {
        json!({
            "studentName": "Alice",
            "course": "CS",
            "grade": "A",
            "completionDate": "2024-05-15"
        })
    }

    #[tokio::test]
    async fn issue_verify_revoke_scenario() {
        let app = test_app();
        let token = login(&app, "registrar", "registrar-pass").await;

        let (status, issued) = issue(&app, &token, alice()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(issued["success"], true);
        let id = issued["certificateId"].as_str().unwrap().to_string();
        assert!(issued["integrityProof"].as_str().unwrap().starts_with("0x"));
        assert_eq!(issued["verifyUrl"], format!("https://certs.example.org/verify/{}", id));

        let (status, verified) = get(&app, &format!("/certificates/{}/verify", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified["success"], true);
        assert_eq!(verified["result"], "valid");
        assert_eq!(verified["data"]["studentName"], "Alice");
        assert_eq!(verified["data"]["institution"], "Tech University");

        let (status, revoked) = revoke(&app, Some(token.as_str()), &id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(revoked["status"], "revoked");
        assert!(revoked["revokedAt"].is_string());

        let (_, verified) = get(&app, &format!("/certificates/{}/verify", id)).await;
        assert_eq!(verified["success"], false);
        assert_eq!(verified["result"], "revoked");
        assert!(verified["message"].as_str().unwrap().contains("revoked"));
        assert_eq!(verified["data"]["id"], id.as_str());

        let (status, unknown) = get(&app, "/certificates/CERT-9999-999/verify").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unknown["success"], false);
        assert_eq!(unknown["result"], "not_found");
        assert!(unknown["message"].as_str().unwrap().contains("not found"));
        assert!(unknown.get("data").is_none());
    }

    #[tokio::test]
    async fn second_revoke_is_conflict() {
        let app = test_app();
        let token = login(&app, "registrar", "registrar-pass").await;
        let (_, issued) = issue(&app, &token, alice()).await;
        let id = issued["certificateId"].as_str().unwrap();

        assert_eq!(revoke(&app, Some(token.as_str()), id).await.0, StatusCode::OK);
        let (status, body) = revoke(&app, Some(token.as_str()), id).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["kind"], "already_revoked_error");
    }

    #[tokio::test]
    async fn tampered_record_reported() {
        let app = test_app();
        let token = login(&app, "registrar", "registrar-pass").await;
        let (_, issued) = issue(&app, &token, alice()).await;
        let id = issued["certificateId"].as_str().unwrap();

        app.store.tamper(id, |r| r.student_name = "Mallory".into());

        let (status, verified) = get(&app, &format!("/certificates/{}/verify", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(verified["success"], false);
        assert_eq!(verified["result"], "tampered");
        assert!(verified["message"].as_str().unwrap().contains("tampered"));
    }

    #[tokio::test]
    async fn issuance_requires_institution_token() {
        let app = test_app();

        let (status, _) = issue(&app, "garbage", alice()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .method("POST")
            .uri("/certificates")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(alice().to_string()))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["kind"], "unauthorized_error");

        let token = login(&app, "hr", "hr-pass").await;
        let (status, body) = issue(&app, &token, alice()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["kind"], "forbidden_error");

        let token = login(&app, "root", "root-pass").await;
        assert_eq!(issue(&app, &token, alice()).await.0, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn issuance_validates_fields() {
        let app = test_app();
        let token = login(&app, "registrar", "registrar-pass").await;

        let (status, body) = issue(&app, &token, json!({"studentName": "Alice", "course": "CS"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "validation_error");
        assert!(body["error"]["message"].as_str().unwrap().contains("grade"));

        let (status, _) = issue(&app, &token, json!({"studentName": 42})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn revocation_rights() {
        let app = test_app();
        let registrar = login(&app, "registrar", "registrar-pass").await;
        let (_, issued) = issue(&app, &registrar, alice()).await;
        let id = issued["certificateId"].as_str().unwrap();

        assert_eq!(revoke(&app, None, id).await.0, StatusCode::UNAUTHORIZED);

        let dean = login(&app, "dean", "dean-pass").await;
        assert_eq!(revoke(&app, Some(dean.as_str()), id).await.0, StatusCode::FORBIDDEN);

        let root = login(&app, "root", "root-pass").await;
        assert_eq!(revoke(&app, Some(root.as_str()), "CERT-9999-999").await.0, StatusCode::NOT_FOUND);
        assert_eq!(revoke(&app, Some(root.as_str()), id).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn listing_filters_by_institution_and_status() {
        let app = test_app();
        let registrar = login(&app, "registrar", "registrar-pass").await;
        let dean = login(&app, "dean", "dean-pass").await;

        let (_, first) = issue(&app, &registrar, alice()).await;
        issue(&app, &registrar, json!({
            "studentName": "Bob", "course": "Math", "grade": "B", "completionDate": "2024-06-10"
        }))
        .await;
        issue(&app, &dean, alice()).await;
        revoke(&app, Some(registrar.as_str()), first["certificateId"].as_str().unwrap()).await;

        let (status, all) = get(&app, "/certificates").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 3);

        let (_, tech) = get(&app, "/certificates?institution=Tech%20University").await;
        let tech = tech.as_array().unwrap();
        assert_eq!(tech.len(), 2);
        assert_eq!(tech[0]["studentName"], "Bob");
        assert_eq!(tech[1]["studentName"], "Alice");

        let (_, revoked) = get(&app, "/certificates?status=revoked").await;
        assert_eq!(revoked.as_array().unwrap().len(), 1);

        let (_, alices) = get(&app, "/certificates?student=alice&status=active").await;
        assert_eq!(alices.as_array().unwrap().len(), 1);

        let (status, body) = get(&app, "/certificates?status=expired").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "validation_error");
    }

    #[tokio::test]
    async fn get_certificate_and_health() {
        let app = test_app();
        let token = login(&app, "registrar", "registrar-pass").await;
        let (_, issued) = issue(&app, &token, alice()).await;
        let id = issued["certificateId"].as_str().unwrap();

        let (status, record) = get(&app, &format!("/certificates/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["course"], "CS");
        assert_eq!(record["status"], "active");

        assert_eq!(get(&app, "/certificates/CERT-9999-999").await.0, StatusCode::NOT_FOUND);

        let (status, health) = get(&app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["status"], "ok");
        assert_eq!(health["certificates"], 1);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let app = test_app();
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({"username": "root", "password": "nope"}).to_string()))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn registered_institution_can_issue() {
        let app = test_app();
        let (status, body) = register(&app, json!({
            "name": "Dana Dean",
            "email": "Dana@Tech.edu",
            "password": "registrar-2024",
            "confirmPassword": "registrar-2024",
            "role": "institution",
            "institutionCode": "INST-12345"
        }))
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        assert_eq!(body["username"], "dana@tech.edu");
        assert_eq!(body["role"], "institution");
        assert_eq!(body["institution"], "Tech University");

        let token = body["token"].as_str().unwrap();
        let (status, issued) = issue(&app, token, alice()).await;
        assert_eq!(status, StatusCode::CREATED);

        let token = login(&app, "dana@tech.edu", "registrar-2024").await;
        let id = issued["certificateId"].as_str().unwrap();
        assert_eq!(revoke(&app, Some(token.as_str()), id).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn registration_rules() {
        let app = test_app();
        let student = json!({
            "name": "Émile Zola",
            "email": "emile@example.org",
            "password": "j'accuse!",
            "role": "student"
        });

        let (status, body) = register(&app, student.clone()).await;
        assert_eq!(status, StatusCode::CREATED);
        assert!(body.get("institution").is_none());
        let (status, _) = issue(&app, body["token"].as_str().unwrap(), alice()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = register(&app, student).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["kind"], "conflict_error");

        let (status, _) = register(&app, json!({
            "name": "Root", "email": "root@example.org", "password": "longenough", "role": "admin"
        }))
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = register(&app, json!({
            "name": "Fake Dean", "email": "fake@tech.edu", "password": "longenough",
            "role": "institution", "institutionCode": "INST-00000"
        }))
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = register(&app, json!({
            "name": "Bob", "email": "bob@example.org", "password": "short", "role": "student"
        }))
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"]["message"].as_str().unwrap().contains("password"));

        let (status, _) = register(&app, json!({"name": "Bob", "role": "wizard"})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
