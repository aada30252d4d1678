//! HTTP server assembly: application state, router and startup.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{header::AUTHORIZATION, HeaderMap, Method},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::api::errors::ApiError;
use crate::api::handlers;
use crate::auth::policy::{authorize, RouteClass};
use crate::auth::{IdentityResolver, TokenVerifier};
use crate::certificate::{CertificateIssuer, PublicVerifier};
use crate::completion::CompletionEvaluator;
use crate::enrollment::EnrollmentLedger;
use crate::notify::NotificationDispatcher;
use crate::storage::Store;
use crate::types::Account;

/// Application state: explicitly constructed, injectable components with
/// defined lifecycles. No module-level singletons.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub resolver: Arc<IdentityResolver>,
    pub ledger: Arc<EnrollmentLedger>,
    pub evaluator: Arc<CompletionEvaluator>,
    pub issuer: Arc<CertificateIssuer>,
    pub verifier: Arc<PublicVerifier>,
    pub notifier: Arc<dyn NotificationDispatcher>,
    pub site_name: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        token_verifier: Arc<dyn TokenVerifier>,
        notifier: Arc<dyn NotificationDispatcher>,
        site_name: String,
    ) -> Self {
        Self {
            resolver: Arc::new(IdentityResolver::new(token_verifier, store.clone())),
            ledger: Arc::new(EnrollmentLedger::new(store.clone())),
            evaluator: Arc::new(CompletionEvaluator::new(store.clone())),
            issuer: Arc::new(CertificateIssuer::new(store.clone())),
            verifier: Arc::new(PublicVerifier::new(store.clone())),
            notifier,
            site_name,
            store,
        }
    }

    /// Resolve the request's bearer credential and gate it against the
    /// route's required capability. Runs before any business logic.
    pub async fn require_account(
        &self,
        headers: &HeaderMap,
        class: RouteClass,
    ) -> Result<Account, ApiError> {
        let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        let account = self.resolver.resolve(authorization).await?;
        authorize(Some(&account), class)?;
        Ok(account)
    }
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        service: "coursegate".to_string(),
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Public certificate validation
        .route("/verify/:code", get(handlers::verify::verify_certificate))
        // Admin: enrollment lifecycle
        .route(
            "/api/admin/enrollments",
            post(handlers::admin::grant_enrollment),
        )
        .route(
            "/api/admin/enrollments/:id/revoke",
            put(handlers::admin::revoke_enrollment),
        )
        // Student: courses, progress, certificates
        .route("/api/student/courses", get(handlers::student::list_courses))
        .route(
            "/api/student/courses/:id",
            get(handlers::student::course_detail),
        )
        .route(
            "/api/student/progress",
            post(handlers::student::report_progress),
        )
        .route(
            "/api/student/certificates",
            post(handlers::student::request_certificate),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    log::info!("CourseGate engine listening on http://0.0.0.0:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}
