//! CourseGate engine: access control, enrollment lifecycle and
//! certificate issuance for a learning platform.
//!
//! The engine is stateless per request; all durable state lives behind the
//! [`storage::Store`] trait. Request flow: identity resolution
//! ([`auth::IdentityResolver`]), policy gating ([`auth::policy`]), then the
//! domain components — [`enrollment::EnrollmentLedger`],
//! [`completion::CompletionEvaluator`], [`certificate::CertificateIssuer`]
//! and the unauthenticated [`certificate::PublicVerifier`].

pub mod api;
pub mod audit;
pub mod auth;
pub mod certificate;
pub mod completion;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod notify;
pub mod storage;
pub mod types;

pub use error::{EngineError, EngineResult};
