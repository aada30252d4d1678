//! Storage boundary for the engine.
//!
//! All durable state lives behind the [`Store`] trait. Mutations that must
//! be race-safe (enrollment upsert, conditional revoke, certificate insert)
//! are expressed as single store calls so an implementation can enforce them
//! with unique keys and conditional writes instead of read-then-write in
//! application code.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{
    Account, AuditEntry, Certificate, Course, CourseModule, Enrollment, Lesson, ProgressMark,
};

pub mod memory;

pub use memory::MemoryStore;

/// Storage-specific Result type.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: &'static str },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Unique-constraint names surfaced through [`StoreError::UniqueViolation`].
pub mod constraints {
    pub const ACCOUNT_EMAIL: &str = "accounts.email";
    pub const CERT_ACCOUNT_COURSE: &str = "certificates.account_id_course_id";
    pub const CERT_VALIDATION_CODE: &str = "certificates.validation_code";
}

#[async_trait]
pub trait Store: Send + Sync {
    // Accounts
    async fn account(&self, id: Uuid) -> Result<Option<Account>>;
    async fn account_by_email(&self, email: &str) -> Result<Option<Account>>;
    /// Fails with `UniqueViolation(accounts.email)` on a duplicate email.
    async fn insert_account(&self, account: Account) -> Result<()>;

    // Course catalog (externally managed; written only when seeding)
    async fn course(&self, id: Uuid) -> Result<Option<Course>>;
    /// Modules with their lessons, both ordered by position.
    async fn course_outline(&self, course_id: Uuid) -> Result<Vec<(CourseModule, Vec<Lesson>)>>;
    async fn lesson(&self, id: Uuid) -> Result<Option<Lesson>>;
    async fn lesson_ids_for_course(&self, course_id: Uuid) -> Result<Vec<Uuid>>;
    async fn insert_course(
        &self,
        course: Course,
        modules: Vec<(CourseModule, Vec<Lesson>)>,
    ) -> Result<()>;

    // Enrollments
    async fn enrollment(&self, id: Uuid) -> Result<Option<Enrollment>>;
    async fn enrollment_for(&self, account_id: Uuid, course_id: Uuid)
        -> Result<Option<Enrollment>>;
    async fn enrollments_for_account(&self, account_id: Uuid) -> Result<Vec<Enrollment>>;
    /// Upsert keyed on (account_id, course_id): resets status to active and
    /// overwrites the expiry; creates the row when absent.
    async fn upsert_enrollment(
        &self,
        account_id: Uuid,
        course_id: Uuid,
        access_end_at: Option<DateTime<Utc>>,
    ) -> Result<Enrollment>;
    /// Conditional `active -> revoked` transition guarded by current status.
    /// `Ok(Some(_))` on an actual transition, `Ok(None)` when the row was
    /// already revoked, `NotFound` when the row does not exist.
    async fn revoke_enrollment(&self, id: Uuid) -> Result<Option<Enrollment>>;

    // Progress marks
    async fn upsert_progress(&self, mark: ProgressMark) -> Result<()>;
    async fn progress_for(&self, account_id: Uuid, lesson_id: Uuid)
        -> Result<Option<ProgressMark>>;
    async fn completed_lesson_count(&self, account_id: Uuid, lesson_ids: &[Uuid]) -> Result<u64>;

    // Certificates
    async fn certificate_for(&self, account_id: Uuid, course_id: Uuid)
        -> Result<Option<Certificate>>;
    async fn certificate_by_code(&self, code: &str) -> Result<Option<Certificate>>;
    /// Insert under both unique keys. A violation names the constraint so
    /// the issuer can tell "already issued" from a code collision.
    async fn insert_certificate(&self, certificate: Certificate) -> Result<()>;

    // Audit trail (append-only)
    async fn append_audit(&self, entry: AuditEntry) -> Result<()>;
    async fn audit_for_entity(&self, entity_id: Uuid) -> Result<Vec<AuditEntry>>;
}
