//! Core domain model shared across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform role. Closed set; role changes happen outside this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
}

/// A platform identity with a role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Course metadata. Externally managed; the engine only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Ordered grouping of lessons inside a course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub position: u32,
}

/// Atomic completion unit belonging to a course via its module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    pub id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub position: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Revoked,
}

/// Time-bounded grant of one account's access to one course.
///
/// At most one row per (account, course); a re-grant upserts the existing
/// row. Rows are never deleted, only revoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub account_id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
    /// Absolute expiry instant; `None` means unlimited access.
    pub access_end_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One account's completion state for one lesson. Upserted, never duplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressMark {
    pub account_id: Uuid,
    pub lesson_id: Uuid,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_seen_at: DateTime<Utc>,
}

/// Durable, append-only proof of course completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    pub id: Uuid,
    pub account_id: Uuid,
    pub course_id: Uuid,
    pub validation_code: String,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    GrantAccess,
    RevokeAccess,
    IssueCertificate,
}

/// Immutable record of a privileged state-changing action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub entity_kind: String,
    pub entity_id: Uuid,
    pub detail: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}
