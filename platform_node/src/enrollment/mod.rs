//! Enrollment ledger: grant/revoke/expire state machine for
//! (account, course) pairs.
//!
//! State machine: rows are created `active`; the only transition is
//! `active -> revoked` via an explicit admin revoke. A re-grant re-enters
//! the initial state through the upsert and is audited as a new grant
//! event, not as an un-revoke.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::error::{EngineError, EngineResult};
use crate::storage::{Store, StoreError};
use crate::types::{Account, AuditAction, Enrollment, EnrollmentStatus, Role};

/// Who an admin grant is aimed at.
#[derive(Debug, Clone)]
pub enum GrantTarget {
    AccountId(Uuid),
    Email(String),
}

/// Result of a grant: the enrollment, the (possibly just provisioned)
/// account, and whether a credential-setup notification is warranted.
#[derive(Debug, Clone, Serialize)]
pub struct GrantOutcome {
    pub enrollment: Enrollment,
    pub account: Account,
    pub course_title: String,
    pub newly_provisioned: bool,
}

/// The single source of truth for "can this account use this course now".
/// Every consumer (course listing, course detail, certificate eligibility)
/// goes through this predicate.
pub fn is_effectively_active(enrollment: &Enrollment, now: DateTime<Utc>) -> bool {
    enrollment.status == EnrollmentStatus::Active
        && enrollment.access_end_at.map(|end| end > now).unwrap_or(true)
}

pub struct EnrollmentLedger {
    store: Arc<dyn Store>,
    audit: AuditLog,
}

impl EnrollmentLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let audit = AuditLog::new(store.clone());
        Self { store, audit }
    }

    /// Admin grant. Provisions a student account when the target is an
    /// email with no matching profile (the one permitted implicit-creation
    /// path). `days_valid` absent or non-positive means unlimited access.
    pub async fn grant(
        &self,
        actor: &Account,
        target: GrantTarget,
        course_id: Uuid,
        days_valid: Option<i64>,
    ) -> EngineResult<GrantOutcome> {
        let course = self
            .store
            .course(course_id)
            .await?
            .ok_or(EngineError::InvalidCourse)?;

        let (account, newly_provisioned) = self.resolve_target(target).await?;

        let access_end_at = match days_valid {
            Some(days) if days > 0 => Some(Utc::now() + Duration::days(days)),
            _ => None,
        };

        let enrollment = self
            .store
            .upsert_enrollment(account.id, course_id, access_end_at)
            .await?;

        self.audit
            .record(
                actor.id,
                AuditAction::GrantAccess,
                "enrollments",
                enrollment.id,
                serde_json::json!({
                    "account_id": account.id,
                    "course_id": course_id,
                    "days_valid": days_valid,
                    "access_end_at": access_end_at,
                    "newly_provisioned": newly_provisioned,
                }),
            )
            .await?;

        Ok(GrantOutcome {
            enrollment,
            account,
            course_title: course.title,
            newly_provisioned,
        })
    }

    /// Revoke an enrollment. Revoking an already-revoked row succeeds as a
    /// no-op and appends no audit entry; only an actual `active -> revoked`
    /// transition is audited.
    pub async fn revoke(&self, actor: &Account, enrollment_id: Uuid) -> EngineResult<Enrollment> {
        match self.store.revoke_enrollment(enrollment_id).await {
            Ok(Some(enrollment)) => {
                self.audit
                    .record(
                        actor.id,
                        AuditAction::RevokeAccess,
                        "enrollments",
                        enrollment.id,
                        serde_json::json!({
                            "account_id": enrollment.account_id,
                            "course_id": enrollment.course_id,
                        }),
                    )
                    .await?;
                Ok(enrollment)
            }
            Ok(None) => self
                .store
                .enrollment(enrollment_id)
                .await?
                .ok_or(EngineError::NotFound),
            Err(StoreError::NotFound(_)) => Err(EngineError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve_target(&self, target: GrantTarget) -> EngineResult<(Account, bool)> {
        match target {
            GrantTarget::AccountId(id) => {
                let account = self
                    .store
                    .account(id)
                    .await?
                    .ok_or(EngineError::InvalidTarget)?;
                Ok((account, false))
            }
            GrantTarget::Email(email) => {
                let email = email.trim().to_lowercase();
                if email.is_empty() || !email.contains('@') {
                    return Err(EngineError::InvalidTarget);
                }
                if let Some(existing) = self.store.account_by_email(&email).await? {
                    return Ok((existing, false));
                }
                let account = Account {
                    id: Uuid::new_v4(),
                    full_name: email
                        .split('@')
                        .next()
                        .unwrap_or(email.as_str())
                        .to_string(),
                    email: email.clone(),
                    role: Role::Student,
                    created_at: Utc::now(),
                };
                match self.store.insert_account(account.clone()).await {
                    Ok(()) => Ok((account, true)),
                    // Lost a provisioning race; the winner's row is the target.
                    Err(StoreError::UniqueViolation { .. }) => {
                        let existing = self
                            .store
                            .account_by_email(&email)
                            .await?
                            .ok_or(EngineError::InvalidTarget)?;
                        Ok((existing, false))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}
