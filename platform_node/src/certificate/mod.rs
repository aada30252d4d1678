//! Idempotent, completion-gated certificate issuance.

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::audit::AuditLog;
use crate::completion::CompletionEvaluator;
use crate::enrollment::is_effectively_active;
use crate::error::{EngineError, EngineResult};
use crate::storage::{constraints, Store, StoreError};
use crate::types::{AuditAction, Certificate};

pub mod verify;

pub use verify::{CertificateSummary, PublicVerifier};

const CODE_LEN: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Bound on validation-code regeneration after a uniqueness collision.
const MAX_CODE_ATTEMPTS: usize = 5;

/// Short, URL-safe, human-typable validation code.
pub fn generate_validation_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub struct CertificateIssuer {
    store: Arc<dyn Store>,
    evaluator: CompletionEvaluator,
    audit: AuditLog,
}

impl CertificateIssuer {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let evaluator = CompletionEvaluator::new(store.clone());
        let audit = AuditLog::new(store.clone());
        Self {
            store,
            evaluator,
            audit,
        }
    }

    /// Mint at most one certificate per (account, course), ever.
    ///
    /// Re-issuance returns the existing certificate unchanged. Completion
    /// is evaluated before the enrollment window is checked, so an expired
    /// student still sees their exact progress counts elsewhere. A losing
    /// racer on the (account, course) unique key reads and returns the
    /// winner's row instead of failing.
    pub async fn issue(&self, account_id: Uuid, course_id: Uuid) -> EngineResult<Certificate> {
        if let Some(existing) = self.store.certificate_for(account_id, course_id).await? {
            return Ok(existing);
        }

        let progress = self.evaluator.evaluate(account_id, course_id).await?;
        if !progress.is_complete() {
            return Err(EngineError::IncompleteProgress {
                completed: progress.completed_units,
                total: progress.total_units,
            });
        }

        let enrollment = self
            .store
            .enrollment_for(account_id, course_id)
            .await?
            .ok_or(EngineError::AccessExpired)?;
        if !is_effectively_active(&enrollment, Utc::now()) {
            return Err(EngineError::AccessExpired);
        }

        for _ in 0..MAX_CODE_ATTEMPTS {
            let certificate = Certificate {
                id: Uuid::new_v4(),
                account_id,
                course_id,
                validation_code: generate_validation_code(),
                issued_at: Utc::now(),
            };
            match self.store.insert_certificate(certificate.clone()).await {
                Ok(()) => {
                    self.audit
                        .record(
                            account_id,
                            AuditAction::IssueCertificate,
                            "certificates",
                            certificate.id,
                            serde_json::json!({
                                "course_id": course_id,
                                "validation_code": certificate.validation_code,
                            }),
                        )
                        .await?;
                    return Ok(certificate);
                }
                // A concurrent request won the (account, course) key:
                // already issued, return the winner's certificate.
                Err(StoreError::UniqueViolation { constraint })
                    if constraint == constraints::CERT_ACCOUNT_COURSE =>
                {
                    return self
                        .store
                        .certificate_for(account_id, course_id)
                        .await?
                        .ok_or_else(|| {
                            StoreError::Unavailable(
                                "certificate vanished after unique violation".to_string(),
                            )
                            .into()
                        });
                }
                // Validation-code collision: regenerate and retry.
                Err(StoreError::UniqueViolation { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::CodeGenerationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::{EnrollmentLedger, GrantTarget};
    use crate::storage::MemoryStore;
    use crate::types::{Account, Course, CourseModule, Lesson, Role};

    fn admin() -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            full_name: "Admin".to_string(),
            role: Role::Admin,
            created_at: Utc::now(),
        }
    }

    async fn seeded(units: u32) -> (Arc<MemoryStore>, Uuid, Vec<Uuid>) {
        let store = Arc::new(MemoryStore::new());
        let course_id = Uuid::new_v4();
        let module = CourseModule {
            id: Uuid::new_v4(),
            course_id,
            title: "Module".to_string(),
            position: 0,
        };
        let lessons: Vec<Lesson> = (0..units)
            .map(|i| Lesson {
                id: Uuid::new_v4(),
                module_id: module.id,
                title: format!("Lesson {i}"),
                position: i,
            })
            .collect();
        let lesson_ids = lessons.iter().map(|l| l.id).collect();
        store
            .insert_course(
                Course {
                    id: course_id,
                    title: "Course".to_string(),
                    description: String::new(),
                },
                vec![(module, lessons)],
            )
            .await
            .unwrap();
        (store, course_id, lesson_ids)
    }

    async fn complete_all(store: &Arc<MemoryStore>, account_id: Uuid, lessons: &[Uuid]) {
        let evaluator = CompletionEvaluator::new(store.clone());
        for lesson in lessons {
            evaluator
                .record_progress(account_id, *lesson, true)
                .await
                .unwrap();
        }
    }

    async fn enroll(
        store: &Arc<MemoryStore>,
        email: &str,
        course_id: Uuid,
        days: Option<i64>,
    ) -> Uuid {
        let ledger = EnrollmentLedger::new(store.clone());
        ledger
            .grant(&admin(), GrantTarget::Email(email.to_string()), course_id, days)
            .await
            .unwrap()
            .account
            .id
    }

    #[test]
    fn validation_codes_use_the_public_alphabet() {
        let code = generate_validation_code();
        assert_eq!(code.len(), 8);
        assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
    }

    #[tokio::test]
    async fn issue_is_idempotent() {
        let (store, course_id, lessons) = seeded(2).await;
        let account_id = enroll(&store, "s@x.com", course_id, None).await;
        complete_all(&store, account_id, &lessons).await;
        let issuer = CertificateIssuer::new(store.clone());

        let first = issuer.issue(account_id, course_id).await.unwrap();
        let second = issuer.issue(account_id, course_id).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.validation_code, second.validation_code);
    }

    #[tokio::test]
    async fn incomplete_progress_carries_both_counts() {
        let (store, course_id, lessons) = seeded(5).await;
        let account_id = enroll(&store, "s@x.com", course_id, None).await;
        complete_all(&store, account_id, &lessons[..4]).await;
        let issuer = CertificateIssuer::new(store.clone());

        let err = issuer.issue(account_id, course_id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::IncompleteProgress {
                completed: 4,
                total: 5
            }
        ));

        // Completing the fifth unit unblocks issuance.
        complete_all(&store, account_id, &lessons[4..]).await;
        assert!(issuer.issue(account_id, course_id).await.is_ok());
    }

    #[tokio::test]
    async fn empty_course_never_issues() {
        let (store, course_id, _) = seeded(0).await;
        let account_id = enroll(&store, "s@x.com", course_id, None).await;
        let issuer = CertificateIssuer::new(store);

        let err = issuer.issue(account_id, course_id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::IncompleteProgress {
                completed: 0,
                total: 0
            }
        ));
    }

    #[tokio::test]
    async fn expired_or_revoked_enrollment_blocks_issuance() {
        let (store, course_id, lessons) = seeded(1).await;
        let account_id = enroll(&store, "s@x.com", course_id, Some(30)).await;
        complete_all(&store, account_id, &lessons).await;

        // Force the window shut.
        let enrollment = store
            .enrollment_for(account_id, course_id)
            .await
            .unwrap()
            .unwrap();
        store
            .upsert_enrollment(account_id, course_id, Some(Utc::now() - chrono::Duration::days(1)))
            .await
            .unwrap();

        let issuer = CertificateIssuer::new(store.clone());
        let err = issuer.issue(account_id, course_id).await.unwrap_err();
        assert!(matches!(err, EngineError::AccessExpired));

        store.revoke_enrollment(enrollment.id).await.unwrap();
        let err = issuer.issue(account_id, course_id).await.unwrap_err();
        assert!(matches!(err, EngineError::AccessExpired));
    }

    #[tokio::test]
    async fn unenrolled_account_cannot_claim_a_certificate() {
        let (store, course_id, lessons) = seeded(1).await;
        let account_id = Uuid::new_v4();
        complete_all(&store, account_id, &lessons).await;
        let issuer = CertificateIssuer::new(store);

        let err = issuer.issue(account_id, course_id).await.unwrap_err();
        assert!(matches!(err, EngineError::AccessExpired));
    }

    /// Delegates to an inner store but fails `insert_certificate` with a
    /// validation-code violation until the budget runs out.
    struct CollidingStore {
        inner: Arc<MemoryStore>,
        collisions_left: std::sync::Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl crate::storage::Store for CollidingStore {
        async fn account(&self, id: Uuid) -> crate::storage::Result<Option<Account>> {
            self.inner.account(id).await
        }
        async fn account_by_email(
            &self,
            email: &str,
        ) -> crate::storage::Result<Option<Account>> {
            self.inner.account_by_email(email).await
        }
        async fn insert_account(&self, account: Account) -> crate::storage::Result<()> {
            self.inner.insert_account(account).await
        }
        async fn course(&self, id: Uuid) -> crate::storage::Result<Option<Course>> {
            self.inner.course(id).await
        }
        async fn course_outline(
            &self,
            course_id: Uuid,
        ) -> crate::storage::Result<Vec<(CourseModule, Vec<Lesson>)>> {
            self.inner.course_outline(course_id).await
        }
        async fn lesson(&self, id: Uuid) -> crate::storage::Result<Option<Lesson>> {
            self.inner.lesson(id).await
        }
        async fn lesson_ids_for_course(
            &self,
            course_id: Uuid,
        ) -> crate::storage::Result<Vec<Uuid>> {
            self.inner.lesson_ids_for_course(course_id).await
        }
        async fn insert_course(
            &self,
            course: Course,
            modules: Vec<(CourseModule, Vec<Lesson>)>,
        ) -> crate::storage::Result<()> {
            self.inner.insert_course(course, modules).await
        }
        async fn enrollment(
            &self,
            id: Uuid,
        ) -> crate::storage::Result<Option<crate::types::Enrollment>> {
            self.inner.enrollment(id).await
        }
        async fn enrollment_for(
            &self,
            account_id: Uuid,
            course_id: Uuid,
        ) -> crate::storage::Result<Option<crate::types::Enrollment>> {
            self.inner.enrollment_for(account_id, course_id).await
        }
        async fn enrollments_for_account(
            &self,
            account_id: Uuid,
        ) -> crate::storage::Result<Vec<crate::types::Enrollment>> {
            self.inner.enrollments_for_account(account_id).await
        }
        async fn upsert_enrollment(
            &self,
            account_id: Uuid,
            course_id: Uuid,
            access_end_at: Option<chrono::DateTime<Utc>>,
        ) -> crate::storage::Result<crate::types::Enrollment> {
            self.inner
                .upsert_enrollment(account_id, course_id, access_end_at)
                .await
        }
        async fn revoke_enrollment(
            &self,
            id: Uuid,
        ) -> crate::storage::Result<Option<crate::types::Enrollment>> {
            self.inner.revoke_enrollment(id).await
        }
        async fn upsert_progress(
            &self,
            mark: crate::types::ProgressMark,
        ) -> crate::storage::Result<()> {
            self.inner.upsert_progress(mark).await
        }
        async fn progress_for(
            &self,
            account_id: Uuid,
            lesson_id: Uuid,
        ) -> crate::storage::Result<Option<crate::types::ProgressMark>> {
            self.inner.progress_for(account_id, lesson_id).await
        }
        async fn completed_lesson_count(
            &self,
            account_id: Uuid,
            lesson_ids: &[Uuid],
        ) -> crate::storage::Result<u64> {
            self.inner
                .completed_lesson_count(account_id, lesson_ids)
                .await
        }
        async fn certificate_for(
            &self,
            account_id: Uuid,
            course_id: Uuid,
        ) -> crate::storage::Result<Option<Certificate>> {
            self.inner.certificate_for(account_id, course_id).await
        }
        async fn certificate_by_code(
            &self,
            code: &str,
        ) -> crate::storage::Result<Option<Certificate>> {
            self.inner.certificate_by_code(code).await
        }
        async fn insert_certificate(
            &self,
            certificate: Certificate,
        ) -> crate::storage::Result<()> {
            // Guard must drop before the await below.
            {
                let mut left = self.collisions_left.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(StoreError::UniqueViolation {
                        constraint: constraints::CERT_VALIDATION_CODE,
                    });
                }
            }
            self.inner.insert_certificate(certificate).await
        }
        async fn append_audit(
            &self,
            entry: crate::types::AuditEntry,
        ) -> crate::storage::Result<()> {
            self.inner.append_audit(entry).await
        }
        async fn audit_for_entity(
            &self,
            entity_id: Uuid,
        ) -> crate::storage::Result<Vec<crate::types::AuditEntry>> {
            self.inner.audit_for_entity(entity_id).await
        }
    }

    #[tokio::test]
    async fn code_collisions_are_retried_then_succeed() {
        let (store, course_id, lessons) = seeded(1).await;
        let account_id = enroll(&store, "s@x.com", course_id, None).await;
        complete_all(&store, account_id, &lessons).await;

        let colliding = Arc::new(CollidingStore {
            inner: store,
            collisions_left: std::sync::Mutex::new(MAX_CODE_ATTEMPTS - 1),
        });
        let issuer = CertificateIssuer::new(colliding.clone());

        let certificate = issuer.issue(account_id, course_id).await.unwrap();
        assert_eq!(certificate.validation_code.len(), 8);
        assert_eq!(*colliding.collisions_left.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn exhausted_code_attempts_fail_generation() {
        let (store, course_id, lessons) = seeded(1).await;
        let account_id = enroll(&store, "s@x.com", course_id, None).await;
        complete_all(&store, account_id, &lessons).await;

        let colliding = Arc::new(CollidingStore {
            inner: store,
            collisions_left: std::sync::Mutex::new(usize::MAX),
        });
        let issuer = CertificateIssuer::new(colliding);

        let err = issuer.issue(account_id, course_id).await.unwrap_err();
        assert!(matches!(err, EngineError::CodeGenerationFailed));
    }

    #[tokio::test]
    async fn preexisting_certificate_is_returned_unchanged() {
        let (store, course_id, lessons) = seeded(1).await;
        let account_id = enroll(&store, "s@x.com", course_id, None).await;
        complete_all(&store, account_id, &lessons).await;

        let winner = Certificate {
            id: Uuid::new_v4(),
            account_id,
            course_id,
            validation_code: "WINNER00".to_string(),
            issued_at: Utc::now(),
        };
        store.insert_certificate(winner.clone()).await.unwrap();

        let issuer = CertificateIssuer::new(store);
        let issued = issuer.issue(account_id, course_id).await.unwrap();
        assert_eq!(issued.validation_code, "WINNER00");
    }
}
