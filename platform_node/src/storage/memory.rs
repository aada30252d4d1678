//! In-memory store used by the dev server and the test suite.
//!
//! A single mutex over all tables makes every check-then-insert atomic,
//! which is how the unique-key and conditional-write guarantees of the
//! relational deployment are reproduced in-process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{constraints, Result, Store, StoreError};
use crate::types::{
    Account, AuditEntry, Certificate, Course, CourseModule, Enrollment, EnrollmentStatus, Lesson,
    ProgressMark,
};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    accounts_by_email: HashMap<String, Uuid>,
    courses: HashMap<Uuid, Course>,
    modules: HashMap<Uuid, CourseModule>,
    lessons: HashMap<Uuid, Lesson>,
    enrollments: HashMap<Uuid, Enrollment>,
    enrollments_by_pair: HashMap<(Uuid, Uuid), Uuid>,
    progress: HashMap<(Uuid, Uuid), ProgressMark>,
    certificates: HashMap<Uuid, Certificate>,
    certificates_by_pair: HashMap<(Uuid, Uuid), Uuid>,
    certificates_by_code: HashMap<String, Uuid>,
    audit: Vec<AuditEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn account(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.lock()?.accounts.get(&id).cloned())
    }

    async fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let tables = self.lock()?;
        Ok(tables
            .accounts_by_email
            .get(email)
            .and_then(|id| tables.accounts.get(id))
            .cloned())
    }

    async fn insert_account(&self, account: Account) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.accounts_by_email.contains_key(&account.email) {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::ACCOUNT_EMAIL,
            });
        }
        tables
            .accounts_by_email
            .insert(account.email.clone(), account.id);
        tables.accounts.insert(account.id, account);
        Ok(())
    }

    async fn course(&self, id: Uuid) -> Result<Option<Course>> {
        Ok(self.lock()?.courses.get(&id).cloned())
    }

    async fn course_outline(&self, course_id: Uuid) -> Result<Vec<(CourseModule, Vec<Lesson>)>> {
        let tables = self.lock()?;
        let mut modules: Vec<CourseModule> = tables
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .cloned()
            .collect();
        modules.sort_by_key(|m| m.position);
        let outline = modules
            .into_iter()
            .map(|module| {
                let mut lessons: Vec<Lesson> = tables
                    .lessons
                    .values()
                    .filter(|l| l.module_id == module.id)
                    .cloned()
                    .collect();
                lessons.sort_by_key(|l| l.position);
                (module, lessons)
            })
            .collect();
        Ok(outline)
    }

    async fn lesson(&self, id: Uuid) -> Result<Option<Lesson>> {
        Ok(self.lock()?.lessons.get(&id).cloned())
    }

    async fn lesson_ids_for_course(&self, course_id: Uuid) -> Result<Vec<Uuid>> {
        let tables = self.lock()?;
        let module_ids: Vec<Uuid> = tables
            .modules
            .values()
            .filter(|m| m.course_id == course_id)
            .map(|m| m.id)
            .collect();
        Ok(tables
            .lessons
            .values()
            .filter(|l| module_ids.contains(&l.module_id))
            .map(|l| l.id)
            .collect())
    }

    async fn insert_course(
        &self,
        course: Course,
        modules: Vec<(CourseModule, Vec<Lesson>)>,
    ) -> Result<()> {
        let mut tables = self.lock()?;
        tables.courses.insert(course.id, course);
        for (module, lessons) in modules {
            tables.modules.insert(module.id, module);
            for lesson in lessons {
                tables.lessons.insert(lesson.id, lesson);
            }
        }
        Ok(())
    }

    async fn enrollment(&self, id: Uuid) -> Result<Option<Enrollment>> {
        Ok(self.lock()?.enrollments.get(&id).cloned())
    }

    async fn enrollment_for(
        &self,
        account_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Enrollment>> {
        let tables = self.lock()?;
        Ok(tables
            .enrollments_by_pair
            .get(&(account_id, course_id))
            .and_then(|id| tables.enrollments.get(id))
            .cloned())
    }

    async fn enrollments_for_account(&self, account_id: Uuid) -> Result<Vec<Enrollment>> {
        Ok(self
            .lock()?
            .enrollments
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn upsert_enrollment(
        &self,
        account_id: Uuid,
        course_id: Uuid,
        access_end_at: Option<DateTime<Utc>>,
    ) -> Result<Enrollment> {
        let mut tables = self.lock()?;
        let now = Utc::now();
        if let Some(id) = tables.enrollments_by_pair.get(&(account_id, course_id)).copied() {
            let enrollment = tables
                .enrollments
                .get_mut(&id)
                .ok_or_else(|| StoreError::NotFound(format!("enrollment {id}")))?;
            enrollment.status = EnrollmentStatus::Active;
            enrollment.access_end_at = access_end_at;
            enrollment.updated_at = now;
            return Ok(enrollment.clone());
        }
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            account_id,
            course_id,
            status: EnrollmentStatus::Active,
            access_end_at,
            created_at: now,
            updated_at: now,
        };
        tables
            .enrollments_by_pair
            .insert((account_id, course_id), enrollment.id);
        tables.enrollments.insert(enrollment.id, enrollment.clone());
        Ok(enrollment)
    }

    async fn revoke_enrollment(&self, id: Uuid) -> Result<Option<Enrollment>> {
        let mut tables = self.lock()?;
        let enrollment = tables
            .enrollments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("enrollment {id}")))?;
        if enrollment.status == EnrollmentStatus::Revoked {
            return Ok(None);
        }
        enrollment.status = EnrollmentStatus::Revoked;
        enrollment.updated_at = Utc::now();
        Ok(Some(enrollment.clone()))
    }

    async fn upsert_progress(&self, mark: ProgressMark) -> Result<()> {
        let mut tables = self.lock()?;
        tables
            .progress
            .insert((mark.account_id, mark.lesson_id), mark);
        Ok(())
    }

    async fn progress_for(
        &self,
        account_id: Uuid,
        lesson_id: Uuid,
    ) -> Result<Option<ProgressMark>> {
        Ok(self.lock()?.progress.get(&(account_id, lesson_id)).cloned())
    }

    async fn completed_lesson_count(&self, account_id: Uuid, lesson_ids: &[Uuid]) -> Result<u64> {
        let tables = self.lock()?;
        Ok(lesson_ids
            .iter()
            .filter(|lesson_id| {
                tables
                    .progress
                    .get(&(account_id, **lesson_id))
                    .map(|m| m.is_completed)
                    .unwrap_or(false)
            })
            .count() as u64)
    }

    async fn certificate_for(
        &self,
        account_id: Uuid,
        course_id: Uuid,
    ) -> Result<Option<Certificate>> {
        let tables = self.lock()?;
        Ok(tables
            .certificates_by_pair
            .get(&(account_id, course_id))
            .and_then(|id| tables.certificates.get(id))
            .cloned())
    }

    async fn certificate_by_code(&self, code: &str) -> Result<Option<Certificate>> {
        let tables = self.lock()?;
        Ok(tables
            .certificates_by_code
            .get(code)
            .and_then(|id| tables.certificates.get(id))
            .cloned())
    }

    async fn insert_certificate(&self, certificate: Certificate) -> Result<()> {
        let mut tables = self.lock()?;
        let pair = (certificate.account_id, certificate.course_id);
        if tables.certificates_by_pair.contains_key(&pair) {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::CERT_ACCOUNT_COURSE,
            });
        }
        if tables
            .certificates_by_code
            .contains_key(&certificate.validation_code)
        {
            return Err(StoreError::UniqueViolation {
                constraint: constraints::CERT_VALIDATION_CODE,
            });
        }
        tables.certificates_by_pair.insert(pair, certificate.id);
        tables
            .certificates_by_code
            .insert(certificate.validation_code.clone(), certificate.id);
        tables.certificates.insert(certificate.id, certificate);
        Ok(())
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<()> {
        self.lock()?.audit.push(entry);
        Ok(())
    }

    async fn audit_for_entity(&self, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
        Ok(self
            .lock()?
            .audit
            .iter()
            .filter(|e| e.entity_id == entity_id)
            .cloned()
            .collect())
    }
}
