//! Completion evaluation over progress marks.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::storage::Store;
use crate::types::ProgressMark;

/// Completion counts for one account over one course.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CourseProgress {
    pub completed_units: u64,
    pub total_units: u64,
}

impl CourseProgress {
    /// A course with no completion units is treated as not satisfiable,
    /// never as vacuously complete.
    pub fn is_complete(&self) -> bool {
        self.total_units > 0 && self.completed_units >= self.total_units
    }
}

pub struct CompletionEvaluator {
    store: Arc<dyn Store>,
}

impl CompletionEvaluator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Pure read: counts completed vs. total units for the course.
    pub async fn evaluate(&self, account_id: Uuid, course_id: Uuid) -> EngineResult<CourseProgress> {
        let lesson_ids = self.store.lesson_ids_for_course(course_id).await?;
        let completed_units = self
            .store
            .completed_lesson_count(account_id, &lesson_ids)
            .await?;
        Ok(CourseProgress {
            completed_units,
            total_units: lesson_ids.len() as u64,
        })
    }

    /// Student-facing progress report: upserts the mark for
    /// (account, lesson). `completed_at` is set when the mark turns
    /// completed and cleared when it is unset again.
    pub async fn record_progress(
        &self,
        account_id: Uuid,
        lesson_id: Uuid,
        is_completed: bool,
    ) -> EngineResult<()> {
        self.store
            .lesson(lesson_id)
            .await?
            .ok_or(EngineError::NotFound)?;
        let now = Utc::now();
        let mark = ProgressMark {
            account_id,
            lesson_id,
            is_completed,
            completed_at: is_completed.then_some(now),
            last_seen_at: now,
        };
        self.store.upsert_progress(mark).await?;
        Ok(())
    }
}
