//! Authenticated student routes: course access, progress, certificates.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::auth::policy::RouteClass;
use crate::enrollment::is_effectively_active;
use crate::types::{Certificate, EnrollmentStatus};

#[derive(Debug, Serialize)]
pub struct CourseSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct EnrolledCourse {
    pub enrollment_id: Uuid,
    pub status: EnrollmentStatus,
    pub access_end_at: Option<DateTime<Utc>>,
    pub course: CourseSummary,
}

/// Courses the student can use right now, filtered by the single
/// effectively-active predicate.
pub async fn list_courses(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<EnrolledCourse>>> {
    let account = state
        .require_account(&headers, RouteClass::Authenticated)
        .await?;

    let now = Utc::now();
    let mut courses = Vec::new();
    for enrollment in state.store.enrollments_for_account(account.id).await? {
        if !is_effectively_active(&enrollment, now) {
            continue;
        }
        let Some(course) = state
            .store
            .course(enrollment.course_id)
            .await?
        else {
            continue;
        };
        courses.push(EnrolledCourse {
            enrollment_id: enrollment.id,
            status: enrollment.status,
            access_end_at: enrollment.access_end_at,
            course: CourseSummary {
                id: course.id,
                title: course.title,
                description: course.description,
            },
        });
    }
    Ok(Json(courses))
}

#[derive(Debug, Serialize)]
pub struct LessonView {
    pub id: Uuid,
    pub title: String,
    pub position: u32,
}

#[derive(Debug, Serialize)]
pub struct ModuleView {
    pub id: Uuid,
    pub title: String,
    pub position: u32,
    pub lessons: Vec<LessonView>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub modules: Vec<ModuleView>,
}

/// Course outline, gated by the same predicate as the listing.
pub async fn course_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(course_id): Path<Uuid>,
) -> ApiResult<Json<CourseDetail>> {
    let account = state
        .require_account(&headers, RouteClass::Authenticated)
        .await?;

    let enrollment = state
        .store
        .enrollment_for(account.id, course_id)
        .await?;
    match enrollment {
        Some(e) if is_effectively_active(&e, Utc::now()) => {}
        _ => return Err(ApiError::forbidden("Not enrolled or access expired")),
    }

    let course = state
        .store
        .course(course_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Course not found"))?;
    let outline = state
        .store
        .course_outline(course_id)
        .await?;

    Ok(Json(CourseDetail {
        id: course.id,
        title: course.title,
        description: course.description,
        modules: outline
            .into_iter()
            .map(|(module, lessons)| ModuleView {
                id: module.id,
                title: module.title,
                position: module.position,
                lessons: lessons
                    .into_iter()
                    .map(|l| LessonView {
                        id: l.id,
                        title: l.title,
                        position: l.position,
                    })
                    .collect(),
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub lesson_id: Uuid,
    pub is_completed: bool,
}

#[derive(Debug, Serialize)]
pub struct ProgressAck {
    pub success: bool,
}

pub async fn report_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ProgressRequest>,
) -> ApiResult<Json<ProgressAck>> {
    let account = state
        .require_account(&headers, RouteClass::Authenticated)
        .await?;
    state
        .evaluator
        .record_progress(account.id, req.lesson_id, req.is_completed)
        .await?;
    Ok(Json(ProgressAck { success: true }))
}

#[derive(Debug, Deserialize)]
pub struct CertificateRequest {
    pub course_id: Uuid,
}

pub async fn request_certificate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CertificateRequest>,
) -> ApiResult<Json<Certificate>> {
    let account = state
        .require_account(&headers, RouteClass::Authenticated)
        .await?;
    let certificate = state.issuer.issue(account.id, req.course_id).await?;
    Ok(Json(certificate))
}
