//! Admin-only enrollment lifecycle routes.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::auth::policy::RouteClass;
use crate::enrollment::GrantTarget;
use crate::notify::AccessNotification;
use crate::types::Enrollment;

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub course_id: Uuid,
    pub days_valid: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub enrollment: Enrollment,
    pub newly_provisioned: bool,
}

pub async fn grant_enrollment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GrantRequest>,
) -> ApiResult<Json<GrantResponse>> {
    let actor = state
        .require_account(&headers, RouteClass::AdminOnly)
        .await?;

    let target = match (req.user_id, req.email) {
        (Some(id), _) => GrantTarget::AccountId(id),
        (None, Some(email)) => GrantTarget::Email(email),
        (None, None) => return Err(ApiError::bad_request("User id or email required")),
    };

    let outcome = state
        .ledger
        .grant(&actor, target, req.course_id, req.days_valid)
        .await?;

    // Fire-and-forget: delivery failures are logged by the dispatcher and
    // never fail the grant.
    let notification = AccessNotification::new(
        outcome.account.email.clone(),
        outcome.course_title.clone(),
        outcome.newly_provisioned,
    );
    let notifier = state.notifier.clone();
    tokio::spawn(async move { notifier.dispatch(notification).await });

    Ok(Json(GrantResponse {
        enrollment: outcome.enrollment,
        newly_provisioned: outcome.newly_provisioned,
    }))
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub enrollment: Enrollment,
}

pub async fn revoke_enrollment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(enrollment_id): Path<Uuid>,
) -> ApiResult<Json<RevokeResponse>> {
    let actor = state
        .require_account(&headers, RouteClass::AdminOnly)
        .await?;
    let enrollment = state.ledger.revoke(&actor, enrollment_id).await?;
    Ok(Json(RevokeResponse { enrollment }))
}
