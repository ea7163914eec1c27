//! Requirement endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{optional_text, required_text, ApiJson};
use crate::auth::Caller;
use crate::db::requirements::{self, Requirement};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRequirementRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// POST /api/requirements
pub async fn create_requirement(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateRequirementRequest>,
) -> ApiResult<(StatusCode, Json<Requirement>)> {
    let requirement = Requirement::new(
        caller.coach_id,
        required_text("title", &request.title)?,
        optional_text(request.description),
    );
    requirements::insert_requirement(&state.db, &requirement).await?;
    Ok((StatusCode::CREATED, Json(requirement)))
}

/// GET /api/requirements
pub async fn list_requirements(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<Vec<Requirement>>> {
    Ok(Json(requirements::list_active(&state.db, caller.scope()).await?))
}

/// DELETE /api/requirements/:id
///
/// Soft delete; flags raised against the requirement keep reporting it.
pub async fn delete_requirement(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    match requirements::load_requirement(&state.db, id).await? {
        Some(requirement) if caller.can_access(requirement.coach_id) && !requirement.deleted => {
            requirements::soft_delete(&state.db, id).await?;
            info!(requirement_id = %id, "Deleted requirement '{}'", requirement.title);
            Ok(StatusCode::NO_CONTENT)
        }
        _ => Err(ApiError::NotFound(format!("Requirement {}", id))),
    }
}
