//! Coach account endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use super::{required_text, ApiJson};
use crate::auth::{Caller, Role};
use crate::db::coaches::{self, Coach};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCoachRequest {
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct CreatedCoach {
    pub coach: Coach,
    /// Plaintext API token; shown only in this response
    pub token: String,
}

/// POST /api/coaches (admin)
pub async fn create_coach(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateCoachRequest>,
) -> ApiResult<(StatusCode, Json<CreatedCoach>)> {
    caller.require_admin()?;
    let name = required_text("name", &request.name)?;

    let (coach, token) =
        coaches::create_coach(&state.db, &name, request.role.unwrap_or(Role::Coach)).await?;
    Ok((StatusCode::CREATED, Json(CreatedCoach { coach, token })))
}

/// GET /api/coaches/me
pub async fn current_coach(State(state): State<AppState>, caller: Caller) -> ApiResult<Json<Coach>> {
    coaches::load_coach(&state.db, caller.coach_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Coach {}", caller.coach_id)))
}
