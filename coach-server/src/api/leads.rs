//! Lead endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use coach_common::leads::{self, DailyLeadCount, DEFAULT_GROWTH_DAYS, MAX_GROWTH_DAYS};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{optional_text, required_text, ApiJson};
use crate::auth::Caller;
use crate::db::leads::{self as lead_store, Lead};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GrowthQuery {
    #[serde(default)]
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LeadGrowthResponse {
    pub coach_id: Uuid,
    pub days: u32,
    pub growth: Vec<DailyLeadCount>,
}

/// POST /api/leads
pub async fn create_lead(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateLeadRequest>,
) -> ApiResult<(StatusCode, Json<Lead>)> {
    let lead = Lead::new(
        caller.coach_id,
        required_text("name", &request.name)?,
        optional_text(request.source),
    );
    lead_store::insert_lead(&state.db, &lead).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

/// GET /api/coaches/:id/lead-growth?days=N
pub async fn lead_growth(
    State(state): State<AppState>,
    caller: Caller,
    Path(coach_id): Path<Uuid>,
    Query(query): Query<GrowthQuery>,
) -> ApiResult<Json<LeadGrowthResponse>> {
    if !caller.can_access(coach_id) {
        return Err(ApiError::NotFound(format!("Coach {}", coach_id)));
    }

    let days = query.days.unwrap_or(DEFAULT_GROWTH_DAYS);
    if days == 0 || days > MAX_GROWTH_DAYS {
        return Err(ApiError::BadRequest(format!(
            "days must be between 1 and {}",
            MAX_GROWTH_DAYS
        )));
    }

    let created = lead_store::lead_timestamps(&state.db, coach_id).await?;
    let growth = leads::lead_growth(&created, coach_common::time::today(), days);

    Ok(Json(LeadGrowthResponse {
        coach_id,
        days,
        growth,
    }))
}
