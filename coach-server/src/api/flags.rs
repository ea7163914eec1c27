//! Flag and escalation endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use coach_common::flags::RequirementRef;
use coach_common::{
    EscalationGraph, FlagColor, FlagDocument, FlagId, RequirementOrigin,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::customers::{load_visible_customer, RiskSummary};
use super::{optional_text, ApiJson};
use crate::auth::Caller;
use crate::db::customers::Customer;
use crate::db::flags::{self as flag_store, Escalation, NewFlag};
use crate::db::requirements;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// One flag with its place in the escalation graph
#[derive(Debug, Serialize)]
pub struct FlagView {
    pub id: FlagId,
    pub color: FlagColor,
    pub created_at: DateTime<Utc>,
    pub comment: Option<String>,
    pub requirement: Option<RequirementRef>,
    pub superseded: bool,
    pub escalated_from: Vec<FlagId>,
    pub escalated_to: Vec<FlagId>,
    /// Leaf requirements this flag was escalated from
    pub origins: Vec<RequirementOrigin>,
}

impl FlagView {
    fn from_graph(graph: &EscalationGraph, id: &FlagId) -> Option<Self> {
        let flag = graph.get(id)?;
        Some(Self {
            id: flag.id.clone(),
            color: flag.color,
            created_at: flag.created_at,
            comment: flag.comment.clone(),
            requirement: flag.requirement.clone(),
            superseded: graph.is_superseded(id),
            escalated_from: graph.escalated_from(id).to_vec(),
            escalated_to: graph.escalated_to(id).to_vec(),
            origins: graph.collect_ancestors(id),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerFlagsResponse {
    pub customer_id: Uuid,
    pub flags: Vec<FlagView>,
    #[serde(flatten)]
    pub summary: RiskSummary,
}

#[derive(Debug, Deserialize)]
pub struct CreateFlagRequest {
    pub color: FlagColor,
    #[serde(default)]
    pub requirement_id: Option<Uuid>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    pub color: FlagColor,
    pub from_flag_ids: Vec<Uuid>,
    #[serde(default)]
    pub requirement_id: Option<Uuid>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzedFlag {
    pub id: FlagId,
    pub origins: Vec<RequirementOrigin>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub flags: Vec<AnalyzedFlag>,
    #[serde(flatten)]
    pub summary: RiskSummary,
}

/// Requirement a new flag may reference: visible to the caller and active
async fn check_requirement(
    state: &AppState,
    caller: &Caller,
    customer: &Customer,
    requirement_id: Option<Uuid>,
) -> ApiResult<()> {
    let Some(id) = requirement_id else {
        return Ok(());
    };
    match requirements::load_requirement(&state.db, id).await? {
        Some(requirement)
            if caller.can_access(requirement.coach_id)
                && requirement.coach_id == customer.coach_id =>
        {
            if requirement.deleted {
                Err(ApiError::BadRequest(format!("Requirement {} was deleted", id)))
            } else {
                Ok(())
            }
        }
        _ => Err(ApiError::NotFound(format!("Requirement {}", id))),
    }
}

async fn created_view(state: &AppState, customer_id: Uuid, id: Uuid) -> ApiResult<Json<FlagView>> {
    let graph = flag_store::load_customer_graph(&state.db, customer_id).await?;
    FlagView::from_graph(&graph, &FlagId::from(id))
        .map(Json)
        .ok_or_else(|| ApiError::Internal(format!("Flag {} missing after insert", id)))
}

/// POST /api/customers/:id/flags
pub async fn create_flag(
    State(state): State<AppState>,
    caller: Caller,
    Path(customer_id): Path<Uuid>,
    ApiJson(request): ApiJson<CreateFlagRequest>,
) -> ApiResult<(StatusCode, Json<FlagView>)> {
    let customer = load_visible_customer(&state, &caller, customer_id).await?;
    check_requirement(&state, &caller, &customer, request.requirement_id).await?;

    let stored = flag_store::insert_flag(
        &state.db,
        &NewFlag {
            customer_id: customer.id,
            color: request.color,
            requirement_id: request.requirement_id,
            comment: optional_text(request.comment),
        },
    )
    .await?;

    let view = created_view(&state, customer.id, stored.id).await?;
    Ok((StatusCode::CREATED, view))
}

/// POST /api/customers/:id/escalations
pub async fn escalate(
    State(state): State<AppState>,
    caller: Caller,
    Path(customer_id): Path<Uuid>,
    ApiJson(request): ApiJson<EscalateRequest>,
) -> ApiResult<(StatusCode, Json<FlagView>)> {
    let customer = load_visible_customer(&state, &caller, customer_id).await?;
    check_requirement(&state, &caller, &customer, request.requirement_id).await?;

    let stored = flag_store::escalate(
        &state.db,
        &Escalation {
            flag: NewFlag {
                customer_id: customer.id,
                color: request.color,
                requirement_id: request.requirement_id,
                comment: optional_text(request.comment),
            },
            from_flag_ids: request.from_flag_ids,
        },
    )
    .await?;

    let view = created_view(&state, customer.id, stored.id).await?;
    Ok((StatusCode::CREATED, view))
}

/// GET /api/customers/:id/flags
pub async fn list_flags(
    State(state): State<AppState>,
    caller: Caller,
    Path(customer_id): Path<Uuid>,
) -> ApiResult<Json<CustomerFlagsResponse>> {
    let customer = load_visible_customer(&state, &caller, customer_id).await?;
    let graph = flag_store::load_customer_graph(&state.db, customer.id).await?;

    let flags = graph
        .members()
        .filter_map(|flag| FlagView::from_graph(&graph, &flag.id))
        .collect();

    Ok(Json(CustomerFlagsResponse {
        customer_id: customer.id,
        flags,
        summary: RiskSummary::of(&graph),
    }))
}

/// POST /api/flags/analyze
///
/// Runs the escalation core over caller-supplied documents without storing
/// anything.
pub async fn analyze(
    _caller: Caller,
    ApiJson(documents): ApiJson<Vec<FlagDocument>>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let graph = EscalationGraph::from_documents(&documents)?;
    debug!(documents = documents.len(), nodes = graph.len(), "Analyzed flag documents");

    let flags = documents
        .iter()
        .map(|document| AnalyzedFlag {
            id: document.id.clone(),
            origins: graph.collect_ancestors(&document.id),
        })
        .collect();

    Ok(Json(AnalyzeResponse {
        flags,
        summary: RiskSummary::of(&graph),
    }))
}
