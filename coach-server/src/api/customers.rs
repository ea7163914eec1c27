//! Customer endpoints
//!
//! Every customer view carries its current flag counts and risk tier,
//! computed from the customer's escalation graph.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use coach_common::{classify, EscalationGraph, FlagCounts, RiskTier};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{optional_text, required_text, ApiJson};
use crate::auth::Caller;
use crate::db::{coaches, customers, customers::Customer, flags};
use crate::error::{ApiError, ApiResult};
use crate::pagination::{calculate_pagination, PageQuery, Pagination};
use crate::AppState;

/// Flag standing of one customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskSummary {
    pub counts: FlagCounts,
    /// Every RED flag ever recorded, superseded ones included
    pub red_flags: u32,
    pub risk: RiskTier,
}

impl RiskSummary {
    pub fn of(graph: &EscalationGraph) -> Self {
        let red_flags = graph.red_total();
        Self {
            counts: graph.counts(),
            red_flags,
            risk: classify(red_flags),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerView {
    #[serde(flatten)]
    pub customer: Customer,
    #[serde(flatten)]
    pub summary: RiskSummary,
}

#[derive(Debug, Serialize)]
pub struct CustomerListResponse {
    pub customers: Vec<CustomerView>,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Owner; only admins may set another coach
    #[serde(default)]
    pub coach_id: Option<Uuid>,
}

/// Load a customer the caller may see
///
/// Customers of other coaches are reported as missing.
pub(crate) async fn load_visible_customer(
    state: &AppState,
    caller: &Caller,
    id: Uuid,
) -> ApiResult<Customer> {
    match customers::load_customer(&state.db, id).await? {
        Some(customer) if caller.can_access(customer.coach_id) => Ok(customer),
        _ => Err(ApiError::NotFound(format!("Customer {}", id))),
    }
}

/// POST /api/customers
pub async fn create_customer(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<CreateCustomerRequest>,
) -> ApiResult<(StatusCode, Json<CustomerView>)> {
    let name = required_text("name", &request.name)?;

    let owner = match request.coach_id {
        Some(coach_id) if coach_id != caller.coach_id => {
            caller.require_admin()?;
            if coaches::load_coach(&state.db, coach_id).await?.is_none() {
                return Err(ApiError::BadRequest(format!("Unknown coach {}", coach_id)));
            }
            coach_id
        }
        _ => caller.coach_id,
    };

    let customer = Customer::new(owner, name, optional_text(request.email));
    customers::insert_customer(&state.db, &customer).await?;

    Ok((
        StatusCode::CREATED,
        Json(CustomerView {
            customer,
            summary: RiskSummary::of(&EscalationGraph::new()),
        }),
    ))
}

/// GET /api/customers?page=N
pub async fn list_customers(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<CustomerListResponse>> {
    let scope = caller.scope();
    let total = customers::count_customers(&state.db, scope).await?;
    let pagination = calculate_pagination(total, query.page);

    let page = customers::list_customers(&state.db, scope, pagination.page_size, pagination.offset)
        .await?;
    let ids: Vec<Uuid> = page.iter().map(|customer| customer.id).collect();
    let graphs = flags::load_graphs_for_customers(&state.db, &ids).await?;
    let empty = EscalationGraph::new();

    let customers = page
        .into_iter()
        .map(|customer| {
            let summary = RiskSummary::of(graphs.get(&customer.id).unwrap_or(&empty));
            CustomerView { customer, summary }
        })
        .collect();

    Ok(Json(CustomerListResponse {
        customers,
        pagination,
    }))
}

/// GET /api/customers/:id
pub async fn get_customer(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CustomerView>> {
    let customer = load_visible_customer(&state, &caller, id).await?;
    let graph = flags::load_customer_graph(&state.db, customer.id).await?;

    Ok(Json(CustomerView {
        customer,
        summary: RiskSummary::of(&graph),
    }))
}
