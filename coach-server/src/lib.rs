//! coach-server library - customer flag and lead tracking service
//!
//! REST API over the flag escalation core in `coach-common`. All `/api/*`
//! routes authenticate through the [`auth::Caller`] extractor; `/health` is
//! public.

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod db;
pub mod error;
pub mod pagination;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Reported by the health endpoint
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            startup_time: coach_common::time::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    let api = Router::new()
        .route("/api/coaches", post(api::coaches::create_coach))
        .route("/api/coaches/me", get(api::coaches::current_coach))
        .route("/api/coaches/:id/lead-growth", get(api::leads::lead_growth))
        .route(
            "/api/customers",
            post(api::customers::create_customer).get(api::customers::list_customers),
        )
        .route("/api/customers/:id", get(api::customers::get_customer))
        .route(
            "/api/customers/:id/flags",
            post(api::flags::create_flag).get(api::flags::list_flags),
        )
        .route("/api/customers/:id/escalations", post(api::flags::escalate))
        .route("/api/flags/analyze", post(api::flags::analyze))
        .route(
            "/api/requirements",
            post(api::requirements::create_requirement).get(api::requirements::list_requirements),
        )
        .route("/api/requirements/:id", delete(api::requirements::delete_requirement))
        .route("/api/leads", post(api::leads::create_lead))
        .route("/api/dashboard/risk", get(api::dashboard::risk_overview));

    Router::new()
        .merge(api)
        .merge(api::health::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
