//! Admin risk dashboard

use axum::{extract::State, Json};
use coach_common::{FlagCounts, RiskTier};
use serde::Serialize;

use super::customers::RiskSummary;
use crate::auth::Caller;
use crate::db::{customers, flags};
use crate::error::ApiResult;
use crate::AppState;

/// Customers per risk tier
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct TierCounts {
    pub normal: u32,
    pub at_risk: u32,
    pub guaranty_lost: u32,
}

impl TierCounts {
    fn add(&mut self, tier: RiskTier) {
        match tier {
            RiskTier::Normal => self.normal += 1,
            RiskTier::AtRisk => self.at_risk += 1,
            RiskTier::GuarantyLost => self.guaranty_lost += 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RiskOverview {
    pub customers: i64,
    pub tiers: TierCounts,
    /// Current flag counts summed over every customer
    pub flags: FlagCounts,
}

/// GET /api/dashboard/risk (admin)
pub async fn risk_overview(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<RiskOverview>> {
    caller.require_admin()?;

    let total = customers::count_customers(&state.db, None).await?;
    let graphs = flags::load_graphs(&state.db, None).await?;

    let mut tiers = TierCounts::default();
    let mut counts = FlagCounts::default();
    for graph in graphs.values() {
        let summary = RiskSummary::of(graph);
        tiers.add(summary.risk);
        counts = counts.merge(summary.counts);
    }
    // Customers without any flags are Normal
    tiers.normal += u32::try_from(total)
        .unwrap_or(u32::MAX)
        .saturating_sub(graphs.len() as u32);

    Ok(Json(RiskOverview {
        customers: total,
        tiers,
        flags: counts,
    }))
}
