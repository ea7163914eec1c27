//! Flag escalation core
//!
//! Flags are warnings recorded against a customer. Several lower-severity
//! flags may be escalated into one newer flag; the escalated ones are then
//! superseded. This module answers three questions over a snapshot of flags:
//!
//! - which leaf requirements ultimately produced a flag ([`collect_ancestors`])
//! - how many flags of each color are currently active ([`aggregate_counts`])
//! - which risk tier a RED flag count falls into ([`classify`])
//!
//! Everything here is pure and synchronous; callers load the snapshot.

mod aggregate;
mod document;
mod graph;
mod model;
mod risk;

pub use aggregate::FlagCounts;
pub use document::{EscalatedFrom, EscalatedTo, FlagDocument};
pub use graph::{EscalationError, EscalationGraph};
pub use model::{Flag, FlagColor, FlagId, RequirementOrigin, RequirementRef};
pub use risk::{classify, RiskTier, AT_RISK_RED_FLAGS, GUARANTY_LOST_RED_FLAGS};

/// Leaf requirement origins of a single nested flag document
pub fn collect_ancestors(
    flag: &FlagDocument,
) -> Result<Vec<RequirementOrigin>, EscalationError> {
    let graph = EscalationGraph::from_documents([flag])?;
    Ok(graph.collect_ancestors(&flag.id))
}

/// Current-state counts over a collection of flag documents
pub fn aggregate_counts(flags: &[FlagDocument]) -> Result<FlagCounts, EscalationError> {
    Ok(EscalationGraph::from_documents(flags)?.counts())
}
