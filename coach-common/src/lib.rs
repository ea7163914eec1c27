//! # Coach Common Library
//!
//! Shared code for the coaching backend:
//! - Flag escalation model, traversal and aggregation
//! - Risk tier classification
//! - Lead growth reporting
//! - Configuration loading
//! - Database schema initialization

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod flags;
pub mod leads;
pub mod time;

pub use error::{Error, Result};
pub use flags::{
    aggregate_counts, classify, collect_ancestors, EscalationError, EscalationGraph, Flag,
    FlagColor, FlagCounts, FlagDocument, FlagId, RequirementOrigin, RiskTier,
};
