//! Data access for coach-server
//!
//! Ids are stored as UUID text and timestamps as RFC 3339 text.

pub mod coaches;
pub mod customers;
pub mod flags;
pub mod leads;
pub mod requirements;

use coach_common::{Error, Result};
use uuid::Uuid;

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Corrupt id '{}' in database: {}", value, e)))
}
