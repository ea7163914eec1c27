//! Flag records as held by the escalation core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Flag identifier
///
/// Persisted flags use UUID strings; documents posted from outside may use
/// any non-empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagId(String);

impl FlagId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for FlagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<uuid::Uuid> for FlagId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for FlagId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Flag severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagColor {
    Red,
    Yellow,
    Green,
}

impl FlagColor {
    /// Database / wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagColor::Red => "RED",
            FlagColor::Yellow => "YELLOW",
            FlagColor::Green => "GREEN",
        }
    }
}

impl fmt::Display for FlagColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagColor {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RED" => Ok(FlagColor::Red),
            "YELLOW" => Ok(FlagColor::Yellow),
            "GREEN" => Ok(FlagColor::Green),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown flag color '{}'",
                other
            ))),
        }
    }
}

/// Requirement a flag was raised against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementRef {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A single warning record, without its escalation links
///
/// Links live in [`EscalationGraph`](super::EscalationGraph) so that the
/// same flag can be shared by several escalations without duplicating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    pub id: FlagId,
    pub color: FlagColor,
    pub created_at: DateTime<Utc>,
    pub comment: Option<String>,
    pub requirement: Option<RequirementRef>,
}

impl Flag {
    pub fn new(id: impl Into<FlagId>, color: FlagColor, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            color,
            created_at,
            comment: None,
            requirement: None,
        }
    }

    pub fn with_requirement(mut self, title: impl Into<String>) -> Self {
        self.requirement = Some(RequirementRef {
            title: title.into(),
            description: None,
        });
        self
    }
}

/// One `{title, date}` pair reported for a leaf ancestor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementOrigin {
    pub title: String,
    pub date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_round_trips_through_str() {
        for color in [FlagColor::Red, FlagColor::Yellow, FlagColor::Green] {
            assert_eq!(color.as_str().parse::<FlagColor>().unwrap(), color);
        }
    }

    #[test]
    fn test_color_rejects_lowercase() {
        assert!("red".parse::<FlagColor>().is_err());
    }

    #[test]
    fn test_blank_flag_id_is_empty() {
        assert!(FlagId::new("   ").is_empty());
        assert!(!FlagId::new("f-1").is_empty());
    }
}
