//! Customer risk tiers derived from accumulated RED flags

use serde::{Deserialize, Serialize};
use std::fmt;

/// RED flag count at which a customer becomes at risk
pub const AT_RISK_RED_FLAGS: u32 = 5;

/// RED flag count at which the customer's guaranty is lost
pub const GUARANTY_LOST_RED_FLAGS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Normal,
    AtRisk,
    GuarantyLost,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Normal => "NORMAL",
            RiskTier::AtRisk => "AT_RISK",
            RiskTier::GuarantyLost => "GUARANTY_LOST",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a customer by RED flag count (lower bounds inclusive)
pub fn classify(red_flag_count: u32) -> RiskTier {
    if red_flag_count >= GUARANTY_LOST_RED_FLAGS {
        RiskTier::GuarantyLost
    } else if red_flag_count >= AT_RISK_RED_FLAGS {
        RiskTier::AtRisk
    } else {
        RiskTier::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(0), RiskTier::Normal);
        assert_eq!(classify(4), RiskTier::Normal);
        assert_eq!(classify(5), RiskTier::AtRisk);
        assert_eq!(classify(9), RiskTier::AtRisk);
        assert_eq!(classify(10), RiskTier::GuarantyLost);
        assert_eq!(classify(u32::MAX), RiskTier::GuarantyLost);
    }

    #[test]
    fn test_tier_serializes_as_tag() {
        let json = serde_json::to_string(&RiskTier::GuarantyLost).unwrap();
        assert_eq!(json, "\"GUARANTY_LOST\"");
    }
}
