//! Current-state flag counts

use serde::{Deserialize, Serialize};

use super::model::FlagColor;

/// Counts per color over flags that have not been escalated further
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCounts {
    pub total: u32,
    pub red: u32,
    pub yellow: u32,
    pub green: u32,
}

impl FlagCounts {
    /// Count `(color, superseded)` pairs, skipping superseded flags
    pub fn tally<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = (FlagColor, bool)>,
    {
        let mut counts = Self::default();
        for (color, superseded) in flags {
            if !superseded {
                counts.add(color);
            }
        }
        counts
    }

    pub fn add(&mut self, color: FlagColor) {
        self.total += 1;
        match color {
            FlagColor::Red => self.red += 1,
            FlagColor::Yellow => self.yellow += 1,
            FlagColor::Green => self.green += 1,
        }
    }

    /// Sum of two count sets (dashboard totals)
    pub fn merge(self, other: FlagCounts) -> FlagCounts {
        FlagCounts {
            total: self.total + other.total,
            red: self.red + other.red,
            yellow: self.yellow + other.yellow,
            green: self.green + other.green,
        }
    }
}
