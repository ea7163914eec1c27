//! Lead growth reporting
//!
//! Buckets a coach's lead creation times into UTC days for the dashboard
//! growth chart.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default reporting window in days
pub const DEFAULT_GROWTH_DAYS: u32 = 30;

/// Largest accepted reporting window in days
pub const MAX_GROWTH_DAYS: u32 = 365;

/// Leads created on one UTC day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLeadCount {
    pub date: NaiveDate,
    /// Leads created on `date`
    pub count: u32,
    /// All leads created up to and including `date`
    pub cumulative: u32,
}

/// One entry per day in the `days`-long window ending on `last_day`
///
/// Days without leads are present with a zero count. Leads created before
/// the window are folded into the running total; leads after `last_day` are
/// ignored.
pub fn lead_growth(
    created: &[DateTime<Utc>],
    last_day: NaiveDate,
    days: u32,
) -> Vec<DailyLeadCount> {
    if days == 0 {
        return Vec::new();
    }
    let Some(first_day) = last_day.checked_sub_days(Days::new(u64::from(days - 1))) else {
        return Vec::new();
    };

    let mut baseline = 0u32;
    let mut per_day: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for timestamp in created {
        let day = timestamp.date_naive();
        if day < first_day {
            baseline += 1;
        } else if day <= last_day {
            *per_day.entry(day).or_insert(0) += 1;
        }
    }

    let mut cumulative = baseline;
    first_day
        .iter_days()
        .take(days as usize)
        .map(|date| {
            let count = per_day.get(&date).copied().unwrap_or(0);
            cumulative += count;
            DailyLeadCount {
                date,
                count,
                cumulative,
            }
        })
        .collect()
}
