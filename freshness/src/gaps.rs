//! Update-date gaps and the freshness heuristic.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Days since the previous distinct update date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateGap {
    pub date: NaiveDate,
    pub days_since_previous: i64,
}

/// Gap for every date after the first, in ascending date order.
pub fn gaps(update_dates: &BTreeSet<NaiveDate>) -> Vec<DateGap> {
    update_dates
        .iter()
        .zip(update_dates.iter().skip(1))
        .map(|(prev, date)| DateGap {
            date: *date,
            days_since_previous: (*date - *prev).num_days(),
        })
        .collect()
}

/// Dates whose gap strictly exceeds `threshold`.
pub fn flag(gaps: &[DateGap], threshold: u32) -> BTreeSet<NaiveDate> {
    gaps.iter()
        .filter(|g| g.days_since_previous > i64::from(threshold))
        .map(|g| g.date)
        .collect()
}
