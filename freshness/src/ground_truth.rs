//! Known outage dates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{EvalError, Result};

/// Hand-curated recovery dates of the injected outages in the reference run.
pub const VALID_OUTAGE_DATES: [&str; 9] = [
    "2020-01-26",
    "2020-04-01",
    "2020-04-20",
    "2020-05-16",
    "2020-07-12",
    "2020-08-29",
    "2020-10-19",
    "2021-01-05",
    "2021-04-13",
];

/// Non-empty set of dates a detector should flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeSet<NaiveDate>", into = "BTreeSet<NaiveDate>")]
pub struct GroundTruth {
    dates: BTreeSet<NaiveDate>,
}

impl GroundTruth {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Result<Self> {
        let dates: BTreeSet<NaiveDate> = dates.into_iter().collect();
        if dates.is_empty() {
            return Err(EvalError::EmptyGroundTruth);
        }
        Ok(Self { dates })
    }

    /// The built-in nine outage dates.
    pub fn reference() -> Self {
        let dates = VALID_OUTAGE_DATES
            .iter()
            .filter_map(|s| s.parse::<NaiveDate>().ok())
            .collect();
        Self { dates }
    }

    pub fn dates(&self) -> &BTreeSet<NaiveDate> {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, date: &NaiveDate) -> bool {
        self.dates.contains(date)
    }
}

impl Default for GroundTruth {
    fn default() -> Self {
        Self::reference()
    }
}

impl TryFrom<BTreeSet<NaiveDate>> for GroundTruth {
    type Error = EvalError;

    fn try_from(dates: BTreeSet<NaiveDate>) -> Result<Self> {
        Self::new(dates)
    }
}

impl From<GroundTruth> for BTreeSet<NaiveDate> {
    fn from(truth: GroundTruth) -> Self {
        truth.dates
    }
}
