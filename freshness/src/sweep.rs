//! Threshold sweep over freshness gaps.
//!
//! Every threshold is scored independently from the same gap sequence.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{EvalError, Result};
use crate::gaps::{flag, gaps, DateGap};
use crate::ground_truth::GroundTruth;
use crate::metrics::Confusion;

/// Number of thresholds in the default sweep (`0..15`).
pub const DEFAULT_THRESHOLD_COUNT: u32 = 15;

pub fn default_thresholds() -> Vec<u32> {
    (0..DEFAULT_THRESHOLD_COUNT).collect()
}

/// Scores for one threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdScore {
    pub threshold: u32,
    pub confusion: Confusion,
    /// Number of dates the heuristic flagged
    pub flagged: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub f0_5: f64,
    pub f2: f64,
}

impl ThresholdScore {
    /// `(precision, recall, F1, F0.5, F2)`
    pub fn as_tuple(&self) -> (f64, f64, f64, f64, f64) {
        (self.precision, self.recall, self.f1, self.f0_5, self.f2)
    }
}

/// Scores update-date histories against a fixed ground truth.
#[derive(Debug, Clone)]
pub struct Evaluator {
    ground_truth: GroundTruth,
    thresholds: Vec<u32>,
}

impl Evaluator {
    pub fn new(ground_truth: GroundTruth, thresholds: Vec<u32>) -> Result<Self> {
        if thresholds.is_empty() {
            return Err(EvalError::EmptyThresholds);
        }
        if ground_truth.is_empty() {
            return Err(EvalError::EmptyGroundTruth);
        }
        Ok(Self {
            ground_truth,
            thresholds,
        })
    }

    pub fn ground_truth(&self) -> &GroundTruth {
        &self.ground_truth
    }

    pub fn thresholds(&self) -> &[u32] {
        &self.thresholds
    }

    /// Score one threshold against precomputed gaps.
    pub fn score(&self, gaps: &[DateGap], threshold: u32) -> Result<ThresholdScore> {
        let flagged = flag(gaps, threshold);
        let confusion = Confusion::from_sets(&flagged, self.ground_truth.dates());
        debug!(
            threshold,
            flagged = flagged.len(),
            tp = confusion.true_positives,
            fp = confusion.false_positives,
            fn_ = confusion.false_negatives,
            "Scored threshold"
        );

        Ok(ThresholdScore {
            threshold,
            confusion,
            flagged: flagged.len(),
            precision: confusion.precision(),
            recall: confusion.recall()?,
            f1: confusion.f_beta(1.0)?,
            f0_5: confusion.f_beta(0.5)?,
            f2: confusion.f_beta(2.0)?,
        })
    }

    /// Score every threshold, keeping undefined scores as per-threshold errors.
    pub fn sweep(&self, update_dates: &BTreeSet<NaiveDate>) -> Vec<(u32, Result<ThresholdScore>)> {
        let gaps = gaps(update_dates);
        self.thresholds
            .iter()
            .map(|t| (*t, self.score(&gaps, *t)))
            .collect()
    }

    /// Score every threshold, failing on the first undefined score.
    pub fn evaluate(&self, update_dates: &BTreeSet<NaiveDate>) -> Result<Vec<ThresholdScore>> {
        let gaps = gaps(update_dates);
        self.thresholds
            .iter()
            .map(|t| self.score(&gaps, *t))
            .collect()
    }
}

/// One-shot strict evaluation.
pub fn evaluate(
    update_dates: &BTreeSet<NaiveDate>,
    ground_truth: &BTreeSet<NaiveDate>,
    thresholds: &[u32],
) -> Result<Vec<ThresholdScore>> {
    let truth = GroundTruth::new(ground_truth.iter().copied())?;
    Evaluator::new(truth, thresholds.to_vec())?.evaluate(update_dates)
}
