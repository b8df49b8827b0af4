//! Confusion counts and classification scores.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{EvalError, Result};

/// Confusion counts for one threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl Confusion {
    pub fn from_sets(flagged: &BTreeSet<NaiveDate>, ground_truth: &BTreeSet<NaiveDate>) -> Self {
        Self {
            true_positives: flagged.intersection(ground_truth).count(),
            false_positives: flagged.difference(ground_truth).count(),
            false_negatives: ground_truth.difference(flagged).count(),
        }
    }

    /// `1` when there are no false positives, even if nothing was flagged.
    pub fn precision(&self) -> f64 {
        if self.false_positives == 0 {
            return 1.0;
        }
        let tp = self.true_positives as f64;
        tp / (tp + self.false_positives as f64)
    }

    pub fn recall(&self) -> Result<f64> {
        let relevant = self.true_positives + self.false_negatives;
        if relevant == 0 {
            return Err(EvalError::UndefinedRecall);
        }
        Ok(self.true_positives as f64 / relevant as f64)
    }

    /// Weighted harmonic mean of precision and recall.
    ///
    /// Undefined whenever nothing was recovered: with `TP == 0` recall is 0
    /// and the score degenerates to `0 / 0` or to a meaningless 0.
    pub fn f_beta(&self, beta: f64) -> Result<f64> {
        let precision = self.precision();
        let recall = self.recall()?;
        let b2 = beta * beta;
        let denominator = b2 * precision + recall;
        if self.true_positives == 0 || denominator == 0.0 {
            return Err(EvalError::UndefinedFScore {
                beta,
                precision,
                recall,
            });
        }
        Ok((1.0 + b2) * precision * recall / denominator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_counts_from_sets() {
        let flagged = BTreeSet::from([date("2020-04-01"), date("2020-04-02")]);
        let truth = BTreeSet::from([date("2020-04-01"), date("2020-05-16")]);
        let c = Confusion::from_sets(&flagged, &truth);
        assert_eq!(
            c,
            Confusion {
                true_positives: 1,
                false_positives: 1,
                false_negatives: 1,
            }
        );
        assert_eq!(c.precision(), 0.5);
        assert_eq!(c.recall().unwrap(), 0.5);
        assert!((c.f_beta(1.0).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_nothing_flagged_is_perfect_precision_and_undefined_f() {
        let truth = BTreeSet::from([date("2020-04-01")]);
        let c = Confusion::from_sets(&BTreeSet::new(), &truth);
        assert_eq!(c.precision(), 1.0);
        assert_eq!(c.recall().unwrap(), 0.0);
        assert!(matches!(
            c.f_beta(1.0),
            Err(EvalError::UndefinedFScore { beta, .. }) if beta == 1.0
        ));
    }

    #[test]
    fn test_zero_precision_and_recall_is_undefined() {
        let c = Confusion {
            true_positives: 0,
            false_positives: 3,
            false_negatives: 2,
        };
        assert_eq!(c.precision(), 0.0);
        assert!(c.f_beta(2.0).is_err());
    }

    #[test]
    fn test_empty_ground_truth_recall_is_an_error() {
        let c = Confusion::default();
        assert_eq!(c.recall(), Err(EvalError::UndefinedRecall));
    }

    #[test]
    fn test_beta_weights_recall() {
        // precision 1.0, recall 0.5
        let c = Confusion {
            true_positives: 1,
            false_positives: 0,
            false_negatives: 1,
        };
        let f_half = c.f_beta(0.5).unwrap();
        let f1 = c.f_beta(1.0).unwrap();
        let f2 = c.f_beta(2.0).unwrap();
        assert!((f1 - 2.0 / 3.0).abs() < 1e-12);
        assert!((f_half - 1.25 * 0.5 / (0.25 + 0.5)).abs() < 1e-12);
        assert!((f2 - 5.0 * 0.5 / (4.0 + 0.5)).abs() < 1e-12);
        assert!(f_half > f1 && f1 > f2);
    }
}
