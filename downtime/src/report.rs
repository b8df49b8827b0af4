//! Threshold sweep reports over a stored table.

use downtime_freshness::{Evaluator, ThresholdScore};
use serde::Serialize;
use std::fmt::Write as _;

use crate::config::EvaluationConfig;
use crate::error::Result;
use crate::store::SqliteStore;

/// One threshold's outcome; `error` is set when a score is undefined.
#[derive(Debug, Clone, Serialize)]
pub struct SweepRow {
    pub threshold: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ThresholdScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Sweep every configured threshold over `table`'s update dates.
pub fn sweep_store(
    store: &SqliteStore,
    table: &str,
    evaluation: &EvaluationConfig,
) -> Result<Vec<SweepRow>> {
    let evaluator = Evaluator::new(evaluation.ground_truth()?, evaluation.thresholds.clone())?;
    let dates = store.distinct_dates(table)?;
    tracing::info!(table, dates = dates.len(), "Evaluating freshness thresholds");

    Ok(evaluator
        .sweep(&dates)
        .into_iter()
        .map(|(threshold, outcome)| match outcome {
            Ok(score) => SweepRow {
                threshold,
                score: Some(score),
                error: None,
            },
            Err(e) => SweepRow {
                threshold,
                score: None,
                error: Some(e.to_string()),
            },
        })
        .collect())
}

/// Plain-text table, one line per threshold.
pub fn render(rows: &[SweepRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>9} {:>7} {:>4} {:>4} {:>4} {:>9} {:>7} {:>7} {:>7} {:>7}",
        "threshold", "flagged", "tp", "fp", "fn", "precision", "recall", "f1", "f0.5", "f2"
    );
    for row in rows {
        match (&row.score, &row.error) {
            (Some(s), _) => {
                let _ = writeln!(
                    out,
                    "{:>9} {:>7} {:>4} {:>4} {:>4} {:>9.4} {:>7.4} {:>7.4} {:>7.4} {:>7.4}",
                    row.threshold,
                    s.flagged,
                    s.confusion.true_positives,
                    s.confusion.false_positives,
                    s.confusion.false_negatives,
                    s.precision,
                    s.recall,
                    s.f1,
                    s.f0_5,
                    s.f2
                );
            }
            (None, error) => {
                let _ = writeln!(
                    out,
                    "{:>9} error: {}",
                    row.threshold,
                    error.as_deref().unwrap_or("unknown")
                );
            }
        }
    }
    out
}
