use thiserror::Error;

/// Evaluation errors.
///
/// Division-by-zero cases surface here instead of producing `NaN`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("Ground truth set is empty")]
    EmptyGroundTruth,

    #[error("No thresholds to evaluate")]
    EmptyThresholds,

    /// `TP + FN == 0`
    #[error("Recall is undefined: no ground-truth dates to recover")]
    UndefinedRecall,

    /// `TP == 0`, so the weighted harmonic mean has no defined value
    #[error("F{beta} is undefined for precision {precision} and recall {recall}")]
    UndefinedFScore {
        beta: f64,
        precision: f64,
        recall: f64,
    },
}

pub type Result<T> = std::result::Result<T, EvalError>;
