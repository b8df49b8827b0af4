//! Freshness-gap detector evaluation.
//!
//! Flags every update date whose gap to the previous update date exceeds a
//! threshold, then scores the flags against known outage dates across a
//! sweep of thresholds.

pub mod error;
pub mod gaps;
pub mod ground_truth;
pub mod metrics;
pub mod sweep;

pub use error::{EvalError, Result};
pub use gaps::{flag, gaps, DateGap};
pub use ground_truth::{GroundTruth, VALID_OUTAGE_DATES};
pub use metrics::Confusion;
pub use sweep::{default_thresholds, evaluate, Evaluator, ThresholdScore, DEFAULT_THRESHOLD_COUNT};
