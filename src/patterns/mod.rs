//! Pattern performance
//!
//! A pattern is a (platform, category, tone, goal) combination. Results are
//! rolled up per pattern into a confidence-shrunk score used for ranking.

pub mod key;
pub mod stats;
pub mod engine;

pub use key::{PatternKey, PromptParams, ANY, KEY_DELIMITER};
pub use stats::{weighted_score, PatternStats};
pub use engine::{PatternEngine, RecordedResult};
