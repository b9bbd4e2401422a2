//! Daily content suggestions
//!
//! Each day a creator gets a small batch of ideas per platform. Most come
//! from patterns that already perform; the rest deliberately try
//! combinations the creator has never posted.

pub mod cta;
pub mod random;
pub mod generator;

pub use generator::SuggestionGenerator;
pub use random::{RandomSource, SeededRandom};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::patterns::PatternKey;
use crate::types::{Format, Platform, Tone};

/// One content idea inside a daily suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionIdea {
    pub hook_idea: String,
    pub format: Format,
    pub tone: Tone,
    pub cta: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_key: Option<PatternKey>,
    pub is_exploration: bool,
    /// 0-100
    pub confidence_score: u8,
}

/// Suggestions for one user, date and platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySuggestion {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub platform: Platform,
    pub ideas: Vec<SuggestionIdea>,
    #[serde(default)]
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DailySuggestion {
    pub fn new(user_id: &str, date: NaiveDate, platform: Platform, ideas: Vec<SuggestionIdea>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            date,
            platform,
            ideas,
            used: false,
            used_at: None,
            generation_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn exploration_count(&self) -> usize {
        self.ideas.iter().filter(|idea| idea.is_exploration).count()
    }
}

/// Parameters for one daily batch
#[derive(Debug, Clone)]
pub struct DailyRequest {
    pub user_id: String,
    pub date: NaiveDate,
    pub platforms: Vec<Platform>,
    /// Total ideas requested across all platforms
    pub count: usize,
    pub explore_ratio: f64,
    /// Replace rows that already exist for this date
    pub regenerate: bool,
}

impl DailyRequest {
    pub fn new(user_id: &str, date: NaiveDate, platforms: Vec<Platform>, count: usize) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
            platforms,
            count,
            explore_ratio: crate::config::SuggestionConfig::default().explore_ratio,
            regenerate: false,
        }
    }

    pub fn with_explore_ratio(mut self, ratio: f64) -> Self {
        self.explore_ratio = ratio;
        self
    }

    pub fn regenerate(mut self, regenerate: bool) -> Self {
        self.regenerate = regenerate;
        self
    }
}

/// Outcome of a daily batch, with partial-success indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBatch {
    pub suggestions: Vec<DailySuggestion>,
    /// Ideas asked for
    pub requested: usize,
    /// Ideas newly generated in this call
    pub produced: usize,
    /// Candidates dropped because generation failed or was unusable
    pub skipped: usize,
    /// Slots left empty because no untried combination remained
    #[serde(default)]
    pub unfilled: usize,
    /// Daily limit from entitlements
    pub limit: u32,
    /// Rows returned untouched from an earlier call
    pub reused: usize,
}

impl DailyBatch {
    pub fn total_ideas(&self) -> usize {
        self.suggestions.iter().map(|s| s.ideas.len()).sum()
    }
}

/// Split `count` into (exploit, explore) slots.
///
/// Exploration gets `ceil(count * ratio)`; the epsilon keeps products like
/// 10 * 0.3 = 3.0000000000000004 from rounding up to 4.
pub fn split_slots(count: usize, explore_ratio: f64) -> (usize, usize) {
    let ratio = if explore_ratio.is_finite() {
        explore_ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let explore = ((count as f64 * ratio) - 1e-9).ceil().max(0.0) as usize;
    let explore = explore.min(count);
    (count - explore, explore)
}
