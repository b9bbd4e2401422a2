//! Weekly performance insights
//!
//! Rolls a week of content results up by platform, tone and format,
//! compares against the previous week, and turns the numbers into a short
//! list of recommendations and a summary paragraph.

pub mod period;
pub mod recommendations;
pub mod aggregator;

pub use aggregator::InsightsAggregator;
pub use period::WeekPeriod;
pub use recommendations::{Recommendation, RecommendationKind};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Format, Platform, Tone};

/// Count and averages for one group of results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats<T> {
    pub value: T,
    pub posts: usize,
    pub avg_views: f64,
    /// Percent
    pub avg_engagement_rate: f64,
}

/// Best group per dimension, by average engagement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPerformers {
    pub platform: Option<GroupStats<Platform>>,
    pub tone: Option<GroupStats<Tone>>,
    pub format: Option<GroupStats<Format>>,
}

/// Percentage changes against the previous seven days
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeekOverWeek {
    pub views_change: f64,
    pub engagement_change: f64,
    pub posts_change: f64,
}

/// Totals for one period
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub posts: usize,
    pub views: u64,
    pub interactions: u64,
    pub avg_engagement_rate: f64,
}

/// Weekly rollup for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceInsight {
    pub user_id: String,
    /// ISO week, e.g. `2024-W07`
    pub week_id: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub summary: String,
    /// False when the summary is the built-in fallback text
    pub summary_generated: bool,
    pub best: BestPerformers,
    pub platforms: Vec<GroupStats<Platform>>,
    pub tones: Vec<GroupStats<Tone>>,
    pub formats: Vec<GroupStats<Format>>,
    pub week_over_week: WeekOverWeek,
    pub recommendations: Vec<Recommendation>,
    /// 0-100
    pub persona_alignment: f64,
    pub totals: PeriodTotals,
    pub previous_totals: PeriodTotals,
    pub generated_at: DateTime<Utc>,
}
