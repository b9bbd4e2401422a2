//! Per-pattern performance statistics
//!
//! Scores are shrunk toward zero while a pattern has few results, so a single
//! lucky post cannot outrank a well-sampled pattern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::PatternKey;
use crate::results::ContentResult;

/// Aggregated performance for one user × pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub user_id: String,
    pub pattern_key: PatternKey,
    pub total_generations: u64,
    pub total_results: u64,
    pub avg_views: f64,
    /// Mean engagement rate in percent
    pub avg_engagement_rate: f64,
    /// Confidence-shrunk score used for ranking
    pub weighted_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_performing_preview: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_engagement_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Shrunk score: the average scaled by how close the sample count is to
/// `confidence_samples`. Zero results score zero.
pub fn weighted_score(avg_engagement_rate: f64, total_results: u64, confidence_samples: f64) -> f64 {
    if total_results == 0 || !avg_engagement_rate.is_finite() {
        return 0.0;
    }
    let confidence = if confidence_samples <= 0.0 {
        1.0
    } else {
        (total_results as f64 / confidence_samples).min(1.0)
    };
    avg_engagement_rate.max(0.0) * confidence
}

impl PatternStats {
    /// Empty stats for a pattern that has never produced a result
    pub fn empty(user_id: &str, pattern_key: PatternKey) -> Self {
        Self {
            user_id: user_id.to_string(),
            pattern_key,
            total_generations: 0,
            total_results: 0,
            avg_views: 0.0,
            avg_engagement_rate: 0.0,
            weighted_score: 0.0,
            best_performing_preview: None,
            best_engagement_rate: None,
            last_result_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Recompute everything from the full set of results for this pattern.
    ///
    /// `results` must already be deduplicated by result id.
    pub fn recompute(
        user_id: &str,
        pattern_key: PatternKey,
        total_generations: u64,
        results: &[ContentResult],
        confidence_samples: f64,
        preview_chars: usize,
    ) -> Self {
        let mut stats = Self::empty(user_id, pattern_key);
        stats.total_generations = total_generations;
        if results.is_empty() {
            return stats;
        }

        let n = results.len() as f64;
        stats.total_results = results.len() as u64;
        stats.avg_views = results.iter().map(|r| r.views as f64).sum::<f64>() / n;
        stats.avg_engagement_rate =
            results.iter().map(|r| r.effective_engagement_rate()).sum::<f64>() / n;
        stats.weighted_score =
            weighted_score(stats.avg_engagement_rate, stats.total_results, confidence_samples);
        stats.last_result_at = results.iter().map(|r| r.posted_at).max();

        let best = results.iter().max_by(|a, b| {
            a.effective_engagement_rate()
                .partial_cmp(&b.effective_engagement_rate())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let Some(best) = best {
            stats.best_engagement_rate = Some(best.effective_engagement_rate());
            stats.best_performing_preview = best
                .preview
                .as_ref()
                .map(|p| p.chars().take(preview_chars).collect::<String>());
        }

        stats
    }

    /// Whether this pattern has any measured signal to exploit
    pub fn is_exploitable(&self) -> bool {
        self.total_results >= 1
    }
}
