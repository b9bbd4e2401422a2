//! Content results
//!
//! Measured engagement for a piece of posted content, linked back to the
//! generation (and its prompt parameters) that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patterns::{PatternKey, PromptParams};

/// Engagement outcome of one posted piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentResult {
    /// Durable identifier; re-recording the same id never double-counts
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    pub params: PromptParams,
    pub views: u64,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub shares: u64,
    #[serde(default)]
    pub saves: u64,
    /// Engagement rate in percent; derived from interactions when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement_rate: Option<f64>,
    /// Opening text of the posted content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    pub posted_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl ContentResult {
    pub fn new(id: &str, user_id: &str, params: PromptParams, views: u64) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            generation_id: None,
            params,
            views,
            likes: 0,
            comments: 0,
            shares: 0,
            saves: 0,
            engagement_rate: None,
            preview: None,
            posted_at: now,
            recorded_at: now,
        }
    }

    pub fn with_interactions(mut self, likes: u64, comments: u64, shares: u64, saves: u64) -> Self {
        self.likes = likes;
        self.comments = comments;
        self.shares = shares;
        self.saves = saves;
        self
    }

    pub fn with_engagement_rate(mut self, rate: f64) -> Self {
        self.engagement_rate = Some(rate);
        self
    }

    pub fn with_preview(mut self, preview: &str) -> Self {
        self.preview = Some(preview.to_string());
        self
    }

    pub fn with_generation_id(mut self, generation_id: &str) -> Self {
        self.generation_id = Some(generation_id.to_string());
        self
    }

    pub fn posted_at(mut self, at: DateTime<Utc>) -> Self {
        self.posted_at = at;
        self
    }

    pub fn interactions(&self) -> u64 {
        self.likes + self.comments + self.shares + self.saves
    }

    /// Engagement rate in percent.
    ///
    /// Uses the reported rate when present and finite, otherwise
    /// interactions / views * 100. Zero views yields 0.
    pub fn effective_engagement_rate(&self) -> f64 {
        match self.engagement_rate {
            Some(rate) if rate.is_finite() => rate.max(0.0),
            _ if self.views == 0 => 0.0,
            _ => self.interactions() as f64 / self.views as f64 * 100.0,
        }
    }

    pub fn pattern_key(&self) -> PatternKey {
        self.params.pattern_key()
    }
}
