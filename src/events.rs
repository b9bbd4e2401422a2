//! Behavioral events
//!
//! Append-only records of what a creator did (generate, save, export, pick an
//! A/B winner, answer onboarding), tagged with the stylistic metadata the
//! persona model learns from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::patterns::PromptParams;
use crate::types::{ActionType, CtaStyle, Format, Opening, Pacing, Tone};

/// A single behavioral event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorEvent {
    /// Unique ID, used to make appends idempotent
    pub id: String,
    pub user_id: String,
    pub action: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening: Option<Opening>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_style: Option<CtaStyle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pacing: Option<Pacing>,
    /// Hook length in words, reported with generations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_length: Option<u32>,
    /// Performance score for outcome-linked events (A/B wins)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Prompt parameters of the generation, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<PromptParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl BehaviorEvent {
    pub fn new(user_id: &str, action: ActionType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            action,
            tone: None,
            opening: None,
            format: None,
            cta_style: None,
            pacing: None,
            hook_length: None,
            score: None,
            params: None,
            generation_id: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    pub fn with_opening(mut self, opening: Opening) -> Self {
        self.opening = Some(opening);
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_cta_style(mut self, cta_style: CtaStyle) -> Self {
        self.cta_style = Some(cta_style);
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = Some(pacing);
        self
    }

    pub fn with_hook_length(mut self, words: u32) -> Self {
        self.hook_length = Some(words);
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Attach prompt parameters; tone/opening/format tags are filled from
    /// them when not already set.
    pub fn with_params(mut self, params: PromptParams) -> Self {
        self.tone = self.tone.or(params.tone);
        self.opening = self.opening.or(params.opening);
        self.format = self.format.or(params.format);
        self.params = Some(params);
        self
    }

    pub fn with_generation_id(mut self, generation_id: &str) -> Self {
        self.generation_id = Some(generation_id.to_string());
        self
    }

    /// Whether this event carries a measured performance signal
    pub fn is_outcome_linked(&self) -> bool {
        self.action == ActionType::AbWin && self.score.is_some()
    }
}
