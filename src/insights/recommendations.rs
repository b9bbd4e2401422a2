//! Recommendation rules
//!
//! Each rule looks at the week's numbers and may emit one fixed-template
//! recommendation. Rules carry a priority; the list is sorted by it and
//! capped.

use serde::{Deserialize, Serialize};

use super::{BestPerformers, PeriodTotals, WeekOverWeek};
use crate::config::InsightConfig;
use crate::types::Tone;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    RecoverViews,
    RecoverEngagement,
    LeanIntoFormat,
    LeanIntoTone,
    FocusPlatform,
    PostMoreOften,
    RealignWithPersona,
    KeepMomentum,
    VaryTone,
}

impl RecommendationKind {
    /// Lower is more urgent
    pub fn priority(&self) -> u8 {
        match self {
            RecommendationKind::RecoverViews => 1,
            RecommendationKind::RecoverEngagement => 2,
            RecommendationKind::LeanIntoFormat => 3,
            RecommendationKind::LeanIntoTone => 4,
            RecommendationKind::FocusPlatform => 5,
            RecommendationKind::PostMoreOften => 6,
            RecommendationKind::RealignWithPersona => 7,
            RecommendationKind::KeepMomentum => 8,
            RecommendationKind::VaryTone => 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub priority: u8,
    pub message: String,
}

impl Recommendation {
    fn new(kind: RecommendationKind, message: String) -> Self {
        Self {
            kind,
            priority: kind.priority(),
            message,
        }
    }
}

/// Numbers the rules read from
#[derive(Debug, Clone)]
pub struct RuleInput<'a> {
    pub week_over_week: &'a WeekOverWeek,
    pub best: &'a BestPerformers,
    pub totals: &'a PeriodTotals,
    pub previous_totals: &'a PeriodTotals,
    pub platform_count: usize,
    pub tone_count: usize,
    pub persona_alignment: f64,
    /// Dominant persona tone, when the profile has a real preference
    pub persona_tone: Option<Tone>,
}

/// Alignment below this suggests the creator drifted from their usual voice
const LOW_ALIGNMENT: f64 = 40.0;

pub fn recommend(input: &RuleInput<'_>, config: &InsightConfig) -> Vec<Recommendation> {
    let threshold = config.significant_change_pct.abs();
    let wow = input.week_over_week;
    let mut out = Vec::new();

    if wow.views_change <= -threshold {
        out.push(Recommendation::new(
            RecommendationKind::RecoverViews,
            format!(
                "Views fell {:.0}% week over week. Focus on trending topics and tighten the first three seconds.",
                wow.views_change.abs()
            ),
        ));
    }

    if wow.engagement_change <= -threshold {
        out.push(Recommendation::new(
            RecommendationKind::RecoverEngagement,
            format!(
                "Engagement dropped {:.0}%. Close each post with a question to invite replies.",
                wow.engagement_change.abs()
            ),
        ));
    }

    if let Some(format) = input.best.format.as_ref().filter(|f| f.posts >= config.min_best_samples) {
        out.push(Recommendation::new(
            RecommendationKind::LeanIntoFormat,
            format!(
                "Lean into {} posts: they averaged {:.1}% engagement across {} posts.",
                format.value, format.avg_engagement_rate, format.posts
            ),
        ));
    }

    if let Some(tone) = input.best.tone.as_ref().filter(|t| t.posts >= config.min_best_samples) {
        out.push(Recommendation::new(
            RecommendationKind::LeanIntoTone,
            format!(
                "Your {} tone landed best this week at {:.1}% engagement.",
                tone.value, tone.avg_engagement_rate
            ),
        ));
    }

    if input.platform_count >= 2 {
        if let Some(platform) = &input.best.platform {
            out.push(Recommendation::new(
                RecommendationKind::FocusPlatform,
                format!(
                    "{} is your strongest platform right now ({:.1}% engagement). Put your best idea there first.",
                    platform.value, platform.avg_engagement_rate
                ),
            ));
        }
    }

    if wow.posts_change <= -threshold && input.previous_totals.posts > input.totals.posts {
        out.push(Recommendation::new(
            RecommendationKind::PostMoreOften,
            format!(
                "You posted {} times, down from {}. A steady rhythm gives every pattern more data.",
                input.totals.posts, input.previous_totals.posts
            ),
        ));
    }

    if let Some(tone) = input.persona_tone {
        if input.persona_alignment < LOW_ALIGNMENT {
            out.push(Recommendation::new(
                RecommendationKind::RealignWithPersona,
                format!(
                    "Only {:.0}% of this week's engagement came from your usual {} voice. Check whether the new direction is working before doubling down.",
                    input.persona_alignment, tone
                ),
            ));
        }
    }

    if wow.views_change >= threshold {
        out.push(Recommendation::new(
            RecommendationKind::KeepMomentum,
            format!("Views are up {:.0}%. Keep the same posting rhythm.", wow.views_change),
        ));
    }

    if input.tone_count == 1 {
        if let Some(tone) = &input.best.tone {
            out.push(Recommendation::new(
                RecommendationKind::VaryTone,
                format!(
                    "Every tagged post this week used a {} tone. Try one in a different tone to learn what else works.",
                    tone.value
                ),
            ));
        }
    }

    out.sort_by_key(|r| r.priority);
    out.truncate(config.max_recommendations);
    out
}
