//! Persona profile and the fold functions that update it
//!
//! Both folds are pure: they take the old profile by reference and return
//! the new one, so the store can detect lost updates by version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::config::PersonaConfig;
use crate::events::BehaviorEvent;
use crate::results::ContentResult;
use crate::types::{ActionType, Category, CtaStyle, Format, Opening, Pacing, Tone, WeightMap, WEIGHT_SUM_TOLERANCE};

/// Running count and score sum for one category value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeTally {
    pub count: u32,
    pub score_sum: f64,
}

impl OutcomeTally {
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.score_sum / self.count as f64)
        }
    }

    fn add(&mut self, score: f64) {
        self.count += 1;
        self.score_sum += score;
    }
}

/// A measured performance sample to fold into a profile
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Result the outcome was measured on; folded at most once per id
    pub result_id: Option<String>,
    pub tone: Option<Tone>,
    pub opening: Option<Opening>,
    pub format: Option<Format>,
    /// Engagement rate in percent
    pub score: f64,
    pub observed_at: DateTime<Utc>,
}

impl Outcome {
    pub fn from_result(result: &ContentResult) -> Self {
        Self {
            result_id: Some(result.id.clone()),
            tone: result.params.tone,
            opening: result.params.opening,
            format: result.params.format,
            score: result.effective_engagement_rate(),
            observed_at: result.recorded_at,
        }
    }
}

/// Learned stylistic preferences of one creator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaProfile {
    pub user_id: String,
    pub tone_weights: WeightMap<Tone>,
    pub opening_bias: WeightMap<Opening>,
    pub format_bias: WeightMap<Format>,
    pub cta_style: CtaStyle,
    #[serde(default)]
    pub cta_counts: BTreeMap<CtaStyle, u32>,
    pub pacing: Pacing,
    /// Running mean of hook length in words
    pub avg_hook_length: f64,
    #[serde(default)]
    pub hook_length_samples: u64,
    pub total_generations: u64,
    pub total_saves: u64,
    pub total_exports: u64,
    pub total_ab_wins: u64,
    #[serde(default)]
    pub total_onboarding: u64,
    #[serde(default)]
    pub outcome_count: u64,
    #[serde(default)]
    pub tone_outcomes: BTreeMap<Tone, OutcomeTally>,
    #[serde(default)]
    pub opening_outcomes: BTreeMap<Opening, OutcomeTally>,
    #[serde(default)]
    pub format_outcomes: BTreeMap<Format, OutcomeTally>,
    pub best_performing_tone: Option<Tone>,
    pub best_performing_opening: Option<Opening>,
    pub best_performing_format: Option<Format>,
    pub avg_performance_score: Option<f64>,
    /// Result ids already folded by `fold_outcome`
    #[serde(default)]
    pub folded_results: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersonaProfile {
    /// Fresh profile with uniform weights
    pub fn new(user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.to_string(),
            tone_weights: WeightMap::uniform(),
            opening_bias: WeightMap::uniform(),
            format_bias: WeightMap::uniform(),
            cta_style: CtaStyle::Soft,
            cta_counts: BTreeMap::new(),
            pacing: Pacing::Medium,
            avg_hook_length: 0.0,
            hook_length_samples: 0,
            total_generations: 0,
            total_saves: 0,
            total_exports: 0,
            total_ab_wins: 0,
            total_onboarding: 0,
            outcome_count: 0,
            tone_outcomes: BTreeMap::new(),
            opening_outcomes: BTreeMap::new(),
            format_outcomes: BTreeMap::new(),
            best_performing_tone: None,
            best_performing_opening: None,
            best_performing_format: None,
            avg_performance_score: None,
            folded_results: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_folded(&self, result_id: &str) -> bool {
        self.folded_results.contains(result_id)
    }

    pub fn total_events(&self) -> u64 {
        self.total_generations + self.total_saves + self.total_exports + self.total_ab_wins + self.total_onboarding
    }

    /// Check that every weight map sums to one.
    ///
    /// A broken map is a defect: it asserts in debug builds and is
    /// renormalized in place otherwise.
    pub fn ensure_normalized(&mut self) {
        let user_id = self.user_id.clone();
        repair_if_needed(&user_id, "tone_weights", &mut self.tone_weights);
        repair_if_needed(&user_id, "opening_bias", &mut self.opening_bias);
        repair_if_needed(&user_id, "format_bias", &mut self.format_bias);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        if at > self.updated_at {
            self.updated_at = at;
        }
    }

    fn observe_cta(&mut self, cta: CtaStyle) {
        *self.cta_counts.entry(cta).or_insert(0) += 1;
        let top = self.cta_counts.values().copied().max().unwrap_or(0);
        // Majority wins; on a tie the latest signal wins.
        if self.cta_counts.get(&cta).copied().unwrap_or(0) == top {
            self.cta_style = cta;
        } else if let Some((style, _)) = CtaStyle::ALL
            .iter()
            .map(|c| (*c, self.cta_counts.get(c).copied().unwrap_or(0)))
            .find(|(_, count)| *count == top)
        {
            self.cta_style = style;
        }
    }

    fn observe_hook_length(&mut self, words: u32) {
        self.hook_length_samples += 1;
        self.avg_hook_length += (words as f64 - self.avg_hook_length) / self.hook_length_samples as f64;
    }

    fn record_outcome(&mut self, outcome: &Outcome, min_outcomes: u32) {
        if !outcome.score.is_finite() {
            tracing::warn!("Ignoring non-finite outcome score for persona {}", self.user_id);
            return;
        }
        self.outcome_count += 1;
        let previous = self.avg_performance_score.unwrap_or(0.0);
        self.avg_performance_score =
            Some(previous + (outcome.score - previous) / self.outcome_count as f64);

        if let Some(tone) = outcome.tone {
            self.tone_outcomes.entry(tone).or_default().add(outcome.score);
        }
        if let Some(opening) = outcome.opening {
            self.opening_outcomes.entry(opening).or_default().add(outcome.score);
        }
        if let Some(format) = outcome.format {
            self.format_outcomes.entry(format).or_default().add(outcome.score);
        }

        if self.outcome_count >= min_outcomes as u64 {
            self.best_performing_tone = best_by_average(&self.tone_outcomes);
            self.best_performing_opening = best_by_average(&self.opening_outcomes);
            self.best_performing_format = best_by_average(&self.format_outcomes);
        }
    }
}

fn repair_if_needed<C: Category>(user_id: &str, name: &str, map: &mut WeightMap<C>) {
    let sum = map.sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE || !sum.is_finite() {
        tracing::warn!("Persona {} {} summed to {}, renormalizing", user_id, name, sum);
        debug_assert!(false, "{} summed to {}", name, sum);
        map.renormalize();
    }
}

/// Argmax of per-category average score, ties resolved by enum order
fn best_by_average<C: Category>(tallies: &BTreeMap<C, OutcomeTally>) -> Option<C> {
    let mut best: Option<(C, f64)> = None;
    for category in C::ALL {
        if let Some(avg) = tallies.get(category).and_then(|t| t.average()) {
            match best {
                Some((_, current)) if avg <= current => {}
                _ => best = Some((*category, avg)),
            }
        }
    }
    best.map(|(c, _)| c)
}

fn step_for(action: ActionType, config: &PersonaConfig) -> f64 {
    match action {
        ActionType::Generation => config.generation_step,
        ActionType::Save => config.save_step,
        ActionType::Export => config.export_step,
        ActionType::AbWin => config.ab_win_step,
        ActionType::Onboarding => config.onboarding_step,
    }
}

/// Fold one behavioral event into a profile.
///
/// Tagged dimensions are nudged by the action's step and renormalized;
/// untagged dimensions are untouched. Counters always move.
pub fn fold_event(profile: &PersonaProfile, event: &BehaviorEvent, config: &PersonaConfig) -> PersonaProfile {
    let mut next = profile.clone();
    let step = step_for(event.action, config);

    match event.action {
        ActionType::Generation => next.total_generations += 1,
        ActionType::Save => next.total_saves += 1,
        ActionType::Export => next.total_exports += 1,
        ActionType::AbWin => next.total_ab_wins += 1,
        ActionType::Onboarding => next.total_onboarding += 1,
    }

    if let Some(tone) = event.tone {
        next.tone_weights.nudge(tone, step);
    }
    if let Some(opening) = event.opening {
        next.opening_bias.nudge(opening, step);
    }
    if let Some(format) = event.format {
        next.format_bias.nudge(format, step);
    }
    if let Some(cta) = event.cta_style {
        next.observe_cta(cta);
    }
    if let Some(pacing) = event.pacing {
        next.pacing = pacing;
    }
    if let Some(words) = event.hook_length {
        next.observe_hook_length(words);
    }
    if let (true, Some(score)) = (event.is_outcome_linked(), event.score) {
        let outcome = Outcome {
            result_id: None,
            tone: event.tone,
            opening: event.opening,
            format: event.format,
            score,
            observed_at: event.occurred_at,
        };
        next.record_outcome(&outcome, config.min_outcomes_for_best);
    }

    next.ensure_normalized();
    next.touch(event.occurred_at);
    debug!(
        "Folded {} event into persona {} (dominant tone {})",
        event.action,
        next.user_id,
        next.tone_weights.dominant().0
    );
    next
}

/// Fold a measured outcome into a profile.
///
/// Outcomes that beat the creator's running average pull their tags up by
/// `outcome_step`; every outcome feeds the best-performer tallies. An
/// outcome whose result id was already folded leaves the profile unchanged.
pub fn fold_outcome(profile: &PersonaProfile, outcome: &Outcome, config: &PersonaConfig) -> PersonaProfile {
    if let Some(id) = &outcome.result_id {
        if profile.has_folded(id) {
            debug!("Outcome for result {} already folded into persona {}", id, profile.user_id);
            return profile.clone();
        }
    }
    let mut next = profile.clone();
    if let Some(id) = &outcome.result_id {
        next.folded_results.insert(id.clone());
    }

    let beats_average = matches!(next.avg_performance_score, Some(avg) if outcome.score > avg);
    if beats_average {
        if let Some(tone) = outcome.tone {
            next.tone_weights.nudge(tone, config.outcome_step);
        }
        if let Some(opening) = outcome.opening {
            next.opening_bias.nudge(opening, config.outcome_step);
        }
        if let Some(format) = outcome.format {
            next.format_bias.nudge(format, config.outcome_step);
        }
    }
    next.record_outcome(outcome, config.min_outcomes_for_best);

    next.ensure_normalized();
    next.touch(outcome.observed_at);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_normalized(profile: &PersonaProfile) {
        assert!((profile.tone_weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((profile.opening_bias.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((profile.format_bias.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_new_profile_is_uniform() {
        let profile = PersonaProfile::new("u1");
        assert_normalized(&profile);
        assert!((profile.tone_weights.weight(Tone::Serious) - 0.2).abs() < 1e-12);
        assert_eq!(profile.total_events(), 0);
        assert!(profile.best_performing_tone.is_none());
    }

    #[test]
    fn test_fold_nudges_tagged_category_up() {
        let config = PersonaConfig::default();
        let before = PersonaProfile::new("u1");
        let event = BehaviorEvent::new("u1", ActionType::Generation)
            .with_tone(Tone::Funny)
            .with_format(Format::Tutorial);
        let after = fold_event(&before, &event, &config);

        assert!(after.tone_weights.weight(Tone::Funny) > before.tone_weights.weight(Tone::Funny));
        assert!(after.tone_weights.weight(Tone::Serious) < before.tone_weights.weight(Tone::Serious));
        assert!(after.format_bias.weight(Format::Tutorial) > 0.2);
        assert_eq!(after.opening_bias, before.opening_bias);
        assert_eq!(after.total_generations, 1);
        assert_normalized(&after);
    }

    #[test]
    fn test_stronger_signals_move_further() {
        let config = PersonaConfig::default();
        let base = PersonaProfile::new("u1");
        let generation = fold_event(&base, &BehaviorEvent::new("u1", ActionType::Generation).with_tone(Tone::Casual), &config);
        let export = fold_event(&base, &BehaviorEvent::new("u1", ActionType::Export).with_tone(Tone::Casual), &config);
        assert!(export.tone_weights.weight(Tone::Casual) > generation.tone_weights.weight(Tone::Casual));
        assert_eq!(export.total_exports, 1);
    }

    #[test]
    fn test_untagged_event_only_counts() {
        let config = PersonaConfig::default();
        let before = PersonaProfile::new("u1");
        let after = fold_event(&before, &BehaviorEvent::new("u1", ActionType::Save), &config);
        assert_eq!(after.tone_weights, before.tone_weights);
        assert_eq!(after.format_bias, before.format_bias);
        assert_eq!(after.total_saves, 1);
    }

    #[test]
    fn test_many_folds_stay_normalized() {
        let config = PersonaConfig::default();
        let mut profile = PersonaProfile::new("u1");
        for i in 0..200 {
            let tone = Tone::ALL[i % Tone::ALL.len()];
            let format = Format::ALL[(i * 3) % Format::ALL.len()];
            let action = ActionType::ALL[i % ActionType::ALL.len()];
            let event = BehaviorEvent::new("u1", action).with_tone(tone).with_format(format);
            profile = fold_event(&profile, &event, &config);
            assert_normalized(&profile);
        }
    }

    #[test]
    fn test_hook_length_running_mean() {
        let config = PersonaConfig::default();
        let mut profile = PersonaProfile::new("u1");
        for words in [10, 14, 12] {
            let event = BehaviorEvent::new("u1", ActionType::Generation).with_hook_length(words);
            profile = fold_event(&profile, &event, &config);
        }
        assert!((profile.avg_hook_length - 12.0).abs() < 1e-9);
        assert_eq!(profile.hook_length_samples, 3);
    }

    #[test]
    fn test_cta_majority_with_latest_tie_break() {
        let config = PersonaConfig::default();
        let mut profile = PersonaProfile::new("u1");
        for cta in [CtaStyle::Direct, CtaStyle::Direct, CtaStyle::Engagement] {
            let event = BehaviorEvent::new("u1", ActionType::Generation).with_cta_style(cta);
            profile = fold_event(&profile, &event, &config);
        }
        assert_eq!(profile.cta_style, CtaStyle::Direct);

        let event = BehaviorEvent::new("u1", ActionType::Generation).with_cta_style(CtaStyle::Engagement);
        profile = fold_event(&profile, &event, &config);
        assert_eq!(profile.cta_style, CtaStyle::Engagement);
    }

    #[test]
    fn test_pacing_follows_latest_signal() {
        let config = PersonaConfig::default();
        let profile = fold_event(
            &PersonaProfile::new("u1"),
            &BehaviorEvent::new("u1", ActionType::Onboarding).with_pacing(Pacing::Fast),
            &config,
        );
        assert_eq!(profile.pacing, Pacing::Fast);
    }

    #[test]
    fn test_best_performers_need_minimum_outcomes() {
        let config = PersonaConfig::default();
        let mut profile = PersonaProfile::new("u1");
        let samples = [(Tone::Funny, 9.0), (Tone::Serious, 3.0)];
        for (tone, score) in samples {
            let outcome = Outcome { result_id: None, tone: Some(tone), opening: None, format: Some(Format::Listicle), score, observed_at: Utc::now() };
            profile = fold_outcome(&profile, &outcome, &config);
        }
        assert!(profile.best_performing_tone.is_none());

        let outcome = Outcome { result_id: None, tone: Some(Tone::Serious), opening: None, format: None, score: 4.0, observed_at: Utc::now() };
        profile = fold_outcome(&profile, &outcome, &config);
        assert_eq!(profile.best_performing_tone, Some(Tone::Funny));
        assert_eq!(profile.best_performing_format, Some(Format::Listicle));
        assert!(profile.best_performing_opening.is_none());
        let avg = profile.avg_performance_score.unwrap();
        assert!((avg - 16.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_outcome_above_average_nudges_weights() {
        let config = PersonaConfig::default();
        let mut profile = PersonaProfile::new("u1");
        let low = Outcome { result_id: None, tone: Some(Tone::Serious), opening: None, format: None, score: 2.0, observed_at: Utc::now() };
        profile = fold_outcome(&profile, &low, &config);
        assert_eq!(profile.tone_weights, WeightMap::uniform());

        let high = Outcome { result_id: None, tone: Some(Tone::Inspirational), opening: None, format: None, score: 9.0, observed_at: Utc::now() };
        profile = fold_outcome(&profile, &high, &config);
        assert_eq!(profile.tone_weights.dominant().0, Tone::Inspirational);
        assert_normalized(&profile);
    }

    #[test]
    fn test_same_result_folds_once() {
        let config = PersonaConfig::default();
        let outcome = Outcome {
            result_id: Some("res-1".to_string()),
            tone: Some(Tone::Casual),
            opening: None,
            format: None,
            score: 4.0,
            observed_at: Utc::now(),
        };
        let once = fold_outcome(&PersonaProfile::new("u1"), &outcome, &config);
        let twice = fold_outcome(&once, &outcome, &config);
        assert_eq!(once, twice);
        assert_eq!(twice.outcome_count, 1);
        assert!(twice.has_folded("res-1"));
    }

    #[test]
    fn test_ab_win_with_score_counts_as_outcome() {
        let config = PersonaConfig::default();
        let event = BehaviorEvent::new("u1", ActionType::AbWin).with_tone(Tone::Funny).with_score(7.5);
        let profile = fold_event(&PersonaProfile::new("u1"), &event, &config);
        assert_eq!(profile.total_ab_wins, 1);
        assert_eq!(profile.outcome_count, 1);
        assert_eq!(profile.avg_performance_score, Some(7.5));
    }
}
