//! Personalization facade
//!
//! Wires the learner, pattern engine, suggestion generator and insights
//! aggregator over one store so callers record events and results in a
//! single place.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::entitlements::Entitlements;
use crate::error::CoreResult;
use crate::events::BehaviorEvent;
use crate::generation::ContentGenerator;
use crate::insights::{InsightsAggregator, PerformanceInsight, WeekPeriod};
use crate::patterns::{PatternEngine, PatternStats, RecordedResult};
use crate::persona::{Outcome, Overlay, PersonaLearner, PersonaProfile};
use crate::results::ContentResult;
use crate::store::{Store, Versioned};
use crate::suggestions::random::RandomSource;
use crate::suggestions::{DailyBatch, DailyRequest, DailySuggestion, SuggestionGenerator};
use crate::types::Platform;

pub struct Personalizer {
    learner: Arc<PersonaLearner>,
    patterns: Arc<PatternEngine>,
    suggestions: SuggestionGenerator,
    insights: InsightsAggregator,
    entitlements: Arc<dyn Entitlements>,
}

impl Personalizer {
    pub fn new<S: Store + 'static>(
        store: Arc<S>,
        generator: Arc<dyn ContentGenerator>,
        entitlements: Arc<dyn Entitlements>,
        config: &Config,
    ) -> Self {
        let learner = Arc::new(PersonaLearner::new(store.clone(), store.clone(), store.clone(), config.persona.clone()));
        let patterns = Arc::new(PatternEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            config.patterns.clone(),
        ));
        let suggestions = SuggestionGenerator::new(
            patterns.clone(),
            learner.clone(),
            store.clone(),
            generator.clone(),
            entitlements.clone(),
            config.suggestions.clone(),
        );
        let insights = InsightsAggregator::new(
            store.clone(),
            store,
            learner.clone(),
            generator,
            config.insights.clone(),
        )
        .with_locale(&config.suggestions.locale);

        Self {
            learner,
            patterns,
            suggestions,
            insights,
            entitlements,
        }
    }

    /// Replace the exploration random source
    pub fn with_random(mut self, random: Box<dyn RandomSource>) -> Self {
        self.suggestions = self.suggestions.with_random(random);
        self
    }

    /// Append a behavioral event, fold it into the persona and, for
    /// generations, bump the pattern's generation count.
    ///
    /// Replaying an event id is a no-op and returns `None`.
    pub async fn record_event(&self, event: &BehaviorEvent) -> CoreResult<Option<Versioned<PersonaProfile>>> {
        let updated = self.learner.record_event(event).await?;
        if updated.is_some() {
            self.patterns.record_generation(event).await?;
        }
        Ok(updated)
    }

    /// Store a measured result, refresh its pattern, and feed the outcome to
    /// the persona.
    ///
    /// The persona remembers which result ids it has folded, so retrying
    /// after a failed fold completes it and a plain replay changes nothing.
    pub async fn record_result(&self, result: &ContentResult) -> CoreResult<RecordedResult> {
        let recorded = self.patterns.record_result(result).await?;
        if !recorded.newly_recorded {
            debug!("Result {} re-recorded, folding outcome only if missing", result.id);
        }
        self.learner
            .record_outcome(&result.user_id, &Outcome::from_result(result))
            .await?;
        Ok(recorded)
    }

    pub async fn profile(&self, user_id: &str) -> CoreResult<Option<Versioned<PersonaProfile>>> {
        self.learner.profile(user_id).await
    }

    pub async fn rebuild_profile(&self, user_id: &str) -> CoreResult<Versioned<PersonaProfile>> {
        self.learner.rebuild(user_id).await
    }

    /// Overlay for the user's plan; never fails
    pub async fn overlay(&self, user_id: &str) -> Overlay {
        let entitled = self.entitlements.personalization_enabled(user_id).await;
        self.learner.overlay(user_id, entitled).await
    }

    pub async fn top_patterns(&self, user_id: &str, platforms: &[Platform], limit: usize) -> CoreResult<Vec<PatternStats>> {
        self.patterns.top_patterns(user_id, platforms, limit).await
    }

    pub async fn generate_daily(&self, request: &DailyRequest) -> CoreResult<DailyBatch> {
        self.suggestions.generate_daily(request).await
    }

    pub async fn suggestions_for(&self, user_id: &str, date: NaiveDate) -> CoreResult<Vec<DailySuggestion>> {
        self.suggestions.suggestions_for(user_id, date).await
    }

    pub async fn mark_used(
        &self,
        user_id: &str,
        date: NaiveDate,
        platform: Platform,
        generation_id: Option<&str>,
    ) -> CoreResult<DailySuggestion> {
        self.suggestions.mark_used(user_id, date, platform, generation_id).await
    }

    pub async fn generate_weekly(&self, user_id: &str, period: WeekPeriod) -> CoreResult<Option<PerformanceInsight>> {
        self.insights.generate_weekly(user_id, period).await
    }
}
