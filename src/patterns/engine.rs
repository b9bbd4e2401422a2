//! Pattern statistics engine
//!
//! Keeps one `PatternStats` row per user × pattern key, recomputed in full
//! from the stored results whenever something changes. Results are upserted
//! by id before the recompute, so replays never double-count.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use super::key::PatternKey;
use super::stats::PatternStats;
use crate::config::PatternConfig;
use crate::error::CoreResult;
use crate::events::BehaviorEvent;
use crate::results::ContentResult;
use crate::store::{retry_read, EventLog, PatternStore, ResultStore};
use crate::types::{ActionType, Format, Platform, Tone};

/// Stats after recording a result
#[derive(Debug, Clone)]
pub struct RecordedResult {
    pub stats: PatternStats,
    /// False when the result id had already been recorded
    pub newly_recorded: bool,
}

pub struct PatternEngine {
    results: Arc<dyn ResultStore>,
    patterns: Arc<dyn PatternStore>,
    events: Arc<dyn EventLog>,
    config: PatternConfig,
}

impl PatternEngine {
    pub fn new(
        results: Arc<dyn ResultStore>,
        patterns: Arc<dyn PatternStore>,
        events: Arc<dyn EventLog>,
        config: PatternConfig,
    ) -> Self {
        Self {
            results,
            patterns,
            events,
            config,
        }
    }

    /// Store a result and refresh the stats for its pattern
    pub async fn record_result(&self, result: &ContentResult) -> CoreResult<RecordedResult> {
        let newly_recorded = self.results.upsert_result(result).await?;
        let stats = self.recompute(&result.user_id, &result.pattern_key()).await?;
        Ok(RecordedResult { stats, newly_recorded })
    }

    /// Refresh `total_generations` for the pattern a generation event used.
    ///
    /// Events without prompt parameters, or that are not generations, have
    /// no pattern and return `None`.
    pub async fn record_generation(&self, event: &BehaviorEvent) -> CoreResult<Option<PatternStats>> {
        if event.action != ActionType::Generation {
            return Ok(None);
        }
        let Some(params) = &event.params else {
            return Ok(None);
        };
        let stats = self.recompute(&event.user_id, &params.pattern_key()).await?;
        Ok(Some(stats))
    }

    /// Full recompute of one pattern from the stores
    pub async fn recompute(&self, user_id: &str, key: &PatternKey) -> CoreResult<PatternStats> {
        let results = retry_read("results_for_pattern", move || self.results.results_for_pattern(user_id, key)).await?;
        let total_generations = self.count_generations(user_id, key).await?;

        let stats = PatternStats::recompute(
            user_id,
            key.clone(),
            total_generations,
            &results,
            self.config.confidence_samples,
            self.config.preview_chars,
        );
        self.patterns.upsert_pattern(&stats).await?;

        debug!(
            "Recomputed pattern {} for {}: {} results, score {:.3}",
            key, user_id, stats.total_results, stats.weighted_score
        );
        Ok(stats)
    }

    async fn count_generations(&self, user_id: &str, key: &PatternKey) -> CoreResult<u64> {
        let events = retry_read("events_for_user", move || self.events.events_for_user(user_id)).await?;
        let count = events
            .iter()
            .filter(|e| e.action == ActionType::Generation)
            .filter(|e| e.params.as_ref().map(|p| &p.pattern_key() == key).unwrap_or(false))
            .count();
        Ok(count as u64)
    }

    pub async fn get(&self, user_id: &str, key: &PatternKey) -> CoreResult<Option<PatternStats>> {
        Ok(retry_read("get_pattern", move || self.patterns.get_pattern(user_id, key)).await?)
    }

    /// Every pattern the user has touched, measured or not
    pub async fn history(&self, user_id: &str) -> CoreResult<Vec<PatternStats>> {
        Ok(retry_read("patterns_for_user", move || self.patterns.patterns_for_user(user_id)).await?)
    }

    /// (tone, format) pairs the user has measured results for on a platform
    pub async fn tried_combinations(&self, user_id: &str, platform: Platform) -> CoreResult<HashSet<(Tone, Format)>> {
        let results = retry_read("results_for_user", move || self.results.results_for_user(user_id)).await?;
        Ok(results
            .iter()
            .filter(|r| r.params.platform == platform)
            .filter_map(|r| Some((r.params.tone?, r.params.format?)))
            .collect())
    }

    /// Best measured patterns on the given platforms (all platforms when
    /// empty), highest weighted score first.
    ///
    /// Ties break on sample count, then key text, so the order is stable.
    pub async fn top_patterns(
        &self,
        user_id: &str,
        platforms: &[Platform],
        limit: usize,
    ) -> CoreResult<Vec<PatternStats>> {
        let mut ranked: Vec<PatternStats> = self
            .history(user_id)
            .await?
            .into_iter()
            .filter(|p| p.is_exploitable())
            .filter(|p| platforms.is_empty() || platforms.contains(&p.pattern_key.platform))
            .collect();

        ranked.sort_by(rank_order);
        ranked.truncate(limit);
        Ok(ranked)
    }
}

fn rank_order(a: &PatternStats, b: &PatternStats) -> Ordering {
    b.weighted_score
        .partial_cmp(&a.weighted_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.total_results.cmp(&a.total_results))
        .then_with(|| a.pattern_key.to_string().cmp(&b.pattern_key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PromptParams;
    use crate::store::MemoryStore;
    use crate::types::Tone;

    fn engine(store: Arc<MemoryStore>) -> PatternEngine {
        PatternEngine::new(store.clone(), store.clone(), store, PatternConfig::default())
    }

    fn funny() -> PromptParams {
        PromptParams::new(Platform::TikTok).with_tone(Tone::Funny)
    }

    #[tokio::test]
    async fn test_replayed_result_does_not_double_count() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store);
        let result = ContentResult::new("r1", "u1", funny(), 1000).with_engagement_rate(6.0);

        let first = engine.record_result(&result).await.unwrap();
        let replay = engine.record_result(&result).await.unwrap();
        assert!(first.newly_recorded);
        assert!(!replay.newly_recorded);
        assert_eq!(replay.stats.total_results, 1);
        assert_eq!(first.stats.weighted_score, replay.stats.weighted_score);
    }

    #[tokio::test]
    async fn test_generation_events_feed_total_generations() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());
        for i in 0..3 {
            let event = BehaviorEvent::new("u1", ActionType::Generation)
                .with_id(&format!("g{}", i))
                .with_params(funny());
            store.append_event(&event).await.unwrap();
            engine.record_generation(&event).await.unwrap();
        }
        let save = BehaviorEvent::new("u1", ActionType::Save).with_params(funny());
        assert!(engine.record_generation(&save).await.unwrap().is_none());

        let stats = engine.get("u1", &funny().pattern_key()).await.unwrap().unwrap();
        assert_eq!(stats.total_generations, 3);
        assert_eq!(stats.total_results, 0);

        // Generated but never measured: not eligible for ranking
        assert!(engine.top_patterns("u1", &[], 5).await.unwrap().is_empty());
        assert_eq!(engine.history("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_top_patterns_filters_platform_and_limits() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store);
        let youtube = PromptParams::new(Platform::YouTube).with_tone(Tone::Educational);
        for i in 0..5 {
            engine
                .record_result(&ContentResult::new(&format!("t{}", i), "u1", funny(), 100).with_engagement_rate(5.0))
                .await
                .unwrap();
            engine
                .record_result(&ContentResult::new(&format!("y{}", i), "u1", youtube.clone(), 100).with_engagement_rate(9.0))
                .await
                .unwrap();
        }

        let all = engine.top_patterns("u1", &[], 10).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].pattern_key.platform, Platform::YouTube);

        let tiktok = engine.top_patterns("u1", &[Platform::TikTok], 10).await.unwrap();
        assert_eq!(tiktok.len(), 1);
        assert_eq!(tiktok[0].pattern_key, funny().pattern_key());

        assert_eq!(engine.top_patterns("u1", &[], 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_read_failure_is_retried() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine(store.clone());
        store.fail_next_reads(2);
        let recorded = engine
            .record_result(&ContentResult::new("r1", "u1", funny(), 100).with_engagement_rate(3.0))
            .await
            .unwrap();
        assert_eq!(recorded.stats.total_results, 1);
    }
}
