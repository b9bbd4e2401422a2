//! Daily suggestion generator
//!
//! Builds the day's ideas in four steps: check the plan limit, pick exploit
//! candidates from the best measured patterns, fill the remaining slots with
//! untried (platform, tone, format) combinations, then ask the generation
//! collaborator for one hook per candidate. A candidate whose generation
//! fails is skipped; the rest of the batch still goes out.

use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cta::templates_for;
use super::random::{RandomSource, SeededRandom};
use super::{split_slots, DailyBatch, DailyRequest, DailySuggestion, SuggestionIdea};
use crate::config::SuggestionConfig;
use crate::entitlements::{check_daily_limit, Entitlements};
use crate::error::{CoreError, CoreResult, StoreError};
use crate::generation::{generate_text, ContentGenerator, GenerationRequest};
use crate::patterns::{PatternEngine, PatternKey, PatternStats};
use crate::persona::{Overlay, PersonaLearner};
use crate::store::{retry_read, SuggestionStore};
use crate::types::{Category, Format, Platform, Tone};

/// Where a candidate came from
#[derive(Debug, Clone)]
enum Source {
    Exploit(PatternStats),
    Explore,
}

/// A pattern chosen for today, before its hook is generated
#[derive(Debug, Clone)]
struct Candidate {
    platform: Platform,
    tone: Tone,
    format: Format,
    key: PatternKey,
    source: Source,
}

pub struct SuggestionGenerator {
    patterns: Arc<PatternEngine>,
    learner: Arc<PersonaLearner>,
    store: Arc<dyn SuggestionStore>,
    generator: Arc<dyn ContentGenerator>,
    entitlements: Arc<dyn Entitlements>,
    // std lock: only held inside `next_index`, never across an await
    random: Mutex<Box<dyn RandomSource>>,
    config: SuggestionConfig,
}

impl SuggestionGenerator {
    pub fn new(
        patterns: Arc<PatternEngine>,
        learner: Arc<PersonaLearner>,
        store: Arc<dyn SuggestionStore>,
        generator: Arc<dyn ContentGenerator>,
        entitlements: Arc<dyn Entitlements>,
        config: SuggestionConfig,
    ) -> Self {
        Self {
            patterns,
            learner,
            store,
            generator,
            entitlements,
            random: Mutex::new(Box::new(SeededRandom::from_entropy())),
            config,
        }
    }

    /// Replace the random source, e.g. with a seeded one in tests
    pub fn with_random(mut self, random: Box<dyn RandomSource>) -> Self {
        self.random = Mutex::new(random);
        self
    }

    fn next_index(&self, len: usize) -> usize {
        let mut random = self.random.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        random.next_index(len)
    }

    /// Produce (or return) the suggestions for one user and day.
    ///
    /// Rows are unique per (user, date, platform). Without `regenerate`,
    /// platforms that already have ideas keep their row untouched and only
    /// the missing platforms are generated; with it, every requested row is
    /// replaced. A platform whose ideas all failed gets no row, so a later
    /// call retries it.
    pub async fn generate_daily(&self, request: &DailyRequest) -> CoreResult<DailyBatch> {
        let platforms = dedup_platforms(&request.platforms);
        if platforms.is_empty() {
            return Err(CoreError::InvalidRequest("at least one platform is required".to_string()));
        }
        let user_id = request.user_id.as_str();
        let date = request.date;

        let day = retry_read("suggestions_for_date", move || self.store.suggestions_for_date(user_id, date)).await?;
        let mut existing: HashMap<Platform, DailySuggestion> = day.into_iter().map(|row| (row.platform, row)).collect();

        let quotas = platform_quotas(request.count, &platforms);
        let targets: Vec<Platform> = platforms
            .iter()
            .copied()
            .filter(|p| request.regenerate || existing.get(p).map_or(true, |row| row.ideas.is_empty()))
            .collect();
        let to_generate: usize = targets.iter().map(|p| quotas.get(p).copied().unwrap_or(0)).sum();
        let already: usize = existing
            .values()
            .filter(|row| !targets.contains(&row.platform))
            .map(|row| row.ideas.len())
            .sum();
        let limit = check_daily_limit(self.entitlements.as_ref(), user_id, request.count, already, to_generate).await?;

        let mut batch = DailyBatch {
            suggestions: Vec::new(),
            requested: request.count,
            produced: 0,
            skipped: 0,
            unfilled: 0,
            limit,
            reused: 0,
        };

        let mut fresh: HashMap<Platform, DailySuggestion> = HashMap::new();
        if !targets.is_empty() && to_generate > 0 {
            let personalized = self.entitlements.personalization_enabled(user_id).await;
            let overlay = self.learner.overlay(user_id, personalized).await;
            let mut candidates = Vec::new();
            for platform in &targets {
                let quota = quotas.get(platform).copied().unwrap_or(0);
                let selected = self
                    .select_candidates(user_id, *platform, quota, request.explore_ratio, &overlay)
                    .await?;
                batch.unfilled += quota - selected.len();
                candidates.extend(selected);
            }
            let (ideas, skipped) = self.build_ideas(&candidates, &overlay).await;
            batch.skipped = skipped;

            for platform in &targets {
                let platform_ideas: Vec<SuggestionIdea> = ideas
                    .iter()
                    .filter(|(p, _)| p == platform)
                    .map(|(_, idea)| idea.clone())
                    .collect();
                if platform_ideas.is_empty() {
                    warn!("No ideas generated for {} on {} ({}), nothing stored", user_id, platform, date);
                    continue;
                }
                let mut row = DailySuggestion::new(user_id, date, *platform, platform_ideas);
                if let Some(previous) = existing.get(platform) {
                    row.id = previous.id.clone();
                }

                match self.store.upsert_suggestion(&row).await {
                    Ok(()) => {
                        batch.produced += row.ideas.len();
                        fresh.insert(*platform, row);
                    }
                    Err(e) => {
                        warn!("Failed to store suggestions for {} on {}: {}", user_id, platform, e);
                        batch.skipped += row.ideas.len();
                    }
                }
            }
        }

        for platform in &platforms {
            if let Some(row) = fresh.remove(platform) {
                batch.suggestions.push(row);
            } else if let Some(row) = existing.remove(platform).filter(|row| !row.ideas.is_empty()) {
                batch.reused += 1;
                batch.suggestions.push(row);
            }
        }

        info!(
            "Daily suggestions for {} on {}: {} requested, {} produced, {} skipped, {} unfilled, {} reused (limit {})",
            user_id, date, batch.requested, batch.produced, batch.skipped, batch.unfilled, batch.reused, batch.limit
        );
        Ok(batch)
    }

    async fn select_candidates(
        &self,
        user_id: &str,
        platform: Platform,
        count: usize,
        explore_ratio: f64,
        overlay: &Overlay,
    ) -> CoreResult<Vec<Candidate>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let (exploit_slots, explore_slots) = split_slots(count, explore_ratio);

        let top = self.patterns.top_patterns(user_id, &[platform], exploit_slots).await?;
        let mut candidates: Vec<Candidate> = top
            .into_iter()
            .map(|stats| Candidate {
                platform: stats.pattern_key.platform,
                tone: stats.pattern_key.tone.unwrap_or(overlay.tone),
                format: overlay.format,
                key: stats.pattern_key.clone(),
                source: Source::Exploit(stats),
            })
            .collect();

        // Not enough measured patterns: the leftover slots explore too
        let shortfall = exploit_slots - candidates.len();
        let mut tried = self.patterns.tried_combinations(user_id, platform).await?;
        tried.extend(candidates.iter().map(|c| (c.tone, c.format)));
        let explored = self.sample_exploration(platform, &tried, explore_slots + shortfall);
        debug!(
            "Selected {} exploit and {} explore candidates for {} on {} ({} slots short)",
            candidates.len(),
            explored.len(),
            user_id,
            platform,
            shortfall
        );
        candidates.extend(explored);
        Ok(candidates)
    }

    /// Draw (tone, format) combinations not in `tried` for one platform,
    /// without replacement. Returns fewer than `slots` once the space runs
    /// out.
    fn sample_exploration(&self, platform: Platform, tried: &HashSet<(Tone, Format)>, slots: usize) -> Vec<Candidate> {
        if slots == 0 {
            return Vec::new();
        }
        let mut pool: Vec<(Tone, Format)> = Tone::ALL
            .iter()
            .flat_map(|tone| Format::ALL.iter().map(move |format| (*tone, *format)))
            .filter(|combo| !tried.contains(combo))
            .collect();

        let mut picked = Vec::new();
        while picked.len() < slots && !pool.is_empty() {
            let (tone, format) = pool.swap_remove(self.next_index(pool.len()));
            picked.push(Candidate {
                platform,
                tone,
                format,
                key: PatternKey::new(platform).with_tone(tone),
                source: Source::Explore,
            });
        }
        picked
    }

    /// Generate one idea per candidate, concurrently. Returns the ideas with
    /// their platform, and how many candidates were skipped.
    async fn build_ideas(&self, candidates: &[Candidate], overlay: &Overlay) -> (Vec<(Platform, SuggestionIdea)>, usize) {
        let timeout = Duration::from_secs(self.config.generation_timeout_secs.max(1));
        let requests: Vec<GenerationRequest> = candidates
            .iter()
            .map(|c| {
                GenerationRequest::hook_idea(c.platform, c.tone, c.format, overlay.clone(), &self.config.locale)
                    .with_pattern(c.key.clone())
            })
            .collect();

        let outcomes = join_all(
            requests
                .iter()
                .map(|request| generate_text(self.generator.as_ref(), request, timeout)),
        )
        .await;

        let mut ideas = Vec::new();
        let mut skipped = 0;
        for (candidate, outcome) in candidates.iter().zip(outcomes) {
            match outcome {
                Ok(hook) => ideas.push((candidate.platform, self.idea_for(candidate, hook))),
                Err(e) => {
                    warn!("Skipping suggestion for pattern {}: {}", candidate.key, e);
                    skipped += 1;
                }
            }
        }
        (ideas, skipped)
    }

    fn idea_for(&self, candidate: &Candidate, hook_idea: String) -> SuggestionIdea {
        let templates = templates_for(candidate.tone);
        let cta = templates[self.next_index(templates.len())].to_string();

        let (reason, confidence_score, is_exploration) = match &candidate.source {
            Source::Exploit(stats) => (
                format!(
                    "Your {} content in this pattern averages {:.1}% engagement across {} posts.",
                    candidate.tone, stats.avg_engagement_rate, stats.total_results
                ),
                exploit_confidence(stats.weighted_score, self.config.confidence_scale),
                false,
            ),
            Source::Explore => (
                format!(
                    "Deliberate new attempt: you haven't tried {} {} content on {} yet.",
                    candidate.tone, candidate.format, candidate.platform
                ),
                self.config.exploration_confidence.min(100),
                true,
            ),
        };

        SuggestionIdea {
            hook_idea,
            format: candidate.format,
            tone: candidate.tone,
            cta,
            reason,
            pattern_key: Some(candidate.key.clone()),
            is_exploration,
            confidence_score,
        }
    }

    /// Stored rows for one day
    pub async fn suggestions_for(&self, user_id: &str, date: NaiveDate) -> CoreResult<Vec<DailySuggestion>> {
        Ok(retry_read("suggestions_for_date", move || self.store.suggestions_for_date(user_id, date)).await?)
    }

    /// Mark a day's suggestion row as used
    pub async fn mark_used(
        &self,
        user_id: &str,
        date: NaiveDate,
        platform: Platform,
        generation_id: Option<&str>,
    ) -> CoreResult<DailySuggestion> {
        let row = retry_read("get_suggestion", move || self.store.get_suggestion(user_id, date, platform)).await?;
        let mut row = row.ok_or_else(|| {
            StoreError::NotFound(format!("suggestion for {} on {} ({})", user_id, date, platform))
        })?;

        row.used = true;
        row.used_at = Some(Utc::now());
        if let Some(generation_id) = generation_id {
            row.generation_id = Some(generation_id.to_string());
        }
        self.store.upsert_suggestion(&row).await?;
        Ok(row)
    }
}

/// `min(100, weighted_score * scale)`, clamped to 0-100
pub fn exploit_confidence(weighted_score: f64, scale: f64) -> u8 {
    let value = weighted_score * scale;
    if !value.is_finite() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

fn dedup_platforms(platforms: &[Platform]) -> Vec<Platform> {
    let mut seen = HashSet::new();
    platforms.iter().copied().filter(|p| seen.insert(*p)).collect()
}

/// Share of `count` per platform; earlier platforms take the remainder
fn platform_quotas(count: usize, platforms: &[Platform]) -> HashMap<Platform, usize> {
    let n = platforms.len().max(1);
    platforms
        .iter()
        .enumerate()
        .map(|(i, p)| (*p, count / n + usize::from(i < count % n)))
        .collect()
}
