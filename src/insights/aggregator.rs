//! Weekly insights aggregator

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::period::WeekPeriod;
use super::recommendations::{recommend, RuleInput};
use super::{BestPerformers, GroupStats, PerformanceInsight, PeriodTotals, WeekOverWeek};
use crate::config::InsightConfig;
use crate::error::CoreResult;
use crate::generation::{generate_text, ContentGenerator, GenerationRequest, GENERATION_TIMEOUT};
use crate::persona::{build_overlay, PersonaLearner, PersonaProfile};
use crate::results::ContentResult;
use crate::store::{retry_read, InsightStore, ResultStore};
use crate::types::Category;

/// Alignment reported when there is nothing to align against
pub const NEUTRAL_ALIGNMENT: f64 = 50.0;

pub struct InsightsAggregator {
    results: Arc<dyn ResultStore>,
    insights: Arc<dyn InsightStore>,
    learner: Arc<PersonaLearner>,
    generator: Arc<dyn ContentGenerator>,
    config: InsightConfig,
    locale: String,
    timeout: Duration,
}

impl InsightsAggregator {
    pub fn new(
        results: Arc<dyn ResultStore>,
        insights: Arc<dyn InsightStore>,
        learner: Arc<PersonaLearner>,
        generator: Arc<dyn ContentGenerator>,
        config: InsightConfig,
    ) -> Self {
        Self {
            results,
            insights,
            learner,
            generator,
            config,
            locale: "en".to_string(),
            timeout: GENERATION_TIMEOUT,
        }
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = locale.to_string();
        self
    }

    /// Build (or fetch) the insight for one ISO week.
    ///
    /// `None` when the week has fewer results than the configured minimum.
    /// A week older than the latest stored insight is returned as stored and
    /// never recomputed; an older week with nothing stored is computed.
    pub async fn generate_weekly(&self, user_id: &str, period: WeekPeriod) -> CoreResult<Option<PerformanceInsight>> {
        let week_id = period.id();
        let latest = retry_read("latest_insight_week", move || self.insights.latest_insight_week(user_id)).await?;
        if latest.as_deref().map(|l| l > week_id.as_str()).unwrap_or(false) {
            let id = week_id.as_str();
            if let Some(stored) = retry_read("get_insight", move || self.insights.get_insight(user_id, id)).await? {
                debug!("Week {} for {} is superseded, returning stored insight", week_id, user_id);
                return Ok(Some(stored));
            }
            debug!("Week {} for {} predates the latest insight but was never computed", week_id, user_id);
        }

        let (from, to) = period.bounds();
        let current = retry_read("results_between", move || self.results.results_between(user_id, from, to)).await?;
        if current.len() < self.config.min_results {
            debug!(
                "Only {} results for {} in {}, no insight",
                current.len(),
                user_id,
                week_id
            );
            return Ok(None);
        }

        let (prev_from, prev_to) = period.previous().bounds();
        let previous = retry_read("results_between", move || {
            self.results.results_between(user_id, prev_from, prev_to)
        })
        .await?;

        let platforms = group_by(&current, |r| Some(r.params.platform));
        let tones = group_by(&current, |r| r.params.tone);
        let formats = group_by(&current, |r| r.params.format);
        let best = BestPerformers {
            platform: best_of(&platforms),
            tone: best_of(&tones),
            format: best_of(&formats),
        };

        let totals = totals_for(&current);
        let previous_totals = totals_for(&previous);
        let week_over_week = WeekOverWeek {
            views_change: pct_change(totals.views as f64, previous_totals.views as f64),
            engagement_change: pct_change(totals.avg_engagement_rate, previous_totals.avg_engagement_rate),
            posts_change: pct_change(totals.posts as f64, previous_totals.posts as f64),
        };

        let profile = match self.learner.profile(user_id).await {
            Ok(profile) => profile.map(|p| p.value),
            Err(e) => {
                warn!("Could not load persona for {}, alignment is neutral: {}", user_id, e);
                None
            }
        };
        let persona_alignment = persona_alignment(profile.as_ref(), &current);
        let persona_tone = profile
            .as_ref()
            .filter(|p| !p.tone_weights.is_flat())
            .map(|p| p.tone_weights.dominant().0);

        let recommendations = recommend(
            &RuleInput {
                week_over_week: &week_over_week,
                best: &best,
                totals: &totals,
                previous_totals: &previous_totals,
                platform_count: platforms.len(),
                tone_count: tones.len(),
                persona_alignment,
                persona_tone,
            },
            &self.config,
        );

        let facts = summary_facts(&totals, &week_over_week, &best);
        let overlay = build_overlay(profile.as_ref(), true);
        let request = GenerationRequest::weekly_summary(overlay.tone, overlay, &self.locale, facts.join("\n"));
        let (summary, summary_generated) = match generate_text(self.generator.as_ref(), &request, self.timeout).await {
            Ok(text) => (text, true),
            Err(e) => {
                warn!("Weekly summary generation failed for {}, using fallback: {}", user_id, e);
                (fallback_summary(&totals, &week_over_week, &best), false)
            }
        };

        let insight = PerformanceInsight {
            user_id: user_id.to_string(),
            week_id,
            period_start: period.start(),
            period_end: period.end(),
            summary,
            summary_generated,
            best,
            platforms,
            tones,
            formats,
            week_over_week,
            recommendations,
            persona_alignment,
            totals,
            previous_totals,
            generated_at: Utc::now(),
        };
        self.insights.upsert_insight(&insight).await?;

        info!(
            "Weekly insight {} for {}: {} posts, {} recommendations",
            insight.week_id,
            user_id,
            insight.totals.posts,
            insight.recommendations.len()
        );
        Ok(Some(insight))
    }
}

/// Percentage change; 0 when the baseline is zero or either side is not finite
pub fn pct_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

fn totals_for(results: &[ContentResult]) -> PeriodTotals {
    if results.is_empty() {
        return PeriodTotals::default();
    }
    PeriodTotals {
        posts: results.len(),
        views: results.iter().map(|r| r.views).sum(),
        interactions: results.iter().map(|r| r.interactions()).sum(),
        avg_engagement_rate: results.iter().map(|r| r.effective_engagement_rate()).sum::<f64>() / results.len() as f64,
    }
}

/// Group results by one dimension, in the dimension's declared order.
/// Results without a value for the dimension are left out.
fn group_by<C, F>(results: &[ContentResult], dimension: F) -> Vec<GroupStats<C>>
where
    C: Category,
    F: Fn(&ContentResult) -> Option<C>,
{
    let mut groups: BTreeMap<C, Vec<&ContentResult>> = BTreeMap::new();
    for result in results {
        if let Some(value) = dimension(result) {
            groups.entry(value).or_default().push(result);
        }
    }

    C::ALL
        .iter()
        .filter_map(|value| groups.get(value).map(|members| (*value, members)))
        .map(|(value, members)| {
            let n = members.len() as f64;
            GroupStats {
                value,
                posts: members.len(),
                avg_views: members.iter().map(|r| r.views as f64).sum::<f64>() / n,
                avg_engagement_rate: members.iter().map(|r| r.effective_engagement_rate()).sum::<f64>() / n,
            }
        })
        .collect()
}

/// Highest average engagement; the earlier group wins a tie
fn best_of<C: Category>(groups: &[GroupStats<C>]) -> Option<GroupStats<C>> {
    let mut best: Option<&GroupStats<C>> = None;
    for group in groups {
        match best {
            Some(current) if group.avg_engagement_rate <= current.avg_engagement_rate => {}
            _ => best = Some(group),
        }
    }
    best.cloned()
}

/// Engagement-weighted share of results that used the persona's dominant
/// tone, as 0-100. Neutral without a profile, a real preference, or any
/// engagement to weigh.
pub fn persona_alignment(profile: Option<&PersonaProfile>, results: &[ContentResult]) -> f64 {
    let Some(profile) = profile else {
        return NEUTRAL_ALIGNMENT;
    };
    if profile.tone_weights.is_flat() {
        return NEUTRAL_ALIGNMENT;
    }
    let (dominant, _) = profile.tone_weights.dominant();

    let total: f64 = results.iter().map(|r| r.effective_engagement_rate()).sum();
    if total <= 0.0 || !total.is_finite() {
        return NEUTRAL_ALIGNMENT;
    }
    let aligned: f64 = results
        .iter()
        .filter(|r| r.params.tone == Some(dominant))
        .map(|r| r.effective_engagement_rate())
        .sum();
    (aligned / total * 100.0).clamp(0.0, 100.0)
}

fn describe_change(change: f64) -> String {
    if change > 0.0 {
        format!("up {:.0}%", change)
    } else if change < 0.0 {
        format!("down {:.0}%", change.abs())
    } else {
        "flat".to_string()
    }
}

fn summary_facts(totals: &PeriodTotals, wow: &WeekOverWeek, best: &BestPerformers) -> Vec<String> {
    let mut facts = vec![
        format!("Posts this week: {}", totals.posts),
        format!("Total views: {}", totals.views),
        format!("Average engagement: {:.1}%", totals.avg_engagement_rate),
        format!("Views versus last week: {}", describe_change(wow.views_change)),
        format!("Engagement versus last week: {}", describe_change(wow.engagement_change)),
    ];
    if let Some(platform) = &best.platform {
        facts.push(format!("Best platform: {}", platform.value));
    }
    if let Some(format) = &best.format {
        facts.push(format!("Best format: {}", format.value));
    }
    facts
}

/// Deterministic summary used when generation fails
pub fn fallback_summary(totals: &PeriodTotals, wow: &WeekOverWeek, best: &BestPerformers) -> String {
    let mut summary = format!(
        "You published {} posts this week for {} total views at {:.1}% average engagement. Views were {} compared with last week.",
        totals.posts,
        totals.views,
        totals.avg_engagement_rate,
        describe_change(wow.views_change)
    );
    match (&best.platform, &best.format) {
        (Some(platform), Some(format)) => summary.push_str(&format!(
            " {} led your platforms, and {} was your strongest format.",
            platform.value, format.value
        )),
        (Some(platform), None) => summary.push_str(&format!(" {} led your platforms.", platform.value)),
        _ => {}
    }
    summary
}
