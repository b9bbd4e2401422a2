//! In-memory store
//!
//! Implements every storage collaborator over plain maps behind a
//! `tokio::sync::RwLock`. Used by tests and by embedders that persist
//! elsewhere.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

use super::{
    EventLog, InsightStore, PatternStore, PersonaStore, ResultStore, SaveOutcome, SuggestionStore, Versioned,
};
use crate::error::StoreError;
use crate::events::BehaviorEvent;
use crate::insights::PerformanceInsight;
use crate::patterns::{PatternKey, PatternStats};
use crate::persona::PersonaProfile;
use crate::results::ContentResult;
use crate::suggestions::DailySuggestion;
use crate::types::Platform;

#[derive(Default)]
struct Inner {
    events: Vec<BehaviorEvent>,
    event_ids: HashSet<String>,
    results: BTreeMap<String, ContentResult>,
    personas: HashMap<String, Versioned<PersonaProfile>>,
    patterns: BTreeMap<(String, String), PatternStats>,
    suggestions: BTreeMap<(String, NaiveDate, Platform), DailySuggestion>,
    insights: BTreeMap<(String, String), PerformanceInsight>,
}

/// Map-backed store
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    failing_reads: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` reads fail with a backend error
    pub fn fail_next_reads(&self, count: u32) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), StoreError> {
        let remaining = self.failing_reads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_reads.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Backend("simulated read failure".to_string()));
        }
        Ok(())
    }

    /// Number of stored suggestion rows across all users
    pub async fn suggestion_rows(&self) -> usize {
        self.inner.read().await.suggestions.len()
    }
}

#[async_trait::async_trait]
impl EventLog for MemoryStore {
    async fn append_event(&self, event: &BehaviorEvent) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.event_ids.insert(event.id.clone()) {
            return Ok(false);
        }
        inner.events.push(event.clone());
        Ok(true)
    }

    async fn events_for_user(&self, user_id: &str) -> Result<Vec<BehaviorEvent>, StoreError> {
        self.check_read()?;
        let inner = self.inner.read().await;
        Ok(inner.events.iter().filter(|e| e.user_id == user_id).cloned().collect())
    }
}

#[async_trait::async_trait]
impl ResultStore for MemoryStore {
    async fn upsert_result(&self, result: &ContentResult) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        Ok(inner.results.insert(result.id.clone(), result.clone()).is_none())
    }

    async fn results_for_pattern(&self, user_id: &str, key: &PatternKey) -> Result<Vec<ContentResult>, StoreError> {
        self.check_read()?;
        let inner = self.inner.read().await;
        Ok(inner
            .results
            .values()
            .filter(|r| r.user_id == user_id && &r.pattern_key() == key)
            .cloned()
            .collect())
    }

    async fn results_for_user(&self, user_id: &str) -> Result<Vec<ContentResult>, StoreError> {
        self.check_read()?;
        let inner = self.inner.read().await;
        let mut results: Vec<ContentResult> = inner
            .results
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| a.posted_at.cmp(&b.posted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(results)
    }

    async fn results_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ContentResult>, StoreError> {
        self.check_read()?;
        let inner = self.inner.read().await;
        let mut results: Vec<ContentResult> = inner
            .results
            .values()
            .filter(|r| r.user_id == user_id && r.posted_at >= from && r.posted_at < to)
            .cloned()
            .collect();
        results.sort_by(|a, b| a.posted_at.cmp(&b.posted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(results)
    }
}

#[async_trait::async_trait]
impl PersonaStore for MemoryStore {
    async fn load_persona(&self, user_id: &str) -> Result<Option<Versioned<PersonaProfile>>, StoreError> {
        self.check_read()?;
        Ok(self.inner.read().await.personas.get(user_id).cloned())
    }

    async fn save_persona(
        &self,
        user_id: &str,
        expected_version: Option<u64>,
        profile: &PersonaProfile,
    ) -> Result<SaveOutcome, StoreError> {
        let mut inner = self.inner.write().await;
        let current = inner.personas.get(user_id).map(|v| v.version);
        if current != expected_version {
            return Ok(SaveOutcome::Conflict);
        }
        let version = current.map(|v| v + 1).unwrap_or(1);
        inner.personas.insert(
            user_id.to_string(),
            Versioned {
                version,
                value: profile.clone(),
            },
        );
        Ok(SaveOutcome::Saved { version })
    }
}

#[async_trait::async_trait]
impl PatternStore for MemoryStore {
    async fn upsert_pattern(&self, stats: &PatternStats) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .patterns
            .insert((stats.user_id.clone(), stats.pattern_key.to_string()), stats.clone());
        Ok(())
    }

    async fn get_pattern(&self, user_id: &str, key: &PatternKey) -> Result<Option<PatternStats>, StoreError> {
        self.check_read()?;
        let inner = self.inner.read().await;
        Ok(inner.patterns.get(&(user_id.to_string(), key.to_string())).cloned())
    }

    async fn patterns_for_user(&self, user_id: &str) -> Result<Vec<PatternStats>, StoreError> {
        self.check_read()?;
        let inner = self.inner.read().await;
        Ok(inner
            .patterns
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl SuggestionStore for MemoryStore {
    async fn upsert_suggestion(&self, suggestion: &DailySuggestion) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.suggestions.insert(
            (suggestion.user_id.clone(), suggestion.date, suggestion.platform),
            suggestion.clone(),
        );
        Ok(())
    }

    async fn get_suggestion(
        &self,
        user_id: &str,
        date: NaiveDate,
        platform: Platform,
    ) -> Result<Option<DailySuggestion>, StoreError> {
        self.check_read()?;
        let inner = self.inner.read().await;
        Ok(inner.suggestions.get(&(user_id.to_string(), date, platform)).cloned())
    }

    async fn suggestions_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<DailySuggestion>, StoreError> {
        self.check_read()?;
        let inner = self.inner.read().await;
        Ok(inner
            .suggestions
            .values()
            .filter(|s| s.user_id == user_id && s.date == date)
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl InsightStore for MemoryStore {
    async fn upsert_insight(&self, insight: &PerformanceInsight) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner
            .insights
            .insert((insight.user_id.clone(), insight.week_id.clone()), insight.clone());
        Ok(())
    }

    async fn get_insight(&self, user_id: &str, week_id: &str) -> Result<Option<PerformanceInsight>, StoreError> {
        self.check_read()?;
        let inner = self.inner.read().await;
        Ok(inner.insights.get(&(user_id.to_string(), week_id.to_string())).cloned())
    }

    async fn latest_insight_week(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        self.check_read()?;
        let inner = self.inner.read().await;
        Ok(inner
            .insights
            .keys()
            .filter(|(user, _)| user == user_id)
            .map(|(_, week)| week.clone())
            .max())
    }
}
