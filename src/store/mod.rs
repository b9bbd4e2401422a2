//! Storage collaborators
//!
//! The core only talks to storage through these traits. Two implementations
//! ship with the crate:
//! - `MemoryStore`: in-process maps, for tests and embedding
//! - `SqliteStore`: persistent, used by the CLI

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::StoreError;
use crate::events::BehaviorEvent;
use crate::insights::PerformanceInsight;
use crate::patterns::{PatternKey, PatternStats};
use crate::persona::PersonaProfile;
use crate::results::ContentResult;
use crate::suggestions::DailySuggestion;
use crate::types::Platform;

/// Read attempts before a backend error is surfaced
pub const READ_ATTEMPTS: u32 = 3;

/// Base delay between read attempts, multiplied by the attempt number
pub const READ_BACKOFF_MS: u64 = 25;

/// A value together with the version it was stored under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Result of a compare-and-swap write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { version: u64 },
    /// Someone else wrote first; reload and try again
    Conflict,
}

/// Append-only behavioral event log
#[async_trait::async_trait]
pub trait EventLog: Send + Sync {
    /// Append an event. Returns false when an event with the same id exists.
    async fn append_event(&self, event: &BehaviorEvent) -> Result<bool, StoreError>;

    /// All events for a user, oldest first
    async fn events_for_user(&self, user_id: &str) -> Result<Vec<BehaviorEvent>, StoreError>;
}

/// Measured content results
#[async_trait::async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert or replace by result id. Returns true when the id was new.
    async fn upsert_result(&self, result: &ContentResult) -> Result<bool, StoreError>;

    async fn results_for_pattern(
        &self,
        user_id: &str,
        key: &PatternKey,
    ) -> Result<Vec<ContentResult>, StoreError>;

    /// Every result for a user, oldest posting first
    async fn results_for_user(&self, user_id: &str) -> Result<Vec<ContentResult>, StoreError>;

    /// Results posted in `[from, to)`
    async fn results_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ContentResult>, StoreError>;
}

/// Versioned persona profiles
#[async_trait::async_trait]
pub trait PersonaStore: Send + Sync {
    async fn load_persona(&self, user_id: &str) -> Result<Option<Versioned<PersonaProfile>>, StoreError>;

    /// Write `profile` only if the stored version still equals
    /// `expected_version` (`None` = must not exist yet).
    async fn save_persona(
        &self,
        user_id: &str,
        expected_version: Option<u64>,
        profile: &PersonaProfile,
    ) -> Result<SaveOutcome, StoreError>;
}

/// Aggregated pattern statistics
#[async_trait::async_trait]
pub trait PatternStore: Send + Sync {
    async fn upsert_pattern(&self, stats: &PatternStats) -> Result<(), StoreError>;

    async fn get_pattern(&self, user_id: &str, key: &PatternKey) -> Result<Option<PatternStats>, StoreError>;

    async fn patterns_for_user(&self, user_id: &str) -> Result<Vec<PatternStats>, StoreError>;
}

/// Daily suggestion rows, unique per user × date × platform
#[async_trait::async_trait]
pub trait SuggestionStore: Send + Sync {
    async fn upsert_suggestion(&self, suggestion: &DailySuggestion) -> Result<(), StoreError>;

    async fn get_suggestion(
        &self,
        user_id: &str,
        date: NaiveDate,
        platform: Platform,
    ) -> Result<Option<DailySuggestion>, StoreError>;

    async fn suggestions_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<DailySuggestion>, StoreError>;
}

/// Weekly insights, unique per user × ISO week
#[async_trait::async_trait]
pub trait InsightStore: Send + Sync {
    async fn upsert_insight(&self, insight: &PerformanceInsight) -> Result<(), StoreError>;

    async fn get_insight(&self, user_id: &str, week_id: &str) -> Result<Option<PerformanceInsight>, StoreError>;

    /// Most recent week id with a stored insight
    async fn latest_insight_week(&self, user_id: &str) -> Result<Option<String>, StoreError>;
}

/// Every collaborator at once, for backends that implement them all
pub trait Store: EventLog + ResultStore + PersonaStore + PatternStore + SuggestionStore + InsightStore {}

impl<T> Store for T where T: EventLog + ResultStore + PersonaStore + PatternStore + SuggestionStore + InsightStore {}

/// Run an idempotent read, retrying backend failures with a short backoff.
///
/// Serialization and not-found errors are returned immediately.
pub async fn retry_read<T, F, Fut>(what: &str, mut op: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(StoreError::Backend(msg)) if attempt < READ_ATTEMPTS => {
                warn!("Read '{}' failed (attempt {}/{}): {}", what, attempt, READ_ATTEMPTS, msg);
                tokio::time::sleep(Duration::from_millis(READ_BACKOFF_MS * attempt as u64)).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}
