//! SQLite-backed persistent store
//!
//! Records are kept as JSON documents next to the columns needed for keys,
//! filtering and ordering. Upsert keys match the uniqueness rules of each
//! record type.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

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
use crate::types::{Category, Platform};

/// SQLite store implementing every storage collaborator
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create data directory {:?}", parent))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init_schema(&conn)?;
        debug!("Opened persona database at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(r#"
            -- Behavioral events, append-only
            CREATE TABLE IF NOT EXISTS events (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                action TEXT NOT NULL,
                occurred_at TEXT NOT NULL,
                data TEXT NOT NULL
            );

            -- Content results, upserted by durable id
            CREATE TABLE IF NOT EXISTS results (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                pattern_key TEXT NOT NULL,
                posted_at_ms INTEGER NOT NULL,
                data TEXT NOT NULL
            );

            -- Versioned persona profiles
            CREATE TABLE IF NOT EXISTS personas (
                user_id TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS patterns (
                user_id TEXT NOT NULL,
                pattern_key TEXT NOT NULL,
                weighted_score REAL NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (user_id, pattern_key)
            );

            CREATE TABLE IF NOT EXISTS suggestions (
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                platform TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (user_id, date, platform)
            );

            CREATE TABLE IF NOT EXISTS insights (
                user_id TEXT NOT NULL,
                week_id TEXT NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (user_id, week_id)
            );

            CREATE INDEX IF NOT EXISTS idx_events_user ON events(user_id);
            CREATE INDEX IF NOT EXISTS idx_results_pattern ON results(user_id, pattern_key);
            CREATE INDEX IF NOT EXISTS idx_results_posted ON results(user_id, posted_at_ms);
        "#)?;

        Ok(())
    }
}

fn decode<T: DeserializeOwned>(data: &str) -> Result<T, StoreError> {
    Ok(serde_json::from_str(data)?)
}

fn decode_all<T: DeserializeOwned>(rows: Vec<String>) -> Result<Vec<T>, StoreError> {
    rows.iter().map(|data| decode(data)).collect()
}

#[async_trait::async_trait]
impl EventLog for SqliteStore {
    async fn append_event(&self, event: &BehaviorEvent) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let data = serde_json::to_string(event)?;
        let inserted = conn.execute(
            r#"INSERT OR IGNORE INTO events (id, user_id, action, occurred_at, data)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
            params![
                event.id,
                event.user_id,
                event.action.as_str(),
                event.occurred_at.to_rfc3339(),
                data,
            ],
        )?;
        Ok(inserted == 1)
    }

    async fn events_for_user(&self, user_id: &str) -> Result<Vec<BehaviorEvent>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached("SELECT data FROM events WHERE user_id = ?1 ORDER BY rowid")?;
        let rows = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode_all(rows)
    }
}

#[async_trait::async_trait]
impl ResultStore for SqliteStore {
    async fn upsert_result(&self, result: &ContentResult) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let existed: Option<i64> = conn
            .query_row("SELECT 1 FROM results WHERE id = ?1", params![result.id], |row| row.get(0))
            .optional()?;
        let data = serde_json::to_string(result)?;
        conn.execute(
            r#"INSERT INTO results (id, user_id, pattern_key, posted_at_ms, data)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(id) DO UPDATE SET
                   user_id = excluded.user_id,
                   pattern_key = excluded.pattern_key,
                   posted_at_ms = excluded.posted_at_ms,
                   data = excluded.data"#,
            params![
                result.id,
                result.user_id,
                result.pattern_key().to_string(),
                result.posted_at.timestamp_millis(),
                data,
            ],
        )?;
        Ok(existed.is_none())
    }

    async fn results_for_pattern(&self, user_id: &str, key: &PatternKey) -> Result<Vec<ContentResult>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT data FROM results WHERE user_id = ?1 AND pattern_key = ?2 ORDER BY posted_at_ms, id",
        )?;
        let rows = stmt
            .query_map(params![user_id, key.to_string()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode_all(rows)
    }

    async fn results_for_user(&self, user_id: &str) -> Result<Vec<ContentResult>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare_cached("SELECT data FROM results WHERE user_id = ?1 ORDER BY posted_at_ms, id")?;
        let rows = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode_all(rows)
    }

    async fn results_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ContentResult>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            r#"SELECT data FROM results
               WHERE user_id = ?1 AND posted_at_ms >= ?2 AND posted_at_ms < ?3
               ORDER BY posted_at_ms, id"#,
        )?;
        let rows = stmt
            .query_map(params![user_id, from.timestamp_millis(), to.timestamp_millis()], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        decode_all(rows)
    }
}

#[async_trait::async_trait]
impl PersonaStore for SqliteStore {
    async fn load_persona(&self, user_id: &str) -> Result<Option<Versioned<PersonaProfile>>, StoreError> {
        let conn = self.conn.lock().await;
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT version, data FROM personas WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((version, data)) => Ok(Some(Versioned {
                version: version as u64,
                value: decode(&data)?,
            })),
            None => Ok(None),
        }
    }

    async fn save_persona(
        &self,
        user_id: &str,
        expected_version: Option<u64>,
        profile: &PersonaProfile,
    ) -> Result<SaveOutcome, StoreError> {
        let conn = self.conn.lock().await;
        let data = serde_json::to_string(profile)?;
        let now = Utc::now().to_rfc3339();

        let (changed, version) = match expected_version {
            None => {
                let changed = conn.execute(
                    r#"INSERT OR IGNORE INTO personas (user_id, version, data, updated_at)
                       VALUES (?1, 1, ?2, ?3)"#,
                    params![user_id, data, now],
                )?;
                (changed, 1)
            }
            Some(expected) => {
                let next = expected + 1;
                let changed = conn.execute(
                    r#"UPDATE personas SET version = ?1, data = ?2, updated_at = ?3
                       WHERE user_id = ?4 AND version = ?5"#,
                    params![next as i64, data, now, user_id, expected as i64],
                )?;
                (changed, next)
            }
        };

        if changed == 1 {
            Ok(SaveOutcome::Saved { version })
        } else {
            Ok(SaveOutcome::Conflict)
        }
    }
}

#[async_trait::async_trait]
impl PatternStore for SqliteStore {
    async fn upsert_pattern(&self, stats: &PatternStats) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let data = serde_json::to_string(stats)?;
        conn.execute(
            r#"INSERT INTO patterns (user_id, pattern_key, weighted_score, data)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(user_id, pattern_key) DO UPDATE SET
                   weighted_score = excluded.weighted_score,
                   data = excluded.data"#,
            params![stats.user_id, stats.pattern_key.to_string(), stats.weighted_score, data],
        )?;
        Ok(())
    }

    async fn get_pattern(&self, user_id: &str, key: &PatternKey) -> Result<Option<PatternStats>, StoreError> {
        let conn = self.conn.lock().await;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM patterns WHERE user_id = ?1 AND pattern_key = ?2",
                params![user_id, key.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| decode(&d)).transpose()
    }

    async fn patterns_for_user(&self, user_id: &str) -> Result<Vec<PatternStats>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT data FROM patterns WHERE user_id = ?1 ORDER BY weighted_score DESC, pattern_key",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode_all(rows)
    }
}

#[async_trait::async_trait]
impl SuggestionStore for SqliteStore {
    async fn upsert_suggestion(&self, suggestion: &DailySuggestion) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let data = serde_json::to_string(suggestion)?;
        conn.execute(
            r#"INSERT INTO suggestions (user_id, date, platform, data)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(user_id, date, platform) DO UPDATE SET data = excluded.data"#,
            params![
                suggestion.user_id,
                suggestion.date.to_string(),
                suggestion.platform.as_str(),
                data,
            ],
        )?;
        Ok(())
    }

    async fn get_suggestion(
        &self,
        user_id: &str,
        date: NaiveDate,
        platform: Platform,
    ) -> Result<Option<DailySuggestion>, StoreError> {
        let conn = self.conn.lock().await;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM suggestions WHERE user_id = ?1 AND date = ?2 AND platform = ?3",
                params![user_id, date.to_string(), platform.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| decode(&d)).transpose()
    }

    async fn suggestions_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<DailySuggestion>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT data FROM suggestions WHERE user_id = ?1 AND date = ?2 ORDER BY platform",
        )?;
        let rows = stmt
            .query_map(params![user_id, date.to_string()], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        decode_all(rows)
    }
}

#[async_trait::async_trait]
impl InsightStore for SqliteStore {
    async fn upsert_insight(&self, insight: &PerformanceInsight) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        let data = serde_json::to_string(insight)?;
        conn.execute(
            r#"INSERT INTO insights (user_id, week_id, data)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(user_id, week_id) DO UPDATE SET data = excluded.data"#,
            params![insight.user_id, insight.week_id, data],
        )?;
        Ok(())
    }

    async fn get_insight(&self, user_id: &str, week_id: &str) -> Result<Option<PerformanceInsight>, StoreError> {
        let conn = self.conn.lock().await;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM insights WHERE user_id = ?1 AND week_id = ?2",
                params![user_id, week_id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|d| decode(&d)).transpose()
    }

    async fn latest_insight_week(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn.lock().await;
        let week: Option<String> = conn.query_row(
            "SELECT MAX(week_id) FROM insights WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(week)
    }
}
