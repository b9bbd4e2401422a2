//! Persona learner
//!
//! Appends behavioral events and folds them (and measured outcomes) into the
//! stored profile. Every update is a pure fold applied with compare-and-swap
//! on the profile version; a lost race reloads and refolds.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::overlay::{build_overlay, Overlay};
use super::profile::{fold_event, fold_outcome, Outcome, PersonaProfile};
use crate::config::PersonaConfig;
use crate::error::{CoreError, CoreResult};
use crate::events::BehaviorEvent;
use crate::store::{retry_read, EventLog, PersonaStore, ResultStore, SaveOutcome, Versioned};

/// One step of a rebuild, in the order it happened
enum Replay<'a> {
    Event(&'a BehaviorEvent),
    Outcome(Outcome),
}

impl Replay<'_> {
    fn at(&self) -> DateTime<Utc> {
        match self {
            Replay::Event(event) => event.occurred_at,
            Replay::Outcome(outcome) => outcome.observed_at,
        }
    }
}

pub struct PersonaLearner {
    events: Arc<dyn EventLog>,
    results: Arc<dyn ResultStore>,
    personas: Arc<dyn PersonaStore>,
    config: PersonaConfig,
}

impl PersonaLearner {
    pub fn new(
        events: Arc<dyn EventLog>,
        results: Arc<dyn ResultStore>,
        personas: Arc<dyn PersonaStore>,
        config: PersonaConfig,
    ) -> Self {
        Self {
            events,
            results,
            personas,
            config,
        }
    }

    /// Append an event and fold it into the profile.
    ///
    /// Returns `None` when the event id was already in the log; the profile
    /// is not folded twice.
    pub async fn record_event(&self, event: &BehaviorEvent) -> CoreResult<Option<Versioned<PersonaProfile>>> {
        if !self.events.append_event(event).await? {
            debug!("Event {} already recorded for {}", event.id, event.user_id);
            return Ok(None);
        }
        let config = &self.config;
        let updated = self
            .update(&event.user_id, |profile| fold_event(profile, event, config))
            .await?;
        Ok(Some(updated))
    }

    /// Fold a measured outcome into the profile.
    ///
    /// Outcomes carrying a result id already in the profile are a no-op, so
    /// a caller may retry after a failed fold.
    pub async fn record_outcome(&self, user_id: &str, outcome: &Outcome) -> CoreResult<Versioned<PersonaProfile>> {
        let config = &self.config;
        self.update(user_id, |profile| fold_outcome(profile, outcome, config)).await
    }

    pub async fn profile(&self, user_id: &str) -> CoreResult<Option<Versioned<PersonaProfile>>> {
        Ok(retry_read("load_persona", move || self.personas.load_persona(user_id)).await?)
    }

    /// Overlay for the user. Never fails: storage errors fall back to the
    /// disabled overlay.
    pub async fn overlay(&self, user_id: &str, plan_entitled: bool) -> Overlay {
        if !plan_entitled {
            return Overlay::disabled();
        }
        match self.profile(user_id).await {
            Ok(profile) => build_overlay(profile.as_ref().map(|p| &p.value), plan_entitled),
            Err(e) => {
                warn!("Could not load persona for {}, using neutral overlay: {}", user_id, e);
                Overlay::disabled()
            }
        }
    }

    /// Rebuild the profile by replaying the event log and the stored
    /// results in the order they were observed
    pub async fn rebuild(&self, user_id: &str) -> CoreResult<Versioned<PersonaProfile>> {
        let events = retry_read("events_for_user", move || self.events.events_for_user(user_id)).await?;
        let results = retry_read("results_for_user", move || self.results.results_for_user(user_id)).await?;

        let mut replay: Vec<Replay<'_>> = events.iter().map(Replay::Event).collect();
        replay.extend(results.iter().map(|r| Replay::Outcome(Outcome::from_result(r))));
        // Stable: on equal timestamps events stay ahead of outcomes
        replay.sort_by_key(|step| step.at());

        let config = &self.config;
        let rebuilt = self
            .update(user_id, |current| {
                let mut fresh = PersonaProfile::new(user_id);
                fresh.created_at = current.created_at;
                replay.iter().fold(fresh, |profile, step| match step {
                    Replay::Event(event) => fold_event(&profile, event, config),
                    Replay::Outcome(outcome) => fold_outcome(&profile, outcome, config),
                })
            })
            .await?;
        info!(
            "Rebuilt persona for {} from {} events and {} results",
            user_id,
            events.len(),
            results.len()
        );
        Ok(rebuilt)
    }

    /// Compare-and-swap loop around a pure fold
    async fn update<F>(&self, user_id: &str, fold: F) -> CoreResult<Versioned<PersonaProfile>>
    where
        F: Fn(&PersonaProfile) -> PersonaProfile,
    {
        let attempts = self.config.max_update_attempts.max(1);
        for attempt in 1..=attempts {
            let current = self.profile(user_id).await?;
            let (expected, base) = match current {
                Some(stored) => (Some(stored.version), stored.value),
                None => (None, PersonaProfile::new(user_id)),
            };

            let next = fold(&base);
            if let (Some(version), true) = (expected, next == base) {
                return Ok(Versioned { version, value: next });
            }
            match self.personas.save_persona(user_id, expected, &next).await? {
                SaveOutcome::Saved { version } => {
                    return Ok(Versioned { version, value: next });
                }
                SaveOutcome::Conflict => {
                    debug!("Persona update for {} lost the race (attempt {}/{})", user_id, attempt, attempts);
                }
            }
        }

        warn!("Persona update for {} gave up after {} attempts", user_id, attempts);
        Err(CoreError::Conflict {
            user_id: user_id.to_string(),
            attempts,
        })
    }
}
