//! Plan entitlements
//!
//! Answers two questions before anything is generated: may this user get
//! personalized output, and how many suggestions per day are they allowed.

use std::collections::HashMap;

use crate::config::EntitlementConfig;
use crate::error::{CoreError, CoreResult};

/// Entitlement collaborator
#[async_trait::async_trait]
pub trait Entitlements: Send + Sync {
    async fn personalization_enabled(&self, user_id: &str) -> bool;

    async fn daily_suggestion_limit(&self, user_id: &str) -> u32;
}

/// Refuse requests that break the user's daily limit.
///
/// `requested` is the size of this request on its own; `already` ideas are
/// stored for the day and `adding` would be newly generated.
pub async fn check_daily_limit(
    entitlements: &dyn Entitlements,
    user_id: &str,
    requested: usize,
    already: usize,
    adding: usize,
) -> CoreResult<u32> {
    let allowed = entitlements.daily_suggestion_limit(user_id).await;
    if requested > allowed as usize || already + adding > allowed as usize {
        return Err(CoreError::LimitExceeded {
            requested,
            already,
            allowed,
        });
    }
    Ok(allowed)
}

/// Config-driven entitlements with optional per-user overrides
#[derive(Debug, Clone)]
pub struct StaticEntitlements {
    personalization: bool,
    daily_limit: u32,
    overrides: HashMap<String, (bool, u32)>,
}

impl StaticEntitlements {
    pub fn new(personalization: bool, daily_limit: u32) -> Self {
        Self {
            personalization,
            daily_limit,
            overrides: HashMap::new(),
        }
    }

    pub fn from_config(config: &EntitlementConfig) -> Self {
        Self::new(config.personalization, config.daily_suggestion_limit)
    }

    /// Give one user a different plan
    pub fn with_user(mut self, user_id: &str, personalization: bool, daily_limit: u32) -> Self {
        self.overrides
            .insert(user_id.to_string(), (personalization, daily_limit));
        self
    }
}

impl Default for StaticEntitlements {
    fn default() -> Self {
        Self::from_config(&EntitlementConfig::default())
    }
}

#[async_trait::async_trait]
impl Entitlements for StaticEntitlements {
    async fn personalization_enabled(&self, user_id: &str) -> bool {
        self.overrides
            .get(user_id)
            .map(|(enabled, _)| *enabled)
            .unwrap_or(self.personalization)
    }

    async fn daily_suggestion_limit(&self, user_id: &str) -> u32 {
        self.overrides
            .get(user_id)
            .map(|(_, limit)| *limit)
            .unwrap_or(self.daily_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_limit_refuses_instead_of_capping() {
        let plan = StaticEntitlements::new(true, 5);
        assert_eq!(check_daily_limit(&plan, "u1", 5, 0, 5).await.unwrap(), 5);
        let err = check_daily_limit(&plan, "u1", 6, 0, 6).await.unwrap_err();
        assert!(matches!(err, CoreError::LimitExceeded { requested: 6, allowed: 5, .. }));
    }

    #[tokio::test]
    async fn test_limit_counts_ideas_already_issued() {
        let plan = StaticEntitlements::new(true, 5);
        assert!(check_daily_limit(&plan, "u1", 2, 3, 2).await.is_ok());
        let err = check_daily_limit(&plan, "u1", 3, 3, 3).await.unwrap_err();
        assert!(matches!(err, CoreError::LimitExceeded { requested: 3, already: 3, allowed: 5 }));
    }

    #[tokio::test]
    async fn test_per_user_override() {
        let plan = StaticEntitlements::new(false, 3).with_user("pro", true, 20);
        assert!(plan.personalization_enabled("pro").await);
        assert_eq!(plan.daily_suggestion_limit("pro").await, 20);
        assert!(!plan.personalization_enabled("free").await);
        assert_eq!(plan.daily_suggestion_limit("free").await, 3);
    }

    #[test]
    fn test_defaults_follow_config() {
        let plan = StaticEntitlements::default();
        let defaults = EntitlementConfig::default();
        assert_eq!(
            tokio_test::block_on(plan.daily_suggestion_limit("anyone")),
            defaults.daily_suggestion_limit
        );
        assert_eq!(
            tokio_test::block_on(plan.personalization_enabled("anyone")),
            defaults.personalization
        );
    }
}
