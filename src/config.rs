//! Configuration management
//!
//! Tunable learning constants, suggestion and insight thresholds, default
//! entitlements and the storage location. Loaded from `config.toml` in the
//! platform config directory; every field falls back to a serde default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Persona learning steps
    #[serde(default)]
    pub persona: PersonaConfig,
    /// Pattern scoring
    #[serde(default)]
    pub patterns: PatternConfig,
    /// Daily suggestion batches
    #[serde(default)]
    pub suggestions: SuggestionConfig,
    /// Weekly insights
    #[serde(default)]
    pub insights: InsightConfig,
    /// Plan defaults used by the bundled entitlement provider
    #[serde(default)]
    pub entitlements: EntitlementConfig,
    /// Storage location
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Nudge sizes for each behavioral signal.
///
/// These are empirically chosen; only their relative order (stronger
/// signals move weights further) is meaningful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaConfig {
    #[serde(default = "default_generation_step")]
    pub generation_step: f64,
    #[serde(default = "default_save_step")]
    pub save_step: f64,
    #[serde(default = "default_export_step")]
    pub export_step: f64,
    #[serde(default = "default_ab_win_step")]
    pub ab_win_step: f64,
    #[serde(default = "default_onboarding_step")]
    pub onboarding_step: f64,
    /// Applied when a measured outcome beats the user's running average
    #[serde(default = "default_outcome_step")]
    pub outcome_step: f64,
    /// Outcome-linked samples required before best performers are reported
    #[serde(default = "default_min_outcomes")]
    pub min_outcomes_for_best: u32,
    /// Optimistic update retries before giving up with a conflict
    #[serde(default = "default_max_update_attempts")]
    pub max_update_attempts: u32,
}

fn default_generation_step() -> f64 {
    0.05
}

fn default_save_step() -> f64 {
    0.10
}

fn default_export_step() -> f64 {
    0.12
}

fn default_ab_win_step() -> f64 {
    0.15
}

fn default_onboarding_step() -> f64 {
    0.20
}

fn default_outcome_step() -> f64 {
    0.08
}

fn default_min_outcomes() -> u32 {
    3
}

fn default_max_update_attempts() -> u32 {
    5
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            generation_step: default_generation_step(),
            save_step: default_save_step(),
            export_step: default_export_step(),
            ab_win_step: default_ab_win_step(),
            onboarding_step: default_onboarding_step(),
            outcome_step: default_outcome_step(),
            min_outcomes_for_best: default_min_outcomes(),
            max_update_attempts: default_max_update_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    /// Sample count at which a pattern's score stops being shrunk (K)
    #[serde(default = "default_confidence_samples")]
    pub confidence_samples: f64,
    /// Maximum characters kept for the best-performing preview
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
}

fn default_confidence_samples() -> f64 {
    5.0
}

fn default_preview_chars() -> usize {
    120
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            confidence_samples: default_confidence_samples(),
            preview_chars: default_preview_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionConfig {
    #[serde(default = "default_explore_ratio")]
    pub explore_ratio: f64,
    /// Confidence reported for exploration ideas
    #[serde(default = "default_exploration_confidence")]
    pub exploration_confidence: u8,
    /// Multiplier from weighted score to a 0-100 confidence.
    /// Assumes weighted scores roughly in 0-10.
    #[serde(default = "default_confidence_scale")]
    pub confidence_scale: f64,
    /// Upper bound on one hook-idea generation call
    #[serde(default = "default_generation_timeout")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_explore_ratio() -> f64 {
    0.3
}

fn default_exploration_confidence() -> u8 {
    50
}

fn default_confidence_scale() -> f64 {
    10.0
}

fn default_generation_timeout() -> u64 {
    crate::generation::GENERATION_TIMEOUT.as_secs()
}

fn default_locale() -> String {
    "en".to_string()
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            explore_ratio: default_explore_ratio(),
            exploration_confidence: default_exploration_confidence(),
            confidence_scale: default_confidence_scale(),
            generation_timeout_secs: default_generation_timeout(),
            locale: default_locale(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightConfig {
    /// Results required in a week before an insight is produced
    #[serde(default = "default_min_results")]
    pub min_results: usize,
    #[serde(default = "default_max_recommendations")]
    pub max_recommendations: usize,
    /// Samples a best format/tone needs before it is recommended
    #[serde(default = "default_min_best_samples")]
    pub min_best_samples: usize,
    /// Week-over-week percentage swing treated as significant
    #[serde(default = "default_significant_change")]
    pub significant_change_pct: f64,
}

fn default_min_results() -> usize {
    3
}

fn default_max_recommendations() -> usize {
    5
}

fn default_min_best_samples() -> usize {
    2
}

fn default_significant_change() -> f64 {
    10.0
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            min_results: default_min_results(),
            max_recommendations: default_max_recommendations(),
            min_best_samples: default_min_best_samples(),
            significant_change_pct: default_significant_change(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementConfig {
    #[serde(default = "default_true")]
    pub personalization: bool,
    #[serde(default = "default_daily_limit")]
    pub daily_suggestion_limit: u32,
}

fn default_true() -> bool {
    true
}

fn default_daily_limit() -> u32 {
    5
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            personalization: default_true(),
            daily_suggestion_limit: default_daily_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; defaults to `<data dir>/persona.db`
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolve_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("persona.db")),
        }
    }
}

impl Config {
    /// Load configuration from the default location, writing defaults if missing
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "creator-persona", "creator-persona")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "creator-persona", "creator-persona")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}

/// Get default configuration as TOML string
pub fn default_config_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).unwrap_or_else(|_| "# Default configuration\n".to_string())
}
