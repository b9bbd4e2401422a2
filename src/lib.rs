//! Creator Persona - personalization core for a content-creation assistant
//!
//! Learns a per-creator persona from behavior and measured outcomes, and
//! turns it into:
//! - a persona overlay that biases text generation
//! - confidence-weighted pattern rankings
//! - daily content suggestions mixing proven patterns with exploration
//! - weekly performance insights with recommendations
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use creator_persona::{Config, MemoryStore, Personalizer, StaticEntitlements, TemplateGenerator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = Personalizer::new(
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(TemplateGenerator::new()),
//!         Arc::new(StaticEntitlements::default()),
//!         &Config::default(),
//!     );
//!     println!("{:?}", service.overlay("creator-1").await);
//!     Ok(())
//! }
//! ```

// Core modules (order matters for cross-module dependencies)
pub mod types;
pub mod error;
pub mod config;
pub mod events;
pub mod results;
pub mod store;
pub mod patterns;
pub mod persona;
pub mod generation;
pub mod entitlements;

// Feature modules
pub mod suggestions;
pub mod insights;
pub mod service;
pub mod cli;

// Re-export commonly used types for convenience
pub use types::{ActionType, Category, CtaStyle, Format, Goal, Opening, Pacing, Platform, Slug, Tone, WeightMap};

pub use error::{CoreError, CoreResult, GenerationError, StoreError};

pub use config::Config;

pub use events::BehaviorEvent;
pub use results::ContentResult;

pub use store::{MemoryStore, SqliteStore, Store, Versioned};

pub use patterns::{PatternEngine, PatternKey, PatternStats, PromptParams};

pub use persona::{Overlay, PersonaLearner, PersonaProfile};

pub use generation::{ContentGenerator, GenerationRequest, TemplateGenerator};

pub use entitlements::{Entitlements, StaticEntitlements};

pub use suggestions::{DailyBatch, DailyRequest, DailySuggestion, SeededRandom, SuggestionGenerator, SuggestionIdea};

pub use insights::{InsightsAggregator, PerformanceInsight, WeekPeriod};

pub use service::Personalizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
