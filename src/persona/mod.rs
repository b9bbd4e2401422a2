//! Persona learning
//!
//! This module provides:
//! - The per-user persona profile and its pure fold functions
//! - The overlay projection consumed by content generation
//! - The learner that applies folds atomically through the persona store

pub mod profile;
pub mod overlay;
pub mod learner;

pub use profile::{PersonaProfile, Outcome, OutcomeTally, fold_event, fold_outcome};
pub use overlay::{Overlay, build_overlay};
pub use learner::PersonaLearner;
