//! Persona overlay
//!
//! Compact bias object handed to the generation collaborator. Always valid:
//! when personalization is off or nothing has been learned yet, the overlay
//! is disabled and carries neutral defaults.

use serde::{Deserialize, Serialize};

use super::profile::PersonaProfile;
use crate::types::{CtaStyle, Format, Opening, Pacing, Tone};

pub const DEFAULT_TONE: Tone = Tone::Educational;
pub const DEFAULT_OPENING: Opening = Opening::Question;
pub const DEFAULT_FORMAT: Format = Format::Listicle;
pub const DEFAULT_CTA: CtaStyle = CtaStyle::Soft;
pub const DEFAULT_HOOK_LENGTH: u32 = 12;
pub const DEFAULT_PACING: Pacing = Pacing::Medium;

/// Bias hints derived from a persona profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    pub enabled: bool,
    pub tone: Tone,
    pub opening: Opening,
    pub format: Format,
    pub cta_style: CtaStyle,
    /// Target hook length in words
    pub hook_length: u32,
    pub pacing: Pacing,
    /// Weight of the dominant tone (0-1); scales how hard to bias
    pub tone_strength: f64,
}

impl Overlay {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            tone: DEFAULT_TONE,
            opening: DEFAULT_OPENING,
            format: DEFAULT_FORMAT,
            cta_style: DEFAULT_CTA,
            hook_length: DEFAULT_HOOK_LENGTH,
            pacing: DEFAULT_PACING,
            tone_strength: 0.0,
        }
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Project a profile into an overlay.
///
/// Dominant values are the argmax of each weight map. Ties go to the value
/// declared first in the enum; that order is arbitrary but stable.
pub fn build_overlay(profile: Option<&PersonaProfile>, plan_entitled: bool) -> Overlay {
    let profile = match profile {
        Some(profile) if plan_entitled => profile,
        _ => return Overlay::disabled(),
    };

    let (tone, tone_strength) = profile.tone_weights.dominant();
    let (opening, _) = profile.opening_bias.dominant();
    let (format, _) = profile.format_bias.dominant();
    let hook_length = if profile.hook_length_samples > 0 && profile.avg_hook_length.is_finite() {
        profile.avg_hook_length.round().max(1.0) as u32
    } else {
        DEFAULT_HOOK_LENGTH
    };

    Overlay {
        enabled: true,
        tone,
        opening,
        format,
        cta_style: profile.cta_style,
        hook_length,
        pacing: profile.pacing,
        tone_strength: tone_strength.clamp(0.0, 1.0),
    }
}
