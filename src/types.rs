//! Shared types used across modules
//!
//! Closed enums for every stylistic dimension, the validated category slug,
//! and the normalized weight map that persona profiles are built from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use crate::error::CoreError;

/// A small, closed set of values with a stable text form.
///
/// `ALL` fixes iteration order, which is also the tie-break order for
/// weight lookups.
pub trait Category: Copy + Eq + Ord + Hash + fmt::Debug + Send + Sync + 'static {
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;

    fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

macro_rules! category_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl Category for $name {
            const ALL: &'static [Self] = &[$($name::$variant),+];

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                <$name as Category>::parse(s).ok_or_else(|| CoreError::InvalidRequest(format!(
                    "unknown {} '{}'",
                    stringify!($name).to_lowercase(),
                    s
                )))
            }
        }
    };
}

category_enum! {
    /// Publishing platform
    Platform {
        TikTok => "tiktok",
        Instagram => "instagram",
        YouTube => "youtube",
        LinkedIn => "linkedin",
        X => "x",
    }
}

category_enum! {
    /// Voice of the content
    Tone {
        Educational => "educational",
        Funny => "funny",
        Inspirational => "inspirational",
        Serious => "serious",
        Casual => "casual",
    }
}

category_enum! {
    /// How the hook opens
    Opening {
        Question => "question",
        BoldClaim => "bold_claim",
        Statistic => "statistic",
        Story => "story",
        Problem => "problem",
    }
}

category_enum! {
    /// Content format
    Format {
        Listicle => "listicle",
        Tutorial => "tutorial",
        Storytime => "storytime",
        BehindTheScenes => "behind_the_scenes",
        Comparison => "comparison",
    }
}

category_enum! {
    /// Call-to-action style
    CtaStyle {
        Soft => "soft",
        Direct => "direct",
        Engagement => "engagement",
        NoCta => "none",
    }
}

category_enum! {
    /// Delivery pacing
    Pacing {
        Slow => "slow",
        Medium => "medium",
        Fast => "fast",
    }
}

category_enum! {
    /// What the content is trying to achieve
    Goal {
        Views => "views",
        Engagement => "engagement",
        Followers => "followers",
        Sales => "sales",
        Awareness => "awareness",
    }
}

category_enum! {
    /// Behavioral action recorded in the event log
    ActionType {
        Generation => "generation",
        Save => "save",
        Export => "export",
        AbWin => "ab_win",
        Onboarding => "onboarding",
    }
}

/// Lowercase identifier used for category group / category slug.
///
/// Restricted to `[a-z0-9_-]` and never equal to the "any" wildcard, so
/// pattern keys built from slugs cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

impl Slug {
    pub fn new(raw: &str) -> Result<Self, CoreError> {
        let value = raw.trim().to_lowercase();
        let valid = !value.is_empty()
            && value != crate::patterns::ANY
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if valid {
            Ok(Self(value))
        } else {
            Err(CoreError::InvalidSlug(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Slug {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Slug::new(&value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tolerance used when checking that a weight map sums to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Non-negative weights over every value of `C`, kept summing to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
#[serde(bound(
    serialize = "C: Serialize",
    deserialize = "C: Deserialize<'de>"
))]
pub struct WeightMap<C: Category> {
    weights: BTreeMap<C, f64>,
}

impl<C: Category> WeightMap<C> {
    /// 1/n for each of the n values
    pub fn uniform() -> Self {
        let share = 1.0 / C::ALL.len() as f64;
        Self {
            weights: C::ALL.iter().map(|c| (*c, share)).collect(),
        }
    }

    pub fn weight(&self, category: C) -> f64 {
        self.weights.get(&category).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        C::ALL.iter().map(|c| self.weight(*c)).sum()
    }

    /// Add `step` to one category, then renormalize the whole map.
    pub fn nudge(&mut self, category: C, step: f64) {
        if !step.is_finite() || step <= 0.0 {
            return;
        }
        *self.weights.entry(category).or_insert(0.0) += step;
        self.renormalize();
    }

    /// Rescale to sum 1.0.
    ///
    /// Missing, negative or non-finite entries are repaired first; a map with
    /// no usable mass is reset to uniform. Repairs are invariant violations:
    /// loud in debug builds, logged and clamped otherwise.
    pub fn renormalize(&mut self) {
        let mut repaired = false;
        for category in C::ALL {
            let entry = self.weights.entry(*category).or_insert_with(|| {
                repaired = true;
                0.0
            });
            if !entry.is_finite() || *entry < 0.0 {
                *entry = 0.0;
                repaired = true;
            }
        }

        let total = self.sum();
        if total <= f64::EPSILON {
            tracing::warn!("Weight map had no usable mass, resetting to uniform");
            debug_assert!(false, "weight map collapsed to zero");
            *self = Self::uniform();
            return;
        }
        if repaired {
            tracing::warn!("Repaired invalid entries in weight map before renormalizing");
            debug_assert!(false, "weight map contained invalid entries");
        }
        for value in self.weights.values_mut() {
            *value /= total;
        }
    }

    /// Argmax over the map, ties resolved by `C::ALL` order (first wins).
    pub fn dominant(&self) -> (C, f64) {
        let mut best = (C::ALL[0], self.weight(C::ALL[0]));
        for category in C::ALL.iter().skip(1) {
            let weight = self.weight(*category);
            if weight > best.1 {
                best = (*category, weight);
            }
        }
        best
    }

    /// True when no category stands out from the others.
    pub fn is_flat(&self) -> bool {
        let first = self.weight(C::ALL[0]);
        C::ALL
            .iter()
            .all(|c| (self.weight(*c) - first).abs() < WEIGHT_SUM_TOLERANCE)
    }

    pub fn iter(&self) -> impl Iterator<Item = (C, f64)> + '_ {
        C::ALL.iter().map(move |c| (*c, self.weight(*c)))
    }
}

impl<C: Category> Default for WeightMap<C> {
    fn default() -> Self {
        Self::uniform()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sums_to_one() {
        let map = WeightMap::<Tone>::uniform();
        assert!((map.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((map.weight(Tone::Funny) - 0.2).abs() < WEIGHT_SUM_TOLERANCE);
        assert!(map.is_flat());
    }

    #[test]
    fn test_nudge_raises_target_and_keeps_sum() {
        let mut map = WeightMap::<Format>::uniform();
        map.nudge(Format::Tutorial, 0.05);
        assert!(map.weight(Format::Tutorial) > 0.2);
        assert!(map.weight(Format::Listicle) < 0.2);
        assert!((map.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert_eq!(map.dominant().0, Format::Tutorial);
    }

    #[test]
    fn test_dominant_tie_breaks_on_enum_order() {
        let map = WeightMap::<Opening>::uniform();
        assert_eq!(map.dominant().0, Opening::Question);
    }

    #[test]
    fn test_category_parse_and_display() {
        assert_eq!(Tone::parse("Funny"), Some(Tone::Funny));
        assert_eq!("bold_claim".parse::<Opening>().unwrap(), Opening::BoldClaim);
        assert_eq!(Platform::TikTok.to_string(), "tiktok");
        assert_eq!(CtaStyle::NoCta.as_str(), "none");
        assert!("sarcastic".parse::<Tone>().is_err());
    }

    #[test]
    fn test_serde_uses_text_form() {
        let json = serde_json::to_string(&Format::BehindTheScenes).unwrap();
        assert_eq!(json, "\"behind_the_scenes\"");
        let map: WeightMap<Tone> =
            serde_json::from_str(&serde_json::to_string(&WeightMap::<Tone>::uniform()).unwrap())
                .unwrap();
        assert!((map.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_slug_validation() {
        assert_eq!(Slug::new("Lifestyle").unwrap().as_str(), "lifestyle");
        assert!(Slug::new("food-and-drink").is_ok());
        assert!(Slug::new("any").is_err());
        assert!(Slug::new("a/b").is_err());
        assert!(Slug::new("").is_err());
    }
}
