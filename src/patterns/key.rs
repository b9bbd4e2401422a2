//! Pattern keys
//!
//! A pattern is platform + category group + category slug + tone + goal.
//! Unset dimensions collapse to `any`. Every component is either a closed
//! enum value or a validated slug, neither of which can contain the
//! delimiter or equal the wildcard, so the text form is collision-free and
//! parses back to the same key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::{Category, Format, Goal, Opening, Platform, Slug, Tone};

/// Wildcard for an unset dimension
pub const ANY: &str = "any";

/// Separator between key components
pub const KEY_DELIMITER: char = '/';

/// Unit of performance aggregation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PatternKey {
    pub platform: Platform,
    pub category_group: Option<Slug>,
    pub category_slug: Option<Slug>,
    pub tone: Option<Tone>,
    pub goal: Option<Goal>,
}

impl PatternKey {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            category_group: None,
            category_slug: None,
            tone: None,
            goal: None,
        }
    }

    pub fn with_category(mut self, group: Option<Slug>, slug: Option<Slug>) -> Self {
        self.category_group = group;
        self.category_slug = slug;
        self
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goal = Some(goal);
        self
    }
}

fn component<T: fmt::Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| ANY.to_string())
}

impl fmt::Display for PatternKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}{d}{}{d}{}",
            self.platform,
            component(&self.category_group),
            component(&self.category_slug),
            component(&self.tone),
            component(&self.goal),
            d = KEY_DELIMITER
        )
    }
}

fn parse_optional<T>(
    raw: &str,
    parse: impl Fn(&str) -> Option<T>,
    whole: &str,
) -> Result<Option<T>, CoreError> {
    if raw == ANY {
        return Ok(None);
    }
    parse(raw)
        .map(Some)
        .ok_or_else(|| CoreError::InvalidPatternKey(whole.to_string()))
}

impl FromStr for PatternKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(KEY_DELIMITER).collect();
        if parts.len() != 5 {
            return Err(CoreError::InvalidPatternKey(s.to_string()));
        }

        let platform = Platform::parse(parts[0])
            .ok_or_else(|| CoreError::InvalidPatternKey(s.to_string()))?;
        let slug = |raw: &str| Slug::new(raw).ok().filter(|slug| slug.as_str() == raw);

        Ok(Self {
            platform,
            category_group: parse_optional(parts[1], slug, s)?,
            category_slug: parse_optional(parts[2], slug, s)?,
            tone: parse_optional(parts[3], |raw| Tone::parse(raw).filter(|t| t.as_str() == raw), s)?,
            goal: parse_optional(parts[4], |raw| Goal::parse(raw).filter(|g| g.as_str() == raw), s)?,
        })
    }
}

impl TryFrom<String> for PatternKey {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PatternKey> for String {
    fn from(key: PatternKey) -> Self {
        key.to_string()
    }
}

/// Parameters a generation was requested with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptParams {
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_group: Option<Slug>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_slug: Option<Slug>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<Tone>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening: Option<Opening>,
}

impl PromptParams {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            category_group: None,
            category_slug: None,
            tone: None,
            goal: None,
            format: None,
            opening: None,
        }
    }

    /// Set category group and slug from raw text
    pub fn with_category(mut self, group: &str, slug: &str) -> Result<Self, CoreError> {
        self.category_group = Some(Slug::new(group)?);
        self.category_slug = Some(Slug::new(slug)?);
        Ok(self)
    }

    pub fn with_tone(mut self, tone: Tone) -> Self {
        self.tone = Some(tone);
        self
    }

    pub fn with_goal(mut self, goal: Goal) -> Self {
        self.goal = Some(goal);
        self
    }

    pub fn with_format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_opening(mut self, opening: Opening) -> Self {
        self.opening = Some(opening);
        self
    }

    pub fn pattern_key(&self) -> PatternKey {
        PatternKey {
            platform: self.platform,
            category_group: self.category_group.clone(),
            category_slug: self.category_slug.clone(),
            tone: self.tone,
            goal: self.goal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_text_form() {
        let key = PromptParams::new(Platform::TikTok)
            .with_category("creator", "lifestyle")
            .unwrap()
            .with_tone(Tone::Funny)
            .with_goal(Goal::Views)
            .pattern_key();
        assert_eq!(key.to_string(), "tiktok/creator/lifestyle/funny/views");
    }

    #[test]
    fn test_unset_dimensions_collapse_to_any() {
        let key = PatternKey::new(Platform::Instagram).with_tone(Tone::Serious);
        assert_eq!(key.to_string(), "instagram/any/any/serious/any");
    }

    #[test]
    fn test_parse_roundtrip() {
        for text in [
            "tiktok/creator/lifestyle/funny/views",
            "youtube/any/any/any/any",
            "x/business/saas-tools/educational/sales",
        ] {
            let key: PatternKey = text.parse().unwrap();
            assert_eq!(key.to_string(), text);
        }
    }

    #[test]
    fn test_parse_rejects_outside_enum_space() {
        assert!("myspace/any/any/any/any".parse::<PatternKey>().is_err());
        assert!("any/any/any/any/any".parse::<PatternKey>().is_err());
        assert!("tiktok/any/any/sarcastic/any".parse::<PatternKey>().is_err());
        assert!("tiktok/any/any/any".parse::<PatternKey>().is_err());
        assert!("tiktok/Creator/any/any/any".parse::<PatternKey>().is_err());
    }

    #[test]
    fn test_distinct_keys_have_distinct_text() {
        let a = PatternKey::new(Platform::TikTok).with_tone(Tone::Funny);
        let b = PatternKey::new(Platform::TikTok).with_goal(Goal::Views);
        assert_ne!(a.to_string(), b.to_string());
    }
}
