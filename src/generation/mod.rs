//! Text generation collaborator
//!
//! The core never talks to a language model directly. It hands a
//! structured request (purpose, platform, tone, pattern context, persona
//! overlay, locale) to a `ContentGenerator` and gets a short string back.
//! Failures stay inside this boundary as `GenerationError`.

pub mod template;

pub use template::TemplateGenerator;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::error::GenerationError;
use crate::patterns::PatternKey;
use crate::persona::Overlay;
use crate::types::{Format, Platform, Tone};

/// Upper bound on a single generation call
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Longest text accepted from a generator, in characters
pub const MAX_OUTPUT_CHARS: usize = 600;

/// What the text is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    /// One-line hook idea for a daily suggestion
    HookIdea,
    /// Summary paragraph for a weekly insight
    WeeklySummary,
}

/// Structured request handed to the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub purpose: Purpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    pub tone: Tone,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PatternKey>,
    pub overlay: Overlay,
    pub locale: String,
    /// Free-form facts for the generator to work from
    #[serde(default)]
    pub context: String,
}

impl GenerationRequest {
    pub fn hook_idea(platform: Platform, tone: Tone, format: Format, overlay: Overlay, locale: &str) -> Self {
        Self {
            purpose: Purpose::HookIdea,
            platform: Some(platform),
            tone,
            format: Some(format),
            pattern: None,
            overlay,
            locale: locale.to_string(),
            context: String::new(),
        }
    }

    pub fn weekly_summary(tone: Tone, overlay: Overlay, locale: &str, context: String) -> Self {
        Self {
            purpose: Purpose::WeeklySummary,
            platform: None,
            tone,
            format: None,
            pattern: None,
            overlay,
            locale: locale.to_string(),
            context,
        }
    }

    pub fn with_pattern(mut self, pattern: PatternKey) -> Self {
        self.pattern = Some(pattern);
        self
    }
}

/// Produces short text from a structured request
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Clean up raw generator output.
///
/// Keeps the first non-empty line, strips wrapping quotes and caps the
/// length. Nothing left means the output is unusable.
pub fn sanitize_output(raw: &str, max_chars: usize) -> Result<String, GenerationError> {
    let line = raw
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    let stripped = line
        .trim_matches(|c| matches!(c, '"' | '\'' | '“' | '”' | '`'))
        .trim();

    if stripped.is_empty() {
        return Err(GenerationError::Unusable("empty output".to_string()));
    }
    Ok(stripped.chars().take(max_chars).collect())
}

/// Call the generator with a timeout and sanitize what comes back
pub async fn generate_text(
    generator: &dyn ContentGenerator,
    request: &GenerationRequest,
    timeout: Duration,
) -> Result<String, GenerationError> {
    match tokio::time::timeout(timeout, generator.generate(request)).await {
        Ok(Ok(raw)) => sanitize_output(&raw, MAX_OUTPUT_CHARS),
        Ok(Err(e)) => Err(e),
        Err(_) => {
            warn!("Generation for {:?} timed out after {:?}", request.purpose, timeout);
            Err(GenerationError::Timeout(timeout.as_secs()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest::hook_idea(Platform::TikTok, Tone::Funny, Format::Listicle, Overlay::disabled(), "en")
    }

    #[test]
    fn test_sanitize_keeps_first_line_without_quotes() {
        let text = sanitize_output("\n  \"Stop scrolling: this changes everything\"\nSecond line", 200).unwrap();
        assert_eq!(text, "Stop scrolling: this changes everything");
    }

    #[test]
    fn test_sanitize_rejects_blank_output() {
        assert!(matches!(sanitize_output("  \n\"\"\n", 200), Err(GenerationError::Unusable(_))));
    }

    #[test]
    fn test_sanitize_caps_length() {
        assert_eq!(sanitize_output("abcdefgh", 3).unwrap(), "abc");
    }

    #[tokio::test]
    async fn test_generate_text_passes_errors_through() {
        let mut generator = MockContentGenerator::new();
        generator
            .expect_generate()
            .returning(|_| Err(GenerationError::Unavailable("quota".to_string())));
        let result = generate_text(&generator, &request(), GENERATION_TIMEOUT).await;
        assert!(matches!(result, Err(GenerationError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_generate_text_sanitizes() {
        let mut generator = MockContentGenerator::new();
        generator
            .expect_generate()
            .withf(|r| r.purpose == Purpose::HookIdea && r.tone == Tone::Funny)
            .returning(|_| Ok("'POV: your cat runs the meeting'".to_string()));
        let text = generate_text(&generator, &request(), GENERATION_TIMEOUT).await.unwrap();
        assert_eq!(text, "POV: your cat runs the meeting");
    }
}
