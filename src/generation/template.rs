//! Offline template generator
//!
//! Deterministic stand-in for a language model: hook ideas are assembled
//! from the overlay's opening style, the requested format and the pattern's
//! category. The CLI uses it so every command works without network access.

use super::{ContentGenerator, GenerationRequest, Purpose};
use crate::error::GenerationError;
use crate::types::{Format, Opening};

#[derive(Debug, Clone, Default)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn new() -> Self {
        Self
    }

    fn topic(request: &GenerationRequest) -> String {
        request
            .pattern
            .as_ref()
            .and_then(|key| key.category_slug.as_ref().or(key.category_group.as_ref()))
            .map(|slug| slug.as_str().replace(['-', '_'], " "))
            .unwrap_or_else(|| "your niche".to_string())
    }

    fn hook(opening: Opening, topic: &str) -> String {
        match opening {
            Opening::Question => format!("What does nobody tell you about {}?", topic),
            Opening::BoldClaim => format!("Everything you know about {} is backwards.", topic),
            Opening::Statistic => format!("9 out of 10 people get {} wrong.", topic),
            Opening::Story => format!("The day {} finally clicked for me.", topic),
            Opening::Problem => format!("Stuck on {}? Start here.", topic),
        }
    }

    fn format_tag(format: Format) -> &'static str {
        match format {
            Format::Listicle => "5 quick points",
            Format::Tutorial => "step by step",
            Format::Storytime => "storytime",
            Format::BehindTheScenes => "behind the scenes",
            Format::Comparison => "this vs that",
        }
    }
}

#[async_trait::async_trait]
impl ContentGenerator for TemplateGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        match request.purpose {
            Purpose::HookIdea => {
                let topic = Self::topic(request);
                let hook = Self::hook(request.overlay.opening, &topic);
                Ok(match request.format {
                    Some(format) => format!("{} ({})", hook, Self::format_tag(format)),
                    None => hook,
                })
            }
            Purpose::WeeklySummary => {
                if request.context.trim().is_empty() {
                    return Err(GenerationError::Unusable("no facts to summarize".to_string()));
                }
                Ok(request.context.lines().collect::<Vec<_>>().join(" "))
            }
        }
    }
}
