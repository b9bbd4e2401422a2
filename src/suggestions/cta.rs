//! Call-to-action templates, a fixed set per tone

use crate::types::Tone;

const EDUCATIONAL: &[&str] = &[
    "Save this so you have it when you need it.",
    "Follow for one practical tip a day.",
    "Which step are you trying first? Tell me below.",
];

const FUNNY: &[&str] = &[
    "Tag the friend who does this.",
    "Share this before your group chat sees it first.",
    "Drop a 😂 if this is you.",
];

const INSPIRATIONAL: &[&str] = &[
    "Send this to someone who needs it today.",
    "Save this for the next hard day.",
    "Follow along, we're building this together.",
];

const SERIOUS: &[&str] = &[
    "Read the full breakdown at the link in bio.",
    "Share this with someone it affects.",
    "What's your take? Let's discuss in the comments.",
];

const CASUAL: &[&str] = &[
    "Would you try this? Let me know.",
    "Follow for more of this.",
    "Comment your version below.",
];

/// Templates for a tone, never empty
pub fn templates_for(tone: Tone) -> &'static [&'static str] {
    match tone {
        Tone::Educational => EDUCATIONAL,
        Tone::Funny => FUNNY,
        Tone::Inspirational => INSPIRATIONAL,
        Tone::Serious => SERIOUS,
        Tone::Casual => CASUAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;

    #[test]
    fn test_every_tone_has_templates() {
        for tone in Tone::ALL {
            assert!(!templates_for(*tone).is_empty());
        }
    }
}
