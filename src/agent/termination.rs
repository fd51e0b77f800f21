//! Termination detection.
//!
//! A conversation ends when a designated speaker utters a designated
//! phrase. The check is a stateless predicate over the latest message:
//! content is case-folded, non-word runs collapse to single spaces, and
//! the phrase is matched by substring containment. Substring matching is
//! deliberately not word-boundary-aware, so negated phrasings (e.g.
//! "query is not validated" against the phrase "query is validated")
//! also fire; kept for compatibility with the reference behavior.

use std::sync::LazyLock;

use regex::Regex;

use super::conversation::Message;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| {
    // The pattern is a literal and always compiles.
    #[allow(clippy::unwrap_used)]
    let re = Regex::new(r"\W+").unwrap();
    re
});

/// Normalizes message content for phrase matching.
#[must_use]
pub fn normalize(text: &str) -> String {
    NON_WORD.replace_all(&text.to_lowercase(), " ").into_owned()
}

/// A termination predicate: target speaker plus target phrase.
#[derive(Debug, Clone)]
pub struct TerminationRule {
    /// Speaker whose messages are checked.
    pub target_speaker: String,
    /// Phrase (already in normalized form) that ends the conversation.
    pub target_phrase: String,
}

impl TerminationRule {
    /// Creates a rule for the given speaker and phrase.
    #[must_use]
    pub fn new(target_speaker: impl Into<String>, target_phrase: impl Into<String>) -> Self {
        Self {
            target_speaker: target_speaker.into(),
            target_phrase: normalize(&target_phrase.into()),
        }
    }

    /// The standard crew rule: the product manager declares completion.
    #[must_use]
    pub fn project_completed() -> Self {
        Self::new("product_manager", "project is completed")
    }

    /// Returns `true` if the message ends the conversation.
    #[must_use]
    pub fn matches(&self, message: &Message) -> bool {
        message.speaker == self.target_speaker
            && normalize(&message.content).contains(&self.target_phrase)
    }
}
