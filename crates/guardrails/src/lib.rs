//! Content guardrails — a pure filter over outbound assistant text.
//!
//! Given a snapshot of the active policy and a candidate response, the filter
//! either rejects it (too short, banned phrase) or returns a transformed copy
//! (truncated to the length cap, disclaimer appended). Stateless: policy
//! changes take effect on the next call, including responses served from the
//! cache.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The active guardrail policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Substrings that must not appear in a response (matched case-insensitively).
    #[serde(default)]
    pub banned_phrases: Vec<String>,

    /// Responses shorter than this are rejected.
    #[serde(default)]
    pub min_length: usize,

    /// Responses longer than this are truncated.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Whether to append the disclaimer to every response.
    #[serde(default)]
    pub require_disclaimer: bool,

    /// The disclaimer text (ignored when empty).
    #[serde(default)]
    pub disclaimer: String,
}

fn default_max_length() -> usize {
    100_000
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            banned_phrases: Vec::new(),
            min_length: 0,
            max_length: default_max_length(),
            require_disclaimer: false,
            disclaimer: String::new(),
        }
    }
}

/// Why a response was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardrailViolation {
    #[error("response too short: {length} chars (minimum {min})")]
    ResponseTooShort { length: usize, min: usize },

    #[error("response contains banned phrase '{phrase}'")]
    BannedPhrase { phrase: String },
}

/// Apply the policy to `text`.
///
/// Order matters: the length floor is checked first, then the text is
/// truncated to the cap, then banned phrases are matched against the original
/// (pre-disclaimer) text so a configured disclaimer can never trip its own
/// ban, and finally the disclaimer is appended.
pub fn apply(config: &GuardrailConfig, text: &str) -> Result<String, GuardrailViolation> {
    if text.len() < config.min_length {
        return Err(GuardrailViolation::ResponseTooShort {
            length: text.len(),
            min: config.min_length,
        });
    }

    let mut out = if text.len() > config.max_length {
        truncate_chars(text, config.max_length)
    } else {
        text.to_string()
    };

    let haystack = out.to_lowercase();
    for phrase in &config.banned_phrases {
        if phrase.is_empty() {
            continue;
        }
        if haystack.contains(&phrase.to_lowercase()) {
            return Err(GuardrailViolation::BannedPhrase {
                phrase: phrase.clone(),
            });
        }
    }

    if config.require_disclaimer && !config.disclaimer.is_empty() {
        out.push_str("\n\n");
        out.push_str(&config.disclaimer);
    }

    Ok(out)
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn truncate_chars(text: &str, max: usize) -> String {
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GuardrailConfig {
        GuardrailConfig {
            banned_phrases: vec!["forbidden".into()],
            min_length: 3,
            max_length: 50,
            require_disclaimer: false,
            disclaimer: String::new(),
        }
    }

    #[test]
    fn passes_clean_text() {
        assert_eq!(apply(&config(), "all good here").unwrap(), "all good here");
    }

    #[test]
    fn rejects_short_text() {
        let err = apply(&config(), "hi").unwrap_err();
        assert_eq!(
            err,
            GuardrailViolation::ResponseTooShort { length: 2, min: 3 }
        );
    }

    #[test]
    fn truncates_long_text() {
        let long = "x".repeat(80);
        let out = apply(&config(), &long).unwrap();
        assert_eq!(out.len(), 50);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let cfg = GuardrailConfig {
            max_length: 5,
            ..GuardrailConfig::default()
        };
        // 'é' is two bytes; the cap lands mid-character.
        let out = apply(&cfg, "ababé").unwrap();
        assert_eq!(out, "abab");
    }

    #[test]
    fn bans_phrase_case_insensitively() {
        let err = apply(&config(), "this is ForBidden text").unwrap_err();
        assert_eq!(
            err,
            GuardrailViolation::BannedPhrase {
                phrase: "forbidden".into()
            }
        );
    }

    #[test]
    fn appends_disclaimer() {
        let cfg = GuardrailConfig {
            require_disclaimer: true,
            disclaimer: "AI-generated.".into(),
            ..GuardrailConfig::default()
        };
        let out = apply(&cfg, "answer").unwrap();
        assert_eq!(out, "answer\n\nAI-generated.");
    }

    #[test]
    fn disclaimer_not_appended_when_empty() {
        let cfg = GuardrailConfig {
            require_disclaimer: true,
            ..GuardrailConfig::default()
        };
        assert_eq!(apply(&cfg, "answer").unwrap(), "answer");
    }

    #[test]
    fn disclaimer_cannot_trip_its_own_ban() {
        // The disclaimer contains a banned phrase; the scan runs on the
        // original text, so the response still passes.
        let cfg = GuardrailConfig {
            banned_phrases: vec!["disclaimer".into()],
            require_disclaimer: true,
            disclaimer: "Disclaimer: generated content.".into(),
            ..GuardrailConfig::default()
        };
        let out = apply(&cfg, "answer").unwrap();
        assert!(out.contains("Disclaimer"));
    }

    #[test]
    fn banned_phrase_checked_after_truncation() {
        // The phrase sits entirely beyond the cap, so the kept prefix is clean.
        let cfg = GuardrailConfig {
            banned_phrases: vec!["forbidden".into()],
            max_length: 10,
            ..GuardrailConfig::default()
        };
        let out = apply(&cfg, "clean text forbidden").unwrap();
        assert_eq!(out, "clean text");
    }

    #[test]
    fn empty_banned_phrase_is_ignored() {
        let cfg = GuardrailConfig {
            banned_phrases: vec![String::new()],
            ..GuardrailConfig::default()
        };
        assert!(apply(&cfg, "anything").is_ok());
    }
}
