//! Language-model sampling parameters.
//!
//! All fields are optional to support partial configuration and fallback
//! chains: request-level overrides win over settings, which win over the
//! hardcoded defaults.

use serde::{Deserialize, Serialize};

/// Sampling parameters for a language-model generation call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SamplingOptions {
    /// Maximum tokens to generate in the reply.
    ///
    /// Spoken replies should stay short; the default caps them hard.
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold (0.0 - 1.0).
    pub top_p: Option<f32>,
}

impl SamplingOptions {
    /// Merge another set of options into this one, preferring values
    /// already present in `self`.
    pub fn merge_with(&mut self, other: &Self) {
        if self.max_tokens.is_none() {
            self.max_tokens = other.max_tokens;
        }
        if self.temperature.is_none() {
            self.temperature = other.temperature;
        }
        if self.top_p.is_none() {
            self.top_p = other.top_p;
        }
    }

    /// The hardcoded fallback values used when nothing else is configured.
    ///
    /// Tuned for short, conversational spoken replies.
    #[must_use]
    pub const fn with_hardcoded_defaults() -> Self {
        Self {
            max_tokens: Some(100),
            temperature: Some(0.7),
            top_p: Some(0.9),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_all_none() {
        let options = SamplingOptions::default();
        assert!(options.max_tokens.is_none());
        assert!(options.temperature.is_none());
        assert!(options.top_p.is_none());
    }

    #[test]
    fn merge_prefers_self() {
        let mut options = SamplingOptions {
            temperature: Some(1.2),
            ..Default::default()
        };
        options.merge_with(&SamplingOptions::with_hardcoded_defaults());

        assert_eq!(options.temperature, Some(1.2));
        assert_eq!(options.max_tokens, Some(100));
        assert_eq!(options.top_p, Some(0.9));
    }

    #[test]
    fn hardcoded_defaults() {
        let options = SamplingOptions::with_hardcoded_defaults();
        assert_eq!(options.max_tokens, Some(100));
        assert_eq!(options.temperature, Some(0.7));
        assert_eq!(options.top_p, Some(0.9));
    }

    #[test]
    fn serialization_round_trip() {
        let options = SamplingOptions {
            max_tokens: Some(64),
            temperature: Some(0.5),
            top_p: None,
        };

        let json = serde_json::to_string(&options).unwrap();
        let back: SamplingOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(options, back);
    }
}
