//! Exclusion pattern suggestions.
//!
//! A [`SuggestionBackend`] receives a plain-text digest of a subtree and
//! answers with free text that should contain a JSON array of globs. The
//! [`Suggestions`] layer turns that into a [`RuleSet`], falling back to the
//! built-in defaults whenever the backend fails or answers nonsense.

mod client;

use std::path::Path;

pub use client::{LlmSuggester, UnconfiguredSuggester};

use crate::digest::build_digest;
use crate::error::{PackSplitError, Result};
use crate::rules::{is_valid_pattern, RuleSet};
use crate::types::Warning;

/// Capability to propose exclusion patterns for a subtree digest.
pub trait SuggestionBackend {
    /// Return the raw model answer for `digest`.
    fn suggest(&self, digest: &str) -> Result<String>;
}

/// Extract a list of glob strings from a model answer.
///
/// The first `[` through the last `]` must parse as a JSON array of strings;
/// surrounding prose or code fences are ignored. Patterns that do not compile
/// are dropped.
///
/// # Examples
/// ```
/// use packsplit::suggest::parse_patterns;
///
/// let raw = "Here you go:\n```json\n[\"**/fixtures/**\", \"*.snap\"]\n```";
/// assert_eq!(parse_patterns(raw).unwrap(), vec!["**/fixtures/**", "*.snap"]);
/// assert!(parse_patterns("no idea").is_err());
/// ```
pub fn parse_patterns(raw: &str) -> Result<Vec<String>> {
    let (Some(start), Some(end)) = (raw.find('['), raw.rfind(']')) else {
        return Err(PackSplitError::SuggestionParse(preview(raw)));
    };
    if end < start {
        return Err(PackSplitError::SuggestionParse(preview(raw)));
    }

    let patterns: Vec<String> = serde_json::from_str(&raw[start..=end])
        .map_err(|e| PackSplitError::SuggestionParse(e.to_string()))?;

    Ok(patterns
        .into_iter()
        .filter(|p| {
            let valid = is_valid_pattern(p);
            if !valid {
                tracing::debug!(pattern = %p, "dropping suggested pattern that does not compile");
            }
            valid
        })
        .collect())
}

fn preview(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(80) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Produces the own exclusions of a packaging unit.
pub struct Suggestions<'a> {
    backend: Option<&'a dyn SuggestionBackend>,
}

impl<'a> Suggestions<'a> {
    /// `None` means suggestions are switched off: defaults, silently.
    #[must_use]
    pub fn new(backend: Option<&'a dyn SuggestionBackend>) -> Self {
        Self { backend }
    }

    /// Exclusion rules for `dir` (relative to `dir`).
    pub fn rules_for(&self, dir: &Path, warnings: &mut Vec<Warning>) -> Result<RuleSet> {
        let Some(backend) = self.backend else {
            return Ok(RuleSet::defaults());
        };

        let mut base = RuleSet::new();
        base.extend_own_artifacts();
        let digest = build_digest(dir, &base)?;

        match backend.suggest(&digest).and_then(|raw| parse_patterns(&raw)) {
            Ok(patterns) => {
                tracing::debug!(
                    path = %dir.display(),
                    count = patterns.len(),
                    "using suggested exclusion patterns"
                );
                let mut rules: RuleSet = patterns.iter().collect();
                rules.extend_own_artifacts();
                Ok(rules)
            }
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "suggestions unavailable, using defaults");
                warnings.push(Warning::SuggestionUnavailable {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
                Ok(RuleSet::defaults())
            }
        }
    }
}

/// Test utilities for suggestion backends.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support {
    use super::*;
    use std::cell::RefCell;

    /// Answers every request with the same text and records the digests it saw.
    pub struct StaticSuggester {
        response: std::result::Result<String, String>,
        pub digests: RefCell<Vec<String>>,
    }

    impl StaticSuggester {
        pub fn with_response(response: &str) -> Self {
            Self {
                response: Ok(response.to_string()),
                digests: RefCell::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                digests: RefCell::new(Vec::new()),
            }
        }
    }

    impl SuggestionBackend for StaticSuggester {
        fn suggest(&self, digest: &str) -> Result<String> {
            self.digests.borrow_mut().push(digest.to_string());
            self.response
                .clone()
                .map_err(PackSplitError::SuggestionRequest)
        }
    }
}
