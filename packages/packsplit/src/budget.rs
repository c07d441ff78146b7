//! Token budget and the assessor that classifies subtrees against it.

use std::path::Path;

use crate::config::{
    validate_buffer_ratio, validate_encoding, validate_target_tokens, DEFAULT_BUFFER_RATIO,
    DEFAULT_ENCODING, DEFAULT_TARGET_TOKENS,
};
use crate::error::Result;
use crate::estimator::Estimator;
use crate::rules::RuleSet;
use crate::types::Warning;

/// Immutable token budget for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Budget {
    target_tokens: u64,
    encoding: String,
    buffer_ratio: f64,
}

impl Budget {
    /// Create a validated budget.
    ///
    /// # Examples
    /// ```
    /// use packsplit::budget::Budget;
    ///
    /// let budget = Budget::new(25_000, "o200k_base", 0.1).unwrap();
    /// assert_eq!(budget.effective_limit(), 22_500);
    /// assert!(Budget::new(0, "o200k_base", 0.1).is_err());
    /// ```
    pub fn new(target_tokens: u64, encoding: impl Into<String>, buffer_ratio: f64) -> Result<Self> {
        let encoding = encoding.into();
        validate_target_tokens(target_tokens)?;
        validate_encoding(&encoding)?;
        validate_buffer_ratio(buffer_ratio)?;
        Ok(Self {
            target_tokens,
            encoding,
            buffer_ratio,
        })
    }

    /// Nominal token budget per unit, before the buffer is taken off.
    #[must_use]
    pub fn target_tokens(&self) -> u64 {
        self.target_tokens
    }

    /// Tokenizer encoding the packaging tool counts with.
    #[must_use]
    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    /// Share of the target held back as a safety margin.
    #[must_use]
    pub fn buffer_ratio(&self) -> f64 {
        self.buffer_ratio
    }

    /// `floor(target * (1 - buffer))`, never below one token.
    #[must_use]
    pub fn effective_limit(&self) -> u64 {
        let limit = (self.target_tokens as f64 * (1.0 - self.buffer_ratio)).floor() as u64;
        limit.max(1)
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            target_tokens: DEFAULT_TARGET_TOKENS,
            encoding: DEFAULT_ENCODING.to_string(),
            buffer_ratio: DEFAULT_BUFFER_RATIO,
        }
    }
}

/// Result of evaluating one subtree against a budget.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub estimated_tokens: u64,
    /// `estimated_tokens <= effective_limit`.
    pub within_budget: bool,
    /// `estimated_tokens / effective_limit`.
    pub overflow_ratio: f64,
    /// Advisory; seeds the partitioner but does not bind it.
    pub recommended_splits: usize,
}

impl Assessment {
    /// Classify an estimate against `budget`.
    #[must_use]
    pub fn from_estimate(estimated_tokens: u64, budget: &Budget) -> Self {
        let limit = budget.effective_limit();
        let overflow_ratio = estimated_tokens as f64 / limit as f64;
        Self {
            estimated_tokens,
            within_budget: estimated_tokens <= limit,
            overflow_ratio,
            recommended_splits: (overflow_ratio.ceil() as usize).max(1),
        }
    }
}

/// Combines an estimator with a budget.
///
/// Every call estimates afresh: a different rule set means a different artifact.
pub struct Assessor<'a> {
    estimator: &'a Estimator<'a>,
    budget: &'a Budget,
}

impl<'a> Assessor<'a> {
    /// Assessor measuring with `estimator` against `budget`.
    #[must_use]
    pub fn new(estimator: &'a Estimator<'a>, budget: &'a Budget) -> Self {
        Self { estimator, budget }
    }

    /// The budget assessments are made against.
    #[must_use]
    pub fn budget(&self) -> &Budget {
        self.budget
    }

    /// Estimate `dir` under `rules` and classify it.
    pub fn assess(
        &self,
        dir: &Path,
        rules: &RuleSet,
        warnings: &mut Vec<Warning>,
    ) -> Result<Assessment> {
        let estimate = self.estimator.estimate(dir, rules, self.budget.encoding())?;
        if let Some(reason) = estimate.degraded {
            warnings.push(Warning::EstimationDegraded {
                path: dir.to_path_buf(),
                reason,
            });
        }

        let assessment = Assessment::from_estimate(estimate.tokens, self.budget);
        tracing::debug!(
            path = %dir.display(),
            tokens = assessment.estimated_tokens,
            limit = self.budget.effective_limit(),
            within = assessment.within_budget,
            "assessed subtree"
        );
        Ok(assessment)
    }
}
