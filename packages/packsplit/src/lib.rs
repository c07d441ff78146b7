//! packsplit - Split a repository into packaging units that each fit a token budget.
//!
//! A packaging unit is one configuration file for the packaging tool
//! (repomix) plus the artifact it produces. When the whole repository does not
//! fit the budget, the largest directories are split off into their own units,
//! recursively, and excluded from their parent.
//!
//! # Example
//!
//! ```
//! use packsplit::budget::{Assessment, Budget};
//!
//! let budget = Budget::new(25_000, "o200k_base", 0.1).unwrap();
//! let assessment = Assessment::from_estimate(90_000, &budget);
//! assert!(!assessment.within_budget);
//! assert_eq!(assessment.recommended_splits, 4);
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Constants, validation and the per-run configuration
//! - [`error`]: Error types, exit codes and Result alias
//! - [`types`]: Units, plans, reports and warnings
//! - [`rules`]: Exclusion rule sets and glob matching
//! - [`tree`]: Read-only directory scans
//! - [`packager`]: Packaging tool backends
//! - [`estimator`]: Token estimation with a byte-count fallback
//! - [`budget`]: Token budget and assessor
//! - [`digest`]: Subtree summaries for the suggestion service
//! - [`suggest`]: Exclusion pattern suggestions
//! - [`partition`]: Recursive splitting
//! - [`unit`]: Unit naming and configuration files
//! - [`planner`]: Planning and applying a run
//! - [`cli`]: Command-line interface

pub mod budget;
pub mod cli;
pub mod config;
pub mod digest;
pub mod error;
pub mod estimator;
pub mod packager;
pub mod partition;
pub mod planner;
pub mod rules;
pub mod suggest;
pub mod tree;
pub mod types;
pub mod unit;

// Re-export commonly used items
pub use budget::{Assessment, Assessor, Budget};
pub use config::RunConfig;
pub use error::{PackSplitError, Result};
pub use planner::Planner;
pub use rules::RuleSet;
pub use types::{PackagingUnit, RunPlan, RunReport, Warning};
