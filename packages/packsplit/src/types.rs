//! Core data types shared by the planner, partitioner and unit builder.

use std::fmt;
use std::path::PathBuf;

use crate::rules::RuleSet;
use crate::tree::ChildDir;

/// A recoverable condition, reported in the run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The packaging tool failed; the estimate fell back to byte counting.
    EstimationDegraded { path: PathBuf, reason: String },
    /// Suggestions failed; built-in default patterns were used.
    SuggestionUnavailable { path: PathBuf, reason: String },
    /// An over-budget subtree had no directories to extract.
    NoSplitPossible { path: PathBuf, estimated_tokens: u64 },
    /// Recursion hit the depth ceiling while still over budget.
    DepthExceeded {
        path: PathBuf,
        depth: usize,
        estimated_tokens: u64,
    },
    /// The artifact could not be produced after the config was written.
    ValidationFailed { path: PathBuf, reason: String },
    /// A config file exists; only reported in dry-run mode.
    ExistingConfig { path: PathBuf },
}

impl Warning {
    /// Low-severity notices are informational only.
    #[must_use]
    pub fn is_notice(&self) -> bool {
        matches!(self, Self::EstimationDegraded { .. })
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EstimationDegraded { path, reason } => write!(
                f,
                "estimate for {} uses the byte heuristic ({reason})",
                path.display()
            ),
            Self::SuggestionUnavailable { path, reason } => write!(
                f,
                "default patterns used for {} ({reason})",
                path.display()
            ),
            Self::NoSplitPossible {
                path,
                estimated_tokens,
            } => write!(
                f,
                "{} has no directories to split off; kept at ~{estimated_tokens} tokens",
                path.display()
            ),
            Self::DepthExceeded {
                path,
                depth,
                estimated_tokens,
            } => write!(
                f,
                "{} reached depth {depth} while still over budget (~{estimated_tokens} tokens)",
                path.display()
            ),
            Self::ValidationFailed { path, reason } => {
                write!(f, "could not produce artifact for {}: {reason}", path.display())
            }
            Self::ExistingConfig { path } => {
                write!(f, "{} already exists and would be overwritten", path.display())
            }
        }
    }
}

/// One child subtree extracted from an over-budget parent.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitGroup {
    /// Directories packaged together; the partitioner puts one in each group.
    pub members: Vec<ChildDir>,
    pub estimated_tokens: u64,
    pub depth: usize,
}

/// The logical content of one persisted configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PackagingUnit {
    pub source_root: PathBuf,
    /// Root-relative path of `source_root`; empty for the root unit.
    pub rel_path: String,
    pub rules: RuleSet,
    pub output_path: PathBuf,
    pub config_path: PathBuf,
    pub encoding: String,
    pub depth: usize,
    pub estimated_tokens: u64,
    pub within_budget: bool,
}

impl PackagingUnit {
    /// Whether this is the unit for the analyzed root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.rel_path.is_empty()
    }

    /// Display label: the relative path, or `.` for the root.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.is_root() {
            "."
        } else {
            &self.rel_path
        }
    }
}

/// Everything computed for a run before anything is written.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunPlan {
    /// Root unit first, then split units depth-first in partition order.
    pub units: Vec<PackagingUnit>,
    pub warnings: Vec<Warning>,
}

impl RunPlan {
    /// The root unit, if anything was planned.
    #[must_use]
    pub fn root(&self) -> Option<&PackagingUnit> {
        self.units.first()
    }

    /// Units still over budget after splitting.
    #[must_use]
    pub fn over_budget(&self) -> Vec<&PackagingUnit> {
        self.units.iter().filter(|u| !u.within_budget).collect()
    }
}

/// Outcome of persisting one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitReport {
    pub label: String,
    pub config_path: PathBuf,
    pub output_path: PathBuf,
    pub estimated_tokens: u64,
    /// Reported by the packaging tool after writing; `None` in dry-run or on failure.
    pub actual_tokens: Option<u64>,
    pub over_budget: bool,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunReport {
    pub units: Vec<UnitReport>,
    pub warnings: Vec<Warning>,
    pub dry_run: bool,
}
