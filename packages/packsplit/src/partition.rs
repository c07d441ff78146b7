//! Recursive splitting of over-budget subtrees.
//!
//! The partitioner does not balance groups against the budget. It extracts
//! the largest immediate children (by file count) until they hold about half
//! of the subtree's files, and lets each extracted child be assessed and, if
//! needed, split again one level down. The remainder stays with the parent.
//!
//! Everything is returned up the call stack; no state is shared between
//! recursion frames.

use std::path::Path;

use crate::budget::{Assessment, Assessor};
use crate::config::{FALLBACK_SPLIT_DIRS, SPLIT_SHARE};
use crate::error::Result;
use crate::rules::{split_off_pattern, RuleSet};
use crate::suggest::Suggestions;
use crate::tree::{ChildDir, PathNode};
use crate::types::{PackagingUnit, SplitGroup, Warning};
use crate::unit::UnitBuilder;

/// Result of splitting one subtree.
#[derive(Debug, Clone, PartialEq)]
pub enum Split {
    Partitioned(SplitOutcome),
    /// No child directory could be extracted.
    NoSplitPossible,
}

/// The children extracted from one subtree.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutcome {
    /// One group per extracted child, in selection order.
    pub groups: Vec<SplitGroup>,
    /// `<child>/**` for every extracted child, relative to the split subtree.
    pub exclusions: RuleSet,
    /// Units for the extracted children and their descendants, depth-first.
    pub units: Vec<PackagingUnit>,
}

/// Decides and carries out the splits for a run.
pub struct Partitioner<'a> {
    assessor: &'a Assessor<'a>,
    suggestions: &'a Suggestions<'a>,
    builder: &'a UnitBuilder,
    max_depth: usize,
}

impl<'a> Partitioner<'a> {
    /// Create a partitioner.
    ///
    /// # Arguments
    /// * `assessor` - Measures every subtree and remainder
    /// * `suggestions` - Source of each split child's own exclusions
    /// * `builder` - Names and describes the resulting units
    /// * `max_depth` - Deepest level a split unit may sit at
    #[must_use]
    pub fn new(
        assessor: &'a Assessor<'a>,
        suggestions: &'a Suggestions<'a>,
        builder: &'a UnitBuilder,
        max_depth: usize,
    ) -> Self {
        Self {
            assessor,
            suggestions,
            builder,
            max_depth,
        }
    }

    /// Turn an assessed subtree into its unit followed by all descendant units.
    ///
    /// Within budget: one unit. Over budget: split if the depth allows, then
    /// rebuild this subtree's unit with the split-off children excluded.
    /// Depth and split failures are accepted with a warning.
    pub fn resolve(
        &self,
        dir: &Path,
        rel: &str,
        rules: RuleSet,
        assessment: Assessment,
        depth: usize,
        warnings: &mut Vec<Warning>,
    ) -> Result<Vec<PackagingUnit>> {
        if assessment.within_budget {
            return Ok(vec![self.builder.build(dir, rel, rules, depth, &assessment)]);
        }

        if depth >= self.max_depth {
            tracing::warn!(
                path = %dir.display(),
                depth,
                tokens = assessment.estimated_tokens,
                "depth limit reached while over budget"
            );
            warnings.push(Warning::DepthExceeded {
                path: dir.to_path_buf(),
                depth,
                estimated_tokens: assessment.estimated_tokens,
            });
            return Ok(vec![self.builder.build(dir, rel, rules, depth, &assessment)]);
        }

        match self.split(dir, rel, &rules, &assessment, depth, warnings)? {
            Split::NoSplitPossible => {
                tracing::warn!(
                    path = %dir.display(),
                    tokens = assessment.estimated_tokens,
                    "no directories to split off"
                );
                warnings.push(Warning::NoSplitPossible {
                    path: dir.to_path_buf(),
                    estimated_tokens: assessment.estimated_tokens,
                });
                Ok(vec![self.builder.build(dir, rel, rules, depth, &assessment)])
            }
            Split::Partitioned(outcome) => {
                for group in &outcome.groups {
                    tracing::debug!(
                        parent = %dir.display(),
                        members = ?group.members.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
                        tokens = group.estimated_tokens,
                        depth = group.depth,
                        "split group"
                    );
                }
                let remainder_rules = rules.union(&outcome.exclusions);
                let remainder = self.assessor.assess(dir, &remainder_rules, warnings)?;
                let mut units = Vec::with_capacity(outcome.units.len() + 1);
                units.push(
                    self.builder
                        .build(dir, rel, remainder_rules, depth, &remainder),
                );
                units.extend(outcome.units);
                Ok(units)
            }
        }
    }

    /// Split an over-budget subtree at `depth`.
    ///
    /// `rules` are the subtree's own rules, relative to `dir`; `rel` is the
    /// path of `dir` relative to the analyzed root.
    pub fn split(
        &self,
        dir: &Path,
        rel: &str,
        rules: &RuleSet,
        assessment: &Assessment,
        depth: usize,
        warnings: &mut Vec<Warning>,
    ) -> Result<Split> {
        let node = PathNode::scan(dir, rules)?;
        let selected = select_children(&node);
        if selected.is_empty() {
            return Ok(Split::NoSplitPossible);
        }

        tracing::info!(
            path = %dir.display(),
            depth,
            tokens = assessment.estimated_tokens,
            recommended = assessment.recommended_splits,
            selected = selected.len(),
            "splitting subtree"
        );

        let mut outcome = SplitOutcome {
            groups: Vec::with_capacity(selected.len()),
            exclusions: RuleSet::new(),
            units: Vec::new(),
        };

        for child in selected {
            let child_rel = join_rel(rel, &child.name);
            let mut child_rules = rules.rebased(&child.name);
            child_rules.merge(&self.suggestions.rules_for(&child.path, warnings)?);
            child_rules.extend_own_artifacts();

            let child_assessment = self.assessor.assess(&child.path, &child_rules, warnings)?;
            outcome.groups.push(SplitGroup {
                members: vec![child.clone()],
                estimated_tokens: child_assessment.estimated_tokens,
                depth: depth + 1,
            });
            outcome.exclusions.insert(&split_off_pattern(&child.name));
            outcome.units.extend(self.resolve(
                &child.path,
                &child_rel,
                child_rules,
                child_assessment,
                depth + 1,
                warnings,
            )?);
        }

        Ok(Split::Partitioned(outcome))
    }
}

/// Largest children first until they hold the split share of all files.
///
/// Falls back to the first few children by name when none holds any file.
#[must_use]
pub fn select_children(node: &PathNode) -> Vec<&ChildDir> {
    let mut ranked: Vec<&ChildDir> = node.children.iter().filter(|c| c.file_count > 0).collect();
    ranked.sort_by(|a, b| b.file_count.cmp(&a.file_count).then_with(|| a.name.cmp(&b.name)));

    if ranked.is_empty() {
        // `children` is already sorted by name.
        return node.children.iter().take(FALLBACK_SPLIT_DIRS).collect();
    }

    let target = node.file_count as f64 * SPLIT_SHARE;
    let mut covered = 0usize;
    let mut selected = Vec::new();
    for child in ranked {
        if !selected.is_empty() && covered as f64 >= target {
            break;
        }
        covered += child.file_count;
        selected.push(child);
    }
    selected
}

fn join_rel(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}
