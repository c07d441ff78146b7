//! Planning and applying a run.
//!
//! [`Planner::plan`] computes every unit without touching the analyzed tree
//! (apart from the estimator's private scratch directories).
//! [`Planner::apply`] checks for conflicts, then writes configurations and
//! validates each unit with the packaging tool.

use std::fs;

use crate::budget::Assessor;
use crate::config::RunConfig;
use crate::error::{PackSplitError, Result};
use crate::estimator::Estimator;
use crate::packager::{PackRequest, Packager};
use crate::partition::Partitioner;
use crate::suggest::{SuggestionBackend, Suggestions};
use crate::types::{PackagingUnit, RunPlan, RunReport, UnitReport, Warning};
use crate::unit::UnitBuilder;

/// Runs the assess, split and build pipeline for one root.
pub struct Planner<'a> {
    config: &'a RunConfig,
    packager: &'a dyn Packager,
    suggester: Option<&'a dyn SuggestionBackend>,
    builder: UnitBuilder,
}

impl<'a> Planner<'a> {
    /// `suggester` is ignored when the config asks to skip suggestions.
    #[must_use]
    pub fn new(
        config: &'a RunConfig,
        packager: &'a dyn Packager,
        suggester: Option<&'a dyn SuggestionBackend>,
    ) -> Self {
        Self {
            config,
            packager,
            suggester: if config.skip_ai { None } else { suggester },
            builder: UnitBuilder::new(&config.output_dir, config.budget.encoding()),
        }
    }

    /// Compute all packaging units for the configured root.
    pub fn plan(&self) -> Result<RunPlan> {
        let config = self.config;
        config.validate_root()?;

        let estimator = Estimator::new(self.packager);
        let assessor = Assessor::new(&estimator, &config.budget);
        let suggestions = Suggestions::new(self.suggester);
        let partitioner =
            Partitioner::new(&assessor, &suggestions, &self.builder, config.max_depth);

        let mut warnings = Vec::new();
        let rules = suggestions.rules_for(&config.root, &mut warnings)?;
        let assessment = assessor.assess(&config.root, &rules, &mut warnings)?;
        tracing::info!(
            root = %config.root.display(),
            tokens = assessment.estimated_tokens,
            limit = config.budget.effective_limit(),
            "assessed root"
        );

        let units = partitioner.resolve(&config.root, "", rules, assessment, 0, &mut warnings)?;

        Ok(RunPlan {
            units,
            warnings: dedup(warnings),
        })
    }

    /// Persist and validate a plan.
    ///
    /// Without `force`, any existing configuration aborts before the first
    /// write (in dry-run mode it is only reported).
    pub fn apply(&self, plan: &RunPlan) -> Result<RunReport> {
        let config = self.config;
        let mut warnings = plan.warnings.clone();

        if !config.force {
            let existing: Vec<&PackagingUnit> =
                plan.units.iter().filter(|u| u.config_path.exists()).collect();
            if let Some(first) = existing.first() {
                if !config.dry_run {
                    return Err(PackSplitError::Conflict {
                        path: first.config_path.clone(),
                    });
                }
                warnings.extend(existing.iter().map(|u| Warning::ExistingConfig {
                    path: u.config_path.clone(),
                }));
            }
        }

        if !config.dry_run {
            fs::create_dir_all(&config.output_dir)?;
        }

        let mut units = Vec::with_capacity(plan.units.len());
        for unit in &plan.units {
            let actual_tokens = if config.dry_run {
                None
            } else {
                self.builder.persist(unit)?;
                self.validate(unit, &mut warnings)
            };
            units.push(UnitReport {
                label: unit.label().to_string(),
                config_path: unit.config_path.clone(),
                output_path: unit.output_path.clone(),
                estimated_tokens: unit.estimated_tokens,
                actual_tokens,
                over_budget: !unit.within_budget,
            });
        }

        Ok(RunReport {
            units,
            warnings,
            dry_run: config.dry_run,
        })
    }

    /// `plan` followed by `apply`.
    pub fn run(&self) -> Result<RunReport> {
        let plan = self.plan()?;
        self.apply(&plan)
    }

    /// Produce the unit's artifact once to confirm it works; reports actual tokens.
    fn validate(&self, unit: &PackagingUnit, warnings: &mut Vec<Warning>) -> Option<u64> {
        let request = PackRequest {
            workdir: &unit.source_root,
            ignore: &unit.rules,
            encoding: &unit.encoding,
            output: &unit.output_path,
        };
        match self.packager.pack(&request) {
            Ok(report) => report.total_tokens,
            Err(e) => {
                tracing::warn!(unit = unit.label(), error = %e, "validation failed");
                warnings.push(Warning::ValidationFailed {
                    path: unit.source_root.clone(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }
}

/// Drop repeated warnings, keeping first occurrences in order.
fn dedup(warnings: Vec<Warning>) -> Vec<Warning> {
    let mut unique: Vec<Warning> = Vec::with_capacity(warnings.len());
    for warning in warnings {
        if !unique.contains(&warning) {
            unique.push(warning);
        }
    }
    unique
}
