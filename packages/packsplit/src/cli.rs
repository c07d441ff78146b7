//! Command-line interface.

use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::budget::Budget;
use crate::config::RunConfig;
use crate::error::{PackSplitError, Result, EXIT_INVALID_ARGS};
use crate::packager;
use crate::planner::Planner;
use crate::suggest::{LlmSuggester, SuggestionBackend, UnconfiguredSuggester};
use crate::types::RunReport;

/// packsplit - Split a repository into packaging units that fit a token budget.
#[derive(Parser, Debug)]
#[command(name = "packsplit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory to analyze
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Show debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Compute the plan without writing or validating anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Overwrite existing configuration files
    #[arg(short, long)]
    pub force: bool,

    /// Always use the built-in exclusion patterns
    #[arg(long)]
    pub skip_ai: bool,

    /// Directory for packaged artifacts (default: the analyzed directory)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Token encoding (e.g. o200k_base, cl100k_base)
    #[arg(short, long)]
    pub encoding: Option<String>,

    /// Token budget per packaging unit
    #[arg(short, long)]
    pub target_tokens: Option<u64>,

    /// Share of the budget kept free, in [0, 1)
    #[arg(long)]
    pub buffer_ratio: Option<f64>,

    /// Maximum split depth
    #[arg(long)]
    pub max_depth: Option<usize>,
}

impl Cli {
    /// Parse process arguments, mapping failures to an exit code.
    ///
    /// Help and version output count as success.
    pub fn parse_args() -> std::result::Result<Self, i32> {
        Self::try_parse().map_err(|e| {
            let _ = e.print();
            match e.kind() {
                ErrorKind::DisplayHelp
                | ErrorKind::DisplayVersion
                | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => 0,
                _ => EXIT_INVALID_ARGS,
            }
        })
    }

    /// Default log filter for the chosen verbosity.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }

    /// Environment-derived config with the flags applied on top.
    pub fn run_config(&self) -> Result<RunConfig> {
        let mut config = RunConfig::from_env(&self.dir)?;

        let budget = Budget::new(
            self.target_tokens
                .unwrap_or_else(|| config.budget.target_tokens()),
            self.encoding
                .clone()
                .unwrap_or_else(|| config.budget.encoding().to_string()),
            self.buffer_ratio
                .unwrap_or_else(|| config.budget.buffer_ratio()),
        )?;
        config = config
            .with_budget(budget)
            .with_dry_run(self.dry_run)
            .with_force(self.force)
            .with_skip_ai(self.skip_ai);
        if let Some(max_depth) = self.max_depth {
            config = config.with_max_depth(max_depth);
        }
        if let Some(output_dir) = &self.output_dir {
            config = config.with_output_dir(output_dir);
        }
        Ok(config)
    }
}

/// Run the CLI.
pub fn run(cli: &Cli) -> Result<()> {
    let config = cli.run_config()?;
    config.validate_root()?;

    if !config.dry_run && !config.force && config.root_config_path().exists() {
        return Err(PackSplitError::Conflict {
            path: config.root_config_path(),
        });
    }
    if !config.dry_run {
        packager::ensure_available(&config.packager)?;
    }

    let packager = packager::from_config(&config.packager);
    let suggester: Option<Box<dyn SuggestionBackend>> = if config.skip_ai {
        None
    } else if let Some(llm) = &config.llm {
        Some(Box::new(LlmSuggester::new(llm)?))
    } else {
        tracing::info!("LLM_API_KEY not set, suggestions fall back to defaults");
        Some(Box::new(UnconfiguredSuggester))
    };
    let planner = Planner::new(&config, packager.as_ref(), suggester.as_deref());

    if !cli.quiet {
        println!(
            "{} {} (budget {} tokens, limit {})",
            style("Analyzing").bold(),
            style(config.root.display()).cyan(),
            config.budget.target_tokens(),
            style(config.budget.effective_limit()).green()
        );
    }

    let pb = spinner(cli.quiet);
    pb.set_message("Assessing and splitting...");
    let plan = match planner.plan() {
        Ok(plan) => plan,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };

    pb.set_message(if config.dry_run {
        "Checking plan..."
    } else {
        "Writing and validating units..."
    });
    let report = match planner.apply(&plan) {
        Ok(report) => report,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };
    pb.finish_and_clear();

    if !cli.quiet {
        print_summary(&report);
    }
    Ok(())
}

fn spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_summary(report: &RunReport) {
    println!();
    let verb = if report.dry_run {
        "Would write"
    } else {
        "Wrote"
    };
    println!(
        "{} {} packaging unit(s)",
        style(verb).green().bold(),
        report.units.len()
    );

    let width = report
        .units
        .iter()
        .map(|u| u.label.len())
        .max()
        .unwrap_or(1);
    for unit in &report.units {
        let marker = if unit.over_budget {
            style("!").red().bold()
        } else {
            style("✓").green()
        };
        let actual = unit
            .actual_tokens
            .map(|t| format!(", actual {t}"))
            .unwrap_or_default();
        let flag = if unit.over_budget {
            style(" over budget").red().to_string()
        } else {
            String::new()
        };
        println!(
            "  {marker} {:<width$}  ~{} tokens{actual}{flag}  {}",
            unit.label,
            unit.estimated_tokens,
            style(unit.config_path.display()).dim()
        );
    }

    let (notices, warnings): (Vec<_>, Vec<_>) =
        report.warnings.iter().partition(|w| w.is_notice());
    if !warnings.is_empty() {
        println!();
        println!("{} {}", style("Warnings:").yellow().bold(), warnings.len());
        for warning in warnings {
            println!("  - {warning}");
        }
    }
    if !notices.is_empty() {
        println!();
        println!("{} {}", style("Notes:").dim(), notices.len());
        for notice in notices {
            println!("  - {}", style(notice).dim());
        }
    }
}
