//! Packaging tool backends.
//!
//! A [`Packager`] turns a directory plus exclusion rules into one textual
//! artifact and reports its token count. [`ProcessPackager`] shells out to the
//! real tool; [`BuiltinPackager`] is a deterministic in-process stand-in.

mod builtin;
mod process;

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

pub use builtin::BuiltinPackager;
pub use process::ProcessPackager;

use crate::config::PackagerConfig;
use crate::error::{PackSplitError, Result};
use crate::rules::RuleSet;

/// One packaging invocation.
#[derive(Debug, Clone, Copy)]
pub struct PackRequest<'a> {
    /// Directory to package; the tool runs with it as working directory.
    pub workdir: &'a Path,
    /// Exclusions relative to `workdir`.
    pub ignore: &'a RuleSet,
    pub encoding: &'a str,
    /// Absolute artifact path.
    pub output: &'a Path,
}

/// What a packaging invocation reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackReport {
    /// `None` when the tool's summary carried no token count.
    pub total_tokens: Option<u64>,
}

/// Capability to produce a packaged artifact.
pub trait Packager {
    fn pack(&self, request: &PackRequest<'_>) -> Result<PackReport>;
}

/// Build the packager selected by `config`.
#[must_use]
pub fn from_config(config: &PackagerConfig) -> Box<dyn Packager> {
    if config.is_builtin() {
        Box::new(BuiltinPackager)
    } else {
        Box::new(ProcessPackager::new(config.clone()))
    }
}

/// Fail with `ToolMissing` unless the configured program can be found.
pub fn ensure_available(config: &PackagerConfig) -> Result<()> {
    if config.is_builtin() {
        return Ok(());
    }
    let program = config.program();
    which::which(program).map_err(|_| PackSplitError::ToolMissing {
        tool: program.to_string(),
    })?;
    Ok(())
}

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TOTAL_TOKENS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)total\s+tokens\s*:\s*([\d,_]+)").expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid regex"));

/// Extract the total token count from a packaging summary.
///
/// # Examples
/// ```
/// use packsplit::packager::parse_total_tokens;
///
/// assert_eq!(parse_total_tokens("  Total Tokens: 12,345 tokens"), Some(12_345));
/// assert_eq!(parse_total_tokens("nothing here"), None);
/// ```
#[must_use]
pub fn parse_total_tokens(summary: &str) -> Option<u64> {
    let plain = ANSI_ESCAPE.replace_all(summary, "");
    let captures = TOTAL_TOKENS.captures_iter(&plain).last()?;
    let digits: String = captures[1].chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}
