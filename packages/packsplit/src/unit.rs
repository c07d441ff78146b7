//! Packaging units and their persisted configuration files.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::budget::Assessment;
use crate::config::{ROOT_CONFIG_FILE, ROOT_OUTPUT_FILE};
use crate::error::Result;
use crate::rules::RuleSet;
use crate::types::PackagingUnit;

/// Characters that may not appear in a derived file name.
#[allow(clippy::expect_used)]
static UNSAFE_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._]+").expect("valid regex"));

/// Configuration file layout understood by the packaging tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackConfigFile {
    pub output: OutputSection,
    pub ignore: IgnoreSection,
    pub security: SecuritySection,
    pub token_count: TokenCountSection,
}

/// Where the artifact goes and in which format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSection {
    pub file_path: String,
    pub style: String,
}

/// Exclusions, on top of `.gitignore` and the tool's own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreSection {
    pub use_gitignore: bool,
    pub use_default_patterns: bool,
    pub custom_patterns: Vec<String>,
}

/// Secret scanning switch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySection {
    pub enable_security_check: bool,
}

/// Tokenizer used for the tool's token summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCountSection {
    pub encoding: String,
}

impl PackConfigFile {
    /// The configuration for `unit`, with the artifact path written relative
    /// to the unit's directory when possible.
    #[must_use]
    pub fn for_unit(unit: &PackagingUnit) -> Self {
        Self {
            output: OutputSection {
                file_path: relative_output_path(&unit.source_root, &unit.output_path),
                style: "xml".to_string(),
            },
            ignore: IgnoreSection {
                use_gitignore: true,
                use_default_patterns: true,
                custom_patterns: unit.rules.to_vec(),
            },
            security: SecuritySection {
                enable_security_check: true,
            },
            token_count: TokenCountSection {
                encoding: unit.encoding.clone(),
            },
        }
    }
}

/// Builds and persists packaging units for one run.
#[derive(Debug, Clone)]
pub struct UnitBuilder {
    output_dir: PathBuf,
    encoding: String,
}

impl UnitBuilder {
    /// Builder placing artifacts in `output_dir`, counted with `encoding`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, encoding: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            encoding: encoding.into(),
        }
    }

    /// Describe the unit for `source_root`, `rel_path` being its path relative
    /// to the analyzed root (empty for the root itself).
    #[must_use]
    pub fn build(
        &self,
        source_root: &Path,
        rel_path: &str,
        rules: RuleSet,
        depth: usize,
        assessment: &Assessment,
    ) -> PackagingUnit {
        let (config_path, output_path) = if rel_path.is_empty() {
            (
                source_root.join(ROOT_CONFIG_FILE),
                self.output_dir.join(ROOT_OUTPUT_FILE),
            )
        } else {
            let slug = unit_slug(rel_path);
            (
                source_root.join(format!("repomix-{slug}.config.json")),
                self.output_dir.join(format!("repomix-output-{slug}.xml")),
            )
        };

        PackagingUnit {
            source_root: source_root.to_path_buf(),
            rel_path: rel_path.to_string(),
            rules,
            output_path,
            config_path,
            encoding: self.encoding.clone(),
            depth,
            estimated_tokens: assessment.estimated_tokens,
            within_budget: assessment.within_budget,
        }
    }

    /// Write the unit's configuration file, replacing any existing one.
    pub fn persist(&self, unit: &PackagingUnit) -> Result<()> {
        let config = PackConfigFile::for_unit(unit);
        let json = serde_json::to_string_pretty(&config)?;

        if let Some(parent) = unit.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&unit.config_path)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;

        tracing::debug!(
            path = %unit.config_path.display(),
            patterns = unit.rules.len(),
            "wrote unit configuration"
        );
        Ok(())
    }
}

/// File-name-safe form of a root-relative path: `src/api` becomes `src-api`.
///
/// # Examples
/// ```
/// use packsplit::unit::unit_slug;
///
/// assert_eq!(unit_slug("src/api"), "src-api");
/// assert_eq!(unit_slug("my dir/x"), "my-dir-x");
/// ```
#[must_use]
pub fn unit_slug(rel_path: &str) -> String {
    let joined = rel_path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    UNSAFE_NAME_CHARS
        .replace_all(&joined, "-")
        .trim_matches('-')
        .to_string()
}

/// `output` relative to `from` if it lies under a common ancestor we can
/// express with `..` steps; otherwise `output` unchanged (on Windows, another drive).
fn relative_output_path(from: &Path, output: &Path) -> String {
    let from: Vec<Component<'_>> = from.components().collect();
    let to: Vec<Component<'_>> = output.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();
    if common == 0 {
        return output.to_string_lossy().into_owned();
    }

    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}
