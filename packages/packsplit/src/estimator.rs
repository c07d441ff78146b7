//! Token estimation for a subtree under a rule set.

use std::fs;
use std::path::Path;

use crate::config::{ensure_readable_dir, BYTES_PER_TOKEN};
use crate::error::Result;
use crate::packager::{PackReport, PackRequest, Packager};
use crate::rules::RuleSet;
use crate::tree::included_bytes;

/// A token estimate, with the reason if it came from the byte heuristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Estimate {
    pub tokens: u64,
    pub degraded: Option<String>,
}

/// Estimates what the packaging tool would emit for a subtree.
///
/// Artifacts are written to a private scratch directory that is removed
/// before `estimate` returns.
pub struct Estimator<'a> {
    packager: &'a dyn Packager,
}

impl<'a> Estimator<'a> {
    /// Estimator running `packager` for each measurement.
    #[must_use]
    pub fn new(packager: &'a dyn Packager) -> Self {
        Self { packager }
    }

    /// Estimate `dir` packaged with `rules` excluded.
    ///
    /// Packaging failures degrade to `bytes / 4`; only an unreadable `dir`
    /// is an error.
    pub fn estimate(&self, dir: &Path, rules: &RuleSet, encoding: &str) -> Result<Estimate> {
        ensure_readable_dir(dir)?;

        let scratch = tempfile::Builder::new()
            .prefix("packsplit-estimate-")
            .tempdir()?;
        let output = scratch.path().join("artifact.xml");
        let request = PackRequest {
            workdir: dir,
            ignore: rules,
            encoding,
            output: &output,
        };

        let reason = match self.packager.pack(&request) {
            Ok(PackReport {
                total_tokens: Some(tokens),
            }) if tokens > 0 => {
                return Ok(Estimate {
                    tokens,
                    degraded: None,
                })
            }
            Ok(_) => "packaging tool reported no token count".to_string(),
            Err(e) => e.to_string(),
        };

        let tokens = heuristic_tokens(dir, rules, &output)?;
        tracing::info!(
            path = %dir.display(),
            tokens,
            reason = %reason,
            "falling back to byte-count estimate"
        );
        Ok(Estimate {
            tokens,
            degraded: Some(reason),
        })
    }
}

/// `bytes / 4` of the artifact if one was written, else of the included files.
fn heuristic_tokens(dir: &Path, rules: &RuleSet, artifact: &Path) -> Result<u64> {
    let artifact_bytes = fs::metadata(artifact).map(|m| m.len()).unwrap_or(0);
    let bytes = if artifact_bytes > 0 {
        artifact_bytes
    } else {
        included_bytes(dir, rules)?
    };
    Ok(bytes / BYTES_PER_TOKEN)
}
