//! Configuration constants, validation functions and the per-run configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::budget::Budget;
use crate::error::{PackSplitError, Result};

/// Default nominal token budget per packaging unit.
pub const DEFAULT_TARGET_TOKENS: u64 = 25_000;

/// Default share of the budget held back as a safety margin.
pub const DEFAULT_BUFFER_RATIO: f64 = 0.10;

/// Default tokenizer encoding passed to the packaging tool.
pub const DEFAULT_ENCODING: &str = "o200k_base";

/// Encodings the packaging tool understands.
pub const SUPPORTED_ENCODINGS: &[&str] = &[
    "o200k_base",
    "cl100k_base",
    "p50k_base",
    "p50k_edit",
    "r50k_base",
    "gpt2",
];

/// Deepest level a split unit may sit at. Units at this depth are emitted as-is.
pub const MAX_RECURSION_DEPTH: usize = 3;

/// Configuration file name of the root packaging unit.
pub const ROOT_CONFIG_FILE: &str = "repomix.config.json";

/// Artifact file name of the root packaging unit.
pub const ROOT_OUTPUT_FILE: &str = "repomix-output.xml";

/// Packaging command used when none is configured.
pub const DEFAULT_PACKAGER: &str = "repomix";

/// Packaging command value that selects the in-process packager.
pub const BUILTIN_PACKAGER: &str = "builtin";

/// Time limit for one packaging tool invocation.
pub const DEFAULT_PACKAGER_TIMEOUT_SECS: u64 = 300;

/// Share of a subtree's files extracted into split groups at each level.
pub const SPLIT_SHARE: f64 = 0.5;

/// Number of directories taken by the last-resort split.
pub const FALLBACK_SPLIT_DIRS: usize = 3;

/// Bytes per token used by the heuristic estimate.
pub const BYTES_PER_TOKEN: u64 = 4;

/// Default model for exclusion suggestions.
pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Default base URL of the suggestion service.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.anthropic.com";

/// Default HTTP timeout for suggestion requests.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 60;

/// Validate a token encoding identifier.
///
/// # Examples
/// ```
/// use packsplit::config::validate_encoding;
///
/// assert!(validate_encoding("o200k_base").is_ok());
/// assert!(validate_encoding("utf-8").is_err());
/// ```
pub fn validate_encoding(encoding: &str) -> Result<()> {
    if SUPPORTED_ENCODINGS.contains(&encoding) {
        Ok(())
    } else {
        Err(PackSplitError::InvalidEncoding(encoding.to_string()))
    }
}

/// Validate a buffer ratio: must lie in `[0, 1)`.
pub fn validate_buffer_ratio(ratio: f64) -> Result<()> {
    if (0.0..1.0).contains(&ratio) {
        Ok(())
    } else {
        Err(PackSplitError::InvalidArgument(format!(
            "buffer ratio must be in [0, 1), got {ratio}"
        )))
    }
}

/// Validate a token target: must be positive.
pub fn validate_target_tokens(target: u64) -> Result<()> {
    if target > 0 {
        Ok(())
    } else {
        Err(PackSplitError::InvalidArgument(
            "token target must be greater than zero".to_string(),
        ))
    }
}

/// How the packaging tool is invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagerConfig {
    /// Program plus leading arguments, e.g. `repomix` or `npx repomix`.
    pub command: String,
    pub timeout: Duration,
}

impl PackagerConfig {
    /// Whether the in-process packager was requested.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.command.trim() == BUILTIN_PACKAGER
    }

    /// The program name, without leading arguments.
    #[must_use]
    pub fn program(&self) -> &str {
        self.command.split_whitespace().next().unwrap_or_default()
    }
}

impl Default for PackagerConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_PACKAGER.to_string(),
            timeout: Duration::from_secs(DEFAULT_PACKAGER_TIMEOUT_SECS),
        }
    }
}

/// Connection settings for the suggestion service.
///
/// NOTE: Do NOT derive `Debug` on this struct, `api_key` would be exposed.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Config with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_LLM_MODEL.to_string(),
            api_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            timeout_secs: DEFAULT_LLM_TIMEOUT_SECS,
        }
    }

    /// Point the client at another service, e.g. a mock server in tests.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Use another model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Everything one run needs, constructed once and passed by reference.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Absolute path of the analyzed directory.
    pub root: PathBuf,
    pub budget: Budget,
    pub max_depth: usize,
    /// Absolute directory artifacts are written to. Defaults to `root`.
    pub output_dir: PathBuf,
    pub dry_run: bool,
    pub force: bool,
    pub skip_ai: bool,
    pub packager: PackagerConfig,
    pub llm: Option<LlmConfig>,
}

impl RunConfig {
    /// Config with built-in defaults for `root`.
    ///
    /// A relative `root` is resolved against the current directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = absolute_path(root.into());
        Self {
            output_dir: root.clone(),
            root,
            budget: Budget::default(),
            max_depth: MAX_RECURSION_DEPTH,
            dry_run: false,
            force: false,
            skip_ai: false,
            packager: PackagerConfig::default(),
            llm: None,
        }
    }

    /// Load defaults overridden by environment variables.
    pub fn from_env(root: impl Into<PathBuf>) -> Result<Self> {
        Self::from_lookup(root, |key| std::env::var(key).ok())
    }

    /// Load defaults overridden by values from `lookup`.
    ///
    /// Unparseable numbers fall back to the default; out-of-range values are rejected.
    pub fn from_lookup(
        root: impl Into<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = Self::new(root);

        let target_tokens = lookup("PACKSPLIT_TARGET_TOKENS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TARGET_TOKENS);
        let encoding =
            lookup("PACKSPLIT_ENCODING").unwrap_or_else(|| DEFAULT_ENCODING.to_string());
        let buffer_ratio = lookup("PACKSPLIT_BUFFER_RATIO")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_BUFFER_RATIO);
        config.budget = Budget::new(target_tokens, encoding, buffer_ratio)?;

        config.max_depth = lookup("PACKSPLIT_MAX_DEPTH")
            .and_then(|v| v.parse().ok())
            .unwrap_or(MAX_RECURSION_DEPTH);

        if let Some(command) = lookup("PACKSPLIT_PACKAGER").filter(|c| !c.trim().is_empty()) {
            config.packager.command = command;
        }
        if let Some(secs) = lookup("PACKSPLIT_PACKAGER_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            config.packager.timeout = Duration::from_secs(secs);
        }

        config.llm = lookup("LLM_API_KEY")
            .filter(|k| !k.is_empty())
            .map(|key| {
                let mut llm = LlmConfig::new(key);
                if let Some(model) = lookup("LLM_MODEL") {
                    llm.model = model;
                }
                if let Some(url) = lookup("LLM_API_BASE_URL") {
                    llm.api_base_url = url;
                }
                if let Some(secs) = lookup("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
                    llm.timeout_secs = secs;
                }
                llm
            });

        Ok(config)
    }

    /// Replace the token budget.
    #[must_use]
    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = budget;
        self
    }

    /// Deepest level a split unit may sit at.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Write artifacts to `output_dir`, made absolute like `root`.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = absolute_path(output_dir.into());
        self
    }

    /// Plan and report without writing anything.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Overwrite existing configuration artifacts.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Use the built-in exclusions instead of asking the suggestion service.
    #[must_use]
    pub fn with_skip_ai(mut self, skip_ai: bool) -> Self {
        self.skip_ai = skip_ai;
        self
    }

    /// Replace the packaging tool settings.
    #[must_use]
    pub fn with_packager(mut self, packager: PackagerConfig) -> Self {
        self.packager = packager;
        self
    }

    /// Path of the root unit's configuration file.
    #[must_use]
    pub fn root_config_path(&self) -> PathBuf {
        self.root.join(ROOT_CONFIG_FILE)
    }

    /// Check the root is a readable directory.
    pub fn validate_root(&self) -> Result<()> {
        ensure_readable_dir(&self.root)
    }
}

/// `path` joined onto the current directory if relative.
///
/// Leaves the path as given when the current directory is unavailable; the
/// root check then reports it.
fn absolute_path(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::path::absolute(&path).unwrap_or(path)
}

/// Fail with `RootUnreadable` unless `path` is a directory we can list.
pub fn ensure_readable_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        return Err(PackSplitError::RootUnreadable {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }
    std::fs::read_dir(path).map_err(|e| PackSplitError::RootUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(())
}
