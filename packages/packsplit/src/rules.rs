//! Exclusion rule sets.
//!
//! A [`RuleSet`] is a set of path globs relative to the directory a packaging
//! unit is rooted at. Iteration order is sorted so that everything derived
//! from a rule set (config files, tool arguments) is deterministic.

use std::collections::BTreeSet;
use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{PackSplitError, Result};

/// Built-in exclusions used when no suggestions are available.
pub const DEFAULT_PATTERNS: &[&str] = &[
    // Binary and media files
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.bmp",
    "**/*.ico",
    "**/*.svg",
    "**/*.webp",
    "**/*.pdf",
    "**/*.mp3",
    "**/*.mp4",
    "**/*.mov",
    "**/*.wav",
    "**/*.zip",
    "**/*.tar",
    "**/*.gz",
    "**/*.tgz",
    "**/*.7z",
    "**/*.jar",
    "**/*.woff",
    "**/*.woff2",
    "**/*.ttf",
    "**/*.eot",
    "**/*.so",
    "**/*.dylib",
    "**/*.dll",
    "**/*.exe",
    "**/*.o",
    "**/*.a",
    "**/*.class",
    "**/*.pyc",
    "**/*.wasm",
    "**/*.min.js",
    "**/*.map",
    // Build and dependency output
    "**/node_modules/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/out/**",
    "**/coverage/**",
    "**/vendor/**",
    "**/.venv/**",
    "**/venv/**",
    "**/__pycache__/**",
    "**/.next/**",
    "**/.gradle/**",
    // Lockfiles
    "**/package-lock.json",
    "**/yarn.lock",
    "**/pnpm-lock.yaml",
    "**/Cargo.lock",
    "**/poetry.lock",
    "**/Gemfile.lock",
    "**/composer.lock",
    "**/go.sum",
    // Editor and VCS metadata
    "**/.git/**",
    "**/.svn/**",
    "**/.hg/**",
    "**/.idea/**",
    "**/.vscode/**",
    "**/.DS_Store",
    "**/*.swp",
];

/// Patterns that keep previous packsplit output out of every unit.
pub const OWN_ARTIFACT_PATTERNS: &[&str] = &["**/repomix-output*.xml", "**/repomix*.config.json"];

/// Ordered, de-duplicated set of exclusion globs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    patterns: BTreeSet<String>,
}

impl RuleSet {
    /// An empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in default exclusions plus own-artifact patterns.
    #[must_use]
    pub fn defaults() -> Self {
        let mut rules: Self = DEFAULT_PATTERNS.iter().copied().collect();
        rules.extend_own_artifacts();
        rules
    }

    /// Add the patterns that exclude packsplit's own outputs.
    pub fn extend_own_artifacts(&mut self) {
        for pattern in OWN_ARTIFACT_PATTERNS {
            self.insert(pattern);
        }
    }

    /// Insert one pattern after normalising it. Returns `false` if it was
    /// already present or normalised to nothing.
    pub fn insert(&mut self, pattern: &str) -> bool {
        match normalize_pattern(pattern) {
            Some(normalized) => self.patterns.insert(normalized),
            None => false,
        }
    }

    /// Set union, in place.
    pub fn merge(&mut self, other: &RuleSet) {
        self.patterns.extend(other.patterns.iter().cloned());
    }

    /// Set union, returning a new set.
    #[must_use]
    pub fn union(&self, other: &RuleSet) -> RuleSet {
        let mut merged = self.clone();
        merged.merge(other);
        merged
    }

    /// Whether `pattern` is in the set, compared after normalisation.
    ///
    /// # Arguments
    /// * `pattern` - A pattern as it would be passed to [`RuleSet::insert`]
    ///
    /// # Returns
    /// `true` if an equal normalised pattern is present
    #[must_use]
    pub fn contains(&self, pattern: &str) -> bool {
        normalize_pattern(pattern).is_some_and(|p| self.patterns.contains(&p))
    }

    /// Number of patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the set has no patterns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Patterns in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    /// Patterns in sorted order, as owned strings for serialisation.
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.patterns.iter().cloned().collect()
    }

    /// Re-express inherited rules for a child unit rooted at `child_rel`.
    ///
    /// The result excludes exactly the paths under `child_rel` that `self`
    /// excludes, so nothing an ancestor excluded can come back. Unanchored and
    /// `**/` patterns carry over unchanged; anchored patterns lose the
    /// `child_rel/` prefix; anchored patterns that cannot reach into the
    /// child are dropped.
    #[must_use]
    pub fn rebased(&self, child_rel: &str) -> RuleSet {
        self.patterns
            .iter()
            .filter_map(|pattern| rebase_pattern(pattern, child_rel))
            .collect()
    }

    /// Compile into a matcher for paths relative to the unit root.
    pub fn matcher(&self) -> Result<RuleMatcher> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.patterns {
            for variant in match_variants(pattern) {
                let glob = GlobBuilder::new(&variant)
                    .literal_separator(true)
                    .build()
                    .map_err(|source| PackSplitError::Pattern {
                        pattern: pattern.clone(),
                        source,
                    })?;
                builder.add(glob);
            }
        }
        let set = builder.build().map_err(|source| PackSplitError::Pattern {
            pattern: "<rule set>".to_string(),
            source,
        })?;
        Ok(RuleMatcher { set })
    }
}

impl<S: AsRef<str>> FromIterator<S> for RuleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut rules = RuleSet::new();
        for pattern in iter {
            rules.insert(pattern.as_ref());
        }
        rules
    }
}

/// Compiled form of a [`RuleSet`].
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    set: GlobSet,
}

impl RuleMatcher {
    /// Whether a path relative to the unit root is excluded.
    #[must_use]
    pub fn is_excluded(&self, rel_path: &Path) -> bool {
        self.set.is_match(rel_path)
    }

    /// Whether every path under `rel_dir` is excluded.
    ///
    /// Matches the literal path `<rel_dir>/**` against the globs, which hits
    /// exactly the patterns that cover the whole directory.
    #[must_use]
    pub fn is_dir_excluded(&self, rel_dir: &Path) -> bool {
        self.is_excluded(&rel_dir.join("**"))
    }
}

/// The pattern that removes a split-off subtree from its parent unit.
///
/// Every path segment is escaped, so a directory named `[ab]` yields a pattern
/// that matches only that directory.
///
/// # Arguments
/// * `rel_dir` - Directory path relative to the parent unit, `/`-separated
///
/// # Returns
/// `<escaped rel_dir>/**`
///
/// # Examples
/// ```
/// use packsplit::rules::split_off_pattern;
///
/// assert_eq!(split_off_pattern("src/api"), "src/api/**");
/// assert_eq!(split_off_pattern("[ab]"), "[[]ab[]]/**");
/// ```
#[must_use]
pub fn split_off_pattern(rel_dir: &str) -> String {
    let escaped: Vec<String> = rel_dir
        .split('/')
        .filter(|s| !s.is_empty())
        .map(escape_segment)
        .collect();
    format!("{}/**", escaped.join("/"))
}

/// Escape a literal file or directory name for use inside a glob.
///
/// Meta-characters become one-character classes (`*` becomes `[*]`), a form
/// both globset and the packaging tool read as a literal.
#[must_use]
pub fn escape_segment(name: &str) -> String {
    globset::escape(name).replace('\\', "[\\]")
}

/// Check that a single pattern compiles.
#[must_use]
pub fn is_valid_pattern(pattern: &str) -> bool {
    normalize_pattern(pattern).is_some_and(|p| {
        match_variants(&p)
            .iter()
            .all(|v| GlobBuilder::new(v).literal_separator(true).build().is_ok())
    })
}

fn normalize_pattern(pattern: &str) -> Option<String> {
    let mut p = pattern.trim();
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    let p = p.trim_start_matches('/');
    if p.is_empty() || p.starts_with('#') {
        return None;
    }
    if let Some(dir) = p.strip_suffix('/') {
        if dir.is_empty() {
            return None;
        }
        return Some(format!("{dir}/**"));
    }
    Some(p.to_string())
}

fn rebase_pattern(pattern: &str, child_rel: &str) -> Option<String> {
    if !pattern.contains('/') || pattern.starts_with("**/") {
        return Some(pattern.to_string());
    }
    let mut rest = pattern;
    for segment in child_rel.split('/').filter(|s| !s.is_empty()) {
        let (head, tail) = rest.split_once('/')?;
        if head == "**" {
            return Some(rest.to_string());
        }
        if !segment_matches(head, segment) {
            return None;
        }
        rest = tail;
    }
    Some(rest.to_string())
}

/// Whether one glob path segment matches one directory name.
fn segment_matches(glob: &str, name: &str) -> bool {
    if !glob.contains(['*', '?', '[', '{', '\\']) {
        return glob == name;
    }
    GlobBuilder::new(glob)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher().is_match(name))
        .unwrap_or(false)
}

/// Gitignore-style: a pattern without a separator matches at any depth.
fn match_variants(pattern: &str) -> Vec<String> {
    if pattern.contains('/') {
        vec![pattern.to_string()]
    } else {
        vec![pattern.to_string(), format!("**/{pattern}")]
    }
}
