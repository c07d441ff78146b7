//! Read-only scans of the analyzed tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::ensure_readable_dir;
use crate::error::Result;
use crate::rules::{RuleMatcher, RuleSet};

/// A file that survives a rule set, relative to the scanned directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedFile {
    pub rel_path: PathBuf,
    pub size: u64,
}

/// An immediate child directory with its recursive totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDir {
    pub name: String,
    pub path: PathBuf,
    pub file_count: usize,
    pub byte_size: u64,
}

/// A scanned directory: recursive totals plus its immediate child directories.
///
/// Children are sorted by name. Hidden directories and directories the rule
/// set excludes as a whole are left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNode {
    pub path: PathBuf,
    pub file_count: usize,
    pub byte_size: u64,
    pub children: Vec<ChildDir>,
}

impl PathNode {
    /// Scan `dir`, counting only files `rules` (relative to `dir`) keeps.
    pub fn scan(dir: &Path, rules: &RuleSet) -> Result<Self> {
        let matcher = rules.matcher()?;
        let files = walk_included(dir, &matcher)?;

        let mut children: BTreeMap<String, ChildDir> = immediate_dirs(dir)?
            .into_iter()
            .filter(|name| !is_hidden(name) && !matcher.is_dir_excluded(Path::new(name)))
            .map(|name| {
                let child = ChildDir {
                    path: dir.join(&name),
                    name: name.clone(),
                    file_count: 0,
                    byte_size: 0,
                };
                (name, child)
            })
            .collect();

        let mut byte_size = 0;
        for file in &files {
            byte_size += file.size;
            if let Some(top) = top_level_dir(&file.rel_path) {
                if let Some(child) = children.get_mut(top) {
                    child.file_count += 1;
                    child.byte_size += file.size;
                }
            }
        }

        Ok(Self {
            path: dir.to_path_buf(),
            file_count: files.len(),
            byte_size,
            children: children.into_values().collect(),
        })
    }
}

/// All files under `dir` that `matcher` keeps, in sorted path order.
///
/// `.git` is never descended into. Unreadable entries below `dir` are skipped.
pub fn walk_included(dir: &Path, matcher: &RuleMatcher) -> Result<Vec<IncludedFile>> {
    ensure_readable_dir(dir)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && e.file_name() == ".git"));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel_path) = entry.path().strip_prefix(dir) else {
            continue;
        };
        if matcher.is_excluded(rel_path) {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        files.push(IncludedFile {
            rel_path: rel_path.to_path_buf(),
            size,
        });
    }

    Ok(files)
}

/// Sum of the sizes of all files `rules` keeps under `dir`.
pub fn included_bytes(dir: &Path, rules: &RuleSet) -> Result<u64> {
    let matcher = rules.matcher()?;
    Ok(walk_included(dir, &matcher)?.iter().map(|f| f.size).sum())
}

/// Names of the immediate subdirectories of `dir`, sorted.
fn immediate_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn top_level_dir(rel_path: &Path) -> Option<&str> {
    let mut components = rel_path.components();
    let first = components.next()?;
    // A file directly in the scanned directory has no top-level dir.
    components.next()?;
    first.as_os_str().to_str()
}
