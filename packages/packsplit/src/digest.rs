//! Plain-text summary of a subtree, sent to the suggestion service.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::Result;
use crate::rules::RuleSet;
use crate::tree::{walk_included, IncludedFile};

/// Entries shown in the directory listing.
const LISTING_LIMIT: usize = 200;

/// Levels shown in the directory listing.
const LISTING_DEPTH: usize = 2;

/// Extensions shown in the histogram.
const HISTOGRAM_LIMIT: usize = 20;

/// Files at least this large are reported as outliers.
const OUTLIER_MIN_BYTES: u64 = 1024 * 1024;

const OUTLIER_LIMIT: usize = 10;

/// Bytes of `.gitignore` included.
const GITIGNORE_LIMIT: usize = 4 * 1024;

/// Build manifests whose presence hints at the ecosystem.
pub const BUILD_MANIFESTS: &[&str] = &[
    "Cargo.toml",
    "package.json",
    "pyproject.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "composer.json",
    "CMakeLists.txt",
    "Makefile",
];

/// Render the digest of `root`, skipping what `rules` already excludes.
pub fn build_digest(root: &Path, rules: &RuleSet) -> Result<String> {
    let matcher = rules.matcher()?;
    let files = walk_included(root, &matcher)?;

    let mut out = String::new();
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string());
    let total: u64 = files.iter().map(|f| f.size).sum();
    let _ = writeln!(out, "# Subtree: {name}");
    let _ = writeln!(out, "Files: {}, bytes: {total}", files.len());

    out.push_str("\n## Directory listing\n");
    let (listing, hidden) = listing(root, rules)?;
    for entry in &listing {
        let _ = writeln!(out, "{entry}");
    }
    if hidden > 0 {
        let _ = writeln!(out, "... ({hidden} more entries)");
    }

    out.push_str("\n## Extensions\n");
    for (ext, count) in extension_histogram(&files) {
        let _ = writeln!(out, "{ext}: {count}");
    }

    out.push_str("\n## Large files\n");
    let outliers = size_outliers(&files);
    if outliers.is_empty() {
        out.push_str("(none)\n");
    }
    for file in outliers {
        let _ = writeln!(
            out,
            "{} ({} bytes)",
            file.rel_path.to_string_lossy().replace('\\', "/"),
            file.size
        );
    }

    out.push_str("\n## .gitignore\n");
    match gitignore(root) {
        Some(content) => {
            out.push_str(&content);
            if !content.ends_with('\n') {
                out.push('\n');
            }
        }
        None => out.push_str("(none)\n"),
    }

    out.push_str("\n## Build manifests\n");
    let manifests: Vec<&str> = BUILD_MANIFESTS
        .iter()
        .copied()
        .filter(|m| root.join(m).is_file())
        .collect();
    if manifests.is_empty() {
        out.push_str("(none)\n");
    } else {
        let _ = writeln!(out, "{}", manifests.join(", "));
    }

    Ok(out)
}

/// Two levels of entries, directories suffixed with `/`; returns the cut count too.
fn listing(root: &Path, rules: &RuleSet) -> Result<(Vec<String>, usize)> {
    let matcher = rules.matcher()?;
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(LISTING_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    let mut entries = Vec::new();
    for entry in walker.flatten() {
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let is_dir = entry.file_type().is_dir();
        let excluded = if is_dir {
            matcher.is_dir_excluded(rel)
        } else {
            matcher.is_excluded(rel)
        };
        if excluded {
            continue;
        }
        let mut line = rel.to_string_lossy().replace('\\', "/");
        if is_dir {
            line.push('/');
        }
        entries.push(line);
    }

    let hidden = entries.len().saturating_sub(LISTING_LIMIT);
    entries.truncate(LISTING_LIMIT);
    Ok((entries, hidden))
}

/// Most common extensions, by count then name.
fn extension_histogram(files: &[IncludedFile]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for file in files {
        let ext = file
            .rel_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_else(|| "(none)".to_string());
        *counts.entry(ext).or_default() += 1;
    }

    let mut histogram: Vec<(String, usize)> = counts.into_iter().collect();
    histogram.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    histogram.truncate(HISTOGRAM_LIMIT);
    histogram
}

fn size_outliers(files: &[IncludedFile]) -> Vec<&IncludedFile> {
    let mut large: Vec<&IncludedFile> = files
        .iter()
        .filter(|f| f.size >= OUTLIER_MIN_BYTES)
        .collect();
    large.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.rel_path.cmp(&b.rel_path)));
    large.truncate(OUTLIER_LIMIT);
    large
}

fn gitignore(root: &Path) -> Option<String> {
    let content = fs::read_to_string(root.join(".gitignore")).ok()?;
    if content.len() <= GITIGNORE_LIMIT {
        return Some(content);
    }
    let mut end = GITIGNORE_LIMIT;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    Some(format!("{}\n... (truncated)", &content[..end]))
}
