//! Schema pattern resolution and matching.
//!
//! A [`PatternSet`] holds the configured globs. Anchoring it at a root gives
//! [`ResolvedPatterns`], which both expands to a [`ResolvedFileSet`] on disk
//! and answers whether a single changed path is relevant. Both directions use
//! the same compiled patterns and match options so they always agree.
//!
//! The literal directory prefix of every pattern is canonicalized while
//! anchoring, so `..` segments and symlinked directories resolve to the same
//! paths the filesystem watcher reports.

use crate::error::PatternError;
use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

/// Match options shared by resolution and change matching.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Validated, non-empty list of schema globs as configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<String>,
}

/// Patterns anchored at a root: every entry is absolute.
#[derive(Debug, Clone)]
pub struct ResolvedPatterns {
    patterns: Vec<Pattern>,
    watch_roots: Vec<PathBuf>,
}

/// Absolute file paths matched at one point in time, sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedFileSet {
    paths: Vec<PathBuf>,
}

impl PatternSet {
    /// Validate a list of patterns.
    ///
    /// Fails when the list is empty or any entry is not valid glob syntax.
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|p| normalize_separators(&p.into()))
            .collect();

        if patterns.is_empty() {
            return Err(PatternError::Empty);
        }

        for pattern in &patterns {
            if pattern.trim().is_empty() {
                return Err(PatternError::invalid_pattern(pattern, "pattern is blank"));
            }
            Pattern::new(pattern)
                .map_err(|e| PatternError::invalid_pattern(pattern, e.msg))?;
        }

        Ok(Self { patterns })
    }

    /// A set with exactly one pattern.
    pub fn single(pattern: impl Into<String>) -> Result<Self, PatternError> {
        Self::new([pattern.into()])
    }

    /// The patterns in configured order.
    pub fn as_slice(&self) -> &[String] {
        &self.patterns
    }

    /// Anchor relative patterns at `root`. Absolute patterns keep their
    /// location; in both cases the literal directory prefix is canonicalized.
    pub fn absolutize(&self, root: &Path) -> Result<ResolvedPatterns, PatternError> {
        let root = absolute_root(root);
        let mut patterns = Vec::with_capacity(self.patterns.len());
        let mut watch_roots = Vec::with_capacity(self.patterns.len());

        for pattern in &self.patterns {
            let relative = pattern.strip_prefix("./").unwrap_or(pattern);
            let (literal, glob_part) = split_literal_prefix(relative);
            let base = if is_absolute(pattern) {
                canonical_base(Path::new(literal))
            } else {
                canonical_base(&root.join(literal))
            };

            let escaped = Pattern::escape(&normalize_separators(&base.to_string_lossy()));
            let anchored = if glob_part.is_empty() {
                escaped
            } else {
                format!("{}/{}", escaped.trim_end_matches('/'), glob_part)
            };
            patterns.push(
                Pattern::new(&anchored).map_err(|e| PatternError::invalid_pattern(pattern, e.msg))?,
            );

            // A fully literal pattern names a file; watch its directory.
            let watch_root = match base.parent() {
                Some(parent) if glob_part.is_empty() => parent.to_path_buf(),
                _ => base,
            };
            watch_roots.push(watch_root);
        }

        Ok(ResolvedPatterns {
            patterns,
            watch_roots: collapse_nested(watch_roots),
        })
    }
}

impl ResolvedPatterns {
    /// Whether `path` is covered by any pattern.
    pub fn matches(&self, path: &Path) -> bool {
        matches(path, self)
    }

    /// Directories whose subtrees cover every pattern, none nested in another.
    pub fn watch_roots(&self) -> &[PathBuf] {
        &self.watch_roots
    }

    /// Iterate the compiled absolute patterns.
    pub fn iter(&self) -> std::slice::Iter<'_, Pattern> {
        self.patterns.iter()
    }

    /// Expand every pattern against the filesystem.
    ///
    /// A pattern under a missing directory contributes nothing. Unreadable
    /// directory entries are skipped with a warning.
    pub fn expand(&self) -> ResolvedFileSet {
        let mut found = BTreeSet::new();

        for pattern in &self.patterns {
            let entries = match glob::glob_with(pattern.as_str(), MATCH_OPTIONS) {
                Ok(entries) => entries,
                Err(e) => {
                    // Compiled patterns are already valid; kept for safety.
                    tracing::warn!(pattern = %pattern, error = %e, "skipping pattern");
                    continue;
                }
            };

            for entry in entries {
                match entry {
                    Ok(path) if path.is_file() => {
                        found.insert(path);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(path = %e.path().display(), error = %e.error(), "unreadable entry");
                    }
                }
            }
        }

        tracing::trace!(count = found.len(), "expanded schema patterns");
        ResolvedFileSet {
            paths: found.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ResolvedPatterns {
    type Item = &'a Pattern;
    type IntoIter = std::slice::Iter<'a, Pattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}

impl ResolvedFileSet {
    /// Paths in lexicographic order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.paths.iter()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.binary_search_by(|p| p.as_path().cmp(path)).is_ok()
    }
}

/// Resolve `patterns` against `root` into the matching files.
///
/// Nothing matching is not an error: the result is simply empty.
pub fn resolve(patterns: &PatternSet, root: &Path) -> Result<ResolvedFileSet, PatternError> {
    Ok(patterns.absolutize(root)?.expand())
}

/// Whether `path` matches any of `patterns`.
///
/// Pure string matching after separator normalization; the filesystem is
/// never consulted, so deleted files still match.
pub fn matches<'a, I>(path: &Path, patterns: I) -> bool
where
    I: IntoIterator<Item = &'a Pattern>,
{
    let normalized = normalize_separators(&path.to_string_lossy());
    patterns
        .into_iter()
        .any(|pattern| pattern.matches_with(&normalized, MATCH_OPTIONS))
}

/// Replace backslashes with forward slashes.
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Keep only the outermost directories: sorted, deduplicated, and without
/// any entry that lives under another.
pub fn collapse_nested(mut dirs: Vec<PathBuf>) -> Vec<PathBuf> {
    dirs.sort();
    dirs.dedup();

    let mut kept: Vec<PathBuf> = Vec::with_capacity(dirs.len());
    for dir in dirs {
        if !kept.iter().any(|outer| dir.starts_with(outer)) {
            kept.push(dir);
        }
    }
    kept
}

/// Split a pattern into its leading glob-free segments and the rest.
///
/// `server/**/*.graphql` gives `("server", "**/*.graphql")`; a pattern
/// without metacharacters is all prefix.
fn split_literal_prefix(pattern: &str) -> (&str, &str) {
    let mut end = 0;
    for segment in pattern.split_inclusive('/') {
        if segment.contains(&['*', '?', '['][..]) {
            break;
        }
        end += segment.len();
    }

    if end == pattern.len() {
        (pattern, "")
    } else {
        (&pattern[..end], &pattern[end..])
    }
}

/// Resolve `.` and `..` lexically, then canonicalize the part that exists.
fn canonical_base(path: &Path) -> PathBuf {
    let mut lexical = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other),
        }
    }

    canonicalize_existing(&lexical).unwrap_or(lexical)
}

/// Canonicalize the longest existing ancestor and re-append the missing tail.
fn canonicalize_existing(path: &Path) -> Option<PathBuf> {
    let mut missing = Vec::new();
    let mut existing = path;
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return Some(missing.iter().rev().fold(canonical, |acc, part| acc.join(part)));
        }
        missing.push(existing.file_name()?.to_os_string());
        existing = existing.parent()?;
    }
}

fn is_absolute(pattern: &str) -> bool {
    pattern.starts_with('/') || Path::new(pattern).is_absolute()
}

/// Canonical root when it exists, otherwise joined onto the working directory.
fn absolute_root(root: &Path) -> PathBuf {
    if let Ok(canonical) = root.canonicalize() {
        return canonical;
    }
    if root.is_absolute() {
        return root.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(root))
        .unwrap_or_else(|_| root.to_path_buf())
}
