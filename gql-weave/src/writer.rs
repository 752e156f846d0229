//! Artifact file output.
//!
//! Writes generated artifacts to disk, skipping files whose content is
//! already current, with support for dry-run mode. [`ArtifactWriter::write_all`]
//! publishes a batch so readers never see a mix of two generations.

use crate::error::{WeaveResult, WriteError};
use std::path::{Path, PathBuf};

/// Result of a write operation.
#[derive(Debug, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written.
    Written { path: PathBuf, bytes: usize },
    /// File already had this exact content.
    Unchanged { path: PathBuf },
    /// Dry run: content was not written.
    DryRun { path: PathBuf, content: String },
}

/// Artifact writer with dry-run support.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dry_run: bool,
}

impl ArtifactWriter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Write `content` to `path`, creating parent directories.
    pub fn write(&self, path: &Path, content: &str) -> WeaveResult<WriteResult> {
        if self.dry_run {
            return Ok(WriteResult::DryRun {
                path: path.to_path_buf(),
                content: content.to_string(),
            });
        }

        if is_current(path, content) {
            tracing::trace!(path = %path.display(), "artifact unchanged");
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }

        create_parent(path)?;
        std::fs::write(path, content).map_err(|e| WriteError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(path = %path.display(), bytes = content.len(), "wrote artifact");
        Ok(WriteResult::Written {
            path: path.to_path_buf(),
            bytes: content.len(),
        })
    }

    /// Write a batch of files so that either every changed file is replaced
    /// or none is.
    ///
    /// Changed contents are first staged next to their targets. Only when
    /// every stage succeeded are they renamed into place; a failed stage
    /// removes the others and leaves the targets untouched.
    pub fn write_all<'a, I>(&self, files: I) -> WeaveResult<Vec<WriteResult>>
    where
        I: IntoIterator<Item = (&'a Path, &'a str)>,
    {
        if self.dry_run {
            return files
                .into_iter()
                .map(|(path, content)| self.write(path, content))
                .collect();
        }

        let mut results = Vec::new();
        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::new();

        for (path, content) in files {
            if is_current(path, content) {
                results.push(WriteResult::Unchanged {
                    path: path.to_path_buf(),
                });
                continue;
            }

            match stage(path, content) {
                Ok(temp) => staged.push((temp, path.to_path_buf())),
                Err(e) => {
                    discard(staged.iter().map(|(temp, _)| temp));
                    return Err(e);
                }
            }
            results.push(WriteResult::Written {
                path: path.to_path_buf(),
                bytes: content.len(),
            });
        }

        for (i, (temp, path)) in staged.iter().enumerate() {
            if let Err(e) = std::fs::rename(temp, path) {
                discard(staged[i..].iter().map(|(temp, _)| temp));
                return Err(WriteError::WriteFile {
                    path: path.clone(),
                    source: e,
                }
                .into());
            }
        }

        tracing::debug!(files = staged.len(), "published artifact batch");
        Ok(results)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Sibling file a batch write stages `path` into.
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

fn is_current(path: &Path, content: &str) -> bool {
    std::fs::read_to_string(path).is_ok_and(|existing| existing == content)
}

fn create_parent(path: &Path) -> WeaveResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| WriteError::CreateDir {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn stage(path: &Path, content: &str) -> WeaveResult<PathBuf> {
    create_parent(path)?;
    let temp = staging_path(path);
    std::fs::write(&temp, content).map_err(|e| WriteError::WriteFile {
        path: temp.clone(),
        source: e,
    })?;
    Ok(temp)
}

fn discard<'a>(temps: impl Iterator<Item = &'a PathBuf>) {
    for temp in temps {
        if let Err(e) = std::fs::remove_file(temp) {
            tracing::warn!(path = %temp.display(), error = %e, "could not remove staged file");
        }
    }
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path, .. }
            | WriteResult::Unchanged { path }
            | WriteResult::DryRun { path, .. } => path,
        }
    }

    /// Whether bytes actually hit the disk.
    pub fn was_written(&self) -> bool {
        matches!(self, WriteResult::Written { .. })
    }
}
