//! File walking functionality for directory traversal

use super::file_info::FileInfo;
use super::language::language_tag;
use crate::config::ScannerConfig;
use crate::error::ScanError;
use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Files found by one walk plus the entries that could not be read
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub files: Vec<FileInfo>,
    pub errors: Vec<ScanError>,
}

pub struct FileWalker {
    pub(crate) root: PathBuf,
    pub(crate) extensions: HashSet<String>,
    pub(crate) ignore_dirs: HashSet<String>,
}

impl FileWalker {
    pub fn new(root: impl AsRef<Path>, config: &ScannerConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extensions: config.normalized_extensions().into_iter().collect(),
            ignore_dirs: config.ignore_dirs.iter().cloned().collect(),
        }
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_ignore_dirs(mut self, dirs: &[&str]) -> Self {
        self.ignore_dirs = dirs.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Walk the directory once and collect every file on the allow-list
    ///
    /// Ignored directories are pruned before descent. Unreadable entries are
    /// recorded in [`WalkOutcome::errors`] and the walk continues.
    pub fn walk(&self) -> Result<WalkOutcome> {
        if !self.root.exists() {
            return Err(ScanError::DirectoryNotFound(self.root.display().to_string()).into());
        }
        if !self.root.is_dir() {
            return Err(ScanError::NotADirectory(self.root.display().to_string()).into());
        }

        let mut outcome = WalkOutcome::default();

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_ignored_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let file = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| self.root.display().to_string());
                    tracing::warn!("Skipping unreadable entry {}: {}", file, e);
                    outcome.errors.push(ScanError::FileReadFailed {
                        file,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(extension) = self.allowed_extension(entry.path()) else {
                continue;
            };

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    tracing::warn!("Failed to stat {:?}: {}", entry.path(), e);
                    outcome.errors.push(ScanError::FileReadFailed {
                        file: entry.path().display().to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let path = entry.path();
            let absolute = if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            };

            outcome.files.push(FileInfo {
                path: absolute,
                relative_path: self.relative_path(path),
                language: language_tag(&extension),
                extension,
                size,
            });
        }

        tracing::info!(
            "Found {} files to index under {:?} ({} unreadable)",
            outcome.files.len(),
            self.root,
            outcome.errors.len()
        );
        Ok(outcome)
    }

    /// Directories on the deny-list are pruned; the root itself never is
    fn is_ignored_dir(&self, entry: &DirEntry) -> bool {
        entry.depth() > 0
            && entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| self.ignore_dirs.contains(name))
    }

    /// Lower-cased extension if it is on the allow-list
    pub(crate) fn allowed_extension(&self, path: &Path) -> Option<String> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        self.extensions.contains(&extension).then_some(extension)
    }

    pub(crate) fn relative_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}
