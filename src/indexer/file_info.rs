//! File descriptor produced by the scanner

use std::path::PathBuf;

/// A source file that passed the scanner's filters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Absolute path
    pub path: PathBuf,
    /// Path relative to the scanned root, `/`-separated
    pub relative_path: String,
    /// Lower-cased extension without the leading dot
    pub extension: String,
    pub language: &'static str,
    pub size: u64,
}
