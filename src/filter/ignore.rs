//! Ignore-pattern list.
//!
//! # Responsibilities
//! - Load path regexes from a plain-text file, one per line
//! - Answer "is this path ignored" with substring (unanchored) match semantics
//!
//! # Design Decisions
//! - Loaded once at startup, immutable afterwards
//! - Fail-open: a missing or unreadable file yields an empty set
//! - An invalid line is skipped, the rest of the file still applies

use regex::Regex;
use std::path::Path;
use thiserror::Error;

/// Error reading the ignore file.
#[derive(Debug, Error)]
pub enum IgnoreFileError {
    #[error("failed to read ignore file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Ordered set of compiled path patterns.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatternSet {
    patterns: Vec<Regex>,
}

impl IgnorePatternSet {
    /// Build a set from already compiled patterns.
    pub fn new(patterns: Vec<Regex>) -> Self {
        Self { patterns }
    }

    /// A set that ignores nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse file content: one regex per line, blank lines skipped.
    pub fn parse(content: &str) -> Self {
        let mut patterns = Vec::new();

        for (index, line) in content.lines().enumerate() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            match Regex::new(line) {
                Ok(re) => patterns.push(re),
                Err(e) => {
                    tracing::warn!(
                        line = index + 1,
                        pattern = %line,
                        error = %e,
                        "Skipping invalid ignore pattern"
                    );
                }
            }
        }

        Self { patterns }
    }

    /// Read and parse the file at `path`.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn try_load(path: &Path) -> Result<Option<Self>, IgnoreFileError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(Self::parse(&content))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(IgnoreFileError::Io {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Load the file at `path`, falling back to an empty set on any problem.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(set)) => {
                tracing::info!(path = %path.display(), patterns = set.len(), "Ignore patterns loaded");
                set
            }
            Ok(None) => {
                tracing::warn!(
                    path = %path.display(),
                    "Ignore file not found. No paths will be ignored."
                );
                Self::empty()
            }
            Err(e) => {
                tracing::error!(error = %e, "Ignore file unreadable. No paths will be ignored.");
                Self::empty()
            }
        }
    }

    /// Returns true if any pattern finds a match anywhere in `path`.
    pub fn is_ignored(&self, path: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(path))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
