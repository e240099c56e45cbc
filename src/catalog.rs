//! RAW / other classification by file extension.
//!
//! Classification is total and mutually exclusive: every path is either
//! [`EntryKind::Raw`] or [`EntryKind::Other`], and nothing else in the crate
//! decides whether a file gets converted.

use std::collections::BTreeSet;
use std::path::Path;

/// Extensions recognised when no configuration says otherwise.
pub const DEFAULT_RAW_EXTENSIONS: &[&str] = &["cr2", "nef"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Raw,
    Other,
}

/// The set of recognised RAW extensions, stored lowercase without the dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathCatalog {
    raw_extensions: BTreeSet<String>,
}

impl PathCatalog {
    /// Build a catalog from user-supplied extensions. Accepts `"CR2"`,
    /// `".cr2"` and `"cr2"` alike; blank entries are dropped.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let raw_extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { raw_extensions }
    }

    pub fn classify(&self, path: &Path) -> EntryKind {
        let is_raw = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .is_some_and(|e| self.raw_extensions.contains(&e));
        if is_raw { EntryKind::Raw } else { EntryKind::Other }
    }

    pub fn is_raw(&self, path: &Path) -> bool {
        self.classify(path) == EntryKind::Raw
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.raw_extensions.iter().map(String::as_str)
    }
}

impl Default for PathCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_RAW_EXTENSIONS)
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}
