//! Progress events and the per-run outcome report.
//!
//! Workers never print. Each visited entry produces [`Event`]s that travel
//! over an optional `mpsc` channel to whoever displays them, and every outcome
//! is tallied into the [`RunReport`] owned by the top-level invocation.

use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::Sender;

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    BrowsingFolder,
    Converting,
    Copying,
    Ignored,
    Failed(String),
}

/// A progress event. `path` is the display form of the relative path
/// (leading `/`, trailing `/` for directories).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub path: String,
    pub action: Action,
}

/// Event emitter bound to one entry.
#[derive(Debug, Clone, Copy)]
pub struct EntryEvents<'a> {
    tx: Option<&'a Sender<Event>>,
    path: &'a str,
}

impl<'a> EntryEvents<'a> {
    pub fn new(tx: Option<&'a Sender<Event>>, path: &'a str) -> Self {
        Self { tx, path }
    }

    /// An emitter that drops everything.
    pub fn silent() -> Self {
        Self { tx: None, path: "" }
    }

    pub fn emit(&self, action: Action) {
        if let Some(tx) = self.tx {
            // A closed receiver only means nobody is watching.
            let _ = tx.send(Event {
                path: self.path.to_string(),
                action,
            });
        }
    }
}

/// Display form of a relative path: `/` for the root, `/a/b.CR2` for files,
/// `/a/` for directories.
pub fn display_path(relative: &Path, is_dir: bool) -> String {
    let mut out = String::new();
    for component in relative.components() {
        if let Component::Normal(segment) = component {
            out.push('/');
            out.push_str(&segment.to_string_lossy());
        }
    }
    if is_dir || out.is_empty() {
        out.push('/');
    }
    out
}

/// A per-entry error recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub path: PathBuf,
    pub cause: String,
}

/// Tally of one run. Per-file errors land in `failures`; traversal continues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub converted: usize,
    pub copied: usize,
    pub ignored: usize,
    pub failures: Vec<Failure>,
    pub interrupted: bool,
}

impl RunReport {
    pub fn record_failure(&mut self, path: impl Into<PathBuf>, cause: impl ToString) {
        self.failures.push(Failure {
            path: path.into(),
            cause: cause.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
