//! Shared test utilities for the raw-to-jpg test suite.
//!
//! Builds source trees in temp directories, pins and reads modification
//! times, and drains progress events into plain vectors for assertions.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let tmp = setup_tree(&[("a.CR2", "raw"), ("sub/b.txt", "notes")]);
//! let src = tmp.path().join("in");
//! set_mtime(&src.join("a.CR2"), fixed_time());
//!
//! assert_tree(&src, &["a.CR2", "sub/b.txt"]);
//! ```

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use crate::report::{Action, Event};

// =========================================================================
// Fixture setup
// =========================================================================

/// Create a temp directory holding `in/` with the given files and an empty
/// `out/`. Paths use `/` separators and are relative to `in/`. Contents
/// equal to `"corrupt"` make the mock backend fail to decode.
pub fn setup_tree(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let src = tmp.path().join("in");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(tmp.path().join("out")).unwrap();
    for (relative, content) in files {
        write_file(&src, relative, content);
    }
    tmp
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

/// Source and destination roots of a tree made by [`setup_tree`].
pub fn roots(tmp: &TempDir) -> (PathBuf, PathBuf) {
    (tmp.path().join("in"), tmp.path().join("out"))
}

// =========================================================================
// Timestamps
// =========================================================================

/// A fixed, whole-second point in time well in the past.
pub fn fixed_time() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000)
}

pub fn set_mtime(path: &Path, time: SystemTime) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time)
        .unwrap();
}

pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

// =========================================================================
// Tree assertions
// =========================================================================

/// Every regular file under `root`, relative, `/`-separated, sorted.
pub fn tree_files(root: &Path) -> Vec<String> {
    fn visit(root: &Path, dir: &Path, out: &mut Vec<String>) {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                visit(root, &path, out);
            } else {
                let relative = path.strip_prefix(root).unwrap();
                let parts: Vec<String> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.push(parts.join("/"));
            }
        }
    }
    let mut out = Vec::new();
    if root.exists() {
        visit(root, root, &mut out);
    }
    out.sort();
    out
}

/// Assert the exact set of files under `root`. Panics with both lists.
pub fn assert_tree(root: &Path, expected: &[&str]) {
    let actual = tree_files(root);
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(
        actual,
        expected,
        "unexpected file set under {}",
        root.display()
    );
}

// =========================================================================
// Events
// =========================================================================

pub fn event_channel() -> (Sender<Event>, Receiver<Event>) {
    mpsc::channel()
}

/// Drain all events already sent, as `(path, action)` pairs.
pub fn drain(rx: &Receiver<Event>) -> Vec<(String, Action)> {
    rx.try_iter().map(|e| (e.path, e.action)).collect()
}

/// Paths that received the given action, in emission order.
pub fn paths_with(events: &[(String, Action)], action: &Action) -> Vec<String> {
    events
        .iter()
        .filter(|(_, a)| a == action)
        .map(|(p, _)| p.clone())
        .collect()
}
