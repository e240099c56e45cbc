//! Directory traversal: the plain tree walk, the group-enhance batch and the
//! archive walk.
//!
//! All three share [`WalkContext`] and record every outcome into the caller's
//! [`RunReport`]. A failing entry is recorded and the walk moves on to the
//! next one; only a cancellation stops a walk early.
//!
//! ## Traversal rules
//!
//! | Entry | Tree walk | Group batch | Archive |
//! |---|---|---|---|
//! | directory | recurse if `recursive` | plain tree walk, per-file enhancement | always recurse |
//! | RAW file | convert | collect, then convert with one shared defect map | copy unchanged |
//! | other file | copy in smart mode | copy in smart mode | ignore |
//!
//! Entries are visited in file-name order. Destination directories appear
//! only when something is written into them.

use crate::catalog::PathCatalog;
use crate::convert::{
    ConversionRequest, ConvertOptions, ConvertOutcome, Enhancement, convert,
};
use crate::copy::{CopyOutcome, copy};
use crate::imaging::{DefectMap, RawBackend};
use crate::report::{Action, EntryEvents, Event, RunReport, display_path};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

/// Traversal switches shared by convert and group-enhance modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    pub recursive: bool,
    /// Copy non-RAW files alongside the converted ones.
    pub smart: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            smart: true,
        }
    }
}

/// Everything a walk needs that does not change between directories.
pub struct WalkContext<'a, B: RawBackend> {
    pub backend: &'a B,
    pub catalog: &'a PathCatalog,
    pub source_root: &'a Path,
    pub destination_root: &'a Path,
    pub walk: WalkOptions,
    /// Conversion settings; `overwrite` also governs copies.
    pub convert: ConvertOptions,
    pub events: Option<&'a Sender<Event>>,
    pub cancel: Option<&'a AtomicBool>,
}

struct Entry {
    name: OsString,
    is_dir: bool,
    is_file: bool,
}

impl<B: RawBackend> WalkContext<'_, B> {
    fn cancelled(&self, report: &mut RunReport) -> bool {
        if self.cancel.is_some_and(|flag| flag.load(Ordering::SeqCst)) {
            report.interrupted = true;
        }
        report.interrupted
    }

    fn request<'r>(&'r self, relative: &'r Path, enhancement: Enhancement<'r>) -> ConversionRequest<'r> {
        ConversionRequest {
            source_root: self.source_root,
            destination_root: self.destination_root,
            relative,
            options: self.convert,
            enhancement,
        }
    }

    /// Announce and list one directory, sorted by name. A listing failure is
    /// recorded against the directory and yields `None`; an unreadable entry
    /// is recorded on its own and left out.
    fn list(&self, relative: &Path, report: &mut RunReport) -> Option<Vec<Entry>> {
        let display = display_path(relative, true);
        let events = EntryEvents::new(self.events, &display);
        events.emit(Action::BrowsingFolder);

        let dir = self.source_root.join(relative);
        let listing = match fs::read_dir(&dir) {
            Ok(listing) => listing,
            Err(e) => {
                tracing::debug!("cannot list {}: {}", dir.display(), e);
                events.emit(Action::Failed(e.to_string()));
                report.record_failure(dir, e);
                return None;
            }
        };

        let described = listing.map(|entry| {
            entry.map(|entry| {
                let path = entry.path();
                Entry {
                    name: entry.file_name(),
                    is_dir: path.is_dir(),
                    is_file: path.is_file(),
                }
            })
        });
        Some(sorted_entries(described, |e| {
            tracing::debug!("unreadable entry in {}: {}", dir.display(), e);
            events.emit(Action::Failed(e.to_string()));
            report.record_failure(dir.clone(), e);
        }))
    }

    /// Handle one file given directly on the command line: convert it if it
    /// is RAW, otherwise copy it in smart mode.
    pub fn process_file(&self, relative: &Path, enhancement: Enhancement<'_>, report: &mut RunReport) {
        if self.catalog.is_raw(relative) {
            self.convert_entry(relative, enhancement, report);
        } else if self.walk.smart && self.source_root.join(relative).is_file() {
            self.copy_entry(relative, report);
        }
    }

    fn convert_entry(&self, relative: &Path, enhancement: Enhancement<'_>, report: &mut RunReport) {
        let display = display_path(relative, false);
        let events = EntryEvents::new(self.events, &display);
        match convert(self.backend, &self.request(relative, enhancement), events) {
            Ok(ConvertOutcome::Converted(_)) => report.converted += 1,
            Ok(ConvertOutcome::Skipped) => report.ignored += 1,
            Err(e) => {
                tracing::debug!("{}", e);
                events.emit(Action::Failed(e.kind.to_string()));
                report.record_failure(e.source_path, e.kind);
            }
        }
    }

    fn copy_entry(&self, relative: &Path, report: &mut RunReport) {
        let display = display_path(relative, false);
        let events = EntryEvents::new(self.events, &display);
        let source = self.source_root.join(relative);
        let destination = self.destination_root.join(relative);
        match copy(&source, &destination, self.convert.overwrite, events) {
            Ok(CopyOutcome::Copied(_)) => report.copied += 1,
            Ok(CopyOutcome::Skipped) => report.ignored += 1,
            Err(e) => {
                tracing::debug!("{}", e);
                events.emit(Action::Failed(e.error.to_string()));
                report.record_failure(e.source_path, e.error);
            }
        }
    }
}

/// Keep the readable entries in name order and hand every error to
/// `on_error`.
fn sorted_entries(
    listing: impl IntoIterator<Item = std::io::Result<Entry>>,
    mut on_error: impl FnMut(std::io::Error),
) -> Vec<Entry> {
    let mut entries: Vec<Entry> = listing
        .into_iter()
        .filter_map(|entry| entry.map_err(&mut on_error).ok())
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    entries
}

/// Walk `relative` (under the source root), converting RAW files with the
/// given enhancement and copying the rest in smart mode.
pub fn walk_tree<B: RawBackend>(
    ctx: &WalkContext<'_, B>,
    relative: &Path,
    enhancement: Enhancement<'_>,
    report: &mut RunReport,
) {
    let Some(entries) = ctx.list(relative, report) else {
        return;
    };
    for entry in entries {
        if ctx.cancelled(report) {
            return;
        }
        let child = relative.join(&entry.name);
        if entry.is_dir {
            if ctx.walk.recursive {
                walk_tree(ctx, &child, enhancement, report);
            }
        } else if ctx.catalog.is_raw(&child) {
            ctx.convert_entry(&child, enhancement, report);
        } else if ctx.walk.smart && entry.is_file {
            ctx.copy_entry(&child, report);
        }
    }
}

/// Convert every RAW file of one directory with a single defect map derived
/// from all of them.
///
/// Subdirectories (when recursive) go through [`walk_tree`] with per-file
/// enhancement. The defect search is skipped when every output already
/// exists. If it fails, the failure is recorded against the directory and
/// the batch falls back to per-file enhancement.
pub fn walk_group<B: RawBackend>(
    ctx: &WalkContext<'_, B>,
    relative: &Path,
    report: &mut RunReport,
) {
    let Some(entries) = ctx.list(relative, report) else {
        return;
    };

    let mut pending: Vec<PathBuf> = Vec::new();
    for entry in entries {
        if ctx.cancelled(report) {
            return;
        }
        let child = relative.join(&entry.name);
        if entry.is_dir {
            if ctx.walk.recursive {
                walk_tree(ctx, &child, Enhancement::PerFile, report);
            }
        } else if ctx.catalog.is_raw(&child) {
            pending.push(child);
        } else if ctx.walk.smart && entry.is_file {
            ctx.copy_entry(&child, report);
        }
    }
    if pending.is_empty() || ctx.cancelled(report) {
        return;
    }

    let needs_work = pending
        .iter()
        .any(|rel| !ctx.request(rel, Enhancement::None).is_skipped());
    let shared = if needs_work {
        shared_defect_map(ctx, relative, &pending, report)
    } else {
        None
    };
    let enhancement = match &shared {
        Some(map) => Enhancement::Shared(map),
        None => Enhancement::PerFile,
    };

    for rel in &pending {
        if ctx.cancelled(report) {
            return;
        }
        ctx.convert_entry(rel, enhancement, report);
    }
}

fn shared_defect_map<B: RawBackend>(
    ctx: &WalkContext<'_, B>,
    relative: &Path,
    pending: &[PathBuf],
    report: &mut RunReport,
) -> Option<DefectMap> {
    let sources: Vec<PathBuf> = pending.iter().map(|rel| ctx.source_root.join(rel)).collect();
    match ctx.backend.find_bad_pixels(&sources) {
        Ok(map) => {
            tracing::info!(
                "{}: shared defect map of {} pixel(s) from {} file(s)",
                display_path(relative, true),
                map.len(),
                sources.len()
            );
            Some(map)
        }
        Err(e) => {
            let display = display_path(relative, true);
            let cause = format!("group enhance failed: {}", e);
            EntryEvents::new(ctx.events, &display).emit(Action::Failed(cause.clone()));
            report.record_failure(ctx.source_root.join(relative), cause);
            None
        }
    }
}

/// Copy every RAW file below `relative` into the mirrored destination,
/// unconverted. Other files are ignored; an existing destination skips only
/// that file.
pub fn archive<B: RawBackend>(ctx: &WalkContext<'_, B>, relative: &Path, report: &mut RunReport) {
    let Some(entries) = ctx.list(relative, report) else {
        return;
    };
    for entry in entries {
        if ctx.cancelled(report) {
            return;
        }
        let child = relative.join(&entry.name);
        if entry.is_dir {
            archive(ctx, &child, report);
        } else if entry.is_file && ctx.catalog.is_raw(&child) {
            ctx.copy_entry(&child, report);
        }
    }
}
