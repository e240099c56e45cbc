//! Mode selection and dispatch.
//!
//! The CLI picks exactly one [`Mode`]; [`run`] validates the source against
//! it, announces the run and drives the matching walker. Usage errors are
//! detected before anything touches the filesystem.
//!
//! | Mode | Directory source | File source |
//! |---|---|---|
//! | Convert | [`walk_tree`] | convert (RAW) / copy in smart mode / ignore |
//! | GroupEnhance | [`walk_group`] | usage error |
//! | Archive | [`archive`] | usage error |

use crate::catalog::PathCatalog;
use crate::convert::{ConvertOptions, Enhancement};
use crate::imaging::RawBackend;
use crate::output::BannerKind;
use crate::report::{Event, RunReport};
use crate::walk::{WalkContext, WalkOptions, archive, walk_group, walk_tree};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::Sender;
use thiserror::Error;

/// What a run does. Chosen once from the CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Convert {
        walk: WalkOptions,
        convert: ConvertOptions,
        /// Derive a defect map per file and repair before demosaicing.
        enhance: bool,
    },
    GroupEnhance {
        walk: WalkOptions,
        convert: ConvertOptions,
    },
    Archive {
        overwrite: bool,
    },
}

impl Mode {
    fn name(&self) -> &'static str {
        match self {
            Mode::Convert { .. } => "convert",
            Mode::GroupEnhance { .. } => "group enhance",
            Mode::Archive { .. } => "archive",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UsageError {
    #[error("Source {} does not exist!", .0.display())]
    MissingSource(PathBuf),
    #[error("Only folders are accepted as input in {mode} mode!")]
    FolderRequired { mode: &'static str },
    #[error("Both a source and a destination are required")]
    MissingArguments,
}

/// Paths and plumbing shared by every mode.
pub struct RunTarget<'a> {
    pub source: &'a Path,
    pub destination: &'a Path,
    pub catalog: &'a PathCatalog,
    pub events: Option<&'a Sender<Event>>,
    pub cancel: Option<&'a AtomicBool>,
}

/// Validate the invocation and return the banner it should print.
pub fn plan(mode: &Mode, source: &Path) -> Result<BannerKind, UsageError> {
    if !source.exists() {
        return Err(UsageError::MissingSource(source.to_path_buf()));
    }
    let is_dir = source.is_dir();
    match mode {
        Mode::Archive { .. } | Mode::GroupEnhance { .. } if !is_dir => {
            Err(UsageError::FolderRequired { mode: mode.name() })
        }
        Mode::Archive { .. } => Ok(BannerKind::Archive),
        Mode::GroupEnhance { .. } => Ok(BannerKind::Folder { group: true }),
        Mode::Convert { .. } if is_dir => Ok(BannerKind::Folder { group: false }),
        Mode::Convert { .. } => Ok(BannerKind::File),
    }
}

/// Run `mode` over `target`. Per-entry failures end up in the report; only
/// usage errors are returned.
pub fn run<B: RawBackend>(
    backend: &B,
    mode: &Mode,
    target: &RunTarget<'_>,
) -> Result<RunReport, UsageError> {
    let banner = plan(mode, target.source)?;
    let mut report = RunReport::default();

    let (walk, convert) = match *mode {
        Mode::Convert { walk, convert, .. } | Mode::GroupEnhance { walk, convert } => {
            (walk, convert)
        }
        Mode::Archive { overwrite } => (
            WalkOptions::default(),
            ConvertOptions {
                overwrite,
                ..Default::default()
            },
        ),
    };

    // A single file is walked as the only interesting entry of its parent.
    let (source_root, single) = match banner {
        BannerKind::File => (
            target.source.parent().unwrap_or_else(|| Path::new(".")),
            target.source.file_name().map(PathBuf::from),
        ),
        _ => (target.source, None),
    };

    let ctx = WalkContext {
        backend,
        catalog: target.catalog,
        source_root,
        destination_root: target.destination,
        walk,
        convert,
        events: target.events,
        cancel: target.cancel,
    };

    match (*mode, single) {
        (Mode::Convert { enhance, .. }, Some(file)) => {
            ctx.process_file(&file, enhancement(enhance), &mut report);
        }
        (Mode::Convert { enhance, .. }, None) => {
            walk_tree(&ctx, Path::new(""), enhancement(enhance), &mut report);
        }
        (Mode::GroupEnhance { .. }, _) => walk_group(&ctx, Path::new(""), &mut report),
        (Mode::Archive { .. }, _) => archive(&ctx, Path::new(""), &mut report),
    }

    tracing::info!(
        "{} run finished: {} converted, {} copied, {} ignored, {} failed",
        mode.name(),
        report.converted,
        report.copied,
        report.ignored,
        report.failures.len()
    );
    Ok(report)
}

fn enhancement(enhance: bool) -> Enhancement<'static> {
    if enhance {
        Enhancement::PerFile
    } else {
        Enhancement::None
    }
}
