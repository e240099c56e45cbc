//! Existing-output skip decisions.
//!
//! Only existence is compared, never timestamps: a stale destination is kept
//! until the run is forced with `--force`.

use crate::imaging::OutputFormat;
use std::path::{Path, PathBuf};

/// True iff the destination (or its alternate-case twin) exists and the run
/// does not overwrite.
pub fn should_skip(destination: &Path, alternate: Option<&Path>, overwrite: bool) -> bool {
    if overwrite {
        return false;
    }
    destination.exists() || alternate.is_some_and(Path::exists)
}

/// The upper-case extension variant of an image output path
/// (`a.jpg` → `a.JPG`, `a.tiff` → `a.TIFF`).
pub fn alternate_image_path(destination: &Path, format: OutputFormat) -> PathBuf {
    destination.with_extension(format.alternate_extension())
}
