//! Single RAW file → JPEG/TIFF conversion.
//!
//! ## Steps
//!
//! 1. Map `relative/IMG_0001.CR2` to `destination_root/relative/IMG_0001.jpg`
//!    (or `.tiff`).
//! 2. Skip if the output, or its upper-case twin `IMG_0001.JPG`, exists and the
//!    run does not overwrite.
//! 3. Decode, optionally repair defective sensor pixels, demosaic with the
//!    requested white balance.
//! 4. Encode into a temporary file beside the destination, copy the source's
//!    modification time onto it and rename it into place.
//!
//! A failed conversion never leaves a partial file at the destination path.
//! The decoder is owned by the frame value, so every exit path releases it.

use crate::imaging::{
    BackendError, DefectMap, OutputFormat, Quality, RawBackend, WhiteBalance, encode,
};
use crate::report::{Action, EntryEvents};
use crate::skip::{alternate_image_path, should_skip};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Per-run conversion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertOptions {
    pub overwrite: bool,
    pub white_balance: WhiteBalance,
    pub format: OutputFormat,
    pub quality: Quality,
}

/// How defective sensor pixels are handled for one conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Enhancement<'a> {
    None,
    /// Derive a defect map from this file alone.
    PerFile,
    /// Repair with a map shared by the whole directory batch.
    Shared(&'a DefectMap),
}

/// Everything needed to convert one file.
#[derive(Debug, Clone, Copy)]
pub struct ConversionRequest<'a> {
    pub source_root: &'a Path,
    pub destination_root: &'a Path,
    /// Path of the RAW file relative to `source_root`.
    pub relative: &'a Path,
    pub options: ConvertOptions,
    pub enhancement: Enhancement<'a>,
}

impl ConversionRequest<'_> {
    pub fn source_path(&self) -> PathBuf {
        self.source_root.join(self.relative)
    }

    pub fn destination_path(&self) -> PathBuf {
        self.destination_root
            .join(self.relative)
            .with_extension(self.options.format.extension())
    }

    /// Whether the output (or its upper-case twin) already exists and the
    /// run does not overwrite.
    pub fn is_skipped(&self) -> bool {
        let destination = self.destination_path();
        let alternate = alternate_image_path(&destination, self.options.format);
        should_skip(&destination, Some(&alternate), self.options.overwrite)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertOutcome {
    Converted(PathBuf),
    Skipped,
}

#[derive(Error, Debug)]
pub enum ConvertErrorKind {
    #[error("decode failed: {0}")]
    Decode(#[source] BackendError),
    #[error("bad pixel repair failed: {0}")]
    Enhance(#[source] BackendError),
    #[error("encode failed: {0}")]
    Encode(#[source] BackendError),
    #[error("{0}")]
    Filesystem(#[source] std::io::Error),
}

#[derive(Error, Debug)]
#[error("{}: {kind}", .source_path.display())]
pub struct ConvertError {
    pub source_path: PathBuf,
    pub kind: ConvertErrorKind,
}

/// Convert one RAW file. Emits `Ignored` for skips and `Converting` before
/// any decoding starts.
pub fn convert<B: RawBackend>(
    backend: &B,
    request: &ConversionRequest<'_>,
    events: EntryEvents<'_>,
) -> Result<ConvertOutcome, ConvertError> {
    if request.is_skipped() {
        events.emit(Action::Ignored);
        return Ok(ConvertOutcome::Skipped);
    }
    events.emit(Action::Converting);

    let source = request.source_path();
    let destination = request.destination_path();
    let options = request.options;

    let fail = |kind: ConvertErrorKind| ConvertError {
        source_path: source.clone(),
        kind,
    };

    let mut frame = backend
        .decode(&source)
        .map_err(|e| fail(ConvertErrorKind::Decode(e)))?;

    let repaired = match request.enhancement {
        Enhancement::None => 0,
        Enhancement::PerFile => {
            let map = backend
                .frame_defects(&frame)
                .map_err(|e| fail(ConvertErrorKind::Enhance(e)))?;
            backend
                .repair(&mut frame, &map)
                .map_err(|e| fail(ConvertErrorKind::Enhance(e)))?
        }
        Enhancement::Shared(map) => backend
            .repair(&mut frame, map)
            .map_err(|e| fail(ConvertErrorKind::Enhance(e)))?,
    };
    if repaired > 0 {
        tracing::debug!("{}: repaired {} pixel(s)", source.display(), repaired);
    }

    let rgb = backend
        .postprocess(frame, options.white_balance)
        .map_err(|e| fail(ConvertErrorKind::Decode(e)))?;

    write_output(&source, &destination, |file| {
        encode(&rgb, options.format, options.quality, file)
    })
    .map_err(fail)?;

    Ok(ConvertOutcome::Converted(destination))
}

/// Stage the encoded image beside `destination`, stamp it with the source's
/// mtime and rename it into place.
fn write_output(
    source: &Path,
    destination: &Path,
    write: impl FnOnce(&mut fs::File) -> Result<(), BackendError>,
) -> Result<(), ConvertErrorKind> {
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(ConvertErrorKind::Filesystem)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".raw-to-jpg-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(ConvertErrorKind::Filesystem)?;

    write(staged.as_file_mut()).map_err(ConvertErrorKind::Encode)?;

    let modified = fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(ConvertErrorKind::Filesystem)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        staged
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(ConvertErrorKind::Filesystem)?;
    }
    staged
        .as_file()
        .set_modified(modified)
        .map_err(ConvertErrorKind::Filesystem)?;

    staged
        .persist(destination)
        .map_err(|e| ConvertErrorKind::Filesystem(e.error))?;
    Ok(())
}
