//! RAW decoding backend trait and shared error type.
//!
//! The [`RawBackend`] trait is the seam between the folder walker and the
//! native imaging code. It carries the collaborator operations a conversion
//! needs: decode, find_bad_pixels (over a set of files or one decoded frame),
//! repair and postprocess.
//! Encoding lives in [`encode`](super::encode) because it only needs RGB
//! pixels.
//!
//! The production implementation is
//! [`LibRawBackend`](super::libraw_backend::LibRawBackend). Tests use the
//! `MockBackend` below, which records operations and never touches LibRaw.

use super::defects::DefectMap;
use super::params::WhiteBalance;
use image::RgbImage;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("LibRaw {operation} failed: {message} (code {code})")]
    LibRaw {
        operation: &'static str,
        code: i32,
        message: String,
    },
    #[error("sensor size {actual:?} does not match defect map size {expected:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Collaborator operations on RAW files.
///
/// A `Frame` is one decoded RAW file that still owns its decoder state; it is
/// consumed by [`postprocess`](RawBackend::postprocess) and must release every
/// native resource when dropped, whichever way a conversion ends.
pub trait RawBackend {
    type Frame;

    /// Open and unpack a RAW file.
    fn decode(&self, path: &Path) -> Result<Self::Frame, BackendError>;

    /// Derive one defect map from every file in `paths`. All files must come
    /// from the same sensor geometry.
    fn find_bad_pixels(&self, paths: &[PathBuf]) -> Result<DefectMap, BackendError>;

    /// Derive a defect map from an already decoded frame, without reading
    /// its file again.
    fn frame_defects(&self, frame: &Self::Frame) -> Result<DefectMap, BackendError>;

    /// Repair the raw sensor data of `frame` in place. Returns the number of
    /// pixels rewritten.
    fn repair(&self, frame: &mut Self::Frame, defects: &DefectMap) -> Result<usize, BackendError>;

    /// Demosaic with the requested white balance into 8-bit RGB.
    fn postprocess(
        &self,
        frame: Self::Frame,
        white_balance: WhiteBalance,
    ) -> Result<RgbImage, BackendError>;
}
