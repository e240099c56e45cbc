//! LibRaw backend, through the `rsraw-sys` FFI bindings.
//!
//! ## Operation mapping
//!
//! | Operation | LibRaw call |
//! |---|---|
//! | decode | `libraw_open_buffer` + `libraw_unpack` |
//! | find_bad_pixels | `rawdata.raw_image` of every file → [`defects`](super::defects) voting |
//! | frame_defects | the same, on the plane of an already unpacked frame |
//! | repair | in-place rewrite of `rawdata.raw_image` before demosaicing |
//! | postprocess | `params.use_camera_wb` / `use_auto_wb`, `libraw_dcraw_process`, `libraw_dcraw_make_mem_image` |
//!
//! Every LibRaw allocation is owned by a guard whose `Drop` frees it, so a
//! failed conversion releases the decoder exactly like a successful one.

use super::backend::{BackendError, RawBackend};
use super::defects::{self, CfaLayout, DefectMap, DefectVotes, DetectionParams, PlaneDims};
use super::params::WhiteBalance;
use image::RgbImage;
use rsraw_sys as sys;
use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::slice;
use std::time::Instant;

/// Owns a `libraw_data_t` and closes it on drop.
struct LibRawHandle(*mut sys::libraw_data_t);

impl Drop for LibRawHandle {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: the pointer came from libraw_init and is closed only here.
            unsafe { sys::libraw_close(self.0) };
        }
    }
}

/// Owns a `libraw_processed_image_t` and frees it on drop.
struct ProcessedImage(*mut sys::libraw_processed_image_t);

impl Drop for ProcessedImage {
    fn drop(&mut self) {
        if !self.0.is_null() {
            // SAFETY: allocated by libraw_dcraw_make_mem_image, freed only here.
            unsafe { sys::libraw_dcraw_clear_mem(self.0) };
        }
    }
}

/// An unpacked RAW file.
pub struct LibRawFrame {
    handle: LibRawHandle,
    // LibRaw reads from the caller's buffer until the handle is closed, so it
    // must be dropped after `handle` (fields drop in declaration order).
    _buffer: Vec<u8>,
    source: PathBuf,
}

impl LibRawFrame {
    fn open(path: &Path) -> Result<Self, BackendError> {
        let buffer = std::fs::read(path)?;

        // SAFETY: libraw_init returns a valid pointer or null.
        let inner = unsafe { sys::libraw_init(0) };
        if inner.is_null() {
            return Err(BackendError::ProcessingFailed(
                "libraw_init returned null".to_string(),
            ));
        }
        let frame = Self {
            handle: LibRawHandle(inner),
            _buffer: buffer,
            source: path.to_path_buf(),
        };

        // SAFETY: inner is valid and the buffer lives as long as the handle.
        let ret = unsafe {
            sys::libraw_open_buffer(
                inner,
                frame._buffer.as_ptr() as *const _,
                frame._buffer.len(),
            )
        };
        check("open", ret)?;

        // SAFETY: inner is valid and open_buffer succeeded.
        let ret = unsafe { sys::libraw_unpack(inner) };
        check("unpack", ret)?;

        Ok(frame)
    }

    fn raw(&self) -> *mut sys::libraw_data_t {
        self.handle.0
    }

    /// Geometry of the raw CFA plane (`rawdata.raw_image`).
    fn plane_dims(&self) -> Result<PlaneDims, BackendError> {
        let inner = self.raw();
        // SAFETY: inner is valid and unpacked; these structs are plain data.
        let (width, height, pitch, filters, colors, has_plane) = unsafe {
            (
                (*inner).sizes.raw_width as usize,
                (*inner).sizes.raw_height as usize,
                (*inner).sizes.raw_pitch as usize,
                (*inner).idata.filters,
                (*inner).idata.colors,
                !(*inner).rawdata.raw_image.is_null(),
            )
        };

        if !has_plane || width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "{} has no single-channel sensor plane",
                self.source.display()
            )));
        }

        let layout = if filters == 0 || colors == 1 {
            CfaLayout::Mono
        } else if filters >= 1000 {
            CfaLayout::Bayer
        } else {
            // filters < 1000 marks X-Trans and other non-2x2 layouts.
            return Err(BackendError::ProcessingFailed(format!(
                "{} uses an unsupported CFA layout (filters=0x{:08x})",
                self.source.display(),
                filters
            )));
        };

        let stride = if pitch >= width * 2 { pitch / 2 } else { width };
        Ok(PlaneDims {
            width,
            height,
            stride,
            layout,
        })
    }

    fn sensor(&self, dims: PlaneDims) -> &[u16] {
        // SAFETY: raw_image is non-null (checked by plane_dims) and LibRaw
        // allocates raw_pitch * raw_height bytes for it.
        unsafe { slice::from_raw_parts((*self.raw()).rawdata.raw_image, dims.stride * dims.height) }
    }

    fn sensor_mut(&mut self, dims: PlaneDims) -> &mut [u16] {
        // SAFETY: as in `sensor`; `&mut self` guarantees exclusive access.
        unsafe {
            slice::from_raw_parts_mut((*self.raw()).rawdata.raw_image, dims.stride * dims.height)
        }
    }
}

fn error_message(code: i32) -> String {
    // SAFETY: libraw_strerror returns a pointer to a static string.
    unsafe { CStr::from_ptr(sys::libraw_strerror(code)) }
        .to_string_lossy()
        .into_owned()
}

fn check(operation: &'static str, code: i32) -> Result<(), BackendError> {
    if code == 0 {
        return Ok(());
    }
    tracing::debug!("libraw: {} returned {}", operation, code);
    Err(BackendError::LibRaw {
        operation,
        code,
        message: error_message(code),
    })
}

/// LibRaw-backed implementation of [`RawBackend`].
#[derive(Debug, Clone, Default)]
pub struct LibRawBackend {
    detection: DetectionParams,
}

impl LibRawBackend {
    pub fn new(detection: DetectionParams) -> Self {
        Self { detection }
    }
}

impl RawBackend for LibRawBackend {
    type Frame = LibRawFrame;

    fn decode(&self, path: &Path) -> Result<LibRawFrame, BackendError> {
        LibRawFrame::open(path)
    }

    fn find_bad_pixels(&self, paths: &[PathBuf]) -> Result<DefectMap, BackendError> {
        let start = Instant::now();
        let mut votes: Option<DefectVotes> = None;

        for path in paths {
            let frame = LibRawFrame::open(path)?;
            let dims = frame.plane_dims()?;
            let votes = votes.get_or_insert_with(|| DefectVotes::new(dims.width, dims.height));
            votes.add_frame(frame.sensor(dims), dims, self.detection.sigma)?;
        }

        let map = votes
            .ok_or_else(|| {
                BackendError::ProcessingFailed("no RAW files to derive a defect map from".into())
            })?
            .finish(self.detection.confirm_ratio);

        tracing::info!(
            "defect map from {} file(s): {} pixel(s) in {:.2?}",
            paths.len(),
            map.len(),
            start.elapsed()
        );
        Ok(map)
    }

    fn frame_defects(&self, frame: &LibRawFrame) -> Result<DefectMap, BackendError> {
        let dims = frame.plane_dims()?;
        let mut votes = DefectVotes::new(dims.width, dims.height);
        votes.add_frame(frame.sensor(dims), dims, self.detection.sigma)?;
        let map = votes.finish(self.detection.confirm_ratio);
        tracing::debug!("{}: {} defect(s) in frame", frame.source.display(), map.len());
        Ok(map)
    }

    fn repair(&self, frame: &mut LibRawFrame, defects: &DefectMap) -> Result<usize, BackendError> {
        let dims = frame.plane_dims()?;
        defects::repair(frame.sensor_mut(dims), dims, defects)
    }

    fn postprocess(
        &self,
        frame: LibRawFrame,
        white_balance: WhiteBalance,
    ) -> Result<RgbImage, BackendError> {
        let inner = frame.raw();
        let start = Instant::now();

        // SAFETY: inner is valid and exclusively owned by `frame`.
        unsafe {
            let params = &mut (*inner).params;
            match white_balance {
                WhiteBalance::Camera => {
                    params.use_camera_wb = 1;
                    params.use_auto_wb = 0;
                }
                WhiteBalance::Auto => {
                    params.use_camera_wb = 0;
                    params.use_auto_wb = 1;
                }
            }
            params.output_bps = 8;
        }

        // SAFETY: inner is valid, unpacked and configured.
        let ret = unsafe { sys::libraw_dcraw_process(inner) };
        check("dcraw_process", ret)?;

        let mut errc: i32 = 0;
        // SAFETY: inner is valid and dcraw_process succeeded.
        let processed = ProcessedImage(unsafe { sys::libraw_dcraw_make_mem_image(inner, &mut errc) });
        if processed.0.is_null() {
            return Err(BackendError::LibRaw {
                operation: "dcraw_make_mem_image",
                code: errc,
                message: error_message(errc),
            });
        }
        check("dcraw_make_mem_image", errc)?;

        // SAFETY: processed is non-null; header fields are plain data.
        let (width, height, colors, bits, data_size) = unsafe {
            let img = &*processed.0;
            (
                img.width as u32,
                img.height as u32,
                img.colors as usize,
                img.bits as usize,
                img.data_size as usize,
            )
        };
        if colors != 3 || bits != 8 {
            return Err(BackendError::ProcessingFailed(format!(
                "unexpected LibRaw output: {} colours, {} bits",
                colors, bits
            )));
        }
        let expected = width as usize * height as usize * 3;
        if data_size < expected {
            return Err(BackendError::ProcessingFailed(format!(
                "LibRaw image holds {} bytes, expected {}",
                data_size, expected
            )));
        }

        // SAFETY: `data` is a flexible array member of `data_size` bytes.
        let pixels = unsafe { slice::from_raw_parts((*processed.0).data.as_ptr(), expected) }.to_vec();
        drop(processed);
        drop(frame);

        tracing::debug!("libraw: postprocess {}x{} in {:.2?}", width, height, start.elapsed());

        RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            BackendError::ProcessingFailed("RGB buffer does not match image size".into())
        })
    }
}
