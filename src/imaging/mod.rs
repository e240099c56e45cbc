//! Image processing: RAW decoding through LibRaw, defect repair, encoding.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | LibRaw `open_buffer` + `unpack` (`rsraw-sys`) |
//! | **Find bad pixels** | same-colour median residuals + cross-frame voting ([`defects`]) |
//! | **Repair** | same-colour median, in place on the raw CFA plane |
//! | **Postprocess** | LibRaw `dcraw_process` with camera or auto white balance |
//! | **Encode** | `image` crate JPEG / TIFF encoders |
//!
//! The module is split into:
//! - **Parameters**: quality, white balance and output format
//! - **Backend**: [`RawBackend`] trait + [`LibRawBackend`]
//! - **Defects**: pure detection/repair on sensor planes (unit testable)
//! - **Encode**: RGB → JPEG/TIFF bytes

pub mod backend;
pub mod defects;
pub mod encode;
pub mod libraw_backend;
mod params;

pub use backend::{BackendError, RawBackend};
pub use defects::{DefectMap, DetectionParams, Pixel};
pub use encode::encode;
pub use libraw_backend::LibRawBackend;
pub use params::{OutputFormat, Quality, WhiteBalance};
