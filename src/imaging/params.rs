//! Parameter types for RAW conversion.
//!
//! These describe *what* a conversion produces, not *how*. They are shared by
//! the [`convert`](crate::convert) module (which builds requests) and the
//! [`backend`](super::backend) / [`encode`](super::encode) layers (which do the
//! pixel work).
//!
//! ## Types
//!
//! - [`Quality`]: JPEG encoding quality (1-100, default 90). Clamped on construction.
//! - [`WhiteBalance`]: which white-balance model LibRaw applies while demosaicing.
//! - [`OutputFormat`]: JPEG or TIFF, with the file extension each one writes.

/// Quality setting for lossy JPEG encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// White-balance model used when postprocessing a RAW frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhiteBalance {
    /// Multipliers recorded by the camera at capture time.
    #[default]
    Camera,
    /// Multipliers estimated by averaging the whole image.
    Auto,
}

/// Container format of the converted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Tiff,
}

impl OutputFormat {
    /// Extension written for this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Tiff => "tiff",
        }
    }

    /// Upper-case spelling of [`extension`](Self::extension). Cameras and older
    /// tools write `IMG_0001.JPG`; a file with that spelling counts as an
    /// earlier conversion.
    pub fn alternate_extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "JPG",
            OutputFormat::Tiff => "TIFF",
        }
    }
}
