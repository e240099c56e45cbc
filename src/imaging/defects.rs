//! Bad-pixel detection and repair on raw CFA sensor data.
//!
//! Stuck (hot) and dead pixels sit at fixed sensor positions, so they show up
//! at the same coordinates in every exposure while genuine image detail moves
//! around. Detection therefore runs per frame and then votes across frames:
//!
//! 1. For every pixel, take the median of its same-colour neighbours (the
//!    stride-2 ring on a Bayer sensor, the 8-connected ring on a monochrome
//!    one). The residual is `|value - median|`.
//! 2. Estimate a robust noise scale from the residuals:
//!    `1.4826 × median(residual)`, i.e. the MAD-to-sigma conversion for a
//!    normal distribution. Frames above [`MAX_MEDIAN_SAMPLES`] pixels are
//!    sampled with a uniform stride.
//! 3. A pixel is a candidate in that frame when its residual exceeds
//!    `sigma × scale`.
//! 4. Across `n` frames, a pixel is defective when it is a candidate in at
//!    least `ceil(confirm_ratio × n)` of them. With a single frame every
//!    candidate is confirmed, which is why group mode gives better maps.
//!
//! Repair replaces each defective pixel with the median of its non-defective
//! same-colour neighbours, before demosaicing, so the CFA pattern stays
//! intact.

use super::backend::BackendError;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Maximum number of residuals used for the scale estimate.
pub const MAX_MEDIAN_SAMPLES: usize = 100_000;

const MAD_TO_SIGMA: f32 = 1.4826;

/// Lower bound on the noise scale, in raw sensor units. Synthetic or clipped
/// frames can have a residual median of zero.
const MIN_SCALE: f32 = 1.0;

/// Colour filter arrangement of a sensor plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfaLayout {
    /// Any 2×2 Bayer pattern (RGGB, BGGR, GRBG, GBRG).
    Bayer,
    /// No colour filter array.
    Mono,
}

/// Geometry of a raw sensor plane. `stride` is the row pitch in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneDims {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub layout: CfaLayout,
}

impl PlaneDims {
    pub fn packed(width: usize, height: usize, layout: CfaLayout) -> Self {
        Self {
            width,
            height,
            stride: width,
            layout,
        }
    }
}

/// Sensor coordinate of a defective pixel. Orders row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pixel {
    pub row: u32,
    pub col: u32,
}

/// Detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionParams {
    /// Residual threshold in robust sigmas.
    pub sigma: f32,
    /// Fraction of frames in which a pixel must be flagged.
    pub confirm_ratio: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            sigma: 6.0,
            confirm_ratio: 0.9,
        }
    }
}

/// A set of defective sensor pixels for one sensor geometry.
///
/// Built once and then only read: in group mode the same map is handed to
/// every conversion of a directory batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefectMap {
    width: usize,
    height: usize,
    /// Sorted, de-duplicated.
    pixels: Vec<Pixel>,
}

impl DefectMap {
    pub fn new(width: usize, height: usize, pixels: impl IntoIterator<Item = Pixel>) -> Self {
        let mut pixels: Vec<Pixel> = pixels
            .into_iter()
            .filter(|p| (p.col as usize) < width && (p.row as usize) < height)
            .collect();
        pixels.sort_unstable();
        pixels.dedup();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn empty(width: usize, height: usize) -> Self {
        Self::new(width, height, [])
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn contains(&self, pixel: Pixel) -> bool {
        self.pixels.binary_search(&pixel).is_ok()
    }
}

/// Accumulates per-frame candidates and turns them into a [`DefectMap`].
#[derive(Debug)]
pub struct DefectVotes {
    width: usize,
    height: usize,
    frames: usize,
    counts: BTreeMap<Pixel, u32>,
}

impl DefectVotes {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            frames: 0,
            counts: BTreeMap::new(),
        }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Detect candidates in one frame and record a vote for each.
    pub fn add_frame(&mut self, data: &[u16], dims: PlaneDims, sigma: f32) -> Result<(), BackendError> {
        if dims.width != self.width || dims.height != self.height {
            return Err(BackendError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: (dims.width, dims.height),
            });
        }
        for pixel in find_candidates(data, dims, sigma)? {
            *self.counts.entry(pixel).or_insert(0) += 1;
        }
        self.frames += 1;
        Ok(())
    }

    pub fn finish(self, confirm_ratio: f32) -> DefectMap {
        let required = ((confirm_ratio.clamp(0.0, 1.0) * self.frames as f32).ceil() as u32).max(1);
        let pixels = self
            .counts
            .into_iter()
            .filter(|&(_, votes)| votes >= required)
            .map(|(pixel, _)| pixel);
        DefectMap::new(self.width, self.height, pixels)
    }
}

/// Pixels of a single frame whose residual exceeds `sigma` robust sigmas.
pub fn find_candidates(data: &[u16], dims: PlaneDims, sigma: f32) -> Result<Vec<Pixel>, BackendError> {
    check_plane(data, dims)?;
    if dims.width == 0 || dims.height == 0 {
        return Ok(Vec::new());
    }

    let mut residuals = vec![0.0f32; dims.width * dims.height];
    residuals
        .par_chunks_mut(dims.width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, slot) in row.iter_mut().enumerate() {
                let value = data[y * dims.stride + x] as f32;
                *slot = match neighbour_median(data, dims, x, y, |_, _| true) {
                    Some(median) => (value - median).abs(),
                    None => 0.0,
                };
            }
        });

    let scale = robust_scale(&residuals);
    let threshold = sigma * scale;
    tracing::debug!(
        "defect candidates: {}x{}, scale={:.3}, threshold={:.3}",
        dims.width,
        dims.height,
        scale,
        threshold
    );

    Ok(residuals
        .iter()
        .enumerate()
        .filter(|&(_, &r)| r > threshold)
        .map(|(i, _)| Pixel {
            row: (i / dims.width) as u32,
            col: (i % dims.width) as u32,
        })
        .collect())
}

/// Replace every pixel of `map` with the median of its healthy same-colour
/// neighbours. Returns the number of pixels rewritten.
pub fn repair(data: &mut [u16], dims: PlaneDims, map: &DefectMap) -> Result<usize, BackendError> {
    check_plane(data, dims)?;
    if map.dimensions() != (dims.width, dims.height) {
        return Err(BackendError::DimensionMismatch {
            expected: map.dimensions(),
            actual: (dims.width, dims.height),
        });
    }

    let mut repaired = 0;
    for &pixel in map.pixels() {
        let (x, y) = (pixel.col as usize, pixel.row as usize);
        let healthy = |nx: usize, ny: usize| {
            !map.contains(Pixel {
                row: ny as u32,
                col: nx as u32,
            })
        };
        let median = neighbour_median(data, dims, x, y, healthy)
            .or_else(|| neighbour_median(data, dims, x, y, |_, _| true));
        if let Some(median) = median {
            data[y * dims.stride + x] = median.round().clamp(0.0, u16::MAX as f32) as u16;
            repaired += 1;
        }
    }
    Ok(repaired)
}

fn check_plane(data: &[u16], dims: PlaneDims) -> Result<(), BackendError> {
    let needed = if dims.height == 0 {
        0
    } else {
        (dims.height - 1) * dims.stride + dims.width
    };
    if dims.stride < dims.width || data.len() < needed {
        return Err(BackendError::ProcessingFailed(format!(
            "sensor plane too small: {} samples for {}x{} (stride {})",
            data.len(),
            dims.width,
            dims.height,
            dims.stride
        )));
    }
    Ok(())
}

const BAYER_RING: [(i32, i32); 8] = [
    (-2, 0),
    (2, 0),
    (0, -2),
    (0, 2),
    (-2, -2),
    (-2, 2),
    (2, -2),
    (2, 2),
];

const MONO_RING: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Median of the same-colour neighbours of `(x, y)` accepted by `keep`.
fn neighbour_median(
    data: &[u16],
    dims: PlaneDims,
    x: usize,
    y: usize,
    keep: impl Fn(usize, usize) -> bool,
) -> Option<f32> {
    let ring = match dims.layout {
        CfaLayout::Bayer => &BAYER_RING,
        CfaLayout::Mono => &MONO_RING,
    };
    let mut buf = [0.0f32; 8];
    let mut count = 0;
    for &(dx, dy) in ring {
        let nx = x as i32 + dx;
        let ny = y as i32 + dy;
        if nx < 0 || ny < 0 || nx >= dims.width as i32 || ny >= dims.height as i32 {
            continue;
        }
        let (nx, ny) = (nx as usize, ny as usize);
        if keep(nx, ny) {
            buf[count] = data[ny * dims.stride + nx] as f32;
            count += 1;
        }
    }
    (count > 0).then(|| median_mut(&mut buf[..count]))
}

fn robust_scale(residuals: &[f32]) -> f32 {
    let stride = (residuals.len() / MAX_MEDIAN_SAMPLES).max(1);
    let mut samples: Vec<f32> = residuals.iter().step_by(stride).copied().collect();
    if samples.is_empty() {
        return MIN_SCALE;
    }
    (median_mut(&mut samples) * MAD_TO_SIGMA).max(MIN_SCALE)
}

/// Median of a non-empty slice; averages the two middle values for even lengths.
fn median_mut(values: &mut [f32]) -> f32 {
    let len = values.len();
    let mid = len / 2;
    let (lower, upper, _) = values.select_nth_unstable_by(mid, f32::total_cmp);
    let upper = *upper;
    if len % 2 == 1 {
        upper
    } else {
        let lower_max = lower.iter().copied().fold(f32::MIN, f32::max);
        (lower_max + upper) / 2.0
    }
}
