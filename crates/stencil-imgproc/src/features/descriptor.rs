use std::f32::consts::PI;

use stencil_image::Image;

/// Number of spatial cells along each side of the descriptor window.
pub const DESCRIPTOR_CELLS: usize = 4;

/// Number of orientation bins per spatial cell.
pub const DESCRIPTOR_BINS: usize = 8;

/// Length of a descriptor vector.
pub const DESCRIPTOR_SIZE: usize = DESCRIPTOR_CELLS * DESCRIPTOR_CELLS * DESCRIPTOR_BINS;

/// A fixed-length local appearance descriptor compared by Euclidean distance.
pub type Descriptor = [f32; DESCRIPTOR_SIZE];

const ORIENTATION_BINS: usize = 36;
const DESCRIPTOR_CLIP: f32 = 0.2;

/// Gradient images of one pyramid level.
pub(crate) struct GradientLevel<'a> {
    pub magnitude: &'a Image<f32, 1>,
    pub orientation: &'a Image<f32, 1>,
}

impl GradientLevel<'_> {
    #[inline]
    fn sample(&self, col: i64, row: i64) -> Option<(f32, f32)> {
        let (cols, rows) = (self.magnitude.cols() as i64, self.magnitude.rows() as i64);
        if col < 0 || row < 0 || col >= cols || row >= rows {
            return None;
        }
        let idx = (row * cols + col) as usize;
        Some((
            self.magnitude.as_slice()[idx],
            self.orientation.as_slice()[idx],
        ))
    }
}

/// Wrap an angle into `[0, 2pi)`.
#[inline]
fn wrap_angle(angle: f32) -> f32 {
    let wrapped = angle.rem_euclid(2.0 * PI);
    // rem_euclid may round up to exactly 2pi for tiny negative inputs
    if wrapped >= 2.0 * PI {
        0.0
    } else {
        wrapped
    }
}

/// Dominant gradient orientation around `(col, row)` in radians, in `[0, 2pi)`.
///
/// Builds a 36-bin histogram of gradient orientations weighted by magnitude and a
/// gaussian window, then refines the highest bin with a parabola through its
/// neighbors. Ties go to the lowest bin.
pub(crate) fn dominant_orientation(
    level: &GradientLevel,
    col: usize,
    row: usize,
    radius: usize,
) -> f32 {
    let mut hist = [0.0f32; ORIENTATION_BINS];
    let r = radius as i64;
    let sigma = radius as f32 / 2.0;
    let denom = 2.0 * sigma * sigma;
    let bin_width = 2.0 * PI / ORIENTATION_BINS as f32;

    for dy in -r..=r {
        for dx in -r..=r {
            if dx * dx + dy * dy > r * r {
                continue;
            }
            let Some((mag, ori)) = level.sample(col as i64 + dx, row as i64 + dy) else {
                continue;
            };
            let weight = (-((dx * dx + dy * dy) as f32) / denom).exp();
            let bin = ((wrap_angle(ori) / bin_width) as usize).min(ORIENTATION_BINS - 1);
            hist[bin] += weight * mag;
        }
    }

    let mut best = 0;
    for (i, &v) in hist.iter().enumerate() {
        if v > hist[best] {
            best = i;
        }
    }

    let left = hist[(best + ORIENTATION_BINS - 1) % ORIENTATION_BINS];
    let right = hist[(best + 1) % ORIENTATION_BINS];
    let center = hist[best];
    let curvature = left - 2.0 * center + right;
    let offset = if curvature.abs() > f32::EPSILON {
        (0.5 * (left - right) / curvature).clamp(-0.5, 0.5)
    } else {
        0.0
    };

    wrap_angle((best as f32 + 0.5 + offset) * bin_width)
}

/// Compute the 128-float descriptor of the patch around `(col, row)`.
///
/// The window of half-size `radius` is rotated by `angle` and split into 4x4 cells, each
/// accumulating an 8-bin histogram of gradient orientations relative to `angle`. The
/// vector is L2-normalized, clipped at 0.2 and normalized again. A patch without any
/// gradient yields the zero vector.
pub(crate) fn compute_descriptor(
    level: &GradientLevel,
    col: usize,
    row: usize,
    angle: f32,
    radius: usize,
) -> Descriptor {
    let mut desc = [0.0f32; DESCRIPTOR_SIZE];

    let r = radius as f32;
    let cell_size = 2.0 * r / DESCRIPTOR_CELLS as f32;
    let bin_width = 2.0 * PI / DESCRIPTOR_BINS as f32;
    let denom = 2.0 * r * r;
    let (sin_a, cos_a) = angle.sin_cos();

    // the rotated window fits inside the circumscribed square
    let reach = (r * std::f32::consts::SQRT_2).ceil() as i64;

    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let (fx, fy) = (dx as f32, dy as f32);
            let u = cos_a * fx + sin_a * fy;
            let v = -sin_a * fx + cos_a * fy;
            if u < -r || u >= r || v < -r || v >= r {
                continue;
            }

            let Some((mag, ori)) = level.sample(col as i64 + dx, row as i64 + dy) else {
                continue;
            };

            let cell_x = (((u + r) / cell_size) as usize).min(DESCRIPTOR_CELLS - 1);
            let cell_y = (((v + r) / cell_size) as usize).min(DESCRIPTOR_CELLS - 1);
            let bin = ((wrap_angle(ori - angle) / bin_width) as usize).min(DESCRIPTOR_BINS - 1);

            let weight = (-(u * u + v * v) / denom).exp();
            desc[(cell_y * DESCRIPTOR_CELLS + cell_x) * DESCRIPTOR_BINS + bin] += weight * mag;
        }
    }

    normalize(&mut desc);
    desc.iter_mut().for_each(|d| *d = d.min(DESCRIPTOR_CLIP));
    normalize(&mut desc);

    desc
}

fn normalize(desc: &mut Descriptor) {
    let norm = desc.iter().map(|d| d * d).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        desc.iter_mut().for_each(|d| *d /= norm);
    }
}
