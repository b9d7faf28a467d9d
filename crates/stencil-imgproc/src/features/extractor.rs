use rayon::prelude::*;
use stencil_image::{Image, ImageError};

use super::descriptor::{compute_descriptor, dominant_orientation, Descriptor, GradientLevel};
use super::responses::harris_response;
use crate::color::normalize_u8_to_f32;
use crate::filter::{gaussian_blur, kernels, spatial_gradient};
use crate::pyramid::pyrdown;

/// A salient image location.
///
/// Coordinates are expressed in pixels of the full resolution image, regardless of the
/// pyramid octave the keypoint was detected in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Keypoint {
    /// Column of the keypoint.
    pub x: f32,
    /// Row of the keypoint.
    pub y: f32,
    /// Half-size of the described patch in full resolution pixels.
    pub scale: f32,
    /// Dominant gradient orientation in radians, in `[0, 2pi)`.
    pub orientation: f32,
    /// Harris corner response.
    pub response: f32,
    /// Pyramid octave, `0` being the full resolution.
    pub octave: usize,
}

/// Keypoints and their descriptors, index-aligned.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Features {
    /// Detected keypoints, sorted by decreasing response.
    pub keypoints: Vec<Keypoint>,
    /// One descriptor per keypoint.
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    /// Number of keypoints.
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    /// Whether no keypoint was detected.
    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// Parameters of the [`FeatureExtractor`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExtractorConfig {
    /// Maximum number of keypoints kept over all octaves.
    pub max_keypoints: usize,
    /// Number of pyramid octaves to search.
    pub n_octaves: usize,
    /// Harris sensitivity parameter.
    pub harris_k: f32,
    /// Minimum response relative to the strongest response of the octave.
    pub response_threshold: f32,
    /// Sigma of the gaussian applied to the full resolution image.
    pub blur_sigma: f32,
    /// Half-size of the described patch in octave pixels.
    pub patch_radius: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_keypoints: 1000,
            n_octaves: 3,
            harris_k: 0.04,
            response_threshold: 0.01,
            blur_sigma: 1.0,
            patch_radius: 8,
        }
    }
}

// responses below this are rounding noise of flat regions
const MIN_RESPONSE: f32 = 1e-8;

#[derive(Clone, Copy, Debug)]
struct Candidate {
    octave: usize,
    row: usize,
    col: usize,
    response: f32,
}

struct Octave {
    magnitude: Image<f32, 1>,
    orientation: Image<f32, 1>,
}

/// Multi-octave Harris detector with gradient-histogram descriptors.
///
/// The extractor is deterministic: the same pixels always produce the same keypoints
/// in the same order with the same descriptors.
#[derive(Clone, Debug, Default)]
pub struct FeatureExtractor {
    config: ExtractorConfig,
}

impl FeatureExtractor {
    /// Create an extractor with the given parameters.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// The parameters of the extractor.
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Pixels excluded at each border so the rotated descriptor window stays inside.
    fn border(&self) -> usize {
        (self.config.patch_radius as f32 * std::f32::consts::SQRT_2).ceil() as usize + 1
    }

    /// Detect keypoints and compute their descriptors.
    ///
    /// # Arguments
    ///
    /// * `image` - The grayscale source image.
    ///
    /// # Returns
    ///
    /// The keypoints sorted by decreasing response and their descriptors. Images too
    /// small to hold a single descriptor window produce empty features.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::EmptyImage`] if the image has no pixels.
    pub fn extract(&self, image: &Image<u8, 1>) -> Result<Features, ImageError> {
        if image.is_empty() {
            return Err(ImageError::EmptyImage(image.width(), image.height()));
        }

        let src = normalize_u8_to_f32(image)?;
        let mut level = Image::<f32, 1>::from_size_val(src.size(), 0.0)?;
        let kernel_size = kernels::gaussian_kernel_size(self.config.blur_sigma);
        gaussian_blur(
            &src,
            &mut level,
            (kernel_size, kernel_size),
            (self.config.blur_sigma, self.config.blur_sigma),
        )?;

        let border = self.border();
        let min_side = 2 * border + 1;

        let mut octaves = Vec::with_capacity(self.config.n_octaves);
        let mut candidates = Vec::new();

        for octave in 0..self.config.n_octaves {
            if level.width() < min_side || level.height() < min_side {
                break;
            }

            let mut response = Image::<f32, 1>::from_size_val(level.size(), 0.0)?;
            harris_response(&level, &mut response, self.config.harris_k)?;
            candidates.extend(self.local_maxima(&response, octave, border));

            let mut magnitude = Image::<f32, 1>::from_size_val(level.size(), 0.0)?;
            let mut orientation = Image::<f32, 1>::from_size_val(level.size(), 0.0)?;
            spatial_gradient(&level, &mut magnitude, &mut orientation)?;
            octaves.push(Octave {
                magnitude,
                orientation,
            });

            if octave + 1 < self.config.n_octaves {
                match pyrdown(&level) {
                    Ok(next) => level = next,
                    Err(ImageError::EmptyImage(..)) => break,
                    Err(e) => return Err(e),
                }
            }
        }

        // strongest first, ties resolved by position for a stable order
        candidates.sort_by(|a, b| {
            b.response
                .total_cmp(&a.response)
                .then(a.octave.cmp(&b.octave))
                .then(a.row.cmp(&b.row))
                .then(a.col.cmp(&b.col))
        });
        candidates.truncate(self.config.max_keypoints);

        let radius = self.config.patch_radius;
        let (keypoints, descriptors): (Vec<_>, Vec<_>) = candidates
            .par_iter()
            .map(|c| {
                let octave = &octaves[c.octave];
                let gradients = GradientLevel {
                    magnitude: &octave.magnitude,
                    orientation: &octave.orientation,
                };
                let angle = dominant_orientation(&gradients, c.col, c.row, radius);
                let descriptor = compute_descriptor(&gradients, c.col, c.row, angle, radius);

                let factor = (1usize << c.octave) as f32;
                let keypoint = Keypoint {
                    x: c.col as f32 * factor,
                    y: c.row as f32 * factor,
                    scale: radius as f32 * factor,
                    orientation: angle,
                    response: c.response,
                    octave: c.octave,
                };
                (keypoint, descriptor)
            })
            .unzip();

        log::debug!(
            "extracted {} keypoints from a {} image over {} octaves",
            keypoints.len(),
            image.size(),
            octaves.len()
        );

        Ok(Features {
            keypoints,
            descriptors,
        })
    }

    /// 3x3 non-maximum suppression with a threshold relative to the octave maximum.
    ///
    /// On plateaus only the first pixel in raster order survives.
    fn local_maxima(
        &self,
        response: &Image<f32, 1>,
        octave: usize,
        border: usize,
    ) -> Vec<Candidate> {
        let (rows, cols) = (response.rows(), response.cols());
        let data = response.as_slice();

        let max_response = data.iter().copied().fold(0.0f32, f32::max);
        if max_response <= MIN_RESPONSE {
            return Vec::new();
        }
        let threshold = (self.config.response_threshold * max_response).max(MIN_RESPONSE);

        (border..rows - border)
            .into_par_iter()
            .flat_map_iter(|row| {
                (border..cols - border).filter_map(move |col| {
                    let v = data[row * cols + col];
                    if v <= threshold {
                        return None;
                    }

                    for dy in 0..3 {
                        for dx in 0..3 {
                            if dy == 1 && dx == 1 {
                                continue;
                            }
                            let n = data[(row + dy - 1) * cols + col + dx - 1];
                            let before = dy == 0 || (dy == 1 && dx == 0);
                            if n > v || (before && n == v) {
                                return None;
                            }
                        }
                    }

                    Some(Candidate {
                        octave,
                        row,
                        col,
                        response: v,
                    })
                })
            })
            .collect()
    }
}
