use rayon::prelude::*;
use stencil_image::{Image, ImageError};

use crate::filter::{gaussian_blur, kernels};

/// Computes the Harris corner response of a grayscale image.
///
/// The structure tensor is built from 3x3 Sobel derivatives, smoothed with a 7x7
/// gaussian window and scored as `max(0, det - k * trace^2)`. The outermost rows and
/// columns are left at zero.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W).
/// * `dst` - The destination image with shape (H, W).
/// * `k` - The Harris sensitivity parameter, typically `0.04`.
pub fn harris_response(
    src: &Image<f32, 1>,
    dst: &mut Image<f32, 1>,
    k: f32,
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    let (rows, cols) = (src.rows(), src.cols());
    if rows < 3 || cols < 3 {
        dst.as_slice_mut().iter_mut().for_each(|v| *v = 0.0);
        return Ok(());
    }

    let src_data = src.as_slice();
    let mut dx2_data = vec![0.0f32; src_data.len()];
    let mut dy2_data = vec![0.0f32; src_data.len()];
    let mut dxy_data = vec![0.0f32; src_data.len()];

    let (deriv, smooth) = kernels::sobel_kernel_1d();

    dx2_data
        .par_chunks_exact_mut(cols)
        .zip(dy2_data.par_chunks_exact_mut(cols))
        .zip(dxy_data.par_chunks_exact_mut(cols))
        .enumerate()
        .for_each(|(row_idx, ((dx2_row, dy2_row), dxy_row))| {
            if row_idx == 0 || row_idx == rows - 1 {
                return;
            }

            for col_idx in 1..cols - 1 {
                let mut dx = 0.0f32;
                let mut dy = 0.0f32;
                for (i, (&d_i, &s_i)) in deriv.iter().zip(smooth.iter()).enumerate() {
                    for (j, (&d_j, &s_j)) in deriv.iter().zip(smooth.iter()).enumerate() {
                        let v = src_data[(row_idx + i - 1) * cols + col_idx + j - 1];
                        dx += v * s_i * d_j;
                        dy += v * d_i * s_j;
                    }
                }

                // filter normalization
                dx /= 8.0;
                dy /= 8.0;

                dx2_row[col_idx] = dx * dx;
                dy2_row[col_idx] = dy * dy;
                dxy_row[col_idx] = dx * dy;
            }
        });

    let size = src.size();
    let mut dx2_blurred = Image::<f32, 1>::from_size_val(size, 0.0)?;
    let mut dy2_blurred = Image::<f32, 1>::from_size_val(size, 0.0)?;
    let mut dxy_blurred = Image::<f32, 1>::from_size_val(size, 0.0)?;

    gaussian_blur(&Image::new(size, dx2_data)?, &mut dx2_blurred, (7, 7), (1.0, 1.0))?;
    gaussian_blur(&Image::new(size, dy2_data)?, &mut dy2_blurred, (7, 7), (1.0, 1.0))?;
    gaussian_blur(&Image::new(size, dxy_data)?, &mut dxy_blurred, (7, 7), (1.0, 1.0))?;

    dst.as_slice_mut()
        .par_chunks_exact_mut(cols)
        .zip(dx2_blurred.as_slice().par_chunks_exact(cols))
        .zip(dy2_blurred.as_slice().par_chunks_exact(cols))
        .zip(dxy_blurred.as_slice().par_chunks_exact(cols))
        .enumerate()
        .for_each(|(row_idx, (((dst_row, dx2_row), dy2_row), dxy_row))| {
            for col_idx in 0..cols {
                if row_idx == 0 || row_idx == rows - 1 || col_idx == 0 || col_idx == cols - 1 {
                    dst_row[col_idx] = 0.0;
                    continue;
                }

                let (a, b, c) = (dx2_row[col_idx], dy2_row[col_idx], dxy_row[col_idx]);
                let det = a * b - c * c;
                let trace = a + b;
                dst_row[col_idx] = f32::max(0.0, det - k * trace * trace);
            }
        });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harris_response_flat() -> Result<(), ImageError> {
        let src = Image::<f32, 1>::from_size_val([8, 8].into(), 0.3)?;
        let mut dst = Image::<f32, 1>::from_size_val(src.size(), 1.0)?;
        harris_response(&src, &mut dst, 0.04)?;
        assert!(dst.as_slice().iter().all(|&v| v == 0.0));
        Ok(())
    }

    #[test]
    fn test_harris_response_corner() -> Result<(), ImageError> {
        // bright square in the bottom-right quadrant, corner at (6, 6)
        let size = [12, 12].into();
        let mut src = Image::<f32, 1>::from_size_val(size, 0.0)?;
        for y in 6..12 {
            for x in 6..12 {
                src.as_slice_mut()[y * 12 + x] = 1.0;
            }
        }

        let mut dst = Image::<f32, 1>::from_size_val(size, 0.0)?;
        harris_response(&src, &mut dst, 0.04)?;

        // the corner responds more than a straight edge or a flat area
        let corner = dst.get_pixel(6, 6, 0)?;
        let edge = dst.get_pixel(6, 10, 0)?;
        let flat = dst.get_pixel(2, 2, 0)?;
        assert!(corner > edge, "corner {corner} edge {edge}");
        assert!(corner > flat);
        Ok(())
    }
}
