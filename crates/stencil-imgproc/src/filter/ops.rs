use rayon::prelude::*;
use stencil_image::{Image, ImageError};

use super::{kernels, separable_filter};

/// Blur an image using a gaussian blur filter
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_size` - The size of the kernel (kernel_x, kernel_y).
/// * `sigma` - The sigma of the gaussian kernel.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn gaussian_blur<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel_size: (usize, usize),
    sigma: (f32, f32),
) -> Result<(), ImageError> {
    if sigma.0 <= 0.0 || sigma.1 <= 0.0 {
        return Err(ImageError::InvalidParameter(format!(
            "gaussian sigma must be positive, got {sigma:?}"
        )));
    }
    let kernel_x = kernels::gaussian_kernel_1d(kernel_size.0, sigma.0);
    let kernel_y = kernels::gaussian_kernel_1d(kernel_size.1, sigma.1);
    separable_filter(src, dst, &kernel_x, &kernel_y)?;
    Ok(())
}

/// Compute the spatial gradient of a grayscale image using central differences.
///
/// The orientation is measured in radians in `(-pi, pi]` with the y axis pointing down.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, 1).
/// * `magnitude` - The destination gradient magnitude with shape (H, W, 1).
/// * `orientation` - The destination gradient orientation with shape (H, W, 1).
pub fn spatial_gradient(
    src: &Image<f32, 1>,
    magnitude: &mut Image<f32, 1>,
    orientation: &mut Image<f32, 1>,
) -> Result<(), ImageError> {
    for dst in [&*magnitude, &*orientation] {
        if src.size() != dst.size() {
            return Err(ImageError::InvalidImageSize(
                src.cols(),
                src.rows(),
                dst.cols(),
                dst.rows(),
            ));
        }
    }

    let (rows, cols) = (src.rows(), src.cols());
    if rows == 0 || cols == 0 {
        return Ok(());
    }

    let src_data = src.as_slice();

    magnitude
        .as_slice_mut()
        .par_chunks_exact_mut(cols)
        .zip(orientation.as_slice_mut().par_chunks_exact_mut(cols))
        .enumerate()
        .for_each(|(r, (mag_row, ori_row))| {
            let r_prev = r.saturating_sub(1);
            let r_next = (r + 1).min(rows - 1);
            for c in 0..cols {
                let c_prev = c.saturating_sub(1);
                let c_next = (c + 1).min(cols - 1);

                let dx = src_data[r * cols + c_next] - src_data[r * cols + c_prev];
                let dy = src_data[r_next * cols + c] - src_data[r_prev * cols + c];

                mag_row[c] = (dx * dx + dy * dy).sqrt();
                ori_row[c] = dy.atan2(dx);
            }
        });

    Ok(())
}
