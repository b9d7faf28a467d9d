use rayon::prelude::*;
use stencil_image::{Image, ImageError};

/// Clamp a signed index into `[0, len)`, replicating the border pixels.
#[inline]
fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// Apply a separable filter to an image.
///
/// The horizontal kernel is applied first, followed by the vertical kernel. Pixels
/// outside the image are replicated from the nearest border pixel.
///
/// # Arguments
///
/// * `src` - The source image with shape (H, W, C).
/// * `dst` - The destination image with shape (H, W, C).
/// * `kernel_x` - The horizontal kernel.
/// * `kernel_y` - The vertical kernel.
///
/// PRECONDITION: `src` and `dst` must have the same shape.
pub fn separable_filter<const C: usize>(
    src: &Image<f32, C>,
    dst: &mut Image<f32, C>,
    kernel_x: &[f32],
    kernel_y: &[f32],
) -> Result<(), ImageError> {
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    if kernel_x.is_empty() || kernel_y.is_empty() {
        return Err(ImageError::InvalidParameter(
            "filter kernels must not be empty".to_string(),
        ));
    }

    let (rows, cols) = (src.rows(), src.cols());
    if rows == 0 || cols == 0 {
        return Ok(());
    }

    let half_x = (kernel_x.len() / 2) as isize;
    let half_y = (kernel_y.len() / 2) as isize;
    let row_stride = cols * C;

    let src_data = src.as_slice();
    let mut temp = vec![0.0f32; src_data.len()];

    // horizontal pass
    temp.par_chunks_exact_mut(row_stride)
        .zip(src_data.par_chunks_exact(row_stride))
        .for_each(|(temp_row, src_row)| {
            for c in 0..cols {
                for ch in 0..C {
                    let mut acc = 0.0f32;
                    for (i, &k) in kernel_x.iter().enumerate() {
                        let x = clamp_index(c as isize + i as isize - half_x, cols);
                        acc += src_row[x * C + ch] * k;
                    }
                    temp_row[c * C + ch] = acc;
                }
            }
        });

    // vertical pass
    dst.as_slice_mut()
        .par_chunks_exact_mut(row_stride)
        .enumerate()
        .for_each(|(r, dst_row)| {
            for (idx, dst_pixel) in dst_row.iter_mut().enumerate() {
                let mut acc = 0.0f32;
                for (i, &k) in kernel_y.iter().enumerate() {
                    let y = clamp_index(r as isize + i as isize - half_y, rows);
                    acc += temp[y * row_stride + idx] * k;
                }
                *dst_pixel = acc;
            }
        });

    Ok(())
}
