use rayon::prelude::*;
use stencil_image::{Image, ImageError};

/// Convert a grayscale image to an RGB image by replicating the channel.
///
/// # Arguments
///
/// * `src` - The input grayscale image.
/// * `dst` - The output RGB image.
///
/// Precondition: the input and output images must have the same size.
///
/// # Example
///
/// ```
/// use stencil_image::Image;
/// use stencil_imgproc::color::rgb_from_gray;
///
/// let image = Image::<u8, 1>::new([2, 1].into(), vec![10, 20]).unwrap();
/// let mut rgb = Image::<u8, 3>::from_size_val(image.size(), 0).unwrap();
///
/// rgb_from_gray(&image, &mut rgb).unwrap();
/// assert_eq!(rgb.as_slice(), &[10, 10, 10, 20, 20, 20]);
/// ```
pub fn rgb_from_gray<T>(src: &Image<T, 1>, dst: &mut Image<T, 3>) -> Result<(), ImageError>
where
    T: Copy + Send + Sync,
{
    if src.size() != dst.size() {
        return Err(ImageError::InvalidImageSize(
            src.cols(),
            src.rows(),
            dst.cols(),
            dst.rows(),
        ));
    }

    dst.as_slice_mut()
        .par_chunks_exact_mut(3)
        .zip(src.as_slice().par_iter())
        .for_each(|(dst_pixel, &src_pixel)| {
            dst_pixel[0] = src_pixel;
            dst_pixel[1] = src_pixel;
            dst_pixel[2] = src_pixel;
        });

    Ok(())
}

/// Convert an 8-bit grayscale image to floating point in the range `[0, 1]`.
pub fn normalize_u8_to_f32(src: &Image<u8, 1>) -> Result<Image<f32, 1>, ImageError> {
    src.cast_and_scale(1.0 / 255.0)
}
