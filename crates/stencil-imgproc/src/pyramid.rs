use crate::filter::separable_filter;
use stencil_image::{Image, ImageError, ImageSize};

fn get_pyramid_gaussian_kernel() -> [f32; 5] {
    // binomial approximation of a gaussian with sigma ~1
    [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0]
}

/// Blur an image and then downsample it by a factor of two.
///
/// The output keeps the even rows and columns of the blurred input, so the pixel at
/// `(x, y)` of the output corresponds to `(2x, 2y)` of the input.
///
/// # Arguments
///
/// * `src` - The source image to be downsampled.
///
/// # Returns
///
/// The downsampled image with size `(W / 2, H / 2)`.
///
/// # Errors
///
/// Returns [`ImageError::EmptyImage`] if the downsampled image would have no pixels.
///
/// # Example
///
/// ```
/// use stencil_image::Image;
/// use stencil_imgproc::pyramid::pyrdown;
///
/// let image = Image::<f32, 1>::from_size_val([8, 6].into(), 1.0).unwrap();
/// let down = pyrdown(&image).unwrap();
///
/// assert_eq!(down.width(), 4);
/// assert_eq!(down.height(), 3);
/// ```
pub fn pyrdown<const C: usize>(src: &Image<f32, C>) -> Result<Image<f32, C>, ImageError> {
    let dst_size = ImageSize {
        width: src.width() / 2,
        height: src.height() / 2,
    };

    if dst_size.width == 0 || dst_size.height == 0 {
        return Err(ImageError::EmptyImage(dst_size.width, dst_size.height));
    }

    let kernel = get_pyramid_gaussian_kernel();
    let mut blurred = Image::<f32, C>::from_size_val(src.size(), 0.0)?;
    separable_filter(src, &mut blurred, &kernel, &kernel)?;

    let src_data = blurred.as_slice();
    let src_stride = src.width() * C;

    let mut data = Vec::with_capacity(dst_size.width * dst_size.height * C);
    for y in 0..dst_size.height {
        let row = &src_data[2 * y * src_stride..(2 * y + 1) * src_stride];
        for x in 0..dst_size.width {
            data.extend_from_slice(&row[2 * x * C..(2 * x + 1) * C]);
        }
    }

    Image::new(dst_size, data)
}
