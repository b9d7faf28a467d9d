use std::path::Path;

use stencil_image::{Image, ImageSize};

use crate::error::IoError;

/// Reads an image from the given file path and converts it to 8-bit grayscale.
///
/// The format is guessed from the file content, so the file extension is irrelevant.
/// Any format supported by the image crate is accepted; color images are converted to
/// luma.
///
/// # Arguments
///
/// * `file_path` - The path to a valid image file.
///
/// # Returns
///
/// A grayscale image with a single channel (mono8).
pub fn read_image_any_mono8(file_path: impl AsRef<Path>) -> Result<Image<u8, 1>, IoError> {
    let file_path = file_path.as_ref();

    // verify the file exists
    if !file_path.is_file() {
        return Err(IoError::FileDoesNotExist(file_path.to_path_buf()));
    }

    let img = image::ImageReader::open(file_path)?
        .with_guessed_format()?
        .decode()
        .map_err(IoError::ImageDecodeError)?;

    let size = ImageSize {
        width: img.width() as usize,
        height: img.height() as usize,
    };

    Ok(Image::new(size, img.into_luma8().into_raw())?)
}

/// Writes an RGB image to the given file path.
///
/// The encoder is chosen from the file extension (e.g. `jpg`, `png`, `bmp`).
///
/// # Arguments
///
/// * `file_path` - The destination path of the image.
/// * `image` - The image to encode.
pub fn write_image_rgb8(file_path: impl AsRef<Path>, image: &Image<u8, 3>) -> Result<(), IoError> {
    let file_path = file_path.as_ref();

    let format = image::ImageFormat::from_path(file_path)
        .map_err(|_| IoError::InvalidFileExtension(file_path.to_path_buf()))?;

    let buffer = image::RgbImage::from_raw(
        image.width() as u32,
        image.height() as u32,
        image.as_slice().to_vec(),
    )
    .ok_or_else(|| {
        IoError::ImageCreationError(stencil_image::ImageError::InvalidChannelShape(
            image.as_slice().len(),
            image.width() * image.height() * 3,
        ))
    })?;

    buffer
        .save_with_format(file_path, format)
        .map_err(IoError::ImageEncodeError)?;

    Ok(())
}

/// Whether images can be written with the given file extension, e.g. `jpg` or `png`.
pub fn is_writable_extension(extension: &str) -> bool {
    image::ImageFormat::from_extension(extension).is_some_and(|format| format.writing_enabled())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_rgb(width: usize, height: usize) -> Result<Image<u8, 3>, IoError> {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[(x * 16) as u8, (y * 16) as u8, 128]);
            }
        }
        Ok(Image::new([width, height].into(), data)?)
    }

    #[test]
    fn read_write_png() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("gradient.png");

        let image = gradient_rgb(8, 4)?;
        write_image_rgb8(&file_path, &image)?;
        assert!(file_path.exists(), "File does not exist: {:?}", file_path);

        let gray = read_image_any_mono8(&file_path)?;
        assert_eq!(gray.size(), ImageSize { width: 8, height: 4 });
        assert_eq!(gray.num_channels(), 1);
        Ok(())
    }

    #[test]
    fn read_ignores_extension() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let png_path = tmp_dir.path().join("image.png");
        write_image_rgb8(&png_path, &gradient_rgb(4, 4)?)?;

        // same bytes, misleading name
        let renamed = tmp_dir.path().join("image.dat");
        std::fs::rename(&png_path, &renamed)?;

        let gray = read_image_any_mono8(&renamed)?;
        assert_eq!(gray.width(), 4);
        Ok(())
    }

    #[test]
    fn read_missing_file() {
        let res = read_image_any_mono8("does/not/exist.png");
        assert!(matches!(res, Err(IoError::FileDoesNotExist(_))));
    }

    #[test]
    fn read_not_an_image() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("notes.txt");
        std::fs::write(&file_path, b"definitely not pixels")?;

        let res = read_image_any_mono8(&file_path);
        assert!(matches!(res, Err(IoError::ImageDecodeError(_))));
        Ok(())
    }

    #[test]
    fn write_unknown_extension() -> Result<(), IoError> {
        let tmp_dir = tempfile::tempdir()?;
        let file_path = tmp_dir.path().join("out.unknown");
        let res = write_image_rgb8(&file_path, &gradient_rgb(2, 2)?);
        assert!(matches!(res, Err(IoError::InvalidFileExtension(_))));
        Ok(())
    }

    #[test]
    fn writable_extensions() {
        assert!(is_writable_extension("jpg"));
        assert!(is_writable_extension("png"));
        assert!(!is_writable_extension("txt"));
        assert!(!is_writable_extension(""));
    }
}
