use std::path::PathBuf;

/// Errors raised while reading or writing image files.
#[derive(thiserror::Error, Debug)]
pub enum IoError {
    /// The path does not point to a regular file.
    #[error("No such image file: {0}")]
    FileDoesNotExist(PathBuf),

    /// No encoder is known for the extension of the path.
    #[error("Unsupported image extension: {0}")]
    InvalidFileExtension(PathBuf),

    /// The file cannot be opened or read.
    #[error("File access failed: {0}")]
    FileError(#[from] std::io::Error),

    /// The decoded pixels do not form a valid image.
    #[error("Invalid decoded image: {0}")]
    ImageCreationError(#[from] stencil_image::ImageError),

    /// The file content is not a decodable image.
    #[error("Cannot decode image: {0}")]
    ImageDecodeError(#[source] image::ImageError),

    /// The image cannot be encoded or saved.
    #[error("Cannot encode image: {0}")]
    ImageEncodeError(#[source] image::ImageError),
}
