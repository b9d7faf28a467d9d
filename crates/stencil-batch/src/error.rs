use std::path::PathBuf;

use stencil_image::ImageError;
use stencil_io::IoError;

/// Errors that abort a run before or while targets are scheduled.
#[derive(thiserror::Error, Debug)]
pub enum BatchError {
    /// The configuration holds an invalid value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration file cannot be read.
    #[error("Failed to read the config file {path:?}")]
    ConfigRead {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for a [`crate::BatchConfig`].
    #[error("Failed to parse the config file")]
    ConfigParse(#[from] serde_json::Error),

    /// Neither template paths nor a template directory yield a template.
    #[error("No template images configured")]
    NoTemplates,

    /// A template cannot be loaded or described.
    #[error("Failed to load template {slot} from {path:?}")]
    TemplateLoad {
        /// 1-based slot of the template.
        slot: usize,
        /// Path of the template image.
        path: PathBuf,
        /// Why the template could not be loaded.
        #[source]
        source: LoadError,
    },

    /// A template or target directory cannot be listed.
    #[error("Failed to list directory {path:?}")]
    Directory {
        /// Path of the directory.
        path: PathBuf,
        /// The underlying traversal error.
        #[source]
        source: walkdir::Error,
    },

    /// The output directory cannot be created.
    #[error("Failed to create the output directory {path:?}")]
    OutputDir {
        /// Path of the output directory.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The worker pool cannot be started.
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Errors while turning an image file into features.
#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    /// The file is missing or cannot be decoded.
    #[error(transparent)]
    Decode(#[from] IoError),

    /// The decoded image cannot be processed.
    #[error(transparent)]
    Extract(#[from] ImageError),
}

/// Errors while rendering or writing one artifact.
#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    /// The composite image cannot be built.
    #[error(transparent)]
    Render(#[from] ImageError),

    /// The composite image cannot be encoded or written.
    #[error(transparent)]
    Write(#[from] IoError),
}
