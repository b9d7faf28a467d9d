use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stencil_imgproc::{features::ExtractorConfig, matching::MatchConfig};

use crate::error::BatchError;

/// Configuration of a batch run.
///
/// Every field has a default, so a JSON file only needs to name what differs:
///
/// ```json
/// {
///     "template_dir": "template",
///     "target_dir": "archive",
///     "ratio_threshold": 0.75
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Template images, slot `i + 1` for the path at index `i`.
    pub templates: Vec<PathBuf>,
    /// Directory whose files are appended to `templates`, sorted by file name.
    pub template_dir: Option<PathBuf>,
    /// Directory holding the target images. Every regular file is a target.
    pub target_dir: PathBuf,
    /// Directory receiving the artifacts, created if absent.
    pub output_dir: PathBuf,
    /// Ratio test threshold, in `(0, 1]`.
    pub ratio_threshold: f32,
    /// Neighbors searched per template descriptor, at least 2.
    pub k: usize,
    /// Keep at most one match per target descriptor.
    pub unique_targets: bool,
    /// Extension, and therefore encoding, of the artifacts.
    pub output_extension: String,
    /// Targets processed concurrently. `1` runs sequentially.
    pub num_workers: usize,
    /// Draw every detected keypoint on the artifacts.
    pub draw_keypoints: bool,
    /// Feature extraction parameters.
    pub extractor: ExtractorConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let matching = MatchConfig::default();
        Self {
            templates: Vec::new(),
            template_dir: None,
            target_dir: PathBuf::from("archive"),
            output_dir: PathBuf::from("results"),
            ratio_threshold: matching.ratio_threshold,
            k: matching.k,
            unique_targets: matching.unique_targets,
            output_extension: "jpg".to_string(),
            num_workers: 1,
            draw_keypoints: true,
            extractor: ExtractorConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Read a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BatchError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| BatchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }

    /// The matcher parameters of the run.
    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            k: self.k,
            ratio_threshold: self.ratio_threshold,
            unique_targets: self.unique_targets,
        }
    }

    /// Check the values that would otherwise fail late or silently.
    pub fn validate(&self) -> Result<(), BatchError> {
        if !(self.ratio_threshold > 0.0 && self.ratio_threshold <= 1.0) {
            return Err(BatchError::InvalidConfig(format!(
                "ratio_threshold must be in (0, 1], got {}",
                self.ratio_threshold
            )));
        }

        if self.k < 2 {
            return Err(BatchError::InvalidConfig(format!(
                "k must be at least 2 for the ratio test, got {}",
                self.k
            )));
        }

        if self.num_workers == 0 {
            return Err(BatchError::InvalidConfig(
                "num_workers must be at least 1".to_string(),
            ));
        }

        if !stencil_io::functional::is_writable_extension(&self.output_extension) {
            return Err(BatchError::InvalidConfig(format!(
                "cannot write images with extension {:?}",
                self.output_extension
            )));
        }

        if self.extractor.n_octaves == 0 || self.extractor.patch_radius == 0 {
            return Err(BatchError::InvalidConfig(
                "extractor needs at least one octave and a non-zero patch radius".to_string(),
            ));
        }

        if self.extractor.blur_sigma <= 0.0 {
            return Err(BatchError::InvalidConfig(format!(
                "extractor blur_sigma must be positive, got {}",
                self.extractor.blur_sigma
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() -> Result<(), BatchError> {
        let config = BatchConfig::default();
        config.validate()?;
        assert_eq!(config.ratio_threshold, 0.7);
        assert_eq!(config.k, 2);
        assert_eq!(config.output_extension, "jpg");
        assert_eq!(config.num_workers, 1);
        Ok(())
    }

    #[test]
    fn test_validate_rejects() {
        let invalid = [
            BatchConfig {
                ratio_threshold: 0.0,
                ..Default::default()
            },
            BatchConfig {
                ratio_threshold: 1.5,
                ..Default::default()
            },
            BatchConfig {
                ratio_threshold: f32::NAN,
                ..Default::default()
            },
            BatchConfig {
                k: 1,
                ..Default::default()
            },
            BatchConfig {
                num_workers: 0,
                ..Default::default()
            },
            BatchConfig {
                output_extension: String::new(),
                ..Default::default()
            },
            BatchConfig {
                output_extension: "txt".to_string(),
                ..Default::default()
            },
        ];

        for config in invalid {
            assert!(
                matches!(config.validate(), Err(BatchError::InvalidConfig(_))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn test_partial_json() -> Result<(), BatchError> {
        let config: BatchConfig = serde_json::from_str(
            r#"{
                "templates": ["a.png", "b.png"],
                "target_dir": "targets",
                "ratio_threshold": 0.8,
                "extractor": { "max_keypoints": 200 }
            }"#,
        )?;

        assert_eq!(config.templates.len(), 2);
        assert_eq!(config.target_dir, PathBuf::from("targets"));
        assert_eq!(config.output_dir, PathBuf::from("results"));
        assert_eq!(config.ratio_threshold, 0.8);
        assert_eq!(config.extractor.max_keypoints, 200);
        assert_eq!(config.extractor.n_octaves, 3);
        Ok(())
    }

    #[test]
    fn test_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("stencil.json");
        std::fs::write(&path, r#"{ "num_workers": 4, "output_extension": "png" }"#)?;

        let config = BatchConfig::from_file(&path)?;
        assert_eq!(config.num_workers, 4);
        assert_eq!(config.output_extension, "png");

        let missing = BatchConfig::from_file(dir.path().join("missing.json"));
        assert!(matches!(missing, Err(BatchError::ConfigRead { .. })));
        Ok(())
    }
}
