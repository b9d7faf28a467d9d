use std::path::{Path, PathBuf};

use rayon::prelude::*;
use stencil_image::Image;
use stencil_imgproc::{
    features::{FeatureExtractor, Features},
    matching::{match_descriptors, MatchConfig},
};

use crate::config::BatchConfig;
use crate::error::{BatchError, ExportError, LoadError};
use crate::outcome::{BatchReport, MatchSet, PairOutcome, TargetOutcome};
use crate::render::{artifact_name, export, render_matches};

/// A grayscale image and the features extracted from it.
#[derive(Clone, Debug)]
pub struct FeatureImage {
    /// The grayscale pixels.
    pub image: Image<u8, 1>,
    /// Keypoints and descriptors of the image.
    pub features: Features,
}

impl FeatureImage {
    /// Decode an image file as grayscale and extract its features.
    pub fn load(path: &Path, extractor: &FeatureExtractor) -> Result<Self, LoadError> {
        let image = stencil_io::functional::read_image_any_mono8(path)?;
        let features = extractor.extract(&image)?;
        Ok(Self { image, features })
    }
}

/// A template image bound to its slot.
#[derive(Clone, Debug)]
pub struct Template {
    /// 1-based position of the template in the run.
    pub slot: usize,
    /// Path the template was loaded from.
    pub path: PathBuf,
    /// The template pixels and features.
    pub view: FeatureImage,
}

/// The ordered, read-only templates of a run.
#[derive(Clone, Debug, Default)]
pub struct TemplateSet {
    templates: Vec<Template>,
}

impl TemplateSet {
    /// Load every template of the configuration.
    ///
    /// Templates listed in `templates` come first, followed by the files of
    /// `template_dir` sorted by file name. A template that cannot be loaded aborts the
    /// whole set.
    pub fn load(config: &BatchConfig, extractor: &FeatureExtractor) -> Result<Self, BatchError> {
        let mut paths = config.templates.clone();
        if let Some(dir) = &config.template_dir {
            paths.extend(list_files(dir)?);
        }
        Self::from_paths(&paths, extractor)
    }

    /// Load templates from explicit paths, slot `i + 1` for `paths[i]`.
    pub fn from_paths(
        paths: &[PathBuf],
        extractor: &FeatureExtractor,
    ) -> Result<Self, BatchError> {
        if paths.is_empty() {
            return Err(BatchError::NoTemplates);
        }

        let templates = paths
            .iter()
            .enumerate()
            .map(|(i, path)| -> Result<Template, BatchError> {
                let slot = i + 1;
                let view = FeatureImage::load(path, extractor).map_err(|source| {
                    BatchError::TemplateLoad {
                        slot,
                        path: path.clone(),
                        source,
                    }
                })?;
                log::info!(
                    "Loaded template {} from {} with {} keypoints",
                    slot,
                    path.display(),
                    view.features.len()
                );
                Ok(Template {
                    slot,
                    path: path.clone(),
                    view,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { templates })
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the set holds no template.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates in slot order.
    pub fn iter(&self) -> std::slice::Iter<'_, Template> {
        self.templates.iter()
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| BatchError::Directory {
            path: dir.to_path_buf(),
            source,
        })?;
        // symlinks count when they resolve to a regular file
        if entry.path().is_file() {
            paths.push(entry.into_path());
        }
    }
    Ok(paths)
}

/// List the targets of a directory.
///
/// Every regular file directly inside `dir` is a target, whatever its extension,
/// including symlinks to regular files; subdirectories are ignored. Targets are sorted
/// by file name.
pub fn discover_targets(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    list_files(dir)
}

/// A target waiting to be processed.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetJob {
    /// Position of the target in discovery order.
    pub index: usize,
    /// Path of the target image.
    pub path: PathBuf,
}

/// One (template, target) unit of work inside a target job.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairJob {
    /// 1-based slot of the template.
    pub slot: usize,
}

/// Runs the templates against the targets.
///
/// Templates are described once when the orchestrator is built; each target is
/// described once and matched against every template in slot order.
pub struct Orchestrator {
    config: BatchConfig,
    extractor: FeatureExtractor,
    match_config: MatchConfig,
    templates: TemplateSet,
}

impl Orchestrator {
    /// Validate the configuration and load the templates.
    ///
    /// Nothing is written until [`Orchestrator::run`] is called, so a template failure
    /// leaves the output directory untouched.
    pub fn new(config: BatchConfig) -> Result<Self, BatchError> {
        config.validate()?;

        let extractor = FeatureExtractor::new(config.extractor.clone());
        let templates = TemplateSet::load(&config, &extractor)?;
        let match_config = config.match_config();

        Ok(Self {
            config,
            extractor,
            match_config,
            templates,
        })
    }

    /// The loaded templates.
    pub fn templates(&self) -> &TemplateSet {
        &self.templates
    }

    /// Process every target of the target directory.
    ///
    /// Targets that cannot be loaded and artifacts that cannot be written are reported
    /// in the returned [`BatchReport`] without stopping the run.
    pub fn run(&self) -> Result<BatchReport, BatchError> {
        let jobs: Vec<TargetJob> = discover_targets(&self.config.target_dir)?
            .into_iter()
            .enumerate()
            .map(|(index, path)| TargetJob { index, path })
            .collect();

        log::info!(
            "Matching {} templates against {} targets",
            self.templates.len(),
            jobs.len()
        );

        std::fs::create_dir_all(&self.config.output_dir).map_err(|source| {
            BatchError::OutputDir {
                path: self.config.output_dir.clone(),
                source,
            }
        })?;

        let outcomes = if self.config.num_workers > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.num_workers)
                .build()?;
            // indexed collect keeps the discovery order
            pool.install(|| {
                jobs.par_iter()
                    .map(|job| self.process_target(job))
                    .collect::<Vec<_>>()
            })
        } else {
            jobs.iter().map(|job| self.process_target(job)).collect()
        };

        let report = BatchReport { outcomes };
        log::debug!("Done: {}", report.summary());
        Ok(report)
    }

    /// Load one target and match it against every template.
    pub fn process_target(&self, job: &TargetJob) -> TargetOutcome {
        let target = match FeatureImage::load(&job.path, &self.extractor) {
            Ok(target) => target,
            Err(error) => {
                log::warn!(
                    "Failed to load target image {}: {}",
                    job.path.display(),
                    error
                );
                return TargetOutcome::Skipped {
                    path: job.path.clone(),
                    error,
                };
            }
        };

        log::debug!(
            "Target {} ({}) has {} keypoints",
            job.index,
            job.path.display(),
            target.features.len()
        );

        let pairs = self
            .templates
            .iter()
            .map(|template| {
                self.process_pair(
                    PairJob {
                        slot: template.slot,
                    },
                    template,
                    &job.path,
                    &target,
                )
            })
            .collect();

        TargetOutcome::Processed {
            path: job.path.clone(),
            descriptors: target.features.len(),
            pairs,
        }
    }

    fn process_pair(
        &self,
        job: PairJob,
        template: &Template,
        target_path: &Path,
        target: &FeatureImage,
    ) -> PairOutcome {
        let matches = match_descriptors(
            &template.view.features.descriptors,
            &target.features.descriptors,
            &self.match_config,
        );
        let match_set = MatchSet {
            slot: job.slot,
            target: target_path.to_path_buf(),
            matches,
        };

        let path = self.config.output_dir.join(artifact_name(
            target_path,
            job.slot,
            &self.config.output_extension,
        ));

        let result = render_matches(
            &template.view,
            target,
            &match_set,
            self.config.draw_keypoints,
        )
        .map_err(ExportError::from)
        .and_then(|artifact| export(&artifact, &path))
        .map(|()| path.clone());

        match &result {
            Ok(path) => log::info!(
                "Saved match result: {} ({} matches)",
                path.display(),
                match_set.len()
            ),
            Err(e) => log::error!("Failed to save match result {}: {}", path.display(), e),
        }

        PairOutcome {
            slot: job.slot,
            matches: match_set.len(),
            result,
        }
    }
}

/// Build an [`Orchestrator`] from the configuration and run it.
pub fn run(config: BatchConfig) -> Result<BatchReport, BatchError> {
    Orchestrator::new(config)?.run()
}
