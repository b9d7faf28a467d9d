use std::path::{Path, PathBuf};

use stencil_imgproc::matching::Match;

use crate::error::{ExportError, LoadError};

/// The accepted matches of one template against one target.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchSet {
    /// 1-based slot of the template.
    pub slot: usize,
    /// Path of the target image.
    pub target: PathBuf,
    /// Matches sorted by template descriptor index.
    pub matches: Vec<Match>,
}

impl MatchSet {
    /// Number of accepted matches.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Whether no correspondence survived.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Result of one (template, target) pair.
#[derive(Debug)]
pub struct PairOutcome {
    /// 1-based slot of the template.
    pub slot: usize,
    /// Number of accepted matches.
    pub matches: usize,
    /// Path of the written artifact, or why it could not be written.
    pub result: Result<PathBuf, ExportError>,
}

/// Result of one target.
#[derive(Debug)]
pub enum TargetOutcome {
    /// The target could not be loaded, no artifact was produced for it.
    Skipped {
        /// Path of the target image.
        path: PathBuf,
        /// Why the target was skipped.
        error: LoadError,
    },
    /// The target was matched against every template.
    Processed {
        /// Path of the target image.
        path: PathBuf,
        /// Number of descriptors extracted from the target.
        descriptors: usize,
        /// One outcome per template, in slot order.
        pairs: Vec<PairOutcome>,
    },
}

impl TargetOutcome {
    /// Path of the target image.
    pub fn path(&self) -> &Path {
        match self {
            TargetOutcome::Skipped { path, .. } => path,
            TargetOutcome::Processed { path, .. } => path,
        }
    }
}

/// Every target outcome of a run, in target order.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Outcomes sorted like the targets were discovered.
    pub outcomes: Vec<TargetOutcome>,
}

impl BatchReport {
    /// Aggregate the outcomes.
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            targets: self.outcomes.len(),
            ..Default::default()
        };

        for outcome in &self.outcomes {
            match outcome {
                TargetOutcome::Skipped { .. } => summary.skipped += 1,
                TargetOutcome::Processed { pairs, .. } => {
                    for pair in pairs {
                        summary.pairs += 1;
                        summary.matches += pair.matches;
                        match pair.result {
                            Ok(_) => summary.written += 1,
                            Err(_) => summary.export_failures += 1,
                        }
                    }
                }
            }
        }

        summary
    }

    /// Paths of every written artifact, in target then slot order.
    pub fn artifacts(&self) -> Vec<&PathBuf> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                TargetOutcome::Processed { pairs, .. } => Some(pairs),
                TargetOutcome::Skipped { .. } => None,
            })
            .flatten()
            .filter_map(|pair| pair.result.as_ref().ok())
            .collect()
    }
}

/// Counters of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Targets found in the target directory.
    pub targets: usize,
    /// Targets that could not be loaded.
    pub skipped: usize,
    /// (template, target) pairs matched.
    pub pairs: usize,
    /// Artifacts written.
    pub written: usize,
    /// Artifacts that could not be rendered or written.
    pub export_failures: usize,
    /// Accepted matches over all pairs.
    pub matches: usize,
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} targets ({} skipped), {} pairs, {} artifacts written, {} export failures, {} matches",
            self.targets, self.skipped, self.pairs, self.written, self.export_failures, self.matches
        )
    }
}
