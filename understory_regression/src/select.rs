// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Picking the closest of several candidate baselines.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::compare::{ComparisonResult, compare_images};
use crate::error::RegressionError;
use crate::image::{Image, load_image};
use crate::tolerance::ToleranceConfig;

/// How one candidate baseline fared against the test image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BaselineOutcome {
    /// The candidate was compared.
    Compared {
        /// Number of differing pixels.
        differing_pixels: u64,
    },
    /// The candidate has a different size and was skipped.
    ShapeMismatch {
        /// Size vector of the candidate.
        size: Vec<usize>,
    },
}

/// Outcome of every candidate considered for one canonical baseline.
#[derive(Clone, Debug, Default)]
pub struct BaselineSet {
    entries: Vec<(PathBuf, BaselineOutcome)>,
}

impl BaselineSet {
    fn insert(&mut self, path: PathBuf, outcome: BaselineOutcome) {
        self.entries.push((path, outcome));
    }

    /// Outcome recorded for `path`.
    pub fn get(&self, path: &Path) -> Option<&BaselineOutcome> {
        self.entries
            .iter()
            .find(|(candidate, _)| candidate == path)
            .map(|(_, outcome)| outcome)
    }

    /// Candidates and their outcomes, in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = (&Path, &BaselineOutcome)> {
        self.entries
            .iter()
            .map(|(path, outcome)| (path.as_path(), outcome))
    }

    /// Number of candidates considered.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no candidate was considered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The baseline a test image came closest to.
#[derive(Clone, Debug)]
pub struct BaselineSelection {
    /// Path of the chosen baseline.
    pub path: PathBuf,
    /// The chosen baseline, as loaded.
    pub baseline: Image,
    /// Comparison of the test image against the chosen baseline.
    pub result: ComparisonResult,
    /// Every candidate that was considered.
    pub candidates: BaselineSet,
}

/// Compares `test` against every candidate and keeps the one with the fewest differing pixels.
///
/// Ties go to the earliest candidate, so the canonical baseline wins unless an alternate is
/// strictly better. A candidate that cannot be read aborts the selection. A candidate of a
/// different size is recorded and skipped; only when no candidate has the test's size is
/// the first such [`RegressionError::ShapeMismatch`] returned.
pub fn select_best_baseline(
    test: &Image,
    candidates: &[PathBuf],
    tolerance: &ToleranceConfig,
) -> Result<BaselineSelection, RegressionError> {
    let mut set = BaselineSet::default();
    let mut best = None::<(PathBuf, Image, ComparisonResult)>;
    let mut first_mismatch = None;

    for candidate in candidates {
        let baseline = load_image(candidate)?;
        match compare_images(test, &baseline, tolerance) {
            Ok(result) => {
                debug!(
                    "`{}`: {} differing pixel(s)",
                    candidate.display(),
                    result.differing_pixels
                );
                set.insert(
                    candidate.clone(),
                    BaselineOutcome::Compared {
                        differing_pixels: result.differing_pixels,
                    },
                );
                if best
                    .as_ref()
                    .is_none_or(|(_, _, current)| result.differing_pixels < current.differing_pixels)
                {
                    best = Some((candidate.clone(), baseline, result));
                }
            }
            Err(err @ RegressionError::ShapeMismatch { .. }) => {
                warn!("skipping baseline `{}`: {err}", candidate.display());
                set.insert(
                    candidate.clone(),
                    BaselineOutcome::ShapeMismatch {
                        size: baseline.size().to_vec(),
                    },
                );
                first_mismatch.get_or_insert(err);
            }
            Err(err) => return Err(err),
        }
    }

    match best {
        Some((path, baseline, result)) => {
            info!(
                "best of {} baseline(s) is `{}` with {} differing pixel(s)",
                set.len(),
                path.display(),
                result.differing_pixels
            );
            Ok(BaselineSelection {
                path,
                baseline,
                result,
                candidates: set,
            })
        }
        None => Err(first_mismatch.unwrap_or_else(|| {
            RegressionError::read(
                PathBuf::new(),
                io::Error::new(io::ErrorKind::NotFound, "no baseline candidates"),
            )
        })),
    }
}
