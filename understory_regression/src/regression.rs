// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Checking test outputs against their baselines.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::baselines::enumerate_baselines;
use crate::error::RegressionError;
use crate::image::load_image;
use crate::render::{DiagnosticArtifacts, render_diagnostics};
use crate::report::{Measurement, RegressionStatus, emit};
use crate::select::{BaselineSelection, select_best_baseline};
use crate::tolerance::ToleranceConfig;

/// A test output and the canonical baseline it should match.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ComparePair {
    /// Image produced by the test.
    pub test: PathBuf,
    /// Canonical baseline; numbered alternates next to it are also tried.
    pub baseline: PathBuf,
}

impl ComparePair {
    /// Pairs `test` with `baseline`.
    pub fn new(test: impl Into<PathBuf>, baseline: impl Into<PathBuf>) -> Self {
        Self {
            test: test.into(),
            baseline: baseline.into(),
        }
    }
}

/// Result of checking one [`ComparePair`].
#[derive(Debug)]
pub struct ComparisonOutcome {
    /// Pass or fail against the best baseline.
    pub status: RegressionStatus,
    /// The best baseline and how every candidate fared.
    pub selection: BaselineSelection,
    /// Diagnostic renderings, present only when the comparison failed.
    pub artifacts: Option<DiagnosticArtifacts>,
}

/// Checks one test image against its canonical baseline and numbered alternates.
///
/// Writes the `ImageError` measurement (the differing-pixel count against the best
/// baseline) to `out` whether or not the comparison passes, so tolerances can be tightened
/// from passing runs. On failure it also writes the difference statistics and the chosen
/// baseline's name, renders the diagnostic images next to the test image, and announces
/// each one that was written.
///
/// A NaN sample compared with a number differs by infinity. The statistics then carry
/// infinities, which are reported as `±1.7976931348623157e308` so dashboards still parse
/// them as numbers.
///
/// Read failures and size mismatches abort the comparison and are returned; their
/// [`RegressionError::status`] is the verdict.
pub fn regression_test_image(
    pair: &ComparePair,
    tolerance: &ToleranceConfig,
    out: &mut dyn Write,
) -> Result<ComparisonOutcome, RegressionError> {
    let candidates = enumerate_baselines(&pair.baseline)?;
    let test = load_image(&pair.test)?;
    let selection = select_best_baseline(&test, &candidates, tolerance)?;
    let result = &selection.result;

    emit(
        out,
        &Measurement::Count {
            name: "ImageError",
            value: result.differing_pixels,
        },
    );

    let status = if result.passes(tolerance) {
        RegressionStatus::Pass
    } else {
        RegressionStatus::Fail
    };
    if status.is_pass() {
        info!("`{}` matches `{}`", pair.test.display(), selection.path.display());
        return Ok(ComparisonOutcome {
            status,
            selection,
            artifacts: None,
        });
    }

    error!(
        "`{}` differs from `{}` in {} pixel(s), tolerance is {}",
        pair.test.display(),
        selection.path.display(),
        result.differing_pixels,
        tolerance.pixel_count()
    );
    for (name, value) in [
        ("ImageError Minimum", result.statistics.minimum),
        ("ImageError Maximum", result.statistics.maximum),
        ("ImageError Mean", result.statistics.mean),
    ] {
        emit(out, &Measurement::Numeric { name, value });
    }
    let baseline_name = selection
        .path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    emit(
        out,
        &Measurement::Text {
            name: "BaselineImageName",
            value: &baseline_name,
        },
    );

    let artifacts = render_diagnostics(&pair.test, result, &selection.baseline, &test);
    for artifact in artifacts.iter().filter(|artifact| artifact.outcome.is_ok()) {
        emit(
            out,
            &Measurement::Image {
                name: artifact.kind.measurement_name(),
                path: &artifact.path,
            },
        );
    }

    Ok(ComparisonOutcome {
        status,
        selection,
        artifacts: Some(artifacts),
    })
}

/// Verdict for every pair of a run, in order.
#[derive(Debug)]
pub struct RunSummary {
    /// The most severe status seen.
    pub status: RegressionStatus,
    /// Status of each pair that was processed.
    pub results: Vec<(ComparePair, RegressionStatus)>,
}

impl RunSummary {
    /// Status of `test`, if it was processed.
    pub fn status_of(&self, test: &Path) -> Option<RegressionStatus> {
        self.results
            .iter()
            .find(|(pair, _)| pair.test == test)
            .map(|(_, status)| *status)
    }
}

/// Checks every pair in order.
///
/// A pair that fails its tolerances does not stop the run, but the first read failure or
/// size mismatch does: later pairs are not processed.
pub fn run_compare_list(
    pairs: &[ComparePair],
    tolerance: &ToleranceConfig,
    out: &mut dyn Write,
) -> RunSummary {
    let mut summary = RunSummary {
        status: RegressionStatus::Pass,
        results: Vec::with_capacity(pairs.len()),
    };
    for pair in pairs {
        let status = match regression_test_image(pair, tolerance, out) {
            Ok(outcome) => outcome.status,
            Err(err) => {
                error!("comparing `{}` aborted: {err}", pair.test.display());
                let status = err.status();
                summary.results.push((pair.clone(), status));
                summary.status = summary.status.worst(status);
                break;
            }
        };
        summary.results.push((pair.clone(), status));
        summary.status = summary.status.worst(status);
    }
    summary
}
