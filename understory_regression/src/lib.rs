// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Regression: image regression checks against stored baselines.
//!
//! Given an image produced by a test and the path of its "golden" baseline, this crate
//! decides whether the test passes and, when it does not, leaves behind diagnostic images
//! that show where the two differ.
//!
//! - **Loading** ([`load_image`]): rasters are read as one luminance channel at their native
//!   scale; MetaImage (`.mha`/`.mhd`) volumes may have up to [`MAX_DIMENSION`] axes.
//! - **Alternate baselines** ([`enumerate_baselines`]): `blur.png` may be accompanied by
//!   `blur.1.png`, `blur.2.png`, … for platform-dependent variants.
//! - **Comparison** ([`compare_images`]): counts pixels whose difference exceeds the
//!   intensity tolerance, optionally searching a neighborhood of the baseline to absorb small
//!   positional jitter.
//! - **Selection** ([`select_best_baseline`]): the test passes if it matches the best of its
//!   baselines, not necessarily the canonical one.
//! - **Diagnostics** ([`render_diagnostics`]): `<test>.diff.png`, `<test>.base.png` and
//!   `<test>.test.png`, each stretched to the 8-bit range and cut to the center 2-D slice.
//! - **Reporting** ([`regression_test_image`], [`run_compare_list`]): CTest/CDash
//!   measurement lines and exit statuses (0 pass, 1 fail, 1000 read failure).
//!
//! ## Example
//!
//! ```no_run
//! use understory_regression::{ComparePair, ToleranceConfig, run_compare_list};
//!
//! let tolerance = ToleranceConfig::from_env()?.with_pixel_count(4);
//! let pairs = [ComparePair::new("out/blur.png", "baseline/blur.png")];
//! let summary = run_compare_list(&pairs, &tolerance, &mut std::io::stdout());
//! std::process::exit(summary.status.code());
//! # Ok::<(), understory_regression::RegressionError>(())
//! ```
//!
//! ## Tolerances
//!
//! [`ToleranceConfig`] holds the intensity tolerance (default 2.0), the number of pixels
//! allowed to differ (default 0) and the search radius (default 0, with a
//! [`NeighborhoodMetric`] choosing between a box and a ball). It is built once and passed by
//! reference to every comparison; [`ToleranceConfig::from_env`] applies the
//! `UNDERSTORY_REGRESSION_*` overrides.
//!
//! ## Logging
//!
//! Progress and failures go through the [`log`] facade. Rendering failures are only logged:
//! they never change a verdict.

pub mod baselines;
pub mod compare;
pub mod error;
pub mod image;
pub mod metaimage;
pub mod regression;
pub mod render;
pub mod report;
pub mod select;
pub mod tolerance;

pub use baselines::{alternate_baseline_path, enumerate_baselines};
pub use compare::{ComparisonResult, DifferenceStatistics, compare_images};
pub use error::{ReadError, RegressionError, RenderError};
pub use image::{Image, MAX_DIMENSION, load_image};
pub use metaimage::{ElementType, read_metaimage, write_metaimage};
pub use regression::{
    ComparePair, ComparisonOutcome, RunSummary, regression_test_image, run_compare_list,
};
pub use render::{
    Artifact, ArtifactKind, DiagnosticArtifacts, artifact_path, center_slice, render_artifact,
    render_diagnostics, stretch_intensity,
};
pub use report::{Measurement, RegressionStatus, write_measurement};
pub use select::{BaselineOutcome, BaselineSelection, BaselineSet, select_best_baseline};
pub use tolerance::{NeighborhoodMetric, ToleranceConfig};
