// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diagnostic renderings of a failed comparison.
//!
//! Each of the difference map, the baseline and the test image is stretched onto the 8-bit
//! display range, cut down to its center 2-D slice and written next to the test image as
//! `<test>.diff.png`, `<test>.base.png` and `<test>.test.png`.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use kompari::image::{Rgba, RgbaImage};
use kompari::{SizeOptimizationLevel, image_to_png};
use log::error;
use ndarray::{Array2, ArrayD, Axis, Ix2};

use crate::compare::ComparisonResult;
use crate::error::RenderError;
use crate::image::Image;

/// Which image a diagnostic artifact shows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The difference map.
    Difference,
    /// The chosen baseline.
    Baseline,
    /// The test output.
    Test,
}

impl ArtifactKind {
    /// Every kind, in the order artifacts are produced.
    pub const ALL: [Self; 3] = [Self::Difference, Self::Baseline, Self::Test];

    /// File name infix: `diff`, `base` or `test`.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Difference => "diff",
            Self::Baseline => "base",
            Self::Test => "test",
        }
    }

    /// Dashboard measurement name.
    pub fn measurement_name(self) -> &'static str {
        match self {
            Self::Difference => "DifferenceImage",
            Self::Baseline => "BaselineImage",
            Self::Test => "TestImage",
        }
    }
}

/// `<test_path>.<suffix>.png`, e.g. `out/blur.png.diff.png`.
pub fn artifact_path(test_path: &Path, kind: ArtifactKind) -> PathBuf {
    let mut path = OsString::from(test_path.as_os_str());
    path.push(format!(".{}.png", kind.suffix()));
    PathBuf::from(path)
}

/// Linearly maps the finite range of `image` onto `0..=255`.
///
/// The range is taken over every sample of the N-D image. A constant image maps to 0.
/// `+inf` maps to 255; `-inf` and NaN map to 0.
pub fn stretch_intensity(image: &Image) -> ArrayD<u8> {
    let range = image
        .pixels()
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |range: Option<(f64, f64)>, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });
    let (lo, scale) = match range {
        Some((lo, hi)) if hi > lo => (lo, f64::from(u8::MAX) / (hi - lo)),
        _ => (0.0, 0.0),
    };

    image.pixels().mapv(|v| display_level(v, lo, scale))
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "finite levels are clamped to the u8 range before the cast"
)]
fn display_level(v: f64, lo: f64, scale: f64) -> u8 {
    if v.is_finite() {
        ((v - lo) * scale).round().clamp(0.0, f64::from(u8::MAX)) as u8
    } else if v == f64::INFINITY {
        u8::MAX
    } else {
        0
    }
}

/// The 2-D slice through the middle of every axis beyond the second.
///
/// Axes 0 and 1 are kept whole; axis `k >= 2` is fixed at `extent / 2`. A 1-D array becomes
/// a single row. Returns `None` for an array with an empty extent.
pub fn center_slice<A: Clone>(pixels: &ArrayD<A>) -> Option<Array2<A>> {
    if pixels.is_empty() || pixels.ndim() == 0 {
        return None;
    }
    let mut view = pixels.view();
    while view.ndim() > 2 {
        let axis = Axis(view.ndim() - 1);
        let middle = view.len_of(axis) / 2;
        view = view.index_axis_move(axis, middle);
    }
    if view.ndim() == 1 {
        view = view.insert_axis(Axis(1));
    }
    view.into_dimensionality::<Ix2>().ok().map(|slice| slice.to_owned())
}

/// Stretches `source`, takes its center slice and writes it to `path` as a PNG.
///
/// Axis 0 of the slice runs left to right and axis 1 top to bottom.
pub fn render_artifact(source: &Image, path: &Path) -> Result<(), RenderError> {
    let stretched = stretch_intensity(source);
    let slice = center_slice(&stretched).ok_or_else(|| RenderError::EmptyImage {
        path: path.to_path_buf(),
        size: source.size().to_vec(),
    })?;

    let (width, height) = slice.dim();
    let too_large = || RenderError::TooLarge {
        path: path.to_path_buf(),
        width,
        height,
    };
    let png_width = u32::try_from(width).map_err(|_| too_large())?;
    let png_height = u32::try_from(height).map_err(|_| too_large())?;

    let rgba = RgbaImage::from_fn(png_width, png_height, |x, y| {
        let v = slice[[x as usize, y as usize]];
        Rgba([v, v, v, u8::MAX])
    });
    fs::write(path, image_to_png(&rgba, SizeOptimizationLevel::Fast)).map_err(|source| {
        RenderError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// One rendered (or failed) diagnostic artifact.
#[derive(Debug)]
pub struct Artifact {
    /// What the artifact shows.
    pub kind: ArtifactKind,
    /// Where it was meant to be written.
    pub path: PathBuf,
    /// Whether rendering and writing succeeded.
    pub outcome: Result<(), RenderError>,
}

/// The three artifacts of a failed comparison.
#[derive(Debug)]
pub struct DiagnosticArtifacts {
    artifacts: [Artifact; 3],
}

impl DiagnosticArtifacts {
    /// Artifacts in [`ArtifactKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = &Artifact> {
        self.artifacts.iter()
    }

    /// The artifact of `kind`.
    pub fn get(&self, kind: ArtifactKind) -> &Artifact {
        match kind {
            ArtifactKind::Difference => &self.artifacts[0],
            ArtifactKind::Baseline => &self.artifacts[1],
            ArtifactKind::Test => &self.artifacts[2],
        }
    }

    /// Whether every artifact was written.
    pub fn all_written(&self) -> bool {
        self.artifacts.iter().all(|artifact| artifact.outcome.is_ok())
    }
}

/// Renders the difference map, baseline and test image of a failed comparison.
///
/// Each artifact is attempted regardless of whether the others succeeded; failures are
/// logged and kept in the returned [`DiagnosticArtifacts`].
pub fn render_diagnostics(
    test_path: &Path,
    result: &ComparisonResult,
    baseline: &Image,
    test: &Image,
) -> DiagnosticArtifacts {
    let artifacts = ArtifactKind::ALL.map(|kind| {
        let source = match kind {
            ArtifactKind::Difference => &result.difference_map,
            ArtifactKind::Baseline => baseline,
            ArtifactKind::Test => test,
        };
        let path = artifact_path(test_path, kind);
        let outcome = render_artifact(source, &path);
        if let Err(err) = &outcome {
            error!("{err}");
        }
        Artifact {
            kind,
            path,
            outcome,
        }
    });
    DiagnosticArtifacts { artifacts }
}
