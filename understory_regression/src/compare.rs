// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel-wise comparison of a test image against a baseline.

use std::ops::ControlFlow;

use log::debug;
use ndarray::{ArrayD, Dimension, IxDyn, ShapeBuilder, Zip};
use smallvec::SmallVec;

use crate::error::RegressionError;
use crate::image::{Image, MAX_DIMENSION};
use crate::tolerance::{NeighborhoodMetric, ToleranceConfig};

type Offset = SmallVec<[isize; MAX_DIMENSION]>;
type Index = SmallVec<[usize; MAX_DIMENSION]>;

/// Summary of the differences that exceeded the intensity tolerance.
///
/// All fields are zero when no pixel differs.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DifferenceStatistics {
    /// Smallest recorded difference.
    pub minimum: f64,
    /// Largest recorded difference.
    pub maximum: f64,
    /// Mean of the recorded differences.
    pub mean: f64,
    /// Sum of the recorded differences.
    pub total: f64,
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    minimum: f64,
    maximum: f64,
    total: f64,
}

impl Accumulator {
    fn add(&mut self, difference: f64) {
        if self.count == 0 {
            self.minimum = difference;
            self.maximum = difference;
        } else {
            self.minimum = self.minimum.min(difference);
            self.maximum = self.maximum.max(difference);
        }
        self.total += difference;
        self.count += 1;
    }

    fn finish(self) -> (u64, DifferenceStatistics) {
        if self.count == 0 {
            return (0, DifferenceStatistics::default());
        }
        let statistics = DifferenceStatistics {
            minimum: self.minimum,
            maximum: self.maximum,
            mean: self.total / self.count as f64,
            total: self.total,
        };
        (self.count, statistics)
    }
}

/// Outcome of comparing one test image against one baseline.
#[derive(Clone, Debug)]
pub struct ComparisonResult {
    /// Number of pixels whose difference exceeded the intensity tolerance.
    pub differing_pixels: u64,
    /// Per-pixel difference, zero where the pixel matched. Same shape as the test image.
    pub difference_map: Image,
    /// Statistics over the differing pixels.
    pub statistics: DifferenceStatistics,
}

impl ComparisonResult {
    /// Whether the number of differing pixels is within `tolerance`.
    pub fn passes(&self, tolerance: &ToleranceConfig) -> bool {
        tolerance.passes(self.differing_pixels)
    }
}

/// Absolute difference of two samples.
///
/// Equal samples (including two NaNs) never differ; a NaN against a number always does.
fn sample_difference(test: f64, baseline: f64) -> f64 {
    if test == baseline || (test.is_nan() && baseline.is_nan()) {
        return 0.0;
    }
    let difference = (test - baseline).abs();
    if difference.is_nan() {
        f64::INFINITY
    } else {
        difference
    }
}

fn squared_length(offset: &[isize]) -> usize {
    offset.iter().map(|step| step.unsigned_abs().pow(2)).sum()
}

/// How far the neighborhood reaches along each axis: `radius`, clamped to the extent.
fn neighborhood_reach(shape: &[usize], radius: usize) -> Index {
    shape
        .iter()
        .map(|&extent| radius.min(extent.saturating_sub(1)))
        .collect()
}

/// Visits every offset whose largest step is exactly `shell`, within `reach`.
///
/// Walking shells `0, 1, 2, ...` visits the box nearest first without ever holding more
/// than one offset. `offset` is scratch space and must be empty on entry.
fn for_each_shell_offset(
    reach: &[usize],
    shell: usize,
    offset: &mut Offset,
    on_shell: bool,
    visit: &mut impl FnMut(&[isize]) -> ControlFlow<()>,
) -> ControlFlow<()> {
    let axis = offset.len();
    if axis == reach.len() {
        return if on_shell {
            visit(offset.as_slice())
        } else {
            ControlFlow::Continue(())
        };
    }

    let limit = reach[axis].min(shell);
    let last = axis + 1 == reach.len();
    if last && !on_shell {
        // Only the two faces of the shell remain.
        if limit < shell {
            return ControlFlow::Continue(());
        }
        let shell = shell as isize;
        let faces = [-shell, shell];
        let faces = if shell == 0 { &faces[..1] } else { &faces[..] };
        for &step in faces {
            offset.push(step);
            let flow = visit(offset.as_slice());
            offset.pop();
            flow?;
        }
        return ControlFlow::Continue(());
    }

    let limit = limit as isize;
    for step in -limit..=limit {
        offset.push(step);
        let flow = for_each_shell_offset(
            reach,
            shell,
            offset,
            on_shell || step.unsigned_abs() == shell,
            visit,
        );
        offset.pop();
        flow?;
    }
    ControlFlow::Continue(())
}

/// Writes `index + offset` into `out`, returning `false` when it leaves the image.
fn shifted_index(index: &[usize], offset: &[isize], shape: &[usize], out: &mut Index) -> bool {
    out.clear();
    for ((&position, &step), &extent) in index.iter().zip(offset).zip(shape) {
        match position.checked_add_signed(step) {
            Some(shifted) if shifted < extent => out.push(shifted),
            _ => return false,
        }
    }
    true
}

/// Compares `test` against `baseline`.
///
/// Each test pixel is matched against the baseline pixels within [`ToleranceConfig::radius`]
/// of the same position (only the same position when the radius is 0) and keeps the smallest
/// absolute difference found. A pixel differs when that difference exceeds
/// [`ToleranceConfig::intensity`]; the difference map records it there and holds zero
/// everywhere else.
///
/// The images must have the same [padded size](Image::padded_size), otherwise this fails
/// with [`RegressionError::ShapeMismatch`] before looking at any pixel.
pub fn compare_images(
    test: &Image,
    baseline: &Image,
    tolerance: &ToleranceConfig,
) -> Result<ComparisonResult, RegressionError> {
    let mismatch = || RegressionError::ShapeMismatch {
        baseline: baseline.size().to_vec(),
        test: test.size().to_vec(),
    };
    if test.padded_size() != baseline.padded_size() {
        return Err(mismatch());
    }

    let reshaped;
    let baseline = if baseline.size() == test.size() {
        baseline
    } else {
        reshaped = baseline.reshaped(test.size()).map_err(|_| mismatch())?;
        &reshaped
    };

    let shape = test.size();
    let threshold = tolerance.intensity();
    let mut differences = ArrayD::<f64>::zeros(IxDyn(shape).f());
    let mut accumulator = Accumulator::default();

    if tolerance.radius() == 0 {
        Zip::from(&mut differences)
            .and(test.pixels())
            .and(baseline.pixels())
            .for_each(|out, &t, &b| {
                let difference = sample_difference(t, b);
                if difference > threshold {
                    *out = difference;
                    accumulator.add(difference);
                }
            });
    } else {
        let reach = neighborhood_reach(shape, tolerance.radius());
        let widest = reach.iter().copied().max().unwrap_or(0);
        let limit = tolerance.radius().saturating_mul(tolerance.radius());
        let euclidean = tolerance.metric() == NeighborhoodMetric::Euclidean;
        let test_pixels = test.pixels();
        let baseline_pixels = baseline.pixels();
        let mut neighbor = Index::new();
        let mut offset = Offset::new();
        for (index, out) in differences.indexed_iter_mut() {
            let index = index.slice();
            let t = test_pixels[index];
            let mut minimum = f64::INFINITY;
            for shell in 0..=widest {
                let flow = for_each_shell_offset(&reach, shell, &mut offset, false, &mut |step| {
                    if euclidean && squared_length(step) > limit {
                        return ControlFlow::Continue(());
                    }
                    if !shifted_index(index, step, shape, &mut neighbor) {
                        return ControlFlow::Continue(());
                    }
                    let difference = sample_difference(t, baseline_pixels[&neighbor[..]]);
                    if difference < minimum {
                        minimum = difference;
                        if minimum <= threshold {
                            return ControlFlow::Break(());
                        }
                    }
                    ControlFlow::Continue(())
                });
                if flow.is_break() {
                    break;
                }
            }
            if minimum > threshold {
                *out = minimum;
                accumulator.add(minimum);
            }
        }
    }

    let (differing_pixels, statistics) = accumulator.finish();
    debug!(
        "{differing_pixels} of {} pixels differ (intensity tolerance {threshold}, radius {})",
        test.len(),
        tolerance.radius()
    );
    Ok(ComparisonResult {
        differing_pixels,
        difference_map: Image::from_valid_pixels(differences),
        statistics,
    })
}
