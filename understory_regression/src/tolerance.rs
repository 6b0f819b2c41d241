// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Comparison tolerances.

use std::env;

use crate::error::RegressionError;

/// Environment variable overriding [`ToleranceConfig::intensity`].
pub const INTENSITY_TOLERANCE_ENV: &str = "UNDERSTORY_REGRESSION_INTENSITY_TOLERANCE";
/// Environment variable overriding [`ToleranceConfig::pixel_count`].
pub const PIXEL_TOLERANCE_ENV: &str = "UNDERSTORY_REGRESSION_PIXEL_TOLERANCE";
/// Environment variable overriding [`ToleranceConfig::radius`].
pub const RADIUS_TOLERANCE_ENV: &str = "UNDERSTORY_REGRESSION_RADIUS_TOLERANCE";
/// Environment variable overriding [`ToleranceConfig::metric`] (`chebyshev` or `euclidean`).
pub const NEIGHBORHOOD_ENV: &str = "UNDERSTORY_REGRESSION_NEIGHBORHOOD";

/// Shape of the neighborhood searched when a radius tolerance is set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum NeighborhoodMetric {
    /// Every offset with no axis further than the radius (a box).
    #[default]
    Chebyshev,
    /// Every offset within the radius in Euclidean distance (a ball).
    Euclidean,
}

impl NeighborhoodMetric {
    fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("chebyshev") || value.eq_ignore_ascii_case("box") {
            Some(Self::Chebyshev)
        } else if value.eq_ignore_ascii_case("euclidean") || value.eq_ignore_ascii_case("ball") {
            Some(Self::Euclidean)
        } else {
            None
        }
    }
}

/// How far a test image may stray from its baseline and still pass.
///
/// Built once and shared by reference across every comparison of a run.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ToleranceConfig {
    intensity: f64,
    pixel_count: u64,
    radius: usize,
    metric: NeighborhoodMetric,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            intensity: Self::DEFAULT_INTENSITY,
            pixel_count: 0,
            radius: 0,
            metric: NeighborhoodMetric::Chebyshev,
        }
    }
}

impl ToleranceConfig {
    /// Default intensity tolerance.
    pub const DEFAULT_INTENSITY: f64 = 2.0;

    /// Creates a configuration with the default [`NeighborhoodMetric`].
    ///
    /// `intensity` must be finite and non-negative.
    pub fn new(intensity: f64, pixel_count: u64, radius: usize) -> Result<Self, RegressionError> {
        Self::default()
            .with_intensity(intensity)
            .map(|config| config.with_pixel_count(pixel_count).with_radius(radius))
    }

    /// Replaces the intensity tolerance.
    pub fn with_intensity(mut self, intensity: f64) -> Result<Self, RegressionError> {
        if !intensity.is_finite() || intensity < 0.0 {
            return Err(RegressionError::InvalidTolerance {
                name: "intensity tolerance",
                value: intensity.to_string(),
            });
        }
        self.intensity = intensity;
        Ok(self)
    }

    /// Replaces the pixel-count tolerance.
    pub fn with_pixel_count(mut self, pixel_count: u64) -> Self {
        self.pixel_count = pixel_count;
        self
    }

    /// Replaces the radius tolerance.
    pub fn with_radius(mut self, radius: usize) -> Self {
        self.radius = radius;
        self
    }

    /// Replaces the neighborhood metric used when `radius > 0`.
    pub fn with_metric(mut self, metric: NeighborhoodMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Largest per-pixel absolute difference still considered matching.
    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Largest number of differing pixels for which a comparison still passes.
    pub fn pixel_count(&self) -> u64 {
        self.pixel_count
    }

    /// Radius searched in the baseline for a matching value.
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Neighborhood shape used when `radius > 0`.
    pub fn metric(&self) -> NeighborhoodMetric {
        self.metric
    }

    /// Whether `differing_pixels` is within the pixel-count tolerance (inclusive).
    pub fn passes(&self, differing_pixels: u64) -> bool {
        differing_pixels <= self.pixel_count
    }

    /// The defaults, overridden by any `UNDERSTORY_REGRESSION_*` variables that are set.
    pub fn from_env() -> Result<Self, RegressionError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RegressionError> {
        fn invalid(name: &'static str, value: &str) -> RegressionError {
            RegressionError::InvalidTolerance {
                name,
                value: value.to_owned(),
            }
        }

        let mut config = Self::default();
        if let Some(value) = lookup(INTENSITY_TOLERANCE_ENV) {
            let intensity = value
                .trim()
                .parse()
                .map_err(|_| invalid(INTENSITY_TOLERANCE_ENV, &value))?;
            config = config.with_intensity(intensity)?;
        }
        if let Some(value) = lookup(PIXEL_TOLERANCE_ENV) {
            let pixel_count = value
                .trim()
                .parse()
                .map_err(|_| invalid(PIXEL_TOLERANCE_ENV, &value))?;
            config = config.with_pixel_count(pixel_count);
        }
        if let Some(value) = lookup(RADIUS_TOLERANCE_ENV) {
            let radius = value
                .trim()
                .parse()
                .map_err(|_| invalid(RADIUS_TOLERANCE_ENV, &value))?;
            config = config.with_radius(radius);
        }
        if let Some(value) = lookup(NEIGHBORHOOD_ENV) {
            let metric = NeighborhoodMetric::parse(value.trim())
                .ok_or_else(|| invalid(NEIGHBORHOOD_ENV, &value))?;
            config = config.with_metric(metric);
        }
        Ok(config)
    }
}
