// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! N-dimensional sample grids and the image loader.

use std::path::Path;

use kompari::image::DynamicImage;
use ndarray::{ArrayD, Dimension, IxDyn, ShapeBuilder};

use crate::error::{ReadError, RegressionError};
use crate::metaimage;

/// Highest dimensionality an [`Image`] may have.
pub const MAX_DIMENSION: usize = 6;

/// An N-dimensional grid of `f64` samples.
///
/// Axis 0 is x (columns) and axis 1 is y (rows); further axes are slices, time points and so
/// on. Samples are stored with axis 0 varying fastest, which is the order raster rows and
/// MetaImage payloads use on disk.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pixels: ArrayD<f64>,
}

fn check_dimension(dimension: usize) -> Result<(), ReadError> {
    if (1..=MAX_DIMENSION).contains(&dimension) {
        Ok(())
    } else {
        Err(ReadError::Dimension(dimension))
    }
}

impl Image {
    /// Wraps an existing array.
    pub fn from_pixels(pixels: ArrayD<f64>) -> Result<Self, ReadError> {
        check_dimension(pixels.ndim())?;
        Ok(Self { pixels })
    }

    /// Wraps an array produced from another image's shape.
    pub(crate) fn from_valid_pixels(pixels: ArrayD<f64>) -> Self {
        debug_assert!(
            (1..=MAX_DIMENSION).contains(&pixels.ndim()),
            "array must have 1..=MAX_DIMENSION axes"
        );
        Self { pixels }
    }

    /// Builds an image of `size` from samples listed with axis 0 varying fastest.
    pub fn from_shape_vec(size: &[usize], samples: Vec<f64>) -> Result<Self, ReadError> {
        check_dimension(size.len())?;
        Self::from_pixels(ArrayD::from_shape_vec(IxDyn(size).f(), samples)?)
    }

    /// Builds an image of `size` by evaluating `f` at every index.
    pub fn from_fn(size: &[usize], mut f: impl FnMut(&[usize]) -> f64) -> Result<Self, ReadError> {
        check_dimension(size.len())?;
        Self::from_pixels(ArrayD::from_shape_fn(IxDyn(size).f(), |index| {
            f(index.slice())
        }))
    }

    /// An image of `size` with every sample set to `value`.
    pub fn filled(size: &[usize], value: f64) -> Result<Self, ReadError> {
        check_dimension(size.len())?;
        Self::from_pixels(ArrayD::from_elem(IxDyn(size).f(), value))
    }

    /// Extent along each axis.
    pub fn size(&self) -> &[usize] {
        self.pixels.shape()
    }

    /// Number of axes.
    pub fn dimension(&self) -> usize {
        self.pixels.ndim()
    }

    /// The size vector padded with trailing extents of 1 up to [`MAX_DIMENSION`].
    ///
    /// Two images are the same shape when their padded sizes are equal, so a `w×h` raster
    /// compares against a `w×h×1` volume.
    pub fn padded_size(&self) -> [usize; MAX_DIMENSION] {
        let mut padded = [1; MAX_DIMENSION];
        padded[..self.dimension()].copy_from_slice(self.size());
        padded
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Whether any extent is zero.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Sample at `index`, or `None` when the index is out of range.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        if index.len() != self.dimension() {
            return None;
        }
        self.pixels.get(index).copied()
    }

    /// The underlying array.
    pub fn pixels(&self) -> &ArrayD<f64> {
        &self.pixels
    }

    /// All samples with axis 0 varying fastest.
    pub fn samples(&self) -> Vec<f64> {
        self.pixels.t().iter().copied().collect()
    }

    /// The same samples viewed with a different size vector of equal padded extent.
    pub(crate) fn reshaped(&self, size: &[usize]) -> Result<Self, ReadError> {
        Self::from_shape_vec(size, self.samples())
    }
}

/// Reads an image file into an [`Image`].
///
/// `.mha` and `.mhd` files go through the MetaImage reader and may have up to
/// [`MAX_DIMENSION`] axes. Everything else is decoded as a raster and collapsed to a single
/// luminance channel, keeping the native sample scale (0–255 for 8-bit, 0–65535 for 16-bit,
/// raw values for float sources).
///
/// Failures are not retried; they surface as [`RegressionError::Read`].
pub fn load_image(path: impl AsRef<Path>) -> Result<Image, RegressionError> {
    let path = path.as_ref();
    let image = if metaimage::is_metaimage_path(path) {
        metaimage::read_metaimage(path)
    } else {
        read_raster(path)
    };
    image.map_err(|source| RegressionError::read(path, source))
}

fn read_raster(path: &Path) -> Result<Image, ReadError> {
    let decoded = kompari::image::open(path)?;
    from_dynamic(&decoded)
}

/// Rec. 709 luma with the same integer weights the raster decoder uses, so gray stays exact.
fn luminance([r, g, b]: [f32; 3]) -> f64 {
    (2126.0 * f64::from(r) + 7152.0 * f64::from(g) + 722.0 * f64::from(b)) / 10000.0
}

pub(crate) fn from_dynamic(image: &DynamicImage) -> Result<Image, ReadError> {
    let (width, height, samples) = match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => {
            let luma = image.to_luma8();
            let (width, height) = luma.dimensions();
            let samples = luma.into_raw().into_iter().map(f64::from).collect();
            (width, height, samples)
        }
        DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => {
            let luma = image.to_luma16();
            let (width, height) = luma.dimensions();
            let samples = luma.into_raw().into_iter().map(f64::from).collect();
            (width, height, samples)
        }
        _ => {
            // Converting through `to_luma32f` would clamp to 0..=1.
            let rgb = image.to_rgb32f();
            let (width, height) = rgb.dimensions();
            let samples = rgb.pixels().map(|pixel| luminance(pixel.0)).collect();
            (width, height, samples)
        }
    };
    Image::from_shape_vec(&[width as usize, height as usize], samples)
}
