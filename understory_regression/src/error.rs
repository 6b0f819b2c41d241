// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for loading, comparing and rendering regression images.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::report::RegressionStatus;

/// Error that aborts a single regression comparison.
#[derive(Debug, Error)]
pub enum RegressionError {
    /// An image file could not be opened or decoded.
    #[error("failed to read `{}`: {source}", .path.display())]
    Read {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying decode or I/O failure.
        #[source]
        source: ReadError,
    },
    /// Asking the filesystem whether a numbered baseline exists failed.
    #[error("failed to probe baseline candidate `{}`: {source}", .path.display())]
    BaselineProbe {
        /// Candidate whose existence could not be determined.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The baseline and test images do not have the same size.
    #[error("the size of the baseline image {baseline:?} and test image {test:?} do not match")]
    ShapeMismatch {
        /// Size vector of the baseline image.
        baseline: Vec<usize>,
        /// Size vector of the test image.
        test: Vec<usize>,
    },
    /// A tolerance value was out of range or could not be parsed.
    #[error("invalid value `{value}` for {name}")]
    InvalidTolerance {
        /// Name of the offending setting.
        name: &'static str,
        /// The rejected value, as given.
        value: String,
    },
}

impl RegressionError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: impl Into<ReadError>) -> Self {
        Self::Read {
            path: path.into(),
            source: source.into(),
        }
    }

    /// Exit status reported for a comparison aborted by this error.
    ///
    /// Read and probe failures report [`RegressionStatus::ReadFailure`] so they can be told
    /// apart from images that were read fine but differ.
    pub fn status(&self) -> RegressionStatus {
        match self {
            Self::Read { .. } | Self::BaselineProbe { .. } => RegressionStatus::ReadFailure,
            Self::ShapeMismatch { .. } | Self::InvalidTolerance { .. } => RegressionStatus::Fail,
        }
    }
}

/// Why an image file could not be turned into an [`Image`](crate::Image).
#[derive(Debug, Error)]
pub enum ReadError {
    /// Opening or reading the file failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The raster decoder rejected the file.
    #[error(transparent)]
    Decode(#[from] kompari::image::ImageError),
    /// A MetaImage header line was missing or malformed.
    #[error("malformed MetaImage header: {0}")]
    Header(String),
    /// The MetaImage element type is not one we can read.
    #[error("unsupported MetaImage element type `{0}`")]
    ElementType(String),
    /// The pixel data is shorter than the header promises.
    #[error("expected {expected} bytes of pixel data, found {found}")]
    Truncated {
        /// Bytes required by the header.
        expected: usize,
        /// Bytes actually present.
        found: usize,
    },
    /// The image has no dimensions or more than [`MAX_DIMENSION`](crate::image::MAX_DIMENSION).
    #[error("{0} dimensions is outside the supported range 1..=6")]
    Dimension(usize),
    /// The pixel buffer does not match the size vector.
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}

/// Failure to produce one diagnostic artifact.
///
/// These are logged where they happen and never change a verdict.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The image has an empty extent, so there is no slice to draw.
    #[error("cannot render `{}`: image has an empty extent {size:?}", .path.display())]
    EmptyImage {
        /// Artifact that was being produced.
        path: PathBuf,
        /// Size vector of the source image.
        size: Vec<usize>,
    },
    /// The 2-D slice is larger than a PNG can hold.
    #[error("cannot render `{}`: slice of {width}x{height} is too large", .path.display())]
    TooLarge {
        /// Artifact that was being produced.
        path: PathBuf,
        /// Slice width.
        width: usize,
        /// Slice height.
        height: usize,
    },
    /// Writing the encoded PNG failed.
    #[error("failed to write `{}`: {source}", .path.display())]
    Write {
        /// Artifact that was being written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}
