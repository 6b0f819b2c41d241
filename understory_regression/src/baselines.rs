// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Discovery of numbered alternate baselines.
//!
//! A test may have several acceptable baselines, for example when rendering differs slightly
//! between platforms. Alternates live next to the canonical baseline and are numbered
//! consecutively from 1 before the extension:
//!
//! ```text
//! blur.png     canonical
//! blur.1.png   first alternate
//! blur.2.png   second alternate
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::RegressionError;

/// Path of the `index`-th alternate of `canonical`.
///
/// The extension is everything from the last `.` of the file name, so `a/b.nii.gz` has
/// alternates `a/b.nii.1.gz`, `a/b.nii.2.gz`, … A file name without a `.` gets the number
/// appended: `a/b` → `a/b.1`.
pub fn alternate_baseline_path(canonical: &Path, index: usize) -> PathBuf {
    let name = canonical
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (stem, extension) = match name.rfind('.') {
        // A leading dot names a hidden file rather than starting an extension.
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name.as_str(), ""),
    };

    let mut alternate = OsString::from(stem);
    alternate.push(format!(".{index}"));
    alternate.push(extension);
    canonical.with_file_name(alternate)
}

/// Lists the canonical baseline followed by every consecutively numbered alternate.
///
/// Enumeration stops at the first index whose file does not exist, so a gap hides any
/// later alternates. The canonical path is always the first entry, whether or not it exists;
/// loading it is what reports a missing baseline.
///
/// A filesystem query that fails (rather than answering "absent") is an error, never
/// treated as the end of the list.
pub fn enumerate_baselines(canonical: impl AsRef<Path>) -> Result<Vec<PathBuf>, RegressionError> {
    let canonical = canonical.as_ref();
    let mut candidates = vec![canonical.to_path_buf()];

    for index in 1.. {
        let alternate = alternate_baseline_path(canonical, index);
        let exists = alternate
            .try_exists()
            .map_err(|source| RegressionError::BaselineProbe {
                path: alternate.clone(),
                source,
            })?;
        if !exists {
            debug!(
                "stopping baseline enumeration at missing `{}`",
                alternate.display()
            );
            break;
        }
        candidates.push(alternate);
    }

    debug!(
        "`{}` has {} baseline candidate(s)",
        canonical.display(),
        candidates.len()
    );
    Ok(candidates)
}
