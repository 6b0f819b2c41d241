// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared fixtures for the regression integration tests.

#![allow(
    missing_docs,
    reason = "Integration-test helper module; not part of the public API."
)]

use std::fs;
use std::path::{Path, PathBuf};

use kompari::image::{Rgba, RgbaImage};
use kompari::{SizeOptimizationLevel, image_to_png};
use tempfile::TempDir;
use understory_regression::{ElementType, Image, write_metaimage};

/// A scratch directory holding test outputs and baselines.
pub(crate) struct Fixture {
    dir: TempDir,
}

#[allow(
    dead_code,
    reason = "Each integration test binary uses a different subset of the helpers."
)]
impl Fixture {
    pub(crate) fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub(crate) fn root(&self) -> &Path {
        self.dir.path()
    }

    pub(crate) fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes a gray PNG whose pixel `(x, y)` is `f(x, y)`.
    pub(crate) fn png(
        &self,
        name: &str,
        width: u32,
        height: u32,
        f: impl Fn(u32, u32) -> u8,
    ) -> PathBuf {
        let image = RgbaImage::from_fn(width, height, |x, y| {
            let v = f(x, y);
            Rgba([v, v, v, 255])
        });
        let path = self.path(name);
        fs::write(&path, image_to_png(&image, SizeOptimizationLevel::Fast)).expect("write png");
        path
    }

    /// Writes a gray PNG filled with `value`.
    pub(crate) fn flat_png(&self, name: &str, width: u32, height: u32, value: u8) -> PathBuf {
        self.png(name, width, height, |_, _| value)
    }

    /// Writes `image` as a MetaImage volume.
    pub(crate) fn volume(&self, name: &str, image: &Image) -> PathBuf {
        let path = self.path(name);
        write_metaimage(&path, image, ElementType::Double).expect("write volume");
        path
    }

    /// File names in the fixture directory, sorted.
    pub(crate) fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.root())
            .expect("list fixture dir")
            .map(|entry| {
                entry
                    .expect("dir entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }
}

/// Gray levels of a PNG written by the renderer, row by row.
#[allow(dead_code, reason = "Not every test binary inspects rendered artifacts.")]
pub(crate) fn png_levels(path: &Path) -> (u32, u32, Vec<u8>) {
    let image = kompari::load_image(path).expect("load rendered png");
    let (width, height) = image.dimensions();
    let levels = image
        .pixels()
        .map(|p| {
            assert_eq!(p[0], p[1], "rendered artifacts are gray");
            assert_eq!(p[1], p[2], "rendered artifacts are gray");
            p[0]
        })
        .collect();
    (width, height, levels)
}
