// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Alternate baseline discovery on a real filesystem.

use understory_regression::{RegressionError, enumerate_baselines};

mod common;

use common::Fixture;

#[test]
fn stops_at_the_first_missing_alternate() {
    let fx = Fixture::new();
    let canonical = fx.flat_png("x.png", 2, 2, 0);
    let first = fx.flat_png("x.1.png", 2, 2, 0);
    let second = fx.flat_png("x.2.png", 2, 2, 0);
    // x.3.png is missing, so x.4.png is never reached.
    fx.flat_png("x.4.png", 2, 2, 0);

    let candidates = enumerate_baselines(&canonical).unwrap();
    assert_eq!(candidates, vec![canonical, first, second]);
}

#[test]
fn canonical_is_listed_even_when_absent() {
    let fx = Fixture::new();
    let canonical = fx.path("missing.png");
    assert_eq!(enumerate_baselines(&canonical).unwrap(), vec![canonical]);
}

#[test]
fn alternates_of_other_baselines_are_ignored() {
    let fx = Fixture::new();
    let canonical = fx.flat_png("x.png", 2, 2, 0);
    fx.flat_png("y.1.png", 2, 2, 0);
    fx.flat_png("x.1.jpg", 2, 2, 0);

    assert_eq!(enumerate_baselines(&canonical).unwrap(), vec![canonical]);
}

#[cfg(unix)]
#[test]
fn failing_probe_is_an_error() {
    let fx = Fixture::new();
    // A regular file used as a directory makes the probe fail with ENOTDIR rather than
    // answering "absent".
    std::fs::write(fx.path("plain"), b"not a directory").unwrap();
    let canonical = fx.path("plain").join("x.png");

    let err = enumerate_baselines(&canonical).unwrap_err();
    assert!(matches!(err, RegressionError::BaselineProbe { .. }), "{err}");
    assert_eq!(err.status().code(), 1000);
}
