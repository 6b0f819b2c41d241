// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Verdicts and CI dashboard measurements.
//!
//! Measurements use the CTest/CDash "Dart" tag format so a dashboard scraping the test's
//! standard output picks up the error count and the diagnostic images:
//!
//! ```text
//! <DartMeasurement name="ImageError" type="numeric/double">12</DartMeasurement>
//! <DartMeasurementFile name="DifferenceImage" type="image/png">out/blur.png.diff.png</DartMeasurementFile>
//! ```

use std::fmt;
use std::io::{self, Write};
use std::path::Path;

use log::warn;

/// Verdict of one comparison, or of a whole run.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegressionStatus {
    /// The test image matched a baseline within tolerance.
    Pass,
    /// The images differ beyond tolerance, or their sizes differ.
    Fail,
    /// An image could not be read, so no verdict on its contents exists.
    ReadFailure,
}

impl RegressionStatus {
    /// Process exit code: 0, 1 or 1000.
    pub fn code(self) -> i32 {
        match self {
            Self::Pass => 0,
            Self::Fail => 1,
            Self::ReadFailure => 1000,
        }
    }

    /// Whether this is [`RegressionStatus::Pass`].
    pub fn is_pass(self) -> bool {
        self == Self::Pass
    }

    /// The more severe of two statuses.
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }
}

impl fmt::Display for RegressionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::ReadFailure => "read failure",
        };
        write!(f, "{label} ({})", self.code())
    }
}

/// One dashboard measurement line.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Measurement<'a> {
    /// An integer measurement, such as the number of differing pixels.
    Count {
        /// Measurement name.
        name: &'a str,
        /// Value.
        value: u64,
    },
    /// A floating point measurement.
    Numeric {
        /// Measurement name.
        name: &'a str,
        /// Value.
        value: f64,
    },
    /// A free-form string.
    Text {
        /// Measurement name.
        name: &'a str,
        /// Value.
        value: &'a str,
    },
    /// A PNG file the dashboard should attach.
    Image {
        /// Measurement name.
        name: &'a str,
        /// Location of the file.
        path: &'a Path,
    },
}

struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                c => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}

/// A `numeric/double` value. Infinities become the largest finite double of the same sign,
/// since dashboards reject `inf`.
struct Numeric(f64);

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_infinite() {
            write!(f, "{:e}", f64::MAX.copysign(self.0))
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl fmt::Display for Measurement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Count { name, value } => write!(
                f,
                r#"<DartMeasurement name="{}" type="numeric/double">{value}</DartMeasurement>"#,
                Escaped(name)
            ),
            Self::Numeric { name, value } => write!(
                f,
                r#"<DartMeasurement name="{}" type="numeric/double">{}</DartMeasurement>"#,
                Escaped(name),
                Numeric(value)
            ),
            Self::Text { name, value } => write!(
                f,
                r#"<DartMeasurement name="{}" type="text/string">{}</DartMeasurement>"#,
                Escaped(name),
                Escaped(value)
            ),
            Self::Image { name, path } => write!(
                f,
                r#"<DartMeasurementFile name="{}" type="image/png">{}</DartMeasurementFile>"#,
                Escaped(name),
                Escaped(&path.to_string_lossy())
            ),
        }
    }
}

/// Writes `measurement` as one line.
pub fn write_measurement(out: &mut dyn Write, measurement: &Measurement<'_>) -> io::Result<()> {
    writeln!(out, "{measurement}")
}

/// Writes `measurement`, logging instead of failing when the sink is broken.
pub(crate) fn emit(out: &mut dyn Write, measurement: &Measurement<'_>) {
    if let Err(err) = write_measurement(out, measurement) {
        warn!("failed to write measurement `{measurement}`: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(RegressionStatus::Pass.code(), 0);
        assert_eq!(RegressionStatus::Fail.code(), 1);
        assert_eq!(RegressionStatus::ReadFailure.code(), 1000);
        assert_eq!(
            RegressionStatus::Pass.worst(RegressionStatus::Fail),
            RegressionStatus::Fail
        );
        assert_eq!(
            RegressionStatus::ReadFailure.worst(RegressionStatus::Fail),
            RegressionStatus::ReadFailure
        );
    }

    #[test]
    fn dart_lines() {
        let mut out = Vec::new();
        write_measurement(
            &mut out,
            &Measurement::Count {
                name: "ImageError",
                value: 17,
            },
        )
        .unwrap();
        write_measurement(
            &mut out,
            &Measurement::Numeric {
                name: "ImageError Mean",
                value: 2.5,
            },
        )
        .unwrap();
        write_measurement(
            &mut out,
            &Measurement::Image {
                name: "DifferenceImage",
                path: Path::new("out/a&b.png.diff.png"),
            },
        )
        .unwrap();
        write_measurement(
            &mut out,
            &Measurement::Text {
                name: "BaselineImageName",
                value: "a.1.png",
            },
        )
        .unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            [
                r#"<DartMeasurement name="ImageError" type="numeric/double">17</DartMeasurement>"#,
                r#"<DartMeasurement name="ImageError Mean" type="numeric/double">2.5</DartMeasurement>"#,
                r#"<DartMeasurementFile name="DifferenceImage" type="image/png">out/a&amp;b.png.diff.png</DartMeasurementFile>"#,
                r#"<DartMeasurement name="BaselineImageName" type="text/string">a.1.png</DartMeasurement>"#,
            ]
        );
    }

    #[test]
    fn infinite_numbers_stay_parseable() {
        let line = |value| {
            Measurement::Numeric {
                name: "ImageError Maximum",
                value,
            }
            .to_string()
        };
        assert_eq!(
            line(f64::INFINITY),
            r#"<DartMeasurement name="ImageError Maximum" type="numeric/double">1.7976931348623157e308</DartMeasurement>"#
        );
        assert!(line(f64::NEG_INFINITY).contains(">-1.7976931348623157e308<"));
        assert!(line(0.125).contains(">0.125<"));
    }
}
