// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Parsers for code coverage reports, and conversion into one canonical list
//! of covered source regions.
//!
//! ```
//! let report = cov_report::parse(b"mode: set\npkg/foo.go:1.2,3.4 5 1\n").unwrap();
//!
//! assert_eq!(report.regions.len(), 1);
//! assert_eq!(report.regions[0].file, "pkg/foo.go");
//! ```

pub mod ctxerr;
pub mod cursor;
pub mod field;
pub mod golang;
pub mod jacoco;
pub mod lcov;
pub mod report;

pub use report::{
    parse, parse_with, Format, InvalidReport, RawReport, Region, Report, DEFAULT_MAX_REPORT_SIZE,
};
