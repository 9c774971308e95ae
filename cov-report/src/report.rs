// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The canonical, tool-agnostic coverage report, and the entry points that
//! detect a report's format and convert it.

use std::fmt;
use std::str::FromStr;

use log::{debug, trace};
use serde::Serialize;
use thiserror::Error;

use crate::{golang, jacoco, lcov};

/// Upper bound on the size of a report read by the bundled tools.
///
/// The parsers themselves hold the whole input in memory and never check.
pub const DEFAULT_MAX_REPORT_SIZE: u64 = 64 * 1024 * 1024;

/// No format accepted the input.
///
/// Which format was intended can't be known, so the cause of each rejection
/// is dropped.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("invalid report")]
pub struct InvalidReport;

/// A report format understood by [`parse_with`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Format {
    /// `go test -coverprofile` output.
    Go,

    /// JaCoCo XML.
    Jacoco,

    /// LCOV tracefile.
    Lcov,
}

impl Format {
    /// Every format, in the order [`parse`] tries them.
    pub const ALL: [Self; 3] = [Self::Go, Self::Jacoco, Self::Lcov];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Jacoco => "jacoco",
            Self::Lcov => "lcov",
        }
    }

    fn parse(&self, data: &[u8]) -> Option<Report> {
        let report: Report = match self {
            Self::Go => golang::Report::parse(data).ok()?.into(),
            Self::Jacoco => jacoco::Report::parse(data).ok()?.into(),
            Self::Lcov => lcov::Report::parse(data).ok()?.into(),
        };

        Some(report)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown report format `{0}`, expected one of `go`, `jacoco`, `lcov`")]
pub struct UnknownFormat(String);

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| UnknownFormat(s.to_owned()))
    }
}

/// Parse a report of any supported format.
///
/// Formats are tried in the order of [`Format::ALL`].
pub fn parse(data: &[u8]) -> Result<Report, InvalidReport> {
    parse_with(data, &Format::ALL)
}

/// Parse a report, trying only `formats`, in order.
pub fn parse_with(data: &[u8], formats: &[Format]) -> Result<Report, InvalidReport> {
    for format in formats {
        match format.parse(data) {
            Some(report) => {
                debug!(
                    "parsed {format} report with {} regions",
                    report.regions.len()
                );
                return Ok(report);
            }
            None => trace!("input is not a {format} report"),
        }
    }

    debug!("no report format matched {} bytes of input", data.len());

    Err(InvalidReport)
}

/// A coverage report in canonical form.
///
/// Serializes as `{"regions": [...]}`. The format-specific tree is only kept
/// for in-process consumers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    #[serde(skip)]
    pub raw: RawReport,

    pub regions: Vec<Region>,
}

/// The report as parsed, before conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawReport {
    Go(golang::Report),
    Jacoco(jacoco::Report),
    Lcov(lcov::Report),
}

impl RawReport {
    pub fn format(&self) -> Format {
        match self {
            Self::Go(_) => Format::Go,
            Self::Jacoco(_) => Format::Jacoco,
            Self::Lcov(_) => Format::Lcov,
        }
    }
}

/// A span of source code and how often it ran.
///
/// Lines and columns are 1-indexed. A `to_column` of 0 means the region ends
/// at the end of the line before `to_line`, so a region covering exactly line
/// `n` is `n:0` to `n + 1:0`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Region {
    pub file: String,
    pub from_line: u32,
    pub to_line: u32,
    pub from_column: u32,
    pub to_column: u32,

    pub statements: u64,

    /// Not bounded by `statements`.
    pub executions: u64,
}

impl Region {
    /// A region spanning all of line `line`.
    fn whole_line(file: &str, line: u32, statements: u64, executions: u64) -> Self {
        Self {
            file: file.to_owned(),
            from_line: line,
            to_line: line.saturating_add(1),
            from_column: 0,
            to_column: 0,
            statements,
            executions,
        }
    }
}

impl From<&golang::Region> for Region {
    fn from(region: &golang::Region) -> Self {
        Self {
            file: region.file.clone(),
            from_line: region.start_line,
            to_line: region.end_line,
            from_column: region.start_column,
            to_column: region.end_column,
            statements: region.statements.into(),
            executions: region.executed,
        }
    }
}

impl From<golang::Report> for Report {
    fn from(report: golang::Report) -> Self {
        let regions = report.regions.iter().map(Region::from).collect();

        Self {
            raw: RawReport::Go(report),
            regions,
        }
    }
}

// Only per-line data is converted. Class, method and package counters are
// summaries of the same lines.
impl From<jacoco::Report> for Report {
    fn from(report: jacoco::Report) -> Self {
        let regions = report
            .source_files()
            .flat_map(|file| {
                file.lines.iter().map(move |line| {
                    let covered = u64::from(line.covered_instructions);
                    let missed = u64::from(line.missed_instructions);

                    Region::whole_line(&file.name, line.number, covered + missed, covered)
                })
            })
            .collect();

        Self {
            raw: RawReport::Jacoco(report),
            regions,
        }
    }
}

impl From<lcov::Report> for Report {
    fn from(report: lcov::Report) -> Self {
        let regions = report
            .records
            .iter()
            .flat_map(|record| {
                record.lines.iter().map(move |line| {
                    Region::whole_line(&record.source_file, line.number, 1, line.executions)
                })
            })
            .collect();

        Self {
            raw: RawReport::Lcov(report),
            regions,
        }
    }
}
