// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use cov_report::{Format, Report, DEFAULT_MAX_REPORT_SIZE};

/// Convert coverage reports to canonical JSON regions.
#[derive(Parser, Debug)]
struct Opt {
    #[arg(required = true, num_args = 1..)]
    reports: Vec<PathBuf>,

    /// Formats to try, in order. Defaults to every format.
    #[arg(short, long, value_delimiter = ',')]
    format: Vec<Format>,

    /// Skip reports larger than this many bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_REPORT_SIZE)]
    max_size: u64,

    /// Print one line of JSON per report.
    #[arg(short, long)]
    compact: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let opt = Opt::parse();

    let formats = if opt.format.is_empty() {
        Format::ALL.to_vec()
    } else {
        opt.format.clone()
    };

    let mut failed = false;

    for path in &opt.reports {
        match parse_report(path, &formats, opt.max_size)? {
            Some(report) => print_report(&report, opt.compact)?,
            None => failed = true,
        }
    }

    if failed {
        process::exit(1);
    }

    Ok(())
}

fn parse_report(path: &Path, formats: &[Format], max_size: u64) -> Result<Option<Report>> {
    let size = fs::metadata(path)
        .with_context(|| format!("unable to stat report: {}", path.display()))?
        .len();

    if size > max_size {
        eprintln!(
            "error: {}: report is {size} bytes, limit is {max_size}",
            path.display()
        );
        return Ok(None);
    }

    let data =
        fs::read(path).with_context(|| format!("unable to read report: {}", path.display()))?;

    match cov_report::parse_with(&data, formats) {
        Ok(report) => Ok(Some(report)),
        Err(err) => {
            eprintln!("error: {}: {err}", path.display());
            Ok(None)
        }
    }
}

fn print_report(report: &Report, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(report)?
    } else {
        serde_json::to_string_pretty(report)?
    };

    println!("{json}");

    Ok(())
}
