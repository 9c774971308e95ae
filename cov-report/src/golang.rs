// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Go coverage profiles, as written by `go test -coverprofile`.
//!
//! ```text
//! mode: set
//! pkg/foo.go:1.2,3.4 5 6
//! ```

use std::error::Error;
use std::fmt;

use thiserror::Error;

use crate::ctxerr::{ContextualError, WithContext};
use crate::cursor::{Cursor, CursorError};
use crate::field::{number, position, read_field, read_last_field, text, FieldError};

/// A parsed Go coverage profile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub mode: Mode,
    pub regions: Vec<Region>,
}

impl Report {
    /// Parse a whole profile. Any malformed line fails the whole report.
    pub fn parse(data: &[u8]) -> Result<Self, InvalidReport> {
        let mut cursor = Cursor::new(data);

        let mode = parse_mode(&mut cursor)
            .context("parsing mode string")
            .map_err(InvalidReport::caused_by)?;

        let mut regions = Vec::new();

        loop {
            // Peek at the whole line first so blank lines can be skipped, then
            // rewind and read it field by field.
            cursor.mark();

            let line = match cursor.read_line() {
                Ok(line) => line,
                Err(CursorError::EndOfInput) => break,
                Err(err) => return Err(InvalidReport::with_cause(err, "reading line")),
            };

            if line.is_empty() {
                continue;
            }

            cursor.reset();

            let region = parse_region(&mut cursor)
                .map_err(|err| InvalidReport::with_cause(err, "parsing region"))?;
            regions.push(region);
        }

        Ok(Self { mode, regions })
    }
}

/// How the `executed` counter of each region should be read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Was the region executed at all? `executed` is 0 or 1.
    Set,

    /// How many times was the region executed? Racy in concurrent programs.
    Count,

    /// How many times was the region executed? Safe in concurrent programs.
    Atomic,

    /// Never produced by a successful parse.
    #[default]
    Unknown,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Set => "set",
            Self::Count => "count",
            Self::Atomic => "atomic",
            Self::Unknown => "unknown",
        }
    }

    fn from_line(line: &[u8]) -> Option<Self> {
        match line {
            b"mode: set" => Some(Self::Set),
            b"mode: count" => Some(Self::Count),
            b"mode: atomic" => Some(Self::Atomic),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block of a Go profile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Region {
    /// Usually an import path followed by the file name.
    pub file: String,

    /// 1-indexed.
    pub start_line: u32,

    /// 1-indexed.
    pub start_column: u32,

    /// 1-indexed, inclusive.
    pub end_line: u32,

    /// 1-indexed, inclusive.
    pub end_column: u32,

    /// Number of statements in the block.
    pub statements: u32,

    /// Execution count of the block, or 0/1 in [`Mode::Set`].
    ///
    /// Not bounded by `statements`.
    pub executed: u64,
}

fn parse_mode(cursor: &mut Cursor<'_>) -> Result<Mode, Cause> {
    let line = read_last_field(cursor).context("reading mode line")?;

    Mode::from_line(line).ok_or_else(|| InvalidReport::new("mode line is not valid").into())
}

// file_path:start_line.start_column,end_line.end_column statements executed
fn parse_region(cursor: &mut Cursor<'_>) -> Result<Region, ContextualError<FieldError>> {
    let file = read_field(cursor, b':').context("reading file path")?;
    let file = text(file).context("parsing file path")?;

    let start_line = read_field(cursor, b'.').context("reading start line")?;
    let start_line = position(start_line).context("parsing start line")?;

    let start_column = read_field(cursor, b',').context("reading start column")?;
    let start_column = position(start_column).context("parsing start column")?;

    let end_line = read_field(cursor, b'.').context("reading end line")?;
    let end_line = position(end_line).context("parsing end line")?;
    if end_line < start_line {
        return Err(FieldError::Reversed).context("parsing end line");
    }

    let end_column = read_field(cursor, b' ').context("reading end column")?;
    let end_column = position(end_column).context("parsing end column")?;

    let statements = read_field(cursor, b' ').context("reading statements")?;
    let statements = number(statements).context("parsing statements")?;

    let executed = read_last_field(cursor).context("reading executed")?;
    let executed = number(executed).context("parsing executed")?;

    Ok(Region {
        file,
        start_line,
        start_column,
        end_line,
        end_column,
        statements,
        executed,
    })
}

/// The profile is not a valid Go coverage profile.
///
/// Both the context and the cause are optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InvalidReport {
    context: Option<&'static str>,
    cause: Option<Box<Cause>>,
}

impl InvalidReport {
    pub fn new(context: &'static str) -> Self {
        Self {
            context: Some(context),
            cause: None,
        }
    }

    pub fn with_cause(cause: impl Into<Cause>, context: &'static str) -> Self {
        Self {
            context: Some(context),
            cause: Some(Box::new(cause.into())),
        }
    }

    pub fn caused_by(cause: impl Into<Cause>) -> Self {
        Self {
            context: None,
            cause: Some(Box::new(cause.into())),
        }
    }

    pub fn context(&self) -> Option<&'static str> {
        self.context
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_deref()
    }
}

impl fmt::Display for InvalidReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid report")?;

        if let Some(context) = self.context {
            write!(f, " ({context})")?;
        }

        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }

        Ok(())
    }
}

impl Error for InvalidReport {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn Error + 'static))
    }
}

/// Why a profile was rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Cause {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Invalid(Box<InvalidReport>),

    #[error(transparent)]
    Context(Box<ContextualError<Cause>>),
}

impl Cause {
    /// The innermost cause, skipping every context and report wrapper.
    pub fn root(&self) -> &Cause {
        match self {
            Self::Context(inner) => ContextualError::cause(inner).root(),
            Self::Invalid(inner) => match InvalidReport::cause(inner) {
                Some(cause) => cause.root(),
                None => self,
            },
            Self::Field(_) => self,
        }
    }
}

impl From<CursorError> for Cause {
    fn from(err: CursorError) -> Self {
        Self::Field(err.into())
    }
}

impl From<InvalidReport> for Cause {
    fn from(err: InvalidReport) -> Self {
        Self::Invalid(Box::new(err))
    }
}

impl From<ContextualError<Cause>> for Cause {
    fn from(err: ContextualError<Cause>) -> Self {
        Self::Context(Box::new(err))
    }
}

impl From<ContextualError<FieldError>> for Cause {
    fn from(err: ContextualError<FieldError>) -> Self {
        let context = err.context();
        ContextualError::new(Self::Field(err.into_cause()), context).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use pretty_assertions::assert_eq;
    use std::num::IntErrorKind;

    fn region(
        file: &str,
        (start_line, start_column): (u32, u32),
        (end_line, end_column): (u32, u32),
        statements: u32,
        executed: u64,
    ) -> Region {
        Region {
            file: file.to_owned(),
            start_line,
            start_column,
            end_line,
            end_column,
            statements,
            executed,
        }
    }

    #[test]
    fn parse_report_with_no_regions() -> Result<()> {
        for mode in [Mode::Set, Mode::Count, Mode::Atomic] {
            let text = format!("mode: {mode}\n");
            let report = Report::parse(text.as_bytes())?;

            assert_eq!(report.mode, mode);
            assert!(report.regions.is_empty());
        }

        let report = Report::parse(b"mode: atomic")?;
        assert_eq!(report.mode, Mode::Atomic);
        assert!(report.regions.is_empty());

        Ok(())
    }

    #[test]
    fn parse_report_with_no_mode_line() {
        let err = Report::parse(b"").unwrap_err();
        assert_eq!(
            err.cause().map(Cause::root),
            Some(&Cause::Field(CursorError::EndOfInput.into()))
        );

        assert!(Report::parse(b"\n").is_err());
        assert!(Report::parse(b"pkg/foo.go:1.2,3.4 5 6\n").is_err());
    }

    #[test]
    fn parse_report_with_invalid_mode() {
        for text in ["mode: \n", "mode: invalid\n", "mode: set \n", "Mode: set\n"] {
            let err = Report::parse(text.as_bytes()).unwrap_err();

            let mode_err = Cause::from(InvalidReport::new("mode line is not valid"));
            assert_eq!(err.cause().map(Cause::root), Some(&mode_err));
        }
    }

    #[test]
    fn invalid_mode_message_names_each_layer() {
        let err = Report::parse(b"mode: invalid\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid report: parsing mode string: invalid report (mode line is not valid)"
        );
    }

    #[test]
    fn parse_report_with_one_region() -> Result<()> {
        let report = Report::parse(b"mode: set\npkg/foo.go:1.2,3.4 5 6")?;

        assert_eq!(
            report,
            Report {
                mode: Mode::Set,
                regions: vec![region("pkg/foo.go", (1, 2), (3, 4), 5, 6)],
            }
        );

        Ok(())
    }

    #[test]
    fn parse_report_with_multiple_regions_and_blank_lines() -> Result<()> {
        let text = "mode: count

github.com/owner/repo/file.go:1.2,3.4 5 6

github.com/owner/repo/file.go:7.8,9.10 11 12

";
        let report = Report::parse(text.as_bytes())?;

        assert_eq!(
            report,
            Report {
                mode: Mode::Count,
                regions: vec![
                    region("github.com/owner/repo/file.go", (1, 2), (3, 4), 5, 6),
                    region("github.com/owner/repo/file.go", (7, 8), (9, 10), 11, 12),
                ],
            }
        );

        Ok(())
    }

    #[test]
    fn crlf_parses_like_lf() -> Result<()> {
        let lf = Report::parse(b"mode: atomic\na.go:1.2,3.4 5 6\nb.go:7.8,9.10 11 12\n")?;
        let crlf =
            Report::parse(b"mode: atomic\r\na.go:1.2,3.4 5 6\r\n\r\nb.go:7.8,9.10 11 12\r\n")?;

        assert_eq!(crlf, lf);
        assert_eq!(crlf.regions.len(), 2);

        Ok(())
    }

    #[test]
    fn executed_may_exceed_statements() -> Result<()> {
        let report = Report::parse(b"mode: count\na.go:3.14,5.2 1 8589934592\n")?;
        assert_eq!(report.regions[0].executed, 8_589_934_592);

        Ok(())
    }

    #[test]
    fn malformed_region_fails_whole_report() {
        let cases = [
            "mode: atomic\ngithub.com/owner/repo/file.go:1,2.3,4 5 6",
            "mode: atomic\ngithub.com/owner/repo/file.go",
            "mode: atomic\n:1.2,3.4 5 6",
            "mode: atomic\na.go:1.2,3.4 5",
            "mode: atomic\na.go:1.2,3.4 5 6 7",
            "mode: atomic\na.go:1.2,3.4 5 -6",
            "mode: atomic\na.go:1.2,3.4 5 6\nnot a region\n",
            "mode: atomic\na.go:0.2,3.4 5 6",
            "mode: atomic\na.go:5.1,3.1 1 1",
        ];

        for text in cases {
            let err = Report::parse(text.as_bytes()).unwrap_err();
            assert_eq!(err.context(), Some("parsing region"), "{text:?}");
        }
    }

    #[test]
    fn region_errors_carry_field_context() {
        let err = Report::parse(b"mode: set\na.go:1.x,3.4 5 6").unwrap_err();

        let Some(Cause::Context(field)) = err.cause() else {
            panic!("expected a field context, got {err:?}");
        };
        assert_eq!(field.context(), "parsing start column");
        assert!(matches!(
            ContextualError::cause(field),
            Cause::Field(FieldError::Number(_))
        ));

        let err = Report::parse(b"mode: set\na.go:0.1,3.4 5 6").unwrap_err();
        let Some(Cause::Field(FieldError::Number(number))) = err.cause().map(Cause::root) else {
            panic!("expected a number error, got {err:?}");
        };
        assert_eq!(number.kind(), &IntErrorKind::Zero);
    }

    #[test]
    fn regions_may_not_end_before_they_start() -> Result<()> {
        let err = Report::parse(b"mode: set\na.go:5.1,3.1 1 1\n").unwrap_err();
        assert_eq!(
            err.cause().map(Cause::root),
            Some(&Cause::Field(FieldError::Reversed))
        );

        let report = Report::parse(b"mode: set\na.go:3.9,3.1 1 1\n")?;
        assert_eq!(report.regions[0].end_line, 3);

        Ok(())
    }

    #[test]
    fn fields_do_not_span_lines() {
        let err = Report::parse(b"mode: set\na.go\nb.go:1.2,3.4 5 6").unwrap_err();
        assert_eq!(
            err.cause().map(Cause::root),
            Some(&Cause::Field(FieldError::LineBreak))
        );

        let err = Report::parse(b"mode: set\na.go:1.2,3.4 5\n6 7").unwrap_err();
        assert_eq!(
            err.cause().map(Cause::root),
            Some(&Cause::Field(FieldError::LineBreak))
        );
    }

    #[test]
    fn xml_is_not_a_profile() {
        let text = r#"<?xml version="1.0" encoding="UTF-8"?>
<coverage version="1.0">
</coverage>"#;

        let err = Report::parse(text.as_bytes()).unwrap_err();
        assert_eq!(err.context(), None);
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_report_messages() {
        assert_eq!(InvalidReport::default().to_string(), "invalid report");
        assert_eq!(
            InvalidReport::new("reading line").to_string(),
            "invalid report (reading line)"
        );
        assert_eq!(
            InvalidReport::caused_by(CursorError::EndOfInput).to_string(),
            "invalid report: end of input"
        );
        assert_eq!(
            InvalidReport::with_cause(FieldError::Empty, "parsing region").to_string(),
            "invalid report (parsing region): field is empty"
        );
    }
}
