// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! LCOV tracefiles, as described in the `TRACEFILE FORMAT` section of
//! `geninfo(1)`.
//!
//! ```text
//! TN:<test name>
//! SF:<source file>
//! FN:<line>[,<end line>],<function name>
//! FNDA:<execution count>,<function name>
//! DA:<line>,<execution count>[,<checksum>]
//! BRDA:<line>,[e]<block>,<branch>,<taken>
//! LF:<lines found>
//! LH:<lines hit>
//! end_of_record
//! ```

use thiserror::Error;

use crate::ctxerr::{ContextualError, WithContext};
use crate::cursor::{Cursor, CursorError};
use crate::field::{number, position, read_field, text, FieldError};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid report at line {line}: {error}")]
pub struct InvalidReport {
    /// 1-indexed line of the tracefile where parsing stopped.
    pub line: usize,

    #[source]
    pub error: ContextualError<Cause>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Cause {
    #[error(transparent)]
    Field(#[from] FieldError),

    #[error("unknown key `{0}`")]
    UnknownKey(String),

    #[error("line is not `<key>:<value>`")]
    MissingKey,

    #[error("no source file record is open")]
    NoOpenRecord,

    #[error("previous source file record was not closed")]
    UnclosedRecord,

    #[error("no function named `{0}`")]
    UnknownFunction(String),

    #[error("no function with index {0}")]
    UnknownFunctionIndex(u32),

    #[error("tracefile has no records")]
    NoRecords,
}

impl From<CursorError> for Cause {
    fn from(err: CursorError) -> Self {
        Self::Field(err.into())
    }
}

/// A parsed tracefile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub records: Vec<Record>,
}

/// Coverage of one source file for one test.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Record {
    /// Empty if the tracefile did not name the test.
    pub test_name: String,

    pub source_file: String,

    /// Source code version identifier, if any.
    pub version: Option<String>,

    pub functions: Vec<Function>,
    pub functions_found: Option<u32>,
    pub functions_hit: Option<u32>,

    pub lines: Vec<LineHits>,
    pub lines_found: Option<u32>,
    pub lines_hit: Option<u32>,

    pub branches: Vec<Branch>,
    pub branches_found: Option<u32>,
    pub branches_hit: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub start_line: u32,
    pub end_line: Option<u32>,

    /// `None` if no `FNDA` entry was given for the function.
    pub executions: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineHits {
    pub number: u32,
    pub executions: u64,
    pub checksum: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Branch {
    pub line: u32,

    /// The branch is only taken when an exception is thrown.
    pub exception: bool,

    pub block: u32,

    /// Free-form branch identifier.
    pub branch: String,

    /// `None` if the enclosing block never ran (`-`).
    pub taken: Option<u64>,
}

impl Report {
    pub fn parse(data: &[u8]) -> Result<Self, InvalidReport> {
        let mut cursor = Cursor::new(data);
        let mut parser = Parser::default();
        let mut line_number = 0;

        loop {
            let comment = match cursor.peek() {
                Ok(byte) => byte == b'#',
                Err(_) => break,
            };

            line_number += 1;

            let line = cursor.read_line().map_err(|err| InvalidReport {
                line: line_number,
                error: ContextualError::new(err.into(), "reading line"),
            })?;

            if comment || line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            parser.line(line).map_err(|error| InvalidReport {
                line: line_number,
                error,
            })?;
        }

        parser.finish().map_err(|error| InvalidReport {
            line: line_number,
            error,
        })
    }
}

/// Function leaders from `FNL`, by index, for the open record.
#[derive(Clone, Copy, Debug)]
struct Leader {
    index: u32,
    start_line: u32,
    end_line: Option<u32>,
}

#[derive(Debug, Default)]
struct Parser {
    test_name: String,
    open: Option<Record>,
    leaders: Vec<Leader>,
    records: Vec<Record>,
}

impl Parser {
    fn line(&mut self, line: &[u8]) -> Result<(), ContextualError<Cause>> {
        if line == b"end_of_record" {
            return self.close().context("closing record");
        }

        let mut fields = Cursor::new(line);
        let key = fields
            .read_till(b':')
            .map_err(|_| Cause::MissingKey)
            .context("reading key")?;

        match key {
            b"TN" => {
                self.test_name = text(fields.read_rest())
                    .map_err(Cause::from)
                    .context("parsing test name")?;
            }
            b"SF" => {
                let source_file = text(fields.read_rest())
                    .map_err(Cause::from)
                    .context("parsing source file")?;
                self.open(source_file).context("opening record")?;
            }
            b"VER" => {
                let version = text(fields.read_rest())
                    .map_err(Cause::from)
                    .context("parsing version")?;
                self.record().context("reading version")?.version = Some(version);
            }
            b"FN" => {
                let function = parse_function(&mut fields).context("parsing function")?;
                self.record().context("reading function")?.functions.push(function);
            }
            b"FNDA" => {
                let (executions, name) =
                    parse_function_data(&mut fields).context("parsing function data")?;
                self.function_data(executions, name)
                    .context("reading function data")?;
            }
            b"FNL" => {
                let leader = parse_leader(&mut fields).context("parsing function leader")?;
                self.record().context("reading function leader")?;
                self.leaders.push(leader);
            }
            b"FNA" => {
                let (index, executions, name) =
                    parse_alias(&mut fields).context("parsing function alias")?;
                self.function_alias(index, executions, name)
                    .context("reading function alias")?;
            }
            b"FNF" => {
                let found = summary(&mut fields).context("parsing functions found")?;
                self.record().context("reading functions found")?.functions_found = Some(found);
            }
            b"FNH" => {
                let hit = summary(&mut fields).context("parsing functions hit")?;
                self.record().context("reading functions hit")?.functions_hit = Some(hit);
            }
            b"DA" => {
                let hits = parse_line_hits(&mut fields).context("parsing line data")?;
                self.record().context("reading line data")?.lines.push(hits);
            }
            b"LF" => {
                let found = summary(&mut fields).context("parsing lines found")?;
                self.record().context("reading lines found")?.lines_found = Some(found);
            }
            b"LH" => {
                let hit = summary(&mut fields).context("parsing lines hit")?;
                self.record().context("reading lines hit")?.lines_hit = Some(hit);
            }
            b"BRDA" => {
                let branch = parse_branch(&mut fields).context("parsing branch data")?;
                self.record().context("reading branch data")?.branches.push(branch);
            }
            b"BRF" => {
                let found = summary(&mut fields).context("parsing branches found")?;
                self.record().context("reading branches found")?.branches_found = Some(found);
            }
            b"BRH" => {
                let hit = summary(&mut fields).context("parsing branches hit")?;
                self.record().context("reading branches hit")?.branches_hit = Some(hit);
            }
            unknown => {
                let key = String::from_utf8_lossy(unknown).into_owned();
                return Err(Cause::UnknownKey(key)).context("reading key");
            }
        }

        Ok(())
    }

    fn open(&mut self, source_file: String) -> Result<(), Cause> {
        if self.open.is_some() {
            return Err(Cause::UnclosedRecord);
        }

        self.open = Some(Record {
            test_name: self.test_name.clone(),
            source_file,
            ..Record::default()
        });

        Ok(())
    }

    fn close(&mut self) -> Result<(), Cause> {
        let record = self.open.take().ok_or(Cause::NoOpenRecord)?;
        self.leaders.clear();
        self.records.push(record);

        Ok(())
    }

    fn record(&mut self) -> Result<&mut Record, Cause> {
        self.open.as_mut().ok_or(Cause::NoOpenRecord)
    }

    fn function_data(&mut self, executions: u64, name: String) -> Result<(), Cause> {
        let record = self.record()?;

        match record.functions.iter_mut().find(|f| f.name == name) {
            Some(function) => {
                *function.executions.get_or_insert(0) += executions;
                Ok(())
            }
            None => Err(Cause::UnknownFunction(name)),
        }
    }

    fn function_alias(&mut self, index: u32, executions: u64, name: String) -> Result<(), Cause> {
        let leader = self
            .leaders
            .iter()
            .find(|leader| leader.index == index)
            .copied()
            .ok_or(Cause::UnknownFunctionIndex(index))?;

        self.record()?.functions.push(Function {
            name,
            start_line: leader.start_line,
            end_line: leader.end_line,
            executions: Some(executions),
        });

        Ok(())
    }

    fn finish(self) -> Result<Report, ContextualError<Cause>> {
        if self.open.is_some() {
            return Err(Cause::UnclosedRecord).context("reading end of input");
        }

        if self.records.is_empty() {
            return Err(Cause::NoRecords).context("reading end of input");
        }

        Ok(Report {
            records: self.records,
        })
    }
}

// <line>[,<end line>],<name>
//
// Names may contain commas, so a second number is only an end line if it
// parses as one.
fn parse_function(fields: &mut Cursor<'_>) -> Result<Function, Cause> {
    let start_line = position(read_field(fields, b',')?)?;

    fields.mark();
    let end_line = read_field(fields, b',')
        .ok()
        .and_then(|field| position(field).ok());
    if end_line.is_none() {
        fields.reset();
    }

    let name = non_empty_text(fields.read_rest())?;

    Ok(Function {
        name,
        start_line,
        end_line,
        executions: None,
    })
}

// <execution count>,<name>
fn parse_function_data(fields: &mut Cursor<'_>) -> Result<(u64, String), Cause> {
    let executions = number(read_field(fields, b',')?)?;
    let name = non_empty_text(fields.read_rest())?;

    Ok((executions, name))
}

// <index>,<line>[,<end line>]
fn parse_leader(fields: &mut Cursor<'_>) -> Result<Leader, Cause> {
    let index = number(read_field(fields, b',')?)?;

    let (start_line, end_line) = match read_field(fields, b',') {
        Ok(start_line) => (start_line, Some(fields.read_rest())),
        Err(FieldError::Cursor(CursorError::UnexpectedEndOfInput)) => (fields.read_rest(), None),
        Err(err) => return Err(err.into()),
    };

    Ok(Leader {
        index,
        start_line: position(start_line)?,
        end_line: end_line.map(position).transpose()?,
    })
}

// <index>,<execution count>,<name>
fn parse_alias(fields: &mut Cursor<'_>) -> Result<(u32, u64, String), Cause> {
    let index = number(read_field(fields, b',')?)?;
    let executions = number(read_field(fields, b',')?)?;
    let name = non_empty_text(fields.read_rest())?;

    Ok((index, executions, name))
}

// <line>,<execution count>[,<checksum>]
fn parse_line_hits(fields: &mut Cursor<'_>) -> Result<LineHits, Cause> {
    let number_field = read_field(fields, b',')?;
    let rest = fields.read_rest();

    let mut rest = Cursor::new(rest);
    let (executions, checksum) = match rest.read_till(b',') {
        Ok(executions) => (executions, Some(text(rest.read_rest())?)),
        Err(_) => (rest.read_rest(), None),
    };

    // Each line must have a successor.
    let line = position(number_field)?;
    if line == u32::MAX {
        return Err(FieldError::OutOfRange.into());
    }

    Ok(LineHits {
        number: line,
        executions: number(executions)?,
        checksum,
    })
}

// <line>,[e]<block>,<branch>,<taken>
fn parse_branch(fields: &mut Cursor<'_>) -> Result<Branch, Cause> {
    let line = position(read_field(fields, b',')?)?;

    let mut block = read_field(fields, b',')?;
    let exception = block.first() == Some(&b'e');
    if exception {
        block = &block[1..];
    }
    let block = number(block)?;

    let branch = text(read_field(fields, b',')?)?;

    let taken = match fields.read_rest() {
        b"-" => None,
        taken => Some(number(taken)?),
    };

    Ok(Branch {
        line,
        exception,
        block,
        branch,
        taken,
    })
}

fn summary(fields: &mut Cursor<'_>) -> Result<u32, Cause> {
    Ok(number(fields.read_rest())?)
}

fn non_empty_text(field: &[u8]) -> Result<String, Cause> {
    if field.is_empty() {
        return Err(FieldError::Empty.into());
    }

    Ok(text(field)?)
}
