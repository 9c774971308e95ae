// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reading and decoding single fields of line-oriented reports.

use std::num::{NonZeroU32, ParseIntError};
use std::str::{FromStr, Utf8Error};

use thiserror::Error;

use crate::cursor::{Cursor, CursorError};

/// A field could not be read or decoded.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error(transparent)]
    Cursor(#[from] CursorError),

    #[error(transparent)]
    Utf8(#[from] Utf8Error),

    #[error(transparent)]
    Number(#[from] ParseIntError),

    #[error("field is empty")]
    Empty,

    #[error("field spans a line break")]
    LineBreak,

    #[error("end line is before the start line")]
    Reversed,

    #[error("line number is out of range")]
    OutOfRange,
}

/// Read a non-empty field ending in `separator`. A field never continues onto
/// the next line.
pub(crate) fn read_field<'a>(
    cursor: &mut Cursor<'a>,
    separator: u8,
) -> Result<&'a [u8], FieldError> {
    let field = cursor.read_till(separator)?;

    if field.is_empty() {
        return Err(FieldError::Empty);
    }

    if field.contains(&b'\n') {
        return Err(FieldError::LineBreak);
    }

    Ok(field)
}

/// Read the field that ends the current line.
pub(crate) fn read_last_field<'a>(cursor: &mut Cursor<'a>) -> Result<&'a [u8], FieldError> {
    Ok(cursor.read_line()?)
}

pub(crate) fn text(field: &[u8]) -> Result<String, FieldError> {
    Ok(std::str::from_utf8(field)?.to_owned())
}

/// A base-10 unsigned integer.
pub(crate) fn number<T>(field: &[u8]) -> Result<T, FieldError>
where
    T: FromStr<Err = ParseIntError>,
{
    Ok(std::str::from_utf8(field)?.parse()?)
}

/// A 1-indexed line or column number.
pub(crate) fn position(field: &[u8]) -> Result<u32, FieldError> {
    number::<NonZeroU32>(field).map(NonZeroU32::get)
}
