// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Forward-only scanning over an in-memory report.

use thiserror::Error;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum CursorError {
    /// Nothing is left to read. Callers treat this as a normal place to stop.
    #[error("end of input")]
    EndOfInput,

    /// The input ran out while a separator was still expected.
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
}

/// A byte cursor over an immutable buffer.
///
/// Every read advances the position. The only way back is a single saved
/// mark, which is consumed by [`Cursor::reset`].
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    mark: Option<usize>,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            mark: None,
        }
    }

    /// Byte offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Save the current position.
    pub fn mark(&mut self) {
        self.mark = Some(self.pos);
    }

    /// Return to the saved position and clear the mark.
    ///
    /// Does nothing if no mark is set.
    pub fn reset(&mut self) {
        if let Some(mark) = self.mark.take() {
            self.pos = mark;
        }
    }

    /// The next unread byte, without advancing.
    pub fn peek(&self) -> Result<u8, CursorError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(CursorError::EndOfInput)
    }

    pub fn read_byte(&mut self) -> Result<u8, CursorError> {
        let byte = self.peek()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read up to the next `\n` or the end of the buffer, whichever is first.
    ///
    /// The line ending is consumed but not returned, and a trailing `\r` is
    /// stripped. A final line without a line ending is still a line.
    pub fn read_line(&mut self) -> Result<&'a [u8], CursorError> {
        let rest = self.remaining()?;

        let (line, consumed) = match rest.iter().position(|&b| b == b'\n') {
            Some(end) => (&rest[..end], end + 1),
            None => (rest, rest.len()),
        };
        self.pos += consumed;

        Ok(line.strip_suffix(b"\r").unwrap_or(line))
    }

    /// Read up to the next `separator`, consuming but not returning it.
    ///
    /// If the input runs out first, the position is left unchanged.
    pub fn read_till(&mut self, separator: u8) -> Result<&'a [u8], CursorError> {
        let rest = self.remaining()?;

        let end = rest
            .iter()
            .position(|&b| b == separator)
            .ok_or(CursorError::UnexpectedEndOfInput)?;
        self.pos += end + 1;

        Ok(&rest[..end])
    }

    /// Read everything left, which may be nothing.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = self.data.get(self.pos..).unwrap_or_default();
        self.pos = self.data.len();
        rest
    }

    fn remaining(&self) -> Result<&'a [u8], CursorError> {
        match self.data.get(self.pos..) {
            Some(rest) if !rest.is_empty() => Ok(rest),
            _ => Err(CursorError::EndOfInput),
        }
    }
}
