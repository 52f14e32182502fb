//! Bounds-checked little-endian reader over a byte buffer.
//!
//! Reads come in two forms: offset-based (`*_at`) that leave the reader
//! untouched, and cursor-based (`read_*`) that advance the current
//! position. Every read checks that it fits in the buffer and fails with
//! [`DexError::OutOfBounds`] otherwise.

use crate::errors::{DexError, DexResult};
use dc_utils::leb::{Sleb128, Uleb128};
use nom::bytes::complete::take_till;
use nom::combinator::verify;
use nom::error::ErrorKind;
use nom::number::complete::{le_u16, le_u32, le_u64, le_u8};
use nom::{Finish, IResult, Offset};

/// Longest LEB128 encoding of a 32-bit value.
const MAX_LEB128_SIZE: usize = 5;

#[derive(Debug, Clone)]
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Moves the cursor, `offset` being allowed to point right after the
    /// last byte.
    pub fn seek(&mut self, offset: usize) -> DexResult<()> {
        if offset > self.data.len() {
            return Err(self.out_of_bounds(offset, 0));
        }
        self.pos = offset;
        Ok(())
    }

    /// Saves the cursor position, to be given back to [`Reader::restore`].
    #[inline]
    #[must_use]
    pub const fn save(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn restore(&mut self, saved: usize) {
        self.pos = saved.min(self.data.len());
    }

    /// Returns `len` bytes starting at `offset`, without copying.
    pub fn bytes_at(&self, offset: usize, len: usize) -> DexResult<&'a [u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| self.out_of_bounds(offset, len))?;
        self.data
            .get(offset..end)
            .ok_or_else(|| self.out_of_bounds(offset, len))
    }

    pub fn u8_at(&self, offset: usize) -> DexResult<u8> {
        self.fixed_at(offset, 1, le_u8)
    }

    pub fn u16_at(&self, offset: usize) -> DexResult<u16> {
        self.fixed_at(offset, 2, le_u16)
    }

    pub fn u32_at(&self, offset: usize) -> DexResult<u32> {
        self.fixed_at(offset, 4, le_u32)
    }

    pub fn u64_at(&self, offset: usize) -> DexResult<u64> {
        self.fixed_at(offset, 8, le_u64)
    }

    /// Reads an unsigned LEB128 value, returning it along with the number
    /// of bytes it spans.
    pub fn uleb128_at(&self, offset: usize) -> DexResult<(Uleb128, usize)> {
        self.parse_at(offset, uleb128)
    }

    /// Reads a signed LEB128 value, returning it along with the number of
    /// bytes it spans.
    pub fn sleb128_at(&self, offset: usize) -> DexResult<(Sleb128, usize)> {
        self.parse_at(offset, sleb128)
    }

    /// Runs a nom parser at `offset`, returning its output and the number
    /// of bytes it consumed.
    ///
    /// A parser running out of input is reported as an out of bounds read
    /// starting where it failed.
    pub fn parse_at<T>(
        &self,
        offset: usize,
        mut parser: impl FnMut(&'a [u8]) -> IResult<&'a [u8], T, DexError>,
    ) -> DexResult<(T, usize)> {
        let input = self
            .data
            .get(offset..)
            .ok_or_else(|| self.out_of_bounds(offset, 1))?;
        match parser(input).finish() {
            Ok((rest, value)) => Ok((value, input.offset(rest))),
            Err(DexError::Parsing {
                remaining,
                kind: ErrorKind::Eof,
            }) => {
                let failed_at = self.data.len() - remaining.min(self.data.len());
                Err(self.out_of_bounds(failed_at, remaining + 1))
            }
            Err(err) => Err(err),
        }
    }

    pub fn read_u8(&mut self) -> DexResult<u8> {
        let v = self.u8_at(self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> DexResult<u16> {
        let v = self.u16_at(self.pos)?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> DexResult<u32> {
        let v = self.u32_at(self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> DexResult<u64> {
        let v = self.u64_at(self.pos)?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_uleb128(&mut self) -> DexResult<Uleb128> {
        let (v, consumed) = self.uleb128_at(self.pos)?;
        self.pos += consumed;
        Ok(v)
    }

    pub fn read_sleb128(&mut self) -> DexResult<Sleb128> {
        let (v, consumed) = self.sleb128_at(self.pos)?;
        self.pos += consumed;
        Ok(v)
    }

    pub fn read_bytes(&mut self, len: usize) -> DexResult<&'a [u8]> {
        let v = self.bytes_at(self.pos, len)?;
        self.pos += len;
        Ok(v)
    }

    fn fixed_at<T>(
        &self,
        offset: usize,
        len: usize,
        mut parser: impl FnMut(&'a [u8]) -> IResult<&'a [u8], T, DexError>,
    ) -> DexResult<T> {
        let input = self.bytes_at(offset, len)?;
        let (_, v) = parser(input).finish()?;
        Ok(v)
    }

    const fn out_of_bounds(&self, offset: usize, len: usize) -> DexError {
        DexError::OutOfBounds {
            offset,
            len,
            size: self.data.len(),
        }
    }
}

/// Splits a LEB128 encoding into its leading continuation bytes and its
/// last byte.
fn leb128_bytes(input: &[u8]) -> IResult<&[u8], (&[u8], u8), DexError> {
    let (input, bs) = verify(take_till(|b| b & 0x80 == 0), |bs: &[u8]| {
        bs.len() < MAX_LEB128_SIZE
    })(input)?;
    let (input, last) = le_u8(input)?;
    Ok((input, (bs, last)))
}

fn leb128_fold(bs: &[u8], last: u8) -> (u32, u32) {
    bs.iter()
        .chain(std::iter::once(&last))
        .fold((0u32, 0u32), |(acc, shift), b| {
            (acc | (u32::from(b & 0x7f) << shift), shift + 7)
        })
}

pub(crate) fn uleb128(input: &[u8]) -> IResult<&[u8], Uleb128, DexError> {
    let start = input;
    let (input, (bs, last)) = leb128_bytes(input)?;
    let (value, _) = leb128_fold(bs, last);
    Ok((input, Uleb128::new(value, Some(start.offset(input)))))
}

#[allow(clippy::cast_possible_wrap)]
pub(crate) fn sleb128(input: &[u8]) -> IResult<&[u8], Sleb128, DexError> {
    let start = input;
    let (input, (bs, last)) = leb128_bytes(input)?;
    let (mut value, shift) = leb128_fold(bs, last);
    if shift < 32 && last & 0x40 != 0 {
        value |= u32::MAX << shift;
    }
    Ok((input, Sleb128::new(value as i32, Some(start.offset(input)))))
}
