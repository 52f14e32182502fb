//! Dex errors definitions.

use crate::Addr;
use std::{fmt, io};
use thiserror::Error;

/// An alias for result that can be a [`DexError`].
pub type DexResult<T> = Result<T, DexError>;

/// The Dex error type.
///
/// Every variant but [`DexError::Truncated`] (and the I/O and formatting
/// wrappers) denotes a malformed file.
#[derive(Debug, Error)]
pub enum DexError {
    /// Error that can be returned when doing [std::io](I/O) operations.
    #[error("IO error: {0}")]
    IO(#[from] io::Error),

    /// Error that can be returned when formatting dex parts.
    #[error("Formatting error: {0}")]
    Fmt(#[from] fmt::Error),

    /// Error that can be returned at parsing, with the number of bytes
    /// that remained unparsed when the failing combinator ran.
    #[error("parsing error ({kind:?}, {remaining} bytes left)")]
    Parsing {
        remaining: usize,
        kind: nom::error::ErrorKind,
    },

    /// A read of `len` bytes at `offset` does not fit in a buffer of `size` bytes.
    #[error("read of {len} byte(s) at offset {offset:#x} is out of bounds (size: {size:#x})")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    /// The input is shorter than what the header declares.
    #[error("truncated input: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("bad dex magic")]
    BadMagic,

    #[error("unsupported dex version {0:03}")]
    Version(u32),

    #[error("unsupported endianness tag {0:#010x}")]
    Endianness(u32),

    /// Invalid MUTF-8 string.
    #[error("invalid MUTF-8: {0}")]
    InvalidMutf8(String),

    #[error("dex structure is invalid: {0}")]
    Structure(String),

    #[error("dex {0} has bad size")]
    BadSize(String),

    #[error("dex {0} has invalid offset")]
    InvalidOffset(String),

    #[error("unexpected padding value in dex")]
    NonZeroPadding,

    #[error("resource not found in dex tables: {0}")]
    ResNotFound(String),

    #[error("could not convert {} into {}", from, to)]
    Conversion { from: String, to: String },

    #[error("invalid type")]
    InvalidType,

    #[error("invalid {what} access flags {flags:#x}")]
    InvalidFlags { what: &'static str, flags: u32 },

    #[error("unknown opcode {opcode:#04x} at address {addr}")]
    UnknownOpcode { addr: Addr, opcode: u8 },

    #[error("{mnemonic} at address {addr} needs {needed} code unit(s), {available} left")]
    InstructionOverrun {
        addr: Addr,
        mnemonic: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("invalid instruction at address {addr}: {reason}")]
    InvalidInstruction { addr: Addr, reason: String },
}

impl DexError {
    /// Tells if the error comes from an input shorter than declared, as
    /// opposed to a malformed one.
    #[must_use]
    pub const fn is_truncation(&self) -> bool {
        matches!(self, Self::Truncated { .. })
    }
}

impl nom::error::ParseError<&[u8]> for DexError {
    fn from_error_kind(input: &[u8], kind: nom::error::ErrorKind) -> Self {
        Self::Parsing {
            remaining: input.len(),
            kind,
        }
    }

    fn append(_: &[u8], _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl nom::error::ParseError<(&[u8], usize)> for DexError {
    fn from_error_kind(input: (&[u8], usize), kind: nom::error::ErrorKind) -> Self {
        Self::Parsing {
            remaining: input.0.len(),
            kind,
        }
    }

    fn append(_: (&[u8], usize), _: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

impl nom::ErrorConvert<Self> for DexError {
    fn convert(self) -> Self {
        self
    }
}
