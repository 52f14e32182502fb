//! Code address representation.

use serde::Serialize;
use std::fmt;

/// An address inside a method bytecode, counted in 16-bit code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Addr(pub usize);

impl Addr {
    #[inline]
    #[must_use]
    pub const fn entry() -> Self {
        Self(0)
    }

    /// Address reached by a relative jump of `offset` code units, if it
    /// does not underflow.
    #[must_use]
    pub const fn offset(self, offset: i32) -> Option<Self> {
        if offset.is_negative() {
            match self.0.checked_sub(offset.unsigned_abs() as usize) {
                Some(a) => Some(Self(a)),
                None => None,
            }
        } else {
            match self.0.checked_add(offset.unsigned_abs() as usize) {
                Some(a) => Some(Self(a)),
                None => None,
            }
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
