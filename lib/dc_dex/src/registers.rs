//! Types definitions to address Dalvik registers.
//!
//! In Dalvik bytecode, registers are addressed on 4, 8 or 16 bits depending
//! on the instruction format. They are all widened into a [register](Reg)
//! wrapper over a 16 bits integer, which keeps them apart from literal
//! operands. Registers groups (explicit lists or ranges) used by invoke
//! instructions are defined here too.

use serde::Serialize;
use std::fmt;

/// The register type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Reg(u16);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u8> for Reg {
    fn from(r: u8) -> Self {
        Self(u16::from(r))
    }
}

impl From<u16> for Reg {
    fn from(r: u16) -> Self {
        Self(r)
    }
}

impl From<Reg> for u16 {
    fn from(r: Reg) -> Self {
        r.0
    }
}

impl Reg {
    /// Returns the wrapped register slot number.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }
}

/// An explicit list of registers, at most 5 for `35c` instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RegList(Vec<Reg>);

impl fmt::Display for RegList {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{")?;
        for (i, reg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{reg}")?;
        }
        write!(f, "}}")
    }
}

impl<T> From<Vec<T>> for RegList
where
    Reg: From<T>,
{
    fn from(args: Vec<T>) -> Self {
        Self(args.into_iter().map(Reg::from).collect())
    }
}

impl RegList {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Checks if the list contains no register.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Reg> + '_ {
        self.0.iter().copied()
    }
}

/// A range of consecutive registers, possibly empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegRange {
    first: Reg,
    count: u16,
}

impl fmt::Display for RegRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.last() {
            Some(last) => write!(f, "{{{} .. {}}}", self.first, last),
            None => write!(f, "{{}}"),
        }
    }
}

impl RegRange {
    /// Builds the range of `count` registers starting at `first`, [`None`]
    /// when overflowing the 16 bits register space.
    #[must_use]
    pub fn new(first: u16, count: u16) -> Option<Self> {
        if count > 0 {
            first.checked_add(count - 1)?;
        }
        Some(Self {
            first: Reg(first),
            count,
        })
    }

    #[inline]
    #[must_use]
    pub const fn first(&self) -> Reg {
        self.first
    }

    /// Last register of the range, [`None`] when empty.
    #[must_use]
    pub const fn last(&self) -> Option<Reg> {
        if self.count == 0 {
            None
        } else {
            Some(Reg(self.first.0 + (self.count - 1)))
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.count as usize
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Reg> {
        let first = u32::from(self.first.0);
        (first..first + u32::from(self.count)).map(|r| Reg(r as u16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists() {
        let list = RegList::from(vec![0u8, 4, 2]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.to_string(), "{v0, v4, v2}");
        assert_eq!(RegList::from(Vec::<u8>::new()).to_string(), "{}");
    }

    #[test]
    fn ranges() {
        let range = RegRange::new(3, 4).unwrap();
        assert_eq!(range.len(), 4);
        assert_eq!(range.to_string(), "{v3 .. v6}");
        assert_eq!(
            range.iter().map(Reg::value).collect::<Vec<_>>(),
            vec![3, 4, 5, 6]
        );

        assert_eq!(range.first(), Reg(3));
        assert_eq!(range.last(), Some(Reg(6)));

        let empty = RegRange::new(3, 0).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.last(), None);
        assert_eq!(empty.iter().count(), 0);
        assert_eq!(empty.to_string(), "{}");
        assert!(RegRange::new(u16::MAX, 0).is_some());

        assert!(RegRange::new(u16::MAX, 2).is_none());
        let top = RegRange::new(u16::MAX, 1).unwrap();
        assert_eq!(top.iter().collect::<Vec<_>>(), vec![Reg(u16::MAX)]);
    }
}
