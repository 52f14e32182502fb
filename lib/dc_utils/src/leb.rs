//! LEB128 values, as found in dex class data, code items and string data.
//!
//! Both types keep the number of bytes the value occupies in its
//! encoded form, which can be larger than the minimal encoding when
//! the producer padded it with continuation bytes.

/// An unsigned LEB128 value and its encoded size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Uleb128 {
    value: u32,
    size: usize,
}

impl Uleb128 {
    /// Builds a value, `size_hint` being the number of bytes it was read
    /// from (the minimal encoding size is used when larger).
    #[must_use]
    pub fn new(value: u32, size_hint: Option<usize>) -> Self {
        let needed_size = if value == 0 {
            1
        } else {
            let nbits = 32 - value.leading_zeros() as usize;
            1 + ((nbits - 1) / 7)
        };
        let size = size_hint.map_or(needed_size, |hint| needed_size.max(hint));
        Self { value, size }
    }

    #[inline]
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.value
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }
}

/// A signed LEB128 value and its encoded size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sleb128 {
    value: i32,
    size: usize,
}

impl Sleb128 {
    /// Builds a value, `size_hint` being the number of bytes it was read
    /// from (the minimal encoding size is used when larger).
    #[must_use]
    pub fn new(value: i32, size_hint: Option<usize>) -> Self {
        let mut rest = value;
        let mut needed_size = 1;
        loop {
            let sign_bit = rest & 0x40 != 0;
            rest >>= 7;
            if (rest == 0 && !sign_bit) || (rest == -1 && sign_bit) {
                break;
            }
            needed_size += 1;
        }
        let size = size_hint.map_or(needed_size, |hint| needed_size.max(hint));
        Self { value, size }
    }

    #[inline]
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.value
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uleb128_sizes() {
        assert_eq!(Uleb128::new(0, None).size(), 1);
        assert_eq!(Uleb128::new(127, None).size(), 1);
        assert_eq!(Uleb128::new(128, None).size(), 2);
        assert_eq!(Uleb128::new(u32::MAX, None).size(), 5);
        assert_eq!(Uleb128::new(1, Some(3)).size(), 3);
    }

    #[test]
    fn sleb128_sizes() {
        assert_eq!(Sleb128::new(0, None).size(), 1);
        assert_eq!(Sleb128::new(-1, None).size(), 1);
        assert_eq!(Sleb128::new(63, None).size(), 1);
        assert_eq!(Sleb128::new(64, None).size(), 2);
        assert_eq!(Sleb128::new(-64, None).size(), 1);
        assert_eq!(Sleb128::new(-65, None).size(), 2);
        assert_eq!(Sleb128::new(-128, None).size(), 2);
        assert_eq!(Sleb128::new(i32::MIN, None).size(), 5);
    }
}
