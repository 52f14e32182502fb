//! Small writers functions to be used when assembling binary files.

use crate::leb::{Sleb128, Uleb128};
use std::io::{Result, Seek, Write};

/// Writes zeros to align offset on next 4 bytes.
pub fn align4<W: Write + Seek>(output: &mut W) -> Result<usize> {
    let position = output.stream_position()?;
    let mut sz = 0;
    for _ in 0..(4 - (position % 4)) % 4 {
        sz += le_u8(output, 0x00)?;
    }
    Ok(sz)
}

/// Writes a bytes buffer in given output.
pub fn bytes<W: Write>(output: &mut W, bytes: &[u8]) -> Result<usize> {
    output.write_all(bytes)?;
    Ok(bytes.len())
}

/// Writes a u8 in given output.
pub fn le_u8<W: Write>(output: &mut W, v: u8) -> Result<usize> {
    bytes(output, &[v])
}

/// Writes a u16 in given output.
pub fn le_u16<W: Write>(output: &mut W, v: u16) -> Result<usize> {
    bytes(output, &v.to_le_bytes())
}

/// Writes a u32 in given output.
pub fn le_u32<W: Write>(output: &mut W, v: u32) -> Result<usize> {
    bytes(output, &v.to_le_bytes())
}

/// Writes a u32 in given output, in uleb128 format.
///
/// When the value size is larger than its minimal encoding, extra
/// continuation bytes are emitted so that exactly `val.size()` bytes
/// are written.
#[allow(clippy::cast_possible_truncation)]
pub fn uleb128<W: Write>(output: &mut W, val: Uleb128) -> Result<usize> {
    let mut v = val.value();
    for i in 0..val.size() {
        let lo7 = (v & 0b111_1111) as u8;
        v >>= 7;
        if i == val.size() - 1 {
            le_u8(output, lo7)?;
        } else {
            le_u8(output, lo7 | 0b1000_0000)?;
        }
    }
    Ok(val.size())
}

/// Writes a i32 in given output, in sleb128 format.
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
pub fn sleb128<W: Write>(output: &mut W, val: Sleb128) -> Result<usize> {
    let mut v = val.value();
    let mut size = 0;
    loop {
        let byte = (v & 0b111_1111) as u8;
        v >>= 7;
        let done = (v == 0 && byte & 0b100_0000 == 0) || (v == -1 && byte & 0b100_0000 != 0);
        if done {
            size += le_u8(output, byte)?;
            break;
        }
        size += le_u8(output, byte | 0b1000_0000)?;
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn le_u16_writer() {
        let mut buf = Vec::new();
        assert!(le_u16(&mut buf, 0x88b8u16).is_ok());
        assert_eq!(buf, vec![0xb8, 0x88]);
    }

    #[test]
    fn le_u32_writer() {
        let mut buf = Vec::new();
        assert!(le_u32(&mut buf, 0x12345678u32).is_ok());
        assert_eq!(buf, vec![0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn align4_writer() {
        let mut cursor = Cursor::new(Vec::new());
        le_u8(&mut cursor, 0xaa).unwrap();
        assert_eq!(align4(&mut cursor).unwrap(), 3);
        assert_eq!(align4(&mut cursor).unwrap(), 0);
        assert_eq!(cursor.into_inner(), vec![0xaa, 0, 0, 0]);
    }

    #[test]
    fn uleb128_writer() {
        let mut buf = Vec::new();
        assert!(uleb128(&mut buf, Uleb128::new(0, None)).is_ok());
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        assert!(uleb128(&mut buf, Uleb128::new(127, None)).is_ok());
        assert_eq!(buf, vec![0x7f]);

        buf.clear();
        assert!(uleb128(&mut buf, Uleb128::new(16256, None)).is_ok());
        assert_eq!(buf, vec![0x80, 0x7f]);

        buf.clear();
        assert!(uleb128(&mut buf, Uleb128::new(1, Some(3))).is_ok());
        assert_eq!(buf, vec![0x81, 0x80, 0x00]);
    }

    #[test]
    fn sleb128_writer() {
        let mut buf = Vec::new();
        assert!(sleb128(&mut buf, Sleb128::new(0, None)).is_ok());
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        assert!(sleb128(&mut buf, Sleb128::new(-1, None)).is_ok());
        assert_eq!(buf, vec![0x7f]);

        buf.clear();
        assert!(sleb128(&mut buf, Sleb128::new(-128, None)).is_ok());
        assert_eq!(buf, vec![0x80, 0x7f]);

        buf.clear();
        assert!(sleb128(&mut buf, Sleb128::new(64, None)).is_ok());
        assert_eq!(buf, vec![0xc0, 0x00]);
    }
}
