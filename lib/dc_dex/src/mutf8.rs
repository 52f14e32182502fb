use crate::errors::{DexError, DexResult};

// Decodes a MUTF-8 buffer (without its terminating null byte) into UTF-16
// code units. Supplementary characters are stored as two 3-bytes encoded
// surrogates, which is why the result is not built as a Rust string.
#[allow(clippy::cast_lossless)]
pub(crate) fn decode(inp: &[u8]) -> DexResult<Vec<u16>> {
    let mut buf: Vec<u16> = Vec::with_capacity(inp.len());
    let mut bytes = inp.iter().copied();

    let continuation = |b: Option<u8>, what: &str| -> DexResult<u16> {
        match b {
            Some(b) if b & 0xc0 == 0x80 => Ok((b & 0x3f) as u16),
            Some(_) => Err(DexError::InvalidMutf8(format!("bad {what} byte"))),
            None => Err(DexError::InvalidMutf8(format!("missing {what} byte"))),
        }
    };

    while let Some(a) = bytes.next() {
        if a == 0 {
            return Err(DexError::InvalidMutf8("raw null byte".to_string()));
        } else if a < 0x80 {
            buf.push(a as u16);
        } else if a & 0xe0 == 0xc0 {
            let b = continuation(bytes.next(), "second")?;
            buf.push(((a as u16 & 0x1f) << 6) | b);
        } else if a & 0xf0 == 0xe0 {
            let b = continuation(bytes.next(), "second")?;
            let c = continuation(bytes.next(), "third")?;
            buf.push(((a as u16 & 0x0f) << 12) | (b << 6) | c);
        } else {
            return Err(DexError::InvalidMutf8(format!("bad leading byte {a:#04x}")));
        }
    }

    Ok(buf)
}
