use crate::errors::{DexError, DexResult};
use crate::mutf8;
use crate::{Dex, DexIndex, Index, PrettyPrint};
use std::fmt;

/// An entry of the strings table, decoded from its MUTF-8 string data.
#[derive(Debug)]
pub struct StringIdItem {
    pub(crate) index: Index<StringIdItem>,
    pub(crate) string_data_off: usize,
    pub(crate) value: String,
}

impl DexIndex for Index<StringIdItem> {
    type T = StringIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.string_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound(format!("StringIdItem #{self}")))
    }
}

impl StringIdItem {
    pub(crate) const SIZE: usize = 4;

    #[inline]
    #[must_use]
    pub const fn index(&self) -> Index<Self> {
        self.index
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Offset of the string data item in the file.
    #[inline]
    #[must_use]
    pub const fn data_offset(&self) -> usize {
        self.string_data_off
    }
}

impl PrettyPrint for StringIdItem {
    fn pp(&self, f: &mut fmt::Formatter, _dex: &Dex) -> DexResult<()> {
        write!(f, "{}", self.value.escape_debug())?;
        Ok(())
    }
}

/// Decodes the payload of a string data item, `utf16_size` being the
/// length it declares in UTF-16 code units.
pub(crate) fn decode_string_data(utf16_size: usize, data: &[u8]) -> DexResult<String> {
    let v = mutf8::decode(data)?;
    if v.len() != utf16_size {
        log::error!("raw string:        {:?}", data);
        log::error!("expected length:   {}", utf16_size);
        log::error!("utf16 length:      {}", v.len());
        return Err(DexError::BadSize("mutf-8".to_string()));
    }
    let s = match String::from_utf16(&v) {
        Ok(s) => s,
        Err(err) => {
            log::debug!("{}", err);
            log::warn!("isolated or out-of-order utf16 surrogate code unit, using lossy conversion");
            String::from_utf16_lossy(&v)
        }
    };
    Ok(s)
}
