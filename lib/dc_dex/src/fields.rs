//! Dalvik class fields data structures.

use crate::errors::{DexError, DexResult};
use crate::strings::StringIdItem;
use crate::types::{Type, TypeIdItem};
use crate::{Dex, DexIndex, Index, PrettyPrint};
use bitflags::bitflags;
use dc_utils::leb::Uleb128;
use std::fmt;

#[derive(Debug)]
pub struct FieldIdItem {
    pub(crate) index: Index<FieldIdItem>,
    pub(crate) class_idx: Index<TypeIdItem>,
    pub(crate) type_idx: Index<TypeIdItem>,
    pub(crate) name_idx: Index<StringIdItem>,
}

impl DexIndex for Index<FieldIdItem> {
    type T = FieldIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.field_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound(format!("FieldIdItem #{self}")))
    }
}

impl FieldIdItem {
    pub(crate) const SIZE: usize = 8;

    #[inline]
    #[must_use]
    pub const fn index(&self) -> Index<Self> {
        self.index
    }

    /// Class type that defines the field.
    pub fn class(&self, dex: &Dex) -> DexResult<Type> {
        dex.type_(self.class_idx)
    }

    pub fn type_(&self, dex: &Dex) -> DexResult<Type> {
        dex.type_(self.type_idx)
    }

    pub fn name<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        dex.string(self.name_idx)
    }
}

impl PrettyPrint for FieldIdItem {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()> {
        let class = dex.type_name(self.class_idx)?;
        let name = self.name(dex)?;
        let typ = dex.type_name(self.type_idx)?;
        write!(f, "{class}.{name}:{typ}")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EncodedField {
    pub(crate) field_idx_diff: Uleb128,
    // The field_idx is not stored in dex as is, it's the cumulated sum
    // of diffs that is computed at decoding.
    pub(crate) field_idx: Index<FieldIdItem>,
    pub(crate) access_flags: FieldFlags,
}

impl EncodedField {
    pub fn descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a FieldIdItem> {
        self.field_idx.get(dex)
    }

    #[inline]
    #[must_use]
    pub const fn index(&self) -> Index<FieldIdItem> {
        self.field_idx
    }

    /// Raw delta this entry was encoded with.
    #[inline]
    #[must_use]
    pub const fn index_diff(&self) -> u32 {
        self.field_idx_diff.value()
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> FieldFlags {
        self.access_flags
    }
}

bitflags! {
    pub struct FieldFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_VOLATILE              = 0x00040;
        const ACC_TRANSIENT             = 0x00080;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_ENUM                  = 0x04000;
    }
}

impl fmt::Display for FieldFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const NAMES: [(FieldFlags, &str); 9] = [
            (FieldFlags::ACC_PUBLIC, "public"),
            (FieldFlags::ACC_PRIVATE, "private"),
            (FieldFlags::ACC_PROTECTED, "protected"),
            (FieldFlags::ACC_STATIC, "static"),
            (FieldFlags::ACC_FINAL, "final"),
            (FieldFlags::ACC_VOLATILE, "volatile"),
            (FieldFlags::ACC_TRANSIENT, "transient"),
            (FieldFlags::ACC_SYNTHETIC, "synthetic"),
            (FieldFlags::ACC_ENUM, "enum"),
        ];
        for (flag, name) in NAMES {
            if self.contains(flag) {
                write!(f, "{name} ")?;
            }
        }
        Ok(())
    }
}
