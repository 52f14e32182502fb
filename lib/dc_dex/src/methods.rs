//! Dalvik class methods data structures.

use crate::errors::{DexError, DexResult};
use crate::strings::StringIdItem;
use crate::types::{ProtoIdItem, Type, TypeIdItem};
use crate::{Dex, DexIndex, Index, PrettyPrint};
use bitflags::bitflags;
use dc_utils::leb::Uleb128;
use std::fmt;

#[derive(Debug)]
pub struct MethodIdItem {
    pub(crate) index: Index<MethodIdItem>,
    pub(crate) class_idx: Index<TypeIdItem>,
    pub(crate) proto_idx: Index<ProtoIdItem>,
    pub(crate) name_idx: Index<StringIdItem>,
}

impl DexIndex for Index<MethodIdItem> {
    type T = MethodIdItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.method_id_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound(format!("MethodIdItem #{self}")))
    }
}

impl MethodIdItem {
    pub(crate) const SIZE: usize = 8;

    #[inline]
    #[must_use]
    pub const fn index(&self) -> Index<Self> {
        self.index
    }

    #[inline]
    #[must_use]
    pub const fn class_idx(&self) -> Index<TypeIdItem> {
        self.class_idx
    }

    #[inline]
    #[must_use]
    pub const fn proto_idx(&self) -> Index<ProtoIdItem> {
        self.proto_idx
    }

    #[inline]
    #[must_use]
    pub const fn name_idx(&self) -> Index<StringIdItem> {
        self.name_idx
    }

    /// Type that defined the method.
    /// According to the Dalvik documentation, this must be a class type or an array type.
    pub fn definer(&self, dex: &Dex) -> DexResult<Type> {
        dex.type_(self.class_idx)
    }

    /// Raw descriptor of the defining type.
    pub fn definer_name<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        dex.type_name(self.class_idx)
    }

    pub fn return_type(&self, dex: &Dex) -> DexResult<Type> {
        self.proto_idx.get(dex)?.return_type(dex)
    }

    pub fn parameters_types(&self, dex: &Dex) -> DexResult<Vec<Type>> {
        self.proto_idx.get(dex)?.parameters_types(dex)
    }

    pub fn name<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        dex.string(self.name_idx)
    }

    /// Fully qualified signature without return type, e.g.
    /// `Lokio/Buffer;.read(Lokio/Buffer;J)`.
    pub fn signature(&self, dex: &Dex) -> DexResult<String> {
        let params = self.proto_idx.get(dex)?.parameters_descriptors(dex)?;
        Ok(format!(
            "{}.{}({params})",
            self.definer_name(dex)?,
            self.name(dex)?
        ))
    }

    /// Declaring type and name, e.g. `Lokio/Buffer;.read`.
    pub fn qualified_name(&self, dex: &Dex) -> DexResult<String> {
        Ok(format!("{}.{}", self.definer_name(dex)?, self.name(dex)?))
    }
}

impl PrettyPrint for MethodIdItem {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()> {
        let definer = self.definer_name(dex)?;
        let name = self.name(dex)?;
        let proto = self.proto_idx.get(dex)?;
        write!(f, "{definer}->{name}")?;
        proto.pp(f, dex)
    }
}

#[derive(Debug, Clone)]
pub struct EncodedMethod {
    pub(crate) method_idx_diff: Uleb128,
    // The method_idx is not stored in dex as is, it's the cumulated sum
    // of diffs that is computed at decoding.
    pub(crate) method_idx: Index<MethodIdItem>,
    pub(crate) access_flags: MethodFlags,
    pub(crate) code_off: Option<usize>,
}

impl EncodedMethod {
    pub fn descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a MethodIdItem> {
        self.method_idx.get(dex)
    }

    #[inline]
    #[must_use]
    pub const fn index(&self) -> Index<MethodIdItem> {
        self.method_idx
    }

    /// Raw delta this entry was encoded with.
    #[inline]
    #[must_use]
    pub const fn index_diff(&self) -> u32 {
        self.method_idx_diff.value()
    }

    #[inline]
    #[must_use]
    pub const fn flags(&self) -> MethodFlags {
        self.access_flags
    }

    /// Offset of the code item, [`None`] for abstract and native methods.
    #[inline]
    #[must_use]
    pub const fn code_offset(&self) -> Option<usize> {
        self.code_off
    }
}

bitflags! {
    pub struct MethodFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_SYNCHRONIZED          = 0x00020;
        const ACC_BRIDGE                = 0x00040;
        const ACC_VARARGS               = 0x00080;
        const ACC_NATIVE                = 0x00100;
        const ACC_ABSTRACT              = 0x00400;
        const ACC_STRICT                = 0x00800;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_CONSTRUCTOR           = 0x10000;
        const ACC_DECLARED_SYNCHRONIZED = 0x20000;
    }
}

impl fmt::Display for MethodFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const NAMES: [(MethodFlags, &str); 14] = [
            (MethodFlags::ACC_PUBLIC, "public"),
            (MethodFlags::ACC_PRIVATE, "private"),
            (MethodFlags::ACC_PROTECTED, "protected"),
            (MethodFlags::ACC_STATIC, "static"),
            (MethodFlags::ACC_FINAL, "final"),
            (MethodFlags::ACC_SYNCHRONIZED, "synchronized"),
            (MethodFlags::ACC_BRIDGE, "bridge"),
            (MethodFlags::ACC_VARARGS, "varargs"),
            (MethodFlags::ACC_NATIVE, "native"),
            (MethodFlags::ACC_ABSTRACT, "abstract"),
            (MethodFlags::ACC_STRICT, "strict"),
            (MethodFlags::ACC_SYNTHETIC, "synthetic"),
            (MethodFlags::ACC_CONSTRUCTOR, "constructor"),
            (MethodFlags::ACC_DECLARED_SYNCHRONIZED, "declared_synchronized"),
        ];
        for (flag, name) in NAMES {
            if self.contains(flag) {
                write!(f, "{name} ")?;
            }
        }
        Ok(())
    }
}
