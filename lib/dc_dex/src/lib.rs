//! Android Dex container parser and Dalvik bytecode decoder.
//!
//! A [`Dex`] owns the raw bytes of a file along with its decoded interning
//! tables (strings, types, prototypes, fields, methods) and class
//! definitions. Class data and code items are decoded on demand from the
//! owned buffer, see [`Dex::read_class_data`] and [`Dex::read_code`], and
//! bytecode is decoded lazily through [`code::CodeItem::instructions`].

mod addr;
mod hexlify;
mod map;
mod mutf8;
mod parsers;
mod strings;

pub mod classes;
pub mod code;
pub mod decoder;
pub mod errors;
pub mod fields;
pub mod instrs;
pub mod methods;
pub mod reader;
pub mod registers;
pub mod types;

pub use crate::addr::Addr;
pub use crate::map::{MapItem, MapItemType};
pub use crate::strings::StringIdItem;

use crate::classes::ClassDefItem;
use crate::errors::{DexError, DexResult};
use crate::fields::FieldIdItem;
use crate::methods::MethodIdItem;
use crate::reader::Reader;
use crate::types::{ProtoIdItem, Type, TypeIdItem};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::marker::PhantomData;
use std::path::Path;

/// Dex versions this crate knows how to read.
pub const SUPPORTED_VERSIONS: [u32; 6] = [35, 37, 38, 39, 40, 41];

/// Marker for an absent index in 32-bit index fields.
pub const NO_INDEX: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone)]
pub(crate) struct HeaderItem {
    pub(crate) version: u32,
    pub(crate) checksum: u32,
    pub(crate) signature: Vec<u8>,
    pub(crate) file_size: usize,
    pub(crate) map_off: usize,
    pub(crate) string_ids_size: usize,
    pub(crate) string_ids_off: usize,
    pub(crate) type_ids_size: usize,
    pub(crate) type_ids_off: usize,
    pub(crate) proto_ids_size: usize,
    pub(crate) proto_ids_off: usize,
    pub(crate) field_ids_size: usize,
    pub(crate) field_ids_off: usize,
    pub(crate) method_ids_size: usize,
    pub(crate) method_ids_off: usize,
    pub(crate) class_defs_size: usize,
    pub(crate) class_defs_off: usize,
    pub(crate) data_size: usize,
    pub(crate) data_off: usize,
}

impl HeaderItem {
    pub(crate) const SIZE: usize = 0x70;
}

/// A typed position into one of the [`Dex`] tables.
///
/// Indices are only built by the parser once checked against the size of
/// the table they point into.
pub struct Index<T: ?Sized> {
    value: usize,
    marker: PhantomData<T>,
}

impl<T> Index<T> {
    pub(crate) const fn new(idx: usize) -> Self {
        Self {
            value: idx,
            marker: PhantomData,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(&self) -> usize {
        self.value
    }
}

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Index<T> {}

impl<T> PartialEq for Index<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Index<T> {}

impl<T> PartialOrd for Index<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Index<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl<T> Hash for Index<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl<T> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Index({})", self.value)
    }
}

impl<T> fmt::Display for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.value, f)
    }
}

impl<T> Serialize for Index<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.value as u64)
    }
}

/// Resolution of a typed index into the item it designates.
pub trait DexIndex: Sized {
    type T;

    fn get(self, dex: &Dex) -> DexResult<&Self::T>;
}

pub trait PrettyPrint {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()>;
}

pub struct PrettyPrinter<'a, T>(pub &'a T, pub &'a Dex);

impl<'a, T: PrettyPrint> fmt::Display for PrettyPrinter<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.pp(f, self.1).map_err(|_| fmt::Error)
    }
}

/// The top-level Dex data structure.
#[derive(Debug)]
pub struct Dex {
    // raw file contents, class data and code items are decoded from it
    pub(crate) data: Vec<u8>,

    // meta data
    pub(crate) header_item: HeaderItem,
    pub(crate) map_list: Vec<MapItem>,

    // indexed collections
    pub(crate) string_id_items: Vec<StringIdItem>,
    pub(crate) type_id_items: Vec<TypeIdItem>,
    pub(crate) proto_id_items: Vec<ProtoIdItem>,
    pub(crate) field_id_items: Vec<FieldIdItem>,
    pub(crate) method_id_items: Vec<MethodIdItem>,
    pub(crate) class_def_items: Vec<ClassDefItem>,
}

impl Dex {
    #[inline]
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.header_item.version
    }

    /// Adler-32 checksum as declared in the header.
    #[inline]
    #[must_use]
    pub const fn checksum(&self) -> u32 {
        self.header_item.checksum
    }

    /// SHA-1 signature as declared in the header.
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.header_item.signature
    }

    #[inline]
    #[must_use]
    pub const fn file_size(&self) -> usize {
        self.header_item.file_size
    }

    #[inline]
    #[must_use]
    pub fn map_items(&self) -> &[MapItem] {
        &self.map_list
    }

    #[inline]
    #[must_use]
    pub fn method_ids(&self) -> &[MethodIdItem] {
        &self.method_id_items
    }

    #[inline]
    #[must_use]
    pub fn class_defs(&self) -> &[ClassDefItem] {
        &self.class_def_items
    }

    /// Returns the decoded string at the given position of the strings table.
    pub fn string(&self, idx: Index<StringIdItem>) -> DexResult<&str> {
        Ok(idx.get(self)?.as_str())
    }

    /// Returns the raw descriptor of a type, e.g. `Ljava/lang/Object;`.
    pub fn type_name(&self, idx: Index<TypeIdItem>) -> DexResult<&str> {
        idx.get(self)?.descriptor(self)
    }

    /// Returns the parsed form of a type descriptor.
    pub fn type_(&self, idx: Index<TypeIdItem>) -> DexResult<Type> {
        idx.get(self)?.to_type(self)
    }

    #[inline]
    pub fn iter_string_ids(&self) -> impl Iterator<Item = &StringIdItem> {
        self.string_id_items.iter()
    }

    #[inline]
    pub fn iter_type_ids(&self) -> impl Iterator<Item = &TypeIdItem> {
        self.type_id_items.iter()
    }

    #[inline]
    pub fn iter_proto_ids(&self) -> impl Iterator<Item = &ProtoIdItem> {
        self.proto_id_items.iter()
    }

    #[inline]
    pub fn iter_field_ids(&self) -> impl Iterator<Item = &FieldIdItem> {
        self.field_id_items.iter()
    }

    #[inline]
    pub fn iter_method_ids(&self) -> impl Iterator<Item = &MethodIdItem> {
        self.method_id_items.iter()
    }

    #[inline]
    pub fn iter_class_defs(&self) -> impl Iterator<Item = &ClassDefItem> {
        self.class_def_items.iter()
    }

    /// Builds a method index from a raw table position, checking bounds.
    pub fn method_index(&self, idx: usize) -> DexResult<Index<MethodIdItem>> {
        if idx < self.method_id_items.len() {
            Ok(Index::new(idx))
        } else {
            Err(DexError::ResNotFound(format!("MethodIdItem #{idx}")))
        }
    }

    pub(crate) fn reader(&self) -> Reader {
        Reader::new(&self.data)
    }
}

/// Parses a dex file held in memory.
///
/// The bytes are copied into the returned [`Dex`], which decodes class data
/// and bytecode from its own buffer afterwards.
pub fn parse(input: &[u8]) -> DexResult<Dex> {
    parsers::parse_dex(input.to_vec())
}

/// Open and parses the given dex file path.
pub fn open<P: AsRef<Path>>(path: P) -> DexResult<Dex> {
    let mut file = File::open(path)?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;
    parsers::parse_dex(contents)
}
