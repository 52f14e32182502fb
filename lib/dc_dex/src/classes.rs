//! Dalvik classes data structures.

use crate::errors::{DexError, DexResult};
use crate::fields::{EncodedField, FieldFlags, FieldIdItem};
use crate::methods::{EncodedMethod, MethodFlags, MethodIdItem};
use crate::reader::Reader;
use crate::strings::StringIdItem;
use crate::types::TypeIdItem;
use crate::{Dex, DexIndex, Index};
use bitflags::bitflags;
use dc_utils::leb::Uleb128;
use std::fmt;

/// The Dalvik class definition.
#[derive(Debug)]
pub struct ClassDefItem {
    pub(crate) index: Index<ClassDefItem>,
    pub(crate) class_idx: Index<TypeIdItem>,
    pub(crate) access_flags: ClassFlags,
    pub(crate) superclass_idx: Option<Index<TypeIdItem>>,
    pub(crate) interfaces_off: Option<usize>,
    pub(crate) interfaces: Vec<Index<TypeIdItem>>,
    pub(crate) source_file_idx: Option<Index<StringIdItem>>,
    pub(crate) annotations_off: Option<usize>,
    pub(crate) class_data_off: Option<usize>,
    pub(crate) static_values_off: Option<usize>,
}

impl DexIndex for Index<ClassDefItem> {
    type T = ClassDefItem;

    fn get(self, dex: &Dex) -> DexResult<&Self::T> {
        dex.class_def_items
            .get(self.as_usize())
            .ok_or_else(|| DexError::ResNotFound(format!("ClassDefItem #{self}")))
    }
}

impl ClassDefItem {
    pub(crate) const SIZE: usize = 32;

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

    /// Returns the raw descriptor of the class, e.g. `Lokio/Buffer;`.
    pub fn descriptor<'a>(&self, dex: &'a Dex) -> DexResult<&'a str> {
        dex.type_name(self.class_idx)
    }

    /// Returns the name of the class.
    pub fn class_name(&self, dex: &Dex) -> DexResult<String> {
        Ok(dex.type_(self.class_idx)?.as_class_name()?.to_string())
    }

    /// Returns the flags of the class.
    #[inline]
    #[must_use]
    pub const fn flags(&self) -> ClassFlags {
        self.access_flags
    }

    /// Returns the descriptor of the superclass if it exists, returns [`None`] otherwise.
    pub fn superclass<'a>(&self, dex: &'a Dex) -> DexResult<Option<&'a str>> {
        self.superclass_idx
            .map(|idx| dex.type_name(idx))
            .transpose()
    }

    /// Returns the descriptors of the interfaces implemented by the class.
    pub fn interfaces<'a>(&self, dex: &'a Dex) -> DexResult<Vec<&'a str>> {
        self.interfaces
            .iter()
            .map(|idx| dex.type_name(*idx))
            .collect()
    }

    /// Optionnaly returns the source file name of the class definition.
    pub fn source_file<'a>(&self, dex: &'a Dex) -> DexResult<Option<&'a str>> {
        self.source_file_idx
            .map(|idx| dex.string(idx))
            .transpose()
    }

    /// Offset of the class data, [`None`] for a simple declaration.
    #[inline]
    #[must_use]
    pub const fn class_data_offset(&self) -> Option<usize> {
        self.class_data_off
    }

    #[inline]
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.class_data_off.is_some()
    }
}

bitflags! {
    /// Dalvik class flags
    pub struct ClassFlags: u32 {
        const ACC_PUBLIC                = 0x00001;
        const ACC_PRIVATE               = 0x00002;
        const ACC_PROTECTED             = 0x00004;
        const ACC_STATIC                = 0x00008;
        const ACC_FINAL                 = 0x00010;
        const ACC_INTERFACE             = 0x00200;
        const ACC_ABSTRACT              = 0x00400;
        const ACC_SYNTHETIC             = 0x01000;
        const ACC_ANNOTATION            = 0x02000;
        const ACC_ENUM                  = 0x04000;
    }
}

impl fmt::Display for ClassFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const NAMES: [(ClassFlags, &str); 10] = [
            (ClassFlags::ACC_PUBLIC, "public"),
            (ClassFlags::ACC_PRIVATE, "private"),
            (ClassFlags::ACC_PROTECTED, "protected"),
            (ClassFlags::ACC_STATIC, "static"),
            (ClassFlags::ACC_FINAL, "final"),
            (ClassFlags::ACC_INTERFACE, "interface"),
            (ClassFlags::ACC_ABSTRACT, "abstract"),
            (ClassFlags::ACC_SYNTHETIC, "synthetic"),
            (ClassFlags::ACC_ANNOTATION, "annotation"),
            (ClassFlags::ACC_ENUM, "enum"),
        ];
        for (flag, name) in NAMES {
            if self.contains(flag) {
                write!(f, "{name} ")?;
            }
        }
        Ok(())
    }
}

/// Dalvik class fields and methods data definition.
#[derive(Debug, Default)]
pub struct ClassDataItem {
    pub(crate) static_fields: Vec<EncodedField>,
    pub(crate) instance_fields: Vec<EncodedField>,
    pub(crate) direct_methods: Vec<EncodedMethod>,
    pub(crate) virtual_methods: Vec<EncodedMethod>,
}

impl ClassDataItem {
    /// Returns an iterator over static fields of the class.
    #[inline]
    pub fn iter_static_fields(&self) -> impl Iterator<Item = &EncodedField> {
        self.static_fields.iter()
    }

    /// Returns an iterator over instance fields of the class.
    #[inline]
    pub fn iter_instance_fields(&self) -> impl Iterator<Item = &EncodedField> {
        self.instance_fields.iter()
    }

    /// Returns an iterator over all fields declared in the class.
    #[inline]
    pub fn iter_fields(&self) -> impl Iterator<Item = &EncodedField> {
        self.iter_static_fields().chain(self.iter_instance_fields())
    }

    /// Returns an iterator over direct methods of the class.
    #[inline]
    pub fn iter_direct_methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.direct_methods.iter()
    }

    /// Returns an iterator over virtual methods of the class.
    #[inline]
    pub fn iter_virtual_methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.virtual_methods.iter()
    }

    /// Returns an iterator over all methods declared in the class, direct
    /// ones first.
    #[inline]
    pub fn iter_methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.iter_direct_methods()
            .chain(self.iter_virtual_methods())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.static_fields.is_empty()
            && self.instance_fields.is_empty()
            && self.direct_methods.is_empty()
            && self.virtual_methods.is_empty()
    }
}

impl Dex {
    /// Decodes the fields and methods lists of a class definition.
    ///
    /// Nothing is cached: each call decodes the class data again from the
    /// file buffer. A class without data yields an empty [`ClassDataItem`].
    pub fn read_class_data(&self, class_def: &ClassDefItem) -> DexResult<ClassDataItem> {
        let Some(offset) = class_def.class_data_off else {
            return Ok(ClassDataItem::default());
        };

        let mut reader = self.reader();
        reader.seek(offset)?;
        let static_fields_size = reader.read_uleb128()?;
        let instance_fields_size = reader.read_uleb128()?;
        let direct_methods_size = reader.read_uleb128()?;
        let virtual_methods_size = reader.read_uleb128()?;
        log::trace!(
            "class data at {:#x}: {} static fields, {} instance fields, {} direct methods, {} virtual methods",
            offset,
            static_fields_size.value(),
            instance_fields_size.value(),
            direct_methods_size.value(),
            virtual_methods_size.value(),
        );

        let nb_fields = self.field_id_items.len();
        let nb_methods = self.method_id_items.len();
        Ok(ClassDataItem {
            static_fields: encoded_fields(&mut reader, static_fields_size, nb_fields)?,
            instance_fields: encoded_fields(&mut reader, instance_fields_size, nb_fields)?,
            direct_methods: encoded_methods(&mut reader, direct_methods_size, nb_methods)?,
            virtual_methods: encoded_methods(&mut reader, virtual_methods_size, nb_methods)?,
        })
    }
}

// Computes the absolute index from the running one; each group of the
// class data restarts from 0.
fn next_index<T>(
    base: Option<usize>,
    diff: Uleb128,
    table_size: usize,
    what: &str,
) -> DexResult<Index<T>> {
    let idx = base
        .unwrap_or(0)
        .checked_add(diff.value() as usize)
        .ok_or_else(|| DexError::Structure(format!("{what} index overflow")))?;
    if idx >= table_size {
        return Err(DexError::ResNotFound(format!("{what} #{idx}")));
    }
    Ok(Index::new(idx))
}

fn encoded_fields(
    reader: &mut Reader,
    count: Uleb128,
    table_size: usize,
) -> DexResult<Vec<EncodedField>> {
    let mut fields = Vec::new();
    let mut base = None;
    for _ in 0..count.value() {
        let field_idx_diff = reader.read_uleb128()?;
        let flags = reader.read_uleb128()?.value();
        let field_idx: Index<FieldIdItem> =
            next_index(base, field_idx_diff, table_size, "FieldIdItem")?;
        let access_flags = FieldFlags::from_bits(flags).ok_or(DexError::InvalidFlags {
            what: "field",
            flags,
        })?;
        base = Some(field_idx.as_usize());
        fields.push(EncodedField {
            field_idx_diff,
            field_idx,
            access_flags,
        });
    }
    Ok(fields)
}

fn encoded_methods(
    reader: &mut Reader,
    count: Uleb128,
    table_size: usize,
) -> DexResult<Vec<EncodedMethod>> {
    let mut methods = Vec::new();
    let mut base = None;
    for _ in 0..count.value() {
        let method_idx_diff = reader.read_uleb128()?;
        let flags = reader.read_uleb128()?.value();
        let code_off = reader.read_uleb128()?.value();
        let method_idx: Index<MethodIdItem> =
            next_index(base, method_idx_diff, table_size, "MethodIdItem")?;
        let access_flags = MethodFlags::from_bits(flags).ok_or(DexError::InvalidFlags {
            what: "method",
            flags,
        })?;
        base = Some(method_idx.as_usize());
        methods.push(EncodedMethod {
            method_idx_diff,
            method_idx,
            access_flags,
            code_off: (code_off != 0).then_some(code_off as usize),
        });
    }
    Ok(methods)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_testdex::{ClassDef, DexBuilder, FieldDef, MethodDef};

    fn with_raw_data(raw: Vec<u8>) -> Dex {
        let mut builder = DexBuilder::new();
        builder.method("LA;", "a", "V", &[]);
        builder.method("LA;", "b", "V", &[]);
        builder.field("LA;", "f", "I");
        builder.class(ClassDef::new("LA;").raw_data(raw));
        crate::parse(&builder.build().unwrap()).unwrap()
    }

    fn indices(methods: impl Iterator<Item = usize>) -> Vec<usize> {
        methods.collect()
    }

    #[test]
    fn generated_class_data() {
        let mut builder = DexBuilder::new();
        let f0 = builder.field("LA;", "x", "I");
        let f1 = builder.field("LA;", "y", "I");
        let m0 = builder.method("LA;", "<init>", "V", &[]);
        let m1 = builder.method("LA;", "run", "V", &[]);
        let m2 = builder.method("LA;", "stop", "V", &[]);
        builder.class(
            ClassDef::new("LA;")
                .static_field(FieldDef::new(f1, 0x9))
                .instance_field(FieldDef::new(f0, 0x2))
                .direct_method(MethodDef::new(m0, 0x10001))
                .virtual_method(MethodDef::new(m1, 0x1))
                .virtual_method(MethodDef::new(m2, 0x401)),
        );
        let dex = crate::parse(&builder.build().unwrap()).unwrap();
        let data = dex.read_class_data(&dex.class_defs()[0]).unwrap();

        assert_eq!(indices(data.iter_static_fields().map(|f| f.index().as_usize())), vec![1]);
        assert_eq!(indices(data.iter_instance_fields().map(|f| f.index().as_usize())), vec![0]);
        assert_eq!(indices(data.iter_methods().map(|m| m.index().as_usize())), vec![0, 1, 2]);
        assert!(data.iter_direct_methods().all(|m| m.flags().contains(MethodFlags::ACC_CONSTRUCTOR)));
        assert!(data.iter_virtual_methods().nth(1).unwrap().flags().contains(MethodFlags::ACC_ABSTRACT));
        assert!(data.iter_methods().all(|m| m.code_offset().is_none()));
        assert_eq!(data.iter_fields().count(), 2);
        assert!(!data.is_empty());
        assert_eq!(
            data.iter_static_fields().next().unwrap().descriptor(&dex).unwrap().name(&dex).unwrap(),
            "y"
        );
    }

    #[test]
    fn deltas_are_prefix_sums() {
        // 3 direct methods: deltas 0, 0, 1
        let dex = with_raw_data(vec![0, 0, 3, 0, 0, 1, 0, 0, 1, 0, 1, 1, 0]);
        let data = dex.read_class_data(&dex.class_defs()[0]).unwrap();
        assert_eq!(indices(data.iter_direct_methods().map(|m| m.index().as_usize())), vec![0, 0, 1]);
        assert_eq!(
            data.iter_direct_methods().map(EncodedMethod::index_diff).collect::<Vec<_>>(),
            vec![0, 0, 1]
        );
    }

    #[test]
    fn groups_restart_from_zero() {
        // 1 direct method (delta 1), 1 virtual method (delta 0)
        let dex = with_raw_data(vec![0, 0, 1, 1, 1, 1, 0, 0, 1, 0]);
        let data = dex.read_class_data(&dex.class_defs()[0]).unwrap();
        assert_eq!(indices(data.iter_methods().map(|m| m.index().as_usize())), vec![1, 0]);
    }

    #[test]
    fn index_out_of_range() {
        let dex = with_raw_data(vec![0, 0, 1, 0, 5, 1, 0]);
        assert!(matches!(
            dex.read_class_data(&dex.class_defs()[0]),
            Err(DexError::ResNotFound(_))
        ));

        let dex = with_raw_data(vec![0, 1, 0, 0, 1, 1]);
        assert!(matches!(
            dex.read_class_data(&dex.class_defs()[0]),
            Err(DexError::ResNotFound(_))
        ));
    }

    #[test]
    fn unknown_flags() {
        // 0x200 is not a method flag
        let dex = with_raw_data(vec![0, 0, 1, 0, 0, 0x80, 0x04, 0]);
        assert!(matches!(
            dex.read_class_data(&dex.class_defs()[0]),
            Err(DexError::InvalidFlags { what: "method", flags: 0x200 })
        ));
    }

    #[test]
    fn class_without_data() {
        let mut builder = DexBuilder::new();
        builder.class(ClassDef::new("LA;").without_data());
        let dex = crate::parse(&builder.build().unwrap()).unwrap();
        let data = dex.read_class_data(&dex.class_defs()[0]).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn flags_display() {
        let flags = ClassFlags::ACC_PUBLIC | ClassFlags::ACC_FINAL;
        assert_eq!(flags.to_string(), "public final ");
    }
}
