use crate::classes::{ClassDefItem, ClassFlags};
use crate::errors::{DexError, DexResult};
use crate::fields::FieldIdItem;
use crate::hexlify::hexlify;
use crate::map::{MapItem, MapItemType};
use crate::methods::MethodIdItem;
use crate::reader::{uleb128, Reader};
use crate::strings::{decode_string_data, StringIdItem};
use crate::types::{ProtoIdItem, TypeIdItem};
use crate::{Dex, HeaderItem, Index, NO_INDEX, SUPPORTED_VERSIONS};
use nom::bytes::complete::{tag, take, take_till};
use nom::character::complete::digit1;
use nom::combinator::{map, verify};
use nom::multi::count;
use nom::number::complete::{le_u16, le_u32, le_u8};
use nom::sequence::{pair, terminated, tuple};
use nom::{Finish, IResult};
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::convert::TryFrom;

// The guideline for dex parsing is to decode the interning tables eagerly
// and to check every index they hold, so that lookups afterwards are plain
// bounds-checked accesses. Class data and code items are left in the
// buffer and decoded on demand.

const ENDIAN_CONSTANT: u32 = 0x1234_5678;
const REVERSE_ENDIAN_CONSTANT: u32 = 0x7856_3412;

/// Dex parsing function, takes the file contents and returns a freshly
/// built [`Dex`] instance owning them.
pub(crate) fn parse_dex(mut data: Vec<u8>) -> DexResult<Dex> {
    log::trace!("parsing dex...");

    if data.len() < HeaderItem::SIZE {
        return Err(DexError::Truncated {
            expected: HeaderItem::SIZE,
            actual: data.len(),
        });
    }

    // parsing header
    let (header, _) = {
        let reader = Reader::new(&data);
        let (version, _) = reader
            .parse_at(0, magic_parser)
            .map_err(|_| DexError::BadMagic)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(DexError::Version(version));
        }
        reader.parse_at(0, header_item_parser)?
    };
    log::debug!("Dex version:  {:03}", header.version);
    log::debug!("File size:    {} bytes", header.file_size);
    log::debug!("Map offset:   {:#x}", header.map_off);

    if header.file_size > data.len() {
        return Err(DexError::Truncated {
            expected: header.file_size,
            actual: data.len(),
        });
    }
    if header.file_size < HeaderItem::SIZE {
        return Err(DexError::BadSize("file".to_string()));
    }
    if header.file_size < data.len() {
        log::warn!(
            "ignoring {} trailing byte(s) after declared file size",
            data.len() - header.file_size
        );
        data.truncate(header.file_size);
    }

    check_integrity(&data, &header)?;

    let reader = Reader::new(&data);

    // parsing map_list
    let map_list = if header.map_off == 0 {
        log::warn!("dex has no map list");
        Vec::new()
    } else {
        let (map_list, _) = reader.parse_at(header.map_off, map_list_parser)?;
        map_list
    };
    for item in &map_list {
        log::debug!(
            "found {}, offset={:#x}, size={:#x}",
            item.typ,
            item.offset,
            item.size
        );
    }
    check_map_list(&map_list, &header)?;

    // parsing ordered 'core' sections
    let string_data_offs = parse_table(
        &reader,
        MapItemType::StringIdItem,
        header.string_ids_off,
        header.string_ids_size,
        StringIdItem::SIZE,
        |_, input| map(le_u32, |off| off as usize)(input),
    )?;
    let string_id_items = string_data_offs
        .into_iter()
        .enumerate()
        .map(|(idx, off)| {
            let ((utf16_size, raw), _) = reader.parse_at(off, string_data_item_parser)?;
            Ok(StringIdItem {
                index: Index::new(idx),
                string_data_off: off,
                value: decode_string_data(utf16_size.value() as usize, raw)?,
            })
        })
        .collect::<DexResult<Vec<_>>>()?;
    let nb_strings = string_id_items.len();

    let type_id_items = parse_table(
        &reader,
        MapItemType::TypeIdItem,
        header.type_ids_off,
        header.type_ids_size,
        TypeIdItem::SIZE,
        |idx, input| map(le_u32, |descriptor_idx| (idx, descriptor_idx))(input),
    )?
    .into_iter()
    .map(|(idx, descriptor_idx)| {
        Ok(TypeIdItem {
            index: Index::new(idx),
            descriptor_idx: check_index(descriptor_idx, nb_strings, "StringIdItem")?,
        })
    })
    .collect::<DexResult<Vec<_>>>()?;
    let nb_types = type_id_items.len();

    let proto_id_items = parse_table(
        &reader,
        MapItemType::ProtoIdItem,
        header.proto_ids_off,
        header.proto_ids_size,
        ProtoIdItem::SIZE,
        |idx, input| {
            map(tuple((le_u32, le_u32, le_u32)), |fields| (idx, fields))(input)
        },
    )?
    .into_iter()
    .map(|(idx, (shorty_idx, return_type_idx, parameters_off))| {
        let parameters_off = (parameters_off != 0).then_some(parameters_off as usize);
        Ok(ProtoIdItem {
            index: Index::new(idx),
            shorty_idx: check_index(shorty_idx, nb_strings, "StringIdItem")?,
            return_type_idx: check_index(return_type_idx, nb_types, "TypeIdItem")?,
            parameters_off,
            parameters: read_type_list(&reader, parameters_off, nb_types)?,
        })
    })
    .collect::<DexResult<Vec<_>>>()?;
    let nb_protos = proto_id_items.len();

    let field_id_items = parse_table(
        &reader,
        MapItemType::FieldIdItem,
        header.field_ids_off,
        header.field_ids_size,
        FieldIdItem::SIZE,
        |idx, input| map(tuple((le_u16, le_u16, le_u32)), |fields| (idx, fields))(input),
    )?
    .into_iter()
    .map(|(idx, (class_idx, type_idx, name_idx))| {
        Ok(FieldIdItem {
            index: Index::new(idx),
            class_idx: check_index(class_idx.into(), nb_types, "TypeIdItem")?,
            type_idx: check_index(type_idx.into(), nb_types, "TypeIdItem")?,
            name_idx: check_index(name_idx, nb_strings, "StringIdItem")?,
        })
    })
    .collect::<DexResult<Vec<_>>>()?;

    let method_id_items = parse_table(
        &reader,
        MapItemType::MethodIdItem,
        header.method_ids_off,
        header.method_ids_size,
        MethodIdItem::SIZE,
        |idx, input| map(tuple((le_u16, le_u16, le_u32)), |fields| (idx, fields))(input),
    )?
    .into_iter()
    .map(|(idx, (class_idx, proto_idx, name_idx))| {
        Ok(MethodIdItem {
            index: Index::new(idx),
            class_idx: check_index(class_idx.into(), nb_types, "TypeIdItem")?,
            proto_idx: check_index(proto_idx.into(), nb_protos, "ProtoIdItem")?,
            name_idx: check_index(name_idx, nb_strings, "StringIdItem")?,
        })
    })
    .collect::<DexResult<Vec<_>>>()?;

    let class_def_items = parse_table(
        &reader,
        MapItemType::ClassDefItem,
        header.class_defs_off,
        header.class_defs_size,
        ClassDefItem::SIZE,
        |idx, input| map(count(le_u32, 8), |fields| (idx, fields))(input),
    )?
    .into_iter()
    .map(|(idx, fields)| class_def_item(&reader, idx, &fields, nb_strings, nb_types))
    .collect::<DexResult<Vec<_>>>()?;

    log::debug!(
        "{} strings, {} types, {} protos, {} fields, {} methods, {} classes",
        string_id_items.len(),
        type_id_items.len(),
        proto_id_items.len(),
        field_id_items.len(),
        method_id_items.len(),
        class_def_items.len()
    );

    Ok(Dex {
        data,
        header_item: header,
        map_list,
        string_id_items,
        type_id_items,
        proto_id_items,
        field_id_items,
        method_id_items,
        class_def_items,
    })
}

// Mismatches are reported but do not prevent parsing.
fn check_integrity(data: &[u8], header: &HeaderItem) -> DexResult<()> {
    log::debug!("Checksum:     {:x}", header.checksum);
    let checksum = adler32::adler32(&data[12..])?;
    if checksum != header.checksum {
        log::warn!("invalid checksum");
        log::warn!("    expected: {:x}", header.checksum);
        log::warn!("    computed: {:x}", checksum);
    }

    log::debug!("Signature:    {}", hexlify(&header.signature));
    let mut hasher = Sha1::new();
    hasher.update(&data[32..]);
    let signature = hasher.finalize();
    if signature.as_slice() != header.signature.as_slice() {
        log::warn!("invalid signature");
        log::warn!("    expected: {}", hexlify(&header.signature));
        log::warn!("    computed: {}", hexlify(&signature));
    }
    Ok(())
}

fn check_map_list(map_list: &[MapItem], header: &HeaderItem) -> DexResult<()> {
    // checking for duplicates
    let mut seen: BTreeSet<MapItemType> = BTreeSet::new();
    for item in map_list {
        if !seen.insert(item.typ) {
            return Err(DexError::Structure(format!("duplicate map entry {}", item.typ)));
        }
    }
    if map_list.is_empty() {
        return Ok(());
    }

    let core_sections = [
        (MapItemType::StringIdItem, header.string_ids_size, header.string_ids_off),
        (MapItemType::TypeIdItem, header.type_ids_size, header.type_ids_off),
        (MapItemType::ProtoIdItem, header.proto_ids_size, header.proto_ids_off),
        (MapItemType::FieldIdItem, header.field_ids_size, header.field_ids_off),
        (MapItemType::MethodIdItem, header.method_ids_size, header.method_ids_off),
        (MapItemType::ClassDefItem, header.class_defs_size, header.class_defs_off),
    ];
    for (typ, size, offset) in core_sections {
        match map_list.iter().find(|item| item.typ == typ) {
            Some(item) => {
                if item.size != size {
                    return Err(DexError::BadSize(format!("{typ} map entry")));
                }
                if size != 0 && item.offset != offset {
                    return Err(DexError::InvalidOffset(format!("{typ} map entry")));
                }
            }
            None if size != 0 => {
                return Err(DexError::Structure(format!("{typ} missing from map list")));
            }
            None => (),
        }
    }
    Ok(())
}

// Parses `size` fixed-width records at `offset`, checking first that the
// whole table lies inside the file.
fn parse_table<'a, T>(
    reader: &Reader<'a>,
    typ: MapItemType,
    offset: usize,
    size: usize,
    record_size: usize,
    mut parser: impl FnMut(usize, &'a [u8]) -> IResult<&'a [u8], T, DexError>,
) -> DexResult<Vec<T>> {
    if size == 0 {
        return Ok(Vec::new());
    }
    let len = size
        .checked_mul(record_size)
        .ok_or_else(|| DexError::BadSize(typ.to_string()))?;
    let bytes = reader.bytes_at(offset, len)?;
    log::trace!("parsing {size} {typ} at {offset:#x}");
    bytes
        .chunks_exact(record_size)
        .enumerate()
        .map(|(idx, record)| {
            let (_, item) = parser(idx, record).finish()?;
            Ok(item)
        })
        .collect()
}

fn check_index<T>(idx: u32, table_size: usize, what: &str) -> DexResult<Index<T>> {
    let idx = idx as usize;
    if idx < table_size {
        Ok(Index::new(idx))
    } else {
        Err(DexError::ResNotFound(format!("{what} #{idx}")))
    }
}

fn check_optional_index<T>(idx: u32, table_size: usize, what: &str) -> DexResult<Option<Index<T>>> {
    if idx == NO_INDEX {
        Ok(None)
    } else {
        check_index(idx, table_size, what).map(Some)
    }
}

fn read_type_list(
    reader: &Reader,
    offset: Option<usize>,
    nb_types: usize,
) -> DexResult<Vec<Index<TypeIdItem>>> {
    let Some(offset) = offset else {
        return Ok(Vec::new());
    };
    let (list, _) = reader.parse_at(offset, type_list_parser)?;
    list.into_iter()
        .map(|idx| check_index(idx.into(), nb_types, "TypeIdItem"))
        .collect()
}

fn class_def_item(
    reader: &Reader,
    idx: usize,
    fields: &[u32],
    nb_strings: usize,
    nb_types: usize,
) -> DexResult<ClassDefItem> {
    let &[class_idx, access_flags, superclass_idx, interfaces_off, source_file_idx, annotations_off, class_data_off, static_values_off] =
        fields
    else {
        return Err(DexError::BadSize("ClassDefItem".to_string()));
    };
    let offset = |off: u32| (off != 0).then_some(off as usize);
    let interfaces_off = offset(interfaces_off);

    Ok(ClassDefItem {
        index: Index::new(idx),
        class_idx: check_index(class_idx, nb_types, "TypeIdItem")?,
        access_flags: ClassFlags::from_bits(access_flags).ok_or(DexError::InvalidFlags {
            what: "class",
            flags: access_flags,
        })?,
        superclass_idx: check_optional_index(superclass_idx, nb_types, "TypeIdItem")?,
        interfaces_off,
        interfaces: read_type_list(reader, interfaces_off, nb_types)?,
        source_file_idx: check_optional_index(source_file_idx, nb_strings, "StringIdItem")?,
        annotations_off: offset(annotations_off),
        class_data_off: offset(class_data_off),
        static_values_off: offset(static_values_off),
    })
}

fn magic_parser(input: &[u8]) -> IResult<&[u8], u32, DexError> {
    let (input, _) = tag("dex\n")(input)?;
    let (input, v) = map(verify(digit1, |ds: &[u8]| ds.len() == 3), |vs: &[u8]| {
        u32::from(vs[0] - 0x30) * 100 + u32::from(vs[1] - 0x30) * 10 + u32::from(vs[2] - 0x30)
    })(input)?;
    let (input, _) = tag("\x00")(input)?;
    Ok((input, v))
}

fn header_item_parser(input: &[u8]) -> IResult<&[u8], HeaderItem, DexError> {
    let (input, version) = magic_parser(input)?;
    let (input, checksum) = le_u32(input)?;
    let (input, signature) = take(20_usize)(input)?;
    let (input, file_size) = le_u32(input)?;
    let (input, header_size) = le_u32(input)?;
    if header_size as usize != HeaderItem::SIZE {
        return Err(nom::Err::Failure(DexError::BadSize("header".to_string())));
    }
    let (input, endian_tag) = le_u32(input)?;
    if endian_tag != ENDIAN_CONSTANT {
        if endian_tag == REVERSE_ENDIAN_CONSTANT {
            log::error!("big endian dex files are not supported");
        }
        return Err(nom::Err::Failure(DexError::Endianness(endian_tag)));
    }
    let (input, link_size) = le_u32(input)?;
    let (input, _link_off) = le_u32(input)?;
    let (input, map_off) = le_u32(input)?;
    let (input, string_ids_size) = le_u32(input)?;
    let (input, string_ids_off) = le_u32(input)?;
    let (input, type_ids_size) = le_u32(input)?;
    let (input, type_ids_off) = le_u32(input)?;
    let (input, proto_ids_size) = le_u32(input)?;
    let (input, proto_ids_off) = le_u32(input)?;
    let (input, field_ids_size) = le_u32(input)?;
    let (input, field_ids_off) = le_u32(input)?;
    let (input, method_ids_size) = le_u32(input)?;
    let (input, method_ids_off) = le_u32(input)?;
    let (input, class_defs_size) = le_u32(input)?;
    let (input, class_defs_off) = le_u32(input)?;
    let (input, data_size) = le_u32(input)?;
    let (input, data_off) = le_u32(input)?;

    if link_size != 0 {
        log::warn!("dex has a non-null link size");
    }

    Ok((
        input,
        HeaderItem {
            version,
            checksum,
            signature: signature.to_vec(),
            file_size: file_size as usize,
            map_off: map_off as usize,
            string_ids_size: string_ids_size as usize,
            string_ids_off: string_ids_off as usize,
            type_ids_size: type_ids_size as usize,
            type_ids_off: type_ids_off as usize,
            proto_ids_size: proto_ids_size as usize,
            proto_ids_off: proto_ids_off as usize,
            field_ids_size: field_ids_size as usize,
            field_ids_off: field_ids_off as usize,
            method_ids_size: method_ids_size as usize,
            method_ids_off: method_ids_off as usize,
            class_defs_size: class_defs_size as usize,
            class_defs_off: class_defs_off as usize,
            data_size: data_size as usize,
            data_off: data_off as usize,
        },
    ))
}

fn map_item_parser(input: &[u8]) -> IResult<&[u8], MapItem, DexError> {
    let (input, raw_typ) = le_u16(input)?;
    let typ = MapItemType::try_from(raw_typ).map_err(nom::Err::Failure)?;
    let (input, _unused) = le_u16(input)?;
    let (input, (size, offset)) = pair(le_u32, le_u32)(input)?;
    Ok((
        input,
        MapItem {
            typ,
            size: size as usize,
            offset: offset as usize,
        },
    ))
}

fn map_list_parser(input: &[u8]) -> IResult<&[u8], Vec<MapItem>, DexError> {
    let (input, size) = le_u32(input)?;
    // every entry takes MapItem::SIZE bytes, checking the count upfront
    // avoids a huge allocation on corrupted files
    if (size as usize).saturating_mul(MapItem::SIZE) > input.len() {
        return Err(nom::Err::Failure(DexError::BadSize("map list".to_string())));
    }
    count(map_item_parser, size as usize)(input)
}

fn type_list_parser(input: &[u8]) -> IResult<&[u8], Vec<u16>, DexError> {
    let (input, size) = le_u32(input)?;
    if (size as usize).saturating_mul(2) > input.len() {
        return Err(nom::Err::Failure(DexError::BadSize("type list".to_string())));
    }
    count(le_u16, size as usize)(input)
}

fn string_data_item_parser(
    input: &[u8],
) -> IResult<&[u8], (dc_utils::leb::Uleb128, &[u8]), DexError> {
    pair(uleb128, terminated(take_till(|b| b == 0), le_u8))(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_testdex::{fix_checksums, ClassDef, DexBuilder, FieldDef, MethodDef};

    fn sample() -> DexBuilder {
        let mut builder = DexBuilder::new();
        let field = builder.field("Lokio/Buffer;", "size", "J");
        let read = builder.method("Lokio/Buffer;", "read", "J", &["Lokio/Buffer;", "J"]);
        let init = builder.method("Lokio/Buffer;", "<init>", "V", &[]);
        builder.class(
            ClassDef::new("Lokio/Buffer;")
                .superclass("Ljava/lang/Object;")
                .interface("Ljava/io/Closeable;")
                .source_file("Buffer.kt")
                .instance_field(FieldDef::new(field, 0x1))
                .direct_method(MethodDef::new(init, 0x10001))
                .virtual_method(MethodDef::new(read, 0x1)),
        );
        builder
    }

    #[test]
    fn parse_tables() {
        let bytes = sample().build().unwrap();
        let dex = parse_dex(bytes.clone()).unwrap();

        assert_eq!(dex.version(), 35);
        assert_eq!(dex.file_size(), bytes.len());
        assert_eq!(dex.method_ids().len(), 2);
        assert_eq!(dex.iter_field_ids().count(), 1);
        assert_eq!(dex.class_defs().len(), 1);

        let read = &dex.method_ids()[0];
        assert_eq!(read.signature(&dex).unwrap(), "Lokio/Buffer;.read(Lokio/Buffer;J)");
        assert_eq!(read.qualified_name(&dex).unwrap(), "Lokio/Buffer;.read");
        assert_eq!(
            read.return_type(&dex).unwrap(),
            crate::types::Type::Long
        );

        let class = &dex.class_defs()[0];
        assert_eq!(class.descriptor(&dex).unwrap(), "Lokio/Buffer;");
        assert_eq!(class.class_name(&dex).unwrap(), "okio/Buffer");
        assert_eq!(class.superclass(&dex).unwrap(), Some("Ljava/lang/Object;"));
        assert_eq!(class.interfaces(&dex).unwrap(), vec!["Ljava/io/Closeable;"]);
        assert_eq!(class.source_file(&dex).unwrap(), Some("Buffer.kt"));
        assert!(class.has_data());
        assert!(class.flags().contains(ClassFlags::ACC_PUBLIC));
    }

    #[test]
    fn map_list_matches_header() {
        let dex = parse_dex(sample().build().unwrap()).unwrap();
        let types: Vec<_> = dex.map_items().iter().map(MapItem::typ).collect();
        assert_eq!(types[0], MapItemType::HeaderItem);
        assert!(types.contains(&MapItemType::MethodIdItem));
        assert!(types.contains(&MapItemType::MapList));
    }

    #[test]
    fn no_class_without_data() {
        let mut builder = DexBuilder::new();
        builder.class(ClassDef::new("LEmpty;").without_data());
        let dex = parse_dex(builder.build().unwrap()).unwrap();
        assert!(!dex.class_defs()[0].has_data());
        assert_eq!(dex.class_defs()[0].superclass(&dex).unwrap(), None);
        assert_eq!(dex.class_defs()[0].source_file(&dex).unwrap(), None);
        assert!(dex.method_ids().is_empty());
    }

    #[test]
    fn newer_versions() {
        for version in [37, 38, 39, 40, 41] {
            let mut bytes = sample().build().unwrap();
            bytes[4..7].copy_from_slice(format!("{version:03}").as_bytes());
            fix_checksums(&mut bytes).unwrap();
            assert_eq!(parse_dex(bytes).unwrap().version(), version);
        }
    }

    #[test]
    fn bad_magic_and_version() {
        let mut bytes = sample().build().unwrap();
        bytes[0] = b'z';
        assert!(matches!(parse_dex(bytes), Err(DexError::BadMagic)));

        let mut bytes = sample().build().unwrap();
        bytes[4..7].copy_from_slice(b"036");
        assert!(matches!(parse_dex(bytes), Err(DexError::Version(36))));

        let mut bytes = sample().build().unwrap();
        bytes[4..7].copy_from_slice(b"0x5");
        assert!(matches!(parse_dex(bytes), Err(DexError::BadMagic)));
    }

    #[test]
    fn endianness_and_header_size() {
        let mut bytes = sample().build().unwrap();
        bytes[40..44].copy_from_slice(&REVERSE_ENDIAN_CONSTANT.to_le_bytes());
        assert!(matches!(
            parse_dex(bytes),
            Err(DexError::Endianness(REVERSE_ENDIAN_CONSTANT))
        ));

        let mut bytes = sample().build().unwrap();
        bytes[36] = 0x78;
        assert!(matches!(parse_dex(bytes), Err(DexError::BadSize(_))));
    }

    #[test]
    fn truncated_input() {
        let bytes = sample().build().unwrap();
        let err = parse_dex(bytes[..0x40].to_vec()).unwrap_err();
        assert!(err.is_truncation());

        let err = parse_dex(bytes[..bytes.len() - 1].to_vec()).unwrap_err();
        assert!(matches!(
            err,
            DexError::Truncated { expected, actual } if expected == actual + 1
        ));
    }

    #[test]
    fn trailing_data_is_ignored() {
        let mut bytes = sample().build().unwrap();
        let size = bytes.len();
        bytes.extend_from_slice(&[0xff; 16]);
        let dex = parse_dex(bytes).unwrap();
        assert_eq!(dex.data.len(), size);
    }

    #[test]
    fn bad_checksum_is_only_a_warning() {
        let mut bytes = sample().build().unwrap();
        bytes[8] ^= 0xff;
        bytes[20] ^= 0xff;
        assert!(parse_dex(bytes).is_ok());
    }

    #[test]
    fn table_out_of_bounds() {
        let mut bytes = sample().build().unwrap();
        // method_ids_size
        bytes[88..92].copy_from_slice(&0x1000_0000_u32.to_le_bytes());
        let err = parse_dex(bytes).unwrap_err();
        assert!(matches!(err, DexError::BadSize(_)), "{err:?}");
    }

    #[test]
    fn table_out_of_bounds_without_map() {
        let mut bytes = sample().build().unwrap();
        bytes[52..56].copy_from_slice(&0_u32.to_le_bytes());
        bytes[88..92].copy_from_slice(&0x1000_0000_u32.to_le_bytes());
        let err = parse_dex(bytes).unwrap_err();
        assert!(matches!(err, DexError::OutOfBounds { .. }), "{err:?}");
    }

    #[test]
    fn dangling_index() {
        let bytes = sample().build().unwrap();
        let dex = parse_dex(bytes.clone()).unwrap();
        let type_ids_off = dex.header_item.type_ids_off;

        let mut bytes = bytes;
        bytes[type_ids_off..type_ids_off + 4].copy_from_slice(&0xffff_u32.to_le_bytes());
        let err = parse_dex(bytes).unwrap_err();
        assert!(matches!(err, DexError::ResNotFound(_)), "{err:?}");
    }

    #[test]
    fn bad_class_flags() {
        let mut builder = DexBuilder::new();
        builder.class(ClassDef::new("LA;").flags(0x8000_0000).without_data());
        let err = parse_dex(builder.build().unwrap()).unwrap_err();
        assert!(matches!(err, DexError::InvalidFlags { what: "class", .. }));
    }

    #[test]
    fn duplicate_map_entry() {
        let bytes = sample().build().unwrap();
        let dex = parse_dex(bytes.clone()).unwrap();
        let map_off = dex.header_item.map_off;

        // second entry becomes a second header entry
        let mut bytes = bytes;
        let entry = map_off + 4 + MapItem::SIZE;
        bytes[entry..entry + 2].copy_from_slice(&0_u16.to_le_bytes());
        let err = parse_dex(bytes).unwrap_err();
        assert!(matches!(err, DexError::Structure(_)), "{err:?}");
    }

    #[test]
    fn string_data() {
        let mut builder = DexBuilder::new();
        let idx = builder.string("caf\u{e9} \0 \u{1f600}");
        let dex = parse_dex(builder.build().unwrap()).unwrap();
        assert_eq!(
            dex.string(Index::new(idx as usize)).unwrap(),
            "caf\u{e9} \0 \u{1f600}"
        );
        assert!(dex.string(Index::new(idx as usize + 1)).is_err());
    }
}
