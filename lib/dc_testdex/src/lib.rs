//! Small Dex images assembler, used by the test suites of the workspace.
//!
//! A [`DexBuilder`] interns strings, types, prototypes, fields and methods
//! in insertion order (no sorting is applied) and lays out a complete dex
//! file: header, id tables, string data, type lists, code items, class
//! data and map list, with valid checksum and signature.
//!
//! ```
//! use dc_testdex::{asm, ClassDef, Code, DexBuilder, MethodDef};
//!
//! let mut builder = DexBuilder::new();
//! let callee = builder.method("LFoo;", "bar", "V", &[]);
//! let caller = builder.method("LFoo;", "run", "V", &[]);
//! let code = Code::new(1, 0, 0, [asm::invoke(asm::INVOKE_STATIC, callee, &[]), asm::return_void()].concat());
//! builder.class(
//!     ClassDef::new("LFoo;")
//!         .direct_method(MethodDef::new(callee, 0x9).code(Code::new(0, 0, 0, asm::return_void())))
//!         .direct_method(MethodDef::new(caller, 0x9).code(code)),
//! );
//! let bytes = builder.build().unwrap();
//! assert_eq!(&bytes[..8], b"dex\n035\0");
//! ```

pub mod asm;

use dc_utils::leb::{Sleb128, Uleb128};
use dc_utils::writers;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::io::{self, Cursor, Seek, SeekFrom};

pub const NO_INDEX: u32 = 0xFFFF_FFFF;

const HEADER_SIZE: usize = 0x70;
const ENDIAN_CONSTANT: u32 = 0x1234_5678;

/// A try block of a code item, addresses being in code units.
#[derive(Debug, Clone, Default)]
pub struct TryBlock {
    pub start: u32,
    pub count: u16,
    /// `(type index, handler address)` pairs.
    pub handlers: Vec<(u32, u32)>,
    pub catch_all: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Code {
    registers: u16,
    ins: u16,
    outs: u16,
    insns: Vec<u16>,
    tries: Vec<TryBlock>,
}

impl Code {
    #[must_use]
    pub fn new(registers: u16, ins: u16, outs: u16, insns: Vec<u16>) -> Self {
        Self {
            registers,
            ins,
            outs,
            insns,
            tries: Vec::new(),
        }
    }

    #[must_use]
    pub fn try_block(mut self, block: TryBlock) -> Self {
        self.tries.push(block);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    method_idx: u32,
    flags: u32,
    code: Option<Code>,
}

impl MethodDef {
    #[must_use]
    pub const fn new(method_idx: u32, flags: u32) -> Self {
        Self {
            method_idx,
            flags,
            code: None,
        }
    }

    #[must_use]
    pub fn code(mut self, code: Code) -> Self {
        self.code = Some(code);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    field_idx: u32,
    flags: u32,
}

impl FieldDef {
    #[must_use]
    pub const fn new(field_idx: u32, flags: u32) -> Self {
        Self { field_idx, flags }
    }
}

/// A class definition. Fields and methods must be given in increasing
/// index order within each group.
#[derive(Debug, Clone)]
pub struct ClassDef {
    descriptor: String,
    flags: u32,
    superclass: Option<String>,
    interfaces: Vec<String>,
    source_file: Option<String>,
    static_fields: Vec<FieldDef>,
    instance_fields: Vec<FieldDef>,
    direct_methods: Vec<MethodDef>,
    virtual_methods: Vec<MethodDef>,
    raw_data: Option<Vec<u8>>,
    without_data: bool,
}

impl ClassDef {
    #[must_use]
    pub fn new(descriptor: &str) -> Self {
        Self {
            descriptor: descriptor.to_string(),
            flags: 0x1,
            superclass: None,
            interfaces: Vec::new(),
            source_file: None,
            static_fields: Vec::new(),
            instance_fields: Vec::new(),
            direct_methods: Vec::new(),
            virtual_methods: Vec::new(),
            raw_data: None,
            without_data: false,
        }
    }

    #[must_use]
    pub const fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn superclass(mut self, descriptor: &str) -> Self {
        self.superclass = Some(descriptor.to_string());
        self
    }

    #[must_use]
    pub fn interface(mut self, descriptor: &str) -> Self {
        self.interfaces.push(descriptor.to_string());
        self
    }

    #[must_use]
    pub fn source_file(mut self, name: &str) -> Self {
        self.source_file = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn static_field(mut self, field: FieldDef) -> Self {
        self.static_fields.push(field);
        self
    }

    #[must_use]
    pub fn instance_field(mut self, field: FieldDef) -> Self {
        self.instance_fields.push(field);
        self
    }

    #[must_use]
    pub fn direct_method(mut self, method: MethodDef) -> Self {
        self.direct_methods.push(method);
        self
    }

    #[must_use]
    pub fn virtual_method(mut self, method: MethodDef) -> Self {
        self.virtual_methods.push(method);
        self
    }

    /// Replaces the generated class data item by the given bytes.
    #[must_use]
    pub fn raw_data(mut self, data: Vec<u8>) -> Self {
        self.raw_data = Some(data);
        self
    }

    /// Declares the class without class data (offset 0).
    #[must_use]
    pub const fn without_data(mut self) -> Self {
        self.without_data = true;
        self
    }
}

// a class definition with its references interned
#[derive(Debug)]
struct InternedClass {
    class_idx: u32,
    superclass_idx: u32,
    interfaces: Vec<u32>,
    source_file_idx: u32,
    def: ClassDef,
}

#[derive(Debug, Default)]
pub struct DexBuilder {
    version: u32,
    strings: Vec<String>,
    string_ids: HashMap<String, u32>,
    types: Vec<u32>,
    type_ids: HashMap<String, u32>,
    protos: Vec<(u32, u32, Vec<u32>)>,
    proto_ids: HashMap<(u32, Vec<u32>), u32>,
    fields: Vec<(u32, u32, u32)>,
    field_ids: HashMap<(u32, u32, u32), u32>,
    methods: Vec<(u32, u32, u32)>,
    method_ids: HashMap<(u32, u32, u32), u32>,
    classes: Vec<InternedClass>,
}

impl DexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::with_version(35)
    }

    #[must_use]
    pub fn with_version(version: u32) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    pub fn string(&mut self, s: &str) -> u32 {
        if let Some(idx) = self.string_ids.get(s) {
            return *idx;
        }
        let idx = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.string_ids.insert(s.to_string(), idx);
        idx
    }

    pub fn type_(&mut self, descriptor: &str) -> u32 {
        if let Some(idx) = self.type_ids.get(descriptor) {
            return *idx;
        }
        let descriptor_idx = self.string(descriptor);
        let idx = self.types.len() as u32;
        self.types.push(descriptor_idx);
        self.type_ids.insert(descriptor.to_string(), idx);
        idx
    }

    pub fn proto(&mut self, return_type: &str, parameters: &[&str]) -> u32 {
        let ret = self.type_(return_type);
        let params: Vec<u32> = parameters.iter().map(|p| self.type_(p)).collect();
        if let Some(idx) = self.proto_ids.get(&(ret, params.clone())) {
            return *idx;
        }
        let shorty: String = std::iter::once(return_type)
            .chain(parameters.iter().copied())
            .map(shorty_char)
            .collect();
        let shorty_idx = self.string(&shorty);
        let idx = self.protos.len() as u32;
        self.protos.push((shorty_idx, ret, params.clone()));
        self.proto_ids.insert((ret, params), idx);
        idx
    }

    pub fn field(&mut self, class: &str, name: &str, typ: &str) -> u32 {
        let key = (self.type_(class), self.type_(typ), self.string(name));
        if let Some(idx) = self.field_ids.get(&key) {
            return *idx;
        }
        let idx = self.fields.len() as u32;
        self.fields.push(key);
        self.field_ids.insert(key, idx);
        idx
    }

    pub fn method(&mut self, class: &str, name: &str, return_type: &str, parameters: &[&str]) -> u32 {
        let key = (
            self.type_(class),
            self.proto(return_type, parameters),
            self.string(name),
        );
        if let Some(idx) = self.method_ids.get(&key) {
            return *idx;
        }
        let idx = self.methods.len() as u32;
        self.methods.push(key);
        self.method_ids.insert(key, idx);
        idx
    }

    pub fn class(&mut self, def: ClassDef) -> &mut Self {
        let class_idx = self.type_(&def.descriptor);
        let superclass_idx = match def.superclass.clone() {
            Some(s) => self.type_(&s),
            None => NO_INDEX,
        };
        let interfaces = def
            .interfaces
            .clone()
            .iter()
            .map(|i| self.type_(i))
            .collect();
        let source_file_idx = match def.source_file.clone() {
            Some(s) => self.string(&s),
            None => NO_INDEX,
        };
        self.classes.push(InternedClass {
            class_idx,
            superclass_idx,
            interfaces,
            source_file_idx,
            def,
        });
        self
    }

    /// Lays out the dex file.
    pub fn build(&self) -> io::Result<Vec<u8>> {
        let string_ids_off = HEADER_SIZE;
        let type_ids_off = string_ids_off + 4 * self.strings.len();
        let proto_ids_off = type_ids_off + 4 * self.types.len();
        let field_ids_off = proto_ids_off + 12 * self.protos.len();
        let method_ids_off = field_ids_off + 8 * self.fields.len();
        let class_defs_off = method_ids_off + 8 * self.methods.len();
        let data_off = class_defs_off + 32 * self.classes.len();

        let mut out = Cursor::new(vec![0u8; data_off]);
        out.seek(SeekFrom::Start(data_off as u64))?;
        let mut map = Vec::new();

        // string data
        let mut string_data_offs = Vec::new();
        for s in &self.strings {
            string_data_offs.push(position(&mut out)?);
            writers::uleb128(&mut out, Uleb128::new(s.encode_utf16().count() as u32, None))?;
            writers::bytes(&mut out, &mutf8_encode(s))?;
            writers::le_u8(&mut out, 0)?;
        }
        if let Some(off) = string_data_offs.first() {
            map.push((0x2002, self.strings.len(), *off));
        }

        // type lists
        let mut type_lists = 0;
        let mut first_type_list = None;
        let mut write_type_list = |out: &mut Cursor<Vec<u8>>, list: &[u32]| -> io::Result<u32> {
            if list.is_empty() {
                return Ok(0);
            }
            writers::align4(out)?;
            let off = position(out)?;
            first_type_list.get_or_insert(off);
            type_lists += 1;
            writers::le_u32(out, list.len() as u32)?;
            for t in list {
                writers::le_u16(out, *t as u16)?;
            }
            Ok(off as u32)
        };
        let mut proto_params_offs = Vec::new();
        for (_, _, params) in &self.protos {
            proto_params_offs.push(write_type_list(&mut out, params)?);
        }
        let mut interfaces_offs = Vec::new();
        for class in &self.classes {
            interfaces_offs.push(write_type_list(&mut out, &class.interfaces)?);
        }
        if let Some(off) = first_type_list {
            map.push((0x1001, type_lists, off));
        }

        // code items
        let mut code_offs: Vec<HashMap<(bool, usize), u32>> = Vec::new();
        let mut code_items = 0;
        let mut first_code = None;
        for class in &self.classes {
            let mut offs = HashMap::new();
            let groups = [
                (false, &class.def.direct_methods),
                (true, &class.def.virtual_methods),
            ];
            for (is_virtual, methods) in groups {
                for (i, method) in methods.iter().enumerate() {
                    if let Some(code) = &method.code {
                        writers::align4(&mut out)?;
                        let off = position(&mut out)?;
                        first_code.get_or_insert(off);
                        code_items += 1;
                        write_code(&mut out, code)?;
                        offs.insert((is_virtual, i), off as u32);
                    }
                }
            }
            code_offs.push(offs);
        }
        if let Some(off) = first_code {
            map.push((0x2001, code_items, off));
        }

        // class data
        let mut class_data_offs = Vec::new();
        let mut class_data = 0;
        let mut first_class_data = None;
        for (class, offs) in self.classes.iter().zip(&code_offs) {
            if class.def.without_data {
                class_data_offs.push(0);
                continue;
            }
            let off = position(&mut out)?;
            first_class_data.get_or_insert(off);
            class_data += 1;
            class_data_offs.push(off as u32);
            match &class.def.raw_data {
                Some(raw) => {
                    writers::bytes(&mut out, raw)?;
                }
                None => write_class_data(&mut out, &class.def, offs)?,
            }
        }
        if let Some(off) = first_class_data {
            map.push((0x2000, class_data, off));
        }

        // map list
        writers::align4(&mut out)?;
        let map_off = position(&mut out)?;
        let mut items = vec![(0x0000, 1, 0)];
        for (typ, size, off) in [
            (0x0001, self.strings.len(), string_ids_off),
            (0x0002, self.types.len(), type_ids_off),
            (0x0003, self.protos.len(), proto_ids_off),
            (0x0004, self.fields.len(), field_ids_off),
            (0x0005, self.methods.len(), method_ids_off),
            (0x0006, self.classes.len(), class_defs_off),
        ] {
            if size != 0 {
                items.push((typ, size, off));
            }
        }
        items.extend(map);
        items.push((0x1000, 1, map_off));
        items.sort_by_key(|(_, _, off)| *off);
        writers::le_u32(&mut out, items.len() as u32)?;
        for (typ, size, off) in items {
            writers::le_u16(&mut out, typ)?;
            writers::le_u16(&mut out, 0)?;
            writers::le_u32(&mut out, size as u32)?;
            writers::le_u32(&mut out, off as u32)?;
        }
        let file_size = position(&mut out)?;

        // id tables
        out.seek(SeekFrom::Start(string_ids_off as u64))?;
        for off in &string_data_offs {
            writers::le_u32(&mut out, *off as u32)?;
        }
        for descriptor_idx in &self.types {
            writers::le_u32(&mut out, *descriptor_idx)?;
        }
        for ((shorty, ret, _), params_off) in self.protos.iter().zip(&proto_params_offs) {
            writers::le_u32(&mut out, *shorty)?;
            writers::le_u32(&mut out, *ret)?;
            writers::le_u32(&mut out, *params_off)?;
        }
        for (class, typ, name) in &self.fields {
            writers::le_u16(&mut out, *class as u16)?;
            writers::le_u16(&mut out, *typ as u16)?;
            writers::le_u32(&mut out, *name)?;
        }
        for (class, proto, name) in &self.methods {
            writers::le_u16(&mut out, *class as u16)?;
            writers::le_u16(&mut out, *proto as u16)?;
            writers::le_u32(&mut out, *name)?;
        }
        for ((class, interfaces_off), data_off) in self
            .classes
            .iter()
            .zip(&interfaces_offs)
            .zip(&class_data_offs)
        {
            writers::le_u32(&mut out, class.class_idx)?;
            writers::le_u32(&mut out, class.def.flags)?;
            writers::le_u32(&mut out, class.superclass_idx)?;
            writers::le_u32(&mut out, *interfaces_off)?;
            writers::le_u32(&mut out, class.source_file_idx)?;
            writers::le_u32(&mut out, 0)?;
            writers::le_u32(&mut out, *data_off)?;
            writers::le_u32(&mut out, 0)?;
        }

        // header
        out.seek(SeekFrom::Start(0))?;
        writers::bytes(&mut out, format!("dex\n{:03}\0", self.version).as_bytes())?;
        writers::le_u32(&mut out, 0)?;
        writers::bytes(&mut out, &[0; 20])?;
        writers::le_u32(&mut out, file_size as u32)?;
        writers::le_u32(&mut out, HEADER_SIZE as u32)?;
        writers::le_u32(&mut out, ENDIAN_CONSTANT)?;
        writers::le_u32(&mut out, 0)?;
        writers::le_u32(&mut out, 0)?;
        writers::le_u32(&mut out, map_off as u32)?;
        for (size, off) in [
            (self.strings.len(), string_ids_off),
            (self.types.len(), type_ids_off),
            (self.protos.len(), proto_ids_off),
            (self.fields.len(), field_ids_off),
            (self.methods.len(), method_ids_off),
            (self.classes.len(), class_defs_off),
        ] {
            writers::le_u32(&mut out, size as u32)?;
            writers::le_u32(&mut out, if size == 0 { 0 } else { off as u32 })?;
        }
        writers::le_u32(&mut out, (file_size - data_off) as u32)?;
        writers::le_u32(&mut out, data_off as u32)?;

        let mut bytes = out.into_inner();
        fix_checksums(&mut bytes)?;
        Ok(bytes)
    }
}

/// Recomputes the signature and checksum of a dex image, after tests
/// patched some of its bytes.
pub fn fix_checksums(bytes: &mut [u8]) -> io::Result<()> {
    let mut hasher = Sha1::new();
    hasher.update(&bytes[32..]);
    bytes[12..32].copy_from_slice(&hasher.finalize());
    let checksum = adler32::adler32(&bytes[12..])?;
    bytes[8..12].copy_from_slice(&checksum.to_le_bytes());
    Ok(())
}

fn position(out: &mut Cursor<Vec<u8>>) -> io::Result<usize> {
    Ok(out.stream_position()? as usize)
}

fn shorty_char(descriptor: &str) -> char {
    match descriptor.chars().next() {
        Some('[') | None => 'L',
        Some(c) => c,
    }
}

/// Encodes a string in MUTF-8: null characters take 2 bytes, and
/// supplementary characters are encoded as a pair of 3 bytes surrogates.
#[must_use]
pub fn mutf8_encode(s: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for c in s.encode_utf16() {
        if c != 0 && c < 0x80 {
            out.push(c as u8);
        } else if c < 0x800 {
            out.push(0xc0 | (c >> 6) as u8);
            out.push(0x80 | (c & 0x3f) as u8);
        } else {
            out.push(0xe0 | (c >> 12) as u8);
            out.push(0x80 | ((c >> 6) & 0x3f) as u8);
            out.push(0x80 | (c & 0x3f) as u8);
        }
    }
    out
}

fn write_code(out: &mut Cursor<Vec<u8>>, code: &Code) -> io::Result<()> {
    writers::le_u16(out, code.registers)?;
    writers::le_u16(out, code.ins)?;
    writers::le_u16(out, code.outs)?;
    writers::le_u16(out, code.tries.len() as u16)?;
    writers::le_u32(out, 0)?;
    writers::le_u32(out, code.insns.len() as u32)?;
    for unit in &code.insns {
        writers::le_u16(out, *unit)?;
    }
    if code.tries.is_empty() {
        return Ok(());
    }
    if code.insns.len() % 2 == 1 {
        writers::le_u16(out, 0)?;
    }

    let mut handlers = Cursor::new(Vec::new());
    writers::uleb128(&mut handlers, Uleb128::new(code.tries.len() as u32, None))?;
    let mut handler_offs = Vec::new();
    for block in &code.tries {
        handler_offs.push(position(&mut handlers)?);
        let size = block.handlers.len() as i32;
        let size = if block.catch_all.is_some() { -size } else { size };
        writers::sleb128(&mut handlers, Sleb128::new(size, None))?;
        for (typ, addr) in &block.handlers {
            writers::uleb128(&mut handlers, Uleb128::new(*typ, None))?;
            writers::uleb128(&mut handlers, Uleb128::new(*addr, None))?;
        }
        if let Some(addr) = block.catch_all {
            writers::uleb128(&mut handlers, Uleb128::new(addr, None))?;
        }
    }
    for (block, off) in code.tries.iter().zip(handler_offs) {
        writers::le_u32(out, block.start)?;
        writers::le_u16(out, block.count)?;
        writers::le_u16(out, off as u16)?;
    }
    writers::bytes(out, &handlers.into_inner())?;
    Ok(())
}

fn write_class_data(
    out: &mut Cursor<Vec<u8>>,
    def: &ClassDef,
    code_offs: &HashMap<(bool, usize), u32>,
) -> io::Result<()> {
    for n in [
        def.static_fields.len(),
        def.instance_fields.len(),
        def.direct_methods.len(),
        def.virtual_methods.len(),
    ] {
        writers::uleb128(out, Uleb128::new(n as u32, None))?;
    }
    for fields in [&def.static_fields, &def.instance_fields] {
        let mut prev = 0;
        for field in fields {
            writers::uleb128(out, Uleb128::new(field.field_idx - prev, None))?;
            writers::uleb128(out, Uleb128::new(field.flags, None))?;
            prev = field.field_idx;
        }
    }
    for (is_virtual, methods) in [(false, &def.direct_methods), (true, &def.virtual_methods)] {
        let mut prev = 0;
        for (i, method) in methods.iter().enumerate() {
            let code_off = code_offs.get(&(is_virtual, i)).copied().unwrap_or(0);
            writers::uleb128(out, Uleb128::new(method.method_idx - prev, None))?;
            writers::uleb128(out, Uleb128::new(method.flags, None))?;
            writers::uleb128(out, Uleb128::new(code_off, None))?;
            prev = method.method_idx;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutf8() {
        assert_eq!(mutf8_encode("abc"), b"abc");
        assert_eq!(mutf8_encode("\0"), [0xc0, 0x80]);
        assert_eq!(mutf8_encode("\u{e9}"), [0xc3, 0xa9]);
        assert_eq!(mutf8_encode("\u{1f600}").len(), 6);
    }

    #[test]
    fn interning() {
        let mut builder = DexBuilder::new();
        let a = builder.method("LA;", "f", "V", &["I"]);
        let b = builder.method("LA;", "g", "V", &["I"]);
        assert_eq!(builder.method("LA;", "f", "V", &["I"]), a);
        assert_eq!(b, a + 1);
        assert_eq!(builder.protos.len(), 1);
        assert_eq!(builder.type_("LA;"), 0);
    }

    #[test]
    fn layout() {
        let mut builder = DexBuilder::with_version(38);
        let m = builder.method("LA;", "f", "V", &[]);
        builder.class(
            ClassDef::new("LA;")
                .direct_method(MethodDef::new(m, 0x9).code(Code::new(0, 0, 0, asm::return_void()))),
        );
        let bytes = builder.build().unwrap();
        assert_eq!(&bytes[..8], b"dex\n038\0");
        let file_size = u32::from_le_bytes([bytes[32], bytes[33], bytes[34], bytes[35]]);
        assert_eq!(file_size as usize, bytes.len());
        let map_off = u32::from_le_bytes([bytes[52], bytes[53], bytes[54], bytes[55]]) as usize;
        assert_eq!(map_off % 4, 0);
        assert!(map_off < bytes.len());
    }
}
