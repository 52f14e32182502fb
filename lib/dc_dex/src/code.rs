//! Dalvik bytecode-related structures.

use crate::decoder::Decoder;
use crate::errors::{DexError, DexResult};
use crate::instrs::LabeledInstr;
use crate::methods::EncodedMethod;
use crate::reader::Reader;
use crate::types::TypeIdItem;
use crate::{Addr, Dex, Index};

/// The code of a method, decoded from its code item.
///
/// Instructions are not decoded up front: the raw bytecode is borrowed
/// from the [`Dex`] buffer and decoded through [`CodeItem::instructions`].
#[derive(Debug, Clone)]
pub struct CodeItem<'a> {
    pub(crate) offset: usize,
    pub(crate) registers_size: usize,
    pub(crate) ins_size: usize,
    pub(crate) outs_size: usize,
    pub(crate) debug_info_off: Option<usize>,
    pub(crate) insns_size: usize,
    pub(crate) insns: &'a [u8],
    pub(crate) tries: Vec<TryItem>,
    pub(crate) handlers: Vec<EncodedCatchHandler>,
    pub(crate) byte_size: usize,
    pub(crate) version: u32,
}

impl<'a> CodeItem<'a> {
    /// Offset of the code item in the file.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    #[must_use]
    pub const fn registers_size(&self) -> usize {
        self.registers_size
    }

    #[inline]
    #[must_use]
    pub const fn ins_size(&self) -> usize {
        self.ins_size
    }

    #[inline]
    #[must_use]
    pub const fn outs_size(&self) -> usize {
        self.outs_size
    }

    #[inline]
    #[must_use]
    pub const fn debug_info_offset(&self) -> Option<usize> {
        self.debug_info_off
    }

    /// Bytecode length, in 16-bit code units.
    #[inline]
    #[must_use]
    pub const fn insns_size(&self) -> usize {
        self.insns_size
    }

    /// Raw bytecode.
    #[inline]
    #[must_use]
    pub const fn insns(&self) -> &'a [u8] {
        self.insns
    }

    /// Size in bytes of the whole code item: header, bytecode, padding,
    /// try items and catch handlers.
    #[inline]
    #[must_use]
    pub const fn byte_size(&self) -> usize {
        self.byte_size
    }

    #[inline]
    pub fn iter_tries(&self) -> impl Iterator<Item = &TryItem> {
        self.tries.iter()
    }

    /// Returns the catch handler list, in file order.
    #[inline]
    #[must_use]
    pub fn handlers(&self) -> &[EncodedCatchHandler] {
        &self.handlers
    }

    /// Returns the catch handler a try item refers to.
    pub fn handler_of(&self, try_item: &TryItem) -> DexResult<&EncodedCatchHandler> {
        self.handlers
            .iter()
            .find(|h| h.offset == try_item.handler_off)
            .ok_or_else(|| DexError::ResNotFound("EncodedCatchHandler".to_string()))
    }

    /// Returns a lazy decoder over the method instructions.
    #[must_use]
    pub fn instructions(&self) -> Decoder<'a> {
        Decoder::new(self.insns, self.version)
    }

    /// Decodes every instruction, stopping at the first error.
    pub fn decode_all(&self) -> DexResult<Vec<LabeledInstr>> {
        self.instructions().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryItem {
    pub(crate) start_addr: usize,
    pub(crate) insn_count: usize,
    pub(crate) handler_off: usize,
}

impl TryItem {
    #[inline]
    #[must_use]
    pub const fn start_addr(&self) -> Addr {
        Addr(self.start_addr)
    }

    #[inline]
    #[must_use]
    pub const fn insn_count(&self) -> usize {
        self.insn_count
    }

    #[inline]
    #[must_use]
    pub const fn end_addr(&self) -> Addr {
        Addr(self.start_addr + self.insn_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCatchHandler {
    // byte offset from the start of the handler list, as used by try items
    pub(crate) offset: usize,
    pub(crate) handlers: Vec<(Index<TypeIdItem>, Addr)>,
    pub(crate) catch_all_addr: Option<Addr>,
}

impl EncodedCatchHandler {
    #[inline]
    pub fn iter_handlers(&self) -> impl Iterator<Item = &(Index<TypeIdItem>, Addr)> {
        self.handlers.iter()
    }

    #[inline]
    #[must_use]
    pub const fn catch_all_addr(&self) -> Option<Addr> {
        self.catch_all_addr
    }
}

impl Dex {
    /// Decodes the code item of a method, [`None`] for methods without code.
    pub fn read_code(&self, method: &EncodedMethod) -> DexResult<Option<CodeItem<'_>>> {
        method
            .code_off
            .map(|offset| self.read_code_at(offset))
            .transpose()
    }

    /// Decodes the code item at the given file offset.
    pub fn read_code_at(&self, offset: usize) -> DexResult<CodeItem<'_>> {
        let mut reader = self.reader();
        reader.seek(offset)?;
        let registers_size = reader.read_u16()?;
        let ins_size = reader.read_u16()?;
        let outs_size = reader.read_u16()?;
        let tries_size = reader.read_u16()?;
        let debug_info_off = reader.read_u32()?;
        let insns_size = reader.read_u32()? as usize;

        let byte_len = insns_size
            .checked_mul(2)
            .ok_or_else(|| DexError::BadSize("code item".to_string()))?;
        let insns = reader.read_bytes(byte_len)?;

        let mut tries = Vec::new();
        let mut handlers = Vec::new();
        if tries_size != 0 {
            if insns_size % 2 == 1 && reader.read_u16()? != 0 {
                return Err(DexError::NonZeroPadding);
            }
            for _ in 0..tries_size {
                let start_addr = reader.read_u32()? as usize;
                let insn_count = usize::from(reader.read_u16()?);
                let handler_off = usize::from(reader.read_u16()?);
                tries.push(TryItem {
                    start_addr,
                    insn_count,
                    handler_off,
                });
            }
            handlers = self.read_handlers(&mut reader)?;
            for try_item in &tries {
                if !handlers.iter().any(|h| h.offset == try_item.handler_off) {
                    return Err(DexError::InvalidOffset("try item handler".to_string()));
                }
            }
        }

        let byte_size = reader.position() - offset;
        log::trace!(
            "code item at {:#x}: {} code units, {} tries, {} bytes",
            offset,
            insns_size,
            tries_size,
            byte_size
        );

        Ok(CodeItem {
            offset,
            registers_size: usize::from(registers_size),
            ins_size: usize::from(ins_size),
            outs_size: usize::from(outs_size),
            debug_info_off: (debug_info_off != 0).then_some(debug_info_off as usize),
            insns_size,
            insns,
            tries,
            handlers,
            byte_size,
            version: self.version(),
        })
    }

    fn read_handlers(&self, reader: &mut Reader) -> DexResult<Vec<EncodedCatchHandler>> {
        let list_start = reader.position();
        let nb = reader.read_uleb128()?.value();
        let mut handlers = Vec::new();
        for _ in 0..nb {
            let offset = reader.position() - list_start;
            let size = reader.read_sleb128()?.value();
            let mut pairs = Vec::new();
            for _ in 0..size.unsigned_abs() {
                let type_idx = reader.read_uleb128()?.value() as usize;
                let addr = reader.read_uleb128()?.value() as usize;
                if type_idx >= self.type_id_items.len() {
                    return Err(DexError::ResNotFound(format!("TypeIdItem #{type_idx}")));
                }
                pairs.push((Index::new(type_idx), Addr(addr)));
            }
            let catch_all_addr = if size <= 0 {
                Some(Addr(reader.read_uleb128()?.value() as usize))
            } else {
                None
            };
            handlers.push(EncodedCatchHandler {
                offset,
                handlers: pairs,
                catch_all_addr,
            });
        }
        Ok(handlers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrs::{Instruction, Opcode};
    use dc_testdex::{asm, ClassDef, Code, DexBuilder, MethodDef, TryBlock};

    // a single class with a single virtual method, `code` being given the
    // index of `Ljava/lang/Exception;`
    fn build(code: impl FnOnce(u32) -> Option<Code>) -> Dex {
        let mut builder = DexBuilder::new();
        let exc = builder.type_("Ljava/lang/Exception;");
        let m = builder.method("LA;", "run", "V", &[]);
        let mut method = MethodDef::new(m, 0x1);
        if let Some(code) = code(exc) {
            method = method.code(code);
        }
        builder.class(ClassDef::new("LA;").virtual_method(method));
        crate::parse(&builder.build().unwrap()).unwrap()
    }

    fn first_method(dex: &Dex) -> EncodedMethod {
        let data = dex.read_class_data(&dex.class_defs()[0]).unwrap();
        let method = data.iter_methods().next().unwrap().clone();
        method
    }

    #[test]
    fn simple_code_item() {
        let dex = build(|_| Some(Code::new(2, 1, 0, asm::return_void())));
        let method = first_method(&dex);
        let code = dex.read_code(&method).unwrap().unwrap();

        assert_eq!(code.registers_size(), 2);
        assert_eq!(code.ins_size(), 1);
        assert_eq!(code.outs_size(), 0);
        assert_eq!(code.insns_size(), 1);
        assert_eq!(code.debug_info_offset(), None);
        assert_eq!(code.byte_size(), 18);
        assert_eq!(code.iter_tries().count(), 0);

        let instrs = code.decode_all().unwrap();
        assert_eq!(instrs.len(), 1);
        assert_eq!(instrs[0].opcode(), Opcode::ReturnVoid);
    }

    #[test]
    fn tries_and_handlers() {
        let dex = build(|exc| {
            let insns = [asm::nop(), asm::goto(1), asm::return_void()].concat();
            Some(Code::new(1, 0, 0, insns).try_block(TryBlock {
                start: 0,
                count: 2,
                handlers: vec![(exc, 2)],
                catch_all: Some(2),
            }))
        });
        let method = first_method(&dex);
        let code = dex.read_code(&method).unwrap().unwrap();

        // header, 3 code units, padding, 1 try item, 5 bytes of handlers
        assert_eq!(code.byte_size(), 16 + 6 + 2 + 8 + 5);
        let try_item = code.iter_tries().next().unwrap();
        assert_eq!(try_item.start_addr(), Addr(0));
        assert_eq!(try_item.end_addr(), Addr(2));

        let handler = code.handler_of(try_item).unwrap();
        let (typ, addr) = handler.iter_handlers().next().unwrap();
        assert_eq!(dex.type_name(*typ).unwrap(), "Ljava/lang/Exception;");
        assert_eq!(*addr, Addr(2));
        assert_eq!(handler.catch_all_addr(), Some(Addr(2)));
        assert_eq!(code.handlers().len(), 1);

        let sizes: Vec<_> = code.instructions().map(|i| i.unwrap().size()).collect();
        assert_eq!(sizes, vec![1, 1, 1]);
    }

    #[test]
    fn abstract_method_has_no_code() {
        let dex = build(|_| None);
        let method = first_method(&dex);
        assert!(method.code_offset().is_none());
        assert!(dex.read_code(&method).unwrap().is_none());
    }

    #[test]
    fn non_zero_padding() {
        let dex = build(|exc| {
            Some(Code::new(1, 0, 0, asm::return_void()).try_block(TryBlock {
                start: 0,
                count: 1,
                handlers: vec![(exc, 0)],
                catch_all: None,
            }))
        });
        let method = first_method(&dex);
        let offset = method.code_offset().unwrap();

        let mut bytes = dex.data.clone();
        bytes[offset + 18] = 0xff;
        let dex = crate::parse(&bytes).unwrap();
        assert!(matches!(
            dex.read_code_at(offset),
            Err(DexError::NonZeroPadding)
        ));
    }

    #[test]
    fn code_out_of_bounds() {
        let dex = build(|_| Some(Code::new(1, 0, 0, asm::return_void())));
        assert!(matches!(
            dex.read_code_at(dex.data.len() - 4),
            Err(DexError::OutOfBounds { .. })
        ));
    }
}
