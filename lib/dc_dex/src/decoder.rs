//! Lazy Dalvik bytecode decoder.
//!
//! A [`Decoder`] walks a method bytecode from its first code unit and
//! yields one [`LabeledInstr`] per instruction or payload. It stops at the
//! first error: once an error has been yielded the iterator is exhausted.

use crate::errors::{DexError, DexResult};
use crate::instrs::{Format, LabeledInstr, Opcode, Operands};
use crate::registers::{RegList, RegRange};
use crate::Addr;
use nom::bits::complete::take as take_bits;
use nom::bits::{bits, bytes};
use nom::bytes::complete::{tag, take};
use nom::combinator::{map, map_opt, value, verify};
use nom::error::ErrorKind;
use nom::multi::count;
use nom::number::complete::{le_i16, le_i32, le_i64, le_i8, le_u16, le_u32, le_u8};
use nom::sequence::{pair, preceded, tuple};
use nom::{Finish, IResult};
use std::iter::FusedIterator;

const PACKED_SWITCH_IDENT: u8 = 0x01;
const SPARSE_SWITCH_IDENT: u8 = 0x02;
const FILL_ARRAY_DATA_IDENT: u8 = 0x03;

/// Iterator over the instructions of a method bytecode.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    insns: &'a [u8],
    // current address, in code units
    pos: usize,
    version: u32,
    done: bool,
}

impl<'a> Decoder<'a> {
    /// Builds a decoder over raw bytecode, `version` being the dex version
    /// used to reject opcodes introduced later.
    #[must_use]
    pub const fn new(insns: &'a [u8], version: u32) -> Self {
        Self {
            insns,
            pos: 0,
            version,
            done: false,
        }
    }

    /// Address of the next instruction to decode.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> Addr {
        Addr(self.pos)
    }

    const fn units(&self) -> usize {
        self.insns.len() / 2
    }

    fn decode_next(&self) -> DexResult<LabeledInstr> {
        let addr = Addr(self.pos);
        let available = self.units() - self.pos;
        let window = &self.insns[self.pos * 2..self.units() * 2];
        let &[op, high, ..] = window else {
            return Err(DexError::InstructionOverrun {
                addr,
                mnemonic: Opcode::Nop.mnemonic(),
                needed: 1,
                available,
            });
        };

        if op == 0 && high != 0 {
            return decode_payload(addr, window, available, high);
        }

        let opcode = Opcode::from_byte(op).ok_or(DexError::UnknownOpcode { addr, opcode: op })?;
        if opcode.since() > self.version {
            log::debug!(
                "{} at {addr} requires dex version {:03}, file is {:03}",
                opcode.mnemonic(),
                opcode.since(),
                self.version
            );
            return Err(DexError::UnknownOpcode { addr, opcode: op });
        }

        let needed = opcode.format().units();
        if needed > available {
            return Err(DexError::InstructionOverrun {
                addr,
                mnemonic: opcode.mnemonic(),
                needed,
                available,
            });
        }

        let (_, operands) = parse_operands(opcode, &window[1..needed * 2])
            .finish()
            .map_err(|err| invalid_instruction(addr, opcode.mnemonic(), err))?;
        Ok(LabeledInstr {
            addr,
            opcode,
            operands,
            size: needed,
        })
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = DexResult<LabeledInstr>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.units() {
            return None;
        }
        match self.decode_next() {
            Ok(instr) => {
                self.pos += instr.size;
                Some(Ok(instr))
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<'a> FusedIterator for Decoder<'a> {}

fn invalid_instruction(addr: Addr, mnemonic: &str, err: DexError) -> DexError {
    let reason = match err {
        DexError::Parsing {
            kind: ErrorKind::Tag,
            ..
        } => "non-zero padding byte".to_string(),
        DexError::Parsing {
            kind: ErrorKind::Verify | ErrorKind::MapOpt,
            ..
        } => "invalid registers count".to_string(),
        other => other.to_string(),
    };
    DexError::InvalidInstruction {
        addr,
        reason: format!("{mnemonic}: {reason}"),
    }
}

// `window` starts at the payload identifier and spans every code unit left.
fn decode_payload(addr: Addr, window: &[u8], available: usize, ident: u8) -> DexResult<LabeledInstr> {
    let (mnemonic, header_units) = match ident {
        PACKED_SWITCH_IDENT => ("packed-switch-payload", 4),
        SPARSE_SWITCH_IDENT => ("sparse-switch-payload", 2),
        FILL_ARRAY_DATA_IDENT => ("fill-array-data-payload", 4),
        _ => {
            return Err(DexError::InvalidInstruction {
                addr,
                reason: format!("unknown payload identifier {:#06x}", u16::from(ident) << 8),
            })
        }
    };
    let overrun = |needed| DexError::InstructionOverrun {
        addr,
        mnemonic,
        needed,
        available,
    };
    if header_units > available {
        return Err(overrun(header_units));
    }

    let size = payload_units(ident, &window[2..header_units * 2])
        .finish()
        .map(|(_, size)| size)
        .map_err(|err| invalid_instruction(addr, mnemonic, err))?
        .ok_or_else(|| overrun(usize::MAX))?;
    if size > available {
        return Err(overrun(size));
    }

    let (_, operands) = parse_payload(ident, &window[2..size * 2])
        .finish()
        .map_err(|err| invalid_instruction(addr, mnemonic, err))?;
    Ok(LabeledInstr {
        addr,
        opcode: Opcode::Nop,
        operands,
        size,
    })
}

// Total payload width in code units, read from its header; `None` on
// arithmetic overflow.
fn payload_units(ident: u8, input: &[u8]) -> IResult<&[u8], Option<usize>, DexError> {
    match ident {
        PACKED_SWITCH_IDENT => map(le_u16, |size| {
            usize::from(size).checked_mul(2)?.checked_add(4)
        })(input),
        SPARSE_SWITCH_IDENT => map(le_u16, |size| {
            usize::from(size).checked_mul(4)?.checked_add(2)
        })(input),
        _ => map(pair(le_u16, le_u32), |(width, size)| {
            let data = usize::from(width).checked_mul(size as usize)?;
            Some(data.checked_add(1)? / 2 + 4)
        })(input),
    }
}

fn parse_payload(ident: u8, input: &[u8]) -> IResult<&[u8], Operands, DexError> {
    match ident {
        PACKED_SWITCH_IDENT => {
            let (input, size) = le_u16(input)?;
            let (input, first_key) = le_i32(input)?;
            let (input, targets) = count(le_i32, usize::from(size))(input)?;
            Ok((input, Operands::PackedSwitchPayload { first_key, targets }))
        }
        SPARSE_SWITCH_IDENT => {
            let (input, size) = le_u16(input)?;
            let (input, keys) = count(le_i32, usize::from(size))(input)?;
            let (input, targets) = count(le_i32, usize::from(size))(input)?;
            Ok((input, Operands::SparseSwitchPayload { keys, targets }))
        }
        _ => {
            let (input, element_width) = le_u16(input)?;
            let (input, size) = le_u32(input)?;
            let (input, data) = take(usize::from(element_width) * size as usize)(input)?;
            Ok((
                input,
                Operands::FillArrayDataPayload {
                    element_width,
                    data: data.to_vec(),
                },
            ))
        }
    }
}

// `input` starts right after the opcode byte.
fn parse_operands(opcode: Opcode, input: &[u8]) -> IResult<&[u8], Operands, DexError> {
    match opcode.format() {
        Format::F10x => value(Operands::None, tag("\x00"))(input),
        Format::F12x => map(parse_nibbles, |(a, b)| Operands::RegReg(a.into(), b.into()))(input),
        Format::F11n => map(parse_11n, |(a, lit)| {
            Operands::RegLit(a.into(), i64::from(lit))
        })(input),
        Format::F11x => map(le_u8, |a| Operands::Reg(a.into()))(input),
        Format::F10t => map(le_i8, |off| Operands::Branch(off.into()))(input),
        Format::F20t => map(preceded(tag("\x00"), le_i16), |off| {
            Operands::Branch(off.into())
        })(input),
        Format::F22x => map(pair(le_u8, le_u16), |(a, b)| {
            Operands::RegReg(a.into(), b.into())
        })(input),
        Format::F21t => map(pair(le_u8, le_i16), |(a, off)| {
            Operands::RegBranch(a.into(), off.into())
        })(input),
        Format::F21s => map(pair(le_u8, le_i16), |(a, lit)| {
            Operands::RegLit(a.into(), lit.into())
        })(input),
        Format::F21h => {
            let shift = if opcode == Opcode::ConstWideHigh16 { 48 } else { 16 };
            map(pair(le_u8, le_i16), move |(a, lit)| {
                Operands::RegLit(a.into(), i64::from(lit) << shift)
            })(input)
        }
        Format::F21c => map(pair(le_u8, le_u16), |(a, idx)| {
            Operands::RegIndex(a.into(), idx.into())
        })(input),
        Format::F23x => map(tuple((le_u8, le_u8, le_u8)), |(a, b, c)| {
            Operands::RegRegReg(a.into(), b.into(), c.into())
        })(input),
        Format::F22b => map(tuple((le_u8, le_u8, le_i8)), |(a, b, lit)| {
            Operands::RegRegLit(a.into(), b.into(), lit.into())
        })(input),
        Format::F22t => map(pair(parse_nibbles, le_i16), |((a, b), off)| {
            Operands::RegRegBranch(a.into(), b.into(), off.into())
        })(input),
        Format::F22s => map(pair(parse_nibbles, le_i16), |((a, b), lit)| {
            Operands::RegRegLit(a.into(), b.into(), lit.into())
        })(input),
        Format::F22c => map(pair(parse_nibbles, le_u16), |((a, b), idx)| {
            Operands::RegRegIndex(a.into(), b.into(), idx.into())
        })(input),
        Format::F30t => map(preceded(tag("\x00"), le_i32), Operands::Branch)(input),
        Format::F32x => map(preceded(tag("\x00"), pair(le_u16, le_u16)), |(a, b)| {
            Operands::RegReg(a.into(), b.into())
        })(input),
        Format::F31i => map(pair(le_u8, le_i32), |(a, lit)| {
            Operands::RegLit(a.into(), lit.into())
        })(input),
        Format::F31t => map(pair(le_u8, le_i32), |(a, off)| {
            Operands::RegBranch(a.into(), off)
        })(input),
        Format::F31c => map(pair(le_u8, le_u32), |(a, idx)| {
            Operands::RegIndex(a.into(), idx)
        })(input),
        Format::F35c => map(parse_35c, |(args, idx)| {
            Operands::List(args, idx.into())
        })(input),
        Format::F3rc => map(parse_3rc, |(range, idx)| {
            Operands::Range(range, idx.into())
        })(input),
        Format::F45cc => map(pair(parse_35c, le_u16), |((args, idx), proto)| {
            Operands::ListProto(args, idx.into(), proto.into())
        })(input),
        Format::F4rcc => map(pair(parse_3rc, le_u16), |((range, idx), proto)| {
            Operands::RangeProto(range, idx.into(), proto.into())
        })(input),
        Format::F51l => map(pair(le_u8, le_i64), |(a, lit)| Operands::RegLit(a.into(), lit))(input),
    }
}

// B|A byte, the high nibble coming first; returns (A, B).
fn parse_nibbles<'a>(input: &'a [u8]) -> IResult<&'a [u8], (u8, u8), DexError> {
    bits(
        |input: (&'a [u8], usize)| -> IResult<(&'a [u8], usize), (u8, u8), DexError> {
            let (input, b) = take_bits(4_usize)(input)?;
            let (input, a) = take_bits(4_usize)(input)?;
            Ok((input, (a, b)))
        },
    )(input)
}

fn parse_11n(input: &[u8]) -> IResult<&[u8], (u8, i8), DexError> {
    // sign-extends the 4 bits literal
    map(parse_nibbles, |(a, b)| (a, ((b << 4) as i8) >> 4))(input)
}

// allow single char names so that they match the bytecode reference
#[allow(clippy::many_single_char_names)]
fn parse_35c<'a>(input: &'a [u8]) -> IResult<&'a [u8], (RegList, u16), DexError> {
    bits(
        |input: (&'a [u8], usize)| -> IResult<(&'a [u8], usize), (RegList, u16), DexError> {
            let (input, a): (_, u8) = verify(take_bits(4_usize), |a: &u8| *a <= 5)(input)?;
            let (input, g): (_, u8) = take_bits(4_usize)(input)?;
            let (input, b) =
                bytes(|input: &'a [u8]| -> IResult<&'a [u8], u16, DexError> { le_u16(input) })(
                    input,
                )?;
            let (input, d) = take_bits(4_usize)(input)?;
            let (input, c) = take_bits(4_usize)(input)?;
            let (input, f) = take_bits(4_usize)(input)?;
            let (input, e) = take_bits(4_usize)(input)?;
            let args = [c, d, e, f, g][..usize::from(a)].to_vec();
            Ok((input, (RegList::from(args), b)))
        },
    )(input)
}

fn parse_3rc(input: &[u8]) -> IResult<&[u8], (RegRange, u16), DexError> {
    // a range overflowing the register space is rejected
    map_opt(tuple((le_u8, le_u16, le_u16)), |(a, b, c)| {
        RegRange::new(c, u16::from(a)).map(|range| (range, b))
    })(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrs::Instruction;
    use crate::registers::Reg;

    fn units(code: &[u16]) -> Vec<u8> {
        code.iter().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn decode(code: &[u16], version: u32) -> Vec<DexResult<LabeledInstr>> {
        let insns = units(code);
        Decoder::new(&insns, version).collect()
    }

    fn decode_ok(code: &[u16]) -> Vec<LabeledInstr> {
        decode(code, 35)
            .into_iter()
            .collect::<DexResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn simple_instructions() {
        let instrs = decode_ok(&[0x0000, 0x2101, 0xf012, 0x000e]);
        assert_eq!(instrs.len(), 4);
        assert_eq!(instrs[0].opcode(), Opcode::Nop);
        assert_eq!(instrs[0].operands(), &Operands::None);
        assert_eq!(instrs[1].opcode(), Opcode::Move);
        assert_eq!(
            instrs[1].operands(),
            &Operands::RegReg(Reg::from(1u8), Reg::from(2u8))
        );
        assert_eq!(instrs[2].mnemonic(), "const/4");
        assert_eq!(instrs[2].operands(), &Operands::RegLit(Reg::from(0u8), -1));
        assert_eq!(instrs[3].opcode(), Opcode::ReturnVoid);
        assert_eq!(instrs[3].addr(), Addr(3));
    }

    #[test]
    fn literals_and_branches() {
        let instrs = decode_ok(&[0x7012, 0x0015, 0x1234, 0x0019, 0x8000, 0xfe28, 0x0029, 0xfffd]);
        assert_eq!(instrs[0].operands(), &Operands::RegLit(Reg::from(0u8), 7));
        assert_eq!(
            instrs[1].operands(),
            &Operands::RegLit(Reg::from(0u8), 0x1234_0000)
        );
        assert_eq!(instrs[2].operands(), &Operands::RegLit(Reg::from(0u8), i64::MIN));
        assert_eq!(instrs[3].operands(), &Operands::Branch(-2));
        assert_eq!(instrs[4].operands(), &Operands::Branch(-3));
        assert_eq!(instrs[4].addr(), Addr(6));
    }

    #[test]
    fn invokes() {
        let instrs = decode_ok(&[0x206e, 0x0003, 0x0021, 0x0377, 0x1234, 0x0004]);
        assert_eq!(instrs.len(), 2);
        assert_eq!(instrs[0].opcode(), Opcode::InvokeVirtual);
        assert_eq!(
            instrs[0].operands(),
            &Operands::List(RegList::from(vec![1u8, 2]), 3)
        );
        assert_eq!(instrs[0].method_idx(), Some(3));
        assert_eq!(instrs[0].size(), 3);
        assert_eq!(instrs[1].opcode(), Opcode::InvokeStaticRange);
        assert_eq!(
            instrs[1].operands(),
            &Operands::Range(RegRange::new(4, 3).unwrap(), 0x1234)
        );
        assert_eq!(instrs[1].addr(), Addr(3));
    }

    #[test]
    fn argumentless_ranges() {
        let instrs = decode_ok(&[0x0077, 0x0005, 0x0000, 0x0025, 0x0002, 0x0007, 0x000e]);
        assert_eq!(instrs.len(), 3);
        assert_eq!(instrs[0].opcode(), Opcode::InvokeStaticRange);
        assert_eq!(
            instrs[0].operands(),
            &Operands::Range(RegRange::new(0, 0).unwrap(), 5)
        );
        assert_eq!(instrs[0].method_idx(), Some(5));
        assert_eq!(instrs[1].opcode(), Opcode::FilledNewArrayRange);
        assert_eq!(instrs[1].addr(), Addr(3));
        assert_eq!(instrs[2].opcode(), Opcode::ReturnVoid);
        assert_eq!(instrs[2].addr(), Addr(6));
    }

    #[test]
    fn version_gated_opcodes() {
        let code = [0x10fa, 0x0002, 0x0001, 0x0005];
        let res = decode(&code, 35);
        assert!(matches!(
            res[0],
            Err(DexError::UnknownOpcode {
                opcode: 0xfa,
                ..
            })
        ));

        let res = decode(&code, 38);
        let instr = res[0].as_ref().unwrap();
        assert_eq!(instr.opcode(), Opcode::InvokePolymorphic);
        assert_eq!(
            instr.operands(),
            &Operands::ListProto(RegList::from(vec![1u8]), 2, 5)
        );
        assert_eq!(instr.size(), 4);
    }

    #[test]
    fn payloads() {
        let instrs = decode_ok(&[
            0x000e, 0x0000, // return-void, alignment nop
            0x0100, 0x0002, 0x0001, 0x0000, 0x0004, 0x0000, 0xfffe, 0xffff,
            0x0200, 0x0001, 0x000a, 0x0000, 0x0006, 0x0000,
            0x0300, 0x0001, 0x0003, 0x0000, 0x0201, 0x0003,
        ]);
        assert_eq!(instrs.len(), 5);
        assert_eq!(instrs[2].addr(), Addr(2));
        assert_eq!(instrs[2].mnemonic(), "packed-switch-payload");
        assert_eq!(
            instrs[2].operands(),
            &Operands::PackedSwitchPayload {
                first_key: 1,
                targets: vec![4, -2]
            }
        );
        assert_eq!(instrs[2].size(), 8);
        assert_eq!(
            instrs[3].operands(),
            &Operands::SparseSwitchPayload {
                keys: vec![10],
                targets: vec![6]
            }
        );
        assert_eq!(instrs[3].size(), 6);
        assert_eq!(
            instrs[4].operands(),
            &Operands::FillArrayDataPayload {
                element_width: 1,
                data: vec![1, 2, 3]
            }
        );
        assert_eq!(instrs[4].size(), 6);
        assert_eq!(instrs[4].next_addr(), Addr(22));
    }

    #[test]
    fn unknown_opcode_stops_decoding() {
        let insns = units(&[0x000e, 0x003e, 0x000e]);
        let mut decoder = Decoder::new(&insns, 35);
        assert!(decoder.next().unwrap().is_ok());
        match decoder.next() {
            Some(Err(DexError::UnknownOpcode { addr, opcode })) => {
                assert_eq!(addr, Addr(1));
                assert_eq!(opcode, 0x3e);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(decoder.next().is_none());
    }

    #[test]
    fn overruns() {
        let res = decode(&[0x206e, 0x0003], 35);
        assert!(matches!(
            res[0],
            Err(DexError::InstructionOverrun {
                needed: 3,
                available: 2,
                ..
            })
        ));

        let res = decode(&[0x0100, 0x0005, 0x0000, 0x0000], 35);
        assert!(matches!(
            res[0],
            Err(DexError::InstructionOverrun {
                needed: 14,
                available: 4,
                ..
            })
        ));

        let res = decode(&[0x0300, 0x0001], 35);
        assert!(matches!(
            res[0],
            Err(DexError::InstructionOverrun { needed: 4, .. })
        ));
    }

    #[test]
    fn malformed_instructions() {
        // 6 arguments
        let res = decode(&[0x606e, 0x0000, 0x0000], 35);
        assert!(matches!(res[0], Err(DexError::InvalidInstruction { .. })));

        // goto/16 with non-zero padding
        let res = decode(&[0x0129, 0x0005], 35);
        assert!(matches!(res[0], Err(DexError::InvalidInstruction { .. })));

        // range past the last register
        let res = decode(&[0x0274, 0x0000, 0xffff], 35);
        assert!(matches!(res[0], Err(DexError::InvalidInstruction { .. })));

        // unknown payload
        let res = decode(&[0x0400, 0x0000], 35);
        assert!(matches!(res[0], Err(DexError::InvalidInstruction { .. })));
    }

    #[test]
    fn odd_trailing_byte_is_ignored() {
        let mut insns = units(&[0x000e]);
        insns.push(0xff);
        let instrs: Vec<_> = Decoder::new(&insns, 35).collect();
        assert_eq!(instrs.len(), 1);
    }
}
