//! Dalvik bytecode instructions definitions.
//!
//! The [`Opcode`] table carries, for each used opcode byte, its mnemonic,
//! its [`Format`] (which gives the instruction width and the operands
//! layout), the kind of item its index operand refers to, and the first
//! dex version accepting it. Decoded instructions are [`LabeledInstr`]
//! values, produced by the [`Decoder`](crate::decoder::Decoder).

use crate::errors::DexResult;
use crate::registers::{Reg, RegList, RegRange};
use crate::{Addr, Dex, DexIndex, Index, PrettyPrint, PrettyPrinter};
use opcode_derive::Opcode;
use std::fmt;
use std::fmt::Write as _;

/// Dalvik instruction formats, named after their identifier in the
/// bytecode reference: the first digit is the width in 16-bit code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    F10x,
    F12x,
    F11n,
    F11x,
    F10t,
    F20t,
    F22x,
    F21t,
    F21s,
    F21h,
    F21c,
    F23x,
    F22b,
    F22t,
    F22s,
    F22c,
    F30t,
    F32x,
    F31i,
    F31t,
    F31c,
    F35c,
    F3rc,
    F45cc,
    F4rcc,
    F51l,
}

impl Format {
    /// Width of the instruction, in code units.
    #[must_use]
    pub const fn units(self) -> usize {
        match self {
            Self::F10x | Self::F12x | Self::F11n | Self::F11x | Self::F10t => 1,
            Self::F20t
            | Self::F22x
            | Self::F21t
            | Self::F21s
            | Self::F21h
            | Self::F21c
            | Self::F23x
            | Self::F22b
            | Self::F22t
            | Self::F22s
            | Self::F22c => 2,
            Self::F30t
            | Self::F32x
            | Self::F31i
            | Self::F31t
            | Self::F31c
            | Self::F35c
            | Self::F3rc => 3,
            Self::F45cc | Self::F4rcc => 4,
            Self::F51l => 5,
        }
    }
}

/// Kind of constant pool item an index operand refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    String,
    Type,
    Field,
    Method,
    Proto,
    CallSite,
    MethodHandle,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Type => "type",
            Self::Field => "field",
            Self::Method => "method",
            Self::Proto => "proto",
            Self::CallSite => "call_site",
            Self::MethodHandle => "method_handle",
        };
        f.pad(name)
    }
}

/// Dalvik opcodes, the discriminant being the opcode byte.
///
/// Bytes 0x3e..=0x43, 0x73, 0x79, 0x7a and 0xe3..=0xf9 are unused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Opcode)]
#[repr(u8)]
pub enum Opcode {
    /// Waste cycles.
    #[opcode(mnemonic = "nop", format = "10x")]
    Nop = 0x00,

    /// Move the contents of one non-object register to another.
    #[opcode(mnemonic = "move", format = "12x")]
    Move = 0x01,
    #[opcode(mnemonic = "move/from16", format = "22x")]
    MoveFrom16 = 0x02,
    #[opcode(mnemonic = "move/16", format = "32x")]
    Move16 = 0x03,

    /// Move the contents of one register-pair to another.
    #[opcode(mnemonic = "move-wide", format = "12x")]
    MoveWide = 0x04,
    #[opcode(mnemonic = "move-wide/from16", format = "22x")]
    MoveWideFrom16 = 0x05,
    #[opcode(mnemonic = "move-wide/16", format = "32x")]
    MoveWide16 = 0x06,

    /// Move the contents of one object-bearing register to another.
    #[opcode(mnemonic = "move-object", format = "12x")]
    MoveObject = 0x07,
    #[opcode(mnemonic = "move-object/from16", format = "22x")]
    MoveObjectFrom16 = 0x08,
    #[opcode(mnemonic = "move-object/16", format = "32x")]
    MoveObject16 = 0x09,

    /// Move the single-word non-object result of the most recent invoke-kind into
    /// the indicated register.
    #[opcode(mnemonic = "move-result", format = "11x")]
    MoveResult = 0x0a,
    #[opcode(mnemonic = "move-result-wide", format = "11x")]
    MoveResultWide = 0x0b,
    #[opcode(mnemonic = "move-result-object", format = "11x")]
    MoveResultObject = 0x0c,

    /// Save a just-caught exception into the given register.
    #[opcode(mnemonic = "move-exception", format = "11x")]
    MoveException = 0x0d,

    /// Return from a void method.
    #[opcode(mnemonic = "return-void", format = "10x")]
    ReturnVoid = 0x0e,
    #[opcode(mnemonic = "return", format = "11x")]
    Return = 0x0f,
    #[opcode(mnemonic = "return-wide", format = "11x")]
    ReturnWide = 0x10,
    #[opcode(mnemonic = "return-object", format = "11x")]
    ReturnObject = 0x11,

    /// Move the given literal value (sign-extended to 32 bits) into the specified register.
    #[opcode(mnemonic = "const/4", format = "11n")]
    Const4 = 0x12,
    #[opcode(mnemonic = "const/16", format = "21s")]
    Const16 = 0x13,
    #[opcode(mnemonic = "const", format = "31i")]
    Const = 0x14,

    /// Move the given literal value (right-zero-extended to 32 bits) into the specified register.
    #[opcode(mnemonic = "const/high16", format = "21h")]
    ConstHigh16 = 0x15,
    #[opcode(mnemonic = "const-wide/16", format = "21s")]
    ConstWide16 = 0x16,
    #[opcode(mnemonic = "const-wide/32", format = "31i")]
    ConstWide32 = 0x17,
    #[opcode(mnemonic = "const-wide", format = "51l")]
    ConstWide = 0x18,
    #[opcode(mnemonic = "const-wide/high16", format = "21h")]
    ConstWideHigh16 = 0x19,

    /// Move a reference to the string specified by the given index into the specified register.
    #[opcode(mnemonic = "const-string", format = "21c", index = "string")]
    ConstString = 0x1a,
    #[opcode(mnemonic = "const-string/jumbo", format = "31c", index = "string")]
    ConstStringJumbo = 0x1b,
    #[opcode(mnemonic = "const-class", format = "21c", index = "type")]
    ConstClass = 0x1c,
    #[opcode(mnemonic = "monitor-enter", format = "11x")]
    MonitorEnter = 0x1d,
    #[opcode(mnemonic = "monitor-exit", format = "11x")]
    MonitorExit = 0x1e,
    #[opcode(mnemonic = "check-cast", format = "21c", index = "type")]
    CheckCast = 0x1f,
    #[opcode(mnemonic = "instance-of", format = "22c", index = "type")]
    InstanceOf = 0x20,
    #[opcode(mnemonic = "array-length", format = "12x")]
    ArrayLength = 0x21,
    #[opcode(mnemonic = "new-instance", format = "21c", index = "type")]
    NewInstance = 0x22,
    #[opcode(mnemonic = "new-array", format = "22c", index = "type")]
    NewArray = 0x23,
    #[opcode(mnemonic = "filled-new-array", format = "35c", index = "type")]
    FilledNewArray = 0x24,
    #[opcode(mnemonic = "filled-new-array/range", format = "3rc", index = "type")]
    FilledNewArrayRange = 0x25,

    /// Fill the given array with the indicated data, found in a payload.
    #[opcode(mnemonic = "fill-array-data", format = "31t")]
    FillArrayData = 0x26,
    #[opcode(mnemonic = "throw", format = "11x")]
    Throw = 0x27,

    /// Unconditionally jump to the indicated instruction.
    #[opcode(mnemonic = "goto", format = "10t")]
    Goto = 0x28,
    #[opcode(mnemonic = "goto/16", format = "20t")]
    Goto16 = 0x29,
    #[opcode(mnemonic = "goto/32", format = "30t")]
    Goto32 = 0x2a,

    /// Jump to a new instruction based on the value in the given register, using a
    /// table of offsets found in a payload.
    #[opcode(mnemonic = "packed-switch", format = "31t")]
    PackedSwitch = 0x2b,
    #[opcode(mnemonic = "sparse-switch", format = "31t")]
    SparseSwitch = 0x2c,
    #[opcode(mnemonic = "cmpl-float", format = "23x")]
    CmplFloat = 0x2d,
    #[opcode(mnemonic = "cmpg-float", format = "23x")]
    CmpgFloat = 0x2e,
    #[opcode(mnemonic = "cmpl-double", format = "23x")]
    CmplDouble = 0x2f,
    #[opcode(mnemonic = "cmpg-double", format = "23x")]
    CmpgDouble = 0x30,
    #[opcode(mnemonic = "cmp-long", format = "23x")]
    CmpLong = 0x31,
    #[opcode(mnemonic = "if-eq", format = "22t")]
    IfEq = 0x32,
    #[opcode(mnemonic = "if-ne", format = "22t")]
    IfNe = 0x33,
    #[opcode(mnemonic = "if-lt", format = "22t")]
    IfLt = 0x34,
    #[opcode(mnemonic = "if-ge", format = "22t")]
    IfGe = 0x35,
    #[opcode(mnemonic = "if-gt", format = "22t")]
    IfGt = 0x36,
    #[opcode(mnemonic = "if-le", format = "22t")]
    IfLe = 0x37,
    #[opcode(mnemonic = "if-eqz", format = "21t")]
    IfEqz = 0x38,
    #[opcode(mnemonic = "if-nez", format = "21t")]
    IfNez = 0x39,
    #[opcode(mnemonic = "if-ltz", format = "21t")]
    IfLtz = 0x3a,
    #[opcode(mnemonic = "if-gez", format = "21t")]
    IfGez = 0x3b,
    #[opcode(mnemonic = "if-gtz", format = "21t")]
    IfGtz = 0x3c,
    #[opcode(mnemonic = "if-lez", format = "21t")]
    IfLez = 0x3d,
    #[opcode(mnemonic = "aget", format = "23x")]
    Aget = 0x44,
    #[opcode(mnemonic = "aget-wide", format = "23x")]
    AgetWide = 0x45,
    #[opcode(mnemonic = "aget-object", format = "23x")]
    AgetObject = 0x46,
    #[opcode(mnemonic = "aget-boolean", format = "23x")]
    AgetBoolean = 0x47,
    #[opcode(mnemonic = "aget-byte", format = "23x")]
    AgetByte = 0x48,
    #[opcode(mnemonic = "aget-char", format = "23x")]
    AgetChar = 0x49,
    #[opcode(mnemonic = "aget-short", format = "23x")]
    AgetShort = 0x4a,
    #[opcode(mnemonic = "aput", format = "23x")]
    Aput = 0x4b,
    #[opcode(mnemonic = "aput-wide", format = "23x")]
    AputWide = 0x4c,
    #[opcode(mnemonic = "aput-object", format = "23x")]
    AputObject = 0x4d,
    #[opcode(mnemonic = "aput-boolean", format = "23x")]
    AputBoolean = 0x4e,
    #[opcode(mnemonic = "aput-byte", format = "23x")]
    AputByte = 0x4f,
    #[opcode(mnemonic = "aput-char", format = "23x")]
    AputChar = 0x50,
    #[opcode(mnemonic = "aput-short", format = "23x")]
    AputShort = 0x51,
    #[opcode(mnemonic = "iget", format = "22c", index = "field")]
    Iget = 0x52,
    #[opcode(mnemonic = "iget-wide", format = "22c", index = "field")]
    IgetWide = 0x53,
    #[opcode(mnemonic = "iget-object", format = "22c", index = "field")]
    IgetObject = 0x54,
    #[opcode(mnemonic = "iget-boolean", format = "22c", index = "field")]
    IgetBoolean = 0x55,
    #[opcode(mnemonic = "iget-byte", format = "22c", index = "field")]
    IgetByte = 0x56,
    #[opcode(mnemonic = "iget-char", format = "22c", index = "field")]
    IgetChar = 0x57,
    #[opcode(mnemonic = "iget-short", format = "22c", index = "field")]
    IgetShort = 0x58,
    #[opcode(mnemonic = "iput", format = "22c", index = "field")]
    Iput = 0x59,
    #[opcode(mnemonic = "iput-wide", format = "22c", index = "field")]
    IputWide = 0x5a,
    #[opcode(mnemonic = "iput-object", format = "22c", index = "field")]
    IputObject = 0x5b,
    #[opcode(mnemonic = "iput-boolean", format = "22c", index = "field")]
    IputBoolean = 0x5c,
    #[opcode(mnemonic = "iput-byte", format = "22c", index = "field")]
    IputByte = 0x5d,
    #[opcode(mnemonic = "iput-char", format = "22c", index = "field")]
    IputChar = 0x5e,
    #[opcode(mnemonic = "iput-short", format = "22c", index = "field")]
    IputShort = 0x5f,
    #[opcode(mnemonic = "sget", format = "21c", index = "field")]
    Sget = 0x60,
    #[opcode(mnemonic = "sget-wide", format = "21c", index = "field")]
    SgetWide = 0x61,
    #[opcode(mnemonic = "sget-object", format = "21c", index = "field")]
    SgetObject = 0x62,
    #[opcode(mnemonic = "sget-boolean", format = "21c", index = "field")]
    SgetBoolean = 0x63,
    #[opcode(mnemonic = "sget-byte", format = "21c", index = "field")]
    SgetByte = 0x64,
    #[opcode(mnemonic = "sget-char", format = "21c", index = "field")]
    SgetChar = 0x65,
    #[opcode(mnemonic = "sget-short", format = "21c", index = "field")]
    SgetShort = 0x66,
    #[opcode(mnemonic = "sput", format = "21c", index = "field")]
    Sput = 0x67,
    #[opcode(mnemonic = "sput-wide", format = "21c", index = "field")]
    SputWide = 0x68,
    #[opcode(mnemonic = "sput-object", format = "21c", index = "field")]
    SputObject = 0x69,
    #[opcode(mnemonic = "sput-boolean", format = "21c", index = "field")]
    SputBoolean = 0x6a,
    #[opcode(mnemonic = "sput-byte", format = "21c", index = "field")]
    SputByte = 0x6b,
    #[opcode(mnemonic = "sput-char", format = "21c", index = "field")]
    SputChar = 0x6c,
    #[opcode(mnemonic = "sput-short", format = "21c", index = "field")]
    SputShort = 0x6d,
    #[opcode(mnemonic = "invoke-virtual", format = "35c", index = "method")]
    InvokeVirtual = 0x6e,
    #[opcode(mnemonic = "invoke-super", format = "35c", index = "method")]
    InvokeSuper = 0x6f,
    #[opcode(mnemonic = "invoke-direct", format = "35c", index = "method")]
    InvokeDirect = 0x70,
    #[opcode(mnemonic = "invoke-static", format = "35c", index = "method")]
    InvokeStatic = 0x71,
    #[opcode(mnemonic = "invoke-interface", format = "35c", index = "method")]
    InvokeInterface = 0x72,
    #[opcode(mnemonic = "invoke-virtual/range", format = "3rc", index = "method")]
    InvokeVirtualRange = 0x74,
    #[opcode(mnemonic = "invoke-super/range", format = "3rc", index = "method")]
    InvokeSuperRange = 0x75,
    #[opcode(mnemonic = "invoke-direct/range", format = "3rc", index = "method")]
    InvokeDirectRange = 0x76,
    #[opcode(mnemonic = "invoke-static/range", format = "3rc", index = "method")]
    InvokeStaticRange = 0x77,
    #[opcode(mnemonic = "invoke-interface/range", format = "3rc", index = "method")]
    InvokeInterfaceRange = 0x78,
    #[opcode(mnemonic = "neg-int", format = "12x")]
    NegInt = 0x7b,
    #[opcode(mnemonic = "not-int", format = "12x")]
    NotInt = 0x7c,
    #[opcode(mnemonic = "neg-long", format = "12x")]
    NegLong = 0x7d,
    #[opcode(mnemonic = "not-long", format = "12x")]
    NotLong = 0x7e,
    #[opcode(mnemonic = "neg-float", format = "12x")]
    NegFloat = 0x7f,
    #[opcode(mnemonic = "neg-double", format = "12x")]
    NegDouble = 0x80,
    #[opcode(mnemonic = "int-to-long", format = "12x")]
    IntToLong = 0x81,
    #[opcode(mnemonic = "int-to-float", format = "12x")]
    IntToFloat = 0x82,
    #[opcode(mnemonic = "int-to-double", format = "12x")]
    IntToDouble = 0x83,
    #[opcode(mnemonic = "long-to-int", format = "12x")]
    LongToInt = 0x84,
    #[opcode(mnemonic = "long-to-float", format = "12x")]
    LongToFloat = 0x85,
    #[opcode(mnemonic = "long-to-double", format = "12x")]
    LongToDouble = 0x86,
    #[opcode(mnemonic = "float-to-int", format = "12x")]
    FloatToInt = 0x87,
    #[opcode(mnemonic = "float-to-long", format = "12x")]
    FloatToLong = 0x88,
    #[opcode(mnemonic = "float-to-double", format = "12x")]
    FloatToDouble = 0x89,
    #[opcode(mnemonic = "double-to-int", format = "12x")]
    DoubleToInt = 0x8a,
    #[opcode(mnemonic = "double-to-long", format = "12x")]
    DoubleToLong = 0x8b,
    #[opcode(mnemonic = "double-to-float", format = "12x")]
    DoubleToFloat = 0x8c,
    #[opcode(mnemonic = "int-to-byte", format = "12x")]
    IntToByte = 0x8d,
    #[opcode(mnemonic = "int-to-char", format = "12x")]
    IntToChar = 0x8e,
    #[opcode(mnemonic = "int-to-short", format = "12x")]
    IntToShort = 0x8f,
    #[opcode(mnemonic = "add-int", format = "23x")]
    AddInt = 0x90,
    #[opcode(mnemonic = "sub-int", format = "23x")]
    SubInt = 0x91,
    #[opcode(mnemonic = "mul-int", format = "23x")]
    MulInt = 0x92,
    #[opcode(mnemonic = "div-int", format = "23x")]
    DivInt = 0x93,
    #[opcode(mnemonic = "rem-int", format = "23x")]
    RemInt = 0x94,
    #[opcode(mnemonic = "and-int", format = "23x")]
    AndInt = 0x95,
    #[opcode(mnemonic = "or-int", format = "23x")]
    OrInt = 0x96,
    #[opcode(mnemonic = "xor-int", format = "23x")]
    XorInt = 0x97,
    #[opcode(mnemonic = "shl-int", format = "23x")]
    ShlInt = 0x98,
    #[opcode(mnemonic = "shr-int", format = "23x")]
    ShrInt = 0x99,
    #[opcode(mnemonic = "ushr-int", format = "23x")]
    UshrInt = 0x9a,
    #[opcode(mnemonic = "add-long", format = "23x")]
    AddLong = 0x9b,
    #[opcode(mnemonic = "sub-long", format = "23x")]
    SubLong = 0x9c,
    #[opcode(mnemonic = "mul-long", format = "23x")]
    MulLong = 0x9d,
    #[opcode(mnemonic = "div-long", format = "23x")]
    DivLong = 0x9e,
    #[opcode(mnemonic = "rem-long", format = "23x")]
    RemLong = 0x9f,
    #[opcode(mnemonic = "and-long", format = "23x")]
    AndLong = 0xa0,
    #[opcode(mnemonic = "or-long", format = "23x")]
    OrLong = 0xa1,
    #[opcode(mnemonic = "xor-long", format = "23x")]
    XorLong = 0xa2,
    #[opcode(mnemonic = "shl-long", format = "23x")]
    ShlLong = 0xa3,
    #[opcode(mnemonic = "shr-long", format = "23x")]
    ShrLong = 0xa4,
    #[opcode(mnemonic = "ushr-long", format = "23x")]
    UshrLong = 0xa5,
    #[opcode(mnemonic = "add-float", format = "23x")]
    AddFloat = 0xa6,
    #[opcode(mnemonic = "sub-float", format = "23x")]
    SubFloat = 0xa7,
    #[opcode(mnemonic = "mul-float", format = "23x")]
    MulFloat = 0xa8,
    #[opcode(mnemonic = "div-float", format = "23x")]
    DivFloat = 0xa9,
    #[opcode(mnemonic = "rem-float", format = "23x")]
    RemFloat = 0xaa,
    #[opcode(mnemonic = "add-double", format = "23x")]
    AddDouble = 0xab,
    #[opcode(mnemonic = "sub-double", format = "23x")]
    SubDouble = 0xac,
    #[opcode(mnemonic = "mul-double", format = "23x")]
    MulDouble = 0xad,
    #[opcode(mnemonic = "div-double", format = "23x")]
    DivDouble = 0xae,
    #[opcode(mnemonic = "rem-double", format = "23x")]
    RemDouble = 0xaf,
    #[opcode(mnemonic = "add-int/2addr", format = "12x")]
    AddInt2addr = 0xb0,
    #[opcode(mnemonic = "sub-int/2addr", format = "12x")]
    SubInt2addr = 0xb1,
    #[opcode(mnemonic = "mul-int/2addr", format = "12x")]
    MulInt2addr = 0xb2,
    #[opcode(mnemonic = "div-int/2addr", format = "12x")]
    DivInt2addr = 0xb3,
    #[opcode(mnemonic = "rem-int/2addr", format = "12x")]
    RemInt2addr = 0xb4,
    #[opcode(mnemonic = "and-int/2addr", format = "12x")]
    AndInt2addr = 0xb5,
    #[opcode(mnemonic = "or-int/2addr", format = "12x")]
    OrInt2addr = 0xb6,
    #[opcode(mnemonic = "xor-int/2addr", format = "12x")]
    XorInt2addr = 0xb7,
    #[opcode(mnemonic = "shl-int/2addr", format = "12x")]
    ShlInt2addr = 0xb8,
    #[opcode(mnemonic = "shr-int/2addr", format = "12x")]
    ShrInt2addr = 0xb9,
    #[opcode(mnemonic = "ushr-int/2addr", format = "12x")]
    UshrInt2addr = 0xba,
    #[opcode(mnemonic = "add-long/2addr", format = "12x")]
    AddLong2addr = 0xbb,
    #[opcode(mnemonic = "sub-long/2addr", format = "12x")]
    SubLong2addr = 0xbc,
    #[opcode(mnemonic = "mul-long/2addr", format = "12x")]
    MulLong2addr = 0xbd,
    #[opcode(mnemonic = "div-long/2addr", format = "12x")]
    DivLong2addr = 0xbe,
    #[opcode(mnemonic = "rem-long/2addr", format = "12x")]
    RemLong2addr = 0xbf,
    #[opcode(mnemonic = "and-long/2addr", format = "12x")]
    AndLong2addr = 0xc0,
    #[opcode(mnemonic = "or-long/2addr", format = "12x")]
    OrLong2addr = 0xc1,
    #[opcode(mnemonic = "xor-long/2addr", format = "12x")]
    XorLong2addr = 0xc2,
    #[opcode(mnemonic = "shl-long/2addr", format = "12x")]
    ShlLong2addr = 0xc3,
    #[opcode(mnemonic = "shr-long/2addr", format = "12x")]
    ShrLong2addr = 0xc4,
    #[opcode(mnemonic = "ushr-long/2addr", format = "12x")]
    UshrLong2addr = 0xc5,
    #[opcode(mnemonic = "add-float/2addr", format = "12x")]
    AddFloat2addr = 0xc6,
    #[opcode(mnemonic = "sub-float/2addr", format = "12x")]
    SubFloat2addr = 0xc7,
    #[opcode(mnemonic = "mul-float/2addr", format = "12x")]
    MulFloat2addr = 0xc8,
    #[opcode(mnemonic = "div-float/2addr", format = "12x")]
    DivFloat2addr = 0xc9,
    #[opcode(mnemonic = "rem-float/2addr", format = "12x")]
    RemFloat2addr = 0xca,
    #[opcode(mnemonic = "add-double/2addr", format = "12x")]
    AddDouble2addr = 0xcb,
    #[opcode(mnemonic = "sub-double/2addr", format = "12x")]
    SubDouble2addr = 0xcc,
    #[opcode(mnemonic = "mul-double/2addr", format = "12x")]
    MulDouble2addr = 0xcd,
    #[opcode(mnemonic = "div-double/2addr", format = "12x")]
    DivDouble2addr = 0xce,
    #[opcode(mnemonic = "rem-double/2addr", format = "12x")]
    RemDouble2addr = 0xcf,
    #[opcode(mnemonic = "add-int/lit16", format = "22s")]
    AddIntLit16 = 0xd0,
    #[opcode(mnemonic = "rsub-int", format = "22s")]
    RsubInt = 0xd1,
    #[opcode(mnemonic = "mul-int/lit16", format = "22s")]
    MulIntLit16 = 0xd2,
    #[opcode(mnemonic = "div-int/lit16", format = "22s")]
    DivIntLit16 = 0xd3,
    #[opcode(mnemonic = "rem-int/lit16", format = "22s")]
    RemIntLit16 = 0xd4,
    #[opcode(mnemonic = "and-int/lit16", format = "22s")]
    AndIntLit16 = 0xd5,
    #[opcode(mnemonic = "or-int/lit16", format = "22s")]
    OrIntLit16 = 0xd6,
    #[opcode(mnemonic = "xor-int/lit16", format = "22s")]
    XorIntLit16 = 0xd7,
    #[opcode(mnemonic = "add-int/lit8", format = "22b")]
    AddIntLit8 = 0xd8,
    #[opcode(mnemonic = "rsub-int/lit8", format = "22b")]
    RsubIntLit8 = 0xd9,
    #[opcode(mnemonic = "mul-int/lit8", format = "22b")]
    MulIntLit8 = 0xda,
    #[opcode(mnemonic = "div-int/lit8", format = "22b")]
    DivIntLit8 = 0xdb,
    #[opcode(mnemonic = "rem-int/lit8", format = "22b")]
    RemIntLit8 = 0xdc,
    #[opcode(mnemonic = "and-int/lit8", format = "22b")]
    AndIntLit8 = 0xdd,
    #[opcode(mnemonic = "or-int/lit8", format = "22b")]
    OrIntLit8 = 0xde,
    #[opcode(mnemonic = "xor-int/lit8", format = "22b")]
    XorIntLit8 = 0xdf,
    #[opcode(mnemonic = "shl-int/lit8", format = "22b")]
    ShlIntLit8 = 0xe0,
    #[opcode(mnemonic = "shr-int/lit8", format = "22b")]
    ShrIntLit8 = 0xe1,
    #[opcode(mnemonic = "ushr-int/lit8", format = "22b")]
    UshrIntLit8 = 0xe2,

    /// Invoke the indicated signature polymorphic method.
    #[opcode(mnemonic = "invoke-polymorphic", format = "45cc", index = "method", since = 38)]
    InvokePolymorphic = 0xfa,
    #[opcode(mnemonic = "invoke-polymorphic/range", format = "4rcc", index = "method", since = 38)]
    InvokePolymorphicRange = 0xfb,

    /// Resolve and invoke the indicated call site.
    #[opcode(mnemonic = "invoke-custom", format = "35c", index = "call_site", since = 38)]
    InvokeCustom = 0xfc,
    #[opcode(mnemonic = "invoke-custom/range", format = "3rc", index = "call_site", since = 38)]
    InvokeCustomRange = 0xfd,
    #[opcode(mnemonic = "const-method-handle", format = "21c", index = "method_handle", since = 39)]
    ConstMethodHandle = 0xfe,
    #[opcode(mnemonic = "const-method-type", format = "21c", index = "proto", since = 39)]
    ConstMethodType = 0xff,
}

impl Opcode {
    #[inline]
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.mnemonic())
    }
}

/// Decoded operands, one variant per operands layout.
///
/// Literals are sign-extended, and the `21h` ones are already shifted to
/// their final position. Branch offsets are relative to the instruction
/// address, in code units. Indices are kept raw since their table depends
/// on the opcode [`IndexKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operands {
    None,
    Reg(Reg),
    RegReg(Reg, Reg),
    RegRegReg(Reg, Reg, Reg),
    RegLit(Reg, i64),
    RegRegLit(Reg, Reg, i32),
    Branch(i32),
    RegBranch(Reg, i32),
    RegRegBranch(Reg, Reg, i32),
    RegIndex(Reg, u32),
    RegRegIndex(Reg, Reg, u32),
    List(RegList, u32),
    Range(RegRange, u32),
    /// Arguments, method index and prototype index.
    ListProto(RegList, u32, u32),
    RangeProto(RegRange, u32, u32),
    PackedSwitchPayload {
        first_key: i32,
        targets: Vec<i32>,
    },
    SparseSwitchPayload {
        keys: Vec<i32>,
        targets: Vec<i32>,
    },
    FillArrayDataPayload {
        element_width: u16,
        data: Vec<u8>,
    },
}

impl Operands {
    /// Returns the raw index operand, if any.
    #[must_use]
    pub const fn index(&self) -> Option<u32> {
        match self {
            Self::RegIndex(_, idx)
            | Self::RegRegIndex(_, _, idx)
            | Self::List(_, idx)
            | Self::Range(_, idx)
            | Self::ListProto(_, idx, _)
            | Self::RangeProto(_, idx, _) => Some(*idx),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_payload(&self) -> bool {
        matches!(
            self,
            Self::PackedSwitchPayload { .. }
                | Self::SparseSwitchPayload { .. }
                | Self::FillArrayDataPayload { .. }
        )
    }
}

pub trait Instruction {
    fn mnemonic(&self) -> &str;
    fn size(&self) -> usize;
}

/// A decoded instruction along with its address in the method bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledInstr {
    pub(crate) addr: Addr,
    pub(crate) opcode: Opcode,
    pub(crate) operands: Operands,
    pub(crate) size: usize,
}

impl Instruction for LabeledInstr {
    fn mnemonic(&self) -> &str {
        match self.operands {
            Operands::PackedSwitchPayload { .. } => "packed-switch-payload",
            Operands::SparseSwitchPayload { .. } => "sparse-switch-payload",
            Operands::FillArrayDataPayload { .. } => "fill-array-data-payload",
            _ => self.opcode.mnemonic(),
        }
    }

    #[inline]
    fn size(&self) -> usize {
        self.size
    }
}

impl LabeledInstr {
    #[inline]
    #[must_use]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    /// The opcode, payloads being reported as [`Opcode::Nop`].
    #[inline]
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    #[inline]
    #[must_use]
    pub const fn operands(&self) -> &Operands {
        &self.operands
    }

    #[inline]
    #[must_use]
    pub const fn next_addr(&self) -> Addr {
        Addr(self.addr.0 + self.size)
    }

    /// Returns the referenced item kind and raw index, if any.
    #[must_use]
    pub fn reference(&self) -> Option<(IndexKind, u32)> {
        self.opcode.index_kind().zip(self.operands.index())
    }

    /// Returns the raw method table index for instructions referencing a method.
    #[must_use]
    pub fn method_idx(&self) -> Option<usize> {
        match self.reference() {
            Some((IndexKind::Method, idx)) => Some(idx as usize),
            _ => None,
        }
    }
}

fn pretty<T: PrettyPrint>(item: &T, dex: &Dex) -> DexResult<String> {
    let mut s = String::new();
    write!(s, "{}", PrettyPrinter(item, dex))?;
    Ok(s)
}

// Writes a referenced item, falling back to its raw index when it cannot
// be resolved.
fn write_reference(f: &mut fmt::Formatter, dex: &Dex, kind: IndexKind, idx: u32) -> DexResult<()> {
    let idx_usize = idx as usize;
    let resolved = match kind {
        IndexKind::String => dex
            .string(Index::new(idx_usize))
            .map(|s| format!("\"{}\"", s.escape_debug())),
        IndexKind::Type => dex.type_name(Index::new(idx_usize)).map(str::to_string),
        IndexKind::Field => Index::<crate::fields::FieldIdItem>::new(idx_usize)
            .get(dex)
            .and_then(|field| pretty(field, dex)),
        IndexKind::Method => Index::<crate::methods::MethodIdItem>::new(idx_usize)
            .get(dex)
            .and_then(|method| pretty(method, dex)),
        IndexKind::Proto => Index::<crate::types::ProtoIdItem>::new(idx_usize)
            .get(dex)
            .and_then(|proto| pretty(proto, dex)),
        IndexKind::CallSite | IndexKind::MethodHandle => Ok(format!("{kind}@{idx}")),
    };
    match resolved {
        Ok(s) => write!(f, "{s}")?,
        Err(_) => write!(f, "{kind}@{idx}")?,
    }
    Ok(())
}

impl PrettyPrint for LabeledInstr {
    fn pp(&self, f: &mut fmt::Formatter, dex: &Dex) -> DexResult<()> {
        write!(f, "{}", self.mnemonic())?;
        let kind = self.opcode.index_kind().unwrap_or(IndexKind::Type);
        match &self.operands {
            Operands::None => (),
            Operands::Reg(a) => write!(f, " {a}")?,
            Operands::RegReg(a, b) => write!(f, " {a}, {b}")?,
            Operands::RegRegReg(a, b, c) => write!(f, " {a}, {b}, {c}")?,
            Operands::RegLit(a, l) => write!(f, " {a}, #{l:+}")?,
            Operands::RegRegLit(a, b, l) => write!(f, " {a}, {b}, #{l:+}")?,
            Operands::Branch(o) => write!(f, " {o:+}")?,
            Operands::RegBranch(a, o) => write!(f, " {a}, {o:+}")?,
            Operands::RegRegBranch(a, b, o) => write!(f, " {a}, {b}, {o:+}")?,
            Operands::RegIndex(a, idx) => {
                write!(f, " {a}, ")?;
                write_reference(f, dex, kind, *idx)?;
            }
            Operands::RegRegIndex(a, b, idx) => {
                write!(f, " {a}, {b}, ")?;
                write_reference(f, dex, kind, *idx)?;
            }
            Operands::List(args, idx) => {
                write!(f, " {args}, ")?;
                write_reference(f, dex, kind, *idx)?;
            }
            Operands::Range(rr, idx) => {
                write!(f, " {rr}, ")?;
                write_reference(f, dex, kind, *idx)?;
            }
            Operands::ListProto(args, idx, proto) => {
                write!(f, " {args}, ")?;
                write_reference(f, dex, kind, *idx)?;
                write!(f, ", ")?;
                write_reference(f, dex, IndexKind::Proto, *proto)?;
            }
            Operands::RangeProto(rr, idx, proto) => {
                write!(f, " {rr}, ")?;
                write_reference(f, dex, kind, *idx)?;
                write!(f, ", ")?;
                write_reference(f, dex, IndexKind::Proto, *proto)?;
            }
            Operands::PackedSwitchPayload { first_key, targets } => {
                write!(f, " first_key={first_key}, {} target(s)", targets.len())?;
            }
            Operands::SparseSwitchPayload { targets, .. } => {
                write!(f, " {} target(s)", targets.len())?;
            }
            Operands::FillArrayDataPayload {
                element_width,
                data,
            } => {
                write!(f, " width={element_width}, {} byte(s)", data.len())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_table() {
        let used = (0..=255u8).filter_map(Opcode::from_byte).count();
        assert_eq!(used, 224);
        for byte in (0x3e..=0x43).chain([0x73, 0x79, 0x7a]).chain(0xe3..=0xf9) {
            assert!(Opcode::from_byte(byte).is_none(), "{byte:#04x}");
        }
        for byte in 0..=255u8 {
            if let Some(op) = Opcode::from_byte(byte) {
                assert_eq!(op.byte(), byte);
            }
        }
    }

    #[test]
    fn opcode_metadata() {
        assert_eq!(Opcode::InvokeVirtual.mnemonic(), "invoke-virtual");
        assert_eq!(Opcode::InvokeVirtual.format(), Format::F35c);
        assert_eq!(Opcode::InvokeVirtual.index_kind(), Some(IndexKind::Method));
        assert_eq!(Opcode::InvokeStaticRange.format(), Format::F3rc);
        assert_eq!(Opcode::ConstWide.format().units(), 5);
        assert_eq!(Opcode::Nop.index_kind(), None);
        assert_eq!(Opcode::Nop.since(), 35);
        assert_eq!(Opcode::InvokePolymorphic.since(), 38);
        assert_eq!(Opcode::InvokeCustom.index_kind(), Some(IndexKind::CallSite));
        assert_eq!(Opcode::ConstMethodHandle.since(), 39);
        assert_eq!(Opcode::ConstMethodType.index_kind(), Some(IndexKind::Proto));
        assert_eq!(Opcode::SgetObject.index_kind(), Some(IndexKind::Field));
        assert_eq!(Opcode::from_byte(0xd8), Some(Opcode::AddIntLit8));
        assert_eq!(Opcode::UshrIntLit8.byte(), 0xe2);
        assert_eq!(Opcode::RemDouble2addr.byte(), 0xcf);
        assert_eq!(Opcode::IntToShort.byte(), 0x8f);
    }

    #[test]
    fn method_references() {
        let instr = LabeledInstr {
            addr: Addr(3),
            opcode: Opcode::InvokeStatic,
            operands: Operands::List(RegList::from(vec![1u8]), 7),
            size: 3,
        };
        assert_eq!(instr.method_idx(), Some(7));
        assert_eq!(instr.next_addr(), Addr(6));

        let instr = LabeledInstr {
            addr: Addr(0),
            opcode: Opcode::InvokeCustom,
            operands: Operands::List(RegList::from(vec![1u8]), 7),
            size: 3,
        };
        assert_eq!(instr.method_idx(), None);
        assert_eq!(instr.reference(), Some((IndexKind::CallSite, 7)));
    }
}
