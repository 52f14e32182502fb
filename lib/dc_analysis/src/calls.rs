//! Extraction of the methods called from a method body.
//!
//! Only the invoke family carrying a method table index is considered:
//! `invoke-{virtual,super,direct,static,interface}`, their `/range`
//! variants and `invoke-polymorphic(/range)`. `invoke-custom` goes through
//! a call site and has no static target.

use dc_dex::errors::DexResult;
use dc_dex::instrs::{LabeledInstr, Opcode};
use dc_dex::methods::MethodIdItem;
use dc_dex::{Addr, Dex, Index};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeKind {
    Virtual,
    Super,
    Direct,
    Static,
    Interface,
    Polymorphic,
}

impl InvokeKind {
    /// Returns the kind of an invoke opcode along with its range flag, or
    /// `None` if the opcode does not call a method by index.
    #[must_use]
    pub const fn from_opcode(opcode: Opcode) -> Option<(Self, bool)> {
        let kind = match opcode {
            Opcode::InvokeVirtual => (Self::Virtual, false),
            Opcode::InvokeSuper => (Self::Super, false),
            Opcode::InvokeDirect => (Self::Direct, false),
            Opcode::InvokeStatic => (Self::Static, false),
            Opcode::InvokeInterface => (Self::Interface, false),
            Opcode::InvokeVirtualRange => (Self::Virtual, true),
            Opcode::InvokeSuperRange => (Self::Super, true),
            Opcode::InvokeDirectRange => (Self::Direct, true),
            Opcode::InvokeStaticRange => (Self::Static, true),
            Opcode::InvokeInterfaceRange => (Self::Interface, true),
            Opcode::InvokePolymorphic => (Self::Polymorphic, false),
            Opcode::InvokePolymorphicRange => (Self::Polymorphic, true),
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for InvokeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Self::Virtual => "virtual",
            Self::Super => "super",
            Self::Direct => "direct",
            Self::Static => "static",
            Self::Interface => "interface",
            Self::Polymorphic => "polymorphic",
        };
        f.pad(s)
    }
}

/// A caller to callee relation, one per invoke instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallEdge {
    source: Index<MethodIdItem>,
    target: Index<MethodIdItem>,
    addr: Addr,
    kind: InvokeKind,
    range: bool,
}

impl CallEdge {
    #[inline]
    #[must_use]
    pub const fn source(&self) -> Index<MethodIdItem> {
        self.source
    }

    #[inline]
    #[must_use]
    pub const fn target(&self) -> Index<MethodIdItem> {
        self.target
    }

    /// Address of the invoke instruction in the caller bytecode.
    #[inline]
    #[must_use]
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> InvokeKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn is_range(&self) -> bool {
        self.range
    }
}

/// Collects the call edges of a method body, in instruction order and
/// keeping duplicates.
///
/// The first decoding error, or the first method index that cannot be
/// resolved in the method table, aborts the extraction.
pub fn extract_calls<I>(
    source: Index<MethodIdItem>,
    instructions: I,
    dex: &Dex,
) -> DexResult<Vec<CallEdge>>
where
    I: IntoIterator<Item = DexResult<LabeledInstr>>,
{
    let mut edges = Vec::new();
    for instr in instructions {
        let instr = instr?;
        let Some((kind, range)) = InvokeKind::from_opcode(instr.opcode()) else {
            continue;
        };
        let Some(idx) = instr.method_idx() else {
            continue;
        };
        let target = dex.method_index(idx)?;
        log::trace!("{source} calls {target} at {} ({kind})", instr.addr());
        edges.push(CallEdge {
            source,
            target,
            addr: instr.addr(),
            kind,
            range,
        });
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_dex::errors::DexError;
    use dc_testdex::{asm, ClassDef, Code, DexBuilder, MethodDef};

    fn calls_of(build: impl FnOnce(&mut DexBuilder) -> (u32, Vec<u16>)) -> DexResult<Vec<CallEdge>> {
        let mut builder = DexBuilder::with_version(38);
        let (caller, insns) = build(&mut builder);
        builder.class(
            ClassDef::new("LA;").direct_method(
                MethodDef::new(caller, 0x9).code(Code::new(4, 0, 4, insns)),
            ),
        );
        let dex = dc_dex::parse(&builder.build().unwrap()).unwrap();
        let data = dex.read_class_data(&dex.class_defs()[0]).unwrap();
        let method = data.iter_methods().next().unwrap();
        let code = dex.read_code(method).unwrap().unwrap();
        extract_calls(method.index(), code.instructions(), &dex)
    }

    #[test]
    fn call_order_and_duplicates() {
        let mut ids = (0, 0);
        let edges = calls_of(|b| {
            let caller = b.method("LA;", "main", "V", &[]);
            let m1 = b.method("LB;", "m1", "V", &[]);
            let m2 = b.method("LB;", "m2", "V", &["I"]);
            ids = (m1, m2);
            let insns = [
                asm::invoke(asm::INVOKE_STATIC, m1, &[]),
                asm::invoke(asm::INVOKE_VIRTUAL, m2, &[0, 1]),
                asm::invoke(asm::INVOKE_STATIC, m1, &[]),
                asm::return_void(),
            ]
            .concat();
            (caller, insns)
        })
        .unwrap();

        let targets: Vec<usize> = edges.iter().map(|e| e.target().as_usize()).collect();
        assert_eq!(targets, vec![ids.0 as usize, ids.1 as usize, ids.0 as usize]);
        assert_eq!(edges[0].kind(), InvokeKind::Static);
        assert_eq!(edges[1].kind(), InvokeKind::Virtual);
        assert_eq!(edges[1].addr(), Addr(3));
        assert!(edges.iter().all(|e| e.source().as_usize() == 0));
    }

    #[test]
    fn range_and_polymorphic_invokes() {
        let edges = calls_of(|b| {
            let caller = b.method("LA;", "main", "V", &[]);
            let m = b.method("LB;", "m", "V", &["I", "I"]);
            let invoke = b.method(
                "Ljava/lang/invoke/MethodHandle;",
                "invoke",
                "Ljava/lang/Object;",
                &["[Ljava/lang/Object;"],
            );
            let proto = b.proto("V", &[]);
            let insns = [
                asm::invoke_range(asm::INVOKE_INTERFACE_RANGE, m, 1, 3),
                asm::invoke_polymorphic(invoke, proto, &[0]),
                asm::return_void(),
            ]
            .concat();
            (caller, insns)
        })
        .unwrap();

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].kind(), InvokeKind::Interface);
        assert!(edges[0].is_range());
        assert_eq!(edges[1].kind(), InvokeKind::Polymorphic);
        assert!(!edges[1].is_range());
        assert_eq!(edges[1].addr(), Addr(3));
    }

    #[test]
    fn argumentless_range_invoke() {
        let mut init = 0;
        let edges = calls_of(|b| {
            let caller = b.method("LA;", "main", "V", &[]);
            init = b.method("LB;", "init", "V", &[]);
            let insns = [
                asm::invoke_range(asm::INVOKE_STATIC_RANGE, init, 0, 0),
                asm::return_void(),
            ]
            .concat();
            (caller, insns)
        })
        .unwrap();

        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target().as_usize(), init as usize);
        assert_eq!(edges[0].kind(), InvokeKind::Static);
        assert!(edges[0].is_range());
    }

    #[test]
    fn other_references_are_ignored() {
        let edges = calls_of(|b| {
            let caller = b.method("LA;", "main", "V", &[]);
            let s = b.string("hello");
            let insns = [
                asm::const_string(0, s as u16),
                asm::const4(1, -1),
                asm::nop(),
                asm::return_void(),
            ]
            .concat();
            (caller, insns)
        })
        .unwrap();
        assert!(edges.is_empty());
    }

    #[test]
    fn unresolved_target() {
        let err = calls_of(|b| {
            let caller = b.method("LA;", "main", "V", &[]);
            let insns = [asm::invoke(asm::INVOKE_STATIC, 0x1234, &[]), asm::return_void()].concat();
            (caller, insns)
        })
        .unwrap_err();
        assert!(matches!(err, DexError::ResNotFound(_)));
    }

    #[test]
    fn decoding_error() {
        let err = calls_of(|b| {
            let caller = b.method("LA;", "main", "V", &[]);
            (caller, vec![0x003e, 0x000e])
        })
        .unwrap_err();
        assert!(matches!(err, DexError::UnknownOpcode { .. }));
    }
}
