//! Dalvik bytecode encoding helpers, each returning the code units of one
//! instruction (or payload).

pub const NOP: u8 = 0x00;
pub const RETURN_VOID: u8 = 0x0e;
pub const INVOKE_VIRTUAL: u8 = 0x6e;
pub const INVOKE_SUPER: u8 = 0x6f;
pub const INVOKE_DIRECT: u8 = 0x70;
pub const INVOKE_STATIC: u8 = 0x71;
pub const INVOKE_INTERFACE: u8 = 0x72;
pub const INVOKE_VIRTUAL_RANGE: u8 = 0x74;
pub const INVOKE_SUPER_RANGE: u8 = 0x75;
pub const INVOKE_DIRECT_RANGE: u8 = 0x76;
pub const INVOKE_STATIC_RANGE: u8 = 0x77;
pub const INVOKE_INTERFACE_RANGE: u8 = 0x78;
pub const INVOKE_POLYMORPHIC: u8 = 0xfa;
pub const INVOKE_CUSTOM: u8 = 0xfc;

#[must_use]
pub fn nop() -> Vec<u16> {
    vec![u16::from(NOP)]
}

#[must_use]
pub fn return_void() -> Vec<u16> {
    vec![u16::from(RETURN_VOID)]
}

#[must_use]
pub fn const4(reg: u8, lit: i8) -> Vec<u16> {
    vec![(u16::from(lit as u8 & 0xf) << 12) | (u16::from(reg & 0xf) << 8) | 0x12]
}

#[must_use]
pub fn const_string(reg: u8, string_idx: u16) -> Vec<u16> {
    vec![(u16::from(reg) << 8) | 0x1a, string_idx]
}

#[must_use]
pub fn goto(offset: i8) -> Vec<u16> {
    vec![(u16::from(offset as u8) << 8) | 0x28]
}

/// `35c` invoke, at most 5 arguments registers below 16.
#[must_use]
pub fn invoke(opcode: u8, method_idx: u32, args: &[u8]) -> Vec<u16> {
    let mut regs = [0u16; 5];
    for (slot, arg) in regs.iter_mut().zip(args) {
        *slot = u16::from(*arg & 0xf);
    }
    vec![
        ((args.len() as u16) << 12) | (regs[4] << 8) | u16::from(opcode),
        method_idx as u16,
        (regs[3] << 12) | (regs[2] << 8) | (regs[1] << 4) | regs[0],
    ]
}

/// `3rc` invoke over `count` registers starting at `first`.
#[must_use]
pub fn invoke_range(opcode: u8, method_idx: u32, first: u16, count: u8) -> Vec<u16> {
    vec![
        (u16::from(count) << 8) | u16::from(opcode),
        method_idx as u16,
        first,
    ]
}

#[must_use]
pub fn invoke_polymorphic(method_idx: u32, proto_idx: u32, args: &[u8]) -> Vec<u16> {
    let mut units = invoke(INVOKE_POLYMORPHIC, method_idx, args);
    units.push(proto_idx as u16);
    units
}

#[must_use]
pub fn packed_switch_payload(first_key: i32, targets: &[i32]) -> Vec<u16> {
    let mut units = vec![0x0100, targets.len() as u16];
    units.extend(split(first_key));
    for target in targets {
        units.extend(split(*target));
    }
    units
}

#[must_use]
pub fn sparse_switch_payload(keys: &[i32], targets: &[i32]) -> Vec<u16> {
    let mut units = vec![0x0200, keys.len() as u16];
    for v in keys.iter().chain(targets) {
        units.extend(split(*v));
    }
    units
}

/// Fill-array-data payload, `data` holding `data.len() / width` elements.
#[must_use]
pub fn fill_array_data_payload(width: u16, data: &[u8]) -> Vec<u16> {
    let size = (data.len() / usize::from(width)) as u32;
    let mut units = vec![0x0300, width, size as u16, (size >> 16) as u16];
    for pair in data.chunks(2) {
        let lo = u16::from(pair[0]);
        let hi = pair.get(1).copied().map_or(0, u16::from);
        units.push((hi << 8) | lo);
    }
    units
}

fn split(v: i32) -> [u16; 2] {
    let v = v as u32;
    [v as u16, (v >> 16) as u16]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodings() {
        assert_eq!(invoke(INVOKE_VIRTUAL, 3, &[1, 2]), vec![0x206e, 0x0003, 0x0021]);
        assert_eq!(invoke_range(INVOKE_STATIC_RANGE, 0x1234, 4, 3), vec![0x0377, 0x1234, 0x0004]);
        assert_eq!(const4(0, -1), vec![0xf012]);
        assert_eq!(goto(-2), vec![0xfe28]);
        assert_eq!(packed_switch_payload(1, &[4, -2]).len(), 8);
        assert_eq!(sparse_switch_payload(&[10], &[6]).len(), 6);
        assert_eq!(fill_array_data_payload(1, &[1, 2, 3]), vec![0x0300, 1, 3, 0, 0x0201, 0x0003]);
    }
}
