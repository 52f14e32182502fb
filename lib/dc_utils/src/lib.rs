//! Small helpers shared by the `DexCalls` crates: variable-length integer
//! value types and little-endian writers.

pub mod leb;
pub mod writers;
