//! This crate provides the bytecode analyses of the `DexCalls` project:
//! extraction of the methods called by each method body, the per-class
//! call report, and the call graph built from it.

pub mod callgraph;
pub mod calls;
pub mod errors;
pub mod report;

pub use crate::calls::{extract_calls, CallEdge, InvokeKind};
pub use crate::report::{Options, Report};
