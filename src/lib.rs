//! # `DexCalls`
//!
//! `dexcalls` is the main crate of the `DexCalls` project, a reader for
//! Android dex files that dumps, for every declared method, the methods its
//! bytecode calls. The project is subdivided into multiple crates and
//! `dexcalls` acts as entry point by reexporting important structs and
//! functions from those sub-crates, mostly within the `dexcalls::prelude`
//! namespace.
//!
//! ## Library basics
//!
//! Opening a dex file gives access to its tables, class data and
//! bytecode:
//!
//! ```rust,no_run
//! use dexcalls::prelude::*;
//! use dexcalls::dex;
//!
//! let dex = dex::open("classes.dex")?;
//! println!("dex version: {}", dex.version());
//! println!("methods count: {}", dex.method_ids().len());
//! # Ok::<(), DcError>(())
//! ```
//!
//! The call report lists the call targets of each method, class by class:
//!
//! ```rust,no_run
//! use dexcalls::prelude::*;
//! use dexcalls::dex;
//!
//! let dex = dex::open("classes.dex")?;
//! let report = report::build(&dex, &ReportOptions::default().parallel())?;
//! for method in report.iter_methods() {
//!     println!("{}: {} call(s)", method.name, method.calls().len());
//! }
//! # Ok::<(), DcError>(())
//! ```
//!
//! ## Sub-crates
//!
//!  - [`dc_dex`] contains the dex container parser and the Dalvik bytecode
//!    decoder,
//!  - [`dc_analysis`] contains the call targets extraction, the call report
//!    and the call graph,
//!  - [`dc_utils`] contains the small helpers the other crates share.

mod errors;

pub mod cli;
pub mod dc_callgraph;
pub mod dc_disas;
pub mod dc_dissect;

pub use dc_analysis as analysis;
pub use dc_dex as dex;
pub use dc_utils as utils;

/// Reexport module of commonly used structures and functions from `DexCalls`
/// project sub-crates:
///
/// ```rust
/// use dexcalls::prelude::*;
/// ```
pub mod prelude {
    pub use crate::errors::{DcError, DcResult};

    pub use dc_analysis::callgraph::{self, CallGraph};
    pub use dc_analysis::report::{self, Outcome, Report};
    pub use dc_analysis::{CallEdge, InvokeKind, Options as ReportOptions};

    pub use dc_dex::errors::DexError;
    pub use dc_dex::{Addr, Dex};

    use clap::ArgMatches;

    pub fn init_logger(args: &ArgMatches) {
        let env = env_logger::Env::new()
            .filter_or("DC_LOG", "info")
            .write_style("DC_LOG_STYLE");

        let mut builder = env_logger::Builder::from_env(env);
        if args.get_flag("verbose") {
            builder.filter_level(log::LevelFilter::Trace);
        } else if args.get_flag("debug") {
            builder.filter_level(log::LevelFilter::Debug);
        }
        if args.get_flag("ecslog") {
            builder.format(ecs_logger::format);
        }
        builder.init();
    }
}
