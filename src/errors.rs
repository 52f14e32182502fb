//! Global error handling.
//!
//! Each sub-crate of the project defines its own error type. They are
//! unified here, for example in a main function, when winding results at
//! the top-level.
//!
//! ```rust,no_run
//! use dexcalls::prelude::*;
//! use dexcalls::dex;
//!
//! fn main() -> DcResult<()> { // can return a DcError
//!    let _dex = dex::open("classes.dex")?; // can return a DexError
//!    Ok(())
//! }
//! ```

use dc_analysis::errors::AnalysisError;
use dc_dex::errors::DexError;
use std::io;
use thiserror::Error;

/// An alias for result that can be a [`DcError`].
pub type DcResult<T> = Result<T, DcError>;

/// The main error type for error winding at the top-level.
/// It mainly consists of transparent wrapper over error types that
/// are defined in dependencies.
#[derive(Debug, Error)]
pub enum DcError {
    /// Custom error for reporting bad command line arguments usage.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// Error that can be returned from [I/O operations](std::io).
    #[error(transparent)]
    IO(#[from] io::Error),

    /// Error that can be returned from regex compilation.
    #[error(transparent)]
    Regex(#[from] regex::Error),

    /// Error that can be returned when serializing reports.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Error that can be returned from [`dc_analysis`] functions.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Error that can be returned from [`dc_dex`] functions.
    #[error(transparent)]
    Dex(#[from] DexError),
}
