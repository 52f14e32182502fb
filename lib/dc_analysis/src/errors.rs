//! Analysis errors definition.

use dc_dex::errors::DexError;
use rayon::ThreadPoolBuildError;
use regex::Error as RegexError;
use thiserror::Error;

pub type AnalysisResult<T> = Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("dex error: {0}")]
    Dex(#[from] DexError),

    #[error("regex error: {0}")]
    Regex(#[from] RegexError),

    #[error("worker pool error: {0}")]
    ThreadPool(#[from] ThreadPoolBuildError),
}
