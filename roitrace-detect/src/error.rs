//! Error types for roitrace-detect.

use thiserror::Error;

/// Result type alias for detection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Detection error types.
#[derive(Error, Debug)]
pub enum Error {
    /// The trace must be strictly longer than the template.
    #[error("trace of length {trace} is not longer than the {kernel}-sample kernel")]
    KernelLongerThanTrace {
        /// Trace length.
        trace: usize,
        /// Kernel length.
        kernel: usize,
    },

    /// The criterion denominator needs at least two kernel samples.
    #[error("kernel needs at least 2 samples, got {got}")]
    KernelTooShort {
        /// Kernel length provided.
        got: usize,
    },

    /// A constant kernel has no scale to fit.
    #[error("kernel is constant; the optimal-scale denominator vanishes")]
    DegenerateKernel,

    /// Invalid biexponential time constants.
    #[error("invalid time constants: {0}")]
    InvalidTau(String),
}
