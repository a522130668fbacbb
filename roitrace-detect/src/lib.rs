//! roitrace-detect: matched-filter event detection for fluorescence
//! traces.
//!
//! This crate provides the optimal-template (Clements–Bekkers) detector
//! that scores every time index of a trace against a fixed kernel, plus
//! the biexponential kernels typically used as templates.
//!
#![warn(missing_docs)]

mod error;
mod kernel;
mod template;

pub use error::{Error, Result};
pub use kernel::BiExponential;
pub use template::{template_matching, TemplateMatch};
