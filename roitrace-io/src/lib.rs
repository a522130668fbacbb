//! roitrace-io: file import and persistence for roitrace documents.
//!
//! This crate reads SWC skeleton files into masks and persists whole
//! documents (overlay, masks, traces) to HDF5.
//!

mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod swc;

pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{load_document, read_masks, save_document, SaveOptions};
pub use swc::{masks_from_swc, SwcFile, SwcRow};
