//! roitrace-core: geometry, rasterization and the mask model for ROI
//! trace extraction.
//!
//! This crate provides the foundational types: branch geometry with
//! arc-length re-segmentation, area-weighted polygon rasterization, the
//! closed set of mask shapes applied as `mask(data, overlay) -> trace`,
//! the observable mask container, and the document model tying them
//! together.
//!

pub mod document;
pub mod error;
pub mod geometry;
pub mod masks;
pub mod maskset;
pub mod raster;
pub mod signal;

pub use document::Document;
pub use error::{Error, Result};
pub use geometry::{Branch, Point, Sample, SplitSpec};
pub use masks::{
    BranchMask, CircleMask, Hierarchical, Mask, MaskKind, NameAllocator, Observable, PixelMask,
    PolygonMask, Segmentation, SegmentationChild, SegmentMask, Trace, Traceable,
};
pub use maskset::{MaskPath, MaskSet, Selection};
pub use raster::{coverage_weights, BoundingBox, SUPERSAMPLE};
pub use signal::{Signal, SubscriberId};
