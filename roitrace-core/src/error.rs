//! Error types for roitrace-core.

use thiserror::Error;

/// Result type alias for roitrace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for geometry, rasterization and mask application.
#[derive(Error, Debug)]
pub enum Error {
    /// A branch needs at least two samples.
    #[error("branch needs at least 2 samples, got {got}")]
    TooFewSamples {
        /// Number of samples provided.
        got: usize,
    },

    /// Zero-length displacement or folded-back perpendiculars.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// Invalid split target (zero segment count or non-positive length).
    #[error("invalid split target: {0}")]
    InvalidSplit(String),

    /// A polygon outline needs at least three vertices.
    #[error("polygon outline needs at least 3 vertices, got {got}")]
    DegenerateOutline {
        /// Number of vertices provided.
        got: usize,
    },

    /// Invalid mask definition (empty pixel list, non-positive radius, ...).
    #[error("invalid mask definition: {0}")]
    InvalidMask(String),

    /// Overlay shape does not match the data's spatial extent.
    #[error("overlay shape {got:?} does not match data spatial extent {expected:?}")]
    ShapeMismatch {
        /// Data spatial extent (rows, cols).
        expected: (usize, usize),
        /// Shape actually provided.
        got: (usize, usize),
    },

    /// A member pixel lies outside the data's spatial extent.
    #[error("pixel index ({x}, {y}) outside data extent {extent:?}")]
    PixelOutOfRange {
        /// Column index.
        x: usize,
        /// Row index.
        y: usize,
        /// Data spatial extent (rows, cols).
        extent: (usize, usize),
    },

    /// The clipped weight mask sums to zero; the trace is undefined.
    #[error("mask has zero total weight over the data extent")]
    EmptyMaskWeight,

    /// Frame index outside the dataset's time range.
    #[error("frame {frame} outside range [0, {nframes})")]
    FrameOutOfRange {
        /// Requested frame.
        frame: usize,
        /// Number of frames in the dataset.
        nframes: usize,
    },

    /// Dataset with a zero-sized dimension.
    #[error("data must be non-empty in every dimension, got {dims:?}")]
    EmptyData {
        /// Shape actually provided (rows, cols, frames).
        dims: (usize, usize, usize),
    },

    /// Segment index outside a branch's child list.
    #[error("segment {index} does not exist, branch has {count} segments")]
    NoSuchSegment {
        /// Requested child index.
        index: usize,
        /// Number of children present.
        count: usize,
    },

    /// Lookup of a mask name that is not a member.
    #[error("no mask named {0:?}")]
    UnknownMask(String),
}
