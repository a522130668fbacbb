//! The mask model: ROI shapes applied to volumetric data.
//!
//! Every mask kind is callable through [`Traceable`]: applied to a 3-D
//! dataset `(rows, cols, frames)` with an optional boolean overlay, it
//! produces a 1-D time trace. Branch masks and segmentations additionally
//! expose children through [`Hierarchical`]; mutable masks expose a
//! `changed` signal through [`Observable`].

mod branch;
mod circle;
mod pixel;
mod polygon;
mod segmentation;

pub use branch::{BranchMask, SegmentMask};
pub use circle::CircleMask;
pub use pixel::PixelMask;
pub use polygon::PolygonMask;
pub use segmentation::{Segmentation, SegmentationChild};

use std::collections::HashMap;

use ndarray::{Array1, Array2, Array3};

use crate::error::{Error, Result};
use crate::signal::Signal;

/// A 1-D time trace extracted by a mask.
pub type Trace = Array1<f64>;

/// The `mask(data, overlay) -> trace` contract.
///
/// `data` has layout `(rows, cols, frames)`; `overlay`, when given, is a
/// boolean image with the data's spatial shape that multiplies into the
/// mask's weights.
pub trait Traceable: Send + Sync {
    /// Display name of the mask.
    fn name(&self) -> &str;

    /// Applies the mask and returns the weighted-mean trace.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] for a wrongly shaped overlay and
    /// [`Error::EmptyMaskWeight`] when no weight survives clipping and
    /// overlay masking.
    fn apply(&self, data: &Array3<f64>, overlay: Option<&Array2<bool>>) -> Result<Trace>;
}

/// Masks that own child masks (branches, segmentations).
pub trait Hierarchical {
    /// The children, in their stored order.
    fn children(&self) -> Vec<&dyn Traceable>;
}

/// Masks whose geometry can change after construction.
pub trait Observable {
    /// Signal fired after every mutating operation.
    fn changed(&self) -> &Signal;
}

/// Discriminant of the closed set of mask shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MaskKind {
    /// Branch with optional segment children.
    Branch,
    /// Circle delegating to a generated polygon.
    Circle,
    /// Explicit pixel index set.
    Pixels,
    /// Freehand polygon.
    Polygon,
    /// External label image.
    Segmentation,
}

impl MaskKind {
    /// Lowercase label used for generated names and storage groups.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            MaskKind::Branch => "branch",
            MaskKind::Circle => "circle",
            MaskKind::Pixels => "pixels",
            MaskKind::Polygon => "polygon",
            MaskKind::Segmentation => "segmentation",
        }
    }
}

/// The closed tagged union over all mask shapes.
#[derive(Debug)]
pub enum Mask {
    /// Branch with optional segment children.
    Branch(BranchMask),
    /// Circle delegating to a generated polygon.
    Circle(CircleMask),
    /// Explicit pixel index set.
    Pixels(PixelMask),
    /// Freehand polygon.
    Polygon(PolygonMask),
    /// External label image.
    Segmentation(Segmentation),
}

impl Mask {
    /// The variant discriminant.
    #[must_use]
    pub fn kind(&self) -> MaskKind {
        match self {
            Mask::Branch(_) => MaskKind::Branch,
            Mask::Circle(_) => MaskKind::Circle,
            Mask::Pixels(_) => MaskKind::Pixels,
            Mask::Polygon(_) => MaskKind::Polygon,
            Mask::Segmentation(_) => MaskKind::Segmentation,
        }
    }

    /// Display name of the mask.
    #[must_use]
    pub fn name(&self) -> &str {
        self.as_traceable().name()
    }

    /// The mask as a trace source.
    #[must_use]
    pub fn as_traceable(&self) -> &dyn Traceable {
        match self {
            Mask::Branch(m) => m,
            Mask::Circle(m) => m,
            Mask::Pixels(m) => m,
            Mask::Polygon(m) => m,
            Mask::Segmentation(m) => m,
        }
    }

    /// Child trace sources; empty for leaf masks.
    #[must_use]
    pub fn children(&self) -> Vec<&dyn Traceable> {
        match self {
            Mask::Branch(m) => m.children(),
            Mask::Segmentation(m) => m.children(),
            _ => Vec::new(),
        }
    }

    /// The change signal of mutable masks, if any.
    #[must_use]
    pub fn changed(&self) -> Option<&Signal> {
        match self {
            Mask::Branch(m) => Some(Observable::changed(m)),
            Mask::Circle(m) => Some(Observable::changed(m)),
            _ => None,
        }
    }
}

impl Traceable for Mask {
    fn name(&self) -> &str {
        self.as_traceable().name()
    }

    fn apply(&self, data: &Array3<f64>, overlay: Option<&Array2<bool>>) -> Result<Trace> {
        self.as_traceable().apply(data, overlay)
    }
}

impl From<BranchMask> for Mask {
    fn from(m: BranchMask) -> Self {
        Mask::Branch(m)
    }
}

impl From<CircleMask> for Mask {
    fn from(m: CircleMask) -> Self {
        Mask::Circle(m)
    }
}

impl From<PixelMask> for Mask {
    fn from(m: PixelMask) -> Self {
        Mask::Pixels(m)
    }
}

impl From<PolygonMask> for Mask {
    fn from(m: PolygonMask) -> Self {
        Mask::Polygon(m)
    }
}

impl From<Segmentation> for Mask {
    fn from(m: Segmentation) -> Self {
        Mask::Segmentation(m)
    }
}

/// Allocates `kind#N` display names with one counter per mask kind.
///
/// Injected wherever masks are created without an explicit name, instead
/// of hidden per-type global counters.
#[derive(Debug, Default)]
pub struct NameAllocator {
    counts: HashMap<MaskKind, usize>,
}

impl NameAllocator {
    /// Creates an allocator with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next `kind#N` name and advances the kind's counter.
    pub fn allocate(&mut self, kind: MaskKind) -> String {
        let count = self.counts.entry(kind).or_insert(0);
        let name = format!("{}#{}", kind.label(), *count);
        *count += 1;
        name
    }
}

/// Overlay-weighted mean over an explicit pixel membership list.
///
/// Shared by pixel masks and segmentation children: binary weights, the
/// same `sum(w * data) / sum(w)` contract as the polygon rasterizer.
pub(crate) fn pixel_weighted_mean(
    name: &str,
    x: &[usize],
    y: &[usize],
    data: &Array3<f64>,
    overlay: Option<&Array2<bool>>,
) -> Result<Trace> {
    debug_assert_eq!(x.len(), y.len(), "pixel lists of {name} out of sync");
    let (rows, cols, frames) = data.dim();
    check_overlay_shape(data, overlay)?;

    let mut trace = Array1::<f64>::zeros(frames);
    let mut weight = 0.0;
    for (&cx, &cy) in x.iter().zip(y.iter()) {
        if cy >= rows || cx >= cols {
            return Err(Error::PixelOutOfRange {
                x: cx,
                y: cy,
                extent: (rows, cols),
            });
        }
        if let Some(ov) = overlay {
            if !ov[[cy, cx]] {
                continue;
            }
        }
        weight += 1.0;
        for t in 0..frames {
            trace[t] += data[[cy, cx, t]];
        }
    }

    if weight <= 0.0 {
        return Err(Error::EmptyMaskWeight);
    }
    Ok(trace / weight)
}

/// Rejects overlays whose shape differs from the data's spatial extent.
pub(crate) fn check_overlay_shape(
    data: &Array3<f64>,
    overlay: Option<&Array2<bool>>,
) -> Result<()> {
    let (rows, cols, _) = data.dim();
    if let Some(ov) = overlay {
        if ov.dim() != (rows, cols) {
            return Err(Error::ShapeMismatch {
                expected: (rows, cols),
                got: ov.dim(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_allocator_counts_per_kind() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate(MaskKind::Circle), "circle#0");
        assert_eq!(names.allocate(MaskKind::Circle), "circle#1");
        assert_eq!(names.allocate(MaskKind::Branch), "branch#0");
        assert_eq!(names.allocate(MaskKind::Circle), "circle#2");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(MaskKind::Pixels.label(), "pixels");
        assert_eq!(MaskKind::Segmentation.label(), "segmentation");
    }
}
