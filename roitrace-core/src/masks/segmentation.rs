//! Masks wrapping an externally supplied label image.

use std::collections::BTreeSet;

use ndarray::{Array1, Array2, Array3};

use crate::error::Result;
use crate::masks::{pixel_weighted_mean, Hierarchical, Trace, Traceable};

/// One label of a segmentation, exposed as a pixel-membership mask.
#[derive(Debug, Clone)]
pub struct SegmentationChild {
    name: String,
    label: i64,
    x: Vec<usize>,
    y: Vec<usize>,
}

impl SegmentationChild {
    /// The label value this child represents.
    #[must_use]
    pub fn label(&self) -> i64 {
        self.label
    }

    /// Column indices of the label's pixels.
    #[must_use]
    pub fn x(&self) -> &[usize] {
        &self.x
    }

    /// Row indices of the label's pixels.
    #[must_use]
    pub fn y(&self) -> &[usize] {
        &self.y
    }
}

impl Traceable for SegmentationChild {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, data: &Array3<f64>, overlay: Option<&Array2<bool>>) -> Result<Trace> {
        pixel_weighted_mean(&self.name, &self.x, &self.y, data, overlay)
    }
}

/// A full segmentation of the image plane: an integer label image with one
/// child mask per distinct non-zero label. The segmentation itself is
/// immutable; its own trace is all-zeros, the children carry the signal.
#[derive(Debug, Clone)]
pub struct Segmentation {
    name: String,
    labels: Array2<i64>,
    children: Vec<SegmentationChild>,
}

impl Segmentation {
    /// Builds a segmentation from a label image. Children are created for
    /// every distinct non-zero label, in ascending label order.
    #[must_use]
    pub fn new(name: impl Into<String>, labels: Array2<i64>) -> Self {
        let name = name.into();
        let distinct: BTreeSet<i64> = labels.iter().copied().filter(|&l| l != 0).collect();

        let children = distinct
            .into_iter()
            .map(|label| {
                let mut x = Vec::new();
                let mut y = Vec::new();
                for ((row, col), &value) in labels.indexed_iter() {
                    if value == label {
                        x.push(col);
                        y.push(row);
                    }
                }
                SegmentationChild {
                    name: format!("{name}#{label}"),
                    label,
                    x,
                    y,
                }
            })
            .collect();

        Self {
            name,
            labels,
            children,
        }
    }

    /// The label image.
    #[must_use]
    pub fn labels(&self) -> &Array2<i64> {
        &self.labels
    }

    /// The per-label children, ascending by label.
    #[must_use]
    pub fn label_children(&self) -> &[SegmentationChild] {
        &self.children
    }
}

impl Traceable for Segmentation {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, data: &Array3<f64>, _overlay: Option<&Array2<bool>>) -> Result<Trace> {
        Ok(Array1::zeros(data.dim().2))
    }
}

impl Hierarchical for Segmentation {
    fn children(&self) -> Vec<&dyn Traceable> {
        self.children
            .iter()
            .map(|c| c as &dyn Traceable)
            .collect()
    }
}
