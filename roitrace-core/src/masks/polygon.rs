//! Arbitrary polygon masks backed by the coverage rasterizer.

use ndarray::{Array1, Array2, Array3};

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::masks::{check_overlay_shape, Trace, Traceable};
use crate::raster::{coverage_weights, BoundingBox};

/// A mask defined by the vertices of a closed polygon.
///
/// The bounding box and the per-pixel coverage weights are computed once at
/// construction; the geometric definition is immutable afterwards.
#[derive(Debug, Clone)]
pub struct PolygonMask {
    name: String,
    outline: Vec<Point>,
    bbox: BoundingBox,
    weights: Array2<f64>,
}

impl PolygonMask {
    /// Builds a polygon mask and rasterizes its coverage weights.
    ///
    /// # Errors
    /// Returns [`Error::DegenerateOutline`] for fewer than three vertices.
    pub fn new(name: impl Into<String>, outline: Vec<Point>) -> Result<Self> {
        if outline.len() < 3 {
            return Err(Error::DegenerateOutline { got: outline.len() });
        }
        let bbox = BoundingBox::of(&outline);
        let weights = coverage_weights(&outline, &bbox);
        Ok(Self {
            name: name.into(),
            outline,
            bbox,
            weights,
        })
    }

    /// The polygon vertices.
    #[must_use]
    pub fn outline(&self) -> &[Point] {
        &self.outline
    }

    /// Inclusive lower corner of the integer bounding box, `[x, y]`.
    #[must_use]
    pub fn lowerleft(&self) -> [i64; 2] {
        self.bbox.lower
    }

    /// Exclusive upper corner of the integer bounding box, `[x, y]`.
    #[must_use]
    pub fn upperright(&self) -> [i64; 2] {
        self.bbox.upper
    }

    /// Coverage fractions over the bounding box, shape `(height, width)`.
    #[must_use]
    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }
}

impl Traceable for PolygonMask {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, data: &Array3<f64>, overlay: Option<&Array2<bool>>) -> Result<Trace> {
        let (rows, cols, frames) = data.dim();
        check_overlay_shape(data, overlay)?;

        let [llx, lly] = self.bbox.lower;
        let row0 = lly.max(0);
        let row1 = self.bbox.upper[1].min(rows as i64);
        let col0 = llx.max(0);
        let col1 = self.bbox.upper[0].min(cols as i64);
        if row0 >= row1 || col0 >= col1 {
            return Err(Error::EmptyMaskWeight);
        }

        let mut trace = Array1::<f64>::zeros(frames);
        let mut weight = 0.0;
        for r in row0..row1 {
            for c in col0..col1 {
                let w = self.weights[[(r - lly) as usize, (c - llx) as usize]];
                if w <= 0.0 {
                    continue;
                }
                let (ru, cu) = (r as usize, c as usize);
                if let Some(ov) = overlay {
                    if !ov[[ru, cu]] {
                        continue;
                    }
                }
                weight += w;
                for t in 0..frames {
                    trace[t] += w * data[[ru, cu, t]];
                }
            }
        }

        if weight <= 0.0 {
            return Err(Error::EmptyMaskWeight);
        }
        Ok(trace / weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array3;

    fn rect_mask(x0: f64, y0: f64, x1: f64, y1: f64) -> PolygonMask {
        PolygonMask::new(
            "poly#0",
            vec![
                Point::new(x0, y0),
                Point::new(x1, y0),
                Point::new(x1, y1),
                Point::new(x0, y1),
            ],
        )
        .unwrap()
    }

    /// 8x8x3 dataset where frame t is constant t + 1.
    fn ramp_data() -> Array3<f64> {
        Array3::from_shape_fn((8, 8, 3), |(_, _, t)| (t + 1) as f64)
    }

    #[test]
    fn test_degenerate_outline() {
        let err = PolygonMask::new("p", vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)])
            .unwrap_err();
        assert!(matches!(err, Error::DegenerateOutline { got: 2 }));
    }

    #[test]
    fn test_apply_constant_frames() {
        let mask = rect_mask(1.0, 1.0, 4.0, 4.0);
        let trace = mask.apply(&ramp_data(), None).unwrap();
        assert_eq!(trace.len(), 3);
        for (t, &v) in trace.iter().enumerate() {
            assert_relative_eq!(v, (t + 1) as f64, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mask = rect_mask(0.5, 0.5, 5.5, 3.5);
        let data = ramp_data();
        let first = mask.apply(&data, None).unwrap();
        let second = mask.apply(&data, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_overlay_restricts_weights() {
        // Data with one bright column; overlay keeps only that column.
        let mut data = Array3::<f64>::zeros((6, 6, 2));
        for r in 0..6 {
            for t in 0..2 {
                data[[r, 2, t]] = 5.0;
            }
        }
        let mask = rect_mask(0.5, 0.5, 4.5, 4.5);
        let mut overlay = Array2::from_elem((6, 6), false);
        for r in 0..6 {
            overlay[[r, 2]] = true;
        }
        let trace = mask.apply(&data, Some(&overlay)).unwrap();
        assert_relative_eq!(trace[0], 5.0, epsilon = 1e-9);
        assert_relative_eq!(trace[1], 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_overlay_shape_mismatch() {
        let mask = rect_mask(0.5, 0.5, 3.5, 3.5);
        let overlay = Array2::from_elem((4, 4), true);
        let err = mask.apply(&ramp_data(), Some(&overlay)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_mask_outside_data_is_empty() {
        let mask = rect_mask(20.0, 20.0, 24.0, 24.0);
        let err = mask.apply(&ramp_data(), None).unwrap_err();
        assert!(matches!(err, Error::EmptyMaskWeight));
    }

    #[test]
    fn test_all_false_overlay_is_empty() {
        let mask = rect_mask(1.0, 1.0, 4.0, 4.0);
        let overlay = Array2::from_elem((8, 8), false);
        let err = mask.apply(&ramp_data(), Some(&overlay)).unwrap_err();
        assert!(matches!(err, Error::EmptyMaskWeight));
    }

    #[test]
    fn test_partially_clipped_mask() {
        // Bounding box extends past the data on two sides; the clipped
        // remainder still produces the constant-frame means.
        let mask = rect_mask(-2.5, -2.5, 3.5, 3.5);
        let trace = mask.apply(&ramp_data(), None).unwrap();
        for (t, &v) in trace.iter().enumerate() {
            assert_relative_eq!(v, (t + 1) as f64, epsilon = 1e-9);
        }
    }
}
