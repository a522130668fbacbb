//! Area-weighted polygon rasterization.
//!
//! A polygon outline is scan-filled on a grid [`SUPERSAMPLE`] times finer
//! per axis (even-odd rule, sampled at cell centers) and block-averaged
//! back to one coverage fraction per pixel. This reproduces the classic
//! supersampled antialiasing approximation: weights sum to the polygon
//! area to within roughly 1%.

use ndarray::Array2;

use crate::geometry::Point;

/// Linear supersampling factor of the coverage rasterizer.
///
/// Kept as a tunable constant: downstream numeric expectations are tied to
/// the supersample approximation, not to exact polygon-pixel clipping.
pub const SUPERSAMPLE: usize = 10;

/// Integer pixel bounding box `[lower, upper)` of a polygon, per axis
/// `floor(min)` and `floor(max) + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// Inclusive lower corner, `[x, y]`.
    pub lower: [i64; 2],
    /// Exclusive upper corner, `[x, y]`.
    pub upper: [i64; 2],
}

impl BoundingBox {
    /// Computes the bounding box of an outline.
    #[must_use]
    pub fn of(outline: &[Point]) -> Self {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for p in outline {
            min[0] = min[0].min(p.x);
            min[1] = min[1].min(p.y);
            max[0] = max[0].max(p.x);
            max[1] = max[1].max(p.y);
        }
        Self {
            lower: [min[0].floor() as i64, min[1].floor() as i64],
            upper: [max[0].floor() as i64 + 1, max[1].floor() as i64 + 1],
        }
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> usize {
        (self.upper[0] - self.lower[0]).max(0) as usize
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> usize {
        (self.upper[1] - self.lower[1]).max(0) as usize
    }
}

/// Rasterizes an outline into per-pixel coverage fractions over `bbox`.
///
/// Returned array has shape `(height, width)`; entry `(r, c)` is the
/// fraction of pixel `(bbox.lower[1] + r, bbox.lower[0] + c)` covered by
/// the polygon, in `[0, 1]`.
#[must_use]
pub fn coverage_weights(outline: &[Point], bbox: &BoundingBox) -> Array2<f64> {
    let (h, w) = (bbox.height(), bbox.width());
    let mut weights = Array2::<f64>::zeros((h, w));
    if outline.len() < 3 || h == 0 || w == 0 {
        return weights;
    }

    let sf = SUPERSAMPLE as f64;
    let llx = bbox.lower[0] as f64;
    let lly = bbox.lower[1] as f64;
    let max_col = w * SUPERSAMPLE;

    let mut crossings: Vec<f64> = Vec::new();
    for iy in 0..h * SUPERSAMPLE {
        let y = lly + (iy as f64 + 0.5) / sf;

        crossings.clear();
        for i in 0..outline.len() {
            let p = outline[i];
            let q = outline[(i + 1) % outline.len()];
            // Half-open crossing rule; horizontal and zero-length edges
            // contribute nothing.
            if (p.y <= y) != (q.y <= y) {
                let t = (y - p.y) / (q.y - p.y);
                crossings.push(p.x + t * (q.x - p.x));
            }
        }
        crossings.sort_by(f64::total_cmp);

        let row = iy / SUPERSAMPLE;
        for pair in crossings.chunks_exact(2) {
            // Supersample centers in [x0, x1).
            let j0 = ((pair[0] - llx) * sf - 0.5).ceil().max(0.0) as usize;
            let j1 = ((pair[1] - llx) * sf - 0.5).ceil().max(0.0).min(max_col as f64) as usize;
            for j in j0..j1 {
                weights[[row, j / SUPERSAMPLE]] += 1.0;
            }
        }
    }

    weights.mapv_inplace(|v| v / (sf * sf));
    weights
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ]
    }

    #[test]
    fn test_bounding_box() {
        let bbox = BoundingBox::of(&rect(0.5, 1.5, 3.5, 4.5));
        assert_eq!(bbox.lower, [0, 1]);
        assert_eq!(bbox.upper, [4, 5]);
        assert_eq!(bbox.width(), 4);
        assert_eq!(bbox.height(), 4);
    }

    #[test]
    fn test_negative_coordinates() {
        let bbox = BoundingBox::of(&rect(-2.5, -1.5, 0.5, 0.5));
        assert_eq!(bbox.lower, [-3, -2]);
        assert_eq!(bbox.upper, [1, 1]);
        let weights = coverage_weights(&rect(-2.5, -1.5, 0.5, 0.5), &bbox);
        assert_relative_eq!(weights.sum(), 6.0, max_relative = 0.01);
    }

    #[test]
    fn test_rectangle_weight_conservation() {
        // Edges on half-pixel boundaries align with supersample cell
        // borders, so coverage is exact.
        let outline = rect(0.5, 1.5, 3.5, 4.5);
        let weights = coverage_weights(&outline, &BoundingBox::of(&outline));
        assert_relative_eq!(weights.sum(), 9.0, epsilon = 1e-9);
        // Interior pixel fully covered, corner pixel a quarter.
        assert_relative_eq!(weights[[1, 1]], 1.0, epsilon = 1e-9);
        assert_relative_eq!(weights[[0, 0]], 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_triangle_weight_conservation() {
        let outline = vec![
            Point::new(0.0, 0.0),
            Point::new(8.0, 0.0),
            Point::new(0.0, 6.0),
        ];
        let weights = coverage_weights(&outline, &BoundingBox::of(&outline));
        assert_relative_eq!(weights.sum(), 24.0, max_relative = 0.01);
    }

    #[test]
    fn test_weights_bounded() {
        let outline = vec![
            Point::new(0.2, 0.1),
            Point::new(5.3, 0.8),
            Point::new(4.1, 4.9),
            Point::new(0.7, 3.6),
        ];
        let weights = coverage_weights(&outline, &BoundingBox::of(&outline));
        for &v in &weights {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_duplicate_closing_vertex_harmless() {
        let mut outline = rect(0.5, 0.5, 2.5, 2.5);
        let first = outline[0];
        outline.push(first);
        let weights = coverage_weights(&outline, &BoundingBox::of(&outline));
        assert_relative_eq!(weights.sum(), 4.0, epsilon = 1e-9);
    }
}
