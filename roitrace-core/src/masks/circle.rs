//! Circular masks delegating to a generated polygon.

use ndarray::{Array2, Array3};

use crate::error::{Error, Result};
use crate::geometry::Point;
use crate::masks::{Observable, PolygonMask, Trace, Traceable};
use crate::signal::Signal;

/// Vertex count of the generated circle outline, endpoint inclusive (the
/// first vertex repeats at the end; the rasterizer skips the resulting
/// zero-length edge).
const CIRCLE_VERTICES: usize = 100;

/// A circular mask: center plus radius, rasterized via an internal polygon.
#[derive(Debug)]
pub struct CircleMask {
    name: String,
    center: Point,
    radius: f64,
    polygon: PolygonMask,
    changed: Signal,
}

fn circle_outline(center: Point, radius: f64) -> Vec<Point> {
    (0..CIRCLE_VERTICES)
        .map(|i| {
            let angle = 2.0 * std::f64::consts::PI * i as f64 / (CIRCLE_VERTICES - 1) as f64;
            Point::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}

impl CircleMask {
    /// Builds a circle mask.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMask`] for a non-positive radius.
    pub fn new(name: impl Into<String>, center: Point, radius: f64) -> Result<Self> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(Error::InvalidMask(format!(
                "circle radius must be positive, got {radius}"
            )));
        }
        let name = name.into();
        let polygon = PolygonMask::new(name.clone(), circle_outline(center, radius))?;
        Ok(Self {
            name,
            center,
            radius,
            polygon,
            changed: Signal::new(),
        })
    }

    /// The circle center.
    #[must_use]
    pub fn center(&self) -> Point {
        self.center
    }

    /// The circle radius.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// The internal rasterized polygon.
    #[must_use]
    pub fn polygon(&self) -> &PolygonMask {
        &self.polygon
    }

    /// Shifts the circle, regenerates its polygon and fires `changed`.
    ///
    /// # Errors
    /// Does not fail for finite offsets; the error type is shared with
    /// polygon construction.
    pub fn translate(&mut self, dx: f64, dy: f64) -> Result<()> {
        self.center = self.center + Point::new(dx, dy);
        self.polygon = PolygonMask::new(
            self.name.clone(),
            circle_outline(self.center, self.radius),
        )?;
        self.changed.emit(&());
        Ok(())
    }
}

impl Traceable for CircleMask {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, data: &Array3<f64>, overlay: Option<&Array2<bool>>) -> Result<Trace> {
        self.polygon.apply(data, overlay)
    }
}

impl Observable for CircleMask {
    fn changed(&self) -> &Signal {
        &self.changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_rejects_non_positive_radius() {
        let err = CircleMask::new("c", Point::new(0.0, 0.0), 0.0).unwrap_err();
        assert!(matches!(err, Error::InvalidMask(_)));
    }

    #[test]
    fn test_circle_weight_approximates_area() {
        let circle = CircleMask::new("c", Point::new(8.0, 8.0), 4.0).unwrap();
        let area = std::f64::consts::PI * 16.0;
        assert_relative_eq!(circle.polygon().weights().sum(), area, max_relative = 0.01);
    }

    #[test]
    fn test_translate_fires_changed_and_moves_bbox() {
        let mut circle = CircleMask::new("c", Point::new(4.0, 4.0), 2.0).unwrap();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        Observable::changed(&circle).subscribe(move |(): &()| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        let before = circle.polygon().lowerleft();
        circle.translate(3.0, 0.0).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_relative_eq!(circle.center().x, 7.0);
        assert_eq!(circle.polygon().lowerleft()[0], before[0] + 3);
    }
}
