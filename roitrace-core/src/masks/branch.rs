//! Branch masks and their segment children.
//!
//! A [`BranchMask`] wraps a [`Branch`] and traces through the polygon
//! rasterization of its outline. Splitting produces [`SegmentMask`]
//! children; every children mutation replaces the affected entries
//! atomically and fires the `changed` signal exactly once.

use ndarray::{Array2, Array3};

use crate::error::{Error, Result};
use crate::geometry::{Branch, SplitSpec};
use crate::masks::{Hierarchical, Observable, PolygonMask, Trace, Traceable};
use crate::signal::Signal;

/// One segment of a split branch: branch geometry plus its polygon cache.
#[derive(Debug)]
pub struct SegmentMask {
    name: String,
    branch: Branch,
    polygon: PolygonMask,
}

impl SegmentMask {
    fn from_branch(name: String, branch: Branch) -> Result<Self> {
        let polygon = PolygonMask::new(name.clone(), branch.outline())?;
        Ok(Self {
            name,
            branch,
            polygon,
        })
    }

    /// The segment's centerline geometry.
    #[must_use]
    pub fn branch(&self) -> &Branch {
        &self.branch
    }

    /// The segment's rasterized polygon.
    #[must_use]
    pub fn polygon(&self) -> &PolygonMask {
        &self.polygon
    }
}

impl Traceable for SegmentMask {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, data: &Array3<f64>, overlay: Option<&Array2<bool>>) -> Result<Trace> {
        self.polygon.apply(data, overlay)
    }
}

/// A dendrite branch mask with zero or more segment children.
#[derive(Debug)]
pub struct BranchMask {
    name: String,
    branch: Branch,
    polygon: PolygonMask,
    segments: Vec<SegmentMask>,
    changed: Signal,
}

impl BranchMask {
    /// Builds a branch mask without children.
    ///
    /// # Errors
    /// Propagates geometry errors from the outline rasterization.
    pub fn new(name: impl Into<String>, branch: Branch) -> Result<Self> {
        let name = name.into();
        let polygon = PolygonMask::new(name.clone(), branch.outline())?;
        Ok(Self {
            name,
            branch,
            polygon,
            segments: Vec::new(),
            changed: Signal::new(),
        })
    }

    /// The branch centerline geometry.
    #[must_use]
    pub fn branch(&self) -> &Branch {
        &self.branch
    }

    /// The rasterized polygon of the whole branch.
    #[must_use]
    pub fn polygon(&self) -> &PolygonMask {
        &self.polygon
    }

    /// The segment children, in centerline order.
    #[must_use]
    pub fn segments(&self) -> &[SegmentMask] {
        &self.segments
    }

    /// Splits the branch, discarding and replacing all prior children,
    /// then fires `changed` once.
    ///
    /// # Errors
    /// Propagates [`Error::InvalidSplit`] and geometry errors; children
    /// are only replaced on success.
    pub fn split(&mut self, spec: SplitSpec) -> Result<()> {
        let parts = self.branch.split(spec)?;
        self.segments = Self::build_segments(parts)?;
        self.changed.emit(&());
        Ok(())
    }

    /// Restores a child list from pre-computed segment geometry (e.g. a
    /// persisted document), replacing any prior children and firing
    /// `changed` once.
    ///
    /// # Errors
    /// Propagates geometry errors from the segment outlines.
    pub fn restore_segments(&mut self, branches: Vec<Branch>) -> Result<()> {
        self.segments = Self::build_segments(branches)?;
        self.changed.emit(&());
        Ok(())
    }

    /// Subdivides the child at `index`, replacing it in place with the
    /// resulting sub-segments, and fires `changed` once.
    ///
    /// # Errors
    /// Returns [`Error::NoSuchSegment`] for an out-of-range index and
    /// propagates split errors; children are only replaced on success.
    pub fn split_segment(&mut self, index: usize, spec: SplitSpec) -> Result<()> {
        let count = self.segments.len();
        let segment = self
            .segments
            .get(index)
            .ok_or(Error::NoSuchSegment { index, count })?;
        let parts = segment.branch.split(spec)?;
        let replacement = Self::build_segments(parts)?;
        self.segments.splice(index..=index, replacement);
        self.renumber_segments()?;
        self.changed.emit(&());
        Ok(())
    }

    /// Joins the child at `index` with its successor (`forward`) or
    /// predecessor, replacing both with the merged segment, and fires
    /// `changed` once. A join with no neighbor in the chosen direction is
    /// a no-op.
    ///
    /// # Errors
    /// Returns [`Error::NoSuchSegment`] for an out-of-range index.
    pub fn join_segments(&mut self, index: usize, forward: bool) -> Result<()> {
        let count = self.segments.len();
        if index >= count {
            return Err(Error::NoSuchSegment { index, count });
        }
        let (a, b) = if forward {
            if index + 1 >= count {
                return Ok(());
            }
            (index, index + 1)
        } else {
            if index == 0 {
                return Ok(());
            }
            (index - 1, index)
        };

        let joined = self.segments[a].branch.append(&self.segments[b].branch, false)?;
        let replacement = SegmentMask::from_branch(format!("segment#{a}"), joined)?;
        self.segments.splice(a..=b, std::iter::once(replacement));
        self.renumber_segments()?;
        self.changed.emit(&());
        Ok(())
    }

    /// Stacks the child traces into a `(nchildren, frames)` array.
    ///
    /// # Errors
    /// Propagates apply errors from any child.
    pub fn linescan(
        &self,
        data: &Array3<f64>,
        overlay: Option<&Array2<bool>>,
    ) -> Result<Array2<f64>> {
        let frames = data.dim().2;
        let mut out = Array2::<f64>::zeros((self.segments.len(), frames));
        for (i, segment) in self.segments.iter().enumerate() {
            let trace = segment.apply(data, overlay)?;
            out.row_mut(i).assign(&trace);
        }
        Ok(out)
    }

    /// Shifts branch, polygon and children rigidly, firing `changed` once.
    ///
    /// # Errors
    /// Propagates polygon reconstruction errors.
    pub fn translate(&mut self, dx: f64, dy: f64) -> Result<()> {
        self.branch.translate(dx, dy);
        self.polygon = PolygonMask::new(self.name.clone(), self.branch.outline())?;
        for segment in &mut self.segments {
            segment.branch.translate(dx, dy);
            segment.polygon = PolygonMask::new(segment.name.clone(), segment.branch.outline())?;
        }
        self.changed.emit(&());
        Ok(())
    }

    fn build_segments(branches: Vec<Branch>) -> Result<Vec<SegmentMask>> {
        branches
            .into_iter()
            .enumerate()
            .map(|(i, b)| SegmentMask::from_branch(format!("segment#{i}"), b))
            .collect()
    }

    fn renumber_segments(&mut self) -> Result<()> {
        for (i, segment) in self.segments.iter_mut().enumerate() {
            let name = format!("segment#{i}");
            if segment.name != name {
                segment.polygon = PolygonMask::new(name.clone(), segment.branch.outline())?;
                segment.name = name;
            }
        }
        Ok(())
    }
}

impl Traceable for BranchMask {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, data: &Array3<f64>, overlay: Option<&Array2<bool>>) -> Result<Trace> {
        self.polygon.apply(data, overlay)
    }
}

impl Hierarchical for BranchMask {
    fn children(&self) -> Vec<&dyn Traceable> {
        self.segments
            .iter()
            .map(|s| s as &dyn Traceable)
            .collect()
    }
}

impl Observable for BranchMask {
    fn changed(&self) -> &Signal {
        &self.changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Sample;
    use approx::assert_relative_eq;
    use ndarray::Array3;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn straight_mask(n: usize) -> BranchMask {
        let samples = (0..n)
            .map(|i| Sample::new(2.0 + i as f64, 4.0, 0.0, 1.0))
            .collect();
        BranchMask::new("branch#0", Branch::new(samples).unwrap()).unwrap()
    }

    fn counter(mask: &BranchMask) -> Arc<AtomicUsize> {
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        Observable::changed(mask).subscribe(move |(): &()| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        fired
    }

    #[test]
    fn test_split_replaces_children_and_fires_once() {
        let mut mask = straight_mask(5);
        let fired = counter(&mask);

        mask.split(SplitSpec::Count(2)).unwrap();
        assert_eq!(mask.segments().len(), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        mask.split(SplitSpec::Count(4)).unwrap();
        assert_eq!(mask.segments().len(), 4);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(mask.segments()[0].name(), "segment#0");
        assert_eq!(mask.segments()[3].name(), "segment#3");
    }

    #[test]
    fn test_split_segment_replaces_in_place() {
        let mut mask = straight_mask(5);
        mask.split(SplitSpec::Count(2)).unwrap();
        let fired = counter(&mask);

        mask.split_segment(1, SplitSpec::Count(2)).unwrap();
        assert_eq!(mask.segments().len(), 3);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_relative_eq!(mask.segments()[0].branch().length(), 2.0);
        assert_relative_eq!(mask.segments()[1].branch().length(), 1.0);
        assert_relative_eq!(mask.segments()[2].branch().length(), 1.0);
        // Names stay consecutive after the splice.
        for (i, s) in mask.segments().iter().enumerate() {
            assert_eq!(s.name(), format!("segment#{i}"));
        }
    }

    #[test]
    fn test_split_segment_out_of_range() {
        let mut mask = straight_mask(5);
        mask.split(SplitSpec::Count(2)).unwrap();
        let err = mask.split_segment(5, SplitSpec::Count(2)).unwrap_err();
        assert!(matches!(err, Error::NoSuchSegment { index: 5, count: 2 }));
    }

    #[test]
    fn test_join_segments() {
        let mut mask = straight_mask(5);
        mask.split(SplitSpec::Count(4)).unwrap();
        let fired = counter(&mask);

        mask.join_segments(0, true).unwrap();
        assert_eq!(mask.segments().len(), 3);
        assert_relative_eq!(mask.segments()[0].branch().length(), 2.0);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        mask.join_segments(2, false).unwrap();
        assert_eq!(mask.segments().len(), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_join_without_neighbor_is_noop() {
        let mut mask = straight_mask(5);
        mask.split(SplitSpec::Count(2)).unwrap();
        let fired = counter(&mask);

        mask.join_segments(1, true).unwrap();
        mask.join_segments(0, false).unwrap();
        assert_eq!(mask.segments().len(), 2);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_linescan_shape() {
        let data = Array3::from_elem((9, 9, 6), 2.5);
        let mut mask = straight_mask(5);
        mask.split(SplitSpec::Count(3)).unwrap();

        let linescan = mask.linescan(&data, None).unwrap();
        assert_eq!(linescan.dim(), (3, 6));
        for &v in &linescan {
            assert_relative_eq!(v, 2.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_children_follow_segments() {
        let mut mask = straight_mask(5);
        assert!(mask.children().is_empty());
        mask.split(SplitSpec::Count(2)).unwrap();
        let names: Vec<&str> = mask.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["segment#0", "segment#1"]);
    }

    #[test]
    fn test_translate_moves_children_once() {
        let mut mask = straight_mask(5);
        mask.split(SplitSpec::Count(2)).unwrap();
        let fired = counter(&mask);

        let before = mask.segments()[1].polygon().lowerleft();
        mask.translate(2.0, 1.0).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        let after = mask.segments()[1].polygon().lowerleft();
        assert_eq!(after, [before[0] + 2, before[1] + 1]);
    }
}
