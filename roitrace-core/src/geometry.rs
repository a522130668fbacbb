//! Branch geometry: polylines with per-sample radius.
//!
//! A [`Branch`] models a dendrite section as an ordered run of centerline
//! samples, each carrying a radius. Corner offsets perpendicular to the
//! centerline are derived once at construction; the closed [`Branch::outline`]
//! polygon they form is what the rasterizer consumes.

use crate::error::{Error, Result};

/// Residual below which no trailing segment is produced by [`Branch::split`].
const RESIDUAL_EPS: f64 = 0.01;

/// Tolerance for treating a cut parameter as coincident with a sample.
const PARAM_EPS: f64 = 1e-9;

/// A 2-D point in image coordinates (x = column, y = row).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// X coordinate (column).
    pub x: f64,
    /// Y coordinate (row).
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean norm.
    #[inline]
    #[must_use]
    pub fn norm(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Euclidean distance to another point.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).norm()
    }
}

impl std::ops::Add for Point {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Normalizes a vector, rejecting vanishing input.
fn normalize(v: Point) -> Result<Point> {
    let n = v.norm();
    if n <= f64::EPSILON {
        return Err(Error::DegenerateGeometry(
            "cannot normalize a zero-length vector".to_string(),
        ));
    }
    Ok(v * (1.0 / n))
}

/// The perpendicular unit vector, `perp((a, b)) = normalize((-b, a))`.
fn perpendicular(v: Point) -> Result<Point> {
    normalize(Point::new(-v.y, v.x))
}

/// One centerline sample: position plus local radius.
///
/// The z coordinate is carried through interpolation but plays no role in
/// the planar corner geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// X coordinate (column).
    pub x: f64,
    /// Y coordinate (row).
    pub y: f64,
    /// Z coordinate (carried, geometrically unused).
    pub z: f64,
    /// Local radius of the branch.
    pub radius: f64,
}

impl Sample {
    /// Creates a new sample.
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64, radius: f64) -> Self {
        Self { x, y, z, radius }
    }

    /// The planar position of the sample.
    #[inline]
    #[must_use]
    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Target of a [`Branch::split`]: either a fixed number of segments or a
/// fixed segment length. The tagged union makes "exactly one of nsegments
/// or length" unrepresentable to violate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitSpec {
    /// Split into this many segments of equal arc length.
    Count(usize),
    /// Split into segments of this arc length; a remainder longer than
    /// 0.01 length units becomes a shorter trailing segment.
    Length(f64),
}

/// A dendrite branch, or part of one: at least two samples, with corner
/// offsets memoized at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    samples: Vec<Sample>,
    corners: Vec<[Point; 2]>,
}

impl Branch {
    /// Builds a branch from its centerline samples.
    ///
    /// # Errors
    /// Returns [`Error::TooFewSamples`] for fewer than two samples and
    /// [`Error::DegenerateGeometry`] when adjacent samples coincide or the
    /// centerline folds back onto itself.
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        if samples.len() < 2 {
            return Err(Error::TooFewSamples { got: samples.len() });
        }
        let corners = compute_corners(&samples)?;
        Ok(Self { samples, corners })
    }

    /// The centerline samples.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples (N >= 2).
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; kept for iterator-adapter symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Left/right corner per sample, N x 2.
    #[must_use]
    pub fn corners(&self) -> &[[Point; 2]] {
        &self.corners
    }

    /// The closed outline polygon: left corners forward, then right corners
    /// reversed, 2N vertices. The last edge implicitly returns to the first
    /// corner.
    ///
    /// The outline is simple as long as the centerline does not curve
    /// tighter than the local radius; pathological input may self-intersect
    /// and is not corrected here.
    #[must_use]
    pub fn outline(&self) -> Vec<Point> {
        let mut out = Vec::with_capacity(2 * self.corners.len());
        out.extend(self.corners.iter().map(|c| c[0]));
        out.extend(self.corners.iter().rev().map(|c| c[1]));
        out
    }

    /// Total arc length: sum of consecutive planar distances.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.samples
            .windows(2)
            .map(|w| w[0].xy().distance(w[1].xy()))
            .sum()
    }

    /// Re-segments the branch at multiples of the target arc length.
    ///
    /// Cut samples are obtained by linear interpolation of
    /// `(x, y, z, radius)` in the chord-length parameter; a cut that lands
    /// on an existing sample reuses it. Consecutive output branches share
    /// exactly one boundary sample. If the branch end lies more than 0.01
    /// length units past the last cut, a shorter trailing segment is
    /// appended.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSplit`] for a zero segment count or a
    /// non-positive segment length.
    pub fn split(&self, spec: SplitSpec) -> Result<Vec<Branch>> {
        let total = self.length();
        let sublength = match spec {
            SplitSpec::Count(n) => {
                if n == 0 {
                    return Err(Error::InvalidSplit(
                        "segment count must be positive".to_string(),
                    ));
                }
                total / n as f64
            }
            SplitSpec::Length(l) => {
                if l <= 0.0 {
                    return Err(Error::InvalidSplit(format!(
                        "segment length must be positive, got {l}"
                    )));
                }
                l
            }
        };

        // Chord-length parameter of every sample.
        let mut params = Vec::with_capacity(self.samples.len());
        let mut acc = 0.0;
        params.push(0.0);
        for w in self.samples.windows(2) {
            acc += w[0].xy().distance(w[1].xy());
            params.push(acc);
        }

        let mut points = self.samples.clone();
        let mut boundaries = vec![0_usize];
        let ncuts = (total / sublength).floor() as usize;
        let mut last_cut = 0.0;

        for k in 1..=ncuts {
            let cut = k as f64 * sublength;
            last_cut = cut;
            if cut >= total - PARAM_EPS {
                boundaries.push(params.len() - 1);
                continue;
            }
            let idx = params.partition_point(|&p| p < cut);
            if (params[idx] - cut).abs() <= PARAM_EPS {
                boundaries.push(idx);
            } else {
                points.insert(idx, lerp_sample(&params, &points, idx, cut));
                params.insert(idx, cut);
                boundaries.push(idx);
            }
        }

        if total - last_cut > RESIDUAL_EPS || boundaries.len() < 2 {
            boundaries.push(params.len() - 1);
        }

        boundaries
            .windows(2)
            .map(|w| Branch::new(points[w[0]..=w[1]].to_vec()))
            .collect()
    }

    /// Concatenates `other` onto this branch. With `gap = false` the first
    /// sample of `other` is dropped, assuming it coincides with this
    /// branch's last sample.
    ///
    /// # Errors
    /// Returns [`Error::DegenerateGeometry`] if the junction produces
    /// coincident adjacent samples (e.g. `gap = true` across touching
    /// branches).
    pub fn append(&self, other: &Branch, gap: bool) -> Result<Branch> {
        let skip = usize::from(!gap);
        let mut samples = self.samples.clone();
        samples.extend_from_slice(&other.samples[skip..]);
        Branch::new(samples)
    }

    /// Rigidly shifts the branch; corners move with it, no recomputation.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        let offset = Point::new(dx, dy);
        for s in &mut self.samples {
            s.x += dx;
            s.y += dy;
        }
        for c in &mut self.corners {
            c[0] = c[0] + offset;
            c[1] = c[1] + offset;
        }
    }
}

/// Linear interpolation of a sample at parameter `cut`, bracketed by the
/// samples at `idx - 1` and `idx`.
fn lerp_sample(params: &[f64], points: &[Sample], idx: usize, cut: f64) -> Sample {
    let (p0, p1) = (params[idx - 1], params[idx]);
    let (s0, s1) = (points[idx - 1], points[idx]);
    let t = (cut - p0) / (p1 - p0);
    Sample::new(
        s0.x + t * (s1.x - s0.x),
        s0.y + t * (s1.y - s0.y),
        s0.z + t * (s1.z - s0.z),
        s0.radius + t * (s1.radius - s0.radius),
    )
}

/// Left/right corner offsets per sample. Endpoints use the single adjacent
/// perpendicular; interior samples the normalized average of both.
fn compute_corners(samples: &[Sample]) -> Result<Vec<[Point; 2]>> {
    let n = samples.len();
    let mut corners = vec![[Point::default(); 2]; n];

    let first = perpendicular(samples[1].xy() - samples[0].xy())?;
    corners[0] = [
        samples[0].xy() + first * samples[0].radius,
        samples[0].xy() + first * -samples[0].radius,
    ];

    let last = perpendicular(samples[n - 1].xy() - samples[n - 2].xy())?;
    corners[n - 1] = [
        samples[n - 1].xy() + last * samples[n - 1].radius,
        samples[n - 1].xy() + last * -samples[n - 1].radius,
    ];

    for i in 1..n - 1 {
        let pv01 = perpendicular(samples[i].xy() - samples[i - 1].xy())?;
        let pv12 = perpendicular(samples[i + 1].xy() - samples[i].xy())?;
        let avg = normalize((pv01 + pv12) * 0.5).map_err(|_| {
            Error::DegenerateGeometry(format!("centerline folds back at sample {i}"))
        })?;
        corners[i] = [
            samples[i].xy() + avg * samples[i].radius,
            samples[i].xy() + avg * -samples[i].radius,
        ];
    }

    Ok(corners)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight(n: usize, spacing: f64, radius: f64) -> Branch {
        let samples = (0..n)
            .map(|i| Sample::new(i as f64 * spacing, 0.0, 0.0, radius))
            .collect();
        Branch::new(samples).unwrap()
    }

    #[test]
    fn test_too_few_samples() {
        let err = Branch::new(vec![Sample::new(0.0, 0.0, 0.0, 1.0)]).unwrap_err();
        assert!(matches!(err, Error::TooFewSamples { got: 1 }));
    }

    #[test]
    fn test_coincident_samples_rejected() {
        let err = Branch::new(vec![
            Sample::new(1.0, 1.0, 0.0, 1.0),
            Sample::new(1.0, 1.0, 0.0, 1.0),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::DegenerateGeometry(_)));
    }

    #[test]
    fn test_straight_branch_corners() {
        let branch = straight(3, 1.0, 0.5);
        // For a branch running along +x the perpendicular is +y.
        for (i, c) in branch.corners().iter().enumerate() {
            assert_relative_eq!(c[0].x, i as f64);
            assert_relative_eq!(c[0].y, 0.5);
            assert_relative_eq!(c[1].x, i as f64);
            assert_relative_eq!(c[1].y, -0.5);
        }
    }

    #[test]
    fn test_outline_closure() {
        let branch = straight(5, 1.0, 1.0);
        let outline = branch.outline();
        assert_eq!(outline.len(), 2 * branch.len());
        // Left corners forward, right corners reversed: the last outline
        // vertex is the right corner of the first sample.
        assert_relative_eq!(outline[0].y, 1.0);
        assert_relative_eq!(outline[9].x, 0.0);
        assert_relative_eq!(outline[9].y, -1.0);
    }

    #[test]
    fn test_length() {
        let branch = straight(5, 1.0, 1.0);
        assert_relative_eq!(branch.length(), 4.0);
    }

    #[test]
    fn test_split_by_count() {
        let branch = straight(5, 1.0, 1.0);
        let parts = branch.split(SplitSpec::Count(2)).unwrap();
        assert_eq!(parts.len(), 2);
        assert_relative_eq!(parts[0].length(), 2.0);
        assert_relative_eq!(parts[1].length(), 2.0);
        // Boundary sample shared between consecutive parts.
        assert_eq!(
            parts[0].samples().last().unwrap(),
            &parts[1].samples()[0]
        );
    }

    #[test]
    fn test_split_residual_rule() {
        // Total length 4, target 2: both cuts land on samples, the second
        // on the branch end. Remainder 0 < 0.01, so exactly 2 segments.
        let branch = straight(5, 1.0, 1.0);
        let parts = branch.split(SplitSpec::Length(2.0)).unwrap();
        assert_eq!(parts.len(), 2);
    }

    #[test]
    fn test_split_trailing_segment() {
        // Total length 4, target 1.7: cuts at 1.7 and 3.4 leave a 0.6
        // remainder, which becomes a shorter trailing segment.
        let branch = straight(5, 1.0, 1.0);
        let parts = branch.split(SplitSpec::Length(1.7)).unwrap();
        assert_eq!(parts.len(), 3);
        assert_relative_eq!(parts[0].length(), 1.7);
        assert_relative_eq!(parts[1].length(), 1.7);
        assert_relative_eq!(parts[2].length(), 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_split_interpolates_radius() {
        let samples = vec![
            Sample::new(0.0, 0.0, 0.0, 1.0),
            Sample::new(4.0, 0.0, 0.0, 3.0),
        ];
        let branch = Branch::new(samples).unwrap();
        let parts = branch.split(SplitSpec::Count(2)).unwrap();
        assert_eq!(parts.len(), 2);
        let boundary = parts[0].samples().last().unwrap();
        assert_relative_eq!(boundary.x, 2.0);
        assert_relative_eq!(boundary.radius, 2.0);
    }

    #[test]
    fn test_split_length_longer_than_branch() {
        let branch = straight(3, 1.0, 1.0);
        let parts = branch.split(SplitSpec::Length(10.0)).unwrap();
        assert_eq!(parts.len(), 1);
        assert_relative_eq!(parts[0].length(), branch.length());
    }

    #[test]
    fn test_split_invalid_targets() {
        let branch = straight(3, 1.0, 1.0);
        assert!(matches!(
            branch.split(SplitSpec::Count(0)),
            Err(Error::InvalidSplit(_))
        ));
        assert!(matches!(
            branch.split(SplitSpec::Length(0.0)),
            Err(Error::InvalidSplit(_))
        ));
    }

    #[test]
    fn test_split_append_round_trip() {
        let samples = vec![
            Sample::new(0.0, 0.0, 0.0, 1.0),
            Sample::new(1.5, 0.5, 0.0, 1.2),
            Sample::new(3.0, 0.2, 0.0, 0.8),
            Sample::new(4.0, 1.0, 0.0, 1.0),
        ];
        let branch = Branch::new(samples).unwrap();
        let parts = branch.split(SplitSpec::Count(3)).unwrap();
        assert_eq!(parts.len(), 3);

        let mut joined = parts[0].clone();
        for part in &parts[1..] {
            joined = joined.append(part, false).unwrap();
        }
        assert_relative_eq!(joined.length(), branch.length(), epsilon = 1e-9);
        let first = joined.samples()[0];
        let last = *joined.samples().last().unwrap();
        assert_relative_eq!(first.x, branch.samples()[0].x);
        assert_relative_eq!(first.y, branch.samples()[0].y);
        assert_relative_eq!(last.x, branch.samples().last().unwrap().x);
        assert_relative_eq!(last.y, branch.samples().last().unwrap().y);
    }

    #[test]
    fn test_append_with_gap_keeps_all_samples() {
        let a = straight(3, 1.0, 1.0);
        let mut b = straight(3, 1.0, 1.0);
        b.translate(5.0, 0.0);
        let joined = a.append(&b, true).unwrap();
        assert_eq!(joined.len(), 6);
    }

    #[test]
    fn test_translate_moves_corners() {
        let mut branch = straight(3, 1.0, 0.5);
        let before = branch.corners()[1][0];
        branch.translate(2.0, -1.0);
        let after = branch.corners()[1][0];
        assert_relative_eq!(after.x, before.x + 2.0);
        assert_relative_eq!(after.y, before.y - 1.0);
    }
}
