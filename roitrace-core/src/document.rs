//! The document model: dataset, morphology, overlay and mask set.
//!
//! All downstream consumers observe this structure through its signals
//! rather than polling: widgets and exporters subscribe to the relevant
//! `*_changed` events and re-query on notification.

use ndarray::{Array1, Array2, Array3, Axis};

use crate::error::{Error, Result};
use crate::maskset::MaskSet;
use crate::signal::Signal;

/// Percentile of the morphology used for the initial overlay threshold.
const DEFAULT_THRESHOLD_PERCENTILE: f64 = 90.0;

type Postprocessor = Box<dyn Fn(Array1<f64>) -> Array1<f64> + Send + Sync>;

/// A loaded dataset with its derived overlay state and the mask set.
pub struct Document {
    data: Array3<f64>,
    morphology: Array2<f64>,
    overlay: Array2<bool>,
    threshold: f64,
    active_frame: usize,
    postprocessor: Postprocessor,
    /// The masks defined over this dataset.
    pub masks: MaskSet,
    /// Fired after the 3-D dataset was replaced.
    pub data_changed: Signal,
    /// Fired after the morphology image was replaced.
    pub morphology_changed: Signal,
    /// Fired after the overlay was recomputed or replaced.
    pub overlay_changed: Signal,
    /// Fired after the threshold value changed.
    pub threshold_changed: Signal,
    /// Fired after the active frame changed.
    pub active_frame_changed: Signal,
    /// Fired after the trace postprocessor was replaced.
    pub postprocessor_changed: Signal,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("data", &self.data.dim())
            .field("morphology", &self.morphology.dim())
            .field("overlay", &self.overlay.dim())
            .field("threshold", &self.threshold)
            .field("active_frame", &self.active_frame)
            .field("postprocessor", &"<fn>")
            .field("masks", &self.masks)
            .finish()
    }
}

impl Document {
    /// Builds a document over `data`, shape `(rows, cols, frames)`. The
    /// morphology defaults to the maximum projection along time; the
    /// threshold starts at the morphology's 90th percentile and the
    /// overlay at `morphology > threshold`. Construction fires no signals.
    ///
    /// # Errors
    /// Returns [`Error::EmptyData`] for a zero-sized dimension and
    /// [`Error::ShapeMismatch`] for a wrongly shaped morphology.
    pub fn new(data: Array3<f64>, morphology: Option<Array2<f64>>) -> Result<Self> {
        let dims = data.dim();
        if dims.0 == 0 || dims.1 == 0 || dims.2 == 0 {
            return Err(Error::EmptyData { dims });
        }

        let morphology = match morphology {
            Some(m) => {
                if m.dim() != (dims.0, dims.1) {
                    return Err(Error::ShapeMismatch {
                        expected: (dims.0, dims.1),
                        got: m.dim(),
                    });
                }
                m
            }
            None => max_projection(&data),
        };

        let threshold = percentile(&morphology, DEFAULT_THRESHOLD_PERCENTILE);
        let overlay = morphology.mapv(|v| v > threshold);

        Ok(Self {
            data,
            morphology,
            overlay,
            threshold,
            active_frame: 0,
            postprocessor: Box::new(|trace| trace),
            masks: MaskSet::new(),
            data_changed: Signal::new(),
            morphology_changed: Signal::new(),
            overlay_changed: Signal::new(),
            threshold_changed: Signal::new(),
            active_frame_changed: Signal::new(),
            postprocessor_changed: Signal::new(),
        })
    }

    /// The 3-D dataset, `(rows, cols, frames)`.
    #[must_use]
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Number of frames in the dataset.
    #[must_use]
    pub fn nframes(&self) -> usize {
        self.data.dim().2
    }

    /// Replaces the dataset. The morphology is re-derived from the new
    /// data; fires `data_changed`, then the morphology/threshold/overlay
    /// cascade.
    ///
    /// # Errors
    /// Returns [`Error::EmptyData`] for a zero-sized dimension.
    pub fn set_data(&mut self, data: Array3<f64>) -> Result<()> {
        let dims = data.dim();
        if dims.0 == 0 || dims.1 == 0 || dims.2 == 0 {
            return Err(Error::EmptyData { dims });
        }
        self.data = data;
        self.active_frame = self.active_frame.min(self.nframes() - 1);
        self.data_changed.emit(&());
        let morphology = max_projection(&self.data);
        self.replace_morphology(morphology);
        Ok(())
    }

    /// The static morphology image.
    #[must_use]
    pub fn morphology(&self) -> &Array2<f64> {
        &self.morphology
    }

    /// Replaces the morphology image; re-derives threshold and overlay.
    /// Fires `morphology_changed`, `threshold_changed`, `overlay_changed`.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] when the shape differs from the
    /// data's spatial extent.
    pub fn set_morphology(&mut self, morphology: Array2<f64>) -> Result<()> {
        let (rows, cols, _) = self.data.dim();
        if morphology.dim() != (rows, cols) {
            return Err(Error::ShapeMismatch {
                expected: (rows, cols),
                got: morphology.dim(),
            });
        }
        self.replace_morphology(morphology);
        Ok(())
    }

    /// The current overlay threshold.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Sets the threshold and recomputes the overlay as
    /// `morphology > threshold`. Fires `threshold_changed`, then
    /// `overlay_changed`.
    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
        self.threshold_changed.emit(&());
        self.overlay = self.morphology.mapv(|v| v > threshold);
        self.overlay_changed.emit(&());
    }

    /// The binary overlay applied multiplicatively during trace extraction.
    #[must_use]
    pub fn overlay(&self) -> &Array2<bool> {
        &self.overlay
    }

    /// Replaces the overlay with a custom binary mask; fires
    /// `overlay_changed`.
    ///
    /// # Errors
    /// Returns [`Error::ShapeMismatch`] when the shape differs from the
    /// data's spatial extent.
    pub fn set_overlay(&mut self, overlay: Array2<bool>) -> Result<()> {
        let (rows, cols, _) = self.data.dim();
        if overlay.dim() != (rows, cols) {
            return Err(Error::ShapeMismatch {
                expected: (rows, cols),
                got: overlay.dim(),
            });
        }
        self.overlay = overlay;
        self.overlay_changed.emit(&());
        Ok(())
    }

    /// The currently displayed frame.
    #[must_use]
    pub fn active_frame(&self) -> usize {
        self.active_frame
    }

    /// Selects the displayed frame; fires `active_frame_changed`.
    ///
    /// # Errors
    /// Returns [`Error::FrameOutOfRange`] outside `[0, nframes)`.
    pub fn set_active_frame(&mut self, frame: usize) -> Result<()> {
        let nframes = self.nframes();
        if frame >= nframes {
            return Err(Error::FrameOutOfRange { frame, nframes });
        }
        self.active_frame = frame;
        self.active_frame_changed.emit(&());
        Ok(())
    }

    /// Replaces the trace postprocessor; fires `postprocessor_changed`.
    pub fn set_postprocessor<F>(&mut self, postprocessor: F)
    where
        F: Fn(Array1<f64>) -> Array1<f64> + Send + Sync + 'static,
    {
        self.postprocessor = Box::new(postprocessor);
        self.postprocessor_changed.emit(&());
    }

    /// Runs the postprocessor over a raw trace.
    #[must_use]
    pub fn postprocess(&self, trace: Array1<f64>) -> Array1<f64> {
        (self.postprocessor)(trace)
    }

    fn replace_morphology(&mut self, morphology: Array2<f64>) {
        self.morphology = morphology;
        self.morphology_changed.emit(&());
        self.set_threshold(percentile(
            &self.morphology,
            DEFAULT_THRESHOLD_PERCENTILE,
        ));
    }
}

/// Per-pixel maximum over the time axis.
fn max_projection(data: &Array3<f64>) -> Array2<f64> {
    data.map_axis(Axis(2), |lane| {
        lane.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

/// Percentile with linear interpolation between order statistics.
fn percentile(values: &Array2<f64>, q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().collect();
    sorted.sort_by(f64::total_cmp);
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ramp_document() -> Document {
        // Pixel (r, c) peaks at r * 4 + c over 2 frames.
        let data = Array3::from_shape_fn((4, 4, 2), |(r, c, t)| {
            (r * 4 + c) as f64 - t as f64
        });
        Document::new(data, None).unwrap()
    }

    #[test]
    fn test_rejects_empty_data() {
        let err = Document::new(Array3::zeros((0, 4, 2)), None).unwrap_err();
        assert!(matches!(err, Error::EmptyData { .. }));
    }

    #[test]
    fn test_default_morphology_is_max_projection() {
        let doc = ramp_document();
        assert_relative_eq!(doc.morphology()[[0, 0]], 0.0);
        assert_relative_eq!(doc.morphology()[[3, 3]], 15.0);
    }

    #[test]
    fn test_initial_threshold_is_90th_percentile() {
        let doc = ramp_document();
        // 16 values 0..=15: rank 0.9 * 15 = 13.5 -> 13.5.
        assert_relative_eq!(doc.threshold(), 13.5);
        // Overlay keeps the two brightest pixels.
        assert_eq!(doc.overlay().iter().filter(|&&v| v).count(), 2);
    }

    #[test]
    fn test_set_threshold_recomputes_overlay() {
        let mut doc = ramp_document();
        let overlays = Arc::new(AtomicUsize::new(0));
        let o = Arc::clone(&overlays);
        doc.overlay_changed.subscribe(move |(): &()| {
            o.fetch_add(1, Ordering::SeqCst);
        });

        doc.set_threshold(7.5);
        assert_eq!(overlays.load(Ordering::SeqCst), 1);
        assert_eq!(doc.overlay().iter().filter(|&&v| v).count(), 8);
    }

    #[test]
    fn test_set_overlay_shape_check() {
        let mut doc = ramp_document();
        let err = doc.set_overlay(Array2::from_elem((3, 3), true)).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_active_frame_range() {
        let mut doc = ramp_document();
        doc.set_active_frame(1).unwrap();
        assert_eq!(doc.active_frame(), 1);
        let err = doc.set_active_frame(2).unwrap_err();
        assert!(matches!(
            err,
            Error::FrameOutOfRange {
                frame: 2,
                nframes: 2
            }
        ));
    }

    #[test]
    fn test_postprocessor_applies() {
        let mut doc = ramp_document();
        doc.set_postprocessor(|trace| trace * 2.0);
        let out = doc.postprocess(Array1::from(vec![1.0, 2.0]));
        assert_relative_eq!(out[0], 2.0);
        assert_relative_eq!(out[1], 4.0);
    }
}
