//! Masks defined by an explicit pixel index set.

use ndarray::{Array2, Array3};

use crate::error::{Error, Result};
use crate::masks::{pixel_weighted_mean, Trace, Traceable};

/// A mask enumerating its member pixels directly.
#[derive(Debug, Clone)]
pub struct PixelMask {
    name: String,
    x: Vec<usize>,
    y: Vec<usize>,
}

impl PixelMask {
    /// Builds a pixel mask from parallel x/y index lists.
    ///
    /// # Errors
    /// Returns [`Error::InvalidMask`] for empty or unequal-length lists.
    pub fn new(name: impl Into<String>, x: Vec<usize>, y: Vec<usize>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(Error::InvalidMask(format!(
                "pixel coordinate lists differ in length: {} vs {}",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(Error::InvalidMask("pixel mask has no members".to_string()));
        }
        Ok(Self {
            name: name.into(),
            x,
            y,
        })
    }

    /// Column indices of the member pixels.
    #[must_use]
    pub fn x(&self) -> &[usize] {
        &self.x
    }

    /// Row indices of the member pixels.
    #[must_use]
    pub fn y(&self) -> &[usize] {
        &self.y
    }

    /// Number of member pixels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Always false; membership lists are validated non-empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

impl Traceable for PixelMask {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, data: &Array3<f64>, overlay: Option<&Array2<bool>>) -> Result<Trace> {
        pixel_weighted_mean(&self.name, &self.x, &self.y, data, overlay)
    }
}
