//! Biexponential template kernels.

use ndarray::Array1;
use roitrace_core::Trace;

use crate::error::{Error, Result};

/// Initial support length for the automatic tail search.
const INITIAL_SUPPORT: usize = 10;

/// Hard cap on the automatically chosen support.
const MAX_SUPPORT: usize = 1 << 22;

/// Tail fraction below which the support is considered long enough.
const TAIL_FRACTION: f64 = 0.01;

/// A peak-normalized biexponential pulse shape,
/// `exp(-t / tau1) - exp(-t / tau2)` with `tau1 > tau2 > 0`.
///
/// `tau1` is the slow decay constant, `tau2` the fast rise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiExponential {
    tau1: f64,
    tau2: f64,
}

impl BiExponential {
    /// Creates the pulse shape.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTau`] unless `tau1 > tau2 > 0`.
    pub fn new(tau1: f64, tau2: f64) -> Result<Self> {
        if !tau1.is_finite() || !tau2.is_finite() || tau2 <= 0.0 {
            return Err(Error::InvalidTau(format!(
                "time constants must be positive and finite, got ({tau1}, {tau2})"
            )));
        }
        if tau1 <= tau2 {
            return Err(Error::InvalidTau(format!(
                "decay constant must exceed rise constant, got ({tau1}, {tau2})"
            )));
        }
        Ok(Self { tau1, tau2 })
    }

    /// The slow decay constant.
    #[must_use]
    pub fn tau1(&self) -> f64 {
        self.tau1
    }

    /// The fast rise constant.
    #[must_use]
    pub fn tau2(&self) -> f64 {
        self.tau2
    }

    /// Samples the normalized pulse on `0..len`.
    #[must_use]
    pub fn sampled(&self, len: usize) -> Trace {
        let mut p: Vec<f64> = (0..len)
            .map(|i| {
                let t = i as f64;
                (-t / self.tau1).exp() - (-t / self.tau2).exp()
            })
            .collect();
        let peak = p.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if peak > 0.0 {
            for v in &mut p {
                *v /= peak;
            }
        }
        Array1::from(p)
    }

    /// Samples the pulse on an automatically chosen support: the length
    /// doubles from ten samples until the tail falls below 1% of the peak
    /// (capped to keep pathological time constants from running away).
    #[must_use]
    pub fn kernel(&self) -> Trace {
        let mut len = INITIAL_SUPPORT;
        loop {
            let p = self.sampled(len);
            if p[len - 1] <= TAIL_FRACTION || len >= MAX_SUPPORT {
                return p;
            }
            len *= 2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rejects_bad_time_constants() {
        assert!(matches!(
            BiExponential::new(2.0, 0.0),
            Err(Error::InvalidTau(_))
        ));
        assert!(matches!(
            BiExponential::new(1.0, 3.0),
            Err(Error::InvalidTau(_))
        ));
        assert!(matches!(
            BiExponential::new(2.0, 2.0),
            Err(Error::InvalidTau(_))
        ));
    }

    #[test]
    fn test_kernel_is_peak_normalized() {
        let kernel = BiExponential::new(8.0, 1.5).unwrap().kernel();
        let peak = kernel.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_relative_eq!(peak, 1.0);
        assert_relative_eq!(kernel[0], 0.0);
    }

    #[test]
    fn test_kernel_tail_below_one_percent() {
        let kernel = BiExponential::new(20.0, 2.0).unwrap().kernel();
        assert!(kernel[kernel.len() - 1] <= 0.01);
        // The automatic support grows in doublings of ten.
        assert_eq!(kernel.len() % 10, 0);
    }

    #[test]
    fn test_rise_then_decay() {
        let kernel = BiExponential::new(10.0, 1.0).unwrap().sampled(64);
        let peak_at = kernel
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert!(peak_at > 0);
        assert!(kernel[peak_at] > kernel[40]);
    }
}
