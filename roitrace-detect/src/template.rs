//! Optimal-template matched filtering (Clements–Bekkers).
//!
//! For every time index the template is fitted to the trace window by the
//! closed-form least-squares optimal scale `s` and offset `c`; the
//! detection criterion is the scale over the residual standard error. All
//! windowed sums are computed with same-mode convolutions (the kernel is
//! reversed so the convolution computes a correlation), so results are
//! centered on the template window: callers shift reported indices by
//! half the kernel length to recover window starts.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use roitrace_core::Trace;

use crate::error::{Error, Result};

/// Result of a template-matching run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TemplateMatch {
    /// Indices where the criterion exceeds the threshold (window-centered).
    pub indices: Vec<usize>,
    /// The detection criterion per index.
    pub crit: Vec<f64>,
    /// The optimal template scale per index.
    pub scale: Vec<f64>,
    /// The optimal baseline offset per index.
    pub offset: Vec<f64>,
    /// The threshold the indices were selected with.
    pub threshold: f64,
}

/// Scores every index of `data` against `kernel` and returns the indices
/// exceeding `threshold`, along with the full criterion/scale/offset
/// arrays.
///
/// A window that reproduces the template exactly has zero residual; its
/// criterion is infinite and it is detected at any threshold.
///
/// # Errors
/// Returns [`Error::KernelLongerThanTrace`] unless the trace is strictly
/// longer than the kernel, [`Error::KernelTooShort`] for kernels of fewer
/// than two samples, and [`Error::DegenerateKernel`] for a constant
/// kernel.
pub fn template_matching(data: &Trace, kernel: &Trace, threshold: f64) -> Result<TemplateMatch> {
    let y: Vec<f64> = data.iter().copied().collect();
    let e: Vec<f64> = kernel.iter().copied().collect();
    let n = e.len();

    if n < 2 {
        return Err(Error::KernelTooShort { got: n });
    }
    if y.len() <= n {
        return Err(Error::KernelLongerThanTrace {
            trace: y.len(),
            kernel: n,
        });
    }

    let n_f = n as f64;
    let sum_e: f64 = e.iter().sum();
    let sum_ee: f64 = e.iter().map(|v| v * v).sum();

    // A constant kernel makes the optimal-scale denominator vanish.
    let scale_denom = sum_ee - sum_e * sum_e / n_f;
    if scale_denom.abs() <= f64::EPSILON * sum_ee.max(1.0) {
        return Err(Error::DegenerateKernel);
    }

    // Reverse the kernel so the convolution computes the correlation
    // sum_k e_k * y_{n+k}.
    let e_rev: Vec<f64> = e.iter().rev().copied().collect();
    let ones = vec![1.0; n];
    let yy: Vec<f64> = y.iter().map(|v| v * v).collect();

    let sum_y = convolve_same(&y, &ones);
    let sum_yy = convolve_same(&yy, &ones);
    let sum_ey = convolve_same(&y, &e_rev);

    let mut scale = Vec::with_capacity(y.len());
    let mut offset = Vec::with_capacity(y.len());
    let mut crit = Vec::with_capacity(y.len());
    let mut indices = Vec::new();

    for i in 0..y.len() {
        let s = (sum_ey[i] - sum_e * sum_y[i] / n_f) / scale_denom;
        let c = (sum_y[i] - s * sum_e) / n_f;
        let sse = sum_yy[i] + sum_ee * s * s + n_f * c * c
            - 2.0 * (s * sum_ey[i] + c * sum_y[i] - s * c * sum_e);
        // Rounding leaves a perfect fit a few ulps off zero in either
        // direction; collapse it so the criterion saturates.
        let sse = if sse <= 1e-12 * sum_yy[i].abs().max(1.0) {
            0.0
        } else {
            sse
        };
        let criterion = if sse == 0.0 {
            if s == 0.0 {
                0.0
            } else {
                f64::INFINITY.copysign(s)
            }
        } else {
            s / (sse / (n_f - 1.0)).sqrt()
        };

        if criterion > threshold {
            indices.push(i);
        }
        scale.push(s);
        offset.push(c);
        crit.push(criterion);
    }

    Ok(TemplateMatch {
        indices,
        crit,
        scale,
        offset,
        threshold,
    })
}

/// Same-mode discrete convolution: output length equals the longer input,
/// centered on the full convolution.
fn convolve_same(y: &[f64], kernel: &[f64]) -> Vec<f64> {
    let l = y.len();
    let n = kernel.len();
    let offset = (n - 1) / 2;
    let mut out = vec![0.0; l];
    for (i, out_i) in out.iter_mut().enumerate() {
        let full_i = i + offset;
        let j0 = (full_i + 1).saturating_sub(n);
        let j1 = full_i.min(l - 1);
        let mut acc = 0.0;
        for (j, &yv) in y.iter().enumerate().take(j1 + 1).skip(j0) {
            acc += yv * kernel[full_i - j];
        }
        *out_i = acc;
    }
    out
}
