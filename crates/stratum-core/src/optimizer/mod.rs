//! Gradient-based optimization of film parameters.
//!
//! One update rule ([`AdamOptimizer`]) drives any [`Parameterization`]:
//!
//! | Parameterization | Free parameter | Feasible set |
//! |------------------|----------------|--------------|
//! | [`ThicknessParameterization`] | layer thickness | $d_j \ge 0$ |
//! | [`FreeFormParameterization`] | real layer index | $n_{\min} \le n_j \le n_{\max}$ |
//!
//! Each step evaluates the residual $f = (R, T)_{\text{film}} - (R, T)_{\text{target}}$
//! on a mini-batch, forms the gradient $g = J^T f$ of $\tfrac12\|f\|^2$ and
//! applies a projected Adam update. The validation loss is the RMS of the
//! full, unbatched residual.

pub mod adam;
pub mod batch;
pub mod parameterization;

use serde::Serialize;

pub use adam::{AdamOptimizer, AdamOptions};
pub use parameterization::{FreeFormParameterization, Parameterization, ThicknessParameterization};

/// Parameter snapshots and validation losses of one run.
///
/// Entry 0 is always the initial state. With `record` off it is the only entry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizationTrace {
    pub parameters: Vec<Vec<f64>>,
    pub losses: Vec<f64>,
}

impl OptimizationTrace {
    pub(crate) fn starting_at(parameters: Vec<f64>, loss: f64) -> Self {
        Self {
            parameters: vec![parameters],
            losses: vec![loss],
        }
    }

    pub(crate) fn push(&mut self, parameters: Vec<f64>, loss: f64) {
        self.parameters.push(parameters);
        self.losses.push(loss);
    }

    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    /// Smallest finite recorded loss and its entry index.
    pub fn best(&self) -> Option<(usize, f64)> {
        self.losses
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, l)| l.is_finite())
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_skips_nan() {
        let mut trace = OptimizationTrace::starting_at(vec![1.0], 0.5);
        trace.push(vec![2.0], f64::NAN);
        trace.push(vec![3.0], 0.2);
        assert_eq!(trace.best(), Some((2, 0.2)));
        assert_eq!(trace.len(), 3);
    }
}
