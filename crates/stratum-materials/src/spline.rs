//! Natural cubic spline for tabulated optical constants.
//!
//! Handbook data lists $(n, k)$ at discrete wavelengths. The spline gives a
//! smooth index between knots, which keeps finite-difference checks of the
//! transfer-matrix Jacobian well behaved for dispersive stacks.

use crate::provider::MaterialError;

/// A natural cubic spline over strictly increasing knots.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivatives at the knots.
    curvature: Vec<f64>,
}

impl CubicSpline {
    /// Fit a natural spline (zero curvature at both ends).
    ///
    /// Fails if the inputs differ in length, hold fewer than two points, or
    /// the knots are not strictly increasing.
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self, MaterialError> {
        if xs.len() != ys.len() {
            return Err(MaterialError::DataError(format!(
                "spline knots ({}) and values ({}) differ in length",
                xs.len(),
                ys.len()
            )));
        }
        if xs.len() < 2 {
            return Err(MaterialError::DataError(
                "spline needs at least two knots".into(),
            ));
        }
        if let Some(i) = xs.windows(2).position(|w| w[1] <= w[0]) {
            return Err(MaterialError::DataError(format!(
                "spline knots must be strictly increasing (index {})",
                i + 1
            )));
        }

        let n = xs.len();
        let mut curvature = vec![0.0; n];
        let mut rhs = vec![0.0; n];

        // Tridiagonal elimination
        for i in 1..n - 1 {
            let sig = (xs[i] - xs[i - 1]) / (xs[i + 1] - xs[i - 1]);
            let pivot = sig * curvature[i - 1] + 2.0;
            curvature[i] = (sig - 1.0) / pivot;
            let slope_jump = (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i])
                - (ys[i] - ys[i - 1]) / (xs[i] - xs[i - 1]);
            rhs[i] = (6.0 * slope_jump / (xs[i + 1] - xs[i - 1]) - sig * rhs[i - 1]) / pivot;
        }
        curvature[n - 1] = 0.0;
        for k in (1..n - 1).rev() {
            curvature[k] = curvature[k] * curvature[k + 1] + rhs[k];
        }

        Ok(Self { xs, ys, curvature })
    }

    /// First and last knot.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Evaluate at `x`. Outside the knots the boundary cubic is extended.
    pub fn evaluate(&self, x: f64) -> f64 {
        let hi = self
            .xs
            .partition_point(|&knot| knot <= x)
            .clamp(1, self.xs.len() - 1);
        let lo = hi - 1;

        let h = self.xs[hi] - self.xs[lo];
        let a = (self.xs[hi] - x) / h;
        let b = (x - self.xs[lo]) / h;

        a * self.ys[lo]
            + b * self.ys[hi]
            + ((a.powi(3) - a) * self.curvature[lo] + (b.powi(3) - b) * self.curvature[hi]) * h * h
                / 6.0
    }
}
