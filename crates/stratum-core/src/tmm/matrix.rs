//! 2×2 complex matrices for the layer recursion.

use std::ops::Mul;

use num_complex::Complex64;

/// Row-major 2×2 complex matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat2 {
    pub m: [[Complex64; 2]; 2],
}

impl Mat2 {
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Self {
        Self { m: [[a, b], [c, d]] }
    }

    pub fn identity() -> Self {
        let one = Complex64::new(1.0, 0.0);
        let zero = Complex64::new(0.0, 0.0);
        Self::new(one, zero, zero, one)
    }

    /// Characteristic matrix of a homogeneous layer.
    pub fn characteristic(delta: Complex64, eta: Complex64) -> Self {
        let i = Complex64::i();
        let (cos, sin) = (delta.cos(), delta.sin());
        Self::new(cos, i * sin / eta, i * eta * sin, cos)
    }

    /// Differential of [`characteristic`](Self::characteristic) for increments
    /// `d_delta` of the phase and `d_eta` of the admittance.
    pub fn characteristic_differential(
        delta: Complex64,
        eta: Complex64,
        d_delta: Complex64,
        d_eta: Complex64,
    ) -> Self {
        let i = Complex64::i();
        let (cos, sin) = (delta.cos(), delta.sin());
        let diag = -sin * d_delta;
        Self::new(
            diag,
            i * (cos * d_delta / eta - sin * d_eta / (eta * eta)),
            i * (d_eta * sin + eta * cos * d_delta),
            diag,
        )
    }

    pub fn apply(&self, v: [Complex64; 2]) -> [Complex64; 2] {
        [
            self.m[0][0] * v[0] + self.m[0][1] * v[1],
            self.m[1][0] * v[0] + self.m[1][1] * v[1],
        ]
    }

    pub fn determinant(&self) -> Complex64 {
        self.m[0][0] * self.m[1][1] - self.m[0][1] * self.m[1][0]
    }
}

impl Mul for Mat2 {
    type Output = Mat2;

    fn mul(self, rhs: Mat2) -> Mat2 {
        let a = &self.m;
        let b = &rhs.m;
        Mat2::new(
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        )
    }
}
