//! Transfer-matrix method for planar multilayers.
//!
//! Each layer $j$ is described by its characteristic matrix
//!
//! $$M_j = \begin{pmatrix} \cos\delta_j & i\sin\delta_j/\eta_j \\ i\eta_j\sin\delta_j & \cos\delta_j \end{pmatrix},
//! \qquad \delta_j = \frac{2\pi}{\lambda} q_j d_j,$$
//!
//! where $q_j = \sqrt{\tilde n_j^2 - \beta^2} = \tilde n_j\cos\theta_j$ follows
//! from Snell's invariant $\beta = \tilde n_0\sin\theta_0$ and the tilted
//! admittance is $\eta = q$ (s) or $\eta = \tilde n^2/q$ (p). The stack
//! response is read off
//! $(B, C)^T = M_1 \cdots M_L\,(1, \eta_{\text{sub}})^T$.
//!
//! - [`spectrum`]: forward reflectance/transmittance.
//! - [`jacobian`]: analytic derivatives via prefix/suffix products.

pub mod jacobian;
pub mod matrix;
pub mod spectrum;

use ndarray::ArrayView1;
use num_complex::Complex64;

use crate::types::PolarisationMix;
use matrix::Mat2;

pub use jacobian::{jacobian_wrt_index, jacobian_wrt_thickness};
pub use spectrum::{compute_spectrum, compute_spectrum_into, reflectance, transmittance};

/// Linear polarisation state of a single evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    S,
    P,
}

impl Mode {
    /// Modes with non-zero weight, paired with that weight.
    pub(crate) fn weighted(mix: PolarisationMix) -> impl Iterator<Item = (Mode, f64)> {
        [(Mode::S, mix.s_weight), (Mode::P, mix.p_weight())]
            .into_iter()
            .filter(|&(_, w)| w != 0.0)
    }
}

/// Normal component $q = \sqrt{\tilde n^2 - \beta^2}$ of the wave vector (in units of $k_0$).
///
/// The principal root keeps $\operatorname{Im} q \ge 0$, which is the decaying
/// branch for both absorbing layers and evanescent waves.
#[inline]
pub(crate) fn normal_index(n: Complex64, beta: Complex64) -> Complex64 {
    (n * n - beta * beta).sqrt()
}

/// Tilted optical admittance.
#[inline]
pub(crate) fn admittance(n: Complex64, q: Complex64, mode: Mode) -> Complex64 {
    match mode {
        Mode::S => q,
        Mode::P => n * n / q,
    }
}

/// Optical terms of one layer at one wavelength and polarisation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LayerTerms {
    pub n: Complex64,
    pub q: Complex64,
    pub eta: Complex64,
    pub delta: Complex64,
    pub thickness: f64,
}

impl LayerTerms {
    pub fn new(n: Complex64, thickness: f64, beta: Complex64, k0: f64, mode: Mode) -> Self {
        let q = normal_index(n, beta);
        Self {
            n,
            q,
            eta: admittance(n, q, mode),
            delta: q * (k0 * thickness),
            thickness,
        }
    }

    pub fn matrix(&self) -> Mat2 {
        Mat2::characteristic(self.delta, self.eta)
    }
}

/// Everything about one wavelength that does not depend on the layer being varied.
pub(crate) struct Incidence {
    pub k0: f64,
    pub beta: Complex64,
    pub eta_inc: Complex64,
    pub eta_sub: Complex64,
}

impl Incidence {
    pub fn new(
        wavelength: f64,
        n_inc: Complex64,
        n_sub: Complex64,
        angle_rad: f64,
        mode: Mode,
    ) -> Self {
        let beta = n_inc * angle_rad.sin();
        let q_inc = normal_index(n_inc, beta);
        let q_sub = normal_index(n_sub, beta);
        Self {
            k0: 2.0 * std::f64::consts::PI / wavelength,
            beta,
            eta_inc: admittance(n_inc, q_inc, mode),
            eta_sub: admittance(n_sub, q_sub, mode),
        }
    }

    pub fn layers(
        &self,
        indices: ArrayView1<'_, Complex64>,
        thicknesses: &[f64],
        mode: Mode,
    ) -> Vec<LayerTerms> {
        indices
            .iter()
            .zip(thicknesses)
            .map(|(&n, &d)| LayerTerms::new(n, d, self.beta, self.k0, mode))
            .collect()
    }

    /// Substrate-side field vector $(1, \eta_{\text{sub}})^T$.
    pub fn exit_vector(&self) -> [Complex64; 2] {
        [Complex64::new(1.0, 0.0), self.eta_sub]
    }

    /// $(R, T)$ from the stack's $(B, C)$.
    pub fn power(&self, bc: [Complex64; 2]) -> (f64, f64) {
        let [b, c] = bc;
        let denom = self.eta_inc * b + c;
        let r = (self.eta_inc * b - c) / denom;
        let t = 4.0 * self.eta_inc.re * self.eta_sub.re / denom.norm_sqr();
        (r.norm_sqr(), t)
    }
}
