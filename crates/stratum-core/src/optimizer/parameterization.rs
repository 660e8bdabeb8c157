//! Parameterization policies: which film parameter is free and where it may go.

use ndarray::ArrayViewMut2;

use crate::error::{ConfigurationError, FilmError};
use crate::film::Film;
use crate::tmm;
use crate::types::{PolarisationMix, StackIndices};

/// Everything the update rule needs to know about the free parameters.
pub trait Parameterization {
    /// Short name used in log lines.
    fn label(&self) -> &'static str;

    /// Step size used when the options leave `alpha` unset.
    fn default_alpha(&self) -> f64;

    /// Fail if the film's layer model is not driven by this parameter.
    fn check_film(&self, film: &Film) -> Result<(), ConfigurationError>;

    /// Clamp a proposed parameter vector into the feasible set.
    fn project(&self, params: &mut [f64]);

    /// Fill `out` (rows `[dR…; dT…]`, one column per layer) for one configuration.
    fn jacobian(
        &self,
        out: ArrayViewMut2<'_, f64>,
        wavelengths: &[f64],
        thicknesses: &[f64],
        indices: &StackIndices,
        angle_deg: f64,
        polarisation: PolarisationMix,
    );

    fn parameters(&self, film: &Film) -> Vec<f64> {
        film.parameters()
    }

    /// Project `params` in place and write them to the film.
    fn write_back(&self, film: &mut Film, params: &mut [f64]) -> Result<(), FilmError> {
        self.project(params);
        film.set_parameters(params)
    }
}

/// Layer thicknesses of a two-material stack.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThicknessParameterization;

impl Parameterization for ThicknessParameterization {
    fn label(&self) -> &'static str {
        "thickness"
    }

    fn default_alpha(&self) -> f64 {
        1.0
    }

    fn check_film(&self, film: &Film) -> Result<(), ConfigurationError> {
        if film.is_free_form() {
            return Err(ConfigurationError::ModeMismatch(
                "thickness optimization needs a two-material film".into(),
            ));
        }
        Ok(())
    }

    fn project(&self, params: &mut [f64]) {
        for d in params.iter_mut() {
            if *d < 0.0 {
                *d = 0.0;
            }
        }
    }

    fn jacobian(
        &self,
        out: ArrayViewMut2<'_, f64>,
        wavelengths: &[f64],
        thicknesses: &[f64],
        indices: &StackIndices,
        angle_deg: f64,
        polarisation: PolarisationMix,
    ) {
        tmm::jacobian_wrt_thickness(out, wavelengths, thicknesses, indices, angle_deg, polarisation);
    }
}

/// Real layer indices of a free-form stack, bounded to `[n_min, n_max]`.
#[derive(Debug, Clone, Copy)]
pub struct FreeFormParameterization {
    pub n_min: f64,
    pub n_max: f64,
}

impl FreeFormParameterization {
    pub fn new(n_min: f64, n_max: f64) -> Self {
        Self { n_min, n_max }
    }

    /// Lower bound that keeps the first interface clear of total internal
    /// reflection: $\operatorname{Re}(n_{\text{inc}}) \sin\theta_0$.
    ///
    /// Only the real part of the incidence index is used; absorbing
    /// incidence media are not handled.
    pub fn tir_floor(film: &Film, wavelength: f64, angle_deg: f64) -> Result<f64, FilmError> {
        let n_inc = film.incidence().index(wavelength)?;
        Ok(n_inc.re * angle_deg.to_radians().sin())
    }
}

impl Parameterization for FreeFormParameterization {
    fn label(&self) -> &'static str {
        "free-form index"
    }

    fn default_alpha(&self) -> f64 {
        0.1
    }

    fn check_film(&self, film: &Film) -> Result<(), ConfigurationError> {
        if !film.is_free_form() {
            return Err(ConfigurationError::ModeMismatch(
                "index optimization needs a free-form film".into(),
            ));
        }
        if self.n_min.is_nan() || self.n_max.is_nan() || self.n_min > self.n_max {
            return Err(ConfigurationError::ModeMismatch(format!(
                "empty index range [{}, {}]",
                self.n_min, self.n_max
            )));
        }
        Ok(())
    }

    fn project(&self, params: &mut [f64]) {
        for n in params.iter_mut() {
            *n = n.clamp(self.n_min, self.n_max);
        }
    }

    fn jacobian(
        &self,
        out: ArrayViewMut2<'_, f64>,
        wavelengths: &[f64],
        thicknesses: &[f64],
        indices: &StackIndices,
        angle_deg: f64,
        polarisation: PolarisationMix,
    ) {
        tmm::jacobian_wrt_index(out, wavelengths, thicknesses, indices, angle_deg, polarisation);
    }
}
