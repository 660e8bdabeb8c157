//! Core types shared across the simulation and optimization pipeline.

use ndarray::{Array1, Array2, Axis};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Mix of s- and p-polarised light in the incident beam.
///
/// Power quantities are reported as `s_weight · X_s + (1 − s_weight) · X_p`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarisationMix {
    pub s_weight: f64,
}

impl PolarisationMix {
    pub fn unpolarised() -> Self {
        Self { s_weight: 0.5 }
    }

    pub fn s() -> Self {
        Self { s_weight: 1.0 }
    }

    pub fn p() -> Self {
        Self { s_weight: 0.0 }
    }

    pub fn p_weight(&self) -> f64 {
        1.0 - self.s_weight
    }
}

impl Default for PolarisationMix {
    fn default() -> Self {
        Self::unpolarised()
    }
}

/// Complex indices of every medium in a stack, sampled on a wavelength grid.
#[derive(Debug, Clone)]
pub struct StackIndices {
    /// Layer indices, shape (wavelengths, layers). Column 0 faces the incidence medium.
    pub layers: Array2<Complex64>,
    /// Substrate index per wavelength.
    pub substrate: Array1<Complex64>,
    /// Incidence-medium index per wavelength.
    pub incidence: Array1<Complex64>,
}

impl StackIndices {
    pub fn n_wavelengths(&self) -> usize {
        self.layers.nrows()
    }

    pub fn n_layers(&self) -> usize {
        self.layers.ncols()
    }

    /// Restrict to a subset of wavelength rows, keeping the given order.
    pub fn select_wavelengths(&self, rows: &[usize]) -> Self {
        Self {
            layers: self.layers.select(Axis(0), rows),
            substrate: self.substrate.select(Axis(0), rows),
            incidence: self.incidence.select(Axis(0), rows),
        }
    }
}

/// Reflectance and transmittance on a wavelength grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub wavelengths: Vec<f64>,
    pub reflectance: Vec<f64>,
    pub transmittance: Vec<f64>,
}

impl Spectrum {
    /// Split an `[R…, T…]` buffer.
    pub fn from_stacked(wavelengths: Vec<f64>, stacked: &[f64]) -> Self {
        let n = wavelengths.len();
        assert_eq!(stacked.len(), 2 * n, "stacked spectrum must hold R then T");
        Self {
            reflectance: stacked[..n].to_vec(),
            transmittance: stacked[n..].to_vec(),
            wavelengths,
        }
    }

    /// Reflectance followed by transmittance.
    pub fn stacked(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(2 * self.wavelengths.len());
        out.extend_from_slice(&self.reflectance);
        out.extend_from_slice(&self.transmittance);
        out
    }

    pub fn len(&self) -> usize {
        self.wavelengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelengths.is_empty()
    }
}

/// A measured or designed spectrum the optimizer should reproduce.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpectrum {
    /// Incidence angle in degrees.
    pub angle_deg: f64,
    pub wavelengths: Vec<f64>,
    pub reflectance: Vec<f64>,
    pub transmittance: Vec<f64>,
    #[serde(default)]
    pub polarisation: PolarisationMix,
}

impl TargetSpectrum {
    pub fn new(angle_deg: f64, spectrum: Spectrum, polarisation: PolarisationMix) -> Self {
        Self {
            angle_deg,
            wavelengths: spectrum.wavelengths,
            reflectance: spectrum.reflectance,
            transmittance: spectrum.transmittance,
            polarisation,
        }
    }

    pub fn n_wavelengths(&self) -> usize {
        self.wavelengths.len()
    }

    /// Check that R and T are sampled on the wavelength grid.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let n = self.wavelengths.len();
        if n == 0 {
            return Err(ConfigurationError::InvalidTarget(format!(
                "target at {}° has no wavelengths",
                self.angle_deg
            )));
        }
        for (what, got) in [
            ("reflectance", self.reflectance.len()),
            ("transmittance", self.transmittance.len()),
        ] {
            if got != n {
                return Err(ConfigurationError::LengthMismatch {
                    what: format!("target {what}"),
                    expected: n,
                    got,
                });
            }
        }
        Ok(())
    }
}

/// Evenly spaced grid including both end points.
pub fn linspace(start: f64, end: f64, points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..points)
            .map(|i| start + (end - start) * i as f64 / (points - 1) as f64)
            .collect(),
    }
}
