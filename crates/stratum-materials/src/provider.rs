//! Material property provider trait.
//!
//! Every dispersion source implements [`MaterialProvider`], which returns the
//! complex refractive index $\tilde{n} = n + ik$ of a medium at a given
//! wavelength. The film model only ever talks to this trait.

use num_complex::Complex64;
use thiserror::Error;

/// Errors from material providers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MaterialError {
    #[error("Wavelength {wavelength_nm} nm is outside the data range [{min}, {max}] nm")]
    OutOfRange {
        wavelength_nm: f64,
        min: f64,
        max: f64,
    },

    #[error("Unknown material '{0}': no dispersion formula is registered under this name")]
    UnknownMaterial(String),

    #[error("Data error: {0}")]
    DataError(String),
}

/// Provides wavelength-dependent optical constants.
///
/// Implementations include closed-form dispersion (Sellmeier), tabulated
/// handbook data (Palik) and non-dispersive media such as air.
pub trait MaterialProvider: Send + Sync {
    /// Human-readable name of this material.
    fn name(&self) -> &str;

    /// Wavelength range over which the dispersion is valid (nm).
    fn wavelength_range(&self) -> (f64, f64);

    /// Complex refractive index $\tilde{n}(\lambda)$ at a given wavelength.
    fn refractive_index(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError>;

    /// Complex dielectric function $\epsilon = \tilde{n}^2$.
    fn dielectric_function(&self, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        let n = self.refractive_index(wavelength_nm)?;
        Ok(n * n)
    }

    /// Reject wavelengths outside [`wavelength_range`](Self::wavelength_range).
    fn check_range(&self, wavelength_nm: f64) -> Result<(), MaterialError> {
        let (min, max) = self.wavelength_range();
        if wavelength_nm < min || wavelength_nm > max {
            return Err(MaterialError::OutOfRange {
                wavelength_nm,
                min,
                max,
            });
        }
        Ok(())
    }
}

/// A non-dispersive medium with a fixed complex index.
///
/// Used for the ambient medium (air) and for free-form layers whose index is
/// an optimization variable rather than a material property.
#[derive(Debug, Clone)]
pub struct ConstantIndex {
    name: String,
    index: Complex64,
}

impl ConstantIndex {
    pub fn new(name: impl Into<String>, index: Complex64) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// Real (lossless) index.
    pub fn real(name: impl Into<String>, n: f64) -> Self {
        Self::new(name, Complex64::new(n, 0.0))
    }

    pub fn air() -> Self {
        Self::real("Air", 1.0)
    }
}

impl MaterialProvider for ConstantIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn wavelength_range(&self) -> (f64, f64) {
        (0.0, f64::INFINITY)
    }

    fn refractive_index(&self, _wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        Ok(self.index)
    }
}
