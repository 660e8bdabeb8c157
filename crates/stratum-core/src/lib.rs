//! # Stratum Core
//!
//! Thin-film multilayer optics: transfer-matrix spectra, analytic Jacobians
//! and gradient-based design of layer stacks.
//!
//! ## Modules
//!
//! - [`tmm`]: characteristic-matrix spectra and their derivatives.
//! - [`film`]: film model with layers, media and cached spectra.
//! - [`optimizer`]: projected Adam over thickness or free-form index.
//! - [`loss`]: RMS losses.
//! - [`types`]: shared data types.
//! - [`error`]: error types.
//!
//! ## Conventions
//!
//! Wavelengths and thicknesses share one length unit (nm with the built-in
//! materials). Angles are in degrees at every public interface. Stacked
//! spectra and Jacobian rows are ordered `[R(λ_0)…R(λ_n), T(λ_0)…T(λ_n)]`.

pub mod error;
pub mod film;
pub mod loss;
pub mod optimizer;
pub mod tmm;
pub mod types;

pub use error::{ConfigurationError, FilmError};
pub use film::{ConfigKey, Film, LayerModel, SpectralConfig};
pub use optimizer::{AdamOptimizer, AdamOptions, OptimizationTrace};
pub use types::{linspace, PolarisationMix, Spectrum, StackIndices, TargetSpectrum};
