//! # Stratum Materials
//!
//! Optical constants for thin-film simulation. Every material implements the
//! [`MaterialProvider`](provider::MaterialProvider) trait, which maps a
//! wavelength (nm) to a complex refractive index $\tilde{n} = n + ik$.
//!
//! ## Available data sources
//!
//! | Source | Module | Identifiers |
//! |--------|--------|-------------|
//! | Sellmeier formulas | [`sellmeier`] | `SiO2`, `TiO2` |
//! | Palik handbook tables | [`palik`] | `SiO2_Palik`, `TiO2_Palik` |
//! | Constant index | [`provider::ConstantIndex`] | `Air` |
//!
//! Materials are looked up by name through [`registry::MaterialRegistry`].

pub mod palik;
pub mod provider;
pub mod registry;
pub mod sellmeier;
pub mod spline;

pub use provider::{ConstantIndex, MaterialError, MaterialProvider};
pub use registry::{Material, MaterialRegistry};
