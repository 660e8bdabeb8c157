//! Name → provider registry.
//!
//! Film descriptions refer to materials by identifier (`"SiO2"`,
//! `"TiO2_Palik"`, …). The registry resolves those names once, up front, so
//! an unknown identifier fails at film construction instead of halfway
//! through an optimization run.

use std::collections::BTreeMap;
use std::sync::Arc;

use num_complex::Complex64;

use crate::palik::PalikMaterial;
use crate::provider::{ConstantIndex, MaterialError, MaterialProvider};
use crate::sellmeier::SellmeierMaterial;

/// Shared handle to a registered material.
pub type Material = Arc<dyn MaterialProvider>;

/// Mapping from material identifier to dispersion provider.
#[derive(Clone, Default)]
pub struct MaterialRegistry {
    entries: BTreeMap<String, Material>,
}

impl MaterialRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in materials.
    ///
    /// | Identifier | Source |
    /// |------------|--------|
    /// | `Air` | constant, n = 1 |
    /// | `SiO2` | Malitson Sellmeier, 210–6700 nm |
    /// | `TiO2` | DeVore Sellmeier, 430–1530 nm |
    /// | `SiO2_Palik` | Palik table, 300–1000 nm |
    /// | `TiO2_Palik` | Palik table, 300–1000 nm |
    pub fn with_defaults() -> Result<Self, MaterialError> {
        let mut registry = Self::new();
        registry.register("Air", Arc::new(ConstantIndex::air()));
        registry.register("SiO2", Arc::new(SellmeierMaterial::fused_silica()));
        registry.register("TiO2", Arc::new(SellmeierMaterial::rutile()));
        registry.register("SiO2_Palik", Arc::new(PalikMaterial::sio2()?));
        registry.register("TiO2_Palik", Arc::new(PalikMaterial::tio2()?));
        Ok(registry)
    }

    /// Add or replace a material under `name`.
    pub fn register(&mut self, name: impl Into<String>, material: Material) {
        self.entries.insert(name.into(), material);
    }

    /// Resolve a material identifier.
    pub fn get(&self, name: &str) -> Result<Material, MaterialError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| MaterialError::UnknownMaterial(name.to_string()))
    }

    /// Refractive index of `name` at `wavelength_nm`.
    pub fn lookup(&self, name: &str, wavelength_nm: f64) -> Result<Complex64, MaterialError> {
        self.get(name)?.refractive_index(wavelength_nm)
    }

    /// Registered identifiers in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }
}

impl std::fmt::Debug for MaterialRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.keys()).finish()
    }
}
