//! Film model: layer parameters, media and cached spectra.
//!
//! A [`Film`] owns the layer thicknesses, the per-layer index model and a
//! set of spectral configurations (incidence angle + wavelength grid). The
//! spectrum of each configuration is memoised in a cache keyed by the
//! configuration's content and stamped with the film's parameter version.
//! Every successful parameter update bumps the version, which outdates all
//! cached spectra at once.

use std::collections::HashMap;
use std::fmt;

use ndarray::{Array1, Array2};
use num_complex::Complex64;
use stratum_materials::{Material, MaterialRegistry};

use crate::error::{ConfigurationError, FilmError};
use crate::tmm;
use crate::types::{PolarisationMix, Spectrum, StackIndices};

/// A named medium resolved from the registry.
#[derive(Clone)]
pub struct Medium {
    name: String,
    material: Material,
}

impl Medium {
    pub fn resolve(registry: &MaterialRegistry, name: &str) -> Result<Self, FilmError> {
        Ok(Self {
            name: name.to_string(),
            material: registry.get(name)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self, wavelength: f64) -> Result<Complex64, FilmError> {
        Ok(self.material.refractive_index(wavelength)?)
    }

    fn indices(&self, wavelengths: &[f64]) -> Result<Array1<Complex64>, FilmError> {
        wavelengths
            .iter()
            .map(|&wl| self.index(wl))
            .collect::<Result<Vec<_>, _>>()
            .map(Array1::from)
    }
}

impl fmt::Debug for Medium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Medium").field(&self.name).finish()
    }
}

/// How the layer indices are defined, and therefore which parameter is free.
#[derive(Debug, Clone)]
pub enum LayerModel {
    /// Alternating `A B A B …` stack. Layer `i` uses `materials[(first + i) % 2]`.
    /// Thickness is the free parameter.
    TwoMaterial { materials: [Medium; 2], first: usize },
    /// Every layer has its own real, non-dispersive index, which is the free parameter.
    FreeForm { indices: Vec<f64> },
}

/// Content identity of a spectral configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
    angle_bits: u64,
    wavelength_bits: Vec<u64>,
}

impl ConfigKey {
    pub fn new(angle_deg: f64, wavelengths: &[f64]) -> Self {
        Self {
            angle_bits: canonical_bits(angle_deg),
            wavelength_bits: wavelengths.iter().map(|&wl| canonical_bits(wl)).collect(),
        }
    }
}

/// `-0.0` and `0.0` name the same configuration.
fn canonical_bits(x: f64) -> u64 {
    if x == 0.0 {
        0.0_f64.to_bits()
    } else {
        x.to_bits()
    }
}

/// One evaluation context of a film.
#[derive(Debug, Clone)]
pub struct SpectralConfig {
    pub angle_deg: f64,
    pub wavelengths: Vec<f64>,
    pub polarisation: PolarisationMix,
    key: ConfigKey,
}

impl SpectralConfig {
    pub fn key(&self) -> &ConfigKey {
        &self.key
    }

    fn matches(&self, angle_deg: Option<f64>, wavelengths: Option<&[f64]>) -> bool {
        let angle_ok = angle_deg.map_or(true, |a| canonical_bits(a) == self.key.angle_bits);
        let wls_ok = wavelengths.map_or(true, |w| {
            ConfigKey::new(0.0, w).wavelength_bits == self.key.wavelength_bits
        });
        angle_ok && wls_ok
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    version: u64,
    spectrum: Spectrum,
}

/// A multilayer thin film on a substrate.
#[derive(Debug, Clone)]
pub struct Film {
    thicknesses: Vec<f64>,
    model: LayerModel,
    substrate: Medium,
    incidence: Medium,
    configs: Vec<SpectralConfig>,
    cache: HashMap<ConfigKey, CacheEntry>,
    version: u64,
}

impl Film {
    /// Alternating two-material stack. Layer 0 (next to the incidence
    /// medium) is `a`, layer 1 is `b`, and so on.
    pub fn two_material(
        registry: &MaterialRegistry,
        a: &str,
        b: &str,
        substrate: &str,
        thicknesses: Vec<f64>,
        incidence: &str,
    ) -> Result<Self, FilmError> {
        validate_thicknesses(&thicknesses, thicknesses.len())?;
        let materials = [Medium::resolve(registry, a)?, Medium::resolve(registry, b)?];
        Ok(Self::assemble(
            thicknesses,
            LayerModel::TwoMaterial { materials, first: 0 },
            Medium::resolve(registry, substrate)?,
            Medium::resolve(registry, incidence)?,
        ))
    }

    /// Free-form stack whose `total_thickness` is split equally between layers.
    pub fn free_form(
        registry: &MaterialRegistry,
        indices: Vec<f64>,
        total_thickness: f64,
        substrate: &str,
        incidence: &str,
    ) -> Result<Self, FilmError> {
        let n = indices.len().max(1) as f64;
        let thicknesses = vec![total_thickness / n; indices.len()];
        Self::free_form_with_thickness(registry, indices, thicknesses, substrate, incidence)
    }

    /// Free-form stack with explicit (fixed) thicknesses.
    pub fn free_form_with_thickness(
        registry: &MaterialRegistry,
        indices: Vec<f64>,
        thicknesses: Vec<f64>,
        substrate: &str,
        incidence: &str,
    ) -> Result<Self, FilmError> {
        if indices.len() != thicknesses.len() {
            return Err(ConfigurationError::LengthMismatch {
                what: "free-form indices".into(),
                expected: thicknesses.len(),
                got: indices.len(),
            }
            .into());
        }
        validate_thicknesses(&thicknesses, thicknesses.len())?;
        Ok(Self::assemble(
            thicknesses,
            LayerModel::FreeForm { indices },
            Medium::resolve(registry, substrate)?,
            Medium::resolve(registry, incidence)?,
        ))
    }

    fn assemble(thicknesses: Vec<f64>, model: LayerModel, substrate: Medium, incidence: Medium) -> Self {
        Self {
            thicknesses,
            model,
            substrate,
            incidence,
            configs: Vec::new(),
            cache: HashMap::new(),
            version: 0,
        }
    }

    // ─── Parameters ──────────────────────────────────────────────────────

    pub fn layer_count(&self) -> usize {
        self.thicknesses.len()
    }

    pub fn model(&self) -> &LayerModel {
        &self.model
    }

    pub fn is_free_form(&self) -> bool {
        matches!(self.model, LayerModel::FreeForm { .. })
    }

    pub fn thicknesses(&self) -> &[f64] {
        &self.thicknesses
    }

    pub fn substrate(&self) -> &Medium {
        &self.substrate
    }

    pub fn incidence(&self) -> &Medium {
        &self.incidence
    }

    /// Parameter version; incremented by every successful update.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Free parameters: thicknesses for a two-material stack, layer indices
    /// for a free-form stack.
    pub fn parameters(&self) -> Vec<f64> {
        match &self.model {
            LayerModel::TwoMaterial { .. } => self.thicknesses.clone(),
            LayerModel::FreeForm { indices } => indices.clone(),
        }
    }

    /// Replace the free parameters.
    ///
    /// Thickness vectors are rejected when their length is wrong, when any
    /// entry is negative, or when every layer would be zero. On rejection the
    /// film is left untouched.
    pub fn set_parameters(&mut self, params: &[f64]) -> Result<(), FilmError> {
        match &mut self.model {
            LayerModel::TwoMaterial { .. } => {
                validate_thicknesses(params, self.thicknesses.len())?;
                self.thicknesses.copy_from_slice(params);
            }
            LayerModel::FreeForm { indices } => {
                if params.len() != indices.len() {
                    return Err(ConfigurationError::LengthMismatch {
                        what: "free-form indices".into(),
                        expected: indices.len(),
                        got: params.len(),
                    }
                    .into());
                }
                indices.copy_from_slice(params);
            }
        }
        self.outdate();
        Ok(())
    }

    /// Replace the thicknesses regardless of the layer model.
    pub fn set_thicknesses(&mut self, thicknesses: &[f64]) -> Result<(), FilmError> {
        validate_thicknesses(thicknesses, self.thicknesses.len())?;
        self.thicknesses.copy_from_slice(thicknesses);
        self.outdate();
        Ok(())
    }

    fn outdate(&mut self) {
        self.version += 1;
    }

    /// Fails if any layer has zero thickness.
    pub fn check_thickness(&self) -> Result<(), FilmError> {
        match self.thicknesses.iter().position(|&d| d <= 0.0) {
            Some(i) => Err(FilmError::DomainViolation(format!(
                "layer {i} has zero thickness"
            ))),
            None => Ok(()),
        }
    }

    /// Drop zero-thickness layers and return how many were removed.
    ///
    /// In a two-material stack the neighbours of a removed interior layer are
    /// the same material and are merged, so the stack stays alternating and
    /// its optical response is unchanged.
    pub fn remove_zero_thickness_layers(&mut self) -> usize {
        let before = self.thicknesses.len();
        match &mut self.model {
            LayerModel::FreeForm { indices } => {
                let (kept_n, kept_d): (Vec<f64>, Vec<f64>) = indices
                    .iter()
                    .zip(&self.thicknesses)
                    .filter(|&(_, &d)| d != 0.0)
                    .map(|(&n, &d)| (n, d))
                    .unzip();
                *indices = kept_n;
                self.thicknesses = kept_d;
            }
            LayerModel::TwoMaterial { first, .. } => {
                // (material slot, thickness) of the surviving layers, merged on contact.
                let mut merged: Vec<(usize, f64)> = Vec::with_capacity(before);
                for (i, &d) in self.thicknesses.iter().enumerate() {
                    if d == 0.0 {
                        continue;
                    }
                    let slot = (*first + i) % 2;
                    match merged.last_mut() {
                        Some((last_slot, last_d)) if *last_slot == slot => *last_d += d,
                        _ => merged.push((slot, d)),
                    }
                }
                if let Some(&(slot, _)) = merged.first() {
                    *first = slot;
                }
                self.thicknesses = merged.into_iter().map(|(_, d)| d).collect();
            }
        }
        let removed = before - self.thicknesses.len();
        if removed > 0 {
            self.outdate();
        }
        removed
    }

    /// $\sum_j \operatorname{Re}(n_j)\,d_j$ at `wavelength`.
    pub fn optical_thickness(&self, wavelength: f64) -> Result<f64, FilmError> {
        let n = self.layer_indices(&[wavelength])?;
        Ok(n.row(0)
            .iter()
            .zip(&self.thicknesses)
            .map(|(n, d)| n.re * d)
            .sum())
    }

    // ─── Indices ─────────────────────────────────────────────────────────

    /// Layer indices, shape (wavelengths, layers).
    pub fn layer_indices(&self, wavelengths: &[f64]) -> Result<Array2<Complex64>, FilmError> {
        let n_layers = self.layer_count();
        let mut out = Array2::zeros((wavelengths.len(), n_layers));
        match &self.model {
            LayerModel::TwoMaterial { materials, first } => {
                for (i, &wl) in wavelengths.iter().enumerate() {
                    let pair = [materials[0].index(wl)?, materials[1].index(wl)?];
                    for j in 0..n_layers {
                        out[[i, j]] = pair[(first + j) % 2];
                    }
                }
            }
            LayerModel::FreeForm { indices } => {
                for mut row in out.rows_mut() {
                    for (dst, &n) in row.iter_mut().zip(indices) {
                        *dst = Complex64::new(n, 0.0);
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn substrate_indices(&self, wavelengths: &[f64]) -> Result<Array1<Complex64>, FilmError> {
        self.substrate.indices(wavelengths)
    }

    pub fn incidence_indices(&self, wavelengths: &[f64]) -> Result<Array1<Complex64>, FilmError> {
        self.incidence.indices(wavelengths)
    }

    pub fn stack_indices(&self, wavelengths: &[f64]) -> Result<StackIndices, FilmError> {
        Ok(StackIndices {
            layers: self.layer_indices(wavelengths)?,
            substrate: self.substrate_indices(wavelengths)?,
            incidence: self.incidence_indices(wavelengths)?,
        })
    }

    /// Evaluate the current stack without touching the cache.
    pub fn evaluate(
        &self,
        wavelengths: &[f64],
        angle_deg: f64,
        polarisation: PolarisationMix,
    ) -> Result<Spectrum, FilmError> {
        let indices = self.stack_indices(wavelengths)?;
        Ok(tmm::compute_spectrum(
            wavelengths,
            &self.thicknesses,
            &indices,
            angle_deg,
            polarisation,
        ))
    }

    // ─── Spectral configurations ─────────────────────────────────────────

    /// Register an unpolarised configuration. Idempotent.
    pub fn register_spectral_configuration(&mut self, angle_deg: f64, wavelengths: &[f64]) -> ConfigKey {
        self.register_spectral_configuration_with(angle_deg, wavelengths, PolarisationMix::default())
    }

    /// Register a configuration with an explicit polarisation mix.
    ///
    /// If the (angle, wavelengths) pair is already registered, the existing
    /// configuration is kept as is and its key returned.
    pub fn register_spectral_configuration_with(
        &mut self,
        angle_deg: f64,
        wavelengths: &[f64],
        polarisation: PolarisationMix,
    ) -> ConfigKey {
        let key = ConfigKey::new(angle_deg, wavelengths);
        if !self.configs.iter().any(|c| c.key == key) {
            self.configs.push(SpectralConfig {
                angle_deg,
                wavelengths: wavelengths.to_vec(),
                polarisation,
                key: key.clone(),
            });
        }
        key
    }

    pub fn spectral_configurations(&self) -> &[SpectralConfig] {
        &self.configs
    }

    /// Find a configuration.
    ///
    /// With no query the film must hold exactly one configuration. A query
    /// that matches nothing is `NotFound`, even when only one configuration
    /// exists; a query matching several is `Ambiguous`.
    pub fn spectral_configuration(
        &self,
        angle_deg: Option<f64>,
        wavelengths: Option<&[f64]>,
    ) -> Result<&SpectralConfig, FilmError> {
        if self.configs.is_empty() {
            return Err(ConfigurationError::NotFound("film has no spectral configurations".into()).into());
        }
        let mut hits = self.configs.iter().filter(|c| c.matches(angle_deg, wavelengths));
        match (hits.next(), hits.next()) {
            (Some(config), None) => Ok(config),
            (None, _) => Err(ConfigurationError::NotFound(describe_query(angle_deg, wavelengths)).into()),
            (Some(_), Some(_)) => Err(ConfigurationError::Ambiguous(format!(
                "{} configurations registered; specify both angle and wavelengths",
                self.configs.len()
            ))
            .into()),
        }
    }

    /// Remove every configuration matching the given angle or wavelengths.
    pub fn remove_spectral_configuration(
        &mut self,
        angle_deg: Option<f64>,
        wavelengths: Option<&[f64]>,
    ) -> Result<usize, FilmError> {
        if angle_deg.is_none() && wavelengths.is_none() {
            return Err(ConfigurationError::Ambiguous(
                "specify the angle or the wavelengths of the configuration to remove".into(),
            )
            .into());
        }
        let before = self.configs.len();
        let cache = &mut self.cache;
        self.configs.retain(|c| {
            let hit = angle_deg.is_some_and(|a| c.matches(Some(a), None))
                || wavelengths.is_some_and(|w| c.matches(None, Some(w)));
            if hit {
                cache.remove(&c.key);
            }
            !hit
        });
        Ok(before - self.configs.len())
    }

    /// Whether the cached spectrum of `key` reflects the current parameters.
    pub fn is_up_to_date(&self, key: &ConfigKey) -> bool {
        self.cache
            .get(key)
            .is_some_and(|entry| entry.version == self.version)
    }

    /// Spectrum of a registered configuration, recomputed only if outdated.
    pub fn spectrum(&mut self, key: &ConfigKey) -> Result<&Spectrum, FilmError> {
        if !self.is_up_to_date(key) {
            let config = self
                .configs
                .iter()
                .find(|c| &c.key == key)
                .ok_or_else(|| ConfigurationError::NotFound("unregistered configuration key".into()))?;
            log::debug!(
                "recomputing spectrum at {}° over {} wavelengths (version {})",
                config.angle_deg,
                config.wavelengths.len(),
                self.version
            );
            let spectrum = self.evaluate(&config.wavelengths, config.angle_deg, config.polarisation)?;
            self.cache.insert(
                key.clone(),
                CacheEntry {
                    version: self.version,
                    spectrum,
                },
            );
        }
        Ok(&self.cache[key].spectrum)
    }

    /// Spectrum of the configuration selected by
    /// [`spectral_configuration`](Self::spectral_configuration).
    pub fn spectrum_at(
        &mut self,
        angle_deg: Option<f64>,
        wavelengths: Option<&[f64]>,
    ) -> Result<&Spectrum, FilmError> {
        let key = self.spectral_configuration(angle_deg, wavelengths)?.key.clone();
        self.spectrum(&key)
    }

    /// Bring every registered configuration up to date.
    pub fn calculate_all_spectra(&mut self) -> Result<(), FilmError> {
        let keys: Vec<ConfigKey> = self.configs.iter().map(|c| c.key.clone()).collect();
        for key in &keys {
            self.spectrum(key)?;
        }
        Ok(())
    }
}

fn validate_thicknesses(thicknesses: &[f64], expected: usize) -> Result<(), FilmError> {
    if thicknesses.len() != expected {
        return Err(ConfigurationError::LengthMismatch {
            what: "thicknesses".into(),
            expected,
            got: thicknesses.len(),
        }
        .into());
    }
    if thicknesses.is_empty() {
        return Err(FilmError::DomainViolation("film needs at least one layer".into()));
    }
    if let Some(i) = thicknesses.iter().position(|&d| d < 0.0) {
        return Err(FilmError::DomainViolation(format!(
            "layer {i} would have negative thickness {}",
            thicknesses[i]
        )));
    }
    if thicknesses.iter().all(|&d| d == 0.0) {
        return Err(FilmError::DomainViolation(
            "update would leave every layer at zero thickness".into(),
        ));
    }
    Ok(())
}

fn describe_query(angle_deg: Option<f64>, wavelengths: Option<&[f64]>) -> String {
    let angle = angle_deg.map_or("any angle".to_string(), |a| format!("{a}°"));
    let wls = wavelengths.map_or("any wavelengths".to_string(), |w| format!("{} wavelengths", w.len()));
    format!("no configuration at {angle} with {wls}")
}
