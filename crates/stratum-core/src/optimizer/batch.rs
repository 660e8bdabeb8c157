//! Mini-batch selection and stacking of residuals and Jacobians.
//!
//! A batch lists, for each selected target, the wavelength rows to use. The
//! stacked residual holds one block per selected target, reflectance rows
//! first and transmittance rows second; the Jacobian rows line up with it
//! exactly.
//!
//! Material indices are sampled once per target grid into a [`TargetIndices`]
//! table. Only free-form layer columns change with the parameters, and those
//! are rewritten in place without any material lookup.

use ndarray::{s, Array2};
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::seq::index;

use super::Parameterization;
use crate::error::{ConfigurationError, FilmError};
use crate::film::{Film, LayerModel};
use crate::tmm;
use crate::types::{StackIndices, TargetSpectrum};

/// Selected wavelength rows of one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub target: usize,
    pub rows: Vec<usize>,
}

impl BatchEntry {
    /// Residual rows contributed by this entry (R and T).
    pub fn n_rows(&self) -> usize {
        2 * self.rows.len()
    }
}

/// Choose up to `amount` of `0..len` in ascending order. Takes everything,
/// without touching the generator, when `amount` covers the range.
fn choose(rng: &mut StdRng, len: usize, amount: Option<usize>) -> Vec<usize> {
    match amount {
        Some(k) if k < len => {
            let mut picked = index::sample(rng, len, k).into_vec();
            picked.sort_unstable();
            picked
        }
        _ => (0..len).collect(),
    }
}

/// Draw the targets and wavelengths used for one step.
pub fn select(
    rng: &mut StdRng,
    targets: &[TargetSpectrum],
    batch_size_spec: Option<usize>,
    batch_size_wl: Option<usize>,
) -> Vec<BatchEntry> {
    choose(rng, targets.len(), batch_size_spec)
        .into_iter()
        .map(|t| BatchEntry {
            target: t,
            rows: choose(rng, targets[t].n_wavelengths(), batch_size_wl),
        })
        .collect()
}

/// Every wavelength of every target.
pub fn full(targets: &[TargetSpectrum]) -> Vec<BatchEntry> {
    targets
        .iter()
        .enumerate()
        .map(|(t, target)| BatchEntry {
            target: t,
            rows: (0..target.n_wavelengths()).collect(),
        })
        .collect()
}

/// Stack indices of a film on every target grid, one table per target.
#[derive(Debug, Clone)]
pub struct TargetIndices {
    tables: Vec<StackIndices>,
}

impl TargetIndices {
    pub fn new(film: &Film, targets: &[TargetSpectrum]) -> Result<Self, FilmError> {
        let tables = targets
            .iter()
            .map(|t| film.stack_indices(&t.wavelengths))
            .collect::<Result<_, _>>()?;
        Ok(Self { tables })
    }

    /// Copy the film's current free-form indices into every table.
    /// Two-material layer columns never change and are left alone.
    pub fn refresh_layers(&mut self, film: &Film) {
        let LayerModel::FreeForm { indices } = film.model() else {
            return;
        };
        for table in &mut self.tables {
            for mut row in table.layers.rows_mut() {
                for (dst, &n) in row.iter_mut().zip(indices) {
                    *dst = Complex64::new(n, 0.0);
                }
            }
        }
    }

    pub fn get(&self, target: usize) -> &StackIndices {
        &self.tables[target]
    }
}

/// Stacked residual `spectrum − target` over `batch`.
pub fn residual(
    film: &Film,
    targets: &[TargetSpectrum],
    indices: &TargetIndices,
    batch: &[BatchEntry],
) -> Result<Vec<f64>, FilmError> {
    let total: usize = batch.iter().map(BatchEntry::n_rows).sum();
    let mut f = vec![0.0; total];
    let mut offset = 0;
    for entry in batch {
        let rows = entry.n_rows();
        fill_block(
            film,
            &targets[entry.target],
            indices.get(entry.target),
            entry,
            &mut f[offset..offset + rows],
        )?;
        offset += rows;
    }
    Ok(f)
}

/// Stacked residual and the matching Jacobian, one column per free parameter.
pub fn residual_and_jacobian<P: Parameterization + ?Sized>(
    parameterization: &P,
    film: &Film,
    targets: &[TargetSpectrum],
    indices: &TargetIndices,
    batch: &[BatchEntry],
) -> Result<(Vec<f64>, Array2<f64>), FilmError> {
    let total: usize = batch.iter().map(BatchEntry::n_rows).sum();
    let mut f = vec![0.0; total];
    let mut jac = Array2::zeros((total, film.layer_count()));
    let mut offset = 0;
    for entry in batch {
        let target = &targets[entry.target];
        let rows = entry.n_rows();
        let (wavelengths, sampled) = fill_block(
            film,
            target,
            indices.get(entry.target),
            entry,
            &mut f[offset..offset + rows],
        )?;
        parameterization.jacobian(
            jac.slice_mut(s![offset..offset + rows, ..]),
            &wavelengths,
            film.thicknesses(),
            &sampled,
            target.angle_deg,
            target.polarisation,
        );
        offset += rows;
    }
    Ok((f, jac))
}

/// Write one `[R − R_t; T − T_t]` block and return the batch wavelengths
/// with the indices sampled on them.
fn fill_block(
    film: &Film,
    target: &TargetSpectrum,
    all: &StackIndices,
    entry: &BatchEntry,
    block: &mut [f64],
) -> Result<(Vec<f64>, StackIndices), FilmError> {
    if all.n_layers() != film.layer_count() {
        return Err(ConfigurationError::LengthMismatch {
            what: "cached layer indices".into(),
            expected: film.layer_count(),
            got: all.n_layers(),
        }
        .into());
    }
    let indices = if entry.rows.len() == target.n_wavelengths() {
        all.clone()
    } else {
        all.select_wavelengths(&entry.rows)
    };
    let wavelengths: Vec<f64> = entry.rows.iter().map(|&i| target.wavelengths[i]).collect();
    tmm::compute_spectrum_into(
        block,
        &wavelengths,
        film.thicknesses(),
        &indices,
        target.angle_deg,
        target.polarisation,
    );
    let n = wavelengths.len();
    for (k, &i) in entry.rows.iter().enumerate() {
        block[k] -= target.reflectance[i];
        block[n + k] -= target.transmittance[i];
    }
    Ok((wavelengths, indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PolarisationMix;
    use rand::SeedableRng;

    fn target(n: usize) -> TargetSpectrum {
        TargetSpectrum {
            angle_deg: 0.0,
            wavelengths: (0..n).map(|i| 500.0 + 10.0 * i as f64).collect(),
            reflectance: vec![0.0; n],
            transmittance: vec![1.0; n],
            polarisation: PolarisationMix::default(),
        }
    }

    #[test]
    fn test_default_batch_takes_everything_in_order() {
        let targets = vec![target(4), target(2)];
        let mut rng = StdRng::seed_from_u64(7);
        let batch = select(&mut rng, &targets, None, None);
        assert_eq!(batch, full(&targets));
    }

    #[test]
    fn test_batch_sizes_are_respected() {
        let targets = vec![target(10), target(10), target(10)];
        let mut rng = StdRng::seed_from_u64(7);
        let batch = select(&mut rng, &targets, Some(2), Some(3));
        assert_eq!(batch.len(), 2);
        for entry in &batch {
            assert_eq!(entry.rows.len(), 3);
            assert!(entry.rows.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_same_seed_same_batch() {
        let targets = vec![target(50)];
        let a = select(&mut StdRng::seed_from_u64(3), &targets, None, Some(5));
        let b = select(&mut StdRng::seed_from_u64(3), &targets, None, Some(5));
        assert_eq!(a, b);
    }

    #[test]
    fn test_refreshed_indices_follow_free_form_updates() {
        let registry = stratum_materials::MaterialRegistry::with_defaults().unwrap();
        let mut film = Film::free_form(&registry, vec![1.4, 2.1, 1.6], 300.0, "SiO2", "Air").unwrap();
        let targets = vec![target(5), target(3)];
        let mut indices = TargetIndices::new(&film, &targets).unwrap();

        film.set_parameters(&[1.5, 1.9, 2.3]).unwrap();
        indices.refresh_layers(&film);
        for (t, target) in targets.iter().enumerate() {
            let fresh = film.stack_indices(&target.wavelengths).unwrap();
            assert_eq!(indices.get(t).layers, fresh.layers);
            assert_eq!(indices.get(t).substrate, fresh.substrate);
        }

        let f = residual(&film, &targets, &indices, &full(&targets)).unwrap();
        let s = film.evaluate(&targets[1].wavelengths, 0.0, PolarisationMix::default()).unwrap();
        let tail = &f[10..];
        assert_eq!(tail[..3], s.reflectance[..]);
        for (got, t) in tail[3..].iter().zip(&s.transmittance) {
            assert_eq!(*got, t - 1.0);
        }
    }
}
