//! Root-mean-square losses between spectra.

use crate::error::{ConfigurationError, FilmError};
use crate::film::Film;
use crate::optimizer::batch;
use crate::types::TargetSpectrum;

/// $\sqrt{\frac1N \sum_i f_i^2}$. Zero for an empty residual.
pub fn rms(residual: &[f64]) -> f64 {
    if residual.is_empty() {
        return 0.0;
    }
    (residual.iter().map(|f| f * f).sum::<f64>() / residual.len() as f64).sqrt()
}

/// RMS of the full reflectance and transmittance residual of `film` against
/// every target.
pub fn rms_against_targets(film: &Film, targets: &[TargetSpectrum]) -> Result<f64, FilmError> {
    let indices = batch::TargetIndices::new(film, targets)?;
    let f = batch::residual(film, targets, &indices, &batch::full(targets))?;
    Ok(rms(&f))
}

/// RMS between the spectra of two films over every configuration of `a`.
///
/// Each configuration of `a` must also be registered on `b`.
pub fn rms_between_films(a: &mut Film, b: &mut Film) -> Result<f64, FilmError> {
    let configs = a.spectral_configurations().to_vec();
    if configs.is_empty() {
        return Err(ConfigurationError::NotFound("film has no spectral configurations".into()).into());
    }
    let mut residual = Vec::new();
    for config in &configs {
        let key_b = b
            .spectral_configuration(Some(config.angle_deg), Some(config.wavelengths.as_slice()))?
            .key()
            .clone();
        let sa = a.spectrum(config.key())?.stacked();
        let sb = b.spectrum(&key_b)?;
        residual.extend(sa.iter().zip(sb.stacked()).map(|(x, y)| x - y));
    }
    Ok(rms(&residual))
}
