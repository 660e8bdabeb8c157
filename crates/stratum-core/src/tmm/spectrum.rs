//! Forward reflectance/transmittance of a stack.

use ndarray::ArrayView1;
use num_complex::Complex64;
use rayon::prelude::*;

use super::matrix::Mat2;
use super::{Incidence, Mode};
use crate::types::{PolarisationMix, Spectrum, StackIndices};

/// Power reflectance and transmittance at a single wavelength.
///
/// Zero-thickness layers contribute an identity matrix and therefore drop
/// out of the product.
pub fn power_coefficients(
    wavelength: f64,
    thicknesses: &[f64],
    layers: ArrayView1<'_, Complex64>,
    n_sub: Complex64,
    n_inc: Complex64,
    angle_rad: f64,
    polarisation: PolarisationMix,
) -> (f64, f64) {
    let mut r = 0.0;
    let mut t = 0.0;
    for (mode, weight) in Mode::weighted(polarisation) {
        let inc = Incidence::new(wavelength, n_inc, n_sub, angle_rad, mode);
        let total = inc
            .layers(layers, thicknesses, mode)
            .iter()
            .fold(Mat2::identity(), |acc, layer| acc * layer.matrix());
        let (r_mode, t_mode) = inc.power(total.apply(inc.exit_vector()));
        r += weight * r_mode;
        t += weight * t_mode;
    }
    (r, t)
}

/// Reflectance and transmittance of the stack on `wavelengths`.
///
/// # Arguments
/// * `wavelengths` - Evaluation grid, same length unit as `thicknesses`.
/// * `thicknesses` - One entry per layer, incidence side first.
/// * `indices` - Complex indices sampled on `wavelengths`.
/// * `angle_deg` - Incidence angle in the incidence medium (degrees).
/// * `polarisation` - s/p weighting of the output.
pub fn compute_spectrum(
    wavelengths: &[f64],
    thicknesses: &[f64],
    indices: &StackIndices,
    angle_deg: f64,
    polarisation: PolarisationMix,
) -> Spectrum {
    let mut stacked = vec![0.0; 2 * wavelengths.len()];
    compute_spectrum_into(
        &mut stacked,
        wavelengths,
        thicknesses,
        indices,
        angle_deg,
        polarisation,
    );
    Spectrum::from_stacked(wavelengths.to_vec(), &stacked)
}

/// Write `[R(λ_0)…R(λ_n), T(λ_0)…T(λ_n)]` into `out`.
///
/// Wavelengths are evaluated in parallel; the output does not depend on
/// scheduling.
pub fn compute_spectrum_into(
    out: &mut [f64],
    wavelengths: &[f64],
    thicknesses: &[f64],
    indices: &StackIndices,
    angle_deg: f64,
    polarisation: PolarisationMix,
) {
    let n_wl = wavelengths.len();
    assert_eq!(out.len(), 2 * n_wl, "output must hold R and T per wavelength");
    assert_eq!(indices.n_wavelengths(), n_wl, "indices must be sampled on the wavelength grid");
    assert_eq!(indices.n_layers(), thicknesses.len(), "one index column per layer");

    let angle_rad = angle_deg.to_radians();
    let rt: Vec<(f64, f64)> = (0..n_wl)
        .into_par_iter()
        .map(|i| {
            power_coefficients(
                wavelengths[i],
                thicknesses,
                indices.layers.row(i),
                indices.substrate[i],
                indices.incidence[i],
                angle_rad,
                polarisation,
            )
        })
        .collect();

    let (r_out, t_out) = out.split_at_mut(n_wl);
    for (i, (r, t)) in rt.into_iter().enumerate() {
        r_out[i] = r;
        t_out[i] = t;
    }
}

/// Reflectance only.
pub fn reflectance(
    wavelengths: &[f64],
    thicknesses: &[f64],
    indices: &StackIndices,
    angle_deg: f64,
    polarisation: PolarisationMix,
) -> Vec<f64> {
    compute_spectrum(wavelengths, thicknesses, indices, angle_deg, polarisation).reflectance
}

/// Transmittance only.
pub fn transmittance(
    wavelengths: &[f64],
    thicknesses: &[f64],
    indices: &StackIndices,
    angle_deg: f64,
    polarisation: PolarisationMix,
) -> Vec<f64> {
    compute_spectrum(wavelengths, thicknesses, indices, angle_deg, polarisation).transmittance
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{Array1, Array2};

    fn uniform_indices(n_wl: usize, layers: &[Complex64], sub: f64, inc: f64) -> StackIndices {
        let mut arr = Array2::zeros((n_wl, layers.len()));
        for mut row in arr.rows_mut() {
            for (dst, &n) in row.iter_mut().zip(layers) {
                *dst = n;
            }
        }
        StackIndices {
            layers: arr,
            substrate: Array1::from_elem(n_wl, Complex64::new(sub, 0.0)),
            incidence: Array1::from_elem(n_wl, Complex64::new(inc, 0.0)),
        }
    }

    #[test]
    fn test_bare_interface_matches_fresnel() {
        // No layers: R = ((n0 - n1)/(n0 + n1))^2 at normal incidence.
        let indices = uniform_indices(1, &[], 1.5, 1.0);
        let s = compute_spectrum(&[550.0], &[], &indices, 0.0, PolarisationMix::default());
        assert_abs_diff_eq!(s.reflectance[0], 0.04, epsilon = 1e-12);
        assert_abs_diff_eq!(s.transmittance[0], 0.96, epsilon = 1e-12);
    }

    #[test]
    fn test_quarter_wave_antireflection() {
        // n1 = sqrt(n0 n_sub), n1 d = λ/4 gives zero reflectance.
        let n1 = 1.5_f64.sqrt();
        let wl = 600.0;
        let d = wl / (4.0 * n1);
        let indices = uniform_indices(1, &[Complex64::new(n1, 0.0)], 1.5, 1.0);
        let s = compute_spectrum(&[wl], &[d], &indices, 0.0, PolarisationMix::s());
        assert_abs_diff_eq!(s.reflectance[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_brewster_angle_p_reflectance_vanishes() {
        let n_sub = 1.5_f64;
        let brewster = n_sub.atan().to_degrees();
        let indices = uniform_indices(1, &[], n_sub, 1.0);
        let r = reflectance(&[500.0], &[], &indices, brewster, PolarisationMix::p());
        assert_abs_diff_eq!(r[0], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_thickness_layer_is_transparent_to_the_result() {
        let layers = [Complex64::new(2.3, 0.0), Complex64::new(1.46, 0.0)];
        let wls = [480.0, 630.0];
        let with_gap = uniform_indices(2, &layers, 1.52, 1.0);
        let without = uniform_indices(2, &layers[1..], 1.52, 1.0);
        let a = compute_spectrum(&wls, &[0.0, 120.0], &with_gap, 25.0, PolarisationMix::default());
        let b = compute_spectrum(&wls, &[120.0], &without, 25.0, PolarisationMix::default());
        for i in 0..wls.len() {
            assert_abs_diff_eq!(a.reflectance[i], b.reflectance[i], epsilon = 1e-14);
            assert_abs_diff_eq!(a.transmittance[i], b.transmittance[i], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_absorbing_layer_loses_energy() {
        let indices = uniform_indices(1, &[Complex64::new(0.2, 3.0)], 1.5, 1.0);
        let s = compute_spectrum(&[600.0], &[20.0], &indices, 10.0, PolarisationMix::default());
        let sum = s.reflectance[0] + s.transmittance[0];
        assert!(sum < 1.0 && sum > 0.0, "R + T = {sum}");
    }
}
