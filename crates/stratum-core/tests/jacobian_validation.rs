//! Analytic Jacobians against central finite differences.
//!
//! The discrepancy of a central difference with step h is O(h²) truncation
//! plus O(ε/h) cancellation, so the comparison uses a tolerance relative to
//! the derivative scale rather than exact equality.

use ndarray::Array2;
use stratum_core::film::Film;
use stratum_core::tmm::{jacobian_wrt_index, jacobian_wrt_thickness};
use stratum_core::{linspace, PolarisationMix};
use stratum_materials::MaterialRegistry;

fn registry() -> MaterialRegistry {
    MaterialRegistry::with_defaults().expect("built-in materials")
}

fn analytic(film: &Film, wls: &[f64], angle: f64, pol: PolarisationMix) -> Array2<f64> {
    let indices = film.stack_indices(wls).unwrap();
    let mut jac = Array2::zeros((2 * wls.len(), film.layer_count()));
    if film.is_free_form() {
        jacobian_wrt_index(jac.view_mut(), wls, film.thicknesses(), &indices, angle, pol);
    } else {
        jacobian_wrt_thickness(jac.view_mut(), wls, film.thicknesses(), &indices, angle, pol);
    }
    jac
}

fn central_difference(film: &Film, wls: &[f64], angle: f64, pol: PolarisationMix, h: f64) -> Array2<f64> {
    let x0 = film.parameters();
    let mut probe = film.clone();
    let mut jac = Array2::zeros((2 * wls.len(), x0.len()));
    for j in 0..x0.len() {
        let mut plus = x0.clone();
        let mut minus = x0.clone();
        plus[j] += h;
        minus[j] -= h;
        probe.set_parameters(&plus).unwrap();
        let sp = probe.evaluate(wls, angle, pol).unwrap().stacked();
        probe.set_parameters(&minus).unwrap();
        let sm = probe.evaluate(wls, angle, pol).unwrap().stacked();
        for row in 0..sp.len() {
            jac[[row, j]] = (sp[row] - sm[row]) / (2.0 * h);
        }
    }
    jac
}

/// Largest |analytic − fd| relative to the largest |analytic| entry.
fn relative_discrepancy(a: &Array2<f64>, fd: &Array2<f64>) -> f64 {
    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1e-30);
    a.iter()
        .zip(fd.iter())
        .fold(0.0_f64, |m, (x, y)| m.max((x - y).abs()))
        / scale
}

// ─────────────────────────────────────────────────────────────────────────────
// Thickness mode
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_thickness_jacobian_matches_finite_difference() {
    let film = Film::two_material(
        &registry(),
        "SiO2",
        "TiO2",
        "SiO2",
        vec![112.0, 54.0, 98.0, 71.0, 130.0, 60.0],
        "Air",
    )
    .unwrap();
    let wls = linspace(480.0, 950.0, 25);

    eprintln!("{:>6} {:>10} {:>12}", "angle", "h", "rel. err");
    for &angle in &[0.0, 35.0, 70.0] {
        let pol = PolarisationMix::unpolarised();
        let jac = analytic(&film, &wls, angle, pol);
        for &h in &[1e-2, 1e-3, 1e-4] {
            let err = relative_discrepancy(&jac, &central_difference(&film, &wls, angle, pol, h));
            eprintln!("{angle:6.1} {h:10.0e} {err:12.3e}");
            assert!(err < 1e-3, "angle {angle}, h {h}: relative error {err:.3e}");
        }
    }
}

#[test]
fn test_thickness_jacobian_with_single_polarisation() {
    let film = Film::two_material(&registry(), "TiO2", "SiO2", "SiO2", vec![60.0, 140.0, 60.0], "Air").unwrap();
    let wls = [520.0, 633.0, 780.0];
    for pol in [PolarisationMix::s(), PolarisationMix::p()] {
        let jac = analytic(&film, &wls, 55.0, pol);
        let fd = central_difference(&film, &wls, 55.0, pol, 1e-3);
        assert!(relative_discrepancy(&jac, &fd) < 1e-5);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Free-form index mode
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_index_jacobian_matches_finite_difference() {
    let film = Film::free_form(&registry(), vec![1.45, 2.3, 1.8, 2.05, 1.6], 800.0, "SiO2", "Air").unwrap();
    let wls = linspace(500.0, 900.0, 17);

    eprintln!("{:>6} {:>10} {:>12}", "angle", "h", "rel. err");
    for &angle in &[0.0, 45.0] {
        let pol = PolarisationMix::unpolarised();
        let jac = analytic(&film, &wls, angle, pol);
        for &h in &[1e-4, 1e-5, 1e-6] {
            let err = relative_discrepancy(&jac, &central_difference(&film, &wls, angle, pol, h));
            eprintln!("{angle:6.1} {h:10.0e} {err:12.3e}");
            assert!(err < 1e-3, "angle {angle}, h {h}: relative error {err:.3e}");
        }
    }
}

#[test]
fn test_index_jacobian_p_polarisation_near_brewster() {
    let film = Film::free_form(&registry(), vec![1.5, 2.0], 250.0, "SiO2", "Air").unwrap();
    let wls = [600.0];
    let pol = PolarisationMix::p();
    let jac = analytic(&film, &wls, 56.0, pol);
    let fd = central_difference(&film, &wls, 56.0, pol, 1e-5);
    assert!(relative_discrepancy(&jac, &fd) < 1e-4);
}

// ─────────────────────────────────────────────────────────────────────────────
// Energy conservation of derivatives
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_lossless_reflectance_and_transmittance_derivatives_cancel() {
    let thickness_film =
        Film::two_material(&registry(), "SiO2", "TiO2", "SiO2", vec![90.0, 65.0, 90.0, 65.0], "Air").unwrap();
    let index_film = Film::free_form(&registry(), vec![1.4, 2.1, 1.7], 450.0, "SiO2", "Air").unwrap();
    let wls = linspace(500.0, 800.0, 31);

    for film in [&thickness_film, &index_film] {
        for &angle in &[0.0, 40.0] {
            let jac = analytic(film, &wls, angle, PolarisationMix::unpolarised());
            let n = wls.len();
            for i in 0..n {
                for j in 0..film.layer_count() {
                    let (d_r, d_t) = (jac[[i, j]], jac[[n + i, j]]);
                    assert!(
                        (d_r + d_t).abs() <= 1e-10 * (1.0 + d_r.abs()),
                        "dR = {d_r}, dT = {d_t} at wavelength {i}, layer {j}"
                    );
                }
            }
        }
    }
}
