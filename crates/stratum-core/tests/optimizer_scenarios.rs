//! End-to-end optimizer runs.

use stratum_core::film::Film;
use stratum_core::loss::rms_against_targets;
use stratum_core::optimizer::{AdamOptimizer, AdamOptions};
use stratum_core::{linspace, ConfigurationError, FilmError, PolarisationMix, TargetSpectrum};
use stratum_materials::MaterialRegistry;

fn registry() -> MaterialRegistry {
    MaterialRegistry::with_defaults().expect("built-in materials")
}

fn ten_layer_film() -> Film {
    let d = vec![98.0, 61.0, 102.0, 58.0, 95.0, 64.0, 100.0, 60.0, 97.0, 63.0];
    Film::two_material(&registry(), "SiO2", "TiO2", "SiO2", d, "Air").unwrap()
}

fn target_of(film: &Film, angle: f64, wls: &[f64]) -> TargetSpectrum {
    let pol = PolarisationMix::default();
    TargetSpectrum::new(angle, film.evaluate(wls, angle, pol).unwrap(), pol)
}

// ─────────────────────────────────────────────────────────────────────────────
// Thickness mode
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_own_spectrum_is_a_fixed_point() {
    let mut film = ten_layer_film();
    let initial = film.parameters();
    let wls = linspace(500.0, 900.0, 81);
    let targets = vec![target_of(&film, 0.0, &wls), target_of(&film, 30.0, &wls)];

    let options = AdamOptions {
        record: true,
        ..Default::default()
    };
    let mut opt = AdamOptimizer::thickness(&mut film, targets.clone(), 5, options).unwrap();
    let trace = opt.optimize().unwrap();

    assert_eq!(trace.len(), 6);
    for (step, loss) in trace.losses.iter().enumerate() {
        assert!(*loss < 1e-12, "step {step}: loss {loss}");
    }
    assert_eq!(film.parameters(), initial);
    assert!(rms_against_targets(&film, &targets).unwrap() < 1e-12);
}

#[test]
fn test_thickness_optimizer_reduces_loss() {
    let reference = ten_layer_film();
    let wls = linspace(500.0, 900.0, 81);
    let targets = vec![target_of(&reference, 0.0, &wls)];

    let start: Vec<f64> = reference.parameters().iter().map(|d| d + 3.0).collect();
    let mut film = reference.clone();
    film.set_parameters(&start).unwrap();
    let before = rms_against_targets(&film, &targets).unwrap();

    let options = AdamOptions {
        alpha: Some(0.2),
        record: true,
        ..Default::default()
    };
    let mut opt = AdamOptimizer::thickness(&mut film, targets.clone(), 60, options).unwrap();
    let trace = opt.optimize().unwrap();
    let after = rms_against_targets(&film, &targets).unwrap();

    eprintln!("loss {before:.4e} -> {after:.4e} after {} steps", trace.len() - 1);
    assert!(after < before);
    assert_eq!(Some(after), trace.best().map(|(_, l)| l));
}

#[test]
fn test_mini_batches_are_reproducible() {
    let reference = ten_layer_film();
    let wls = linspace(500.0, 900.0, 81);
    let targets = vec![target_of(&reference, 0.0, &wls), target_of(&reference, 45.0, &wls)];
    let start: Vec<f64> = reference.parameters().iter().map(|d| d - 2.0).collect();

    let run = || {
        let mut film = reference.clone();
        film.set_parameters(&start).unwrap();
        let options = AdamOptions {
            alpha: Some(0.1),
            batch_size_spec: Some(1),
            batch_size_wl: Some(10),
            record: true,
            seed: 42,
            ..Default::default()
        };
        let mut opt = AdamOptimizer::thickness(&mut film, targets.clone(), 10, options).unwrap();
        opt.optimize().unwrap()
    };
    let (a, b) = (run(), run());
    assert_eq!(a.parameters, b.parameters);
    assert_eq!(a.losses, b.losses);
}

#[test]
fn test_patience_exhaustion_restores_best_parameters() {
    // A single step of ±50 nm overshoots a target 2 nm away.
    let mut film = ten_layer_film();
    let initial = film.parameters();
    let mut shifted = film.clone();
    let goal: Vec<f64> = initial.iter().map(|d| d + 2.0).collect();
    shifted.set_parameters(&goal).unwrap();
    let wls = linspace(500.0, 900.0, 81);
    let targets = vec![target_of(&shifted, 0.0, &wls)];

    let options = AdamOptions {
        alpha: Some(50.0),
        patience: Some(1),
        record: true,
        ..Default::default()
    };
    let mut opt = AdamOptimizer::thickness(&mut film, targets, 20, options).unwrap();
    let trace = opt.optimize().unwrap();

    assert_eq!(trace.len(), 2, "stopped after the first non-improving step");
    assert!(trace.losses[1] > trace.losses[0]);
    assert_ne!(trace.parameters[1], initial);
    assert_eq!(film.parameters(), initial);
}

#[test]
fn test_failed_step_restores_best_parameters() {
    // Steps of ~90 nm drive a 150 nm layer towards 5 nm and then through zero.
    let registry = registry();
    let mut film = Film::two_material(&registry, "TiO2", "SiO2", "SiO2", vec![150.0], "Air").unwrap();
    let mut thin = film.clone();
    thin.set_parameters(&[5.0]).unwrap();
    let wls = linspace(400.0, 800.0, 41);
    let targets = vec![target_of(&thin, 0.0, &wls)];
    let before = rms_against_targets(&film, &targets).unwrap();

    let options = AdamOptions {
        alpha: Some(90.0),
        ..Default::default()
    };
    let mut opt = AdamOptimizer::thickness(&mut film, targets.clone(), 20, options).unwrap();
    let err = opt.optimize().unwrap_err();
    assert!(matches!(err, FilmError::DomainViolation(_)), "{err}");

    let after = rms_against_targets(&film, &targets).unwrap();
    eprintln!("film left at {:?}: loss {before:.4e} -> {after:.4e}", film.parameters());
    assert!(after <= before);
    assert!(film.parameters()[0] > 0.0);
}

#[test]
fn test_non_finite_losses_are_recorded_and_burn_patience() {
    // p-polarised light at grazing incidence has a zero normal index in the
    // incidence medium, so its admittance and every loss are NaN.
    let mut film = ten_layer_film();
    let initial = film.parameters();
    let wls = linspace(500.0, 700.0, 11);
    let target = TargetSpectrum {
        angle_deg: 90.0,
        reflectance: vec![0.5; wls.len()],
        transmittance: vec![0.5; wls.len()],
        wavelengths: wls,
        polarisation: PolarisationMix::p(),
    };

    let options = AdamOptions {
        patience: Some(3),
        record: true,
        ..Default::default()
    };
    let mut opt = AdamOptimizer::thickness(&mut film, vec![target], 20, options).unwrap();
    let trace = opt.optimize().unwrap();

    assert!(trace.losses.iter().any(|l| !l.is_finite()));
    assert!(trace.len() <= 4, "ran {} entries past a patience of 3", trace.len());
    assert!(trace.best().is_none());
    assert_eq!(film.parameters(), initial);
}

// ─────────────────────────────────────────────────────────────────────────────
// Free-form mode
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_free_form_default_lower_bound_is_respected() {
    let reference = Film::free_form(&registry(), vec![1.0, 1.9, 1.1, 2.2, 1.0, 1.7], 900.0, "SiO2", "Air").unwrap();
    let wls = linspace(500.0, 900.0, 41);
    let targets = vec![target_of(&reference, 60.0, &wls)];

    let mut film = reference.clone();
    film.set_parameters(&[1.2, 1.6, 1.3, 1.9, 1.2, 1.5]).unwrap();
    let options = AdamOptions {
        record: true,
        ..Default::default()
    };
    let mut opt = AdamOptimizer::free_form(&mut film, targets, 40, options).unwrap();
    let n_min = opt.parameterization().n_min;
    assert!((n_min - 60_f64.to_radians().sin()).abs() < 1e-12);
    assert_eq!(opt.parameterization().n_max, f64::INFINITY);
    assert_eq!(opt.alpha(), 0.1);

    let trace = opt.optimize().unwrap();
    for (step, snapshot) in trace.parameters.iter().enumerate() {
        for &n in snapshot {
            assert!(n >= n_min, "step {step}: index {n} below {n_min}");
        }
    }
}

#[test]
fn test_free_form_explicit_bounds_clamp_updates() {
    let reference = Film::free_form(&registry(), vec![1.2, 2.6, 1.2, 2.6], 600.0, "SiO2", "Air").unwrap();
    let wls = linspace(500.0, 800.0, 31);
    let targets = vec![target_of(&reference, 0.0, &wls)];

    let mut film = reference.clone();
    film.set_parameters(&[1.6, 2.0, 1.6, 2.0]).unwrap();
    let options = AdamOptions {
        alpha: Some(0.3),
        n_min: Some(1.5),
        n_max: Some(2.1),
        record: true,
        ..Default::default()
    };
    let mut opt = AdamOptimizer::free_form(&mut film, targets, 25, options).unwrap();
    let trace = opt.optimize().unwrap();
    for snapshot in &trace.parameters {
        assert!(snapshot.iter().all(|&n| (1.5..=2.1).contains(&n)));
    }
}

#[test]
fn test_target_with_mismatched_lengths_is_rejected() {
    let mut film = ten_layer_film();
    let mut target = target_of(&film, 0.0, &[550.0, 650.0]);
    target.transmittance.pop();
    let err = AdamOptimizer::thickness(&mut film, vec![target], 5, AdamOptions::default()).err();
    assert!(matches!(
        err,
        Some(FilmError::Configuration(ConfigurationError::LengthMismatch { .. }))
    ));
}
