//! Job runner: ties together materials, the film model and the optimizer.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use num_complex::Complex64;

use stratum_core::film::Film;
use stratum_core::loss::rms_against_targets;
use stratum_core::optimizer::{AdamOptimizer, OptimizationTrace};
use stratum_core::{linspace, PolarisationMix, TargetSpectrum};
use stratum_materials::{ConstantIndex, MaterialRegistry};

use crate::config::{FilmConfig, JobConfig, TargetConfig, WavelengthSpec};

/// Results of an optimization run.
pub struct RunOutput {
    pub film: Film,
    pub targets: Vec<TargetSpectrum>,
    pub trace: OptimizationTrace,
    pub initial_loss: f64,
    pub final_loss: f64,
}

/// Built-in materials plus the job's own constant-index media.
pub fn build_registry(job: &JobConfig) -> Result<MaterialRegistry> {
    let mut registry = MaterialRegistry::with_defaults().context("loading built-in materials")?;
    for m in &job.materials {
        if registry.contains(&m.name) {
            log::warn!("material '{}' overrides a built-in entry", m.name);
        }
        registry.register(
            m.name.clone(),
            Arc::new(ConstantIndex::new(m.name.clone(), Complex64::new(m.n, m.k))),
        );
    }
    Ok(registry)
}

pub fn wavelength_grid(spec: &WavelengthSpec) -> Result<Vec<f64>> {
    let wavelengths = match spec {
        WavelengthSpec::Range { range, points } => linspace(range[0], range[1], *points),
        WavelengthSpec::List { values } => values.clone(),
    };
    if wavelengths.is_empty() {
        bail!("Wavelength grid is empty");
    }
    Ok(wavelengths)
}

pub fn build_film(config: &FilmConfig, registry: &MaterialRegistry) -> Result<Film> {
    let film = match config {
        FilmConfig::TwoMaterial {
            materials,
            thicknesses,
            substrate,
            incidence,
        } => Film::two_material(
            registry,
            &materials[0],
            &materials[1],
            substrate,
            thicknesses.clone(),
            incidence,
        )?,
        FilmConfig::FreeForm {
            indices,
            total_thickness,
            thicknesses,
            substrate,
            incidence,
        } => match (total_thickness, thicknesses) {
            (Some(total), None) => Film::free_form(registry, indices.clone(), *total, substrate, incidence)?,
            (None, Some(d)) => {
                Film::free_form_with_thickness(registry, indices.clone(), d.clone(), substrate, incidence)?
            }
            _ => bail!("free-form film needs exactly one of `total_thickness` or `thicknesses`"),
        },
    };
    Ok(film)
}

/// Resolve every `[[target]]` into a target spectrum.
///
/// Design targets are simulated on a copy of `film` carrying the design
/// parameters.
pub fn build_targets(configs: &[TargetConfig], film: &Film) -> Result<Vec<TargetSpectrum>> {
    configs
        .iter()
        .enumerate()
        .map(|(i, t)| {
            build_target(t, film).with_context(|| format!("target #{} at {}°", i + 1, t.angle))
        })
        .collect()
}

fn build_target(config: &TargetConfig, film: &Film) -> Result<TargetSpectrum> {
    let wavelengths = wavelength_grid(&config.wavelengths)?;
    let polarisation = PolarisationMix {
        s_weight: config.s_weight,
    };
    let target = match (&config.reflectance, &config.transmittance, &config.design) {
        (Some(r), Some(t), None) => TargetSpectrum {
            angle_deg: config.angle,
            wavelengths,
            reflectance: r.clone(),
            transmittance: t.clone(),
            polarisation,
        },
        (None, None, Some(params)) => {
            let mut design = film.clone();
            design.set_parameters(params)?;
            let spectrum = design.evaluate(&wavelengths, config.angle, polarisation)?;
            TargetSpectrum::new(config.angle, spectrum, polarisation)
        }
        _ => bail!("give either `reflectance` and `transmittance`, or `design`"),
    };
    target.validate()?;
    Ok(target)
}

/// Optimize the job's film against its targets.
pub fn run_optimization(job: &JobConfig) -> Result<RunOutput> {
    let registry = build_registry(job)?;
    let mut film = build_film(&job.film, &registry)?;
    let targets = build_targets(&job.targets, &film)?;
    if targets.is_empty() {
        bail!("Job has no [[target]] entries");
    }

    let initial_loss = rms_against_targets(&film, &targets)?;
    println!(
        "  {} layers, {} targets, {} steps",
        film.layer_count(),
        targets.len(),
        job.optimizer.steps
    );
    println!("  Initial RMS: {:.6e}", initial_loss);

    let steps = job.optimizer.steps;
    let options = job.optimizer.adam.clone();
    let trace = if film.is_free_form() {
        AdamOptimizer::free_form(&mut film, targets.clone(), steps, options)?.optimize()?
    } else {
        AdamOptimizer::thickness(&mut film, targets.clone(), steps, options)?.optimize()?
    };

    let final_loss = rms_against_targets(&film, &targets)?;
    println!("  Final RMS:   {:.6e}", final_loss);
    Ok(RunOutput {
        film,
        targets,
        trace,
        initial_loss,
        final_loss,
    })
}

/// Write the loss and parameter trace to a CSV file with a metadata header.
pub fn write_trace_csv(output: &RunOutput, path: &Path, job: &JobConfig) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;

    writeln!(file, "# Stratum: optimization trace")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# film: {}", describe_film(&job.film))?;
    writeln!(file, "# steps: {}", job.optimizer.steps)?;
    writeln!(file, "# initial_rms: {:.6e}", output.initial_loss)?;
    writeln!(file, "# final_rms: {:.6e}", output.final_loss)?;
    writeln!(file, "#")?;

    let n_params = output.trace.parameters.first().map_or(0, Vec::len);
    let columns: Vec<String> = (0..n_params).map(|j| format!("p{j}")).collect();
    writeln!(file, "entry,rms,{}", columns.join(","))?;

    for (i, (params, loss)) in output
        .trace
        .parameters
        .iter()
        .zip(&output.trace.losses)
        .enumerate()
    {
        let values: Vec<String> = params.iter().map(|p| format!("{p:.6}")).collect();
        writeln!(file, "{},{:.6e},{}", i, loss, values.join(","))?;
    }

    println!("Trace written to: {}", path.display());
    Ok(())
}

/// Write the trace to a JSON file.
pub fn write_trace_json(trace: &OptimizationTrace, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(trace)
        .map_err(|e| anyhow::anyhow!("JSON serialisation error: {}", e))?;
    std::fs::write(path, json)?;

    println!("Trace (JSON) written to: {}", path.display());
    Ok(())
}

/// Write the film's spectrum on every target grid, next to the target values
/// when they are known.
///
/// Each target is evaluated with its own polarisation mix, so targets sharing
/// an angle and grid still get their own rows.
pub fn write_spectrum_csv(
    film: &Film,
    targets: &[TargetConfig],
    resolved: Option<&[TargetSpectrum]>,
    path: &Path,
) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(path)?;
    writeln!(file, "# Stratum: reflectance and transmittance")?;
    writeln!(file, "# Version: {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(file, "# layers: {}", film.layer_count())?;
    writeln!(file, "# substrate: {}, incidence: {}", film.substrate().name(), film.incidence().name())?;
    writeln!(file, "#")?;
    writeln!(file, "angle_deg,wavelength_nm,reflectance,transmittance,target_reflectance,target_transmittance")?;

    for (i, config) in targets.iter().enumerate() {
        let wavelengths = wavelength_grid(&config.wavelengths)?;
        let polarisation = PolarisationMix {
            s_weight: config.s_weight,
        };
        let spectrum = film.evaluate(&wavelengths, config.angle, polarisation)?;
        let target = resolved.and_then(|r| r.get(i));
        for (k, &wl) in wavelengths.iter().enumerate() {
            let (tr, tt) = match target {
                Some(t) => (format!("{:.6e}", t.reflectance[k]), format!("{:.6e}", t.transmittance[k])),
                None => (String::new(), String::new()),
            };
            writeln!(
                file,
                "{:.2},{:.4},{:.6e},{:.6e},{},{}",
                config.angle, wl, spectrum.reflectance[k], spectrum.transmittance[k], tr, tt
            )?;
        }
    }

    println!("Spectrum written to: {}", path.display());
    Ok(())
}

pub fn describe_film(config: &FilmConfig) -> String {
    match config {
        FilmConfig::TwoMaterial {
            materials,
            thicknesses,
            substrate,
            incidence,
        } => format!(
            "{} | ({}/{}) x {} layers | {}",
            incidence,
            materials[0],
            materials[1],
            thicknesses.len(),
            substrate
        ),
        FilmConfig::FreeForm {
            indices,
            substrate,
            incidence,
            ..
        } => format!("{} | free-form x {} layers | {}", incidence, indices.len(), substrate),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const JOB: &str = r#"
        [film]
        kind = "two_material"
        materials = ["SiO2", "TiO2"]
        thicknesses = [95.0, 60.0, 95.0, 60.0]

        [[target]]
        angle = 0.0
        wavelengths = { range = [500.0, 800.0], points = 31 }
        design = [100.0, 62.0, 100.0, 62.0]

        [optimizer]
        steps = 30
        alpha = 0.5
        record = true
    "#;

    #[test]
    fn test_design_target_run_improves_fit() {
        let job = parse_config(JOB).unwrap();
        let out = run_optimization(&job).unwrap();
        assert!(out.final_loss < out.initial_loss);
        assert_eq!(out.trace.parameters[0], vec![95.0, 60.0, 95.0, 60.0]);
    }

    #[test]
    fn test_custom_material_is_registered() {
        let job = parse_config(
            r#"
            [film]
            kind = "two_material"
            materials = ["MgF2", "TiO2"]
            thicknesses = [100.0]

            [[material]]
            name = "MgF2"
            n = 1.38
            "#,
        )
        .unwrap();
        let registry = build_registry(&job).unwrap();
        let n = registry.lookup("MgF2", 600.0).unwrap();
        assert_eq!(n, Complex64::new(1.38, 0.0));
        assert!(build_film(&job.film, &registry).is_ok());
    }

    #[test]
    fn test_target_without_data_is_rejected() {
        let job = parse_config(
            r#"
            [film]
            kind = "two_material"
            materials = ["SiO2", "TiO2"]
            thicknesses = [100.0]

            [[target]]
            wavelengths = { values = [550.0] }
            "#,
        )
        .unwrap();
        let film = build_film(&job.film, &build_registry(&job).unwrap()).unwrap();
        assert!(build_targets(&job.targets, &film).is_err());
    }

    #[test]
    fn test_spectrum_csv_keeps_each_target_polarisation() {
        let job = parse_config(
            r#"
            [film]
            kind = "two_material"
            materials = ["SiO2", "TiO2"]
            thicknesses = [100.0, 60.0]

            [[target]]
            angle = 60.0
            wavelengths = { values = [600.0] }
            s_weight = 1.0
            design = [100.0, 60.0]

            [[target]]
            angle = 60.0
            wavelengths = { values = [600.0] }
            s_weight = 0.0
            design = [100.0, 60.0]
            "#,
        )
        .unwrap();
        let film = build_film(&job.film, &build_registry(&job).unwrap()).unwrap();
        let targets = build_targets(&job.targets, &film).unwrap();
        assert!((targets[0].reflectance[0] - targets[1].reflectance[0]).abs() > 1e-3);

        let path = std::env::temp_dir()
            .join(format!("stratum-spectrum-{}", std::process::id()))
            .join("spectrum.csv");
        write_spectrum_csv(&film, &job.targets, Some(targets.as_slice()), &path).unwrap();
        let csv = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_dir_all(path.parent().unwrap());

        let rows: Vec<Vec<f64>> = csv
            .lines()
            .filter(|l| !l.starts_with('#') && !l.starts_with("angle"))
            .map(|l| l.split(',').map(|v| v.parse().unwrap()).collect())
            .collect();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            // The film is its own design, so each row matches its target.
            assert!((row[2] - row[4]).abs() < 1e-6, "R {} vs target {}", row[2], row[4]);
            assert!((row[3] - row[5]).abs() < 1e-6, "T {} vs target {}", row[3], row[5]);
        }
    }

    #[test]
    fn test_free_form_needs_one_thickness_source() {
        let job = parse_config(
            r#"
            [film]
            kind = "free_form"
            indices = [1.5, 2.0]
            "#,
        )
        .unwrap();
        let registry = build_registry(&job).unwrap();
        assert!(build_film(&job.film, &registry).is_err());
    }
}
