//! Stratum command-line interface.
//!
//! Evaluate and optimize thin-film stacks from TOML job files:
//! ```sh
//! stratum run job.toml
//! stratum spectrum job.toml
//! stratum validate job.toml
//! stratum materials
//! ```

mod config;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use stratum_materials::MaterialRegistry;

#[derive(Parser)]
#[command(name = "stratum")]
#[command(about = "Stratum: thin-film spectra and gradient-based stack design")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize the film of a TOML job against its targets.
    Run {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate the film's spectrum on every target grid without optimizing.
    Spectrum {
        /// Path to the job configuration file.
        config: PathBuf,
        /// Output directory (overrides config file setting).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file without running anything.
    Validate {
        /// Path to the job configuration file.
        config: PathBuf,
    },
    /// Display information about available materials.
    Materials {
        /// Wavelength (nm) at which to print optical constants.
        #[arg(long, default_value_t = 600.0)]
        at: f64,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, output } => {
            println!("Stratum stack optimizer");
            println!("=======================");
            let job = config::load_config(&config)?;
            println!("Configuration: {}", config.display());

            let result = runner::run_optimization(&job)?;
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));

            if job.output.save_trace {
                runner::write_trace_csv(&result, &out_dir.join("trace.csv"), &job)?;
            }
            if job.output.save_json {
                runner::write_trace_json(&result.trace, &out_dir.join("trace.json"))?;
            }
            runner::write_spectrum_csv(
                &result.film,
                &job.targets,
                Some(result.targets.as_slice()),
                &out_dir.join("spectrum.csv"),
            )?;

            println!("Optimization complete.");
            Ok(())
        }
        Commands::Spectrum { config, output } => {
            let job = config::load_config(&config)?;
            let registry = runner::build_registry(&job)?;
            let film = runner::build_film(&job.film, &registry)?;
            if job.targets.is_empty() {
                anyhow::bail!("Job has no [[target]] entries to take wavelength grids from");
            }
            let out_dir = output.unwrap_or_else(|| PathBuf::from(&job.output.directory));
            runner::write_spectrum_csv(&film, &job.targets, None, &out_dir.join("spectrum.csv"))?;
            Ok(())
        }
        Commands::Validate { config } => {
            let job = config::load_config(&config)?;
            let registry = runner::build_registry(&job)?;
            let film = runner::build_film(&job.film, &registry)?;
            let targets = runner::build_targets(&job.targets, &film)?;
            println!("Configuration is valid: {}", config.display());
            println!("  Film: {}", runner::describe_film(&job.film));
            println!("  Targets: {}", targets.len());
            Ok(())
        }
        Commands::Materials { at } => {
            let registry = MaterialRegistry::with_defaults()?;
            println!("Available materials (optical constants at {at} nm):");
            println!();
            println!("  {:<12} {:>18} {:>10} {:>10} {:>10}", "name", "range (nm)", "n", "k", "Re ε");
            for name in registry.names() {
                let material = registry.get(name)?;
                let (min, max) = material.wavelength_range();
                let range = if max.is_finite() {
                    format!("{min:.0}–{max:.0}")
                } else {
                    "any".to_string()
                };
                match (material.refractive_index(at), material.dielectric_function(at)) {
                    (Ok(n), Ok(eps)) => println!(
                        "  {:<12} {:>18} {:>10.4} {:>10.4} {:>10.4}",
                        name, range, n.re, n.im, eps.re
                    ),
                    _ => println!("  {:<12} {:>18} {:>10} {:>10} {:>10}", name, range, "-", "-", "-"),
                }
            }
            Ok(())
        }
    }
}
