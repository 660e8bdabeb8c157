//! TOML configuration deserialisation for stack design jobs.

use serde::Deserialize;
use stratum_core::AdamOptions;

/// Top-level job configuration.
#[derive(Debug, Deserialize)]
pub struct JobConfig {
    pub film: FilmConfig,
    /// Target spectra, one `[[target]]` table each.
    #[serde(rename = "target", default)]
    pub targets: Vec<TargetConfig>,
    /// Extra non-dispersive media, one `[[material]]` table each.
    #[serde(rename = "material", default)]
    pub materials: Vec<MaterialConfig>,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Layer stack definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilmConfig {
    /// Alternating `A B A B …` stack, thickness optimized.
    TwoMaterial {
        materials: [String; 2],
        thicknesses: Vec<f64>,
        #[serde(default = "default_substrate")]
        substrate: String,
        #[serde(default = "default_incidence")]
        incidence: String,
    },
    /// Per-layer real index, index optimized. Give either `total_thickness`
    /// (split equally) or explicit `thicknesses`.
    FreeForm {
        indices: Vec<f64>,
        #[serde(default)]
        total_thickness: Option<f64>,
        #[serde(default)]
        thicknesses: Option<Vec<f64>>,
        #[serde(default = "default_substrate")]
        substrate: String,
        #[serde(default = "default_incidence")]
        incidence: String,
    },
}

fn default_substrate() -> String {
    "SiO2".into()
}
fn default_incidence() -> String {
    "Air".into()
}

/// Wavelength specification: either a range or explicit list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WavelengthSpec {
    Range { range: [f64; 2], points: usize },
    List { values: Vec<f64> },
}

/// One target spectrum.
///
/// Give measured `reflectance` and `transmittance` on the wavelength grid,
/// or `design`: film parameters whose simulated spectrum becomes the target.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Incidence angle in degrees.
    #[serde(default)]
    pub angle: f64,
    pub wavelengths: WavelengthSpec,
    /// Fraction of s-polarised light (default: 0.5, unpolarised).
    #[serde(default = "default_s_weight")]
    pub s_weight: f64,
    #[serde(default)]
    pub reflectance: Option<Vec<f64>>,
    #[serde(default)]
    pub transmittance: Option<Vec<f64>>,
    #[serde(default)]
    pub design: Option<Vec<f64>>,
}

fn default_s_weight() -> f64 {
    0.5
}

/// A constant-index medium added to the registry for this job.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterialConfig {
    pub name: String,
    pub n: f64,
    #[serde(default)]
    pub k: f64,
}

/// Step budget and Adam options.
#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_steps")]
    pub steps: usize,
    #[serde(flatten)]
    pub adam: AdamOptions,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            adam: AdamOptions::default(),
        }
    }
}

fn default_steps() -> usize {
    200
}

/// Output configuration.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./output").
    #[serde(default = "default_output_dir")]
    pub directory: String,
    /// Whether to write the loss/parameter trace as CSV (default: true).
    #[serde(default = "default_true")]
    pub save_trace: bool,
    /// Whether to also write the trace as JSON (default: false).
    #[serde(default)]
    pub save_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_dir(),
            save_trace: true,
            save_json: false,
        }
    }
}

fn default_output_dir() -> String {
    "./output".into()
}
fn default_true() -> bool {
    true
}

/// Load and parse a TOML job configuration file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<JobConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> anyhow::Result<JobConfig> {
    let config: JobConfig = toml::from_str(content)?;
    Ok(config)
}
