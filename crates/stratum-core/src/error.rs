//! Error types for film setup and optimization.

use stratum_materials::MaterialError;
use thiserror::Error;

/// Setup problems. Raised at construction time and never recovered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Material(#[from] MaterialError),

    #[error("Optimizer needs at least one target spectrum")]
    EmptyTargets,

    #[error("Spectral configuration not found: {0}")]
    NotFound(String),

    #[error("Ambiguous spectral configuration lookup: {0}")]
    Ambiguous(String),

    #[error("Length mismatch: {what} has {got} entries, expected {expected}")]
    LengthMismatch {
        what: String,
        expected: usize,
        got: usize,
    },

    #[error("Invalid target spectrum: {0}")]
    InvalidTarget(String),

    #[error("Parameterization does not fit this film: {0}")]
    ModeMismatch(String),
}

/// Errors raised by the film model and the optimizer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilmError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// A parameter update that would leave the stack unphysical. The film is unchanged.
    #[error("Domain violation: {0}")]
    DomainViolation(String),
}

impl From<MaterialError> for FilmError {
    fn from(e: MaterialError) -> Self {
        FilmError::Configuration(ConfigurationError::Material(e))
    }
}
