//! Projected Adam with mini-batches, best-state tracking and patience.
//!
//! With gradient $g_t$ and step $t = 1, 2, \dots$:
//!
//! $$m_t = \beta_1 m_{t-1} + (1-\beta_1) g_t, \qquad v_t = \beta_2 v_{t-1} + (1-\beta_2) g_t^2,$$
//! $$x_t = \Pi\!\left(x_{t-1} - \alpha\,\frac{m_t/(1-\beta_1^t)}{\sqrt{v_t/(1-\beta_2^t)} + \epsilon}\right),$$
//!
//! where $\Pi$ is the projection of the active [`Parameterization`].

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::batch;
use super::{FreeFormParameterization, OptimizationTrace, Parameterization, ThicknessParameterization};
use crate::error::{ConfigurationError, FilmError};
use crate::film::Film;
use crate::loss;
use crate::types::TargetSpectrum;

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_epsilon() -> f64 {
    1e-8
}

fn default_seed() -> u64 {
    0x5eed
}

/// Tuning knobs. Every field may be omitted from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdamOptions {
    /// Step size. Falls back to the parameterization default (1.0 for
    /// thickness, 0.1 for free-form index).
    #[serde(default)]
    pub alpha: Option<f64>,

    #[serde(default = "default_beta1")]
    pub beta1: f64,

    #[serde(default = "default_beta2")]
    pub beta2: f64,

    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Consecutive non-improving steps before stopping. Defaults to the step budget.
    #[serde(default)]
    pub patience: Option<usize>,

    /// Targets per mini-batch. Defaults to all.
    #[serde(default)]
    pub batch_size_spec: Option<usize>,

    /// Wavelengths per target per mini-batch. Defaults to all.
    #[serde(default)]
    pub batch_size_wl: Option<usize>,

    /// Free-form lower index bound. Defaults to the total-internal-reflection floor.
    #[serde(default)]
    pub n_min: Option<f64>,

    /// Free-form upper index bound. Defaults to unbounded.
    #[serde(default)]
    pub n_max: Option<f64>,

    /// Keep a snapshot of every step.
    #[serde(default)]
    pub record: bool,

    /// Log every step at info level.
    #[serde(default)]
    pub show: bool,

    /// Seed of the mini-batch generator.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for AdamOptions {
    fn default() -> Self {
        Self {
            alpha: None,
            beta1: default_beta1(),
            beta2: default_beta2(),
            epsilon: default_epsilon(),
            patience: None,
            batch_size_spec: None,
            batch_size_wl: None,
            n_min: None,
            n_max: None,
            record: false,
            show: false,
            seed: default_seed(),
        }
    }
}

/// Mutable state of one run.
#[derive(Debug, Clone)]
struct AdamState {
    x: Vec<f64>,
    m: Vec<f64>,
    v: Vec<f64>,
    best_x: Vec<f64>,
    best_loss: f64,
    patience_left: usize,
}

/// Adam optimizer bound to one film for its lifetime.
pub struct AdamOptimizer<'f, P: Parameterization> {
    film: &'f mut Film,
    targets: Vec<TargetSpectrum>,
    n_steps: usize,
    options: AdamOptions,
    parameterization: P,
    indices: batch::TargetIndices,
}

impl<'f> AdamOptimizer<'f, ThicknessParameterization> {
    /// Optimize the thicknesses of a two-material film.
    pub fn thickness(
        film: &'f mut Film,
        targets: Vec<TargetSpectrum>,
        n_steps: usize,
        options: AdamOptions,
    ) -> Result<Self, FilmError> {
        Self::new(film, targets, n_steps, options, ThicknessParameterization)
    }
}

impl<'f> AdamOptimizer<'f, FreeFormParameterization> {
    /// Optimize the layer indices of a free-form film.
    ///
    /// An unset `n_min` becomes $\operatorname{Re}(n_{\text{inc}})\sin\theta_0$
    /// evaluated at the first wavelength and angle of the first target.
    pub fn free_form(
        film: &'f mut Film,
        targets: Vec<TargetSpectrum>,
        n_steps: usize,
        options: AdamOptions,
    ) -> Result<Self, FilmError> {
        let first = targets.first().ok_or(ConfigurationError::EmptyTargets)?;
        first.validate()?;
        let n_min = match options.n_min {
            Some(n) => n,
            None => FreeFormParameterization::tir_floor(film, first.wavelengths[0], first.angle_deg)?,
        };
        let n_max = options.n_max.unwrap_or(f64::INFINITY);
        Self::new(film, targets, n_steps, options, FreeFormParameterization::new(n_min, n_max))
    }
}

impl<'f, P: Parameterization> AdamOptimizer<'f, P> {
    pub fn new(
        film: &'f mut Film,
        targets: Vec<TargetSpectrum>,
        n_steps: usize,
        options: AdamOptions,
        parameterization: P,
    ) -> Result<Self, FilmError> {
        if targets.is_empty() {
            return Err(ConfigurationError::EmptyTargets.into());
        }
        for target in &targets {
            target.validate()?;
        }
        for (what, size) in [
            ("batch_size_spec", options.batch_size_spec),
            ("batch_size_wl", options.batch_size_wl),
        ] {
            if size == Some(0) {
                return Err(ConfigurationError::InvalidTarget(format!("{what} must be positive")).into());
            }
        }
        parameterization.check_film(film)?;
        let indices = batch::TargetIndices::new(film, &targets)?;
        Ok(Self {
            film,
            targets,
            n_steps,
            options,
            parameterization,
            indices,
        })
    }

    pub fn parameterization(&self) -> &P {
        &self.parameterization
    }

    pub fn alpha(&self) -> f64 {
        self.options
            .alpha
            .unwrap_or_else(|| self.parameterization.default_alpha())
    }

    /// Current validation loss of the film.
    pub fn validation_loss(&self) -> Result<f64, FilmError> {
        let f = batch::residual(self.film, &self.targets, &self.indices, &batch::full(&self.targets))?;
        Ok(loss::rms(&f))
    }

    /// Restore `params` on the film and bring the index tables in line.
    fn restore(&mut self, params: &[f64]) -> Result<(), FilmError> {
        self.film.set_parameters(params)?;
        self.indices.refresh_layers(self.film);
        Ok(())
    }

    /// Run until the step budget or the patience is exhausted, then leave
    /// the film at the best parameters seen. A failed step also restores the
    /// best parameters before its error is returned.
    pub fn optimize(&mut self) -> Result<OptimizationTrace, FilmError> {
        self.indices.refresh_layers(self.film);
        let x = self.parameterization.parameters(self.film);
        let initial_loss = self.validation_loss()?;
        let patience = self.options.patience.unwrap_or(self.n_steps);
        let mut trace = OptimizationTrace::starting_at(x.clone(), initial_loss);
        let mut state = AdamState {
            m: vec![0.0; x.len()],
            v: vec![0.0; x.len()],
            best_x: x.clone(),
            best_loss: initial_loss,
            patience_left: patience,
            x,
        };
        let mut rng = StdRng::seed_from_u64(self.options.seed);

        log::debug!(
            "Adam ({}): {} parameters, {} targets, alpha = {}, initial loss {:.6e}",
            self.parameterization.label(),
            state.x.len(),
            self.targets.len(),
            self.alpha(),
            initial_loss
        );

        for step in 0..self.n_steps {
            let loss = match self.step(step, &mut state, &mut rng) {
                Ok(loss) => loss,
                Err(err) => {
                    log::warn!("step {}: {err}; restoring best parameters", step + 1);
                    self.restore(&state.best_x)?;
                    return Err(err);
                }
            };

            if !loss.is_finite() {
                log::warn!("step {step}: validation loss is {loss}");
            }
            // NaN never compares smaller, so it counts as no improvement.
            if loss < state.best_loss {
                state.best_loss = loss;
                state.best_x.clone_from(&state.x);
                state.patience_left = patience;
            } else {
                state.patience_left = state.patience_left.saturating_sub(1);
            }

            if self.options.record {
                trace.push(state.x.clone(), loss);
            }
            if self.options.show {
                log::info!(
                    "step {:>5}  loss {:.6e}  best {:.6e}  patience {}",
                    step + 1,
                    loss,
                    state.best_loss,
                    state.patience_left
                );
            }
            if state.patience_left == 0 {
                log::warn!(
                    "stopping after {} of {} steps: no improvement for {patience} steps",
                    step + 1,
                    self.n_steps
                );
                break;
            }
        }

        self.restore(&state.best_x)?;
        log::debug!("Adam finished, best loss {:.6e}", state.best_loss);
        Ok(trace)
    }

    /// One projected update. Returns the validation loss afterwards.
    fn step(&mut self, step: usize, state: &mut AdamState, rng: &mut StdRng) -> Result<f64, FilmError> {
        let AdamOptions {
            beta1,
            beta2,
            epsilon,
            ..
        } = self.options;
        let alpha = self.alpha();

        let batch = batch::select(
            rng,
            &self.targets,
            self.options.batch_size_spec,
            self.options.batch_size_wl,
        );
        let (f, jac) = batch::residual_and_jacobian(
            &self.parameterization,
            self.film,
            &self.targets,
            &self.indices,
            &batch,
        )?;
        let g = jac.t().dot(&Array1::from(f));

        let t = (step + 1) as i32;
        let m_scale = 1.0 - beta1.powi(t);
        let v_scale = 1.0 - beta2.powi(t);
        for (j, &gj) in g.iter().enumerate() {
            state.m[j] = beta1 * state.m[j] + (1.0 - beta1) * gj;
            state.v[j] = beta2 * state.v[j] + (1.0 - beta2) * gj * gj;
            let m_hat = state.m[j] / m_scale;
            let v_hat = state.v[j] / v_scale;
            state.x[j] -= alpha * m_hat / (v_hat.sqrt() + epsilon);
        }

        self.parameterization.write_back(self.film, &mut state.x)?;
        self.indices.refresh_layers(self.film);
        self.validation_loss()
    }
}
