//! Root-finding driver for the equilibrium system and result unpacking.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::registry::Layout;
use crate::traits::EquilibriumSystem;

const MAX_BACKTRACKS: usize = 8;

/// Root-finding flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// Plain damped Newton: fails fast on a singular Jacobian or a step
    /// that does not reduce the residual.
    Newton,
    /// Newton with a backtracking line search on the residual norm and a
    /// steepest-descent (Cauchy) fallback step when the Jacobian LU is
    /// singular.
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    pub method: Method,
    /// Use the exact compiled Jacobian; otherwise a forward
    /// finite-difference approximation is built from residual evaluations.
    pub with_jacobian: bool,
    /// Convergence threshold on the residual l2 norm.
    pub tolerance: f64,
    pub max_iterations: usize,
    /// Initial step scale; the line search only shrinks it.
    pub damping: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: Method::Hybrid,
            with_jacobian: true,
            tolerance: 1e-9,
            max_iterations: 100,
            damping: 1.0,
        }
    }
}

impl SolverOptions {
    fn validate(&self) -> Result<(), ModelError> {
        if !(self.tolerance > 0.0) {
            return Err(ModelError::InvalidSetting {
                detail: "tolerance must be positive".into(),
            });
        }
        if !(self.damping > 0.0) {
            return Err(ModelError::InvalidSetting {
                detail: "damping must be positive".into(),
            });
        }
        if self.max_iterations == 0 {
            return Err(ModelError::InvalidSetting {
                detail: "max_iterations must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Outcome of one solve attempt.
///
/// `converged == false` is a first-class result, not an error: `x` then
/// holds the best iterate found and `message` the solver's diagnostic.
/// Callers must check the flag before treating `x` as an equilibrium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub x: Vec<f64>,
    pub converged: bool,
    pub message: String,
    pub iterations: usize,
    pub residual_evals: usize,
    pub jacobian_evals: usize,
    pub residual_norm: f64,
}

impl SolveOutcome {
    /// Unpacks the solution vector into named blocks.
    pub fn equilibrium(&self, layout: &Layout) -> Result<Equilibrium, ModelError> {
        Equilibrium::from_unknowns(layout, &self.x)
    }
}

/// The solution split into named per-city vectors, numeraire prepended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equilibrium {
    /// Price levels, length N; `prices[0]` is the numeraire, always 1.
    pub prices: Vec<f64>,
    /// Nominal GDP, length N.
    pub gdp: Vec<f64>,
    /// Nominal wages, length N.
    pub wages: Vec<f64>,
    /// Number of firms, length N.
    pub firms: Vec<f64>,
}

impl Equilibrium {
    pub fn from_unknowns(layout: &Layout, x: &[f64]) -> Result<Self, ModelError> {
        if x.len() != layout.unknown_len() {
            return Err(ModelError::DimensionMismatch {
                what: "unknown vector",
                expected: layout.unknown_len(),
                got: x.len(),
            });
        }
        let n = layout.num_cities();
        let mut prices = Vec::with_capacity(n);
        prices.push(1.0);
        prices.extend_from_slice(&x[..layout.gdp_offset()]);
        Ok(Self {
            prices,
            gdp: x[layout.gdp_offset()..layout.wage_offset()].to_vec(),
            wages: x[layout.wage_offset()..layout.firms_offset()].to_vec(),
            firms: x[layout.firms_offset()..].to_vec(),
        })
    }

    /// Repacks into the flat unknown vector, dropping the numeraire.
    /// Inverse of [`Equilibrium::from_unknowns`].
    pub fn to_unknowns(&self, layout: &Layout) -> Result<Vec<f64>, ModelError> {
        let n = layout.num_cities();
        for (what, block) in [
            ("price vector", &self.prices),
            ("gdp vector", &self.gdp),
            ("wage vector", &self.wages),
            ("firms vector", &self.firms),
        ] {
            if block.len() != n {
                return Err(ModelError::DimensionMismatch {
                    what,
                    expected: n,
                    got: block.len(),
                });
            }
        }
        let mut x = Vec::with_capacity(layout.unknown_len());
        x.extend_from_slice(&self.prices[1..]);
        x.extend_from_slice(&self.gdp);
        x.extend_from_slice(&self.wages);
        x.extend_from_slice(&self.firms);
        Ok(x)
    }
}

/// Finds x with residual(x) ~ 0 starting from `initial_guess`.
///
/// Construction-class problems (bad settings, wrong guess length) are
/// `Err`; everything the iteration itself can run into, including singular
/// Jacobians and stalled line searches, comes back as a `SolveOutcome`
/// with `converged == false`.
pub fn solve<S: EquilibriumSystem>(
    system: &S,
    initial_guess: &[f64],
    options: SolverOptions,
) -> Result<SolveOutcome, ModelError> {
    options.validate()?;
    let dim = system.dimension();
    if initial_guess.len() != dim {
        return Err(ModelError::DimensionMismatch {
            what: "initial guess",
            expected: dim,
            got: initial_guess.len(),
        });
    }

    let mut x = DVector::from_column_slice(initial_guess);
    let mut residual = system.residual(x.as_slice())?;
    if residual.len() != dim {
        return Err(ModelError::DimensionMismatch {
            what: "residual vector",
            expected: dim,
            got: residual.len(),
        });
    }
    let mut norm = residual.norm();

    let mut iterations = 0usize;
    let mut residual_evals = 1usize;
    let mut jacobian_evals = 0usize;
    let mut best_x = x.clone();
    let mut best_norm = norm;

    let finish = |x: DVector<f64>,
                  converged: bool,
                  message: String,
                  iterations: usize,
                  residual_evals: usize,
                  jacobian_evals: usize,
                  residual_norm: f64| SolveOutcome {
        x: x.iter().copied().collect(),
        converged,
        message,
        iterations,
        residual_evals,
        jacobian_evals,
        residual_norm,
    };

    loop {
        if !norm.is_finite() {
            return Ok(finish(
                best_x,
                false,
                format!("residual is not finite after {iterations} iterations"),
                iterations,
                residual_evals,
                jacobian_evals,
                best_norm,
            ));
        }
        if norm <= options.tolerance {
            return Ok(finish(
                x,
                true,
                format!("converged in {iterations} iterations"),
                iterations,
                residual_evals,
                jacobian_evals,
                norm,
            ));
        }
        if iterations >= options.max_iterations {
            return Ok(finish(
                best_x,
                false,
                format!(
                    "failed to converge within {} iterations (best residual norm {:.3e})",
                    options.max_iterations, best_norm
                ),
                iterations,
                residual_evals,
                jacobian_evals,
                best_norm,
            ));
        }

        let jac = if options.with_jacobian {
            jacobian_evals += 1;
            system.jacobian(x.as_slice())?
        } else {
            finite_difference(system, &x, &residual, &mut residual_evals)?
        };

        let newton_step = jac.clone().lu().solve(&residual);
        let step = match newton_step {
            Some(step) if step.iter().all(|v| v.is_finite()) => step,
            _ => match options.method {
                Method::Newton => {
                    return Ok(finish(
                        best_x,
                        false,
                        format!("jacobian is singular at iteration {iterations}"),
                        iterations,
                        residual_evals,
                        jacobian_evals,
                        best_norm,
                    ));
                }
                Method::Hybrid => {
                    // Cauchy step on 0.5 ||F||^2: direction J^T F, exact
                    // minimizing step length along it.
                    let grad = jac.transpose() * &residual;
                    let jg = &jac * &grad;
                    let denom = jg.norm_squared();
                    if !(denom > 0.0) || !denom.is_finite() {
                        return Ok(finish(
                            best_x,
                            false,
                            format!("stalled at singular jacobian (iteration {iterations})"),
                            iterations,
                            residual_evals,
                            jacobian_evals,
                            best_norm,
                        ));
                    }
                    let t = grad.norm_squared() / denom;
                    grad * t
                }
            },
        };

        match options.method {
            Method::Newton => {
                x -= step * options.damping;
                residual = system.residual(x.as_slice())?;
                residual_evals += 1;
                norm = residual.norm();
            }
            Method::Hybrid => {
                let mut alpha = options.damping;
                let mut accepted = false;
                for _ in 0..MAX_BACKTRACKS {
                    let trial = &x - &step * alpha;
                    let trial_residual = system.residual(trial.as_slice())?;
                    residual_evals += 1;
                    let trial_norm = trial_residual.norm();
                    if trial_norm.is_finite() && trial_norm < norm {
                        x = trial;
                        residual = trial_residual;
                        norm = trial_norm;
                        accepted = true;
                        break;
                    }
                    alpha *= 0.5;
                }
                if !accepted {
                    return Ok(finish(
                        best_x,
                        false,
                        format!(
                            "line search stalled at iteration {iterations} (residual norm {:.3e})",
                            norm
                        ),
                        iterations,
                        residual_evals,
                        jacobian_evals,
                        best_norm,
                    ));
                }
            }
        }

        iterations += 1;
        if norm < best_norm {
            best_norm = norm;
            best_x.copy_from(&x);
        }
    }
}

/// Forward-difference Jacobian built from residual evaluations.
fn finite_difference<S: EquilibriumSystem>(
    system: &S,
    x: &DVector<f64>,
    f0: &DVector<f64>,
    residual_evals: &mut usize,
) -> Result<DMatrix<f64>, ModelError> {
    let dim = x.len();
    let eps = f64::EPSILON.sqrt();
    let mut jac = DMatrix::zeros(f0.len(), dim);
    let mut probe = x.clone();
    for k in 0..dim {
        let h = eps * x[k].abs().max(1.0);
        let original = probe[k];
        probe[k] = original + h;
        let f = system.residual(probe.as_slice())?;
        *residual_evals += 1;
        jac.set_column(k, &((&f - f0) / h));
        probe[k] = original;
    }
    Ok(jac)
}
