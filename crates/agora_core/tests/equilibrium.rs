//! End-to-end checks: symbolic Jacobian fidelity, autarky exactness, and
//! full equilibrium solves.

use agora_core::guess::islands_guess;
use agora_core::model::Model;
use agora_core::params::{normalized, ModelParams};
use agora_core::solver::{solve, SolverOptions};
use agora_core::traits::EquilibriumSystem;
use approx::assert_relative_eq;
use nalgebra::DMatrix;

fn params(n: usize, trade_cost: f64, populations: Vec<f64>) -> ModelParams {
    let raw = DMatrix::from_fn(n, n, |i, j| {
        let diff = i as f64 - j as f64;
        diff.abs() * 250.0
    });
    ModelParams {
        fixed_cost: 1.0,
        labor_scale: 1.31,
        productivity: 1.0 / 1.31,
        trade_cost,
        elasticity: vec![10.0; n],
        population: populations,
        distance: normalized(&raw),
    }
}

#[test]
fn symbolic_jacobian_matches_finite_differences() {
    let model = Model::new(params(3, 0.08, vec![90.0, 140.0, 210.0])).unwrap();
    let x = islands_guess(&model);

    let analytic = model.jacobian(&x).unwrap();
    let f0 = model.residual(&x).unwrap();

    let dim = model.dimension();
    let h_scale = 1e-6;
    for k in 0..dim {
        let h = h_scale * x[k].abs().max(1.0);
        let mut up = x.clone();
        up[k] += h;
        let mut down = x.clone();
        down[k] -= h;
        let fu = model.residual(&up).unwrap();
        let fd = model.residual(&down).unwrap();
        for i in 0..dim {
            let approx_entry = (fu[i] - fd[i]) / (2.0 * h);
            let scale = analytic[(i, k)].abs().max(1.0);
            assert!(
                (analytic[(i, k)] - approx_entry).abs() <= 1e-5 * scale,
                "jacobian mismatch at ({i}, {k}): analytic {} vs finite difference {}",
                analytic[(i, k)],
                approx_entry
            );
        }
    }
}

#[test]
fn single_city_autarky_guess_is_the_exact_equilibrium() {
    let model = Model::new(params(1, 0.0, vec![175.0])).unwrap();
    let guess = islands_guess(&model);
    assert_eq!(guess.len(), 3); // Y, W, M; no free prices with one city

    let residual = model.residual(&guess).unwrap();
    assert!(
        residual.norm() < 1e-9,
        "autarky closed form should zero the one-city system, norm = {}",
        residual.norm()
    );
}

#[test]
fn symmetric_cities_without_friction_reach_a_symmetric_equilibrium() {
    let model = Model::new(params(2, 0.0, vec![130.0, 130.0])).unwrap();
    let guess = islands_guess(&model);
    let options = SolverOptions {
        tolerance: 1e-10,
        max_iterations: 200,
        ..SolverOptions::default()
    };
    let outcome = solve(&model, &guess, options).unwrap();
    assert!(outcome.converged, "{}", outcome.message);

    let eq = outcome.equilibrium(model.layout()).unwrap();
    assert_relative_eq!(eq.prices[1], eq.prices[0], max_relative = 1e-6);
    assert_relative_eq!(eq.gdp[1], eq.gdp[0], max_relative = 1e-6);
    assert_relative_eq!(eq.wages[1], eq.wages[0], max_relative = 1e-6);
    assert_relative_eq!(eq.firms[1], eq.firms[0], max_relative = 1e-6);

    // With no friction, fixed costs are paid in both markets: half the
    // autarky firm count.
    let s = model.params().labor_supply(0);
    assert_relative_eq!(eq.firms[0], s / (2.0 * 10.0), max_relative = 1e-6);
}

#[test]
fn nearly_autarkic_three_city_model_converges() {
    let model = Model::new(params(3, 0.02, vec![100.0, 160.0, 230.0])).unwrap();
    let guess = islands_guess(&model);
    let options = SolverOptions {
        tolerance: 1e-8,
        max_iterations: 300,
        ..SolverOptions::default()
    };
    let outcome = solve(&model, &guess, options).unwrap();
    assert!(outcome.converged, "{}", outcome.message);

    let residual = model.residual(&outcome.x).unwrap();
    assert!(residual.norm() <= 1e-8);

    // Numeraire is never part of the solved vector.
    let eq = outcome.equilibrium(model.layout()).unwrap();
    assert_eq!(eq.prices[0], 1.0);
}

#[test]
fn negative_fixed_cost_reports_failure_instead_of_panicking() {
    let mut bad = params(2, 0.05, vec![120.0, 150.0]);
    bad.fixed_cost = -1.0;
    let model = Model::new(bad).unwrap();
    let guess = islands_guess(&model);

    let outcome = solve(&model, &guess, SolverOptions::default()).unwrap();
    assert!(!outcome.converged);
    assert!(!outcome.message.is_empty());
}

#[test]
fn unit_elasticity_fails_before_any_root_finding() {
    let mut bad = params(2, 0.05, vec![120.0, 150.0]);
    bad.elasticity[1] = 1.0;
    assert!(Model::new(bad).is_err());
}
