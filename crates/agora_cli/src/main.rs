//! Driver binary: assembles a synthetic multi-city scenario, solves for the
//! equilibrium, and prints the result blocks in unknown-vector order.
//!
//! Usage: `agora_cli [num_cities] [trade_cost]` (defaults: 8 cities,
//! tau = 0.05).

use agora_core::guess::islands_guess;
use agora_core::model::Model;
use agora_core::params::{normalized, ModelParams};
use agora_core::solver::{solve, SolverOptions};
use anyhow::{bail, Context, Result};
use nalgebra::DMatrix;

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let num_cities: usize = match args.next() {
        Some(raw) => raw.parse().context("num_cities must be an integer")?,
        None => 8,
    };
    let trade_cost: f64 = match args.next() {
        Some(raw) => raw.parse().context("trade_cost must be a number")?,
        None => 0.05,
    };
    if num_cities == 0 {
        bail!("num_cities must be at least 1");
    }

    let params = ModelParams {
        fixed_cost: 1.0,
        labor_scale: 1.31,
        productivity: 1.0 / 1.31,
        trade_cost,
        elasticity: vec![10.0; num_cities],
        population: (0..num_cities)
            .map(|h| 100.0 + 40.0 * h as f64)
            .collect(),
        distance: normalized(&ring_distances(num_cities)),
    };

    let model = Model::new(params).context("failed to construct model")?;
    let guess = islands_guess(&model);
    let options = SolverOptions {
        tolerance: 1e-8,
        max_iterations: 200,
        ..SolverOptions::default()
    };
    let outcome = solve(&model, &guess, options).context("solve failed to start")?;

    println!("Solution converged? {}", outcome.converged);
    println!(
        "Iterations: {} (residual evals: {}, jacobian evals: {}, residual norm: {:.3e})",
        outcome.iterations, outcome.residual_evals, outcome.jacobian_evals, outcome.residual_norm
    );
    if !outcome.converged {
        bail!("no equilibrium found: {}", outcome.message);
    }

    let equilibrium = outcome.equilibrium(model.layout())?;
    println!("Equilibrium nominal price levels:\n{:?}", equilibrium.prices);
    println!("Equilibrium nominal GDP:\n{:?}", equilibrium.gdp);
    println!("Equilibrium nominal wages:\n{:?}", equilibrium.wages);
    println!("Equilibrium number of firms:\n{:?}", equilibrium.firms);
    Ok(())
}

/// Pairwise chord distances between cities spaced evenly on a circle of
/// radius 100 km; a stand-in for the externally computed geographic
/// distance matrix.
fn ring_distances(n: usize) -> DMatrix<f64> {
    let radius = 100.0;
    DMatrix::from_fn(n, n, |i, j| {
        let angle = (i as f64 - j as f64) * std::f64::consts::TAU / n as f64;
        (2.0 * radius * (angle / 2.0).sin()).abs()
    })
}
