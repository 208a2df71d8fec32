//! Core library for Agora: general-equilibrium solving for a multi-city
//! trade model.
//!
//! Given geography, labor supply, and trade-cost parameters, the crate
//! solves for the price levels, nominal GDP, nominal wages, and number of
//! firms in every city that clear goods markets, labor markets, and the
//! free-entry condition simultaneously.
//!
//! Key components:
//! - **Registry** ([`registry`]): the model's unknowns and parameters and
//!   the fixed layout of the flat unknown vector (one price is the
//!   numeraire and is never solved for).
//! - **Equations** ([`equations`], [`expr`]): the market-clearing residual
//!   system as symbolic expression trees, differentiated exactly into a
//!   symbolic Jacobian.
//! - **Engine** ([`engine`], [`compiled`]): a bytecode VM the trees are
//!   lowered into once per model, giving fast repeated numeric evaluation.
//! - **Guess** ([`guess`]): closed-form per-city autarky solutions stacked
//!   into a starting point.
//! - **Solver** ([`solver`]): a damped-Newton/line-search root finder with
//!   structured convergence reporting and named result unpacking.

pub mod compiled;
pub mod engine;
pub mod equations;
pub mod error;
pub mod expr;
pub mod guess;
pub mod model;
pub mod params;
pub mod registry;
pub mod solver;
pub mod traits;
