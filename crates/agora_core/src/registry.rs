//! Declarations of the model's symbolic unknowns and parameters, and the
//! fixed layout of the flat unknown vector.

use crate::error::ModelError;

/// One endogenous quantity of one city.
///
/// The full variable vector evaluated by the compiled system has length 4N
/// and is ordered `[P[0..N], Y[0..N], W[0..N], M[0..N]]`. City 0's price
/// level is the numeraire: it is pinned to 1 and never solved for, so the
/// unknown vector handed to the root finder is the full vector with its
/// first entry removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unknown {
    /// Price level P[h].
    Price(usize),
    /// Nominal GDP Y[h].
    Gdp(usize),
    /// Nominal wage W[h].
    Wage(usize),
    /// Number of firms M[h].
    Firms(usize),
}

impl Unknown {
    /// Index into the full variable vector for a model with `n` cities.
    pub fn flat_index(self, n: usize) -> usize {
        match self {
            Unknown::Price(h) => h,
            Unknown::Gdp(h) => n + h,
            Unknown::Wage(h) => 2 * n + h,
            Unknown::Firms(h) => 3 * n + h,
        }
    }
}

/// One exogenous constant of the model.
///
/// Parameters are passed to compiled functions as one flat slice in the
/// fixed positional order `[f, beta, phi, tau, theta[0..N], pop[0..N],
/// dist[0..N*N] (row-major)]`. This enum is the single source of truth for
/// that order; [`crate::params::ModelParams::to_positional`] assembles the
/// slice to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// Fixed cost of production f.
    FixedCost,
    /// Labor-supply scaling beta.
    LaborScale,
    /// Base labor productivity phi.
    Productivity,
    /// Iceberg trade cost tau.
    TradeCost,
    /// Elasticity of substitution theta[h].
    Elasticity(usize),
    /// City population.
    Population(usize),
    /// Normalized physical distance between two cities.
    Distance(usize, usize),
}

impl Param {
    /// Index into the positional parameter vector for a model with `n` cities.
    pub fn flat_index(self, n: usize) -> usize {
        match self {
            Param::FixedCost => 0,
            Param::LaborScale => 1,
            Param::Productivity => 2,
            Param::TradeCost => 3,
            Param::Elasticity(h) => 4 + h,
            Param::Population(h) => 4 + n + h,
            Param::Distance(h, j) => 4 + 2 * n + h * n + j,
        }
    }

    /// Length of the positional parameter vector for `n` cities.
    pub fn positional_len(n: usize) -> usize {
        4 + 2 * n + n * n
    }
}

/// Block structure of the unknown vector X.
///
/// X concatenates `P[1..N]`, `Y[0..N]`, `W[0..N]`, `M[0..N]`; its length is
/// `4N - 1`. The order is load-bearing: the equation builder, the Jacobian
/// columns, and the result unpacking all slice by these offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    n: usize,
}

impl Layout {
    pub fn new(n: usize) -> Result<Self, ModelError> {
        if n == 0 {
            return Err(ModelError::DimensionMismatch {
                what: "city count",
                expected: 1,
                got: 0,
            });
        }
        Ok(Self { n })
    }

    pub fn num_cities(&self) -> usize {
        self.n
    }

    /// Length of the full variable vector `[P, Y, W, M]`.
    pub fn var_len(&self) -> usize {
        4 * self.n
    }

    /// Length of the unknown vector X (numeraire excluded).
    pub fn unknown_len(&self) -> usize {
        4 * self.n - 1
    }

    /// Expands X into the full variable vector by prepending the numeraire.
    pub fn to_variables(&self, x: &[f64]) -> Result<Vec<f64>, ModelError> {
        if x.len() != self.unknown_len() {
            return Err(ModelError::DimensionMismatch {
                what: "unknown vector",
                expected: self.unknown_len(),
                got: x.len(),
            });
        }
        let mut vars = Vec::with_capacity(self.var_len());
        vars.push(1.0);
        vars.extend_from_slice(x);
        Ok(vars)
    }

    /// Offset of the Y block within X.
    pub fn gdp_offset(&self) -> usize {
        self.n - 1
    }

    /// Offset of the W block within X.
    pub fn wage_offset(&self) -> usize {
        2 * self.n - 1
    }

    /// Offset of the M block within X.
    pub fn firms_offset(&self) -> usize {
        3 * self.n - 1
    }
}
