//! Symbolic construction of the market-clearing equation system.
//!
//! Every economic relationship is a small composition over the registry's
//! symbols, mirroring the model's derivation: firms in city h sell into
//! every city j at the optimal monopolistic price, demand in j depends on
//! the relative price and j's real GDP, and the city-level residuals
//! aggregate those firm-level quantities over all origin/destination pairs
//! (O(N^2) terms).

use crate::expr::Expr;
use crate::registry::{Layout, Param, Unknown};

/// Builds the residual system and its named sub-expressions for one city
/// count. The builder is cheap; the cost is in the trees it produces.
pub struct EquationBuilder {
    n: usize,
}

impl EquationBuilder {
    pub fn new(layout: &Layout) -> Self {
        Self {
            n: layout.num_cities(),
        }
    }

    pub fn num_cities(&self) -> usize {
        self.n
    }

    fn var(&self, u: Unknown) -> Expr {
        Expr::var(u.flat_index(self.n))
    }

    fn par(&self, p: Param) -> Expr {
        Expr::param(p.flat_index(self.n))
    }

    /// Aggregate labor supply of city h: beta * population.
    pub fn labor_supply(&self, h: usize) -> Expr {
        Expr::mul(self.par(Param::LaborScale), self.par(Param::Population(h)))
    }

    /// Economic distance between h and j: 1 + tau * d[h,j].
    ///
    /// The physical distance is already normalized by its maximum, so the
    /// diagonal is exactly 1 and tau = 0 removes all trade friction.
    pub fn economic_distance(&self, h: usize, j: usize) -> Expr {
        Expr::add(
            Expr::Const(1.0),
            Expr::mul(self.par(Param::TradeCost), self.par(Param::Distance(h, j))),
        )
    }

    /// Productivity of labor in city h when producing for city j.
    pub fn labor_productivity(&self, h: usize, j: usize) -> Expr {
        Expr::div(self.par(Param::Productivity), self.economic_distance(h, j))
    }

    /// Marginal costs of production in city h for goods sold in city j.
    pub fn marginal_costs(&self, h: usize, j: usize) -> Expr {
        Expr::div(self.var(Unknown::Wage(h)), self.labor_productivity(h, j))
    }

    /// Markup over marginal costs for goods sold in city j.
    ///
    /// Divides by theta[j] - 1; theta[j] != 1 is validated at model
    /// construction, never here.
    pub fn mark_up(&self, j: usize) -> Expr {
        let theta = self.par(Param::Elasticity(j));
        Expr::div(theta.clone(), Expr::sub(theta, Expr::Const(1.0)))
    }

    /// Optimal price of a good produced in h and sold in j.
    pub fn optimal_price(&self, h: usize, j: usize) -> Expr {
        Expr::mul(self.mark_up(j), self.marginal_costs(h, j))
    }

    /// Price relative to city j's price level.
    pub fn relative_price(&self, price: Expr, j: usize) -> Expr {
        Expr::div(price, self.var(Unknown::Price(j)))
    }

    /// Real gross domestic product of city i.
    pub fn real_gdp(&self, i: usize) -> Expr {
        Expr::div(self.var(Unknown::Gdp(i)), self.var(Unknown::Price(i)))
    }

    /// Quantity demanded in city j at a given price.
    pub fn quantity_demand(&self, price: Expr, j: usize) -> Expr {
        Expr::mul(
            Expr::pow(
                self.relative_price(price, j),
                Expr::neg(self.par(Param::Elasticity(j))),
            ),
            self.real_gdp(j),
        )
    }

    /// Labor demanded by a firm in h to produce `quantity` for city j.
    pub fn labor_demand(&self, quantity: Expr, h: usize, j: usize) -> Expr {
        Expr::add(
            Expr::div(quantity, self.labor_productivity(h, j)),
            self.par(Param::FixedCost),
        )
    }

    /// Cost for a firm in h of producing `quantity` for city j.
    pub fn cost(&self, quantity: Expr, h: usize, j: usize) -> Expr {
        Expr::mul(self.labor_demand(quantity, h, j), self.var(Unknown::Wage(h)))
    }

    /// Revenue from selling `quantity` at `price`.
    pub fn revenue(&self, price: Expr, quantity: Expr) -> Expr {
        Expr::mul(price, quantity)
    }

    /// Total export revenue of city h across all destinations.
    pub fn total_exports(&self, h: usize) -> Expr {
        let mut sum = Expr::Const(0.0);
        for j in 0..self.n {
            let p_star = self.optimal_price(h, j);
            let q_star = self.quantity_demand(p_star.clone(), j);
            sum = Expr::add(sum, self.revenue(p_star, q_star));
        }
        Expr::mul(self.var(Unknown::Firms(h)), sum)
    }

    /// Total import spending of city h across all origins.
    pub fn total_imports(&self, h: usize) -> Expr {
        let mut sum = Expr::Const(0.0);
        for j in 0..self.n {
            let p_star = self.optimal_price(j, h);
            let q_star = self.quantity_demand(p_star.clone(), h);
            sum = Expr::add(
                sum,
                Expr::mul(self.var(Unknown::Firms(j)), self.revenue(p_star, q_star)),
            );
        }
        sum
    }

    /// Total production cost for one firm in city h.
    pub fn total_cost(&self, h: usize) -> Expr {
        let mut sum = Expr::Const(0.0);
        for j in 0..self.n {
            let p_star = self.optimal_price(h, j);
            let q_star = self.quantity_demand(p_star, j);
            sum = Expr::add(sum, self.cost(q_star, h, j));
        }
        sum
    }

    /// Total revenue for one firm in city h.
    pub fn total_revenue(&self, h: usize) -> Expr {
        let mut sum = Expr::Const(0.0);
        for j in 0..self.n {
            let p_star = self.optimal_price(h, j);
            let q_star = self.quantity_demand(p_star.clone(), j);
            sum = Expr::add(sum, self.revenue(p_star, q_star));
        }
        sum
    }

    /// Total labor demand of one firm in city h.
    pub fn total_labor_demand(&self, h: usize) -> Expr {
        let mut sum = Expr::Const(0.0);
        for j in 0..self.n {
            let p_star = self.optimal_price(h, j);
            let q_star = self.quantity_demand(p_star, j);
            sum = Expr::add(sum, self.labor_demand(q_star, h, j));
        }
        sum
    }

    /// Profits of one firm in city h; zero under free entry.
    pub fn total_profits(&self, h: usize) -> Expr {
        Expr::sub(self.total_revenue(h), self.total_cost(h))
    }

    /// Exports must balance imports for city h.
    pub fn goods_market_clearing(&self, h: usize) -> Expr {
        Expr::sub(self.total_exports(h), self.total_imports(h))
    }

    /// City labor supply must equal aggregate labor demand of its firms.
    pub fn labor_market_clearing(&self, h: usize) -> Expr {
        Expr::sub(
            self.labor_supply(h),
            Expr::mul(self.var(Unknown::Firms(h)), self.total_labor_demand(h)),
        )
    }

    /// Nominal GDP must equal nominal labor income.
    pub fn resource_constraint(&self, h: usize) -> Expr {
        Expr::sub(
            self.var(Unknown::Gdp(h)),
            Expr::mul(self.labor_supply(h), self.var(Unknown::Wage(h))),
        )
    }

    /// The full residual system, in the fixed row order
    ///
    /// 1. goods-market clearing for h = 1..N (city 0's equation is the
    ///    Walras-redundant one absorbed by the numeraire),
    /// 2. resource constraint for all h,
    /// 3. labor-market clearing for all h,
    /// 4. zero profit (free entry) for all h.
    ///
    /// That is 4N - 1 equations, matching the unknown count.
    pub fn residual_system(&self) -> Vec<Expr> {
        let mut system = Vec::with_capacity(4 * self.n - 1);
        for h in 1..self.n {
            system.push(self.goods_market_clearing(h));
        }
        for h in 0..self.n {
            system.push(self.resource_constraint(h));
        }
        for h in 0..self.n {
            system.push(self.labor_market_clearing(h));
        }
        for h in 0..self.n {
            system.push(self.total_profits(h));
        }
        system
    }
}
