//! Structurally informed initial guesses for the root finder.
//!
//! Uniform or random starting points routinely fail for systems of this
//! size; the multi-city equilibrium is a trade-cost perturbation of the
//! autarky equilibrium, so each city's closed-form no-trade solution is a
//! reliable seed.

use crate::model::Model;

/// Closed-form autarky (single city, no trade) solution.
///
/// With the price level pinned to 1, zero profit, labor-market clearing,
/// the resource constraint, and CES demand reduce to:
///
/// ```text
/// mu = theta / (theta - 1)
/// W  = [ S (phi/mu)^theta / (f phi (theta - 1)) ]^(1/(theta - 1))
/// Y  = S W
/// M  = S / (f theta)
/// ```
///
/// For a one-city model these are the exact equilibrium, not just a guess.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SingleCity {
    pub fixed_cost: f64,
    pub productivity: f64,
    pub elasticity: f64,
}

impl SingleCity {
    pub fn mark_up(&self) -> f64 {
        self.elasticity / (self.elasticity - 1.0)
    }

    pub fn nominal_wage(&self, labor_supply: f64) -> f64 {
        let theta = self.elasticity;
        let phi = self.productivity;
        let base = labor_supply * (phi / self.mark_up()).powf(theta)
            / (self.fixed_cost * phi * (theta - 1.0));
        base.powf(1.0 / (theta - 1.0))
    }

    pub fn nominal_gdp(&self, labor_supply: f64) -> f64 {
        labor_supply * self.nominal_wage(labor_supply)
    }

    pub fn number_firms(&self, labor_supply: f64) -> f64 {
        labor_supply / (self.fixed_cost * self.elasticity)
    }
}

/// Stacks per-city autarky solutions into the unknown-vector layout:
/// prices uniformly 1 (consistent with the numeraire), then the Y, W, M
/// blocks city by city.
pub fn islands_guess(model: &Model) -> Vec<f64> {
    let n = model.num_cities();
    let params = model.params();
    let city = |h: usize| SingleCity {
        fixed_cost: params.fixed_cost,
        productivity: params.productivity,
        elasticity: params.elasticity[h],
    };

    let mut guess = Vec::with_capacity(model.layout().unknown_len());
    guess.resize(n - 1, 1.0);
    for h in 0..n {
        guess.push(city(h).nominal_gdp(params.labor_supply(h)));
    }
    for h in 0..n {
        guess.push(city(h).nominal_wage(params.labor_supply(h)));
    }
    for h in 0..n {
        guess.push(city(h).number_firms(params.labor_supply(h)));
    }
    guess
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Model;
    use crate::params::ModelParams;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn autarky_closed_form_matches_hand_solution() {
        // theta = 2, f = 1, phi = 1, S = 4: mu = 2,
        // W = [4 * (1/2)^2 / 1]^1 = 1, Y = 4, M = 2.
        let city = SingleCity {
            fixed_cost: 1.0,
            productivity: 1.0,
            elasticity: 2.0,
        };
        assert_relative_eq!(city.mark_up(), 2.0);
        assert_relative_eq!(city.nominal_wage(4.0), 1.0);
        assert_relative_eq!(city.nominal_gdp(4.0), 4.0);
        assert_relative_eq!(city.number_firms(4.0), 2.0);
    }

    #[test]
    fn guess_follows_block_layout() {
        let params = ModelParams {
            fixed_cost: 1.0,
            labor_scale: 1.0,
            productivity: 1.0,
            trade_cost: 0.1,
            elasticity: vec![2.0, 3.0],
            population: vec![4.0, 9.0],
            distance: DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]),
        };
        let model = Model::new(params).unwrap();
        let guess = islands_guess(&model);

        assert_eq!(guess.len(), model.layout().unknown_len());
        assert_relative_eq!(guess[0], 1.0); // P1
        assert_relative_eq!(guess[1], 4.0); // Y0, from the hand solution above
        assert_relative_eq!(guess[5], 2.0); // M0
        assert_relative_eq!(guess[6], 3.0); // M1 = 9 / (1 * 3)
    }
}
