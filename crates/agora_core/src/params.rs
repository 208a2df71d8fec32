//! Model parameters: validation and the positional parameter vector.

use nalgebra::DMatrix;

use crate::error::ModelError;
use crate::registry::Param;

/// Tolerance for the distance-matrix symmetry check.
const SYMMETRY_TOL: f64 = 1e-9;

/// Exogenous constants of one model instance.
///
/// `distance` is the externally produced physical distance matrix, already
/// normalized by its maximum entry (see [`normalized`]); the model turns it
/// into economic distance `1 + tau * d` symbolically, so `trade_cost` can be
/// varied without re-deriving the system.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParams {
    /// Fixed cost of production f (paid per destination market).
    pub fixed_cost: f64,
    /// Labor-supply scaling beta: S[h] = beta * population[h].
    pub labor_scale: f64,
    /// Base labor productivity phi.
    pub productivity: f64,
    /// Iceberg trade cost tau.
    pub trade_cost: f64,
    /// Elasticity of substitution theta, one value per city.
    pub elasticity: Vec<f64>,
    /// City populations.
    pub population: Vec<f64>,
    /// Normalized symmetric physical distance, zero diagonal.
    pub distance: DMatrix<f64>,
}

impl ModelParams {
    pub fn num_cities(&self) -> usize {
        self.population.len()
    }

    /// Checks the domain constraints the equation builder relies on.
    ///
    /// Economic plausibility beyond hard singularities (a negative fixed
    /// cost, say) is deliberately not policed: such parameter sets reach the
    /// solver and come back as a reported non-convergence.
    pub fn validate(&self) -> Result<(), ModelError> {
        let n = self.num_cities();
        if n == 0 {
            return Err(ModelError::DimensionMismatch {
                what: "population vector",
                expected: 1,
                got: 0,
            });
        }
        if self.elasticity.len() != n {
            return Err(ModelError::DimensionMismatch {
                what: "elasticity vector",
                expected: n,
                got: self.elasticity.len(),
            });
        }
        if self.distance.nrows() != n || self.distance.ncols() != n {
            return Err(ModelError::DimensionMismatch {
                what: "distance matrix",
                expected: n,
                got: self.distance.nrows().max(self.distance.ncols()),
            });
        }
        for (city, &theta) in self.elasticity.iter().enumerate() {
            if (theta - 1.0).abs() < 1e-12 {
                return Err(ModelError::ElasticityUnitary { city });
            }
        }
        for h in 0..n {
            if self.distance[(h, h)] != 0.0 {
                return Err(ModelError::DistanceMatrix {
                    detail: format!("diagonal entry ({h}, {h}) is not zero"),
                });
            }
            for j in 0..n {
                let d = self.distance[(h, j)];
                if !(d >= 0.0) {
                    return Err(ModelError::DistanceMatrix {
                        detail: format!("entry ({h}, {j}) is negative or NaN"),
                    });
                }
                if (d - self.distance[(j, h)]).abs() > SYMMETRY_TOL {
                    return Err(ModelError::DistanceMatrix {
                        detail: format!("entries ({h}, {j}) and ({j}, {h}) differ"),
                    });
                }
            }
        }
        Ok(())
    }

    /// Labor supply of city h.
    pub fn labor_supply(&self, h: usize) -> f64 {
        self.labor_scale * self.population[h]
    }

    /// Flattens the parameters into the positional order declared by
    /// [`Param`]; compiled functions index into this slice.
    pub fn to_positional(&self) -> Vec<f64> {
        let n = self.num_cities();
        let mut out = Vec::with_capacity(Param::positional_len(n));
        out.push(self.fixed_cost);
        out.push(self.labor_scale);
        out.push(self.productivity);
        out.push(self.trade_cost);
        out.extend_from_slice(&self.elasticity);
        out.extend_from_slice(&self.population);
        for h in 0..n {
            for j in 0..n {
                out.push(self.distance[(h, j)]);
            }
        }
        out
    }
}

/// Scales a raw physical distance matrix by its maximum entry, the numeric
/// conditioning applied by the data-preparation stage. An all-zero matrix
/// (single city, or coincident coordinates) is returned unchanged.
pub fn normalized(distance: &DMatrix<f64>) -> DMatrix<f64> {
    let max = distance.iter().cloned().fold(0.0_f64, f64::max);
    if max > 0.0 {
        distance / max
    } else {
        distance.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_params() -> ModelParams {
        ModelParams {
            fixed_cost: 1.0,
            labor_scale: 1.31,
            productivity: 1.0 / 1.31,
            trade_cost: 0.05,
            elasticity: vec![10.0, 10.0],
            population: vec![100.0, 200.0],
            distance: DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]),
        }
    }

    #[test]
    fn accepts_well_formed_parameters() {
        assert!(valid_params().validate().is_ok());
    }

    #[test]
    fn rejects_unit_elasticity() {
        let mut p = valid_params();
        p.elasticity[1] = 1.0;
        match p.validate() {
            Err(ModelError::ElasticityUnitary { city }) => assert_eq!(city, 1),
            other => panic!("expected ElasticityUnitary, got {other:?}"),
        }
    }

    #[test]
    fn rejects_dimension_mismatches() {
        let mut p = valid_params();
        p.elasticity.pop();
        assert!(matches!(
            p.validate(),
            Err(ModelError::DimensionMismatch { .. })
        ));

        let mut p = valid_params();
        p.distance = DMatrix::zeros(3, 3);
        assert!(matches!(
            p.validate(),
            Err(ModelError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn rejects_bad_distance_matrices() {
        let mut p = valid_params();
        p.distance[(0, 0)] = 0.5;
        assert!(matches!(
            p.validate(),
            Err(ModelError::DistanceMatrix { .. })
        ));

        let mut p = valid_params();
        p.distance[(0, 1)] = 2.0; // asymmetric
        assert!(matches!(
            p.validate(),
            Err(ModelError::DistanceMatrix { .. })
        ));
    }

    #[test]
    fn positional_vector_matches_registry_indices() {
        let p = valid_params();
        let n = p.num_cities();
        let flat = p.to_positional();
        assert_eq!(flat.len(), Param::positional_len(n));
        assert_eq!(flat[Param::FixedCost.flat_index(n)], p.fixed_cost);
        assert_eq!(flat[Param::Elasticity(1).flat_index(n)], p.elasticity[1]);
        assert_eq!(flat[Param::Population(0).flat_index(n)], p.population[0]);
        assert_eq!(
            flat[Param::Distance(1, 0).flat_index(n)],
            p.distance[(1, 0)]
        );
    }

    #[test]
    fn normalization_scales_to_unit_maximum() {
        let d = DMatrix::from_row_slice(2, 2, &[0.0, 440.0, 440.0, 0.0]);
        let normed = normalized(&d);
        assert_eq!(normed[(0, 1)], 1.0);
        assert_eq!(normalized(&DMatrix::zeros(1, 1)), DMatrix::zeros(1, 1));
    }
}
