//! The model instance: parameters plus the lazily derived and cached
//! symbolic/compiled machinery.

use std::cell::OnceCell;

use nalgebra::{DMatrix, DVector};

use crate::compiled::{CompiledJacobian, CompiledSystem};
use crate::equations::EquationBuilder;
use crate::error::ModelError;
use crate::expr::{jacobian_of, Expr};
use crate::params::ModelParams;
use crate::registry::Layout;
use crate::traits::EquilibriumSystem;

/// A fully specified multi-city model.
///
/// Construction validates the parameters (unit elasticity, dimensions,
/// distance-matrix sanity) and fixes the symbolic structure; the residual
/// system, its Jacobian, and their compiled forms are derived on first use
/// and cached for the lifetime of the instance. The caches make the type
/// `!Sync`; cross-thread parameter sweeps should construct one model per
/// solve.
pub struct Model {
    params: ModelParams,
    layout: Layout,
    positional: Vec<f64>,
    system: OnceCell<Vec<Expr>>,
    symbolic_jacobian: OnceCell<Vec<Vec<Expr>>>,
    compiled_system: OnceCell<CompiledSystem>,
    compiled_jacobian: OnceCell<CompiledJacobian>,
}

impl Model {
    pub fn new(params: ModelParams) -> Result<Self, ModelError> {
        params.validate()?;
        let layout = Layout::new(params.num_cities())?;
        let positional = params.to_positional();
        Ok(Self {
            params,
            layout,
            positional,
            system: OnceCell::new(),
            symbolic_jacobian: OnceCell::new(),
            compiled_system: OnceCell::new(),
            compiled_jacobian: OnceCell::new(),
        })
    }

    pub fn num_cities(&self) -> usize {
        self.layout.num_cities()
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// The symbolic residual system, derived once.
    pub fn system(&self) -> &[Expr] {
        self.system
            .get_or_init(|| EquationBuilder::new(&self.layout).residual_system())
    }

    /// The symbolic Jacobian, derived once. Column k differentiates with
    /// respect to full-variable index k + 1: the numeraire price is fixed
    /// and never appears as a column.
    pub fn symbolic_jacobian(&self) -> &[Vec<Expr>] {
        self.symbolic_jacobian.get_or_init(|| {
            let wrt: Vec<usize> = (1..self.layout.var_len()).collect();
            jacobian_of(self.system(), &wrt)
        })
    }

    /// The compiled residual function, built at most once per instance.
    pub fn compiled_system(&self) -> &CompiledSystem {
        self.compiled_system
            .get_or_init(|| CompiledSystem::lower(self.system()))
    }

    /// The compiled Jacobian function, built at most once per instance.
    pub fn compiled_jacobian(&self) -> &CompiledJacobian {
        self.compiled_jacobian
            .get_or_init(|| CompiledJacobian::lower(self.symbolic_jacobian()))
    }
}

impl EquilibriumSystem for Model {
    fn dimension(&self) -> usize {
        self.layout.unknown_len()
    }

    fn residual(&self, x: &[f64]) -> Result<DVector<f64>, ModelError> {
        let vars = self.layout.to_variables(x)?;
        Ok(self.compiled_system().evaluate(&vars, &self.positional))
    }

    fn jacobian(&self, x: &[f64]) -> Result<DMatrix<f64>, ModelError> {
        let vars = self.layout.to_variables(x)?;
        Ok(self.compiled_jacobian().evaluate(&vars, &self.positional))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn two_city_params() -> ModelParams {
        ModelParams {
            fixed_cost: 1.0,
            labor_scale: 1.31,
            productivity: 1.0 / 1.31,
            trade_cost: 0.05,
            elasticity: vec![10.0, 10.0],
            population: vec![120.0, 150.0],
            distance: DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]),
        }
    }

    #[test]
    fn construction_rejects_unit_elasticity() {
        let mut params = two_city_params();
        params.elasticity[0] = 1.0;
        assert!(matches!(
            Model::new(params),
            Err(ModelError::ElasticityUnitary { city: 0 })
        ));
    }

    #[test]
    fn residual_and_jacobian_check_dimensions() {
        let model = Model::new(two_city_params()).unwrap();
        assert_eq!(model.dimension(), 7);
        assert!(matches!(
            model.residual(&[1.0; 6]),
            Err(ModelError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            model.jacobian(&[1.0; 8]),
            Err(ModelError::DimensionMismatch { .. })
        ));

        let r = model.residual(&[1.0; 7]).unwrap();
        assert_eq!(r.len(), 7);
        let j = model.jacobian(&[1.0; 7]).unwrap();
        assert_eq!(j.shape(), (7, 7));
    }

    #[test]
    fn compiled_functions_are_cached() {
        let model = Model::new(two_city_params()).unwrap();
        let first = model.compiled_system() as *const _;
        let _ = model.residual(&[1.0; 7]).unwrap();
        let second = model.compiled_system() as *const _;
        assert!(std::ptr::eq(first, second));

        let jac_first = model.compiled_jacobian() as *const _;
        let jac_second = model.compiled_jacobian() as *const _;
        assert!(std::ptr::eq(jac_first, jac_second));
    }
}
