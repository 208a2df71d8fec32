use nalgebra::{DMatrix, DVector};

use crate::error::ModelError;

/// A square nonlinear system F(x) = 0 the root finder can drive.
///
/// `residual` and `jacobian` must be pure with respect to the caller: given
/// the same `x` they return the same values, and neither mutates shared
/// solver state. The equilibrium model implements this; tests substitute
/// synthetic systems with known roots.
pub trait EquilibriumSystem {
    /// Number of unknowns (and equations).
    fn dimension(&self) -> usize;

    /// The residual vector at `x`; zero everywhere at a solution.
    fn residual(&self, x: &[f64]) -> Result<DVector<f64>, ModelError>;

    /// The exact Jacobian at `x`, rows in residual order, columns in
    /// unknown order.
    fn jacobian(&self, x: &[f64]) -> Result<DMatrix<f64>, ModelError>;
}
