//! Lowered numeric functions for the residual vector and its Jacobian.
//!
//! Lowering happens once per model; evaluation is array-at-a-time against
//! the full variable slice and the positional parameter slice.

use std::cell::RefCell;

use nalgebra::{DMatrix, DVector};

use crate::engine::{compile, Bytecode, Vm};
use crate::expr::Expr;

/// The compiled residual system: one bytecode program per equation.
///
/// The scratch stack is reused across evaluations through a `RefCell`, so
/// the type is `!Sync` by construction; solver instances that want to share
/// a model across threads must each own their compiled copy.
pub struct CompiledSystem {
    programs: Vec<Bytecode>,
    stack: RefCell<Vec<f64>>,
}

impl CompiledSystem {
    pub fn lower(system: &[Expr]) -> Self {
        Self {
            programs: system.iter().map(compile).collect(),
            stack: RefCell::new(Vec::with_capacity(64)),
        }
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn evaluate(&self, vars: &[f64], params: &[f64]) -> DVector<f64> {
        let mut stack = self.stack.borrow_mut();
        DVector::from_iterator(
            self.programs.len(),
            self.programs
                .iter()
                .map(|program| Vm::execute(program, vars, params, &mut stack)),
        )
    }
}

/// The compiled Jacobian. Structural zeros (entries whose derivative
/// simplified to the zero constant) carry no program and are skipped at
/// evaluation time; each residual row only depends on O(N) of the 4N-1
/// unknowns, so most of the matrix is structural zero.
pub struct CompiledJacobian {
    rows: usize,
    cols: usize,
    entries: Vec<Option<Bytecode>>,
    stack: RefCell<Vec<f64>>,
}

impl CompiledJacobian {
    /// Lowers a symbolic Jacobian produced by [`crate::expr::jacobian_of`].
    pub fn lower(symbolic: &[Vec<Expr>]) -> Self {
        let rows = symbolic.len();
        let cols = symbolic.first().map_or(0, Vec::len);
        let mut entries = Vec::with_capacity(rows * cols);
        for row in symbolic {
            for entry in row {
                if entry.is_zero() {
                    entries.push(None);
                } else {
                    entries.push(Some(compile(entry)));
                }
            }
        }
        Self {
            rows,
            cols,
            entries,
            stack: RefCell::new(Vec::with_capacity(64)),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Fraction of entries with a nonzero program; exposed for diagnostics.
    pub fn fill_ratio(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let nonzero = self.entries.iter().filter(|e| e.is_some()).count();
        nonzero as f64 / self.entries.len() as f64
    }

    pub fn evaluate(&self, vars: &[f64], params: &[f64]) -> DMatrix<f64> {
        let mut stack = self.stack.borrow_mut();
        let mut out = DMatrix::zeros(self.rows, self.cols);
        for i in 0..self.rows {
            for k in 0..self.cols {
                if let Some(program) = &self.entries[i * self.cols + k] {
                    out[(i, k)] = Vm::execute(program, vars, params, &mut stack);
                }
            }
        }
        out
    }
}
