//! Stack-based bytecode backend for numeric evaluation of expression trees.
//!
//! Symbolic trees are lowered once per model into postfix programs; the VM
//! then evaluates them against concrete variable/parameter slices on every
//! solver iteration without touching the trees again.

use crate::expr::{BinOp, Expr};

/// OpCodes for the stack machine.
#[derive(Debug, Clone, Copy)]
pub enum OpCode {
    /// Pushes a constant value onto the stack.
    LoadConst(f64),
    /// Pushes the value of a variable (by flat index) onto the stack.
    LoadVar(usize),
    /// Pushes the value of a parameter (by flat index) onto the stack.
    LoadParam(usize),
    /// Pops (b, a), pushes a + b.
    Add,
    /// Pops (b, a), pushes a - b.
    Sub,
    /// Pops (b, a), pushes a * b.
    Mul,
    /// Pops (b, a), pushes a / b.
    Div,
    /// Pops (b, a), pushes a ^ b.
    Pow,
    /// Pops a, pushes -a.
    Neg,
    /// Pops a, pushes ln(a).
    Ln,
}

/// A compiled sequence of operations.
#[derive(Debug, Clone)]
pub struct Bytecode {
    pub ops: Vec<OpCode>,
}

/// Lowers an expression tree into postfix bytecode.
pub fn compile(expr: &Expr) -> Bytecode {
    let mut ops = Vec::new();
    emit(expr, &mut ops);
    Bytecode { ops }
}

fn emit(expr: &Expr, ops: &mut Vec<OpCode>) {
    match expr {
        Expr::Const(v) => ops.push(OpCode::LoadConst(*v)),
        Expr::Var(i) => ops.push(OpCode::LoadVar(*i)),
        Expr::Param(i) => ops.push(OpCode::LoadParam(*i)),
        Expr::Binary(op, a, b) => {
            emit(a, ops);
            emit(b, ops);
            ops.push(match op {
                BinOp::Add => OpCode::Add,
                BinOp::Sub => OpCode::Sub,
                BinOp::Mul => OpCode::Mul,
                BinOp::Div => OpCode::Div,
                BinOp::Pow => OpCode::Pow,
            });
        }
        Expr::Neg(a) => {
            emit(a, ops);
            ops.push(OpCode::Neg);
        }
        Expr::Ln(a) => {
            emit(a, ops);
            ops.push(OpCode::Ln);
        }
    }
}

/// Stack-based virtual machine.
///
/// The VM is stateless; `execute` takes all context: the program, the
/// read-only variable and parameter slices, and a scratch stack reused
/// across calls to avoid allocation.
pub struct Vm;

impl Vm {
    pub fn execute(bytecode: &Bytecode, vars: &[f64], params: &[f64], stack: &mut Vec<f64>) -> f64 {
        stack.clear();

        for op in &bytecode.ops {
            match op {
                OpCode::LoadConst(v) => stack.push(*v),
                OpCode::LoadVar(i) => stack.push(vars[*i]),
                OpCode::LoadParam(i) => stack.push(params[*i]),
                OpCode::Add => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a + b);
                }
                OpCode::Sub => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a - b);
                }
                OpCode::Mul => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a * b);
                }
                OpCode::Div => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a / b);
                }
                OpCode::Pow => {
                    let b = stack.pop().unwrap();
                    let a = stack.pop().unwrap();
                    stack.push(a.powf(b));
                }
                OpCode::Neg => {
                    let a = stack.pop().unwrap();
                    stack.push(-a);
                }
                OpCode::Ln => {
                    let a = stack.pop().unwrap();
                    stack.push(a.ln());
                }
            }
        }

        // The result is the last item on the stack; valid programs always
        // leave exactly one.
        stack.pop().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn eval(expr: &Expr, vars: &[f64], params: &[f64]) -> f64 {
        let mut stack = Vec::new();
        Vm::execute(&compile(expr), vars, params, &mut stack)
    }

    #[test]
    fn evaluates_composed_arithmetic() {
        // (x + 2) * p / y
        let e = Expr::div(
            Expr::mul(
                Expr::add(Expr::var(0), Expr::Const(2.0)),
                Expr::param(0),
            ),
            Expr::var(1),
        );
        assert_relative_eq!(eval(&e, &[3.0, 4.0], &[10.0]), 12.5);
    }

    #[test]
    fn evaluates_power_and_log() {
        let e = Expr::pow(Expr::var(0), Expr::neg(Expr::param(0)));
        assert_relative_eq!(eval(&e, &[2.0], &[3.0]), 0.125);

        let e = Expr::ln(Expr::var(0));
        assert_relative_eq!(eval(&e, &[std::f64::consts::E], &[]), 1.0);
    }

    #[test]
    fn compiled_derivative_matches_finite_difference() {
        // f(x) = x^theta / (1 + x), theta a parameter.
        let x = Expr::var(0);
        let f = Expr::div(
            Expr::pow(x.clone(), Expr::param(0)),
            Expr::add(Expr::Const(1.0), x),
        );
        let df = f.diff(0);

        let params = [2.7];
        let point = [1.3];
        let h = 1e-7;
        let up = eval(&f, &[point[0] + h], &params);
        let down = eval(&f, &[point[0] - h], &params);
        let fd = (up - down) / (2.0 * h);

        assert_relative_eq!(eval(&df, &point, &params), fd, max_relative = 1e-6);
    }
}
