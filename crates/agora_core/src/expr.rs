//! Symbolic expression trees and exact differentiation.
//!
//! Expressions reference unknowns and parameters by their flat indices (see
//! [`crate::registry`]); there is no name resolution at evaluation time. The
//! constructors simplify as they build (constant folding, identity and zero
//! elimination), which keeps derivative trees from drowning in `0 * ...`
//! terms.

/// Binary operators understood by the tree and the bytecode backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// A symbolic scalar expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(f64),
    /// Index into the full variable vector.
    Var(usize),
    /// Index into the positional parameter vector.
    Param(usize),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Ln(Box<Expr>),
}

impl Expr {
    pub fn constant(v: f64) -> Expr {
        Expr::Const(v)
    }

    pub fn var(index: usize) -> Expr {
        Expr::Var(index)
    }

    pub fn param(index: usize) -> Expr {
        Expr::Param(index)
    }

    pub fn add(a: Expr, b: Expr) -> Expr {
        match (a, b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x + y),
            (Expr::Const(x), b) if x == 0.0 => b,
            (a, Expr::Const(y)) if y == 0.0 => a,
            (a, b) => Expr::Binary(BinOp::Add, Box::new(a), Box::new(b)),
        }
    }

    pub fn sub(a: Expr, b: Expr) -> Expr {
        match (a, b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x - y),
            (a, Expr::Const(y)) if y == 0.0 => a,
            (Expr::Const(x), b) if x == 0.0 => Expr::neg(b),
            (a, b) => Expr::Binary(BinOp::Sub, Box::new(a), Box::new(b)),
        }
    }

    pub fn mul(a: Expr, b: Expr) -> Expr {
        match (a, b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x * y),
            (Expr::Const(x), _) | (_, Expr::Const(x)) if x == 0.0 => Expr::Const(0.0),
            (Expr::Const(x), b) if x == 1.0 => b,
            (a, Expr::Const(y)) if y == 1.0 => a,
            (a, b) => Expr::Binary(BinOp::Mul, Box::new(a), Box::new(b)),
        }
    }

    pub fn div(a: Expr, b: Expr) -> Expr {
        match (a, b) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x / y),
            (Expr::Const(x), _) if x == 0.0 => Expr::Const(0.0),
            (a, Expr::Const(y)) if y == 1.0 => a,
            (a, b) => Expr::Binary(BinOp::Div, Box::new(a), Box::new(b)),
        }
    }

    pub fn pow(base: Expr, exponent: Expr) -> Expr {
        match (base, exponent) {
            (Expr::Const(x), Expr::Const(y)) => Expr::Const(x.powf(y)),
            (_, Expr::Const(y)) if y == 0.0 => Expr::Const(1.0),
            (base, Expr::Const(y)) if y == 1.0 => base,
            (base, exponent) => Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)),
        }
    }

    pub fn neg(a: Expr) -> Expr {
        match a {
            Expr::Const(x) => Expr::Const(-x),
            Expr::Neg(inner) => *inner,
            a => Expr::Neg(Box::new(a)),
        }
    }

    pub fn ln(a: Expr) -> Expr {
        match a {
            Expr::Const(x) => Expr::Const(x.ln()),
            a => Expr::Ln(Box::new(a)),
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Const(c) if *c == 0.0)
    }

    /// Whether any unknown (not parameter) appears in the tree.
    pub fn contains_any_var(&self) -> bool {
        match self {
            Expr::Const(_) | Expr::Param(_) => false,
            Expr::Var(_) => true,
            Expr::Binary(_, a, b) => a.contains_any_var() || b.contains_any_var(),
            Expr::Neg(a) | Expr::Ln(a) => a.contains_any_var(),
        }
    }

    /// Exact partial derivative with respect to the variable at `var`.
    pub fn diff(&self, var: usize) -> Expr {
        match self {
            Expr::Const(_) | Expr::Param(_) => Expr::Const(0.0),
            Expr::Var(i) => Expr::Const(if *i == var { 1.0 } else { 0.0 }),
            Expr::Neg(a) => Expr::neg(a.diff(var)),
            Expr::Ln(a) => Expr::div(a.diff(var), (**a).clone()),
            Expr::Binary(op, a, b) => {
                let da = a.diff(var);
                let db = b.diff(var);
                match op {
                    BinOp::Add => Expr::add(da, db),
                    BinOp::Sub => Expr::sub(da, db),
                    BinOp::Mul => Expr::add(
                        Expr::mul(da, (**b).clone()),
                        Expr::mul((**a).clone(), db),
                    ),
                    BinOp::Div => Expr::div(
                        Expr::sub(
                            Expr::mul(da, (**b).clone()),
                            Expr::mul((**a).clone(), db),
                        ),
                        Expr::mul((**b).clone(), (**b).clone()),
                    ),
                    BinOp::Pow => {
                        if !b.contains_any_var() {
                            // d/dx a^c = c * a^(c-1) * a'
                            Expr::mul(
                                Expr::mul(
                                    (**b).clone(),
                                    Expr::pow(
                                        (**a).clone(),
                                        Expr::sub((**b).clone(), Expr::Const(1.0)),
                                    ),
                                ),
                                da,
                            )
                        } else {
                            // General rule: a^b * (b' ln a + b a'/a).
                            Expr::mul(
                                Expr::pow((**a).clone(), (**b).clone()),
                                Expr::add(
                                    Expr::mul(db, Expr::ln((**a).clone())),
                                    Expr::div(Expr::mul((**b).clone(), da), (**a).clone()),
                                ),
                            )
                        }
                    }
                }
            }
        }
    }
}

/// Differentiates every equation of `system` with respect to every variable
/// index in `wrt`, preserving both orderings. Entry `[i][k]` is
/// d system[i] / d vars[wrt[k]].
pub fn jacobian_of(system: &[Expr], wrt: &[usize]) -> Vec<Vec<Expr>> {
    system
        .iter()
        .map(|eq| wrt.iter().map(|&v| eq.diff(v)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_fold_constants() {
        assert_eq!(
            Expr::add(Expr::Const(2.0), Expr::Const(3.0)),
            Expr::Const(5.0)
        );
        assert_eq!(Expr::mul(Expr::Const(0.0), Expr::var(4)), Expr::Const(0.0));
        assert_eq!(Expr::mul(Expr::Const(1.0), Expr::var(4)), Expr::var(4));
        assert_eq!(Expr::add(Expr::var(1), Expr::Const(0.0)), Expr::var(1));
        assert_eq!(Expr::pow(Expr::var(2), Expr::Const(1.0)), Expr::var(2));
        assert_eq!(Expr::pow(Expr::var(2), Expr::Const(0.0)), Expr::Const(1.0));
        assert_eq!(Expr::neg(Expr::neg(Expr::var(7))), Expr::var(7));
    }

    #[test]
    fn derivative_of_unrelated_variable_is_zero() {
        let e = Expr::mul(Expr::var(0), Expr::param(2));
        assert!(e.diff(1).is_zero());
        assert!(Expr::param(3).diff(0).is_zero());
    }

    #[test]
    fn product_rule() {
        // d/dx (x * y) = y at any point; indices 0 = x, 1 = y.
        let e = Expr::mul(Expr::var(0), Expr::var(1));
        assert_eq!(e.diff(0), Expr::var(1));
        assert_eq!(e.diff(1), Expr::var(0));
    }

    #[test]
    fn power_rule_with_parameter_exponent_stays_symbolic() {
        // d/dx x^theta = theta * x^(theta - 1)
        let e = Expr::pow(Expr::var(0), Expr::param(0));
        let d = e.diff(0);
        assert_eq!(
            d,
            Expr::mul(
                Expr::param(0),
                Expr::pow(
                    Expr::var(0),
                    Expr::sub(Expr::param(0), Expr::Const(1.0))
                ),
            )
        );
    }

    #[test]
    fn general_power_rule_emits_logarithm() {
        let e = Expr::pow(Expr::var(0), Expr::var(1));
        let d = e.diff(1);
        // d/dy x^y = x^y ln x.
        assert_eq!(
            d,
            Expr::mul(
                Expr::pow(Expr::var(0), Expr::var(1)),
                Expr::ln(Expr::var(0)),
            )
        );
    }

    #[test]
    fn jacobian_of_preserves_ordering() {
        let system = [
            Expr::mul(Expr::var(1), Expr::var(2)),
            Expr::add(Expr::var(1), Expr::Const(4.0)),
        ];
        let jac = jacobian_of(&system, &[1, 2]);
        assert_eq!(jac.len(), 2);
        assert_eq!(jac[0][0], Expr::var(2));
        assert_eq!(jac[0][1], Expr::var(1));
        assert_eq!(jac[1][0], Expr::Const(1.0));
        assert!(jac[1][1].is_zero());
    }
}
