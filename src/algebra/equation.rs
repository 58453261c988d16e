use super::expr::Expr;
use super::variable::Variable;
use indexmap::IndexSet;
use std::fmt;

/// `lhs = rhs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Equation {
    pub lhs: Expr,
    pub rhs: Expr,
}

impl Equation {
    pub fn new(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self { lhs: lhs.into(), rhs: rhs.into() }
    }

    /// `lhs - rhs`, which is zero exactly when the equation holds.
    pub fn residual(&self) -> Expr {
        &self.lhs - &self.rhs
    }

    /// Variables of the left side first, then those only on the right.
    pub fn variables(&self) -> IndexSet<Variable> {
        let mut vars = self.lhs.variables();
        vars.extend(self.rhs.variables());
        vars
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.lhs, self.rhs)
    }
}
