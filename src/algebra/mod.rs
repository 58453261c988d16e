//! The symbolic algebra capability the model engine is built on: variables
//! with assumptions, exact canonical expressions, substitution and an
//! elimination solver.
pub mod equation;
pub mod error;
pub mod expr;
pub mod rational;
pub mod solve;
pub mod variable;

// Re-export key types for convenient access
pub use equation::Equation;
pub use error::AlgebraError;
pub use expr::{simplify, Atom, Expr, Monomial, Substitution};
pub use rational::Rational;
pub use solve::{solve, Solution};
pub use variable::{Assumptions, Variable};
