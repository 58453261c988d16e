//! Symbolic models composed from attributes, formulas, inheritance and
//! nesting, instantiated by solving the resulting equation system.
//!
//! A model class is declared with a [`ModelBuilder`]. Constructing an
//! instance binds fresh variables, turns the caller's values into
//! constraints, solves everything together and resolves each attribute to
//! its final expression.
//!
//! ```
//! use symbolic_model_core::{values, Assumptions, Expr, ModelBuilder};
//!
//! let mut job = ModelBuilder::new("Job");
//! let salary = job.variable("salary", Assumptions::positive())?;
//! job.formula("fulfilment", &salary * 2)?;
//! let job = job.build();
//!
//! let instance = job.construct("job", values! { "fulfilment" => 1 })?;
//! assert_eq!(instance.value("salary").map(ToString::to_string).as_deref(), Some("1/2"));
//! # Ok::<(), symbolic_model_core::ModelError>(())
//! ```
pub mod algebra;
pub mod config;
pub mod model;

pub use algebra::{Assumptions, Equation, Expr, Rational, Variable};
pub use config::SolverSettings;
pub use model::{
    Attribute, Declaration, ModelBuilder, ModelClass, ModelError, ModelInstance, NestedModel, Result, Value, ValueMap,
};
