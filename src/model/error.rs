//! Defines the error types for model definition and construction.
use crate::algebra::AlgebraError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A derived-expression attribute was reassigned a non-expression value.
    #[error("cannot assign {model}.{attr} to a non-expression")]
    Definition { model: String, attr: String },
    #[error("no solution for instance '{instance}' of {model}")]
    UnsolvableSystem { model: String, instance: String },
    #[error("{count} solutions for instance '{instance}' of {model}")]
    AmbiguousSystem { model: String, instance: String, count: usize },
    #[error("{model} has no attribute '{attr}'")]
    UnknownAttribute { model: String, attr: String },
    #[error("{model}.{attr} is an opaque attribute and cannot be constrained")]
    NotAnExpression { model: String, attr: String },
    #[error("{model}.{attr} expects an expression value")]
    ExpectedExpression { model: String, attr: String },
    #[error(transparent)]
    Algebra(#[from] AlgebraError),
}

pub type Result<T, E = ModelError> = std::result::Result<T, E>;
