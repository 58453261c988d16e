//! Defines the error types for the algebra module.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlgebraError {
    /// No remaining unknown can be isolated in the equation.
    #[error("cannot isolate any unknown in `{residual} = 0`")]
    Unsupported { residual: String },
}
