//! The model engine: declaring classes, inheriting and nesting them, and
//! constructing solved instances.
mod binder;
pub mod builder;
pub mod class;
mod constraints;
pub mod error;
pub mod instance;
pub mod namespace;
mod resolve;
pub mod value;

pub use builder::ModelBuilder;
pub use class::ModelClass;
pub use error::{ModelError, Result};
pub use instance::{Attribute, ModelInstance};
pub use namespace::{AttributeKind, Declaration, Namespace, NestedModel, ProxyMap};
pub use value::{Value, ValueMap};
