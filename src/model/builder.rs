//! Declaring model classes.

use super::class::ModelClass;
use super::error::Result;
use super::namespace::{Declaration, Namespace, NestedModel};
use crate::algebra::{Assumptions, Expr, Variable};
use std::sync::Arc;

/// Accumulates the declarations of one model class body.
///
/// Bases passed to [`ModelBuilder::extends`] are merged first, in order, so
/// the body sees (and may override) every inherited attribute.
///
/// ```
/// use symbolic_model_core::{values, Assumptions, Expr, ModelBuilder};
///
/// let mut child = ModelBuilder::new("Child");
/// let a = child.variable("a", Assumptions::none())?;
/// let b = child.variable("b", Assumptions::none())?;
/// child.formula("c", &a + &b)?;
/// let child = child.build();
///
/// let instance = child.construct("child", values! { "a" => 1, "b" => 2 })?;
/// assert_eq!(instance.value("c"), Some(&Expr::from(3)));
/// # Ok::<(), symbolic_model_core::ModelError>(())
/// ```
#[derive(Debug)]
pub struct ModelBuilder {
    namespace: Namespace,
}

impl ModelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { namespace: Namespace::new(name) }
    }

    /// Starts a class deriving from `bases`; a later base wins name clashes.
    pub fn extends(name: impl Into<String>, bases: &[&Arc<ModelClass>]) -> Self {
        let mut namespace = Namespace::new(name);
        for base in bases {
            namespace.merge(base.namespace());
        }
        Self { namespace }
    }

    pub fn declare(&mut self, key: &str, declaration: impl Into<Declaration>) -> Result<&mut Self> {
        self.namespace.declare(key, declaration.into())?;
        Ok(self)
    }

    /// Declares a free variable named `key` and returns its identity.
    pub fn variable(&mut self, key: &str, assumptions: Assumptions) -> Result<Expr> {
        self.declare(key, Variable::new(key, assumptions))?;
        Ok(self.identity_expr(key))
    }

    /// Declares a derived attribute and returns its identity.
    pub fn formula(&mut self, key: &str, formula: impl Into<Expr>) -> Result<Expr> {
        self.declare(key, formula.into())?;
        Ok(self.identity_expr(key))
    }

    pub fn nested(&mut self, key: &str, model: &Arc<ModelClass>) -> Result<NestedModel> {
        self.declare(key, model)?;
        Ok(self.namespace.nested_models[key].clone())
    }

    pub fn opaque(&mut self, key: &str, value: impl Into<serde_json::Value>) -> Result<&mut Self> {
        self.declare(key, Declaration::Opaque(value.into()))
    }

    /// The identity of an expression attribute declared so far (inherited
    /// ones included).
    pub fn attr(&self, key: &str) -> Option<Expr> {
        self.namespace.dummies.get(key).cloned().map(Expr::variable)
    }

    /// The `{key}_{attr}` proxy view of a nested model declared so far.
    pub fn nested_model(&self, key: &str) -> Option<&NestedModel> {
        self.namespace.nested_models.get(key)
    }

    pub fn namespace(&self) -> &Namespace { &self.namespace }

    pub fn build(self) -> Arc<ModelClass> {
        Arc::new(ModelClass::from_namespace(self.namespace))
    }

    // `key` was just declared as an expression, so its identity exists.
    fn identity_expr(&self, key: &str) -> Expr {
        self.attr(key).unwrap_or_else(Expr::zero)
    }
}
