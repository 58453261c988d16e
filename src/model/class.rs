//! Frozen model classes.

use super::builder::ModelBuilder;
use super::error::{ModelError, Result};
use super::namespace::{AttributeKind, Namespace, NestedModel};
use crate::algebra::{Expr, Variable};
use indexmap::IndexMap;

/// A model class: its namespace and the class-level constraints derived from
/// it. Shared behind an `Arc`; instances and nesting parents hold clones.
#[derive(Debug)]
pub struct ModelClass {
    namespace: Namespace,
    // identity -> formula, for every derived attribute
    class_constraints: IndexMap<Variable, Expr>,
}

impl ModelClass {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        ModelBuilder::new(name)
    }

    pub(crate) fn from_namespace(namespace: Namespace) -> Self {
        let class_constraints = namespace
            .attrs
            .iter()
            .filter_map(|(attr, formula)| {
                let identity = namespace.dummies.get(attr)?;
                (formula.as_variable() != Some(identity)).then(|| (identity.clone(), formula.clone()))
            })
            .collect();
        Self { namespace, class_constraints }
    }

    pub fn name(&self) -> &str { self.namespace.name() }
    pub fn namespace(&self) -> &Namespace { &self.namespace }
    pub fn class_constraints(&self) -> &IndexMap<Variable, Expr> { &self.class_constraints }

    pub fn identity(&self, attr: &str) -> Option<&Variable> {
        self.namespace.dummies.get(attr)
    }

    pub fn formula(&self, attr: &str) -> Option<&Expr> {
        self.namespace.attrs.get(attr)
    }

    pub fn nested(&self, attr: &str) -> Option<&NestedModel> {
        self.namespace.nested_models.get(attr)
    }

    pub fn opaque(&self, attr: &str) -> Option<&serde_json::Value> {
        self.namespace.other_attrs.get(attr)
    }

    pub fn kind(&self, attr: &str) -> Option<AttributeKind> {
        self.namespace.kind(attr)
    }

    /// Every attribute name, expressions first, then nested models, then
    /// opaque values.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.namespace
            .attrs
            .keys()
            .chain(self.namespace.nested_models.keys())
            .chain(self.namespace.other_attrs.keys())
            .map(String::as_str)
    }

    /// The identity of an attribute that accepts an expression value.
    pub(crate) fn expression_identity(&self, attr: &str) -> Result<&Variable> {
        if let Some(identity) = self.identity(attr) {
            return Ok(identity);
        }
        let (model, attr) = (self.name().to_string(), attr.to_string());
        Err(match self.kind(&attr) {
            Some(AttributeKind::Opaque) => ModelError::NotAnExpression { model, attr },
            Some(AttributeKind::Nested) => ModelError::ExpectedExpression { model, attr },
            _ => ModelError::UnknownAttribute { model, attr },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Assumptions;

    #[test]
    fn test_class_constraints_cover_derived_attributes_only() {
        let mut builder = ModelBuilder::new("Example");
        let x = builder.variable("x", Assumptions::none()).unwrap();
        builder.formula("y", &x * 2).unwrap();
        builder.formula("alias", x.clone()).unwrap();
        builder.opaque("label", "plain").unwrap();
        let model = builder.build();

        let constraints = model.class_constraints();
        assert_eq!(constraints.len(), 1);
        assert_eq!(constraints[model.identity("y").unwrap()], &x * 2);
        assert_eq!(model.attributes().collect::<Vec<_>>(), vec!["x", "y", "alias", "label"]);
    }

    #[test]
    fn test_expression_identity_errors() {
        let inner = ModelBuilder::new("Inner").build();
        let mut builder = ModelBuilder::new("Outer");
        builder.opaque("label", 1).unwrap();
        builder.nested("inner", &inner).unwrap();
        let model = builder.build();

        assert!(matches!(model.expression_identity("label"), Err(ModelError::NotAnExpression { .. })));
        assert!(matches!(model.expression_identity("inner"), Err(ModelError::ExpectedExpression { .. })));
        assert!(matches!(model.expression_identity("missing"), Err(ModelError::UnknownAttribute { .. })));
    }
}
