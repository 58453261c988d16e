//! Turning caller values into instance constraints.

use super::binder::{compose, Binding};
use super::class::ModelClass;
use super::error::{ModelError, Result};
use super::value::{Value, ValueMap};
use crate::algebra::{simplify, Expr, Substitution, Variable};
use indexmap::IndexMap;
use std::borrow::Cow;
use tracing::warn;

/// Bound variable -> value the caller fixed it to.
pub(crate) type InstanceConstraints = IndexMap<Variable, Expr>;

/// Caller values split by the kind of attribute they target.
#[derive(Debug, Default)]
pub(crate) struct Partition<'a> {
    pub(crate) nested: IndexMap<&'a str, Cow<'a, ValueMap>>,
    pub(crate) local: IndexMap<&'a str, &'a Value>,
}

pub(crate) fn partition<'a>(class: &ModelClass, values: &'a ValueMap) -> Partition<'a> {
    let mut parts = Partition::default();
    for (key, value) in values {
        if class.nested(key).is_some() {
            parts.nested.insert(key.as_str(), nested_data(class, key, value));
        } else {
            parts.local.insert(key.as_str(), value);
        }
    }
    parts
}

/// Values for a nested model: a map as given, an instance's resolved values,
/// or nothing for anything else.
fn nested_data<'a>(class: &ModelClass, key: &str, value: &'a Value) -> Cow<'a, ValueMap> {
    match value {
        Value::Values(values) => Cow::Borrowed(values),
        Value::Instance(instance) => Cow::Owned(instance.to_values()),
        Value::Expr(expr) => {
            warn!(model = class.name(), attr = key, value = %expr, "ignoring non-map value for nested model");
            Cow::Owned(ValueMap::new())
        }
    }
}

/// Collects the constraints for one instance: local values first, then
/// nested values at any depth, each keyed by its bound variable.
pub(crate) fn collect(class: &ModelClass, parts: &Partition<'_>, binding: &Binding) -> Result<InstanceConstraints> {
    let normalize = binding.substitution();
    let mut constraints = InstanceConstraints::new();

    for (key, value) in &parts.local {
        let identity = class.expression_identity(key)?;
        let bound = bound_or_unknown(class, key, binding.get(identity))?;
        let expr = expect_expr(class, key, value)?;
        constraints.insert(bound.clone(), normalized(expr, &normalize));
    }
    for (key, data) in &parts.nested {
        let (Some(nested), Some(to_bound)) = (class.nested(key), binding.nested.get(*key)) else {
            continue;
        };
        collect_nested(nested.model(), data, to_bound, &normalize, &mut constraints)?;
    }
    Ok(constraints)
}

fn collect_nested(
    model: &ModelClass,
    values: &ValueMap,
    to_bound: &IndexMap<Variable, Variable>,
    normalize: &Substitution,
    constraints: &mut InstanceConstraints,
) -> Result<()> {
    for (key, value) in values {
        if let Some(inner) = model.nested(key) {
            let data = nested_data(model, key, value);
            collect_nested(inner.model(), &data, &compose(inner.proxies(), to_bound), normalize, constraints)?;
            continue;
        }
        let identity = model.expression_identity(key)?;
        let bound = bound_or_unknown(model, key, to_bound.get(identity))?;
        let expr = expect_expr(model, key, value)?;
        constraints.insert(bound.clone(), normalized(expr, normalize));
    }
    Ok(())
}

fn expect_expr<'v>(model: &ModelClass, key: &str, value: &'v Value) -> Result<&'v Expr> {
    value.as_expr().ok_or_else(|| ModelError::ExpectedExpression {
        model: model.name().to_string(),
        attr: key.to_string(),
    })
}

fn bound_or_unknown<'b>(model: &ModelClass, key: &str, bound: Option<&'b Variable>) -> Result<&'b Variable> {
    bound.ok_or_else(|| ModelError::UnknownAttribute { model: model.name().to_string(), attr: key.to_string() })
}

/// Values may mention class identities or proxies; rewrite them into the
/// instance's bound variables.
fn normalized(expr: &Expr, normalize: &Substitution) -> Expr {
    simplify(expr).substitute(normalize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Assumptions;
    use crate::model::ModelBuilder;
    use crate::values;
    use std::sync::Arc;

    fn parent() -> (Arc<ModelClass>, Arc<ModelClass>) {
        let mut child = ModelBuilder::new("Child");
        let a = child.variable("a", Assumptions::none()).unwrap();
        let b = child.variable("b", Assumptions::none()).unwrap();
        child.formula("c", &a + &b).unwrap();
        child.opaque("note", "kept").unwrap();
        let child = child.build();

        let mut parent = ModelBuilder::new("Parent");
        parent.variable("x", Assumptions::none()).unwrap();
        parent.nested("child", &child).unwrap();
        (parent.build(), child)
    }

    fn collect_for(class: &ModelClass, values: &ValueMap) -> Result<InstanceConstraints> {
        let binding = Binding::new(class, "p");
        collect(class, &partition(class, values), &binding)
    }

    #[test]
    fn test_partition_routes_nested_maps() {
        let (parent, _) = parent();
        let values = values! { "x" => 1, "child" => values! { "a" => 2 } };
        let parts = partition(&parent, &values);
        assert_eq!(parts.local.keys().copied().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(parts.nested["child"].len(), 1);
    }

    #[test]
    fn test_nested_values_constrain_parent_bound_variables() {
        let (parent, _) = parent();
        let constraints = collect_for(&parent, &values! { "x" => 1, "child" => values! { "a" => 2 } }).unwrap();
        let keyed: Vec<(&str, Expr)> = constraints.iter().map(|(k, v)| (k.name(), v.clone())).collect();
        assert_eq!(keyed, vec![("p_x", Expr::from(1)), ("p_child_a", Expr::from(2))]);
    }

    #[test]
    fn test_class_identities_in_values_are_bound() {
        let (parent, _) = parent();
        let x = parent.identity("x").unwrap().clone();
        let proxy_a = parent.nested("child").unwrap().attr("a").unwrap();
        let constraints = collect_for(&parent, &values! { "x" => proxy_a + 1 }).unwrap();
        let value = constraints.values().next().unwrap();
        assert!(!value.contains(&x));
        let names: Vec<String> = value.variables().iter().map(|v| v.name().to_string()).collect();
        assert_eq!(names, vec!["p_child_a"]);
    }

    #[test]
    fn test_non_map_nested_value_is_ignored() {
        let (parent, _) = parent();
        let constraints = collect_for(&parent, &values! { "child" => 5 }).unwrap();
        assert!(constraints.is_empty());
    }

    #[test]
    fn test_errors() {
        let (parent, _) = parent();
        let unknown = collect_for(&parent, &values! { "nope" => 1 }).unwrap_err();
        assert!(matches!(unknown, ModelError::UnknownAttribute { .. }));

        let opaque = collect_for(&parent, &values! { "child" => values! { "note" => 1 } }).unwrap_err();
        assert_eq!(opaque, ModelError::NotAnExpression { model: "Child".into(), attr: "note".into() });

        let map_for_expr = collect_for(&parent, &values! { "x" => values! { "a" => 1 } }).unwrap_err();
        assert!(matches!(map_for_expr, ModelError::ExpectedExpression { .. }));
    }
}
