//! Instance-scoped variables.

use super::class::ModelClass;
use super::namespace::ProxyMap;
use crate::algebra::{Substitution, Variable};
use indexmap::IndexMap;

/// Fresh bound variables for one instance of a model class.
#[derive(Debug, Clone, Default)]
pub(crate) struct Binding {
    /// Class-space variable (identity or nested proxy) -> bound variable.
    pub(crate) bound: IndexMap<Variable, Variable>,
    /// Per nested attribute: the nested model's own variables -> bound.
    pub(crate) nested: IndexMap<String, IndexMap<Variable, Variable>>,
}

impl Binding {
    /// Binds every distinct identity, then every nested proxy, as
    /// `{instance}_{name}`. Aliased attributes share one bound variable.
    pub(crate) fn new(class: &ModelClass, instance: &str) -> Self {
        let namespace = class.namespace();
        let mut bound = IndexMap::new();
        for identity in namespace.dummies().values() {
            bound.entry(identity.clone()).or_insert_with(|| identity.bound(instance));
        }
        let mut nested = IndexMap::new();
        for (attr, model) in namespace.nested_models() {
            let mut to_bound = IndexMap::new();
            for (child_var, proxy) in model.proxies() {
                let var = bound.entry(proxy.clone()).or_insert_with(|| proxy.bound(instance));
                to_bound.insert(child_var.clone(), var.clone());
            }
            nested.insert(attr.clone(), to_bound);
        }
        Self { bound, nested }
    }

    /// The variables the instance's system is solved for.
    pub(crate) fn unknowns(&self) -> Vec<Variable> {
        self.bound.values().cloned().collect()
    }

    pub(crate) fn get(&self, var: &Variable) -> Option<&Variable> {
        self.bound.get(var)
    }

    /// Class-space -> bound, as an expression substitution.
    pub(crate) fn substitution(&self) -> Substitution {
        self.bound.iter().map(|(k, v)| (k.clone(), v.into())).collect()
    }
}

/// Maps `inner` keys through `outer`: the result sends each variable of a
/// deeper nested model straight to the outer bound variable.
pub(crate) fn compose(inner: &ProxyMap, outer: &IndexMap<Variable, Variable>) -> IndexMap<Variable, Variable> {
    inner
        .iter()
        .filter_map(|(var, proxy)| outer.get(proxy).map(|bound| (var.clone(), bound.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Assumptions;
    use crate::model::ModelBuilder;

    #[test]
    fn test_binds_identities_and_proxies() {
        let mut child = ModelBuilder::new("Child");
        let a = child.variable("a", Assumptions::positive()).unwrap();
        child.formula("double", &a * 2).unwrap();
        let child = child.build();

        let mut parent = ModelBuilder::new("Parent");
        let x = parent.variable("x", Assumptions::none()).unwrap();
        parent.formula("same", x).unwrap();
        parent.nested("child", &child).unwrap();
        let parent = parent.build();

        let binding = Binding::new(&parent, "p");
        let names: Vec<&str> = binding.bound.values().map(Variable::name).collect();
        assert_eq!(names, vec!["p_x", "p_child_a", "p_child_double"]);

        let child_a = child.identity("a").unwrap();
        let bound_a = &binding.nested["child"][child_a];
        assert_eq!(bound_a.name(), "p_child_a");
        assert!(bound_a.assumptions().positive);
        assert_eq!(binding.unknowns().len(), 3);
    }
}
