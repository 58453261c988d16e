//! The per-model-class record of declarations and its inheritance merge.

use super::class::ModelClass;
use super::error::{ModelError, Result};
use crate::algebra::{simplify, Expr, Variable};
use indexmap::IndexMap;
use std::sync::Arc;

/// Maps a nested model's own variables (identities and, transitively, the
/// proxies of its own nested models) to the parent-local proxy variables.
pub type ProxyMap = IndexMap<Variable, Variable>;

/// The value side of one attribute declaration.
#[derive(Debug, Clone)]
pub enum Declaration {
    /// A free variable or a formula.
    Expr(Expr),
    /// A nested model.
    Model(Arc<ModelClass>),
    /// A pass-through value the engine never interprets.
    Opaque(serde_json::Value),
}

impl From<Expr> for Declaration {
    fn from(expr: Expr) -> Self { Declaration::Expr(expr) }
}

impl From<Variable> for Declaration {
    fn from(var: Variable) -> Self { Declaration::Expr(Expr::variable(var)) }
}

impl From<Arc<ModelClass>> for Declaration {
    fn from(model: Arc<ModelClass>) -> Self { Declaration::Model(model) }
}

impl From<&Arc<ModelClass>> for Declaration {
    fn from(model: &Arc<ModelClass>) -> Self { Declaration::Model(Arc::clone(model)) }
}

impl From<serde_json::Value> for Declaration {
    fn from(value: serde_json::Value) -> Self { Declaration::Opaque(value) }
}

/// The category an attribute name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Its formula is its own identity variable.
    Free,
    Derived,
    Nested,
    Opaque,
}

/// A nested-model declaration as seen from the parent.
#[derive(Debug, Clone)]
pub struct NestedModel {
    model: Arc<ModelClass>,
    proxies: ProxyMap,
    // Derived formulas of the nested model, rewritten over the proxies.
    formulas: IndexMap<String, Expr>,
}

impl NestedModel {
    pub(crate) fn new(key: &str, model: Arc<ModelClass>) -> Self {
        let namespace = model.namespace();
        let mut proxies = ProxyMap::new();
        for identity in namespace.dummies.values() {
            proxies
                .entry(identity.clone())
                .or_insert_with(|| Variable::new(format!("{}_{}", key, identity.name()), identity.assumptions()));
        }
        // The nested model's own proxies are already transitive.
        for nested in namespace.nested_models.values() {
            for child_proxy in nested.proxies.values() {
                proxies
                    .entry(child_proxy.clone())
                    .or_insert_with(|| Variable::new(format!("{}_{}", key, child_proxy.name()), child_proxy.assumptions()));
            }
        }
        let formulas = namespace
            .attrs
            .iter()
            .filter(|(attr, _)| namespace.kind(attr) == Some(AttributeKind::Derived))
            .map(|(attr, formula)| (attr.clone(), formula.rename(&proxies)))
            .collect();
        Self { model, proxies, formulas }
    }

    pub fn model(&self) -> &Arc<ModelClass> { &self.model }

    pub fn proxies(&self) -> &ProxyMap { &self.proxies }

    /// The proxy variable standing for the nested model's attribute `attr`.
    pub fn attr(&self, attr: &str) -> Option<Expr> {
        let identity = self.model.namespace().dummies.get(attr)?;
        self.proxies.get(identity).cloned().map(Expr::variable)
    }

    /// The nested model's formula for a derived `attr`, over the proxies.
    pub fn formula(&self, attr: &str) -> Option<&Expr> {
        self.formulas.get(attr)
    }

    /// A view of a model nested inside this one, with its proxies mapped all
    /// the way to this parent.
    pub fn nested(&self, attr: &str) -> Option<NestedModel> {
        let inner = self.model.namespace().nested_models.get(attr)?;
        let proxies = inner
            .proxies
            .iter()
            .filter_map(|(var, proxy)| self.proxies.get(proxy).map(|outer| (var.clone(), outer.clone())))
            .collect();
        let formulas = inner.formulas.iter().map(|(k, f)| (k.clone(), f.rename(&self.proxies))).collect();
        Some(NestedModel { model: Arc::clone(&inner.model), proxies, formulas })
    }
}

/// Declarations of one model class, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    name: String,
    pub(crate) attrs: IndexMap<String, Expr>,
    pub(crate) dummies: IndexMap<String, Variable>,
    pub(crate) other_attrs: IndexMap<String, serde_json::Value>,
    pub(crate) nested_models: IndexMap<String, NestedModel>,
    // Losing identity -> winning identity, always pointing at the final winner.
    pub(crate) overrides: IndexMap<Variable, Variable>,
}

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn attrs(&self) -> &IndexMap<String, Expr> { &self.attrs }
    pub fn dummies(&self) -> &IndexMap<String, Variable> { &self.dummies }
    pub fn other_attrs(&self) -> &IndexMap<String, serde_json::Value> { &self.other_attrs }
    pub fn nested_models(&self) -> &IndexMap<String, NestedModel> { &self.nested_models }
    pub fn overrides(&self) -> &IndexMap<Variable, Variable> { &self.overrides }

    pub fn kind(&self, attr: &str) -> Option<AttributeKind> {
        if let (Some(formula), Some(identity)) = (self.attrs.get(attr), self.dummies.get(attr)) {
            return Some(if formula.as_variable() == Some(identity) {
                AttributeKind::Free
            } else {
                AttributeKind::Derived
            });
        }
        if self.nested_models.contains_key(attr) {
            return Some(AttributeKind::Nested);
        }
        self.other_attrs.contains_key(attr).then_some(AttributeKind::Opaque)
    }

    /// Merges one base namespace into this one. Called once per base, in
    /// order; on a name clash the later base wins.
    pub(crate) fn merge(&mut self, base: &Namespace) {
        // 1. Record identities this base overrides.
        for (attr, winner) in &base.dummies {
            if let Some(loser) = self.dummies.get(attr).filter(|loser| *loser != winner).cloned() {
                self.record_override(loser, winner.clone());
            }
        }
        for (loser, winner) in &base.overrides {
            self.record_override(loser.clone(), winner.clone());
        }

        // 2. Union the categories.
        for (attr, formula) in &base.attrs {
            self.forget(attr);
            self.attrs.insert(attr.clone(), formula.clone());
            if let Some(identity) = base.dummies.get(attr) {
                self.dummies.insert(attr.clone(), identity.clone());
            }
        }
        for (attr, value) in &base.other_attrs {
            self.forget(attr);
            self.other_attrs.insert(attr.clone(), value.clone());
        }
        for (attr, nested) in &base.nested_models {
            self.forget(attr);
            self.nested_models.insert(attr.clone(), nested.clone());
        }

        // 3. Point every formula and identity at the winning variables.
        if !self.overrides.is_empty() {
            let overrides = &self.overrides;
            for formula in self.attrs.values_mut() {
                *formula = formula.rename(overrides);
            }
            for identity in self.dummies.values_mut() {
                if let Some(winner) = overrides.get(identity) {
                    *identity = winner.clone();
                }
            }
        }
    }

    fn record_override(&mut self, loser: Variable, winner: Variable) {
        let winner = self.overrides.get(&winner).cloned().unwrap_or(winner);
        for existing in self.overrides.values_mut() {
            if *existing == loser {
                *existing = winner.clone();
            }
        }
        self.overrides.insert(loser, winner);
    }

    fn forget(&mut self, attr: &str) {
        self.attrs.shift_remove(attr);
        self.dummies.shift_remove(attr);
        self.other_attrs.shift_remove(attr);
        self.nested_models.shift_remove(attr);
    }

    /// Applies one declaration from the class body.
    pub(crate) fn declare(&mut self, key: &str, declaration: Declaration) -> Result<()> {
        match declaration {
            Declaration::Expr(value) => {
                let identity = match (self.dummies.get(key), value.as_variable()) {
                    (Some(existing), _) => existing.clone(),
                    (None, Some(var)) => self.overrides.get(var).unwrap_or(var).clone(),
                    (None, None) => Variable::new(key, value.assumptions()),
                };
                let formula = simplify(&value).rename(&self.overrides);
                self.other_attrs.shift_remove(key);
                self.nested_models.shift_remove(key);
                self.attrs.insert(key.to_string(), formula);
                self.dummies.insert(key.to_string(), identity);
            }
            _ if self.attrs.contains_key(key) => {
                return Err(ModelError::Definition { model: self.name.clone(), attr: key.to_string() });
            }
            Declaration::Model(model) => {
                let nested = NestedModel::new(key, model);
                self.other_attrs.shift_remove(key);
                self.nested_models.insert(key.to_string(), nested);
            }
            Declaration::Opaque(value) => {
                self.nested_models.shift_remove(key);
                self.other_attrs.insert(key.to_string(), value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Assumptions;
    use crate::model::ModelBuilder;
    use serde_json::json;

    fn var(name: &str) -> Variable {
        Variable::new(name, Assumptions::none())
    }

    #[test]
    fn test_identity_rules() {
        let mut ns = Namespace::new("Example");
        let thing = var("thing");
        ns.declare("thing", thing.clone().into()).unwrap();
        assert_eq!(ns.dummies()["thing"], thing);
        assert_eq!(ns.kind("thing"), Some(AttributeKind::Free));

        // A bare variable keeps its identity, even under another name.
        ns.declare("alias", thing.clone().into()).unwrap();
        assert_eq!(ns.dummies()["alias"], thing);

        // A formula gets a synthesized identity named after the key.
        ns.declare("double", (Expr::variable(thing.clone()) * 2).into()).unwrap();
        assert_eq!(ns.dummies()["double"].name(), "double");
        assert_eq!(ns.kind("double"), Some(AttributeKind::Derived));

        // Redeclaring reuses the existing identity.
        let first = ns.dummies()["double"].clone();
        ns.declare("double", (Expr::variable(thing) * 3).into()).unwrap();
        assert_eq!(ns.dummies()["double"], first);
    }

    #[test]
    fn test_synthesized_identity_inherits_assumptions() {
        let mut ns = Namespace::new("Job");
        let salary = Variable::new("salary", Assumptions::positive().and(Assumptions::rational()));
        ns.declare("salary", salary.clone().into()).unwrap();
        ns.declare("doubled", (Expr::variable(salary) * 2).into()).unwrap();
        let assumptions = ns.dummies()["doubled"].assumptions();
        assert!(assumptions.positive && assumptions.rational);
    }

    #[test]
    fn test_expression_cannot_become_opaque() {
        let mut ns = Namespace::new("Example");
        ns.declare("a", var("a").into()).unwrap();
        let err = ns.declare("a", json!("text").into()).unwrap_err();
        assert_eq!(err, ModelError::Definition { model: "Example".into(), attr: "a".into() });
    }

    #[test]
    fn test_each_attribute_has_one_category() {
        let mut ns = Namespace::new("Example");
        ns.declare("label", json!("first").into()).unwrap();
        assert_eq!(ns.kind("label"), Some(AttributeKind::Opaque));
        ns.declare("label", var("label").into()).unwrap();
        assert_eq!(ns.kind("label"), Some(AttributeKind::Free));
        assert!(ns.other_attrs().is_empty());
    }

    #[test]
    fn test_later_base_wins_and_formulas_are_rewritten() {
        let mut a = ModelBuilder::new("ExampleA");
        let conflicted_a = a.variable("conflicted", Assumptions::none()).unwrap();
        a.formula("a", &conflicted_a + 1).unwrap();
        let a = a.build();

        let mut b = ModelBuilder::new("ExampleB");
        let conflicted_b = b.variable("conflicted", Assumptions::none()).unwrap();
        b.formula("b", &conflicted_b * 2).unwrap();
        let b = b.build();

        let c = ModelBuilder::extends("ExampleC", &[&a, &b]).build();
        let winner = b.identity("conflicted").unwrap();
        assert_eq!(c.identity("conflicted"), Some(winner));
        assert_ne!(c.identity("conflicted"), a.identity("conflicted"));
        assert_eq!(c.formula("a"), Some(&(Expr::variable(winner.clone()) + 1)));
        assert_eq!(c.namespace().overrides()[a.identity("conflicted").unwrap()], *winner);

        // Reversing the order reverses the winner.
        let d = ModelBuilder::extends("ExampleD", &[&b, &a]).build();
        assert_eq!(d.identity("conflicted"), a.identity("conflicted"));
    }

    #[test]
    fn test_shared_ancestor_is_not_an_override() {
        let mut base = ModelBuilder::new("Base");
        base.variable("x", Assumptions::none()).unwrap();
        let base = base.build();
        let left = ModelBuilder::extends("Left", &[&base]).build();
        let right = ModelBuilder::extends("Right", &[&base]).build();
        let diamond = ModelBuilder::extends("Diamond", &[&left, &right]).build();
        assert!(diamond.namespace().overrides().is_empty());
        assert_eq!(diamond.identity("x"), base.identity("x"));
    }

    #[test]
    fn test_nested_proxies_are_transitive() {
        let mut leaf = ModelBuilder::new("Leaf");
        let a = leaf.variable("a", Assumptions::none()).unwrap();
        let b = leaf.variable("b", Assumptions::none()).unwrap();
        leaf.formula("total", &a + &b).unwrap();
        let leaf = leaf.build();

        let mut branch = ModelBuilder::new("Branch");
        branch.nested("leaf", &leaf).unwrap();
        let branch = branch.build();

        let mut tree = ModelBuilder::new("Tree");
        let left = tree.nested("left", &branch).unwrap();
        let names: Vec<&str> = left.proxies().values().map(Variable::name).collect();
        assert_eq!(names, vec!["left_leaf_a", "left_leaf_b", "left_leaf_total"]);

        let leaf_view = left.nested("leaf").unwrap();
        let total = leaf_view.formula("total").unwrap();
        let expected = leaf_view.attr("a").unwrap() + leaf_view.attr("b").unwrap();
        assert_eq!(total, &expected);
        assert_eq!(leaf_view.attr("a").unwrap().as_variable().map(Variable::name), Some("left_leaf_a"));
    }
}
