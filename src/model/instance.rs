//! Constructing and inspecting model instances.
//!
//! Construction runs in order:
//! 1. split the caller's values into local and nested-model data,
//! 2. bind fresh instance variables,
//! 3. collect constraints from the values,
//! 4. assemble the system and solve it for the bound variables,
//! 5. resolve every expression attribute,
//! 6. build each nested model as its own instance from the resolved values.

use super::binder::Binding;
use super::class::ModelClass;
use super::constraints::{collect, partition};
use super::error::{ModelError, Result};
use super::resolve::{assemble, solve_unique, Resolver};
use super::value::{Value, ValueMap};
use crate::algebra::{Equation, Expr, Variable};
use crate::config::SolverSettings;
use indexmap::IndexMap;
use rayon::prelude::*;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// One attribute of a built instance.
#[derive(Debug, Clone, Copy)]
pub enum Attribute<'a> {
    Expr(&'a Expr),
    Model(&'a ModelInstance),
    Opaque(&'a serde_json::Value),
}

/// A constructed model: every expression attribute resolved to a value,
/// every nested model built as a child instance.
#[derive(Debug, Clone)]
pub struct ModelInstance {
    name: String,
    model: Arc<ModelClass>,
    bound: IndexMap<Variable, Variable>,
    values: IndexMap<String, Expr>,
    nested: IndexMap<String, ModelInstance>,
    equations: Vec<Equation>,
}

impl ModelClass {
    /// Builds an instance named `name` with the default solver settings.
    pub fn construct(self: &Arc<Self>, name: &str, values: ValueMap) -> Result<ModelInstance> {
        self.construct_with(name, values, &SolverSettings::default())
    }

    /// Builds an instance named `name`.
    ///
    /// # Errors
    /// - [`ModelError::UnknownAttribute`], [`ModelError::NotAnExpression`] or
    ///   [`ModelError::ExpectedExpression`] when `values` does not fit the class.
    /// - [`ModelError::UnsolvableSystem`] / [`ModelError::AmbiguousSystem`]
    ///   when the system has no solution or more than one.
    pub fn construct_with(self: &Arc<Self>, name: &str, values: ValueMap, settings: &SolverSettings) -> Result<ModelInstance> {
        debug!(model = self.name(), instance = name, "constructing instance");

        // 1. Split values by attribute kind.
        let parts = partition(self, &values);

        // 2. Bind.
        let binding = Binding::new(self, name);

        // 3. Collect constraints.
        let constraints = collect(self, &parts, &binding)?;

        // 4. Assemble and solve.
        let equations = assemble(self, &binding, &constraints);
        let solution = solve_unique(self, name, &equations, &binding.unknowns(), settings)?;

        // 5. Resolve local attributes.
        let resolver = Resolver::new(&solution, &constraints);
        let resolved = resolver.local_values(self, &binding);

        // 6. Build nested models.
        let mut nested = IndexMap::new();
        for (attr, model) in self.namespace().nested_models() {
            let to_bound = binding.nested.get(attr).ok_or_else(|| ModelError::UnknownAttribute {
                model: self.name().to_string(),
                attr: attr.clone(),
            })?;
            let child_values = resolver.child_values(model.model(), to_bound);
            let child = model.model().construct_with(&format!("{}_{}", name, attr), child_values, settings)?;
            nested.insert(attr.clone(), child);
        }

        debug!(model = self.name(), instance = name, equations = equations.len(), "constructed instance");
        Ok(ModelInstance {
            name: name.to_string(),
            model: Arc::clone(self),
            bound: binding.bound,
            values: resolved,
            nested,
            equations,
        })
    }

    /// Builds independent instances in parallel; results keep the input order.
    pub fn construct_many(
        self: &Arc<Self>,
        requests: Vec<(String, ValueMap)>,
        settings: &SolverSettings,
    ) -> Vec<Result<ModelInstance>> {
        requests
            .into_par_iter()
            .map(|(name, values)| self.construct_with(&name, values, settings))
            .collect()
    }
}

impl ModelInstance {
    pub fn name(&self) -> &str { &self.name }
    pub fn model(&self) -> &Arc<ModelClass> { &self.model }

    /// The system this instance was solved from.
    pub fn equations(&self) -> &[Equation] { &self.equations }

    pub fn get(&self, attr: &str) -> Option<Attribute<'_>> {
        if let Some(value) = self.values.get(attr) {
            return Some(Attribute::Expr(value));
        }
        if let Some(child) = self.nested.get(attr) {
            return Some(Attribute::Model(child));
        }
        self.model.opaque(attr).map(Attribute::Opaque)
    }

    pub fn value(&self, attr: &str) -> Option<&Expr> {
        self.values.get(attr)
    }

    pub fn child(&self, attr: &str) -> Option<&ModelInstance> {
        self.nested.get(attr)
    }

    pub fn opaque(&self, attr: &str) -> Option<&serde_json::Value> {
        self.model.opaque(attr)
    }

    /// The instance-scoped variable standing for an expression attribute.
    pub fn bound_variable(&self, attr: &str) -> Option<&Variable> {
        self.bound.get(self.model.identity(attr)?)
    }

    pub fn values(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.values.iter().map(|(attr, value)| (attr.as_str(), value))
    }

    /// Resolved values in the shape `construct` accepts, nested models as maps.
    pub fn to_values(&self) -> ValueMap {
        let mut values: ValueMap = self.values.iter().map(|(attr, value)| (attr.clone(), Value::Expr(value.clone()))).collect();
        for (attr, child) in &self.nested {
            values.insert(attr.clone(), Value::Values(child.to_values()));
        }
        values
    }

    /// A JSON rendering: expressions as strings, children as objects, opaque
    /// attributes as declared.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for (attr, value) in &self.values {
            object.insert(attr.clone(), json!(value.to_string()));
        }
        for (attr, child) in &self.nested {
            object.insert(attr.clone(), child.to_json());
        }
        for (attr, value) in self.model.namespace().other_attrs() {
            object.insert(attr.clone(), value.clone());
        }
        json!({ "model": self.model.name(), "name": self.name, "attributes": object })
    }
}
