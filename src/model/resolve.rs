//! Equation assembly, solving, and attribute resolution for one instance.

use super::binder::{compose, Binding};
use super::class::ModelClass;
use super::constraints::InstanceConstraints;
use super::error::{ModelError, Result};
use super::value::{Value, ValueMap};
use crate::algebra::{solve, Equation, Expr, Solution, Variable};
use crate::config::SolverSettings;
use indexmap::IndexMap;
use tracing::{debug, trace};

/// Builds the instance's system: class formulas of the model and of every
/// nested model (at any depth) over bound variables, then the caller's
/// constraints.
pub(crate) fn assemble(class: &ModelClass, binding: &Binding, constraints: &InstanceConstraints) -> Vec<Equation> {
    let mut equations = Vec::new();
    class_equations(class, &binding.bound, &mut equations);
    equations.extend(constraints.iter().map(|(bound, value)| Equation::new(bound, value.clone())));
    equations
}

fn class_equations(model: &ModelClass, to_bound: &IndexMap<Variable, Variable>, out: &mut Vec<Equation>) {
    for (identity, formula) in model.class_constraints() {
        if let Some(bound) = to_bound.get(identity) {
            out.push(Equation::new(bound, formula.rename(to_bound)));
        }
    }
    for nested in model.namespace().nested_models().values() {
        class_equations(nested.model(), &compose(nested.proxies(), to_bound), out);
    }
}

/// Solves the system and insists on exactly one solution.
pub(crate) fn solve_unique(
    class: &ModelClass,
    instance: &str,
    equations: &[Equation],
    unknowns: &[Variable],
    settings: &SolverSettings,
) -> Result<Solution> {
    if equations.is_empty() || unknowns.is_empty() {
        return Ok(Solution::new());
    }
    for equation in equations {
        trace!(instance, %equation, "instance equation");
    }
    let mut solutions = solve(equations, unknowns, settings)?;
    debug!(model = class.name(), instance, count = solutions.len(), "solved instance system");
    match solutions.len() {
        0 => Err(ModelError::UnsolvableSystem { model: class.name().to_string(), instance: instance.to_string() }),
        1 => Ok(solutions.pop().unwrap_or_default()),
        count => Err(ModelError::AmbiguousSystem {
            model: class.name().to_string(),
            instance: instance.to_string(),
            count,
        }),
    }
}

/// Picks the final value of each attribute.
pub(crate) struct Resolver<'a> {
    solution: &'a Solution,
    constraints: &'a InstanceConstraints,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(solution: &'a Solution, constraints: &'a InstanceConstraints) -> Self {
        Self { solution, constraints }
    }

    /// Solved value, else the caller's constraint, else the class formula,
    /// else the bound variable itself.
    fn resolve(&self, model: &ModelClass, identity: &Variable, to_bound: &IndexMap<Variable, Variable>) -> Option<Expr> {
        let bound = to_bound.get(identity)?;
        if let Some(value) = self.solution.get(bound).or_else(|| self.constraints.get(bound)) {
            return Some(value.clone());
        }
        Some(match model.class_constraints().get(identity) {
            Some(formula) => formula.rename(to_bound),
            None => Expr::variable(bound.clone()),
        })
    }

    /// Final values of the instance's own expression attributes.
    pub(crate) fn local_values(&self, class: &ModelClass, binding: &Binding) -> IndexMap<String, Expr> {
        class
            .namespace()
            .dummies()
            .iter()
            .filter_map(|(attr, identity)| Some((attr.clone(), self.resolve(class, identity, &binding.bound)?)))
            .collect()
    }

    /// Values handed to a nested model's construction: every expression
    /// attribute, plus a map per deeper nested model.
    pub(crate) fn child_values(&self, model: &ModelClass, to_bound: &IndexMap<Variable, Variable>) -> ValueMap {
        let namespace = model.namespace();
        let mut values = ValueMap::new();
        for (attr, identity) in namespace.dummies() {
            if let Some(value) = self.resolve(model, identity, to_bound) {
                values.insert(attr.clone(), Value::Expr(value));
            }
        }
        for (attr, nested) in namespace.nested_models() {
            let inner = self.child_values(nested.model(), &compose(nested.proxies(), to_bound));
            values.insert(attr.clone(), Value::Values(inner));
        }
        values
    }
}
