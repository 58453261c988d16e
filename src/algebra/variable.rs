//! Free symbols with domain assumptions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

static NEXT_VARIABLE_ID: AtomicU64 = AtomicU64::new(0);

/// Domain assumptions attached to a variable.
///
/// Stronger flags imply weaker ones (`integer` ⇒ `rational` ⇒ `real`,
/// `positive` ⇒ `nonnegative` ⇒ `real`); constructors keep them closed
/// under those implications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Assumptions {
    pub real: bool,
    pub rational: bool,
    pub integer: bool,
    pub nonnegative: bool,
    pub positive: bool,
}

impl Assumptions {
    /// No assumptions at all.
    pub fn none() -> Self { Self::default() }

    pub fn real() -> Self { Self { real: true, ..Self::default() }.closed() }
    pub fn rational() -> Self { Self { rational: true, ..Self::default() }.closed() }
    pub fn integer() -> Self { Self { integer: true, ..Self::default() }.closed() }
    pub fn nonnegative() -> Self { Self { nonnegative: true, ..Self::default() }.closed() }
    pub fn positive() -> Self { Self { positive: true, ..Self::default() }.closed() }

    /// Combines two assumption sets (both hold).
    pub fn and(self, other: Assumptions) -> Self {
        Self {
            real: self.real || other.real,
            rational: self.rational || other.rational,
            integer: self.integer || other.integer,
            nonnegative: self.nonnegative || other.nonnegative,
            positive: self.positive || other.positive,
        }
        .closed()
    }

    /// Keeps only what both sets assume.
    pub fn common(self, other: Assumptions) -> Self {
        Self {
            real: self.real && other.real,
            rational: self.rational && other.rational,
            integer: self.integer && other.integer,
            nonnegative: self.nonnegative && other.nonnegative,
            positive: self.positive && other.positive,
        }
    }

    pub(crate) fn closed(mut self) -> Self {
        self.rational |= self.integer;
        self.nonnegative |= self.positive;
        self.real |= self.rational || self.nonnegative;
        self
    }

    /// Checks a numeric value against these assumptions. `exact` carries the
    /// value when it is rational.
    pub fn admits(&self, approx: f64, exact: Option<super::Rational>) -> bool {
        if self.real && !approx.is_finite() {
            return false;
        }
        if self.rational && exact.is_none() {
            return false;
        }
        if self.integer && !exact.is_some_and(|r| r.is_integer()) {
            return false;
        }
        if self.positive && !(approx > 0.0) {
            return false;
        }
        if self.nonnegative && !(approx >= 0.0) {
            return false;
        }
        true
    }
}

#[derive(Debug)]
struct VariableData {
    id: u64,
    name: String,
    assumptions: Assumptions,
}

/// A named free symbol. Identity is by creation, not by name: two variables
/// created with the same name are distinct. Cloning is cheap.
#[derive(Clone)]
pub struct Variable(Arc<VariableData>);

impl Variable {
    pub fn new(name: impl Into<String>, assumptions: Assumptions) -> Self {
        Self(Arc::new(VariableData {
            id: NEXT_VARIABLE_ID.fetch_add(1, AtomicOrdering::Relaxed),
            name: name.into(),
            assumptions: assumptions.closed(),
        }))
    }

    pub fn id(&self) -> u64 { self.0.id }
    pub fn name(&self) -> &str { &self.0.name }
    pub fn assumptions(&self) -> Assumptions { self.0.assumptions }

    /// A fresh variable scoped to one model instance: `{instance}_{name}`.
    pub fn bound(&self, instance: &str) -> Variable {
        Variable::new(format!("{}_{}", instance, self.name()), self.assumptions())
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool { self.id() == other.id() }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) { self.id().hash(state) }
}

impl Ord for Variable {
    fn cmp(&self, other: &Self) -> Ordering { self.id().cmp(&other.id()) }
}

impl PartialOrd for Variable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.name(), self.id())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Rational;
    use rstest::rstest;

    #[test]
    fn test_same_name_is_not_same_variable() {
        let a = Variable::new("x", Assumptions::none());
        let b = Variable::new("x", Assumptions::none());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_bound_variable_name_and_assumptions() {
        let salary = Variable::new("salary", Assumptions::positive().and(Assumptions::rational()));
        let bound = salary.bound("job");
        assert_eq!(bound.name(), "job_salary");
        assert_eq!(bound.assumptions(), salary.assumptions());
        assert_ne!(bound, salary);
    }

    #[test]
    fn test_implications_are_closed() {
        let a = Assumptions::positive();
        assert!(a.nonnegative && a.real);
        let i = Assumptions::integer();
        assert!(i.rational && i.real && !i.positive);
    }

    #[rstest]
    #[case(Assumptions::positive(), -1.0, Some(Rational::integer(-1)), false)]
    #[case(Assumptions::positive(), 0.5, Some(Rational::new(1, 2)), true)]
    #[case(Assumptions::integer(), 0.5, Some(Rational::new(1, 2)), false)]
    #[case(Assumptions::rational(), 1.41, None, false)]
    #[case(Assumptions::real(), f64::NAN, None, false)]
    #[case(Assumptions::none(), f64::NAN, None, true)]
    fn test_admits(#[case] a: Assumptions, #[case] approx: f64, #[case] exact: Option<Rational>, #[case] ok: bool) {
        assert_eq!(a.admits(approx, exact), ok);
    }
}
