//! Caller-supplied attribute values for instance construction.

use super::instance::ModelInstance;
use crate::algebra::{Expr, Rational, Variable};
use indexmap::IndexMap;

/// Attribute name -> value, in the caller's order.
pub type ValueMap = IndexMap<String, Value>;

/// One attribute value passed to [`ModelClass::construct`](super::ModelClass::construct).
///
/// Expression attributes take an [`Expr`]. Nested-model attributes take
/// either a map of the nested model's attribute values or an already built
/// instance, whose resolved values are used.
#[derive(Debug, Clone)]
pub enum Value {
    Expr(Expr),
    Values(ValueMap),
    Instance(Box<ModelInstance>),
}

impl Value {
    pub fn as_expr(&self) -> Option<&Expr> {
        match self {
            Value::Expr(expr) => Some(expr),
            _ => None,
        }
    }
}

impl From<Expr> for Value {
    fn from(expr: Expr) -> Self { Value::Expr(expr) }
}

impl From<&Expr> for Value {
    fn from(expr: &Expr) -> Self { Value::Expr(expr.clone()) }
}

impl From<Variable> for Value {
    fn from(var: Variable) -> Self { Value::Expr(Expr::variable(var)) }
}

impl From<Rational> for Value {
    fn from(value: Rational) -> Self { Value::Expr(Expr::constant(value)) }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self { Value::Expr(Expr::from(value)) }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self { Value::Expr(Expr::from(value)) }
}

impl From<ValueMap> for Value {
    fn from(values: ValueMap) -> Self { Value::Values(values) }
}

impl From<ModelInstance> for Value {
    fn from(instance: ModelInstance) -> Self { Value::Instance(Box::new(instance)) }
}

impl From<&ModelInstance> for Value {
    fn from(instance: &ModelInstance) -> Self { Value::Instance(Box::new(instance.clone())) }
}

/// Builds a [`ValueMap`](crate::ValueMap) from `key => value` pairs.
///
/// ```
/// use symbolic_model_core::{values, Value};
///
/// let inputs = values! { "salary" => 10, "child" => values! { "a" => 3 } };
/// assert!(matches!(inputs["child"], Value::Values(_)));
/// ```
#[macro_export]
macro_rules! values {
    () => { $crate::ValueMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::ValueMap::new();
        $( map.insert(::std::string::String::from($key), $crate::Value::from($value)); )+
        map
    }};
}
