//! Canonical symbolic expressions.
//!
//! An [`Expr`] is a sum of terms, each a rational coefficient times a
//! [`Monomial`]. Monomials are sorted products of atoms raised to rational
//! exponents, so two expressions that are equal after expansion compare equal
//! structurally. Atoms are either variables or grouped sub-expressions that
//! cannot be distributed (e.g. `sqrt(a + b)` or `1 / (a + b)`).

use super::rational::Rational;
use super::variable::{Assumptions, Variable};
use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Mapping used by [`Expr::substitute`].
pub type Substitution = IndexMap<Variable, Expr>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Atom {
    Var(Variable),
    /// A multi-term sum, or a constant whose power is not rational.
    Group(Box<Expr>),
}

impl Atom {
    pub fn contains(&self, var: &Variable) -> bool {
        match self {
            Atom::Var(v) => v == var,
            Atom::Group(base) => base.contains(var),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Monomial {
    // Sorted by atom, exponents never zero.
    factors: SmallVec<[(Atom, Rational); 2]>,
}

impl Monomial {
    pub fn factors(&self) -> &[(Atom, Rational)] { &self.factors }

    pub fn is_one(&self) -> bool { self.factors.is_empty() }

    fn single(atom: Atom, exp: Rational) -> Self {
        let mut factors = SmallVec::new();
        if !exp.is_zero() {
            factors.push((atom, exp));
        }
        Self { factors }
    }

    fn merge(&self, other: &Monomial) -> Monomial {
        let mut factors: SmallVec<[(Atom, Rational); 2]> = SmallVec::with_capacity(self.factors.len() + other.factors.len());
        let (mut i, mut j) = (0, 0);
        while i < self.factors.len() && j < other.factors.len() {
            let (a, ea) = &self.factors[i];
            let (b, eb) = &other.factors[j];
            match a.cmp(b) {
                std::cmp::Ordering::Less => { factors.push((a.clone(), ea.clone())); i += 1; }
                std::cmp::Ordering::Greater => { factors.push((b.clone(), eb.clone())); j += 1; }
                std::cmp::Ordering::Equal => {
                    let exp = ea + eb;
                    if !exp.is_zero() {
                        factors.push((a.clone(), exp));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        factors.extend(self.factors[i..].iter().cloned());
        factors.extend(other.factors[j..].iter().cloned());
        Monomial { factors }
    }

    /// Exponent of `var` as a direct factor (zero when absent).
    pub fn exponent_of(&self, var: &Variable) -> Rational {
        self.factors
            .iter()
            .find_map(|(atom, exp)| match atom {
                Atom::Var(v) if v == var => Some(exp.clone()),
                _ => None,
            })
            .unwrap_or_else(Rational::zero)
    }

    /// True if `var` occurs inside a grouped factor.
    pub fn groups_contain(&self, var: &Variable) -> bool {
        self.factors.iter().any(|(atom, _)| matches!(atom, Atom::Group(base) if base.contains(var)))
    }

    /// The factors that do not mention `var`, directly or inside a group.
    pub fn free_of(&self, var: &Variable) -> Monomial {
        Monomial { factors: self.factors.iter().filter(|(atom, _)| !atom.contains(var)).cloned().collect() }
    }

    pub fn without(&self, var: &Variable) -> Monomial {
        Monomial {
            factors: self.factors.iter().filter(|(atom, _)| !matches!(atom, Atom::Var(v) if v == var)).cloned().collect(),
        }
    }
}

/// An immutable algebraic term in canonical form.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Expr {
    // Coefficients are never zero; the constant term uses the empty monomial.
    terms: BTreeMap<Monomial, Rational>,
}

impl Expr {
    pub fn zero() -> Self { Self::default() }

    pub fn one() -> Self { Self::constant(Rational::one()) }

    pub fn constant(value: Rational) -> Self {
        let mut terms = BTreeMap::new();
        if !value.is_zero() {
            terms.insert(Monomial::default(), value);
        }
        Self { terms }
    }

    pub fn variable(var: Variable) -> Self {
        Self::term(Rational::one(), Monomial::single(Atom::Var(var), Rational::one()))
    }

    fn term(coef: Rational, monomial: Monomial) -> Self {
        let mut terms = BTreeMap::new();
        if !coef.is_zero() {
            terms.insert(monomial, coef);
        }
        Self { terms }
    }

    pub(crate) fn from_term(coef: Rational, monomial: Monomial) -> Self {
        Self::normalized_term(coef, monomial)
    }

    /// Builds `coef * monomial`, expanding grouped factors whose exponent
    /// became a positive integer and folding constant groups with exact powers.
    fn normalized_term(mut coef: Rational, monomial: Monomial) -> Self {
        if coef.is_zero() {
            return Self::zero();
        }
        let mut kept: SmallVec<[(Atom, Rational); 2]> = SmallVec::new();
        let mut expansions = Vec::new();
        for (atom, exp) in monomial.factors {
            match &atom {
                Atom::Group(base) => {
                    if let Some(c) = base.as_constant() {
                        if let Some(exact) = c.pow_exact(&exp) {
                            coef = coef * exact;
                            continue;
                        }
                    } else if let Some(n) = expansion_exponent(&exp) {
                        expansions.push(base.powi_positive(n));
                        continue;
                    }
                    kept.push((atom, exp));
                }
                Atom::Var(_) => kept.push((atom, exp)),
            }
        }
        let mut result = Self::term(coef, Monomial { factors: kept });
        for expansion in expansions {
            result = result.mul_expr(&expansion);
        }
        result
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &Rational)> { self.terms.iter() }

    pub fn is_zero(&self) -> bool { self.terms.is_empty() }

    /// The value of a constant expression.
    pub fn as_constant(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::zero()),
            1 => self.terms.iter().next().filter(|(m, _)| m.is_one()).map(|(_, c)| c.clone()),
            _ => None,
        }
    }

    /// The variable, when this expression is exactly one bare variable.
    pub fn as_variable(&self) -> Option<&Variable> {
        let (monomial, coef) = self.single_term()?;
        match monomial.factors() {
            [(Atom::Var(v), exp)] if exp.is_one() && coef.is_one() => Some(v),
            _ => None,
        }
    }

    fn single_term(&self) -> Option<(&Monomial, &Rational)> {
        if self.terms.len() == 1 {
            self.terms.iter().next()
        } else {
            None
        }
    }

    /// All variables in order of first appearance.
    pub fn variables(&self) -> IndexSet<Variable> {
        let mut out = IndexSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut IndexSet<Variable>) {
        for monomial in self.terms.keys() {
            for (atom, _) in monomial.factors() {
                match atom {
                    Atom::Var(v) => { out.insert(v.clone()); }
                    Atom::Group(base) => base.collect_variables(out),
                }
            }
        }
    }

    pub fn contains(&self, var: &Variable) -> bool {
        self.terms.keys().any(|m| m.factors().iter().any(|(atom, _)| atom.contains(var)))
    }

    fn add_expr(&self, other: &Expr) -> Expr {
        let mut terms = self.terms.clone();
        for (monomial, coef) in &other.terms {
            let sum = match terms.get(monomial) {
                Some(existing) => existing + coef,
                None => coef.clone(),
            };
            if sum.is_zero() {
                terms.remove(monomial);
            } else {
                terms.insert(monomial.clone(), sum);
            }
        }
        Expr { terms }
    }

    fn mul_expr(&self, other: &Expr) -> Expr {
        let mut result = Expr::zero();
        for (m1, c1) in &self.terms {
            for (m2, c2) in &other.terms {
                result = result.add_expr(&Self::normalized_term(c1 * c2, m1.merge(m2)));
            }
        }
        result
    }

    fn powi_positive(&self, exp: i64) -> Expr {
        let mut result = Expr::one();
        let mut base = self.clone();
        let mut n = exp;
        while n > 0 {
            if n & 1 == 1 {
                result = result.mul_expr(&base);
            }
            n >>= 1;
            if n > 0 {
                base = base.mul_expr(&base);
            }
        }
        result
    }

    /// `self ^ exp`. Single terms distribute the power over their factors;
    /// sums are expanded for positive integer powers and grouped otherwise.
    pub fn pow(&self, exp: Rational) -> Expr {
        if exp.is_zero() {
            return Expr::one();
        }
        if exp.is_one() {
            return self.clone();
        }
        if let Some((monomial, coef)) = self.single_term() {
            let coef_part = match coef.pow_exact(&exp) {
                Some(exact) => Expr::constant(exact),
                None => Self::term(Rational::one(), Monomial::single(Atom::Group(Box::new(Expr::constant(coef.clone()))), exp.clone())),
            };
            let raised = Monomial {
                factors: monomial.factors().iter().map(|(atom, e)| (atom.clone(), e * &exp)).collect(),
            };
            return coef_part.mul_expr(&Self::normalized_term(Rational::one(), raised));
        }
        if let Some(n) = expansion_exponent(&exp) {
            return self.powi_positive(n);
        }
        Self::term(Rational::one(), Monomial::single(Atom::Group(Box::new(self.clone())), exp))
    }

    pub fn sqrt(&self) -> Expr {
        self.pow(Rational::new(1, 2))
    }

    pub fn recip(&self) -> Expr {
        self.pow(Rational::integer(-1))
    }

    /// Replaces variables through `lookup`, renormalizing the result.
    pub fn substitute_with(&self, lookup: &dyn Fn(&Variable) -> Option<Expr>) -> Expr {
        let mut result = Expr::zero();
        for (monomial, coef) in &self.terms {
            let mut term = Expr::constant(coef.clone());
            for (atom, exp) in monomial.factors() {
                let base = match atom {
                    Atom::Var(v) => lookup(v).unwrap_or_else(|| Expr::variable(v.clone())),
                    Atom::Group(inner) => inner.substitute_with(lookup),
                };
                term = term.mul_expr(&base.pow(exp.clone()));
            }
            result = result.add_expr(&term);
        }
        result
    }

    pub fn substitute(&self, mapping: &Substitution) -> Expr {
        if mapping.is_empty() {
            return self.clone();
        }
        self.substitute_with(&|v| mapping.get(v).cloned())
    }

    /// Substitutes one set of variables by others.
    pub fn rename(&self, mapping: &IndexMap<Variable, Variable>) -> Expr {
        if mapping.is_empty() {
            return self.clone();
        }
        self.substitute_with(&|v| mapping.get(v).cloned().map(Expr::variable))
    }

    /// Numeric value of a variable-free expression.
    pub fn to_f64(&self) -> Option<f64> {
        let mut total = 0.0;
        for (monomial, coef) in &self.terms {
            let mut term = coef.to_f64();
            for (atom, exp) in monomial.factors() {
                let base = match atom {
                    Atom::Var(_) => return None,
                    Atom::Group(inner) => inner.to_f64()?,
                };
                term *= base.powf(exp.to_f64());
            }
            total += term;
        }
        Some(total)
    }

    /// Assumptions that hold for every value of this expression, derived from
    /// the assumptions of its variables.
    pub fn assumptions(&self) -> Assumptions {
        if let Some(c) = self.as_constant() {
            return constant_assumptions(&c);
        }
        self.terms
            .iter()
            .map(|(monomial, coef)| {
                monomial.factors().iter().fold(constant_assumptions(coef), |acc, (atom, exp)| {
                    let base = match atom {
                        Atom::Var(v) => v.assumptions(),
                        Atom::Group(inner) => inner.assumptions(),
                    };
                    acc.common(power_assumptions(base, exp))
                })
            })
            .reduce(Assumptions::common)
            .unwrap_or_default()
    }
}

fn constant_assumptions(c: &Rational) -> Assumptions {
    Assumptions {
        real: true,
        rational: true,
        integer: c.is_integer(),
        nonnegative: !c.is_negative(),
        positive: c.is_positive(),
    }
}

fn power_assumptions(base: Assumptions, exp: &Rational) -> Assumptions {
    if base.positive {
        return Assumptions {
            positive: true,
            rational: base.rational && exp.is_integer(),
            integer: base.integer && exp.is_integer() && exp.is_positive(),
            ..Assumptions::default()
        }
        .closed();
    }
    if exp.is_integer() && exp.is_positive() {
        let even = exp.has_even_numer();
        return Assumptions {
            nonnegative: base.nonnegative || (even && base.real),
            ..base
        }
        .closed();
    }
    if base.nonnegative && exp.is_positive() {
        return Assumptions::nonnegative();
    }
    Assumptions::none()
}

/// Positive integer powers of sums up to this are expanded; larger ones stay
/// grouped.
const MAX_EXPANSION: i64 = 32;

fn expansion_exponent(exp: &Rational) -> Option<i64> {
    exp.to_i64().filter(|n| (1..=MAX_EXPANSION).contains(n))
}

/// Rebuilds `expr` in canonical form.
pub fn simplify(expr: &Expr) -> Expr {
    expr.substitute_with(&|_| None)
}

impl From<Variable> for Expr {
    fn from(var: Variable) -> Self { Expr::variable(var) }
}

impl From<&Variable> for Expr {
    fn from(var: &Variable) -> Self { Expr::variable(var.clone()) }
}

impl From<Rational> for Expr {
    fn from(value: Rational) -> Self { Expr::constant(value) }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self { Expr::constant(Rational::from(value)) }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self { Expr::constant(Rational::from(value)) }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr { self.mul_expr(&Expr::constant(-Rational::one())) }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr { -&self }
}

macro_rules! impl_binary_ops {
    ($($trait:ident $method:ident => |$a:ident, $b:ident| $body:expr;)*) => {$(
        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr { let ($a, $b) = (self, rhs); $body }
        }
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr { $trait::$method(&self, &rhs) }
        }
        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr { $trait::$method(&self, rhs) }
        }
        impl $trait<Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr { $trait::$method(self, &rhs) }
        }
        impl $trait<i64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: i64) -> Expr { $trait::$method(&self, &Expr::from(rhs)) }
        }
        impl $trait<i64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: i64) -> Expr { $trait::$method(self, &Expr::from(rhs)) }
        }
        impl $trait<Expr> for i64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr { $trait::$method(&Expr::from(self), &rhs) }
        }
        impl $trait<&Expr> for i64 {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr { $trait::$method(&Expr::from(self), rhs) }
        }
    )*};
}

impl_binary_ops! {
    Add add => |a, b| a.add_expr(b);
    Sub sub => |a, b| a.add_expr(&-b);
    Mul mul => |a, b| a.mul_expr(b);
    Div div => |a, b| a.mul_expr(&b.recip());
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Var(v) => write!(f, "{}", v),
            Atom::Group(inner) if inner.as_constant().is_some_and(|c| !c.is_negative() && c.is_integer()) => {
                write!(f, "{}", inner)
            }
            Atom::Group(inner) => write!(f, "({})", inner),
        }
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (atom, exp)) in self.factors.iter().enumerate() {
            if i > 0 {
                f.write_str("*")?;
            }
            if exp.is_one() {
                write!(f, "{}", atom)?;
            } else if *exp == Rational::new(1, 2) {
                match atom {
                    Atom::Group(inner) => write!(f, "sqrt({})", inner)?,
                    Atom::Var(v) => write!(f, "sqrt({})", v)?,
                }
            } else if exp.is_integer() && exp.is_positive() {
                write!(f, "{}^{}", atom, exp)?;
            } else {
                write!(f, "{}^({})", atom, exp)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return f.write_str("0");
        }
        // Symbolic terms first, the constant last.
        let mut ordered: Vec<(&Monomial, &Rational)> = self.terms.iter().filter(|(m, _)| !m.is_one()).collect();
        ordered.extend(self.terms.iter().filter(|(m, _)| m.is_one()));
        for (i, (monomial, coef)) in ordered.into_iter().enumerate() {
            let magnitude = coef.abs();
            match (i, coef.is_negative()) {
                (0, true) => f.write_str("-")?,
                (0, false) => {}
                (_, true) => f.write_str(" - ")?,
                (_, false) => f.write_str(" + ")?,
            }
            if monomial.is_one() {
                write!(f, "{}", magnitude)?;
            } else if magnitude.is_one() {
                write!(f, "{}", monomial)?;
            } else {
                write!(f, "{}*{}", magnitude, monomial)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    struct Symbols {
        a: Expr,
        b: Expr,
        x: Variable,
    }

    #[fixture]
    fn symbols() -> Symbols {
        let x = Variable::new("x", Assumptions::none());
        Symbols {
            a: Expr::variable(Variable::new("a", Assumptions::none())),
            b: Expr::variable(Variable::new("b", Assumptions::none())),
            x,
        }
    }

    #[rstest]
    fn test_addition_is_canonical(symbols: Symbols) {
        let Symbols { a, b, .. } = symbols;
        assert_eq!(&a + &b, &b + &a);
        assert_eq!((&a + &b) - &a, b);
        assert!((&a - &a).is_zero());
    }

    #[rstest]
    fn test_products_expand(symbols: Symbols) {
        let Symbols { a, b, .. } = symbols;
        let square = (&a + &b) * (&a + &b);
        let expanded = &a * &a + 2 * (&a * &b) + &b * &b;
        assert_eq!(square, expanded);
        assert_eq!((&a + &b).pow(Rational::integer(2)), expanded);
    }

    #[rstest]
    fn test_division_cancels_monomials(symbols: Symbols) {
        let Symbols { a, b, .. } = symbols;
        assert_eq!((&a * &b) / &b, a);
        assert_eq!(Expr::from(6) / Expr::from(4), Expr::constant(Rational::new(3, 2)));
    }

    #[rstest]
    fn test_square_root_of_square_group(symbols: Symbols) {
        let Symbols { a, b, .. } = symbols;
        let root = (&a + &b).sqrt();
        assert_eq!(&root * &root, &a + &b);
        assert_eq!(Expr::from(25).sqrt(), Expr::from(5));
        assert_eq!(Expr::from(2).sqrt().to_f64().map(|v| (v * 1000.0).round()), Some(1414.0));
    }

    #[rstest]
    fn test_substitute_and_rename(symbols: Symbols) {
        let Symbols { a, x, .. } = symbols;
        let formula = Expr::variable(x.clone()) * 3 + &a;
        let mut mapping = Substitution::new();
        mapping.insert(x.clone(), Expr::from(2));
        assert_eq!(formula.substitute(&mapping), &a + 6);

        let y = Variable::new("y", Assumptions::none());
        let renamed = formula.rename(&IndexMap::from([(x.clone(), y.clone())]));
        assert!(renamed.contains(&y));
        assert!(!renamed.contains(&x));
    }

    #[rstest]
    fn test_substitution_folds_groups(symbols: Symbols) {
        let Symbols { x, .. } = symbols;
        let dx = Expr::variable(x.clone());
        let length = (&dx * &dx + 16).sqrt();
        let mut mapping = Substitution::new();
        mapping.insert(x, Expr::from(3));
        assert_eq!(length.substitute(&mapping), Expr::from(5));
    }

    #[test]
    fn test_inferred_assumptions() {
        let p = Expr::variable(Variable::new("p", Assumptions::positive().and(Assumptions::rational())));
        let q = Expr::variable(Variable::new("q", Assumptions::positive()));
        let r = Expr::variable(Variable::new("r", Assumptions::real()));
        assert!((&p + &q).assumptions().positive);
        assert!((&p * 2).assumptions().rational);
        assert!(!(&p - &q).assumptions().nonnegative);
        assert!((&r * &r).assumptions().nonnegative);
        assert!(!(&p + &r).assumptions().positive);
        assert!((&p / &q).assumptions().positive);
    }

    #[rstest]
    fn test_display(symbols: Symbols) {
        let Symbols { a, b, .. } = symbols;
        assert_eq!((&a + &b + 2).to_string(), "a + b + 2");
        assert_eq!((Expr::from(3) - &a).to_string(), "-a + 3");
        assert_eq!((&a * 2).to_string(), "2*a");
        assert_eq!(a.sqrt().to_string(), "sqrt(a)");
        assert_eq!(Expr::zero().to_string(), "0");
    }

    #[rstest]
    fn test_as_variable(symbols: Symbols) {
        let Symbols { a, x, .. } = symbols;
        assert_eq!(Expr::variable(x.clone()).as_variable(), Some(&x));
        assert_eq!((&a * 2).as_variable(), None);
        assert_eq!(Expr::from(7).as_constant(), Some(Rational::integer(7)));
    }
}
