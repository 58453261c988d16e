//! An elimination solver for systems of equations over [`Expr`].
//!
//! The system is split into independent blocks (equations sharing no
//! unknowns), and each block is solved by repeatedly isolating one unknown in
//! one equation and substituting it everywhere else. Unknowns that no
//! equation determines stay symbolic in the result, so every returned
//! solution is a particular solution of the system. Even roots branch, and
//! each branch yields its own solution. An unknown buried in a grouped
//! factor (`sqrt(y^2 + 9) = 5`) is reached by undoing the group's power.

use super::error::AlgebraError;
use super::expr::{Atom, Expr, Substitution};
use super::rational::Rational;
use super::{Equation, Variable};
use crate::config::SolverSettings;
use indexmap::{IndexMap, IndexSet};
use petgraph::unionfind::UnionFind;
use tracing::trace;

/// One consistent assignment of values to the solved unknowns.
pub type Solution = IndexMap<Variable, Expr>;

#[derive(Debug, Clone)]
struct Pending {
    residual: Expr,
    // Preferred unknowns for this equation, left side first.
    order: Vec<Variable>,
}

enum Isolation {
    Single(Expr),
    Branches(Vec<Expr>),
    /// Replacement residuals for the equation, one per branch.
    Rewrite(Vec<Expr>),
}

/// How an unknown may be isolated, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rank {
    ConstantCoefficient,
    MonomialCoefficient,
    Coefficient,
    Power,
    Group,
}

/// Solves `equations` for `unknowns` (every variable present when empty).
///
/// # Returns
/// - `Ok(vec![])` if the system is contradictory, or every candidate solution
///   violates its variables' assumptions (when enforced).
/// - `Ok(solutions)` with one entry per branch, capped at
///   `settings.branch_limit()`.
/// - `Err(AlgebraError::Unsupported)` if some equation cannot be reduced.
pub fn solve(
    equations: &[Equation],
    unknowns: &[Variable],
    settings: &SolverSettings,
) -> Result<Vec<Solution>, AlgebraError> {
    let unknowns: IndexSet<Variable> = if unknowns.is_empty() {
        equations.iter().flat_map(Equation::variables).collect()
    } else {
        unknowns.iter().cloned().collect()
    };

    // 1. Partition: equations sharing an unknown belong to one block.
    let mut blocks = UnionFind::<usize>::new(unknowns.len());
    let mut pending = Vec::with_capacity(equations.len());
    for equation in equations {
        let residual = equation.residual();
        let order: Vec<Variable> = equation.variables().into_iter().filter(|v| unknowns.contains(v)).collect();
        let Some(first) = order.first().and_then(|v| unknowns.get_index_of(v)) else {
            if residual.is_zero() {
                continue;
            }
            trace!(equation = %equation, "contradiction without unknowns");
            return Ok(Vec::new());
        };
        for var in &order[1..] {
            if let Some(index) = unknowns.get_index_of(var) {
                blocks.union(first, index);
            }
        }
        pending.push((first, Pending { residual, order }));
    }

    let labels = blocks.into_labeling();
    let mut grouped: IndexMap<usize, Vec<Pending>> = IndexMap::new();
    for (first, equation) in pending {
        grouped.entry(labels[first]).or_default().push(equation);
    }

    // 2. Solve each block and combine their branches.
    let limit = settings.branch_limit();
    let mut combined = vec![Solution::new()];
    for (_, block) in grouped {
        let mut branches = Vec::new();
        solve_block(block, Solution::new(), &unknowns, settings, &mut branches)?;
        if branches.is_empty() {
            return Ok(Vec::new());
        }
        combined = combined
            .iter()
            .flat_map(|base| {
                branches.iter().map(move |branch| {
                    let mut merged = base.clone();
                    merged.extend(branch.iter().map(|(k, v)| (k.clone(), v.clone())));
                    merged
                })
            })
            .take(limit)
            .collect();
    }
    Ok(combined)
}

fn solve_block(
    mut pending: Vec<Pending>,
    mut solution: Solution,
    unknowns: &IndexSet<Variable>,
    settings: &SolverSettings,
    out: &mut Vec<Solution>,
) -> Result<(), AlgebraError> {
    loop {
        pending.retain(|p| !p.residual.is_zero());
        if let Some(stuck) = pending.iter().find(|p| !p.residual.variables().iter().any(|v| unknowns.contains(v))) {
            trace!(residual = %stuck.residual, "contradiction");
            return Ok(());
        }
        if pending.is_empty() {
            if !settings.enforce_assumptions || admits(&solution) {
                out.push(solution);
            } else {
                trace!("solution rejected by variable assumptions");
            }
            return Ok(());
        }

        let Some((index, var, isolation)) = choose(&pending, unknowns) else {
            return Err(AlgebraError::Unsupported { residual: pending[0].residual.to_string() });
        };
        let chosen = pending.remove(index);
        let limit = settings.branch_limit();

        match isolation {
            Isolation::Single(value) => eliminate(&mut pending, &mut solution, &var, value),
            Isolation::Branches(values) => {
                for value in values {
                    if out.len() >= limit {
                        break;
                    }
                    let mut branch_pending = pending.clone();
                    let mut branch_solution = solution.clone();
                    eliminate(&mut branch_pending, &mut branch_solution, &var, value);
                    solve_block(branch_pending, branch_solution, unknowns, settings, out)?;
                }
                return Ok(());
            }
            Isolation::Rewrite(residuals) => {
                trace!(variable = %var, from = %chosen.residual, branches = residuals.len(), "unwrapping group");
                for residual in residuals {
                    if out.len() >= limit {
                        break;
                    }
                    let mut branch_pending = pending.clone();
                    branch_pending.push(Pending { residual, order: chosen.order.clone() });
                    solve_block(branch_pending, solution.clone(), unknowns, settings, out)?;
                }
                return Ok(());
            }
        }
    }
}

/// Picks the cheapest isolation available, scanning equations in order.
fn choose(pending: &[Pending], unknowns: &IndexSet<Variable>) -> Option<(usize, Variable, Isolation)> {
    for rank in [Rank::ConstantCoefficient, Rank::MonomialCoefficient, Rank::Coefficient, Rank::Power, Rank::Group] {
        for (index, equation) in pending.iter().enumerate() {
            for var in candidates(equation, unknowns) {
                let isolation = match rank {
                    Rank::Group => unwrap_group(&equation.residual, &var),
                    _ => isolate(&equation.residual, &var, rank),
                };
                if let Some(isolation) = isolation {
                    return Some((index, var, isolation));
                }
            }
        }
    }
    None
}

fn candidates(equation: &Pending, unknowns: &IndexSet<Variable>) -> Vec<Variable> {
    let present = equation.residual.variables();
    let mut out: Vec<Variable> = equation.order.iter().filter(|v| present.contains(*v)).cloned().collect();
    for var in present {
        if !out.contains(&var) {
            out.push(var);
        }
    }
    out.retain(|v| unknowns.contains(v));
    out
}

/// Splits `residual` as `coefficient * var^exp + rest`, provided every
/// occurrence of `var` is a direct factor with the same exponent.
fn collect(residual: &Expr, var: &Variable) -> Option<(Rational, Expr, Expr)> {
    let mut exp: Option<Rational> = None;
    let mut coefficient = Expr::zero();
    let mut rest = Expr::zero();
    for (monomial, coef) in residual.terms() {
        if monomial.groups_contain(var) {
            return None;
        }
        let e = monomial.exponent_of(var);
        if e.is_zero() {
            rest = rest + Expr::from_term(coef.clone(), monomial.clone());
            continue;
        }
        if exp.is_none() {
            exp = Some(e);
        } else if exp.as_ref() != Some(&e) {
            return None;
        }
        coefficient = coefficient + Expr::from_term(coef.clone(), monomial.without(var));
    }
    Some((exp?, coefficient, rest))
}

fn isolate(residual: &Expr, var: &Variable, rank: Rank) -> Option<Isolation> {
    let (exp, coefficient, rest) = collect(residual, var)?;
    let linear = exp.is_one();
    let admissible = match rank {
        Rank::ConstantCoefficient => linear && coefficient.as_constant().is_some(),
        Rank::MonomialCoefficient => linear && coefficient.terms().count() == 1,
        Rank::Coefficient => linear,
        Rank::Power => !linear,
        Rank::Group => false,
    };
    if !admissible {
        return None;
    }
    let target = -rest / coefficient;
    if linear {
        return Some(Isolation::Single(target));
    }
    // var^(p/q) = target  =>  var = ±target^(q/p), with both signs when p is even.
    let inverse = exp.recip()?;
    let principal = target.pow(inverse);
    if !exp.has_even_numer() || var.assumptions().nonnegative {
        Some(Isolation::Single(principal))
    } else {
        let negative = -&principal;
        Some(Isolation::Branches(vec![principal, negative]))
    }
}

/// Rewrites `coefficient * group^q + rest = 0`, where `group` is the one
/// factor of the one term mentioning `var`, as `group = target^(1/q)`.
fn unwrap_group(residual: &Expr, var: &Variable) -> Option<Isolation> {
    let mut holder = None;
    let mut rest = Expr::zero();
    for (monomial, coef) in residual.terms() {
        let mut inside = monomial.factors().iter().filter(|(atom, _)| atom.contains(var));
        let Some(first) = inside.next() else {
            rest = rest + Expr::from_term(coef.clone(), monomial.clone());
            continue;
        };
        let ((Atom::Group(group), exp), None, None) = (first, inside.next(), &holder) else {
            return None;
        };
        let coefficient = Expr::from_term(coef.clone(), monomial.free_of(var));
        holder = Some(((**group).clone(), exp.clone(), coefficient));
    }
    let (group, exp, coefficient) = holder?;
    let target = -rest / coefficient;

    // An even root is never negative.
    if exp.has_even_denom() && target.as_constant().is_some_and(|t| t.is_negative()) {
        return Some(Isolation::Rewrite(Vec::new()));
    }
    let principal = target.pow(exp.recip()?);
    let residuals = if exp.has_even_numer() && !group.assumptions().nonnegative {
        vec![&group - &principal, &group + &principal]
    } else {
        vec![&group - &principal]
    };
    Some(Isolation::Rewrite(residuals))
}

fn eliminate(pending: &mut [Pending], solution: &mut Solution, var: &Variable, value: Expr) {
    trace!(variable = %var, value = %value, "eliminating");
    let mapping = Substitution::from([(var.clone(), value.clone())]);
    for existing in solution.values_mut() {
        if existing.contains(var) {
            *existing = existing.substitute(&mapping);
        }
    }
    let introduced = value.variables();
    for equation in pending.iter_mut() {
        if equation.residual.contains(var) {
            equation.residual = equation.residual.substitute(&mapping);
            for v in &introduced {
                if !equation.order.contains(v) {
                    equation.order.push(v.clone());
                }
            }
        }
    }
    solution.insert(var.clone(), value);
}

fn admits(solution: &Solution) -> bool {
    solution.iter().all(|(var, value)| match value.to_f64() {
        Some(approx) => var.assumptions().admits(approx, value.as_constant()),
        None => true,
    })
}
