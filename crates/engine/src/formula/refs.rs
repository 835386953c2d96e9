//! Reference extraction from the formula AST.
//!
//! Produces the precedent set for dependency graph construction. Ranges
//! expand to every covered cell; both IF branches contribute precedents
//! even though only one is evaluated per pass.

use rustc_hash::FxHashSet;

use crate::addr::Coord;

use super::ast::{AggArg, Expr, Operand};

/// Extract the deduplicated set of cells an expression reads.
pub fn extract_coords(expr: &Expr) -> FxHashSet<Coord> {
    let mut refs = FxHashSet::default();
    collect(expr, &mut refs);
    refs
}

fn collect(expr: &Expr, refs: &mut FxHashSet<Coord>) {
    match expr {
        Expr::Literal(_) => {}
        Expr::Ref(coord) => {
            refs.insert(*coord);
        }
        Expr::Range(range) => {
            refs.extend(range.cells());
        }
        Expr::Agg { args, .. } => {
            for arg in args {
                match arg {
                    AggArg::Ref(coord) => {
                        refs.insert(*coord);
                    }
                    AggArg::Range(range) => {
                        refs.extend(range.cells());
                    }
                    AggArg::Literal(_) => {}
                }
            }
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            collect_operand(&cond.lhs, refs);
            collect_operand(&cond.rhs, refs);
            collect(then_branch, refs);
            collect(else_branch, refs);
        }
    }
}

fn collect_operand(operand: &Operand, refs: &mut FxHashSet<Coord>) {
    if let Operand::Ref(coord) = operand {
        refs.insert(*coord);
    }
}
