// Formula evaluator - walks the typed AST against a value source.

use crate::addr::Coord;

use super::ast::{AggArg, AggFunc, Expr, Literal, Operand};
use super::functions;

/// Read access to committed display values during evaluation.
///
/// Referenced cells always yield a display string: empty cells read as `""`
/// and cells in an error state yield their last good display value, so one
/// cell's error never cascades through its dependents.
pub trait ValueSource {
    fn display_value(&self, coord: Coord) -> String;
}

/// Evaluate an expression to its display value.
///
/// Evaluation is total: coercion rules absorb non-numeric inputs, so this
/// never fails. Only the chosen IF branch is evaluated.
pub fn evaluate(expr: &Expr, source: &impl ValueSource) -> String {
    match expr {
        Expr::Literal(lit) => literal_display(lit),
        Expr::Ref(coord) => source.display_value(*coord),
        // A bare range outside a function call reads as its top-left cell.
        Expr::Range(range) => source.display_value(range.start),
        Expr::Agg { func, args } => {
            let values = collect_values(args, source);
            let n = match func {
                AggFunc::Sum => functions::sum(&values),
                AggFunc::Average => functions::average(&values),
                AggFunc::Count => functions::count(&values),
                AggFunc::Min => functions::min(&values),
                AggFunc::Max => functions::max(&values),
            };
            functions::fmt_number(n)
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let lhs = operand_number(&cond.lhs, source);
            let rhs = operand_number(&cond.rhs, source);
            if cond.op.apply(lhs, rhs) {
                evaluate(then_branch, source)
            } else {
                evaluate(else_branch, source)
            }
        }
    }
}

fn literal_display(lit: &Literal) -> String {
    match lit {
        Literal::Number(n) => functions::fmt_number(*n),
        Literal::Text(s) => s.clone(),
    }
}

/// Flatten aggregate arguments into display values. Every cell of a range
/// contributes, empties included; each function applies its own coercion.
fn collect_values(args: &[AggArg], source: &impl ValueSource) -> Vec<String> {
    let mut values = Vec::new();
    for arg in args {
        match arg {
            AggArg::Ref(coord) => values.push(source.display_value(*coord)),
            AggArg::Range(range) => {
                values.extend(range.cells().map(|c| source.display_value(c)));
            }
            AggArg::Literal(lit) => values.push(literal_display(lit)),
        }
    }
    values
}

fn operand_number(operand: &Operand, source: &impl ValueSource) -> f64 {
    match operand {
        Operand::Ref(coord) => functions::coerce_number(&source.display_value(*coord)),
        Operand::Literal(Literal::Number(n)) => *n,
        Operand::Literal(Literal::Text(s)) => functions::coerce_number(s),
    }
}
