//! Typed formula AST.
//!
//! The function set is closed: `Func` is an enum resolved at parse time, so
//! evaluation dispatches with an exhaustive match instead of runtime string
//! comparison. Aggregate arguments are restricted to reference / range /
//! literal operands; only IF branches admit nested expressions.

use crate::addr::{Coord, RangeRef};

/// A formula expression (the body after the `=` marker).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Ref(Coord),
    Range(RangeRef),
    /// SUM / AVERAGE / COUNT / MIN / MAX over flat operands.
    Agg { func: AggFunc, args: Vec<AggArg> },
    /// IF(condition, then, else). Both branches are precedent-tracked even
    /// though only one is evaluated per pass.
    If {
        cond: Condition,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

/// The aggregate half of the fixed function set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    Average,
    Count,
    Min,
    Max,
}

impl AggFunc {
    /// Resolve an (already uppercased) function name. IF is handled
    /// separately by the parser since its shape differs.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SUM" => Some(AggFunc::Sum),
            "AVERAGE" => Some(AggFunc::Average),
            "COUNT" => Some(AggFunc::Count),
            "MIN" => Some(AggFunc::Min),
            "MAX" => Some(AggFunc::Max),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AggFunc::Sum => "SUM",
            AggFunc::Average => "AVERAGE",
            AggFunc::Count => "COUNT",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
        }
    }
}

/// An aggregate argument: flat by construction, no nested calls.
#[derive(Debug, Clone, PartialEq)]
pub enum AggArg {
    Ref(Coord),
    Range(RangeRef),
    Literal(Literal),
}

/// Comparison operators usable inside an IF condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    /// Both `=` and `==` parse to this.
    Eq,
    /// Both `!=` and `<>` parse to this.
    Ne,
}

impl CmpOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Gt => lhs > rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }
}

/// An IF condition: `operand cmpOp operand`, operands coerced numerically.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub lhs: Operand,
    pub op: CmpOp,
    pub rhs: Operand,
}

/// A condition operand: reference or literal only.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Ref(Coord),
    Literal(Literal),
}
