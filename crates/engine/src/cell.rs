//! Cell state: raw input, classified content, committed display value.

use serde::{Deserialize, Serialize};

use crate::error::CellError;
use crate::formula::ast::Expr;
use crate::formula::functions::fmt_number;

/// Classified cell content, derived from the raw input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CellContent {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    /// `body` is the text after the `=` marker. `ast` is present only when
    /// the body parsed; it is rebuilt from `body` on load, never serialized.
    Formula {
        body: String,
        #[serde(skip)]
        ast: Option<Expr>,
    },
}

impl CellContent {
    /// Classify raw input: `=`-prefixed text is a formula (parsed later,
    /// against sheet bounds), numeric text is a number, anything else text.
    pub fn classify(input: &str) -> Self {
        if input.is_empty() {
            return CellContent::Empty;
        }
        if let Some(body) = input.strip_prefix('=') {
            return CellContent::Formula {
                body: body.to_string(),
                ast: None,
            };
        }
        if let Ok(num) = input.trim().parse::<f64>() {
            return CellContent::Number(num);
        }
        CellContent::Text(input.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Exactly what the user typed, preserved for `get_formula` and history.
    pub raw_input: String,
    pub content: CellContent,
    /// Committed display value. For error cells this holds the last good
    /// value so dependents keep reading a usable input.
    pub value: String,
    pub error: Option<CellError>,
}

impl Cell {
    /// Build a cell from raw input. Literal content gets its display value
    /// immediately; formula cells start empty until evaluated.
    pub fn from_input(input: &str) -> Self {
        let content = CellContent::classify(input);
        let value = match &content {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Number(n) => fmt_number(*n),
            CellContent::Formula { .. } => String::new(),
        };
        Self {
            raw_input: input.to_string(),
            content,
            value,
            error: None,
        }
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.content, CellContent::Formula { .. })
    }

    /// The parsed formula AST, if this cell holds a formula that parsed.
    pub fn ast(&self) -> Option<&Expr> {
        match &self.content {
            CellContent::Formula { ast, .. } => ast.as_ref(),
            _ => None,
        }
    }

    /// What the host UI should render: the error token when the cell is in
    /// an error state, otherwise the committed value.
    pub fn display(&self) -> String {
        match self.error {
            Some(err) => err.token().to_string(),
            None => self.value.clone(),
        }
    }
}
