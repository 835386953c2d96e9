//! Recalculation reporting types.
//!
//! A [`RecalcReport`] summarizes one scheduler pass; a [`CycleReport`]
//! names the cells behind a rejected edit or an unorderable graph.

use crate::addr::Coord;

/// Report from one recalculation pass.
#[derive(Debug, Clone, Default)]
pub struct RecalcReport {
    /// Number of formula cells evaluated this pass.
    pub cells_recomputed: usize,

    /// Cells whose committed display value actually changed, with their new
    /// values, in evaluation order. This is the value map handed to the host.
    pub changed: Vec<(Coord, String)>,

    /// History token identifying the state committed by this pass.
    pub history_token: u64,
}

impl RecalcReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concise one-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "{} cells recomputed, {} changed, token={}",
            self.cells_recomputed,
            self.changed.len(),
            self.history_token
        )
    }
}

/// Report when cycle detection finds a circular reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Cells participating in the cycle. May be a subset for large cycles.
    pub cells: Vec<Coord>,

    /// Human-readable description of the cycle.
    pub message: String,
}

impl CycleReport {
    pub fn new(cells: Vec<Coord>, message: impl Into<String>) -> Self {
        Self {
            cells,
            message: message.into(),
        }
    }

    /// Cycle report for a self-referencing cell.
    pub fn self_reference(cell: Coord) -> Self {
        Self {
            cells: vec![cell],
            message: format!("Cell {cell} references itself"),
        }
    }

    /// Cycle report for a multi-cell cycle.
    pub fn cycle(cells: Vec<Coord>) -> Self {
        let cell_list: Vec<String> = cells.iter().map(|c| c.to_string()).collect();
        let message = if cells.len() <= 5 {
            format!("Circular reference: {}", cell_list.join(" -> "))
        } else {
            format!(
                "Circular reference involving {} cells: {} -> ... -> {}",
                cells.len(),
                cell_list[0],
                cell_list[cell_list.len() - 1]
            )
        };
        Self { cells, message }
    }
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CycleReport {}
