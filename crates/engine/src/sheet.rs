//! Sparse sheet storage.
//!
//! Only edited cells occupy memory; everything else inside the bounds reads
//! as an empty cell. The sheet is the evaluator's value source: referenced
//! cells yield their committed value, which for error cells is the last good
//! one, so errors never cascade through dependents.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::addr::{Bounds, Coord};
use crate::cell::Cell;
use crate::formula::eval::ValueSource;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sheet {
    bounds: Bounds,
    cells: FxHashMap<Coord, Cell>,
}

impl Sheet {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            cells: FxHashMap::default(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn get(&self, coord: Coord) -> Option<&Cell> {
        self.cells.get(&coord)
    }

    pub fn get_mut(&mut self, coord: Coord) -> Option<&mut Cell> {
        self.cells.get_mut(&coord)
    }

    /// Store a cell. Writing empty content still stores the cell so its raw
    /// input survives for history; fully pruning happens on snapshot restore.
    pub fn set(&mut self, coord: Coord, cell: Cell) {
        self.cells.insert(coord, cell);
    }

    pub fn remove(&mut self, coord: Coord) -> Option<Cell> {
        self.cells.remove(&coord)
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coord, &Cell)> {
        self.cells.iter().map(|(c, cell)| (*c, cell))
    }

    /// Coordinates of every formula cell, in no particular order.
    pub fn formula_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        self.cells
            .iter()
            .filter(|(_, cell)| cell.is_formula())
            .map(|(c, _)| *c)
    }

    /// The raw input as typed, empty string for untouched cells.
    pub fn raw_input(&self, coord: Coord) -> String {
        self.cells
            .get(&coord)
            .map(|c| c.raw_input.clone())
            .unwrap_or_default()
    }

    /// What the host UI renders: error token for error cells, committed
    /// value otherwise, empty string for untouched cells.
    pub fn display(&self, coord: Coord) -> String {
        self.cells.get(&coord).map(|c| c.display()).unwrap_or_default()
    }
}

impl ValueSource for Sheet {
    fn display_value(&self, coord: Coord) -> String {
        self.cells
            .get(&coord)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }
}
