//! Engine boundary: edits, bulk load, value queries, undo/redo.
//!
//! Every mutation runs the same pipeline: classify the input, update the
//! dependency graph (rejecting edits that would close a cycle), compute the
//! affected set, order it topologically, evaluate each cell once, then
//! commit a history snapshot.

use log::debug;
use rustc_hash::FxHashSet;

use crate::addr::{Bounds, Coord};
use crate::cell::{Cell, CellContent};
use crate::dep_graph::DepGraph;
use crate::error::{CellError, EngineError};
use crate::formula::eval::evaluate;
use crate::formula::parser;
use crate::formula::refs::extract_coords;
use crate::history::History;
use crate::recalc::RecalcReport;
use crate::sheet::Sheet;

pub struct Engine {
    sheet: Sheet,
    graph: DepGraph,
    history: History,
    /// Cells whose last edit was rejected for closing a cycle. The flag
    /// lives outside the sheet so committed snapshots never carry it; it
    /// clears when the cell is next edited or recomputed.
    rejected: FxHashSet<Coord>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_bounds(Bounds::default())
    }

    pub fn with_bounds(bounds: Bounds) -> Self {
        let sheet = Sheet::new(bounds);
        Self {
            history: History::new(sheet.clone()),
            graph: DepGraph::new(),
            sheet,
            rejected: FxHashSet::default(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.sheet.bounds()
    }

    /// Apply one edit: store the raw input at `addr`, rewire the graph, and
    /// recalculate everything downstream.
    ///
    /// Returns the recalculation report (changed values plus the new history
    /// token). An edit that would close a dependency cycle is rejected: the
    /// graph and cell content stay as they were, the cell is flagged
    /// `#CYCLE!`, nothing is committed, and the error is returned.
    pub fn apply_edit(&mut self, addr: &str, raw_input: &str) -> Result<RecalcReport, EngineError> {
        let coord = self.resolve_addr(addr)?;

        let mut cell = Cell::from_input(raw_input);
        let previous = self.sheet.get(coord).cloned();

        let new_preds = match &mut cell.content {
            CellContent::Formula { body, ast } => {
                match parser::parse(body, self.sheet.bounds()) {
                    Ok(parsed) => {
                        let preds = extract_coords(&parsed);
                        *ast = Some(parsed);
                        preds
                    }
                    Err(err) => {
                        // Malformed formula: keep the text, flag the cell,
                        // and let dependents keep reading the last good value.
                        cell.error = Some(err.cell_error());
                        FxHashSet::default()
                    }
                }
            }
            _ => FxHashSet::default(),
        };

        if let Some(report) = self.graph.would_create_cycle(coord, &new_preds) {
            // Reject before touching any edge or cell. The prior content
            // survives untouched; the flag is a display overlay only.
            self.rejected.insert(coord);
            debug!("edit {coord} rejected: {report}");
            return Err(EngineError::CircularReference(report));
        }
        self.rejected.remove(&coord);

        // Carry the last good value so dependents of an error cell are not
        // poisoned; a healthy formula cell recomputes it below anyway.
        if cell.is_formula() || cell.error.is_some() {
            if let Some(prev) = &previous {
                cell.value = prev.value.clone();
            }
        }

        self.graph.replace_edges(coord, new_preds);
        self.sheet.set(coord, cell);

        let mut report = self.recalc_from(coord);
        report.history_token = self.history.commit(self.sheet.clone());
        debug!("edit {coord}: {}", report.summary());
        Ok(report)
    }

    /// Replace the whole sheet from `(address, raw_input)` pairs.
    ///
    /// Not an undoable edit: history restarts with the loaded state as its
    /// baseline. Cells on a dependency cycle are flagged `#CYCLE!` and left
    /// unevaluated rather than failing the load; everything else evaluates
    /// in dependency order.
    pub fn load_sheet<'a, I>(&mut self, entries: I) -> Result<RecalcReport, EngineError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let bounds = self.sheet.bounds();
        let mut sheet = Sheet::new(bounds);
        let mut graph = DepGraph::new();

        for (addr, raw_input) in entries {
            let coord = Coord::parse(addr)?;
            if !bounds.contains(coord) {
                return Err(EngineError::MalformedReference {
                    token: addr.to_string(),
                });
            }

            let mut cell = Cell::from_input(raw_input);
            if let CellContent::Formula { body, ast } = &mut cell.content {
                match parser::parse(body, bounds) {
                    Ok(parsed) => {
                        graph.replace_edges(coord, extract_coords(&parsed));
                        *ast = Some(parsed);
                    }
                    Err(err) => cell.error = Some(err.cell_error()),
                }
            }
            sheet.set(coord, cell);
        }

        // Cycles are marked, not rejected: their members show #CYCLE! and
        // stay out of the evaluation set, so dependents read them as empty.
        let cycle_members = graph.cycle_members();
        for &coord in &cycle_members {
            if let Some(cell) = sheet.get_mut(coord) {
                cell.error = Some(CellError::Cycle);
            }
        }

        self.sheet = sheet;
        self.graph = graph;
        self.rejected.clear();

        let evaluable: FxHashSet<Coord> = self
            .sheet
            .formula_cells()
            .filter(|c| !cycle_members.contains(c) && self.sheet.get(*c).is_some_and(|cell| cell.ast().is_some()))
            .collect();
        let mut report = self.evaluate_ordered(&evaluable);

        self.history.reset(self.sheet.clone());
        report.history_token = self.history.current_token();
        debug!(
            "load: {} cells, {} on cycles, {}",
            self.sheet.len(),
            cycle_members.len(),
            report.summary()
        );
        Ok(report)
    }

    /// The display value at `addr`: error token for flagged cells, committed
    /// value otherwise, empty string for untouched cells.
    pub fn get_value(&self, addr: &str) -> Result<String, EngineError> {
        let coord = self.resolve_addr(addr)?;
        if self.rejected.contains(&coord) {
            return Ok(CellError::Cycle.token().to_string());
        }
        Ok(self.sheet.display(coord))
    }

    /// The raw input at `addr` when it holds a formula, `None` otherwise.
    pub fn get_formula(&self, addr: &str) -> Result<Option<String>, EngineError> {
        let coord = self.resolve_addr(addr)?;
        Ok(self
            .sheet
            .get(coord)
            .filter(|c| c.is_formula())
            .map(|c| c.raw_input.clone()))
    }

    /// Raw input at `addr`, empty string for untouched cells.
    pub fn get_raw_input(&self, addr: &str) -> Result<String, EngineError> {
        let coord = self.resolve_addr(addr)?;
        Ok(self.sheet.raw_input(coord))
    }

    /// Step back to the previous committed state. Returns the restored
    /// state's value changes, or `None` at the baseline.
    pub fn undo(&mut self) -> Option<RecalcReport> {
        let (sheet, token) = self.history.undo()?;
        Some(self.restore(sheet, token, "undo"))
    }

    /// Step forward along the redo branch. Returns the restored state's
    /// value changes, or `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<RecalcReport> {
        let (sheet, token) = self.history.redo()?;
        Some(self.restore(sheet, token, "redo"))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    fn resolve_addr(&self, addr: &str) -> Result<Coord, EngineError> {
        let coord = Coord::parse(addr)?;
        if !self.sheet.bounds().contains(coord) {
            return Err(EngineError::MalformedReference {
                token: addr.to_string(),
            });
        }
        Ok(coord)
    }

    /// Recalculate the edited cell (if it holds a live formula) plus its
    /// transitive dependents, in dependency order.
    fn recalc_from(&mut self, edited: Coord) -> RecalcReport {
        let mut dirty = self.graph.affected_set(&[edited]);
        if self.sheet.get(edited).is_some_and(|c| c.ast().is_some()) {
            dirty.insert(edited);
        }

        let mut report = self.evaluate_ordered(&dirty);

        // The edited cell always appears in the change map, literal or not,
        // so the host can refresh it without diffing.
        if !report.changed.iter().any(|(c, _)| *c == edited) {
            report.changed.insert(0, (edited, self.sheet.display(edited)));
        }
        report
    }

    /// Evaluate a set of formula cells in topological order, each exactly
    /// once. The caller guarantees the set is acyclic.
    fn evaluate_ordered(&mut self, cells: &FxHashSet<Coord>) -> RecalcReport {
        let mut report = RecalcReport::new();

        let order = match self.graph.topo_order(cells) {
            Ok(order) => order,
            Err(cycle) => {
                // Cycles loaded via load_sheet stay in the graph, so an edit
                // feeding one lands here. Their members keep the #CYCLE! flag
                // and are skipped; every orderable dependent still evaluates.
                debug!("recalc skipping cycle members: {cycle}");
                let on_cycle = self.graph.cycle_members();
                let rest: FxHashSet<Coord> = cells.difference(&on_cycle).copied().collect();
                self.graph.topo_order(&rest).unwrap_or_default()
            }
        };

        for coord in &order {
            self.rejected.remove(coord);
        }

        for coord in order {
            let Some(ast) = self.sheet.get(coord).and_then(|c| c.ast()).cloned() else {
                continue;
            };
            let value = evaluate(&ast, &self.sheet);
            report.cells_recomputed += 1;

            if let Some(cell) = self.sheet.get_mut(coord) {
                if cell.value != value || cell.error.is_some() {
                    cell.value = value.clone();
                    cell.error = None;
                    report.changed.push((coord, value));
                }
            }
        }

        report
    }

    /// Swap in a snapshot, rebuild the graph from it, and report the cells
    /// whose display changed relative to the outgoing state.
    fn restore(&mut self, sheet: Sheet, token: u64, what: &str) -> RecalcReport {
        let outgoing = std::mem::replace(&mut self.sheet, sheet);
        self.rejected.clear();

        self.graph = DepGraph::new();
        let formulas: Vec<Coord> = self.sheet.formula_cells().collect();
        for coord in formulas {
            if let Some(ast) = self.sheet.get(coord).and_then(|c| c.ast()) {
                let preds = extract_coords(ast);
                self.graph.replace_edges(coord, preds);
            }
        }

        let mut touched: FxHashSet<Coord> = outgoing.iter().map(|(c, _)| c).collect();
        touched.extend(self.sheet.iter().map(|(c, _)| c));

        let mut changed: Vec<(Coord, String)> = touched
            .into_iter()
            .filter(|&c| outgoing.display(c) != self.sheet.display(c))
            .map(|c| (c, self.sheet.display(c)))
            .collect();
        changed.sort_by_key(|(c, _)| *c);

        let report = RecalcReport {
            cells_recomputed: 0,
            changed,
            history_token: token,
        };
        debug!("{what}: {}", report.summary());
        report
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
