//! Dependency graph for formula cells.
//!
//! Tracks precedents (cells a formula depends on) and dependents (cells that
//! depend on a given cell) for cycle checks and recalculation ordering.
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B depends on A"  (A is a precedent of B)
//! ```
//!
//! This makes "what breaks if I change X?" trivial: follow outgoing edges.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::addr::Coord;
use crate::recalc::CycleReport;

/// Persistent dependency graph for formula cells.
///
/// Maintains bidirectional adjacency for O(1) lookups:
/// - `preds[B]` = cells that B depends on (precedents)
/// - `succs[A]` = cells that depend on A (dependents)
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** If A ∈ preds[B] then B ∈ succs[A], and vice versa.
/// 2. **No dangling entries:** Empty sets are removed, not stored.
/// 3. **No duplicate edges:** Set semantics enforced by FxHashSet.
/// 4. **Atomic updates:** `replace_edges` is the only mutator that touches both maps.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// Precedents: for each formula cell B, the cells A it depends on.
    preds: FxHashMap<Coord, FxHashSet<Coord>>,

    /// Dependents: for each referenced cell A, the formula cells B that depend on it.
    succs: FxHashMap<Coord, FxHashSet<Coord>>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells this formula cell depends on (incoming edges).
    pub fn precedents(&self, cell: Coord) -> impl Iterator<Item = Coord> + '_ {
        self.preds
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Cells that depend on this cell (outgoing edges).
    pub fn dependents(&self, cell: Coord) -> impl Iterator<Item = Coord> + '_ {
        self.succs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// True if this cell has dependencies tracked in the graph.
    pub fn is_formula_cell(&self, cell: Coord) -> bool {
        self.preds.contains_key(&cell)
    }

    pub fn formula_cell_count(&self) -> usize {
        self.preds.len()
    }

    pub fn referenced_cell_count(&self) -> usize {
        self.succs.len()
    }

    /// Replace all edges for a formula cell atomically.
    ///
    /// This is the primary mutation API. It:
    /// 1. Removes the cell from all its old precedents' successor sets
    /// 2. Clears the cell's precedent set
    /// 3. Adds the cell to all new precedents' successor sets
    /// 4. Sets the cell's new precedent set
    ///
    /// Pass an empty set to clear all edges for this cell.
    pub fn replace_edges(&mut self, formula_cell: Coord, new_preds: FxHashSet<Coord>) {
        // Step 1: Remove old edges
        if let Some(old_preds) = self.preds.remove(&formula_cell) {
            for pred in old_preds {
                if let Some(deps) = self.succs.get_mut(&pred) {
                    deps.remove(&formula_cell);
                    // Clean up empty entries (invariant: no dangling)
                    if deps.is_empty() {
                        self.succs.remove(&pred);
                    }
                }
            }
        }

        // Step 2: If no new precedents, we're done (cell is not a formula or has no refs)
        if new_preds.is_empty() {
            return;
        }

        // Step 3: Add new edges
        for pred in &new_preds {
            self.succs.entry(*pred).or_default().insert(formula_cell);
        }

        // Step 4: Store new precedents
        self.preds.insert(formula_cell, new_preds);
    }

    /// Clear all edges for a cell (formula removed or cell overwritten with a
    /// literal). Convenience wrapper around `replace_edges` with an empty set.
    pub fn clear_cell(&mut self, cell: Coord) {
        self.replace_edges(cell, FxHashSet::default());
    }

    /// Check if wiring `cell` to `new_preds` would create a cycle.
    ///
    /// Does not modify the graph: the check runs against the current edges
    /// before any of the proposed ones are applied. Returns `Some(report)`
    /// if a cycle would be introduced.
    ///
    /// A cycle appears iff some proposed precedent is reachable-from `cell`
    /// along dependent edges (then pred → ... → cell → pred closes a loop),
    /// or the cell references itself.
    pub fn would_create_cycle(&self, cell: Coord, new_preds: &FxHashSet<Coord>) -> Option<CycleReport> {
        if new_preds.contains(&cell) {
            return Some(CycleReport::self_reference(cell));
        }

        let mut visited = FxHashSet::default();
        let mut stack = vec![cell];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(deps) = self.succs.get(&current) {
                for &dep in deps {
                    if new_preds.contains(&dep) {
                        return Some(CycleReport::cycle(vec![dep, cell]));
                    }
                    stack.push(dep);
                }
            }
        }

        None
    }

    /// Transitive dependents of the given roots, roots excluded.
    ///
    /// This is the set of formula cells whose value can change when the
    /// roots' values change.
    pub fn affected_set(&self, roots: &[Coord]) -> FxHashSet<Coord> {
        let mut affected = FxHashSet::default();
        let mut stack: Vec<Coord> = roots.to_vec();

        while let Some(current) = stack.pop() {
            if let Some(deps) = self.succs.get(&current) {
                for &dep in deps {
                    if affected.insert(dep) {
                        stack.push(dep);
                    }
                }
            }
        }

        affected
    }

    /// Topologically order a set of formula cells: precedents before
    /// dependents. Only edges between members of `cells` count.
    ///
    /// Kahn's algorithm with a deterministic tie-break: among ready cells,
    /// the smallest coordinate (row-major) goes first. The queue is kept
    /// sorted descending so the smallest is popped from the end.
    ///
    /// Errs with the unorderable remainder when `cells` contains a cycle.
    pub fn topo_order(&self, cells: &FxHashSet<Coord>) -> Result<Vec<Coord>, CycleReport> {
        if cells.is_empty() {
            return Ok(Vec::new());
        }

        let mut in_degree: FxHashMap<Coord, usize> = FxHashMap::default();
        for &cell in cells {
            let count = self
                .preds
                .get(&cell)
                .map(|preds| preds.iter().filter(|p| cells.contains(p)).count())
                .unwrap_or(0);
            in_degree.insert(cell, count);
        }

        let mut queue: Vec<Coord> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&cell, _)| cell)
            .collect();
        queue.sort_by(|a, b| b.cmp(a));

        let mut result = Vec::with_capacity(cells.len());

        while let Some(cell) = queue.pop() {
            result.push(cell);

            if let Some(deps) = self.succs.get(&cell) {
                let mut new_ready = Vec::new();
                for &dep in deps {
                    if !cells.contains(&dep) {
                        continue;
                    }
                    if let Some(deg) = in_degree.get_mut(&dep) {
                        *deg = deg.saturating_sub(1);
                        if *deg == 0 {
                            new_ready.push(dep);
                        }
                    }
                }
                new_ready.sort();
                // Append in reverse so the smallest ends up popped first.
                for cell in new_ready.into_iter().rev() {
                    queue.push(cell);
                }
            }
        }

        if result.len() < cells.len() {
            let mut leftover: Vec<Coord> = cells
                .iter()
                .filter(|c| !result.contains(c))
                .copied()
                .collect();
            leftover.sort();
            return Err(CycleReport::cycle(leftover));
        }

        Ok(result)
    }

    /// All formula cells in the graph.
    pub fn formula_cells(&self) -> impl Iterator<Item = Coord> + '_ {
        self.preds.keys().copied()
    }

    /// Topological order over every formula cell in the graph.
    pub fn topo_order_all(&self) -> Result<Vec<Coord>, CycleReport> {
        let cells: FxHashSet<Coord> = self.preds.keys().copied().collect();
        self.topo_order(&cells)
    }

    /// Cells that sit on a cycle: reachable from themselves along dependent
    /// edges. Downstream dependents of a cycle are not members.
    ///
    /// Used when wiring a loaded sheet, where cycles are marked rather than
    /// rejected edit-by-edit.
    pub fn cycle_members(&self) -> FxHashSet<Coord> {
        let Err(report) = self.topo_order_all() else {
            return FxHashSet::default();
        };

        // Kahn leftovers include cells downstream of a cycle; keep only the
        // self-reachable ones.
        let candidates: FxHashSet<Coord> = report.cells.iter().copied().collect();
        let mut members = FxHashSet::default();

        for &start in &candidates {
            let mut visited = FxHashSet::default();
            let mut stack: Vec<Coord> = self.dependents(start).collect();
            while let Some(current) = stack.pop() {
                if current == start {
                    members.insert(start);
                    break;
                }
                if !visited.insert(current) {
                    continue;
                }
                stack.extend(self.dependents(current).filter(|c| candidates.contains(c)));
            }
        }

        members
    }

    /// Check all invariants. Panics if any are violated.
    ///
    /// Only available in test builds.
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        for (formula_cell, preds) in &self.preds {
            for pred in preds {
                assert!(
                    self.succs.get(pred).is_some_and(|s| s.contains(formula_cell)),
                    "Missing succ edge: {pred:?} should have {formula_cell:?} in dependents"
                );
            }
        }

        for (cell, dependents) in &self.succs {
            for dep in dependents {
                assert!(
                    self.preds.get(dep).is_some_and(|s| s.contains(cell)),
                    "Missing pred edge: {dep:?} should have {cell:?} in precedents"
                );
            }
        }

        for (cell, preds) in &self.preds {
            assert!(!preds.is_empty(), "Empty preds set stored for {cell:?}");
        }
        for (cell, succs) in &self.succs {
            assert!(!succs.is_empty(), "Empty succs set stored for {cell:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(token: &str) -> Coord {
        Coord::parse(token).unwrap()
    }

    fn set(cells: &[Coord]) -> FxHashSet<Coord> {
        cells.iter().copied().collect()
    }

    #[test]
    fn test_empty_graph() {
        let graph = DepGraph::new();

        assert_eq!(graph.formula_cell_count(), 0);
        assert_eq!(graph.referenced_cell_count(), 0);
        assert!(!graph.is_formula_cell(cell("A1")));
        assert_eq!(graph.precedents(cell("A1")).count(), 0);
        assert_eq!(graph.dependents(cell("A1")).count(), 0);

        graph.assert_consistent();
    }

    #[test]
    fn test_single_edge() {
        // B1 = A1
        let mut graph = DepGraph::new();
        let (a1, b1) = (cell("A1"), cell("B1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.assert_consistent();

        assert!(graph.is_formula_cell(b1));
        assert!(!graph.is_formula_cell(a1));
        assert_eq!(graph.precedents(b1).collect::<Vec<_>>(), vec![a1]);
        assert_eq!(graph.dependents(a1).collect::<Vec<_>>(), vec![b1]);
        assert_eq!(graph.formula_cell_count(), 1);
        assert_eq!(graph.referenced_cell_count(), 1);
    }

    #[test]
    fn test_rewiring() {
        // B1 = A1, then change to B1 = A2
        let mut graph = DepGraph::new();
        let (a1, a2, b1) = (cell("A1"), cell("A2"), cell("B1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.assert_consistent();

        graph.replace_edges(b1, set(&[a2]));
        graph.assert_consistent();

        assert_eq!(graph.precedents(b1).collect::<Vec<_>>(), vec![a2]);
        assert_eq!(graph.dependents(a2).collect::<Vec<_>>(), vec![b1]);
        // A1 has no dependents left and no dangling entry.
        assert_eq!(graph.dependents(a1).count(), 0);
        assert_eq!(graph.referenced_cell_count(), 1);
    }

    #[test]
    fn test_unwiring() {
        let mut graph = DepGraph::new();
        let (a1, b1) = (cell("A1"), cell("B1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.clear_cell(b1);
        graph.assert_consistent();

        assert!(!graph.is_formula_cell(b1));
        assert_eq!(graph.dependents(a1).count(), 0);
        assert_eq!(graph.formula_cell_count(), 0);
        assert_eq!(graph.referenced_cell_count(), 0);
    }

    #[test]
    fn test_diamond_dependency() {
        //     A1
        //    /  \
        //   B1   C1
        //    \  /
        //     D1
        let mut graph = DepGraph::new();
        let (a1, b1, c1, d1) = (cell("A1"), cell("B1"), cell("C1"), cell("D1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[a1]));
        graph.replace_edges(d1, set(&[b1, c1]));
        graph.assert_consistent();

        let mut a1_deps: Vec<_> = graph.dependents(a1).collect();
        a1_deps.sort();
        assert_eq!(a1_deps, vec![b1, c1]);
        assert_eq!(graph.formula_cell_count(), 3);
    }

    #[test]
    fn test_affected_set_transitive() {
        // B1 = A1, C1 = B1, D1 = C1; editing A1 affects all three.
        let mut graph = DepGraph::new();
        let (a1, b1, c1, d1) = (cell("A1"), cell("B1"), cell("C1"), cell("D1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[b1]));
        graph.replace_edges(d1, set(&[c1]));

        assert_eq!(graph.affected_set(&[a1]), set(&[b1, c1, d1]));
        assert_eq!(graph.affected_set(&[c1]), set(&[d1]));
        assert_eq!(graph.affected_set(&[d1]), set(&[]));
    }

    #[test]
    fn test_affected_set_excludes_unrelated() {
        let mut graph = DepGraph::new();
        let (a1, b1, c1, d1) = (cell("A1"), cell("B1"), cell("C1"), cell("D1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(d1, set(&[c1]));

        assert_eq!(graph.affected_set(&[a1]), set(&[b1]));
    }

    #[test]
    fn test_topo_chain() {
        // A1 (value) → B1 → C1 → D1
        let mut graph = DepGraph::new();
        let (a1, b1, c1, d1) = (cell("A1"), cell("B1"), cell("C1"), cell("D1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[b1]));
        graph.replace_edges(d1, set(&[c1]));

        let order = graph.topo_order(&set(&[b1, c1, d1])).unwrap();
        assert_eq!(order, vec![b1, c1, d1]);
    }

    #[test]
    fn test_topo_diamond_precedents_first() {
        let mut graph = DepGraph::new();
        let (a1, b1, c1, d1) = (cell("A1"), cell("B1"), cell("C1"), cell("D1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[a1]));
        graph.replace_edges(d1, set(&[b1, c1]));

        let order = graph.topo_order(&set(&[b1, c1, d1])).unwrap();
        let pos = |c: Coord| order.iter().position(|&x| x == c).unwrap();
        assert!(pos(b1) < pos(d1));
        assert!(pos(c1) < pos(d1));
    }

    #[test]
    fn test_topo_tie_break_row_major() {
        // Independent formulas order by ascending row-major coordinate.
        let mut graph = DepGraph::new();
        let a1 = cell("A1");
        let (b2, c1, a3) = (cell("B2"), cell("C1"), cell("A3"));

        graph.replace_edges(b2, set(&[a1]));
        graph.replace_edges(c1, set(&[a1]));
        graph.replace_edges(a3, set(&[a1]));

        let order = graph.topo_order(&set(&[b2, c1, a3])).unwrap();
        assert_eq!(order, vec![c1, b2, a3]);
    }

    #[test]
    fn test_topo_deterministic() {
        let mut graph = DepGraph::new();
        let a1 = cell("A1");
        let cells: Vec<Coord> = ["B1", "C1", "D1", "E1"].iter().map(|t| cell(t)).collect();
        for &c in &cells {
            graph.replace_edges(c, set(&[a1]));
        }

        let subset = set(&cells);
        let order1 = graph.topo_order(&subset).unwrap();
        let order2 = graph.topo_order(&subset).unwrap();
        assert_eq!(order1, order2);
        assert_eq!(order1, cells);
    }

    #[test]
    fn test_topo_ignores_edges_outside_subset() {
        // C1 = B1, B1 = A1; ordering {C1} alone must not wait on B1.
        let mut graph = DepGraph::new();
        let (a1, b1, c1) = (cell("A1"), cell("B1"), cell("C1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[b1]));

        let order = graph.topo_order(&set(&[c1])).unwrap();
        assert_eq!(order, vec![c1]);
    }

    #[test]
    fn test_cycle_self_reference() {
        let graph = DepGraph::new();
        let a1 = cell("A1");

        let report = graph.would_create_cycle(a1, &set(&[a1])).unwrap();
        assert!(report.message.contains("references itself"));
    }

    #[test]
    fn test_cycle_two_cell() {
        // A1 = B1 exists; making B1 depend on A1 closes the loop.
        let mut graph = DepGraph::new();
        let (a1, b1) = (cell("A1"), cell("B1"));

        graph.replace_edges(a1, set(&[b1]));
        assert!(graph.would_create_cycle(b1, &set(&[a1])).is_some());
    }

    #[test]
    fn test_cycle_indirect() {
        // B1 = A1, C1 = B1; making A1 depend on C1 closes the loop.
        let mut graph = DepGraph::new();
        let (a1, b1, c1) = (cell("A1"), cell("B1"), cell("C1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[b1]));

        assert!(graph.would_create_cycle(a1, &set(&[c1])).is_some());
    }

    #[test]
    fn test_cycle_check_does_not_mutate() {
        let mut graph = DepGraph::new();
        let (a1, b1) = (cell("A1"), cell("B1"));

        graph.replace_edges(a1, set(&[b1]));
        let before_preds = graph.formula_cell_count();
        let before_refs = graph.referenced_cell_count();

        let _ = graph.would_create_cycle(b1, &set(&[a1]));

        assert_eq!(graph.formula_cell_count(), before_preds);
        assert_eq!(graph.referenced_cell_count(), before_refs);
        assert!(!graph.is_formula_cell(b1));
        graph.assert_consistent();
    }

    #[test]
    fn test_no_cycle_valid_wiring() {
        let mut graph = DepGraph::new();
        let (a1, b1, c1, d1) = (cell("A1"), cell("B1"), cell("C1"), cell("D1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[b1]));

        assert!(graph.would_create_cycle(d1, &set(&[c1])).is_none());
    }

    #[test]
    fn test_topo_detects_existing_cycle() {
        // Cycles can exist after bulk load; topo reports the members.
        let mut graph = DepGraph::new();
        let (a1, b1) = (cell("A1"), cell("B1"));

        graph.replace_edges(a1, set(&[b1]));
        graph.replace_edges(b1, set(&[a1]));

        let report = graph.topo_order(&set(&[a1, b1])).unwrap_err();
        assert_eq!(report.cells, vec![a1, b1]);
    }

    #[test]
    fn test_cycle_members_excludes_downstream() {
        // A1 ↔ B1 cycle; C1 = A1 is downstream, not a member.
        let mut graph = DepGraph::new();
        let (a1, b1, c1) = (cell("A1"), cell("B1"), cell("C1"));

        graph.replace_edges(a1, set(&[b1]));
        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[a1]));

        let members = graph.cycle_members();
        assert_eq!(members, set(&[a1, b1]));
    }

    #[test]
    fn test_cycle_members_self_loop() {
        let mut graph = DepGraph::new();
        let a1 = cell("A1");
        graph.replace_edges(a1, set(&[a1]));

        assert_eq!(graph.cycle_members(), set(&[a1]));
    }

    #[test]
    fn test_cycle_members_acyclic_graph() {
        let mut graph = DepGraph::new();
        let (a1, b1, c1) = (cell("A1"), cell("B1"), cell("C1"));

        graph.replace_edges(b1, set(&[a1]));
        graph.replace_edges(c1, set(&[b1]));

        assert!(graph.cycle_members().is_empty());
    }
}
