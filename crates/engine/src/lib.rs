pub mod addr;
pub mod cell;
pub mod dep_graph;
pub mod engine;
pub mod error;
pub mod formula;
pub mod history;
pub mod recalc;
pub mod sheet;

pub use addr::{Bounds, Coord, RangeRef};
pub use cell::{Cell, CellContent};
pub use engine::Engine;
pub use error::{CellError, EngineError};
pub use recalc::{CycleReport, RecalcReport};
