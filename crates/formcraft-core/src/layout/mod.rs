//! Row/column/sub-column form layout.
//!
//! Each row splits [`GRID_UNITS`] between 1..=4 columns; each column holds
//! 1..=2 sub-columns. Fields record their slot in `FormField::position`.

mod grid;
mod migrate;
mod ops;
mod state;

pub use grid::{Cell, Layout, LayoutColumn, LayoutRow, GRID_UNITS, MAX_COLUMNS, MAX_SUB_COLUMNS};
pub use migrate::{is_current, migrate};
pub use ops::LayoutOp;
pub use state::LayoutState;
