//! Rows, columns, and sub-columns of the layout grid.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Grid units shared by the columns of one row.
pub const GRID_UNITS: u8 = 12;

/// Maximum columns per row.
pub const MAX_COLUMNS: usize = 4;

/// Maximum sub-columns per column.
pub const MAX_SUB_COLUMNS: usize = 2;

/// A `(row, column, sub_column)` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    #[serde(default)]
    pub column: usize,
    #[serde(default)]
    pub sub_column: usize,
}

impl Cell {
    /// Create a cell.
    pub fn new(row: usize, column: usize, sub_column: usize) -> Self {
        Self {
            row,
            column,
            sub_column,
        }
    }

    /// First cell of a row.
    pub fn row_start(row: usize) -> Self {
        Self::new(row, 0, 0)
    }
}

fn one() -> usize {
    1
}

/// One column of a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutColumn {
    /// Width in grid units.
    pub width: u8,
    #[serde(default = "one")]
    pub sub_columns: usize,
}

impl LayoutColumn {
    /// Column spanning `width` units with a single sub-column.
    pub fn new(width: u8) -> Self {
        Self {
            width,
            sub_columns: 1,
        }
    }
}

/// One row of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutRow {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub columns: Vec<LayoutColumn>,
}

impl LayoutRow {
    /// Row of `count` equal-width columns.
    pub fn with_columns(count: usize) -> Self {
        let mut row = Self {
            id: Uuid::new_v4(),
            columns: vec![LayoutColumn::new(0); count.clamp(1, MAX_COLUMNS)],
        };
        row.rebalance();
        row
    }

    /// Spread [`GRID_UNITS`] evenly; leftover units go to the leftmost columns.
    pub fn rebalance(&mut self) {
        let count = self.columns.len().max(1) as u8;
        let base = GRID_UNITS / count;
        let extra = GRID_UNITS % count;
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.width = base + u8::from((i as u8) < extra);
        }
    }

    /// Check column count, widths, and sub-column counts.
    pub fn check(&self, index: usize) -> Result<()> {
        let count = self.columns.len();
        if count == 0 || count > MAX_COLUMNS {
            return Err(Error::Layout(format!(
                "row {index} has {count} columns, expected 1..={MAX_COLUMNS}"
            )));
        }
        let total: u32 = self.columns.iter().map(|c| u32::from(c.width)).sum();
        if total != u32::from(GRID_UNITS) {
            return Err(Error::Layout(format!(
                "row {index} column widths sum to {total}, expected {GRID_UNITS}"
            )));
        }
        for (c, column) in self.columns.iter().enumerate() {
            if column.width == 0 {
                return Err(Error::Layout(format!("row {index} column {c} has zero width")));
            }
            if column.sub_columns == 0 || column.sub_columns > MAX_SUB_COLUMNS {
                return Err(Error::Layout(format!(
                    "row {index} column {c} has {} sub-columns, expected 1..={MAX_SUB_COLUMNS}",
                    column.sub_columns
                )));
            }
        }
        Ok(())
    }

    /// Bring an out-of-range row back inside the limits, keeping what fits.
    pub(crate) fn repair(&mut self) {
        if self.columns.is_empty() {
            self.columns.push(LayoutColumn::new(GRID_UNITS));
        }
        self.columns.truncate(MAX_COLUMNS);
        for column in &mut self.columns {
            column.sub_columns = column.sub_columns.clamp(1, MAX_SUB_COLUMNS);
        }
        let total: u32 = self.columns.iter().map(|c| u32::from(c.width)).sum();
        if total != u32::from(GRID_UNITS) || self.columns.iter().any(|c| c.width == 0) {
            self.rebalance();
        }
    }
}

/// The layout grid of a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    #[serde(default)]
    pub rows: Vec<LayoutRow>,
}

impl Layout {
    /// Whether `cell` addresses an existing slot.
    pub fn contains(&self, cell: Cell) -> bool {
        self.rows
            .get(cell.row)
            .and_then(|row| row.columns.get(cell.column))
            .map(|column| cell.sub_column < column.sub_columns)
            .unwrap_or(false)
    }

    /// Append a row of `columns` equal columns and return its index.
    pub fn push_row(&mut self, columns: usize) -> usize {
        self.rows.push(LayoutRow::with_columns(columns));
        self.rows.len() - 1
    }

    /// Check every row.
    pub fn check(&self) -> Result<()> {
        for (i, row) in self.rows.iter().enumerate() {
            row.check(i)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_widths() {
        for count in 1..=MAX_COLUMNS {
            let row = LayoutRow::with_columns(count);
            assert_eq!(row.columns.len(), count);
            row.check(0).unwrap();
        }
        let row = LayoutRow::with_columns(3);
        assert!(row.columns.iter().all(|c| c.width == 4));
    }

    #[test]
    fn test_contains() {
        let mut layout = Layout::default();
        layout.push_row(2);
        layout.rows[0].columns[1].sub_columns = 2;
        assert!(layout.contains(Cell::new(0, 1, 1)));
        assert!(!layout.contains(Cell::new(0, 0, 1)));
        assert!(!layout.contains(Cell::new(0, 2, 0)));
        assert!(!layout.contains(Cell::new(1, 0, 0)));
    }

    #[test]
    fn test_check_rejects_bad_widths() {
        let row = LayoutRow {
            id: Uuid::new_v4(),
            columns: vec![LayoutColumn::new(6), LayoutColumn::new(5)],
        };
        assert!(row.check(0).is_err());
    }

    #[test]
    fn test_repair() {
        let mut row = LayoutRow {
            id: Uuid::new_v4(),
            columns: vec![LayoutColumn { width: 0, sub_columns: 5 }; 6],
        };
        row.repair();
        row.check(0).unwrap();
        assert_eq!(row.columns.len(), MAX_COLUMNS);
        assert_eq!(row.columns[0].sub_columns, MAX_SUB_COLUMNS);
    }
}
