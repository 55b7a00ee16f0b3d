//! Layout state manager.
//!
//! Wraps a [`FormSchema`] and applies positional edits to it. After every
//! successful operation:
//! - each field position addresses an existing cell,
//! - orders inside a cell run contiguously from zero,
//! - `fields` is sorted by `(row, column, sub_column, order)`,
//! - the dirty flag is set.
//!
//! A failed operation leaves the state untouched.

use std::collections::HashSet;

use uuid::Uuid;

use super::grid::{Cell, LayoutColumn, LayoutRow, MAX_COLUMNS, MAX_SUB_COLUMNS};
use super::migrate::migrate;
use super::ops::LayoutOp;
use crate::error::{Error, Result};
use crate::model::{FieldPosition, FormField, FormSchema};

/// Sort fields into layout order and renumber `order` within each cell.
pub(crate) fn normalize_fields(fields: &mut [FormField]) {
    fields.sort_by_key(|f| {
        f.position.unwrap_or(FieldPosition {
            row: usize::MAX,
            column: usize::MAX,
            sub_column: usize::MAX,
            order: usize::MAX,
        })
    });

    let mut current: Option<Cell> = None;
    let mut next = 0;
    for field in fields.iter_mut() {
        if let Some(position) = field.position.as_mut() {
            let cell = position.cell();
            if current != Some(cell) {
                current = Some(cell);
                next = 0;
            }
            position.order = next;
            next += 1;
        }
    }
}

/// Editable layout of one form.
#[derive(Debug, Clone)]
pub struct LayoutState {
    schema: FormSchema,
    dirty: bool,
}

impl LayoutState {
    /// Load a schema, migrating legacy or inconsistent positions.
    ///
    /// The state starts dirty if migration changed anything.
    pub fn new(schema: FormSchema) -> Self {
        let (schema, migrated) = migrate(schema);
        Self {
            schema,
            dirty: migrated,
        }
    }

    /// Current schema.
    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    /// Consume the state and return the schema.
    pub fn into_schema(self) -> FormSchema {
        self.schema
    }

    /// Whether anything changed since load or the last [`mark_clean`](Self::mark_clean).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Reset the dirty flag, typically after a save.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.schema.layout.rows.len()
    }

    /// Fields in `cell`, in order.
    pub fn cell_fields(&self, cell: Cell) -> Vec<&FormField> {
        let mut fields: Vec<&FormField> = self
            .schema
            .fields
            .iter()
            .filter(|f| f.position.map(|p| p.cell()) == Some(cell))
            .collect();
        fields.sort_by_key(|f| f.position.map(|p| p.order));
        fields
    }

    /// Apply a serialized operation.
    pub fn apply(&mut self, op: LayoutOp) -> Result<()> {
        match op {
            LayoutOp::AddField { field, target } => self.add_field(field, target).map(drop),
            LayoutOp::InsertRow { index, columns } => self.insert_row(index, columns).map(drop),
            LayoutOp::MoveField {
                field_id,
                target,
                index,
            } => self.move_field(field_id, target, index),
            LayoutOp::RemoveField { field_id } => self.remove_field(field_id).map(drop),
            LayoutOp::DuplicateField { field_id } => self.duplicate_field(field_id).map(drop),
            LayoutOp::DuplicateRow { row } => self.duplicate_row(row).map(drop),
            LayoutOp::SetRowColumns { row, columns } => self.set_row_columns(row, columns),
            LayoutOp::SetSubColumns {
                row,
                column,
                sub_columns,
            } => self.set_sub_columns(row, column, sub_columns),
            LayoutOp::RemoveRow { row, force } => self.remove_row(row, force).map(drop),
            LayoutOp::Compact => {
                self.compact();
                Ok(())
            }
        }
    }

    /// Add a field. Without a target it gets a new single-column row at the
    /// bottom; with a target it is appended to that cell.
    pub fn add_field(&mut self, mut field: FormField, target: Option<Cell>) -> Result<Uuid> {
        if self.schema.fields.iter().any(|f| f.id == field.id) {
            return Err(Error::Layout(format!("field id {} already in use", field.id)));
        }
        if self.schema.field_by_name(&field.name).is_some() {
            return Err(Error::Layout(format!("field name {:?} already in use", field.name)));
        }

        let position = match target {
            Some(cell) => {
                self.check_cell(cell)?;
                FieldPosition::new(cell, self.cell_ids(cell).len())
            }
            None => {
                let row = self.schema.layout.push_row(1);
                FieldPosition::new(Cell::row_start(row), 0)
            }
        };
        field.position = Some(position);
        let id = field.id;
        self.schema.fields.push(field);
        self.commit();
        Ok(id)
    }

    /// Insert an empty row of `columns` equal columns at `index`.
    pub fn insert_row(&mut self, index: usize, columns: usize) -> Result<usize> {
        if index > self.row_count() {
            return Err(Error::Layout(format!(
                "row index {index} out of range (rows: {})",
                self.row_count()
            )));
        }
        check_column_count(columns)?;

        self.shift_rows_from(index, 1);
        self.schema
            .layout
            .rows
            .insert(index, LayoutRow::with_columns(columns));
        self.commit();
        Ok(index)
    }

    /// Move a field into `target` at `index` (clamped to the cell's length).
    pub fn move_field(&mut self, field_id: Uuid, target: Cell, index: usize) -> Result<()> {
        self.position_of(field_id)?;
        self.check_cell(target)?;

        let mut ids = self.cell_ids(target);
        ids.retain(|id| *id != field_id);
        let index = index.min(ids.len());
        ids.insert(index, field_id);
        self.assign_cell(target, &ids);
        self.commit();
        Ok(())
    }

    /// Remove a field and return it.
    pub fn remove_field(&mut self, field_id: Uuid) -> Result<FormField> {
        let index = self.index_of(field_id)?;
        let mut field = self.schema.fields.remove(index);
        field.position = None;
        self.commit();
        Ok(field)
    }

    /// Copy a field directly after itself in the same cell.
    ///
    /// The copy gets a fresh id, a unique name, and ` (copy)` appended to its label.
    pub fn duplicate_field(&mut self, field_id: Uuid) -> Result<Uuid> {
        let position = self.position_of(field_id)?;
        let original = self.schema.fields[self.index_of(field_id)?].clone();

        let mut copy = original.clone();
        copy.id = Uuid::new_v4();
        copy.name = self.unique_name(&original.name);
        copy.label = format!("{} (copy)", original.label);

        let cell = position.cell();
        let mut ids = self.cell_ids(cell);
        let at = ids.iter().position(|id| *id == field_id).map(|i| i + 1).unwrap_or(ids.len());
        ids.insert(at, copy.id);

        let copy_id = copy.id;
        self.schema.fields.push(copy);
        self.assign_cell(cell, &ids);
        self.commit();
        Ok(copy_id)
    }

    /// Copy a row and all its fields directly below it. Returns the new row index.
    pub fn duplicate_row(&mut self, row: usize) -> Result<usize> {
        self.check_row(row)?;
        let target = row + 1;

        let mut new_row = self.schema.layout.rows[row].clone();
        new_row.id = Uuid::new_v4();
        let originals: Vec<FormField> = self
            .schema
            .fields
            .iter()
            .filter(|f| f.position.map(|p| p.row) == Some(row))
            .cloned()
            .collect();

        self.shift_rows_from(target, 1);
        self.schema.layout.rows.insert(target, new_row);

        for original in originals {
            let mut copy = original.clone();
            copy.id = Uuid::new_v4();
            copy.name = self.unique_name(&original.name);
            if let Some(position) = copy.position.as_mut() {
                position.row = target;
            }
            self.schema.fields.push(copy);
        }
        self.commit();
        Ok(target)
    }

    /// Resize a row to `columns` equal columns.
    ///
    /// Fields in removed columns move to the end of the first sub-column of
    /// the last remaining column, keeping their relative order.
    pub fn set_row_columns(&mut self, row: usize, columns: usize) -> Result<()> {
        self.check_row(row)?;
        check_column_count(columns)?;

        let current = self.schema.layout.rows[row].columns.len();
        if columns < current {
            let target = Cell::new(row, columns - 1, 0);
            let mut ids = self.cell_ids(target);
            for column in columns..current {
                let sub_columns = self.schema.layout.rows[row].columns[column].sub_columns;
                for sub_column in 0..sub_columns {
                    ids.extend(self.cell_ids(Cell::new(row, column, sub_column)));
                }
            }
            self.assign_cell(target, &ids);
        }

        let layout_row = &mut self.schema.layout.rows[row];
        layout_row.columns.resize(columns, LayoutColumn::new(0));
        layout_row.rebalance();
        self.commit();
        Ok(())
    }

    /// Split or merge the sub-columns of one column.
    ///
    /// Fields in removed sub-columns move to the end of sub-column 0.
    pub fn set_sub_columns(&mut self, row: usize, column: usize, sub_columns: usize) -> Result<()> {
        self.check_cell(Cell::new(row, column, 0))?;
        if sub_columns == 0 || sub_columns > MAX_SUB_COLUMNS {
            return Err(Error::Layout(format!(
                "sub-column count {sub_columns} out of range 1..={MAX_SUB_COLUMNS}"
            )));
        }

        let current = self.schema.layout.rows[row].columns[column].sub_columns;
        if sub_columns < current {
            let target = Cell::new(row, column, 0);
            let mut ids = self.cell_ids(target);
            for sub_column in sub_columns..current {
                ids.extend(self.cell_ids(Cell::new(row, column, sub_column)));
            }
            self.assign_cell(target, &ids);
        }

        self.schema.layout.rows[row].columns[column].sub_columns = sub_columns;
        self.commit();
        Ok(())
    }

    /// Remove a row. A row holding fields is only removed with `force`,
    /// which removes its fields too; they are returned.
    pub fn remove_row(&mut self, row: usize, force: bool) -> Result<Vec<FormField>> {
        self.check_row(row)?;
        let occupied = self
            .schema
            .fields
            .iter()
            .filter(|f| f.position.map(|p| p.row) == Some(row))
            .count();
        if occupied > 0 && !force {
            return Err(Error::Layout(format!(
                "row {row} holds {occupied} field(s); remove them first or force"
            )));
        }

        let (removed, kept): (Vec<FormField>, Vec<FormField>) = std::mem::take(&mut self.schema.fields)
            .into_iter()
            .partition(|f| f.position.map(|p| p.row) == Some(row));
        self.schema.fields = kept;
        self.schema.layout.rows.remove(row);
        self.shift_rows_from(row + 1, -1);
        self.commit();

        Ok(removed
            .into_iter()
            .map(|mut f| {
                f.position = None;
                f
            })
            .collect())
    }

    /// Drop rows that hold no fields. Returns how many were dropped.
    pub fn compact(&mut self) -> usize {
        let occupied: HashSet<usize> = self
            .schema
            .fields
            .iter()
            .filter_map(|f| f.position.map(|p| p.row))
            .collect();
        let empty: Vec<usize> = (0..self.row_count())
            .filter(|row| !occupied.contains(row))
            .collect();

        for row in empty.iter().rev() {
            self.schema.layout.rows.remove(*row);
            self.shift_rows_from(row + 1, -1);
        }
        if !empty.is_empty() {
            self.commit();
        }
        empty.len()
    }

    fn commit(&mut self) {
        normalize_fields(&mut self.schema.fields);
        self.dirty = true;
    }

    fn index_of(&self, field_id: Uuid) -> Result<usize> {
        self.schema
            .fields
            .iter()
            .position(|f| f.id == field_id)
            .ok_or_else(|| Error::FieldNotFound(field_id.to_string()))
    }

    fn position_of(&self, field_id: Uuid) -> Result<FieldPosition> {
        let index = self.index_of(field_id)?;
        self.schema.fields[index]
            .position
            .ok_or_else(|| Error::Layout(format!("field {field_id} has no position")))
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.row_count() {
            return Err(Error::Layout(format!(
                "row {row} does not exist (rows: {})",
                self.row_count()
            )));
        }
        Ok(())
    }

    fn check_cell(&self, cell: Cell) -> Result<()> {
        if !self.schema.layout.contains(cell) {
            return Err(Error::Layout(format!(
                "cell ({}, {}, {}) does not exist",
                cell.row, cell.column, cell.sub_column
            )));
        }
        Ok(())
    }

    fn cell_ids(&self, cell: Cell) -> Vec<Uuid> {
        self.cell_fields(cell).iter().map(|f| f.id).collect()
    }

    /// Place `ids` into `cell` with orders 0..n.
    fn assign_cell(&mut self, cell: Cell, ids: &[Uuid]) {
        for field in &mut self.schema.fields {
            if let Some(order) = ids.iter().position(|id| *id == field.id) {
                field.position = Some(FieldPosition::new(cell, order));
            }
        }
    }

    /// Add `delta` to the row of every field at or below `from`.
    fn shift_rows_from(&mut self, from: usize, delta: isize) {
        for field in &mut self.schema.fields {
            if let Some(position) = field.position.as_mut() {
                if position.row >= from {
                    position.row = position.row.saturating_add_signed(delta);
                }
            }
        }
    }

    fn unique_name(&self, base: &str) -> String {
        let taken: HashSet<&str> = self.schema.fields.iter().map(|f| f.name.as_str()).collect();
        let first = format!("{base}_copy");
        if !taken.contains(first.as_str()) {
            return first;
        }
        (2..)
            .map(|n| format!("{base}_copy{n}"))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or(first)
    }
}

fn check_column_count(columns: usize) -> Result<()> {
    if columns == 0 || columns > MAX_COLUMNS {
        return Err(Error::Layout(format!(
            "column count {columns} out of range 1..={MAX_COLUMNS}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    fn text(name: &str) -> FormField {
        FormField::new(FieldType::Text, name, name.to_uppercase())
    }

    fn names_in(state: &LayoutState, cell: Cell) -> Vec<String> {
        state.cell_fields(cell).iter().map(|f| f.name.clone()).collect()
    }

    fn assert_invariants(state: &LayoutState) {
        let schema = state.schema();
        schema.layout.check().unwrap();
        let mut previous: Option<FieldPosition> = None;
        for field in &schema.fields {
            let position = field.position.expect("every field is positioned");
            assert!(schema.layout.contains(position.cell()));
            if let Some(prev) = previous {
                assert!(prev < position, "fields sorted by position");
                if prev.cell() == position.cell() {
                    assert_eq!(prev.order + 1, position.order);
                } else {
                    assert_eq!(position.order, 0);
                }
            } else {
                assert_eq!(position.order, 0);
            }
            previous = Some(position);
        }
    }

    #[test]
    fn test_add_field_new_rows() {
        let mut state = LayoutState::new(FormSchema::default());
        assert!(!state.is_dirty());
        state.add_field(text("a"), None).unwrap();
        state.add_field(text("b"), None).unwrap();
        assert!(state.is_dirty());
        assert_eq!(state.row_count(), 2);
        assert_eq!(names_in(&state, Cell::row_start(1)), vec!["b"]);
        assert_invariants(&state);
    }

    #[test]
    fn test_add_field_into_cell() {
        let mut state = LayoutState::new(FormSchema::default());
        state.insert_row(0, 2).unwrap();
        state.add_field(text("a"), Some(Cell::new(0, 1, 0))).unwrap();
        state.add_field(text("b"), Some(Cell::new(0, 1, 0))).unwrap();
        assert_eq!(names_in(&state, Cell::new(0, 1, 0)), vec!["a", "b"]);
        assert!(state.add_field(text("c"), Some(Cell::new(0, 2, 0))).is_err());
        assert_invariants(&state);
    }

    #[test]
    fn test_duplicate_name_rejected_without_change() {
        let mut state = LayoutState::new(FormSchema::default());
        state.add_field(text("a"), None).unwrap();
        state.mark_clean();
        let before = state.schema().clone();
        assert!(state.add_field(text("a"), None).is_err());
        assert_eq!(state.schema(), &before);
        assert!(!state.is_dirty());
    }

    #[test]
    fn test_move_between_cells() {
        let mut state = LayoutState::new(FormSchema::default());
        state.insert_row(0, 2).unwrap();
        let a = state.add_field(text("a"), Some(Cell::new(0, 0, 0))).unwrap();
        state.add_field(text("b"), Some(Cell::new(0, 0, 0))).unwrap();
        state.add_field(text("c"), Some(Cell::new(0, 1, 0))).unwrap();

        state.move_field(a, Cell::new(0, 1, 0), 0).unwrap();
        assert_eq!(names_in(&state, Cell::new(0, 0, 0)), vec!["b"]);
        assert_eq!(names_in(&state, Cell::new(0, 1, 0)), vec!["a", "c"]);

        state.move_field(a, Cell::new(0, 1, 0), 99).unwrap();
        assert_eq!(names_in(&state, Cell::new(0, 1, 0)), vec!["c", "a"]);
        assert_invariants(&state);
    }

    #[test]
    fn test_move_unknown_field() {
        let mut state = LayoutState::new(FormSchema::default());
        state.insert_row(0, 1).unwrap();
        let err = state.move_field(Uuid::new_v4(), Cell::row_start(0), 0).unwrap_err();
        assert!(matches!(err, Error::FieldNotFound(_)));
    }

    #[test]
    fn test_remove_field_keeps_row() {
        let mut state = LayoutState::new(FormSchema::default());
        let a = state.add_field(text("a"), None).unwrap();
        state.add_field(text("b"), None).unwrap();
        let removed = state.remove_field(a).unwrap();
        assert_eq!(removed.name, "a");
        assert!(removed.position.is_none());
        assert_eq!(state.row_count(), 2);
        assert_eq!(state.compact(), 1);
        assert_eq!(names_in(&state, Cell::row_start(0)), vec!["b"]);
        assert_invariants(&state);
    }

    #[test]
    fn test_duplicate_field_placed_after_original() {
        let mut state = LayoutState::new(FormSchema::default());
        state.insert_row(0, 1).unwrap();
        let a = state.add_field(text("a"), Some(Cell::row_start(0))).unwrap();
        state.add_field(text("b"), Some(Cell::row_start(0))).unwrap();

        let copy = state.duplicate_field(a).unwrap();
        assert_eq!(names_in(&state, Cell::row_start(0)), vec!["a", "a_copy", "b"]);
        let copy = state.schema().field(copy).unwrap();
        assert_eq!(copy.label, "A (copy)");

        state.duplicate_field(a).unwrap();
        assert_eq!(
            names_in(&state, Cell::row_start(0)),
            vec!["a", "a_copy2", "a_copy", "b"]
        );
        assert_invariants(&state);
    }

    #[test]
    fn test_duplicate_row_shifts_rows_below() {
        let mut state = LayoutState::new(FormSchema::default());
        state.insert_row(0, 2).unwrap();
        state.add_field(text("a"), Some(Cell::new(0, 0, 0))).unwrap();
        state.add_field(text("b"), Some(Cell::new(0, 1, 0))).unwrap();
        state.add_field(text("z"), None).unwrap();

        let new_row = state.duplicate_row(0).unwrap();
        assert_eq!(new_row, 1);
        assert_eq!(state.row_count(), 3);
        assert_eq!(names_in(&state, Cell::new(1, 0, 0)), vec!["a_copy"]);
        assert_eq!(names_in(&state, Cell::new(1, 1, 0)), vec!["b_copy"]);
        assert_eq!(names_in(&state, Cell::row_start(2)), vec!["z"]);
        assert_ne!(state.schema().layout.rows[0].id, state.schema().layout.rows[1].id);
        assert_invariants(&state);
    }

    #[test]
    fn test_shrinking_columns_migrates_fields() {
        let mut state = LayoutState::new(FormSchema::default());
        state.insert_row(0, 3).unwrap();
        state.set_sub_columns(0, 2, 2).unwrap();
        state.add_field(text("a"), Some(Cell::new(0, 0, 0))).unwrap();
        state.add_field(text("b"), Some(Cell::new(0, 1, 0))).unwrap();
        state.add_field(text("c"), Some(Cell::new(0, 2, 0))).unwrap();
        state.add_field(text("d"), Some(Cell::new(0, 2, 1))).unwrap();

        state.set_row_columns(0, 2).unwrap();
        assert_eq!(names_in(&state, Cell::new(0, 1, 0)), vec!["b", "c", "d"]);
        assert!(state.schema().layout.rows[0].columns.iter().all(|c| c.width == 6));

        state.set_row_columns(0, 4).unwrap();
        assert_eq!(state.schema().layout.rows[0].columns.len(), 4);
        assert_invariants(&state);
    }

    #[test]
    fn test_merging_sub_columns() {
        let mut state = LayoutState::new(FormSchema::default());
        state.insert_row(0, 1).unwrap();
        state.set_sub_columns(0, 0, 2).unwrap();
        state.add_field(text("left"), Some(Cell::new(0, 0, 0))).unwrap();
        state.add_field(text("right"), Some(Cell::new(0, 0, 1))).unwrap();

        state.set_sub_columns(0, 0, 1).unwrap();
        assert_eq!(names_in(&state, Cell::new(0, 0, 0)), vec!["left", "right"]);
        assert!(state.set_sub_columns(0, 0, 3).is_err());
        assert_invariants(&state);
    }

    #[test]
    fn test_remove_row_requires_force() {
        let mut state = LayoutState::new(FormSchema::default());
        state.add_field(text("a"), None).unwrap();
        state.add_field(text("b"), None).unwrap();

        assert!(state.remove_row(0, false).is_err());
        let removed = state.remove_row(0, true).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(state.row_count(), 1);
        assert_eq!(names_in(&state, Cell::row_start(0)), vec!["b"]);
        assert_invariants(&state);
    }

    #[test]
    fn test_apply_serialized_op() {
        let mut state = LayoutState::new(FormSchema::default());
        let op: LayoutOp = serde_json::from_value(serde_json::json!({
            "op": "add_field",
            "field": {"type": "email", "label": "Email", "name": "email"}
        }))
        .unwrap();
        state.apply(op).unwrap();
        state
            .apply(LayoutOp::SetRowColumns { row: 0, columns: 2 })
            .unwrap();
        assert_eq!(state.schema().fields.len(), 1);
        assert_eq!(state.schema().layout.rows[0].columns.len(), 2);
        assert_invariants(&state);
    }
}
