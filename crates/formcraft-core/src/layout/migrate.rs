//! Migration of legacy and inconsistent layouts.
//!
//! Older schemas are a flat field list without positions. Those fields get
//! one single-column row each, in list order. Fields whose position points
//! outside the grid are treated the same way, appended after the valid ones.

use super::grid::{Cell, LayoutRow};
use super::state::normalize_fields;
use crate::model::{FieldPosition, FormSchema};

/// Bring `schema` into a consistent layout. Returns whether anything changed.
pub fn migrate(mut schema: FormSchema) -> (FormSchema, bool) {
    let before = schema.clone();

    for (index, row) in schema.layout.rows.iter_mut().enumerate() {
        if row.check(index).is_err() {
            tracing::debug!(row = index, "repairing out-of-range layout row");
            row.repair();
        }
    }

    let mut relocated = 0usize;
    for index in 0..schema.fields.len() {
        let valid = schema.fields[index]
            .position
            .map(|p| schema.layout.contains(p.cell()))
            .unwrap_or(false);
        if !valid {
            schema.layout.rows.push(LayoutRow::with_columns(1));
            let row = schema.layout.rows.len() - 1;
            schema.fields[index].position = Some(FieldPosition::new(Cell::row_start(row), 0));
            relocated += 1;
        }
    }
    if relocated > 0 {
        tracing::debug!(relocated, "placed unpositioned fields in new rows");
    }

    normalize_fields(&mut schema.fields);
    let changed = schema != before;
    (schema, changed)
}

/// Whether a schema would be left unchanged by [`migrate`].
pub fn is_current(schema: &FormSchema) -> bool {
    !migrate(schema.clone()).1
}
