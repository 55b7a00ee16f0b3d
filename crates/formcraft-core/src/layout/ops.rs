//! Serializable layout operations, as sent by the designer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::grid::Cell;
use crate::model::FormField;

/// One edit to a form layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LayoutOp {
    AddField {
        field: FormField,
        #[serde(default)]
        target: Option<Cell>,
    },
    InsertRow {
        index: usize,
        columns: usize,
    },
    MoveField {
        field_id: Uuid,
        target: Cell,
        #[serde(default)]
        index: usize,
    },
    RemoveField {
        field_id: Uuid,
    },
    DuplicateField {
        field_id: Uuid,
    },
    DuplicateRow {
        row: usize,
    },
    SetRowColumns {
        row: usize,
        columns: usize,
    },
    SetSubColumns {
        row: usize,
        column: usize,
        sub_columns: usize,
    },
    RemoveRow {
        row: usize,
        #[serde(default)]
        force: bool,
    },
    Compact,
}

impl LayoutOp {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            LayoutOp::AddField { .. } => "add_field",
            LayoutOp::InsertRow { .. } => "insert_row",
            LayoutOp::MoveField { .. } => "move_field",
            LayoutOp::RemoveField { .. } => "remove_field",
            LayoutOp::DuplicateField { .. } => "duplicate_field",
            LayoutOp::DuplicateRow { .. } => "duplicate_row",
            LayoutOp::SetRowColumns { .. } => "set_row_columns",
            LayoutOp::SetSubColumns { .. } => "set_sub_columns",
            LayoutOp::RemoveRow { .. } => "remove_row",
            LayoutOp::Compact => "compact",
        }
    }
}
