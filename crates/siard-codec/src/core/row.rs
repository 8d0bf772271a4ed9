//! A single record of a table.

use super::cell::{cell_id, Cell};
use super::schema::TableDescriptor;

/// Fixed-length sequence of cells, one per declared column.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// 1-based position within the table.
    pub index: u64,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: u64, cells: Vec<Cell>) -> Self {
        Self { index, cells }
    }

    /// A row where every column is `Absent`.
    pub fn all_absent(table: &TableDescriptor, index: u64) -> Self {
        let cells = table
            .columns
            .iter()
            .map(|c| Cell::absent(cell_id(&c.id, index)))
            .collect();
        Self { index, cells }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, column: usize) -> Option<&Cell> {
        self.cells.get(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Type;

    #[test]
    fn test_all_absent_row_matches_column_count() {
        let table = TableDescriptor::with_columns(
            "s",
            "t",
            [("a", Type::numeric()), ("b", Type::string()), ("c", Type::Boolean)],
        );
        let row = Row::all_absent(&table, 4);
        assert_eq!(row.len(), 3);
        assert!(row.cells.iter().all(Cell::is_absent));
        assert_eq!(row.cells[2].id, "t.c.4");
    }
}
