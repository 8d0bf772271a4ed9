//! Table and column descriptors.

use serde::Serialize;

use super::identifier::{qualify_pg, quote_pg, validate_fragment};
use super::types::Type;
use crate::error::Result;

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    /// `<table>.<column>`, the prefix of every cell key in this column.
    pub id: String,

    /// Column name.
    pub name: String,

    /// Declared type.
    #[serde(rename = "type")]
    pub ty: Type,

    /// Whether the column allows NULL.
    pub nullable: bool,

    /// Declared default value, if any.
    pub default_value: Option<String>,

    /// Per-column large-object folder inside the archive.
    pub lob_folder: Option<String>,
}

impl ColumnDescriptor {
    pub fn new(table: &str, name: impl Into<String>, ty: Type) -> Self {
        let name = name.into();
        Self {
            id: format!("{}.{}", table, name),
            name,
            ty,
            nullable: true,
            default_value: None,
            lob_folder: None,
        }
    }

    pub fn with_lob_folder(mut self, folder: impl Into<String>) -> Self {
        self.lob_folder = Some(folder.into());
        self
    }
}

/// Table metadata plus the streaming row counter.
///
/// The counter is the only field that changes while rows are produced; it
/// starts at 1 and is advanced once per row by whichever materializer is
/// reading the table.
#[derive(Debug, Clone, Serialize)]
pub struct TableDescriptor {
    /// `<schema>.<table>`.
    pub id: String,

    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Ordered columns.
    pub columns: Vec<ColumnDescriptor>,

    /// Folder of the schema inside the archive content tree.
    pub schema_folder: Option<String>,

    /// Folder of the table inside its schema folder.
    pub folder: Option<String>,

    /// Row count declared by the catalog.
    pub rows: Option<u64>,

    /// Optional filter appended to the extraction query.
    pub where_clause: Option<String>,

    /// Optional ordering appended to the extraction query.
    pub order_by: Option<String>,

    #[serde(skip)]
    current_row: u64,
}

impl TableDescriptor {
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<ColumnDescriptor>,
    ) -> Self {
        let schema = schema.into();
        let name = name.into();
        Self {
            id: format!("{}.{}", schema, name),
            schema,
            name,
            columns,
            schema_folder: None,
            folder: None,
            rows: None,
            where_clause: None,
            order_by: None,
            current_row: 1,
        }
    }

    /// Build a descriptor from `(column name, type)` pairs.
    pub fn with_columns<I, S>(schema: &str, name: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Type)>,
        S: Into<String>,
    {
        let columns = columns
            .into_iter()
            .map(|(col, ty)| ColumnDescriptor::new(name, col, ty))
            .collect();
        Self::new(schema, name, columns)
    }

    pub fn with_folders(mut self, schema_folder: impl Into<String>, folder: impl Into<String>) -> Self {
        self.schema_folder = Some(schema_folder.into());
        self.folder = Some(folder.into());
        self
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Index the next row would receive.
    pub fn current_row(&self) -> u64 {
        self.current_row
    }

    /// Hand out the current row index and advance the counter.
    pub fn next_row_index(&mut self) -> u64 {
        let index = self.current_row;
        self.current_row += 1;
        index
    }

    /// Restart numbering before the table is streamed again.
    pub fn reset_row_counter(&mut self) {
        self.current_row = 1;
    }

    /// `SELECT` statement reading every declared column in order.
    pub fn select_sql(&self) -> Result<String> {
        let columns = self
            .columns
            .iter()
            .map(|c| quote_pg(&c.name))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let mut sql = format!(
            "SELECT {} FROM {}",
            columns,
            qualify_pg(&self.schema, &self.name)?
        );
        if let Some(filter) = &self.where_clause {
            validate_fragment(filter)?;
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        if let Some(order) = &self.order_by {
            validate_fragment(order)?;
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_table() -> TableDescriptor {
        TableDescriptor::with_columns(
            "public",
            "orders",
            [("id", Type::numeric()), ("note", Type::string())],
        )
    }

    #[test]
    fn test_ids() {
        let table = make_table();
        assert_eq!(table.id, "public.orders");
        assert_eq!(table.columns[1].id, "orders.note");
    }

    #[test]
    fn test_row_counter_starts_at_one() {
        let mut table = make_table();
        assert_eq!(table.next_row_index(), 1);
        assert_eq!(table.next_row_index(), 2);
        assert_eq!(table.current_row(), 3);
        table.reset_row_counter();
        assert_eq!(table.current_row(), 1);
    }

    #[test]
    fn test_select_sql() {
        let mut table = make_table();
        assert_eq!(
            table.select_sql().unwrap(),
            "SELECT \"id\", \"note\" FROM \"public\".\"orders\""
        );
        table.where_clause = Some("id > 5".into());
        table.order_by = Some("id".into());
        assert_eq!(
            table.select_sql().unwrap(),
            "SELECT \"id\", \"note\" FROM \"public\".\"orders\" WHERE id > 5 ORDER BY id"
        );
    }

    #[test]
    fn test_select_sql_rejects_injection() {
        let mut table = make_table();
        table.where_clause = Some("1=1; DROP TABLE orders".into());
        assert!(table.select_sql().is_err());
    }
}
