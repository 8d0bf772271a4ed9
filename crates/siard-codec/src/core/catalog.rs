//! Table catalog loaded from YAML.
//!
//! Schema introspection happens elsewhere; this module only reads the catalog
//! it produces and turns it into [`TableDescriptor`]s. Folder names default to
//! the archive convention `schema<n>` / `table<n>` (1-based, in document
//! order).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::schema::{ColumnDescriptor, TableDescriptor};
use super::types::Type;
use crate::error::{CodecError, Result};

/// Root of a catalog document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    /// Root folder for large objects inside the archive (default: archive root).
    #[serde(default)]
    pub lob_folder: Option<String>,

    pub schemas: Vec<SchemaSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub name: String,

    #[serde(default)]
    pub folder: Option<String>,

    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,

    #[serde(default)]
    pub folder: Option<String>,

    /// Declared row count.
    #[serde(default)]
    pub rows: Option<u64>,

    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,

    #[serde(default)]
    pub order_by: Option<String>,

    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub ty: TypeDecl,

    #[serde(default = "default_true")]
    pub nullable: bool,

    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub lob_folder: Option<String>,
}

/// A column type written either as an SQL name or as a structured [`Type`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDecl {
    Sql(String),
    Full(Type),
}

impl TypeDecl {
    pub fn resolve(&self) -> Type {
        match self {
            TypeDecl::Sql(name) => Type::parse_sql(name),
            TypeDecl::Full(ty) => ty.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl Catalog {
    /// Load a catalog from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a catalog from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Check names are present and table ids are unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for schema in &self.schemas {
            if schema.name.is_empty() {
                return Err(CodecError::Config("catalog schema name is required".into()));
            }
            for table in &schema.tables {
                let id = format!("{}.{}", schema.name, table.name);
                if table.name.is_empty() {
                    return Err(CodecError::Config(format!(
                        "catalog table name is required in schema '{}'",
                        schema.name
                    )));
                }
                if table.columns.is_empty() {
                    return Err(CodecError::Config(format!(
                        "catalog table '{}' declares no columns",
                        id
                    )));
                }
                if !seen.insert(id.clone()) {
                    return Err(CodecError::Config(format!(
                        "catalog table '{}' is declared twice",
                        id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Large-object root folder, empty when unset.
    pub fn lobs_root(&self) -> &str {
        self.lob_folder.as_deref().unwrap_or("")
    }

    /// Descriptors for every table, in catalog order.
    pub fn tables(&self) -> Vec<TableDescriptor> {
        let mut tables = Vec::new();
        for (si, schema) in self.schemas.iter().enumerate() {
            let schema_folder = schema
                .folder
                .clone()
                .unwrap_or_else(|| format!("schema{}", si + 1));
            for (ti, spec) in schema.tables.iter().enumerate() {
                let columns = spec
                    .columns
                    .iter()
                    .map(|c| ColumnDescriptor {
                        nullable: c.nullable,
                        default_value: c.default.clone(),
                        lob_folder: c.lob_folder.clone(),
                        ..ColumnDescriptor::new(&spec.name, &c.name, c.ty.resolve())
                    })
                    .collect();
                let mut table = TableDescriptor::new(&schema.name, &spec.name, columns);
                table.schema_folder = Some(schema_folder.clone());
                table.folder = Some(
                    spec.folder
                        .clone()
                        .unwrap_or_else(|| format!("table{}", ti + 1)),
                );
                table.rows = spec.rows;
                table.where_clause = spec.where_clause.clone();
                table.order_by = spec.order_by.clone();
                tables.push(table);
            }
        }
        tables
    }

    /// Descriptor for `<schema>.<table>`.
    pub fn table(&self, id: &str) -> Result<TableDescriptor> {
        self.tables()
            .into_iter()
            .find(|t| t.id == id)
            .ok_or_else(|| CodecError::UnknownTable(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DateTimePrecision;

    const CATALOG: &str = r#"
lob_folder: lobs
schemas:
  - name: public
    tables:
      - name: orders
        rows: 3
        columns:
          - name: id
            type: INTEGER
            nullable: false
          - name: placed
            type: DATE
      - name: blobs
        folder: table7
        columns:
          - name: data
            type: { kind: binary, large: true }
            lob_folder: seg1
"#;

    #[test]
    fn test_tables_get_default_folders() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        let tables = catalog.tables();
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].schema_folder.as_deref(), Some("schema1"));
        assert_eq!(tables[0].folder.as_deref(), Some("table1"));
        assert_eq!(tables[1].folder.as_deref(), Some("table7"));
        assert_eq!(tables[0].rows, Some(3));
        assert_eq!(catalog.lobs_root(), "lobs");
    }

    #[test]
    fn test_column_types_resolve() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        let orders = catalog.table("public.orders").unwrap();
        assert_eq!(orders.columns[0].ty, Type::numeric());
        assert!(!orders.columns[0].nullable);
        assert_eq!(
            orders.columns[1].ty,
            Type::date_time(DateTimePrecision::Date)
        );
        let blobs = catalog.table("public.blobs").unwrap();
        assert!(blobs.columns[0].ty.is_binary());
        assert_eq!(blobs.columns[0].lob_folder.as_deref(), Some("seg1"));
        assert_eq!(blobs.columns[0].id, "blobs.data");
    }

    #[test]
    fn test_unknown_table() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        assert!(matches!(
            catalog.table("public.missing"),
            Err(CodecError::UnknownTable(_))
        ));
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let yaml = "schemas:\n  - name: s\n    tables:\n      - name: t\n        columns: [{name: a, type: INTEGER}]\n      - name: t\n        columns: [{name: a, type: INTEGER}]\n";
        assert!(Catalog::from_yaml(yaml).is_err());
    }
}
