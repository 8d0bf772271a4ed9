//! Shared data model for both directions of the codec.
//!
//! - [`types`]: closed set of column types
//! - [`cell`]: cell values, large objects, nested arrays and identity keys
//! - [`row`]: fixed-length rows
//! - [`schema`]: table and column descriptors
//! - [`catalog`]: YAML catalog of table descriptors
//! - [`identifier`]: identifier quoting for extraction queries
//!
//! The cursor materializer and the archive decoder both produce [`Row`]s of
//! [`Cell`]s from a [`TableDescriptor`]; neither depends on the other.

pub mod catalog;
pub mod cell;
pub mod identifier;
pub mod row;
pub mod schema;
pub mod types;

pub use catalog::{Catalog, ColumnSpec, SchemaSpec, TableSpec, TypeDecl};
pub use cell::{
    cell_id, element_id, Cell, CellValue, Coordinates, LargeObject, LobMetadata, LobSource,
    NestedCell,
};
pub use row::Row;
pub use schema::{ColumnDescriptor, TableDescriptor};
pub use types::{DateTimePrecision, Field, Type};
