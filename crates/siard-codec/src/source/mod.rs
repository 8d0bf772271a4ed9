//! Live database source: cursor traits, the row materializer and the
//! PostgreSQL driver.

pub mod array_literal;
pub mod cursor;
pub mod decode;
pub mod fetch;
pub mod materializer;
pub mod postgres;
pub mod sqlstate;
pub mod tls;

#[cfg(test)]
pub(crate) mod mock;

pub use cursor::{ArrayValue, Connection, Cursor};
pub use fetch::FetchLadder;
pub use materializer::{CursorMaterializer, RowStream};
pub use postgres::{PgConnection, PgCursor};
pub use sqlstate::{classify, ErrorClass};
