//! Driver-neutral cursor and connection traits.
//!
//! A [`Connection`] opens forward-only, read-only [`Cursor`]s for a query at
//! a given fetch size. Accessors take 0-based column positions and return
//! `Ok(None)` when the driver reports SQL NULL. Typed accessors have text
//! parsing defaults so a driver that only speaks text needs to implement
//! [`Cursor::get_text`] alone.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::decode::{parse_blob_text, parse_date_text, parse_time_text, parse_timestamp_text};
use crate::core::LargeObject;
use crate::error::{CodecError, Result};

/// A driver's array value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayValue {
    Null,
    /// Element in text form.
    Item(String),
    /// One dimension level.
    List(Vec<ArrayValue>),
}

/// Forward-only cursor over a query result.
pub trait Cursor {
    /// Columns in the current row.
    fn column_count(&self) -> usize;

    /// 1-based position of the current row, when the driver tracks it.
    fn row_number(&self) -> Option<u64> {
        None
    }

    /// Rows requested per round trip.
    fn fetch_size(&self) -> usize;

    /// Change the rows requested per round trip. Must not move the cursor.
    fn set_fetch_size(&mut self, rows: usize) -> Result<()>;

    /// Move to the next row; `Ok(false)` when the result is exhausted.
    ///
    /// A failed call must leave the position unchanged so it can be retried.
    fn next_row(&mut self) -> Result<bool>;

    fn get_text(&self, column: usize) -> Result<Option<String>>;

    fn get_time(&self, column: usize) -> Result<Option<NaiveTime>> {
        self.get_text(column)?
            .map(|t| {
                parse_time_text(&t)
                    .ok_or_else(|| CodecError::driver(format!("invalid time value {:?}", t)))
            })
            .transpose()
    }

    fn get_timestamp(&self, column: usize) -> Result<Option<NaiveDateTime>> {
        self.get_text(column)?
            .map(|t| {
                parse_timestamp_text(&t)
                    .ok_or_else(|| CodecError::driver(format!("invalid timestamp value {:?}", t)))
            })
            .transpose()
    }

    fn get_date(&self, column: usize) -> Result<Option<NaiveDate>> {
        self.get_text(column)?
            .map(|t| {
                parse_date_text(&t)
                    .ok_or_else(|| CodecError::driver(format!("invalid date value {:?}", t)))
            })
            .transpose()
    }

    /// Binary value as a large object. The default decodes hex text.
    fn get_blob(&self, column: usize) -> Result<Option<LargeObject>> {
        self.get_text(column)?
            .map(|t| parse_blob_text(&t).map(LargeObject::inline))
            .transpose()
    }

    fn get_array(&self, _column: usize) -> Result<Option<ArrayValue>> {
        Err(CodecError::driver("array values are not supported by this driver"))
    }

    /// Release the cursor. Called once when reading stops, on every path.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Single-owner database connection that opens cursors.
pub trait Connection {
    type Cursor: Cursor;

    /// Execute `sql` and position a cursor before its first row.
    fn open_cursor(&mut self, sql: &str, fetch_size: usize) -> Result<Self::Cursor>;

    /// Whether the underlying connection has gone away.
    fn is_closed(&self) -> bool;

    /// Replace the connection, discarding anything opened on the old one.
    fn reconnect(&mut self) -> Result<()>;
}
