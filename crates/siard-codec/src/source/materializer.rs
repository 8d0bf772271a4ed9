//! Cursor row materializer.
//!
//! Turns a live cursor into a lazy sequence of [`Row`]s, one cursor row per
//! produced row. Each column is decoded according to its [`Type`]; a column
//! that fails to decode becomes `Absent` and is reported, and a cursor row
//! with the wrong shape becomes an all-`Absent` row. Only the fetch-size
//! ladder running out ends a table.

use std::iter::FusedIterator;
use tracing::{debug, info, warn};

use super::cursor::{ArrayValue, Connection, Cursor};
use super::decode::{
    normalize_exact_numeric, normalize_time_with_zone, parse_blob_text, parse_date_text,
    parse_time_text, parse_timestamp_text, render_bool_text, render_date, render_time,
    render_timestamp, zoned_timestamp_instant,
};
use super::fetch::FetchLadder;
use crate::core::{
    cell_id, element_id, Cell, CellValue, DateTimePrecision, LargeObject, NestedCell, Row,
    TableDescriptor, Type,
};
use crate::error::{CodecError, Result};
use crate::report::{Anomaly, Reporter};

/// Reads tables from a [`Connection`] row by row.
pub struct CursorMaterializer<'r> {
    ladder: FetchLadder,
    reporter: &'r dyn Reporter,
}

impl<'r> CursorMaterializer<'r> {
    pub fn new(ladder: FetchLadder, reporter: &'r dyn Reporter) -> Self {
        Self { ladder, reporter }
    }

    pub fn ladder(&self) -> &FetchLadder {
        &self.ladder
    }

    /// Run the table query, walking the fetch-size ladder until one size
    /// succeeds.
    ///
    /// Before every retry a dropped connection is re-established; failing to
    /// reconnect ends the whole run.
    pub fn open_cursor<C: Connection>(
        &self,
        conn: &mut C,
        table: &TableDescriptor,
    ) -> Result<C::Cursor> {
        let sql = table.select_sql()?;
        let mut last_error = None;

        for (attempt, &size) in self.ladder.sizes().iter().enumerate() {
            if attempt > 0 && conn.is_closed() {
                warn!("{}: connection dropped, reconnecting", table.id);
                conn.reconnect()?;
            }
            debug!("{}: executing query with fetch size {}", table.id, size);
            match conn.open_cursor(&sql, size) {
                Ok(cursor) => return Ok(cursor),
                Err(e) if e.is_fatal_for_run() => return Err(e),
                Err(e) => {
                    warn!(
                        "{}: query failed at fetch size {}: {}",
                        table.id, size, e
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(CodecError::FetchExhausted {
            table: table.id.clone(),
            attempts: self.ladder.len(),
            message: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    /// Open the table and return its rows.
    pub fn read_table<'a, C: Connection>(
        &'a self,
        conn: &mut C,
        table: &'a mut TableDescriptor,
    ) -> Result<RowStream<'a, C::Cursor>> {
        info!("{}: reading from database", table.id);
        let cursor = self.open_cursor(conn, table)?;
        Ok(self.rows(cursor, table))
    }

    /// Wrap an already open cursor.
    pub fn rows<'a, C: Cursor>(
        &'a self,
        cursor: C,
        table: &'a mut TableDescriptor,
    ) -> RowStream<'a, C> {
        RowStream {
            materializer: self,
            cursor,
            table,
            done: false,
        }
    }

    /// Advance the cursor, shrinking the fetch size when the driver fails.
    ///
    /// The cursor keeps its position across failed attempts.
    pub fn advance<C: Cursor>(&self, cursor: &mut C, table_id: &str) -> Result<bool> {
        let mut last_error = match cursor.next_row() {
            Ok(more) => return Ok(more),
            Err(e) => e,
        };
        let mut attempts = 1;

        let retry_sizes: Vec<usize> = self.ladder.below(cursor.fetch_size()).collect();
        for size in retry_sizes {
            warn!(
                "{}: advancing failed ({}), retrying with fetch size {}",
                table_id, last_error, size
            );
            cursor.set_fetch_size(size)?;
            attempts += 1;
            match cursor.next_row() {
                Ok(more) => return Ok(more),
                Err(e) => last_error = e,
            }
        }

        Err(CodecError::FetchExhausted {
            table: table_id.to_string(),
            attempts,
            message: last_error.to_string(),
        })
    }

    /// Decode the cursor's current row.
    pub fn convert_row<C: Cursor>(&self, cursor: &C, table: &mut TableDescriptor) -> Row {
        let counter = table.next_row_index();
        let index = cursor.row_number().unwrap_or(counter);

        if cursor.column_count() != table.column_count() {
            self.reporter.report(Anomaly::row_used_null(
                &table.id,
                index,
                format!(
                    "cursor returned {} columns, table declares {}",
                    cursor.column_count(),
                    table.column_count()
                ),
            ));
            return Row::all_absent(table, index);
        }

        let cells = table
            .columns
            .iter()
            .enumerate()
            .map(|(position, column)| {
                let id = cell_id(&column.id, index);
                match self.convert_cell(cursor, position, &column.ty, &id) {
                    Ok(value) => Cell::new(id, value),
                    Err(e) => {
                        self.reporter
                            .report(Anomaly::cell_used_null(&id, e.to_string()));
                        Cell::absent(id)
                    }
                }
            })
            .collect();

        Row::new(index, cells)
    }

    fn convert_cell<C: Cursor>(
        &self,
        cursor: &C,
        column: usize,
        ty: &Type,
        id: &str,
    ) -> Result<CellValue> {
        let value = match ty {
            Type::String { .. } | Type::NumericApproximate { .. } | Type::Unsupported { .. } => {
                cursor.get_text(column)?.map(CellValue::Scalar)
            }
            Type::Boolean => cursor
                .get_text(column)?
                .map(|t| CellValue::Scalar(render_bool_text(t))),
            Type::NumericExact { .. } => cursor
                .get_text(column)?
                .map(|t| CellValue::Scalar(normalize_exact_numeric(t))),
            Type::DateTime { precision } => match precision {
                DateTimePrecision::Time => cursor
                    .get_time(column)?
                    .map(|t| CellValue::Scalar(render_time(t))),
                DateTimePrecision::TimeWithZone => cursor
                    .get_text(column)?
                    .map(|t| CellValue::Scalar(normalize_time_with_zone(&t))),
                DateTimePrecision::TimestampWithZone => cursor
                    .get_text(column)?
                    .map(|t| zoned_timestamp_instant(&t).map(CellValue::Scalar))
                    .transpose()?,
                DateTimePrecision::Timestamp => cursor
                    .get_timestamp(column)?
                    .map(|t| CellValue::Scalar(render_timestamp(t))),
                DateTimePrecision::Date => cursor
                    .get_date(column)?
                    .map(|d| CellValue::Scalar(render_date(d))),
            },
            Type::Binary {
                outside_database: true,
                ..
            } => cursor.get_text(column)?.map(CellValue::Scalar),
            Type::Binary { .. } => cursor.get_blob(column)?.map(CellValue::LargeObject),
            Type::Array {
                element,
                dimensions,
            } => cursor
                .get_array(column)?
                .map(|array| self.convert_array(array, element, *dimensions, id)),
            Type::Structure { name, .. } => {
                self.reporter.report(Anomaly::not_yet_supported(
                    format!("structured type {}", name),
                    id,
                ));
                None
            }
        };
        Ok(value.unwrap_or(CellValue::Absent))
    }

    fn convert_array(
        &self,
        array: ArrayValue,
        element: &Type,
        dimensions: u32,
        id: &str,
    ) -> CellValue {
        let items = match array {
            ArrayValue::List(items) => items,
            ArrayValue::Null => return CellValue::Absent,
            ArrayValue::Item(_) => {
                self.reporter
                    .report(Anomaly::cell_used_null(id, "array value is not a list"));
                return CellValue::Absent;
            }
        };

        let mut nested = NestedCell::new();
        let mut coordinates = Vec::new();
        self.walk_array(
            &items,
            1,
            dimensions.max(1),
            element,
            id,
            &mut coordinates,
            &mut nested,
        );
        Cell::nested(id, nested).value
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_array(
        &self,
        items: &[ArrayValue],
        depth: u32,
        dimensions: u32,
        element: &Type,
        parent_id: &str,
        coordinates: &mut Vec<u32>,
        nested: &mut NestedCell,
    ) {
        for (i, item) in items.iter().enumerate() {
            coordinates.push(i as u32 + 1);
            let id = element_id(parent_id, coordinates);
            match (item, depth < dimensions) {
                (ArrayValue::List(inner), true) => self.walk_array(
                    inner,
                    depth + 1,
                    dimensions,
                    element,
                    parent_id,
                    coordinates,
                    nested,
                ),
                (ArrayValue::Null, true) => {}
                (ArrayValue::Item(_), true) => {
                    self.reporter.report(Anomaly::cell_used_null(
                        &id,
                        format!("array has fewer than {} dimensions", dimensions),
                    ));
                }
                (ArrayValue::Null, false) => {
                    nested.insert(coordinates.clone(), Cell::absent(id));
                }
                (ArrayValue::Item(text), false) => {
                    let cell = match self.convert_element(text, element, &id) {
                        Ok(value) => Cell::new(id, value),
                        Err(e) => {
                            self.reporter
                                .report(Anomaly::cell_used_null(&id, e.to_string()));
                            Cell::absent(id)
                        }
                    };
                    nested.insert(coordinates.clone(), cell);
                }
                (ArrayValue::List(_), false) => {
                    self.reporter.report(Anomaly::cell_used_null(
                        &id,
                        format!("array has more than {} dimensions", dimensions),
                    ));
                    nested.insert(coordinates.clone(), Cell::absent(id));
                }
            }
            coordinates.pop();
        }
    }

    fn convert_element(&self, text: &str, element: &Type, id: &str) -> Result<CellValue> {
        let invalid = |kind: &str| CodecError::driver(format!("invalid {} element {:?}", kind, text));
        Ok(match element {
            Type::String { .. } | Type::NumericApproximate { .. } | Type::Unsupported { .. } => {
                CellValue::Scalar(text.to_string())
            }
            Type::Boolean => CellValue::Scalar(render_bool_text(text.to_string())),
            Type::NumericExact { .. } => {
                CellValue::Scalar(normalize_exact_numeric(text.to_string()))
            }
            Type::DateTime { precision } => CellValue::Scalar(match precision {
                DateTimePrecision::Date => {
                    render_date(parse_date_text(text).ok_or_else(|| invalid("date"))?)
                }
                DateTimePrecision::Time => {
                    render_time(parse_time_text(text).ok_or_else(|| invalid("time"))?)
                }
                DateTimePrecision::TimeWithZone => normalize_time_with_zone(text),
                DateTimePrecision::Timestamp => render_timestamp(
                    parse_timestamp_text(text).ok_or_else(|| invalid("timestamp"))?,
                ),
                DateTimePrecision::TimestampWithZone => zoned_timestamp_instant(text)?,
            }),
            Type::Binary { .. } => CellValue::LargeObject(LargeObject::inline(parse_blob_text(text)?)),
            Type::Array { .. } | Type::Structure { .. } => {
                self.reporter
                    .report(Anomaly::not_yet_supported("nested array element type", id));
                CellValue::Absent
            }
        })
    }
}

/// Lazy, finite, non-restartable rows of one table.
///
/// The cursor is closed as soon as the rows run out or reading fails, and
/// on drop if the caller stops early. After an error the stream is fused.
pub struct RowStream<'a, C: Cursor> {
    materializer: &'a CursorMaterializer<'a>,
    cursor: C,
    table: &'a mut TableDescriptor,
    done: bool,
}

impl<C: Cursor> RowStream<'_, C> {
    /// The table being read.
    pub fn table(&self) -> &TableDescriptor {
        self.table
    }

    fn finish(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        if let Err(e) = self.cursor.close() {
            warn!("{}: closing cursor failed: {}", self.table.id, e);
        }
    }
}

impl<C: Cursor> Iterator for RowStream<'_, C> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.materializer.advance(&mut self.cursor, &self.table.id) {
            Ok(true) => Some(Ok(self.materializer.convert_row(&self.cursor, self.table))),
            Ok(false) => {
                self.finish();
                None
            }
            Err(e) => {
                self.finish();
                Some(Err(e))
            }
        }
    }
}

impl<C: Cursor> FusedIterator for RowStream<'_, C> {}

impl<C: Cursor> Drop for RowStream<'_, C> {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingReporter;
    use crate::source::mock::{MockValue, ScriptedConnection};

    fn make_table() -> TableDescriptor {
        TableDescriptor::with_columns(
            "public",
            "orders",
            [
                ("id", Type::numeric()),
                ("note", Type::string()),
                ("placed", Type::date_time(DateTimePrecision::Date)),
            ],
        )
    }

    fn row(values: &[&str]) -> Vec<MockValue> {
        values.iter().map(|v| MockValue::from(*v)).collect()
    }

    fn collect(
        conn: &mut ScriptedConnection,
        table: &mut TableDescriptor,
        reporter: &CollectingReporter,
    ) -> Result<Vec<Row>> {
        let materializer = CursorMaterializer::new(FetchLadder::default(), reporter);
        let stream = materializer.read_table(conn, table)?;
        stream.collect()
    }

    #[test]
    fn test_simple_row_decodes() {
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![row(&["42", "hello", "2020-01-01"])]);
        let mut table = make_table();
        let rows = collect(&mut conn, &mut table, &reporter).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].index, 1);
        assert_eq!(rows[0].cells[0], Cell::scalar("orders.id.1", "42"));
        assert_eq!(rows[0].cells[1], Cell::scalar("orders.note.1", "hello"));
        assert_eq!(rows[0].cells[2], Cell::scalar("orders.placed.1", "2020-01-01"));
        assert_eq!(reporter.count(), 0);
        assert_eq!(table.current_row(), 2);
    }

    #[test]
    fn test_nulls_become_absent_for_every_type() {
        let types = vec![
            Type::string(),
            Type::numeric(),
            Type::NumericApproximate { precision: None },
            Type::Boolean,
            Type::date_time(DateTimePrecision::Date),
            Type::date_time(DateTimePrecision::Time),
            Type::date_time(DateTimePrecision::TimeWithZone),
            Type::date_time(DateTimePrecision::Timestamp),
            Type::date_time(DateTimePrecision::TimestampWithZone),
            Type::binary(),
            Type::Binary {
                outside_database: true,
                large: false,
            },
            Type::Unsupported {
                vendor_name: "GEOMETRY".into(),
            },
            Type::array(Type::numeric(), 1),
        ];
        let columns: Vec<_> = types
            .iter()
            .enumerate()
            .map(|(i, t)| (format!("c{}", i), t.clone()))
            .collect();
        let mut table = TableDescriptor::with_columns("s", "t", columns);
        let nulls = vec![MockValue::Null; types.len()];
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![nulls]);

        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        assert!(rows[0].cells.iter().all(Cell::is_absent));
        assert_eq!(reporter.count(), 0);
    }

    #[test]
    fn test_scalar_normalization() {
        let mut table = TableDescriptor::with_columns(
            "s",
            "t",
            [
                ("n", Type::numeric()),
                ("b", Type::Boolean),
                ("ts", Type::date_time(DateTimePrecision::Timestamp)),
                ("tz", Type::date_time(DateTimePrecision::TimestampWithZone)),
                ("tm", Type::date_time(DateTimePrecision::TimeWithZone)),
            ],
        );
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![row(&[
            "1.5E3",
            "t",
            "2020-01-01 10:00:00",
            "2020-01-01 10:00:00+01",
            "10:00:00+02",
        ])]);

        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        let texts: Vec<_> = rows[0].cells.iter().map(|c| c.as_text().unwrap()).collect();
        assert_eq!(
            texts,
            vec![
                "1500",
                "true",
                "2020-01-01T10:00:00Z",
                "2020-01-01T09:00:00Z",
                "10:00:00+02:00"
            ]
        );
    }

    #[test]
    fn test_binary_columns() {
        let mut table = TableDescriptor::with_columns(
            "s",
            "t",
            [
                ("data", Type::binary()),
                (
                    "external",
                    Type::Binary {
                        outside_database: true,
                        large: true,
                    },
                ),
            ],
        );
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![row(&["\\x0102", "blob-ref-17"])]);

        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        assert_eq!(
            rows[0].cells[0].value,
            CellValue::LargeObject(LargeObject::inline(vec![1, 2]))
        );
        assert_eq!(rows[0].cells[1].as_text(), Some("blob-ref-17"));
    }

    #[test]
    fn test_cell_failure_is_contained() {
        let mut table = make_table();
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![row(&["7", "ok", "not a date"])]);

        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        assert_eq!(rows[0].cells[0].as_text(), Some("7"));
        assert_eq!(rows[0].cells[1].as_text(), Some("ok"));
        assert!(rows[0].cells[2].is_absent());
        assert_eq!(reporter.count(), 1);
        assert!(matches!(
            &reporter.anomalies()[0],
            Anomaly::CellUsedNull { cell_id, .. } if cell_id == "orders.placed.1"
        ));
    }

    #[test]
    fn test_wrong_column_count_yields_absent_row() {
        let mut table = make_table();
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![
            row(&["1", "short"]),
            row(&["2", "fine", "2021-02-03"]),
        ]);

        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 3);
        assert!(rows[0].cells.iter().all(Cell::is_absent));
        assert_eq!(rows[1].cells[2].as_text(), Some("2021-02-03"));
        assert_eq!(reporter.count(), 1);
        assert!(matches!(
            reporter.anomalies()[0],
            Anomaly::RowUsedNull { row_index: 1, .. }
        ));
    }

    #[test]
    fn test_driver_row_numbers_take_precedence() {
        let mut table = make_table();
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![
            row(&["1", "a", "2020-01-01"]),
            row(&["2", "b", "2020-01-02"]),
        ]);
        conn.report_row_numbers = true;
        table.next_row_index();

        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        assert_eq!(rows[1].index, 2);
        assert_eq!(rows[1].cells[1].id, "orders.note.2");
    }

    #[test]
    fn test_two_dimensional_array() {
        let mut table = TableDescriptor::with_columns(
            "s",
            "grid",
            [("cells", Type::array(Type::numeric(), 2))],
        );
        let item = |s: &str| ArrayValue::Item(s.to_string());
        let value = ArrayValue::List(vec![
            ArrayValue::List(vec![item("1"), item("2")]),
            ArrayValue::List(vec![item("3"), ArrayValue::Null]),
        ]);
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![vec![MockValue::Array(value)]]);

        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        let nested = match &rows[0].cells[0].value {
            CellValue::Nested(n) => n,
            other => panic!("expected nested cell, got {:?}", other),
        };
        let ids: Vec<_> = nested.iter().map(|(_, c)| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "grid.cells.1.1.1",
                "grid.cells.1.1.2",
                "grid.cells.1.2.1",
                "grid.cells.1.2.2"
            ]
        );
        assert!(nested.get(&[2, 2]).unwrap().is_absent());
    }

    #[test]
    fn test_array_element_failure_keeps_rest_of_array() {
        let mut table = TableDescriptor::with_columns(
            "s",
            "t",
            [("days", Type::array(Type::date_time(DateTimePrecision::Date), 1))],
        );
        let value = ArrayValue::List(vec![
            ArrayValue::Item("2020-01-01".into()),
            ArrayValue::Item("garbage".into()),
        ]);
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![vec![MockValue::Array(value)]]);

        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        let CellValue::Nested(nested) = &rows[0].cells[0].value else {
            panic!("expected nested cell");
        };
        assert_eq!(nested.get(&[1]).unwrap().as_text(), Some("2020-01-01"));
        assert!(nested.get(&[2]).unwrap().is_absent());
        assert_eq!(reporter.count(), 1);
    }

    #[test]
    fn test_empty_array_is_absent() {
        let mut table =
            TableDescriptor::with_columns("s", "t", [("a", Type::array(Type::string(), 1))]);
        let reporter = CollectingReporter::new();
        let mut conn =
            ScriptedConnection::new(vec![vec![MockValue::Array(ArrayValue::List(vec![]))]]);
        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        assert!(rows[0].cells[0].is_absent());
    }

    #[test]
    fn test_structure_column_reported_not_supported() {
        let mut table = TableDescriptor::with_columns(
            "s",
            "t",
            [(
                "addr",
                Type::Structure {
                    name: "address".into(),
                    fields: vec![],
                },
            )],
        );
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![row(&["(x,y)"])]);
        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        assert!(rows[0].cells[0].is_absent());
        assert!(matches!(
            reporter.anomalies()[0],
            Anomaly::NotYetSupported { .. }
        ));
    }

    #[test]
    fn test_query_ladder_stops_at_first_success() {
        let mut table = make_table();
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![row(&["1", "a", "2020-01-01"])]);
        conn.failing_query_sizes = vec![1000];

        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(conn.attempts, vec![1000, 10]);
    }

    #[test]
    fn test_query_ladder_exhausted_after_three_attempts() {
        let mut table = make_table();
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![]);
        conn.failing_query_sizes = vec![1000, 10, 1];

        let err = collect(&mut conn, &mut table, &reporter).unwrap_err();
        assert!(matches!(err, CodecError::FetchExhausted { attempts: 3, .. }));
        assert_eq!(conn.attempts, vec![1000, 10, 1]);
    }

    #[test]
    fn test_query_ladder_reconnects_dropped_connection() {
        let mut table = make_table();
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![row(&["1", "a", "2020-01-01"])]);
        conn.failing_query_sizes = vec![1000];
        conn.drop_on_failure = true;

        collect(&mut conn, &mut table, &reporter).unwrap();
        assert_eq!(conn.reconnects, 1);
        assert_eq!(conn.attempts, vec![1000, 10]);
    }

    #[test]
    fn test_advance_ladder_keeps_position() {
        let mut table = make_table();
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![
            row(&["1", "a", "2020-01-01"]),
            row(&["2", "b", "2020-01-02"]),
        ]);
        conn.failing_next_sizes = vec![1000];

        let rows = collect(&mut conn, &mut table, &reporter).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.cells[0].as_text().unwrap()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(conn.log.borrow().fetch_sizes_set, vec![10]);
        assert_eq!(conn.log.borrow().closed, 1);
    }

    #[test]
    fn test_advance_ladder_exhausted_is_fatal_and_fused() {
        let mut table = make_table();
        let reporter = CollectingReporter::new();
        let mut conn = ScriptedConnection::new(vec![row(&["1", "a", "2020-01-01"])]);
        conn.failing_next_sizes = vec![1000, 10, 1];

        let materializer = CursorMaterializer::new(FetchLadder::default(), &reporter);
        let mut stream = materializer.read_table(&mut conn, &mut table).unwrap();
        let first = stream.next().unwrap();
        assert!(matches!(
            first,
            Err(CodecError::FetchExhausted { attempts: 3, .. })
        ));
        assert!(stream.next().is_none());
        drop(stream);
        assert_eq!(conn.log.borrow().fetch_sizes_set, vec![10, 1]);
        assert_eq!(conn.log.borrow().closed, 1);
    }
}
