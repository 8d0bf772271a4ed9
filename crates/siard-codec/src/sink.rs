//! Downstream consumers of rows.

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

use crate::core::{Cell, CellValue, LargeObject, Row, TableDescriptor};
use crate::error::{CodecError, Result};

/// Receives the rows of one table at a time, in order.
///
/// Each row is handed over by value and dropped by the sink; nothing upstream
/// keeps it. An error from any method ends the current table.
pub trait RowSink {
    fn open_table(&mut self, _table: &TableDescriptor) -> Result<()> {
        Ok(())
    }

    fn handle_row(&mut self, table: &TableDescriptor, row: Row) -> Result<()>;

    fn close_table(&mut self, _table: &TableDescriptor) -> Result<()> {
        Ok(())
    }
}

/// Counts rows per run; used for dry runs and tests.
#[derive(Debug, Default)]
pub struct CountingSink {
    pub tables_opened: usize,
    pub tables_closed: usize,
    pub rows: u64,
}

impl RowSink for CountingSink {
    fn open_table(&mut self, _table: &TableDescriptor) -> Result<()> {
        self.tables_opened += 1;
        Ok(())
    }

    fn handle_row(&mut self, _table: &TableDescriptor, _row: Row) -> Result<()> {
        self.rows += 1;
        Ok(())
    }

    fn close_table(&mut self, _table: &TableDescriptor) -> Result<()> {
        self.tables_closed += 1;
        Ok(())
    }
}

/// Writes one JSON object per row.
///
/// Large objects are rendered as their length and SHA-256, computed by
/// streaming the content; detached large objects fall back to their declared
/// metadata.
pub struct JsonLinesSink<W: Write> {
    out: W,
    digest_lobs: bool,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            digest_lobs: true,
        }
    }

    /// Skip reading large-object content; only declared metadata is written.
    pub fn without_lob_digests(mut self) -> Self {
        self.digest_lobs = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn cell_json(&self, cell: &Cell) -> Result<Value> {
        Ok(match &cell.value {
            CellValue::Absent => Value::Null,
            CellValue::Scalar(text) => Value::String(text.clone()),
            CellValue::LargeObject(lob) => self.lob_json(lob)?,
            CellValue::Nested(nested) => {
                let elements = nested
                    .iter()
                    .map(|(at, element)| {
                        Ok(json!({ "at": at, "value": self.cell_json(element)? }))
                    })
                    .collect::<Result<Vec<_>>>()?;
                json!({ "array": elements })
            }
        })
    }

    fn lob_json(&self, lob: &LargeObject) -> Result<Value> {
        let meta = &lob.metadata;
        let mut obj = json!({
            "length": lob.known_length(),
            "digest": meta.digest,
            "digest_type": meta.digest_type,
            "path": meta.path,
        });
        if self.digest_lobs && !lob.is_detached() {
            let (length, sha256) = stream_digest(lob.open()?)?;
            obj["length"] = json!(length);
            obj["sha256"] = json!(sha256);
        }
        Ok(json!({ "lob": obj }))
    }
}

fn stream_digest(mut reader: Box<dyn Read + Send>) -> Result<(u64, String)> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((total, hex::encode(hasher.finalize())))
}

impl<W: Write> RowSink for JsonLinesSink<W> {
    fn handle_row(&mut self, table: &TableDescriptor, row: Row) -> Result<()> {
        let cells = row
            .cells
            .iter()
            .map(|c| self.cell_json(c))
            .collect::<Result<Vec<_>>>()?;
        let line = json!({
            "table": table.id,
            "row": row.index,
            "cells": cells,
        });
        serde_json::to_writer(&mut self.out, &line)?;
        self.out
            .write_all(b"\n")
            .map_err(|e| CodecError::sink(&table.id, e.to_string()))
    }

    fn close_table(&mut self, table: &TableDescriptor) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| CodecError::sink(&table.id, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LobMetadata, NestedCell, Type};

    fn make_table() -> TableDescriptor {
        TableDescriptor::with_columns(
            "s",
            "t",
            [
                ("a", Type::numeric()),
                ("b", Type::binary()),
                ("c", Type::array(Type::string(), 1)),
                ("d", Type::binary()),
            ],
        )
    }

    #[test]
    fn test_json_lines_output() {
        let table = make_table();
        let mut nested = NestedCell::new();
        nested.insert(vec![1], Cell::scalar("t.c.1.1", "x"));
        let row = Row::new(
            1,
            vec![
                Cell::scalar("t.a.1", "42"),
                Cell::new("t.b.1", CellValue::LargeObject(LargeObject::inline(b"abc".to_vec()))),
                Cell::nested("t.c.1", nested),
                Cell::new(
                    "t.d.1",
                    CellValue::LargeObject(LargeObject::detached(LobMetadata {
                        length: Some(9),
                        digest: Some("ff".into()),
                        digest_type: Some("MD5".into()),
                        path: None,
                    })),
                ),
            ],
        );

        let mut sink = JsonLinesSink::new(Vec::new());
        sink.handle_row(&table, row).unwrap();
        let text = String::from_utf8(sink.into_inner()).unwrap();
        let value: Value = serde_json::from_str(text.trim()).unwrap();

        assert_eq!(value["table"], "s.t");
        assert_eq!(value["row"], 1);
        assert_eq!(value["cells"][0], "42");
        assert_eq!(value["cells"][1]["lob"]["length"], 3);
        assert_eq!(
            value["cells"][1]["lob"]["sha256"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(value["cells"][2]["array"][0]["at"], json!([1]));
        assert_eq!(value["cells"][3]["lob"]["length"], 9);
        assert_eq!(value["cells"][3]["lob"]["digest_type"], "MD5");
        assert!(value["cells"][3]["lob"].get("sha256").is_none());
    }

    #[test]
    fn test_counting_sink() {
        let table = make_table();
        let mut sink = CountingSink::default();
        sink.open_table(&table).unwrap();
        sink.handle_row(&table, Row::all_absent(&table, 1)).unwrap();
        sink.close_table(&table).unwrap();
        assert_eq!((sink.tables_opened, sink.rows, sink.tables_closed), (1, 1, 1));
    }
}
