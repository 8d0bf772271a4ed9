//! Table content decoder.
//!
//! [`ContentDecoder`] consumes [`XmlEvent`]s for one table and completes a
//! [`Row`] each time a `row` element closes. It keeps an explicit stack of
//! open elements; array coordinates are read off that stack (outermost
//! first) when an innermost array element closes.
//!
//! Value failures (bad hex, unresolvable large objects) turn a single cell
//! into `Absent` and are reported. Structural problems end the table.

use std::collections::BTreeSet;
use std::io::BufRead;

use tracing::{debug, info};

use super::events::{EventReader, Tag, XmlEvent};
use super::lob::{LobReference, LobResolver};
use super::text::decode_text;
use crate::core::{
    cell_id, element_id, Cell, CellValue, ColumnDescriptor, LargeObject, NestedCell, Row,
    TableDescriptor, Type,
};
use crate::error::{CodecError, Result};
use crate::report::{Anomaly, Reporter};
use crate::sink::RowSink;

enum Frame {
    Table,
    Row,
    Column,
    Array {
        index: u32,
        has_children: bool,
        /// Value resolved from a `file` attribute at open time.
        lob: Option<CellValue>,
    },
    Other,
}

impl Frame {
    fn name(&self) -> &'static str {
        match self {
            Frame::Table => "table",
            Frame::Row => "row",
            Frame::Column => "column",
            Frame::Array { .. } => "array element",
            Frame::Other => "unknown element",
        }
    }
}

struct OpenRow {
    index: u64,
    cells: Vec<Cell>,
}

struct OpenColumn {
    position: usize,
    cell_id: String,
    lob: Option<CellValue>,
    nested: NestedCell,
}

/// Event-driven state for decoding one table.
pub struct ContentDecoder<'a> {
    lobs: &'a LobResolver<'a>,
    reporter: &'a dyn Reporter,
    declared: Option<BTreeSet<usize>>,
    frames: Vec<Frame>,
    row: Option<OpenRow>,
    column: Option<OpenColumn>,
    text: String,
    seen_root: bool,
}

impl<'a> ContentDecoder<'a> {
    pub fn new(lobs: &'a LobResolver<'a>, reporter: &'a dyn Reporter) -> Self {
        Self {
            lobs,
            reporter,
            declared: None,
            frames: Vec::new(),
            row: None,
            column: None,
            text: String::new(),
            seen_root: false,
        }
    }

    /// Reject column elements the companion schema does not declare.
    pub fn with_declared_columns(mut self, declared: BTreeSet<usize>) -> Self {
        self.declared = Some(declared);
        self
    }

    /// Feed one event; returns the row completed by it, if any.
    pub fn handle(&mut self, table: &mut TableDescriptor, event: XmlEvent) -> Result<Option<Row>> {
        match event {
            XmlEvent::Open { tag, attributes } => {
                self.text.clear();
                self.open(table, tag, &attributes)?;
                Ok(None)
            }
            XmlEvent::Text(text) => {
                self.text.push_str(&text);
                Ok(None)
            }
            XmlEvent::Close { .. } => {
                let row = self.close(table)?;
                self.text.clear();
                Ok(row)
            }
        }
    }

    /// Check that the document ended cleanly.
    pub fn finish(&self, table: &TableDescriptor) -> Result<()> {
        if !self.seen_root {
            return Err(CodecError::structure(&table.id, "document has no table element"));
        }
        if let Some(frame) = self.frames.last() {
            return Err(CodecError::structure(
                &table.id,
                format!("document ended inside {}", frame.name()),
            ));
        }
        Ok(())
    }

    fn open(
        &mut self,
        table: &mut TableDescriptor,
        tag: Tag,
        attributes: &[(String, String)],
    ) -> Result<()> {
        let parent = self.frames.last().map(Frame::name);
        match (tag, parent) {
            (Tag::Table, None) if !self.seen_root => {
                self.seen_root = true;
                self.frames.push(Frame::Table);
            }
            (tag, None) => {
                return Err(CodecError::structure(
                    &table.id,
                    format!("expected a single table root element, found {:?}", tag),
                ))
            }
            (Tag::Row, Some("table")) => {
                let index = table.next_row_index();
                self.row = Some(OpenRow {
                    index,
                    cells: Row::all_absent(table, index).cells,
                });
                self.frames.push(Frame::Row);
            }
            (Tag::Column(k), Some("row")) => self.open_column(table, k, attributes)?,
            (Tag::Array(k), Some("column" | "array element")) => {
                self.open_array(table, k, attributes)?
            }
            (Tag::Other(_), Some(_)) => self.frames.push(Frame::Other),
            (tag, Some(parent)) => {
                return Err(CodecError::structure(
                    &table.id,
                    format!("unexpected {:?} inside {}", tag, parent),
                ))
            }
        }
        Ok(())
    }

    fn open_column(
        &mut self,
        table: &TableDescriptor,
        k: usize,
        attributes: &[(String, String)],
    ) -> Result<()> {
        if k == 0 || k > table.column_count() {
            return Err(CodecError::structure(
                &table.id,
                format!("c{} does not name one of {} columns", k, table.column_count()),
            ));
        }
        if let Some(declared) = &self.declared {
            if !declared.contains(&k) {
                return Err(CodecError::structure(
                    &table.id,
                    format!("c{} is not declared by the table schema", k),
                ));
            }
        }
        let row_index = self.row.as_ref().map(|r| r.index).unwrap_or_default();
        let position = k - 1;
        let column = &table.columns[position];
        let id = cell_id(&column.id, row_index);

        let lob = match LobReference::from_attributes(attributes, self.lobs.profile()) {
            Some(reference) if !column.ty.is_array() => {
                Some(self.resolve_lob(column, &column.ty, &reference, &id))
            }
            _ => None,
        };

        self.column = Some(OpenColumn {
            position,
            cell_id: id,
            lob,
            nested: NestedCell::new(),
        });
        self.frames.push(Frame::Column);
        Ok(())
    }

    fn open_array(
        &mut self,
        table: &TableDescriptor,
        k: u32,
        attributes: &[(String, String)],
    ) -> Result<()> {
        let Some(open) = &self.column else {
            return Err(CodecError::structure(&table.id, "array element outside a column"));
        };
        let column = &table.columns[open.position];
        let Type::Array {
            element,
            dimensions,
        } = &column.ty
        else {
            return Err(CodecError::structure(
                &table.id,
                format!("a{} inside non-array column c{}", k, open.position + 1),
            ));
        };
        if k == 0 {
            return Err(CodecError::structure(&table.id, "array positions start at a1"));
        }

        let mut coordinates = self.array_coordinates();
        coordinates.push(k);
        if coordinates.len() > (*dimensions).max(1) as usize {
            return Err(CodecError::structure(
                &table.id,
                format!(
                    "array in c{} nested deeper than its {} declared dimensions",
                    open.position + 1,
                    dimensions
                ),
            ));
        }

        let lob = LobReference::from_attributes(attributes, self.lobs.profile()).map(|reference| {
            let id = element_id(&open.cell_id, &coordinates);
            self.resolve_lob(column, element, &reference, &id)
        });

        if let Some(Frame::Array { has_children, .. }) = self.frames.last_mut() {
            *has_children = true;
        }
        self.frames.push(Frame::Array {
            index: k,
            has_children: false,
            lob,
        });
        Ok(())
    }

    fn close(&mut self, table: &mut TableDescriptor) -> Result<Option<Row>> {
        let Some(frame) = self.frames.pop() else {
            return Err(CodecError::structure(&table.id, "closing element without an open one"));
        };
        match frame {
            Frame::Table | Frame::Other => {}
            Frame::Array {
                index,
                has_children,
                lob,
            } => {
                if !has_children {
                    self.close_array_element(table, index, lob);
                }
            }
            Frame::Column => self.close_column(table),
            Frame::Row => {
                if let Some(OpenRow { index, cells }) = self.row.take() {
                    return Ok(Some(Row::new(index, cells)));
                }
            }
        }
        Ok(None)
    }

    fn close_array_element(&mut self, table: &TableDescriptor, index: u32, lob: Option<CellValue>) {
        let mut coordinates = self.array_coordinates();
        coordinates.push(index);

        let Some(open) = &self.column else {
            return;
        };
        if !open.nested.accepts(&coordinates) {
            debug!(
                "{}: skipping array element at {:?}, other elements have {:?} dimensions",
                open.cell_id,
                coordinates,
                open.nested.dimensions()
            );
            return;
        }
        let id = element_id(&open.cell_id, &coordinates);
        let element = table.columns[open.position].ty.element();
        let value = match lob {
            Some(value) => value,
            None => self.element_value(element, &id),
        };
        if let Some(open) = self.column.as_mut() {
            open.nested.insert(coordinates, Cell::new(id, value));
        }
    }

    fn close_column(&mut self, table: &TableDescriptor) {
        let Some(open) = self.column.take() else {
            return;
        };
        let ty = &table.columns[open.position].ty;
        let cell = if ty.is_array() {
            Cell::nested(open.cell_id, open.nested)
        } else {
            let value = match open.lob {
                Some(value) => value,
                None => self.column_value(ty, &open.cell_id),
            };
            Cell::new(open.cell_id, value)
        };
        if let Some(row) = self.row.as_mut() {
            row.cells[open.position] = cell;
        }
    }

    /// Positions of the enclosing array elements, outermost first.
    fn array_coordinates(&self) -> Vec<u32> {
        self.frames
            .iter()
            .filter_map(|f| match f {
                Frame::Array { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    fn column_value(&self, ty: &Type, id: &str) -> CellValue {
        match ty {
            Type::String { .. } => CellValue::Scalar(decode_text(&self.text)),
            Type::Binary { .. } => self.inline_binary(id),
            Type::Structure { name, .. } => {
                self.reporter.report(Anomaly::not_yet_supported(
                    format!("structured type {}", name),
                    id,
                ));
                CellValue::Absent
            }
            Type::NumericExact { .. }
            | Type::NumericApproximate { .. }
            | Type::Boolean
            | Type::DateTime { .. }
            | Type::Unsupported { .. } => CellValue::Scalar(self.text.clone()),
            Type::Array { .. } => CellValue::Absent,
        }
    }

    fn element_value(&self, element: &Type, id: &str) -> CellValue {
        match element {
            Type::String { .. } => CellValue::Scalar(decode_text(&self.text)),
            Type::Binary { .. } => self.inline_binary(id),
            Type::Array { .. } | Type::Structure { .. } => {
                self.reporter
                    .report(Anomaly::not_yet_supported("nested array element type", id));
                CellValue::Absent
            }
            Type::NumericExact { .. }
            | Type::NumericApproximate { .. }
            | Type::Boolean
            | Type::DateTime { .. }
            | Type::Unsupported { .. } => {
                if self.text.trim().is_empty() {
                    CellValue::Absent
                } else {
                    CellValue::Scalar(self.text.clone())
                }
            }
        }
    }

    /// Short binary values are stored inline as hex.
    fn inline_binary(&self, id: &str) -> CellValue {
        let hex_text = self.text.trim();
        if hex_text.is_empty() {
            return CellValue::LargeObject(LargeObject::inline(Vec::new()));
        }
        match hex::decode(hex_text) {
            Ok(bytes) => CellValue::LargeObject(LargeObject::inline(bytes)),
            Err(e) => {
                self.reporter
                    .report(Anomaly::cell_used_null(id, format!("invalid hex: {}", e)));
                CellValue::Absent
            }
        }
    }

    fn resolve_lob(
        &self,
        column: &ColumnDescriptor,
        ty: &Type,
        reference: &LobReference,
        id: &str,
    ) -> CellValue {
        match self.lobs.resolve(column, ty, reference, id) {
            Ok(resolved) => {
                if resolved.via_fallback {
                    self.reporter.report(Anomaly::value_changed(
                        id,
                        resolved.expected,
                        resolved.path,
                        "large object found only at the fallback location",
                    ));
                }
                resolved.value
            }
            Err(e) => {
                self.reporter.report(Anomaly::cell_used_null(id, e.to_string()));
                CellValue::Absent
            }
        }
    }
}

/// Decode a whole content document, passing each row to `sink` as soon as
/// it is complete. Returns the number of rows delivered.
pub fn decode_content(
    input: &mut dyn BufRead,
    table: &mut TableDescriptor,
    decoder: &mut ContentDecoder<'_>,
    sink: &mut dyn RowSink,
) -> Result<u64> {
    let as_structure = |table_id: &str, e: CodecError| match e {
        CodecError::Xml(xml) => CodecError::structure(table_id, xml.to_string()),
        other => other,
    };

    let mut events = EventReader::new(input)?;
    let mut delivered = 0;
    loop {
        let event = match events.next_event() {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(e) => return Err(as_structure(&table.id, e)),
        };
        if let Some(row) = decoder.handle(table, event)? {
            sink.handle_row(table, row)?;
            delivered += 1;
        }
    }
    decoder.finish(table)?;
    info!("{}: decoded {} rows", table.id, delivered);
    Ok(delivered)
}
