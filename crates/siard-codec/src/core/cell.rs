//! Cell values and identity keys.
//!
//! Every cell is addressed by a dotted key: `<table>.<column>.<rowIndex>` for a
//! top-level value, followed by `.<pos>` per array dimension for a nested
//! element (positions are 1-based).

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Cursor as IoCursor, Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::archive::container::SharedZip;
use crate::error::{CodecError, Result};

/// 1-based position of an array element, outermost dimension first.
pub type Coordinates = Vec<u32>;

/// Key of a top-level cell.
pub fn cell_id(column_id: &str, row_index: u64) -> String {
    format!("{}.{}", column_id, row_index)
}

/// Key of a nested array element under `parent_id`.
pub fn element_id(parent_id: &str, coordinates: &[u32]) -> String {
    let mut id = String::from(parent_id);
    for pos in coordinates {
        id.push('.');
        id.push_str(&pos.to_string());
    }
    id
}

/// One value of a row, tagged with its identity key.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub id: String,
    pub value: CellValue,
}

/// The closed set of value containers.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Logical NULL.
    Absent,
    /// Canonical text form of a non-binary, non-array value.
    Scalar(String),
    /// Binary data behind a lazily opened stream.
    LargeObject(LargeObject),
    /// One array value.
    Nested(NestedCell),
}

impl Cell {
    pub fn new(id: impl Into<String>, value: CellValue) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }

    pub fn absent(id: impl Into<String>) -> Self {
        Self::new(id, CellValue::Absent)
    }

    pub fn scalar(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, CellValue::Scalar(text.into()))
    }

    /// Wrap a nested cell, collapsing an empty one to `Absent`.
    pub fn nested(id: impl Into<String>, nested: NestedCell) -> Self {
        if nested.is_empty() {
            Self::absent(id)
        } else {
            Self::new(id, CellValue::Nested(nested))
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.value, CellValue::Absent)
    }

    /// Scalar text, if this is a scalar cell.
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            CellValue::Scalar(text) => Some(text),
            _ => None,
        }
    }
}

/// Array elements ordered by coordinate vector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NestedCell {
    elements: BTreeMap<Coordinates, Cell>,
}

impl NestedCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, coordinates: Coordinates, cell: Cell) {
        self.elements.insert(coordinates, cell);
    }

    pub fn get(&self, coordinates: &[u32]) -> Option<&Cell> {
        self.elements.get(coordinates)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Coordinates, &Cell)> {
        self.elements.iter()
    }

    /// Common coordinate length: `Some(0)` when empty, `None` when elements
    /// disagree.
    pub fn dimensions(&self) -> Option<usize> {
        let mut lengths = self.elements.keys().map(Vec::len);
        let first = match lengths.next() {
            Some(n) => n,
            None => return Some(0),
        };
        if lengths.all(|n| n == first) {
            Some(first)
        } else {
            None
        }
    }

    /// Whether an element at `coordinates` keeps the array coherent.
    pub fn accepts(&self, coordinates: &[u32]) -> bool {
        self.is_empty() || self.dimensions() == Some(coordinates.len())
    }
}

/// Out-of-band facts about a large object, readable without opening it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LobMetadata {
    /// Declared size in bytes.
    pub length: Option<u64>,
    /// Declared digest, usually hex.
    pub digest: Option<String>,
    /// Digest algorithm name (`MD5`, `SHA-1`, `SHA-256`).
    pub digest_type: Option<String>,
    /// Path the value was resolved from.
    pub path: Option<String>,
}

impl LobMetadata {
    pub fn is_empty(&self) -> bool {
        self.length.is_none()
            && self.digest.is_none()
            && self.digest_type.is_none()
            && self.path.is_none()
    }
}

/// Where the bytes of a large object come from.
#[derive(Debug, Clone, PartialEq)]
pub enum LobSource {
    /// Bytes already in memory (hex-decoded inline values, driver blobs).
    Inline(Vec<u8>),
    /// A file on the local filesystem.
    File(PathBuf),
    /// An entry inside a zip container.
    ZipEntry { archive: SharedZip, name: String },
    /// Metadata only; the stream is intentionally unavailable.
    Detached,
}

/// Binary value behind a stream that is opened only on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct LargeObject {
    pub source: LobSource,
    pub metadata: LobMetadata,
}

impl LargeObject {
    pub fn inline(bytes: Vec<u8>) -> Self {
        Self {
            source: LobSource::Inline(bytes),
            metadata: LobMetadata::default(),
        }
    }

    pub fn detached(metadata: LobMetadata) -> Self {
        Self {
            source: LobSource::Detached,
            metadata,
        }
    }

    pub fn with_metadata(mut self, metadata: LobMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_detached(&self) -> bool {
        matches!(self.source, LobSource::Detached)
    }

    /// Size in bytes if it is known without opening the stream.
    pub fn known_length(&self) -> Option<u64> {
        match &self.source {
            LobSource::Inline(bytes) => Some(bytes.len() as u64),
            _ => self.metadata.length,
        }
    }

    /// Open the underlying stream. Each call returns an independent reader
    /// that releases its handle when dropped.
    pub fn open(&self) -> Result<Box<dyn Read + Send>> {
        match &self.source {
            LobSource::Inline(bytes) => Ok(Box::new(IoCursor::new(bytes.clone()))),
            LobSource::File(path) => Ok(Box::new(File::open(path)?)),
            LobSource::ZipEntry { archive, name } => {
                let spool = archive.with_entry(name, |entry| {
                    let mut spool = tempfile::tempfile()?;
                    io::copy(entry, &mut spool)?;
                    spool.seek(SeekFrom::Start(0))?;
                    Ok(spool)
                })?;
                Ok(Box::new(spool))
            }
            LobSource::Detached => Err(CodecError::lob(
                self.metadata.path.clone().unwrap_or_default(),
                "large object content was not retained",
            )),
        }
    }
}
