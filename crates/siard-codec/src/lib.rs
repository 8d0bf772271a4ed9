//! # siard-codec
//!
//! Row materialization for database archival.
//!
//! Turns table content into a typed, streaming sequence of [`Row`]s from two
//! directions:
//!
//! - **Archive decoding** of the per-table XML documents in an archive
//!   (zip or extracted folder), including externalized large objects
//! - **Live extraction** through a forward-only database cursor, with a
//!   shrinking fetch-size ladder when the driver runs short of memory
//!
//! Both directions produce the same cell model and identifiers, report
//! recovered problems through a [`Reporter`], and hand rows one at a time to
//! a [`RowSink`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use siard_codec::{Archive, ArchiveReader, Catalog, Config, JsonLinesSink, TracingReporter};
//!
//! fn main() -> siard_codec::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let catalog = Catalog::load(&config.catalog)?;
//!     let archive = Archive::open(config.require_archive("decode")?)?;
//!     let reporter = TracingReporter::new();
//!     let reader = ArchiveReader::new(archive, &catalog, &reporter);
//!     let summary = reader.decode_all(&catalog, &mut JsonLinesSink::new(std::io::stdout()))?;
//!     println!("Decoded {} rows", summary.rows_delivered);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod sink;
pub mod source;

// Re-exports for convenient access
pub use archive::Archive;
pub use config::{ArchiveConfig, ArchiveProfile, Config, FetchConfig, SourceConfig};
pub use core::{Catalog, Cell, CellValue, LargeObject, Row, TableDescriptor, Type};
pub use error::{CodecError, Result};
pub use pipeline::{ArchiveReader, Extractor, FailedTable, RunSummary};
pub use report::{Anomaly, CollectingReporter, Reporter, TracingReporter};
pub use sink::{CountingSink, JsonLinesSink, RowSink};
pub use source::{Connection, Cursor, CursorMaterializer, FetchLadder, PgConnection};
