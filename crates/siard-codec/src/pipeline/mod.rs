//! Run drivers: decode every catalog table from an archive, or extract every
//! catalog table from a live database, one table at a time.
//!
//! A failing table is recorded and the run moves on to the next one. Only
//! connectivity loss and cancellation abort the run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::archive::{finish_table, Archive};
use crate::core::{Catalog, Row, TableDescriptor};
use crate::error::{CodecError, Result};
use crate::report::{Anomaly, Reporter};
use crate::sink::RowSink;
use crate::source::{Connection, CursorMaterializer, FetchLadder};

/// A table that did not complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTable {
    pub table: String,
    pub error: String,
}

/// Result of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Unique run identifier.
    pub run_id: String,

    /// `completed`, `failed` or `cancelled`.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    /// Tables attempted.
    pub tables_total: usize,

    /// Tables read to the end.
    pub tables_success: usize,

    pub tables_failed: usize,

    /// Rows handed to the sink, across all tables.
    pub rows_delivered: u64,

    /// Average throughput (rows/second).
    pub rows_per_second: u64,

    pub failed_tables: Vec<FailedTable>,

    /// Anomalies reported during the run.
    pub anomalies: usize,

    /// SHA256 of the configuration used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_hash: Option<String>,
}

impl RunSummary {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// `Err(TablesFailed)` when any table failed.
    pub fn check(&self) -> Result<()> {
        if self.tables_failed > 0 {
            return Err(CodecError::TablesFailed {
                failed: self.tables_failed,
                total: self.tables_total,
            });
        }
        Ok(())
    }
}

/// Per-table bookkeeping shared by both run drivers.
struct RunTracker<'r> {
    run_id: String,
    started_at: DateTime<Utc>,
    reporter: &'r dyn Reporter,
    anomalies_before: usize,
    tables_total: usize,
    tables_success: usize,
    rows_delivered: u64,
    failed_tables: Vec<FailedTable>,
    cancelled: bool,
}

impl<'r> RunTracker<'r> {
    fn start(kind: &str, tables: usize, reporter: &'r dyn Reporter) -> Self {
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting {} run {} over {} tables", kind, run_id, tables);
        Self {
            run_id,
            started_at: Utc::now(),
            reporter,
            anomalies_before: reporter.count(),
            tables_total: 0,
            tables_success: 0,
            rows_delivered: 0,
            failed_tables: Vec::new(),
            cancelled: false,
        }
    }

    /// Record one table's outcome; run-fatal errors are handed back.
    fn record(&mut self, table: &TableDescriptor, outcome: Result<u64>) -> Result<()> {
        self.tables_total += 1;
        match outcome {
            Ok(rows) => {
                self.tables_success += 1;
                self.rows_delivered += rows;
                if let Some(expected) = table.rows.filter(|&expected| rows < expected) {
                    self.reporter.report(Anomaly::Custom {
                        message: format!(
                            "{}: {} rows delivered, catalog declares {}",
                            table.id, rows, expected
                        ),
                    });
                }
                info!("{}: {} rows", table.id, rows);
                Ok(())
            }
            Err(CodecError::Cancelled) => {
                self.cancelled = true;
                self.failed_tables.push(FailedTable {
                    table: table.id.clone(),
                    error: CodecError::Cancelled.to_string(),
                });
                Ok(())
            }
            Err(e) if e.is_fatal_for_run() => Err(e),
            Err(e) => {
                error!("{}: {}", table.id, e);
                self.failed_tables.push(FailedTable {
                    table: table.id.clone(),
                    error: e.to_string(),
                });
                Ok(())
            }
        }
    }

    fn finish(self) -> RunSummary {
        let completed_at = Utc::now();
        let duration = (completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        let rows_per_second = if duration > 0.0 {
            (self.rows_delivered as f64 / duration) as u64
        } else {
            0
        };
        let tables_failed = self.failed_tables.len();
        let status = if self.cancelled {
            "cancelled"
        } else if tables_failed > 0 {
            "failed"
        } else {
            "completed"
        };

        let summary = RunSummary {
            run_id: self.run_id,
            status: status.to_string(),
            duration_seconds: duration,
            started_at: self.started_at,
            completed_at,
            tables_total: self.tables_total,
            tables_success: self.tables_success,
            tables_failed,
            rows_delivered: self.rows_delivered,
            rows_per_second,
            failed_tables: self.failed_tables,
            anomalies: self.reporter.count().saturating_sub(self.anomalies_before),
            config_hash: None,
        };
        info!(
            "Run {}: {} tables, {} rows in {:.1}s ({} rows/s), {} anomalies",
            summary.status,
            summary.tables_total,
            summary.rows_delivered,
            summary.duration_seconds,
            summary.rows_per_second,
            summary.anomalies
        );
        summary
    }
}

/// Forwards rows to another sink until the cancel flag is raised.
struct CancellableSink<'s> {
    inner: &'s mut dyn RowSink,
    cancel: Option<&'s AtomicBool>,
}

impl CancellableSink<'_> {
    fn check(&self) -> Result<()> {
        match self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(CodecError::Cancelled),
            _ => Ok(()),
        }
    }
}

impl RowSink for CancellableSink<'_> {
    fn open_table(&mut self, table: &TableDescriptor) -> Result<()> {
        self.check()?;
        self.inner.open_table(table)
    }

    fn handle_row(&mut self, table: &TableDescriptor, row: Row) -> Result<()> {
        self.check()?;
        self.inner.handle_row(table, row)
    }

    fn close_table(&mut self, table: &TableDescriptor) -> Result<()> {
        self.inner.close_table(table)
    }
}

/// Decodes catalog tables out of an archive.
pub struct ArchiveReader<'r> {
    archive: Archive,
    lobs_root: String,
    reporter: &'r dyn Reporter,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'r> ArchiveReader<'r> {
    pub fn new(archive: Archive, catalog: &Catalog, reporter: &'r dyn Reporter) -> Self {
        Self {
            archive,
            lobs_root: catalog.lobs_root().to_string(),
            reporter,
            cancel: None,
        }
    }

    /// Stop between rows once `flag` is raised.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn decode_table(&self, table: &mut TableDescriptor, sink: &mut dyn RowSink) -> Result<u64> {
        let mut sink = CancellableSink {
            inner: sink,
            cancel: self.cancel.as_deref(),
        };
        self.archive
            .decode_table(table, &self.lobs_root, self.reporter, &mut sink)
    }

    /// Decode every table of `catalog` in order.
    pub fn decode_all(&self, catalog: &Catalog, sink: &mut dyn RowSink) -> Result<RunSummary> {
        self.decode_tables(catalog.tables(), sink)
    }

    /// Decode the given tables in order.
    pub fn decode_tables(
        &self,
        tables: Vec<TableDescriptor>,
        sink: &mut dyn RowSink,
    ) -> Result<RunSummary> {
        let mut tracker = RunTracker::start("decode", tables.len(), self.reporter);
        for mut table in tables {
            let outcome = self.decode_table(&mut table, sink);
            tracker.record(&table, outcome)?;
            if tracker.cancelled {
                warn!("Run cancelled, skipping remaining tables");
                break;
            }
        }
        Ok(tracker.finish())
    }
}

/// Extracts catalog tables from a live database connection.
pub struct Extractor<'r, C: Connection> {
    conn: C,
    materializer: CursorMaterializer<'r>,
    reporter: &'r dyn Reporter,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'r, C: Connection> Extractor<'r, C> {
    pub fn new(conn: C, ladder: FetchLadder, reporter: &'r dyn Reporter) -> Self {
        Self {
            conn,
            materializer: CursorMaterializer::new(ladder, reporter),
            reporter,
            cancel: None,
        }
    }

    /// Stop between rows once `flag` is raised.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn extract_table(&mut self, table: &mut TableDescriptor, sink: &mut dyn RowSink) -> Result<u64> {
        let mut sink = CancellableSink {
            inner: sink,
            cancel: self.cancel.as_deref(),
        };
        sink.open_table(table)?;
        let streamed = stream_rows(&self.materializer, &mut self.conn, table, &mut sink);
        let closed = sink.close_table(table);
        finish_table(&table.id, streamed, closed, self.reporter)
    }

    /// Extract every table of `catalog` in order.
    pub fn extract_all(&mut self, catalog: &Catalog, sink: &mut dyn RowSink) -> Result<RunSummary> {
        self.extract_tables(catalog.tables(), sink)
    }

    /// Extract the given tables in order.
    pub fn extract_tables(
        &mut self,
        tables: Vec<TableDescriptor>,
        sink: &mut dyn RowSink,
    ) -> Result<RunSummary> {
        let mut tracker = RunTracker::start("extract", tables.len(), self.reporter);
        for mut table in tables {
            let outcome = self.extract_table(&mut table, sink);
            tracker.record(&table, outcome)?;
            if tracker.cancelled {
                warn!("Run cancelled, skipping remaining tables");
                break;
            }
        }
        Ok(tracker.finish())
    }
}

fn stream_rows<C: Connection>(
    materializer: &CursorMaterializer<'_>,
    conn: &mut C,
    table: &mut TableDescriptor,
    sink: &mut dyn RowSink,
) -> Result<u64> {
    let mut rows = materializer.read_table(conn, table)?;
    let mut delivered = 0;
    while let Some(row) = rows.next() {
        sink.handle_row(rows.table(), row?)?;
        delivered += 1;
    }
    Ok(delivered)
}
