//! Archive content decoding.
//!
//! An archive is a zip file or an extracted folder holding one XML document
//! per table under `content/`, optional `.xsd` companions and externalized
//! large objects. [`Archive::decode_table`] streams one table into a
//! [`RowSink`].

pub mod container;
pub mod decoder;
pub mod events;
pub mod lob;
pub mod paths;
pub mod schema;
pub mod text;

pub use container::Container;
pub use decoder::{decode_content, ContentDecoder};
pub use events::{EventReader, Tag, XmlEvent};
pub use lob::{LobReference, LobResolver, ResolvedLob};

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::config::ArchiveConfig;
use crate::core::TableDescriptor;
use crate::error::{CodecError, Result};
use crate::report::{Anomaly, Reporter};
use crate::sink::RowSink;

/// An opened archive plus its optional auxiliary container.
#[derive(Debug)]
pub struct Archive {
    container: Container,
    auxiliary: Option<Container>,
    config: ArchiveConfig,
}

impl Archive {
    pub fn open(config: &ArchiveConfig) -> Result<Self> {
        let container = Container::open(&config.path)?;
        let auxiliary = config
            .auxiliary
            .as_deref()
            .map(Container::open)
            .transpose()?;
        info!(
            "Opened archive {} (profile {:?})",
            config.path.display(),
            config.profile
        );
        Ok(Self {
            container,
            auxiliary,
            config: config.clone(),
        })
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    /// Large-object resolver for this archive.
    pub fn lob_resolver(&self, lobs_root: &str) -> LobResolver<'_> {
        LobResolver::new(&self.container, lobs_root)
            .with_auxiliary(self.auxiliary.as_ref())
            .with_profile(self.config.profile)
            .ignore_lobs(self.config.ignore_lobs)
    }

    /// Column numbers declared by the table's `.xsd`, or `None` when the
    /// schema is missing (reported) or checking is disabled.
    pub fn declared_columns(
        &self,
        table: &TableDescriptor,
        reporter: &dyn Reporter,
    ) -> Result<Option<BTreeSet<usize>>> {
        if !self.config.check_schema {
            return Ok(None);
        }
        let xsd = paths::table_schema_path(table)?;
        if !self.container.has_entry(&xsd) {
            reporter.report(Anomaly::ignored(&xsd, "table schema not found, content not checked"));
            return Ok(None);
        }
        let declared = self
            .container
            .with_entry(&xsd, schema::declared_columns)
            .map_err(|e| CodecError::structure(&table.id, format!("unreadable {}: {}", xsd, e)))?;
        debug!("{}: schema declares {} columns", table.id, declared.len());
        Ok(Some(declared))
    }

    /// Decode `table` into `sink`; returns the number of rows delivered.
    ///
    /// Any error leaves the rows already delivered in place and ends this
    /// table only.
    pub fn decode_table(
        &self,
        table: &mut TableDescriptor,
        lobs_root: &str,
        reporter: &dyn Reporter,
        sink: &mut dyn RowSink,
    ) -> Result<u64> {
        let content = paths::table_content_path(table)?;
        if !self.container.has_entry(&content) {
            return Err(CodecError::structure(
                &table.id,
                format!("{} not found in archive", content),
            ));
        }
        info!("{}: decoding {}", table.id, content);

        let declared = self.declared_columns(table, reporter)?;
        let resolver = self.lob_resolver(lobs_root);
        let mut decoder = ContentDecoder::new(&resolver, reporter);
        if let Some(declared) = declared {
            decoder = decoder.with_declared_columns(declared);
        }

        sink.open_table(table)?;
        let decoded = self.container.with_entry(&content, |input| {
            decode_content(input, &mut *table, &mut decoder, &mut *sink)
        });
        let closed = sink.close_table(table);
        finish_table(&table.id, decoded, closed, reporter)
    }
}

/// Combine the outcome of a table with that of closing it. The table's own
/// error wins; a close failure behind it is reported instead of lost.
pub(crate) fn finish_table(
    table_id: &str,
    outcome: Result<u64>,
    closed: Result<()>,
    reporter: &dyn Reporter,
) -> Result<u64> {
    match (outcome, closed) {
        (Ok(delivered), closed) => closed.map(|()| delivered),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close)) => {
            reporter.report(Anomaly::failed(
                format!("closing {}", table_id),
                close.to_string(),
            ));
            Err(e)
        }
    }
}
