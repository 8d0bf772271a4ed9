//! Reporting of non-fatal anomalies.
//!
//! Materializers never print. Everything they recover from (a cell that fell
//! back to NULL, a malformed row, a large object that could not be found, a
//! construct that is not supported yet) goes through a [`Reporter`].

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::warn;

/// A recovered problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// A cell could not be decoded and was stored as NULL.
    CellUsedNull { cell_id: String, reason: String },

    /// A whole row was replaced by NULLs.
    RowUsedNull {
        table_id: String,
        row_index: u64,
        reason: String,
    },

    /// A value was rewritten while decoding.
    ValueChanged {
        location: String,
        original: String,
        new: String,
        reason: String,
    },

    /// A construct the codec does not handle yet.
    NotYetSupported { feature: String, location: String },

    /// Something was skipped on purpose.
    Ignored { what: String, reason: String },

    /// An operation failed without stopping the run.
    Failed { what: String, reason: String },

    Custom { message: String },
}

impl Anomaly {
    pub fn cell_used_null(cell_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Anomaly::CellUsedNull {
            cell_id: cell_id.into(),
            reason: reason.into(),
        }
    }

    pub fn row_used_null(
        table_id: impl Into<String>,
        row_index: u64,
        reason: impl Into<String>,
    ) -> Self {
        Anomaly::RowUsedNull {
            table_id: table_id.into(),
            row_index,
            reason: reason.into(),
        }
    }

    pub fn value_changed(
        location: impl Into<String>,
        original: impl Into<String>,
        new: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Anomaly::ValueChanged {
            location: location.into(),
            original: original.into(),
            new: new.into(),
            reason: reason.into(),
        }
    }

    pub fn not_yet_supported(feature: impl Into<String>, location: impl Into<String>) -> Self {
        Anomaly::NotYetSupported {
            feature: feature.into(),
            location: location.into(),
        }
    }

    pub fn ignored(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Anomaly::Ignored {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Anomaly::Failed {
            what: what.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Anomaly::CellUsedNull { cell_id, reason } => {
                write!(f, "cell {} stored as NULL: {}", cell_id, reason)
            }
            Anomaly::RowUsedNull {
                table_id,
                row_index,
                reason,
            } => write!(
                f,
                "row {} of {} stored as NULL: {}",
                row_index, table_id, reason
            ),
            Anomaly::ValueChanged {
                location,
                original,
                new,
                reason,
            } => write!(
                f,
                "value at {} changed from {:?} to {:?}: {}",
                location, original, new, reason
            ),
            Anomaly::NotYetSupported { feature, location } => {
                write!(f, "{} not yet supported at {}", feature, location)
            }
            Anomaly::Ignored { what, reason } => write!(f, "ignored {}: {}", what, reason),
            Anomaly::Failed { what, reason } => write!(f, "{} failed: {}", what, reason),
            Anomaly::Custom { message } => write!(f, "{}", message),
        }
    }
}

/// Sink for anomalies. Shared by reference across one run.
pub trait Reporter: Send + Sync {
    fn report(&self, anomaly: Anomaly);

    /// Number of anomalies received so far.
    fn count(&self) -> usize;
}

/// Logs every anomaly at `warn` and counts them.
#[derive(Debug, Default)]
pub struct TracingReporter {
    count: AtomicUsize,
}

impl TracingReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for TracingReporter {
    fn report(&self, anomaly: Anomaly) {
        self.count.fetch_add(1, Ordering::Relaxed);
        warn!("{}", anomaly);
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}

/// Keeps every anomaly for later inspection, and logs it like
/// [`TracingReporter`].
#[derive(Debug, Default)]
pub struct CollectingReporter {
    anomalies: Mutex<Vec<Anomaly>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn anomalies(&self) -> Vec<Anomaly> {
        self.anomalies
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }
}

impl Reporter for CollectingReporter {
    fn report(&self, anomaly: Anomaly) {
        warn!("{}", anomaly);
        if let Ok(mut anomalies) = self.anomalies.lock() {
            anomalies.push(anomaly);
        }
    }

    fn count(&self) -> usize {
        self.anomalies.lock().map(|a| a.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter_keeps_order() {
        let reporter = CollectingReporter::new();
        reporter.report(Anomaly::cell_used_null("t.a.1", "bad number"));
        reporter.report(Anomaly::not_yet_supported("structured type", "t.b.1"));
        assert_eq!(reporter.count(), 2);
        assert_eq!(
            reporter.anomalies()[0],
            Anomaly::cell_used_null("t.a.1", "bad number")
        );
    }

    #[test]
    fn test_tracing_reporter_counts() {
        let reporter = TracingReporter::new();
        reporter.report(Anomaly::failed("lob", "missing"));
        assert_eq!(reporter.count(), 1);
    }

    #[test]
    fn test_anomaly_serializes_with_kind_tag() {
        let json = serde_json::to_string(&Anomaly::row_used_null("s.t", 3, "shape")).unwrap();
        assert!(json.contains("\"kind\":\"row_used_null\""));
        assert!(json.contains("\"row_index\":3"));
    }
}
