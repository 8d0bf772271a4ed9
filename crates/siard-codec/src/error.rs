//! Error types for the codec library.

use thiserror::Error;

/// Main error type for codec operations.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Driver-level failure not tied to a specific database client
    #[error("Driver error: {message}")]
    Driver {
        message: String,
        /// The driver reported the connection itself is gone.
        connection_lost: bool,
    },

    /// Could not establish or re-establish the database connection
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Every fetch size on the ladder failed for a table
    #[error("Fetch failed for table {table} after {attempts} attempts: {message}")]
    FetchExhausted {
        table: String,
        attempts: usize,
        message: String,
    },

    /// Malformed or schema-invalid table content
    #[error("Invalid content for table {table}: {message}")]
    Structure { table: String, message: String },

    /// Large object could not be resolved or opened
    #[error("Large object error for {cell}: {message}")]
    Lob { cell: String, message: String },

    /// A downstream row sink rejected a row
    #[error("Sink error for table {table}: {message}")]
    Sink { table: String, message: String },

    /// One or more tables failed during a run
    #[error("{failed} of {total} tables failed")]
    TablesFailed { failed: usize, total: usize },

    /// Table referenced on the command line or in the catalog does not exist
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// XML parse error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Zip container error
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Run cancelled")]
    Cancelled,
}

impl CodecError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl Into<String>, context: impl Into<String>) -> Self {
        CodecError::Connection {
            message: message.into(),
            context: context.into(),
        }
    }

    /// Create a Driver error for a live connection
    pub fn driver(message: impl Into<String>) -> Self {
        CodecError::Driver {
            message: message.into(),
            connection_lost: false,
        }
    }

    /// Create a Driver error flagging a dropped connection
    pub fn connection_lost(message: impl Into<String>) -> Self {
        CodecError::Driver {
            message: message.into(),
            connection_lost: true,
        }
    }

    /// Create a Structure error
    pub fn structure(table: impl Into<String>, message: impl Into<String>) -> Self {
        CodecError::Structure {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Lob error
    pub fn lob(cell: impl Into<String>, message: impl Into<String>) -> Self {
        CodecError::Lob {
            cell: cell.into(),
            message: message.into(),
        }
    }

    /// Create a Sink error
    pub fn sink(table: impl Into<String>, message: impl Into<String>) -> Self {
        CodecError::Sink {
            table: table.into(),
            message: message.into(),
        }
    }

    /// True when the failure means the connection must be re-established.
    pub fn is_connection_lost(&self) -> bool {
        match self {
            CodecError::Driver {
                connection_lost, ..
            } => *connection_lost,
            CodecError::Database(e) => e.is_closed(),
            CodecError::Connection { .. } => true,
            _ => false,
        }
    }

    /// True when the failure ends the whole run rather than one table.
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(self, CodecError::Connection { .. } | CodecError::Cancelled)
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            CodecError::Config(_)
            | CodecError::Yaml(_)
            | CodecError::Json(_)
            | CodecError::UnknownTable(_) => 1,
            CodecError::Database(_)
            | CodecError::Driver { .. }
            | CodecError::Connection { .. }
            | CodecError::FetchExhausted { .. } => 2,
            CodecError::TablesFailed { .. } | CodecError::Sink { .. } => 3,
            CodecError::Structure { .. }
            | CodecError::Lob { .. }
            | CodecError::Xml(_)
            | CodecError::Zip(_) => 4,
            CodecError::Io(_) => 7,
            CodecError::Cancelled => 130,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CodecError::Config("x".into()).exit_code(), 1);
        assert_eq!(CodecError::driver("x").exit_code(), 2);
        assert_eq!(CodecError::structure("s.t", "x").exit_code(), 4);
        assert_eq!(
            CodecError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "x")).exit_code(),
            7
        );
        assert_eq!(CodecError::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_connection_lost_flag() {
        assert!(CodecError::connection_lost("gone").is_connection_lost());
        assert!(!CodecError::driver("timeout").is_connection_lost());
        assert!(!CodecError::structure("s.t", "bad").is_connection_lost());
    }

    #[test]
    fn test_format_detailed_includes_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = CodecError::from(io);
        let text = err.format_detailed();
        assert!(text.starts_with("Error: IO error: disk full"));
    }
}
