//! SQLSTATE classification.
//!
//! Classes are looked up by the two-character SQLSTATE prefix in a static
//! table, outside the row decoding path. Only the connection class changes
//! behavior (it triggers a reconnect before the next fetch-size attempt);
//! the rest is used for log messages.

/// Coarse grouping of driver failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The connection is gone or unusable.
    Connection,
    /// The server ran out of memory, disk or another resource.
    Resource,
    /// A value could not be converted.
    DataException,
    /// The generated statement was rejected.
    Syntax,
    /// The transaction was rolled back or aborted.
    Transaction,
    Other,
}

const SQLSTATE_CLASSES: &[(&str, ErrorClass)] = &[
    ("08", ErrorClass::Connection),
    ("57", ErrorClass::Connection),
    ("53", ErrorClass::Resource),
    ("54", ErrorClass::Resource),
    ("58", ErrorClass::Resource),
    ("22", ErrorClass::DataException),
    ("42", ErrorClass::Syntax),
    ("25", ErrorClass::Transaction),
    ("40", ErrorClass::Transaction),
];

/// Classify a five-character SQLSTATE code.
pub fn classify(code: &str) -> ErrorClass {
    let class = code.get(..2).unwrap_or("");
    SQLSTATE_CLASSES
        .iter()
        .find(|(prefix, _)| *prefix == class)
        .map(|(_, c)| *c)
        .unwrap_or(ErrorClass::Other)
}
