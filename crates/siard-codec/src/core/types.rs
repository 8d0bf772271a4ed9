//! Column type descriptors.
//!
//! A [`Type`] is attached to a column (or a structure field), never to a cell.
//! Both materializers match on it exhaustively to pick a decode path, so adding
//! a variant forces every decode site to handle it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Temporal precision of a `DateTime` type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimePrecision {
    /// Calendar date without a time component.
    Date,
    /// Time of day without a date component.
    Time,
    /// Time of day with a UTC offset.
    TimeWithZone,
    /// Naive date and time.
    Timestamp,
    /// Date and time with a UTC offset, normalized to an instant.
    TimestampWithZone,
}

impl DateTimePrecision {
    /// Whether values carry a time-of-day component.
    pub fn has_time(&self) -> bool {
        !matches!(self, DateTimePrecision::Date)
    }

    /// Whether values carry a calendar date.
    pub fn has_date(&self) -> bool {
        !matches!(
            self,
            DateTimePrecision::Time | DateTimePrecision::TimeWithZone
        )
    }

    /// Whether values carry a UTC offset.
    pub fn has_zone(&self) -> bool {
        matches!(
            self,
            DateTimePrecision::TimeWithZone | DateTimePrecision::TimestampWithZone
        )
    }
}

/// A named, typed member of a structured type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: Type,
}

/// Closed set of column and attribute types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    /// Character data, including character large objects.
    String {
        #[serde(default)]
        length: Option<u64>,
        /// Stored as a character large object.
        #[serde(default)]
        large: bool,
    },

    /// Exact numerics (INTEGER, DECIMAL, NUMERIC, ...).
    NumericExact {
        #[serde(default)]
        precision: Option<u32>,
        #[serde(default)]
        scale: Option<u32>,
    },

    /// Approximate numerics (REAL, FLOAT, DOUBLE PRECISION).
    NumericApproximate {
        #[serde(default)]
        precision: Option<u32>,
    },

    Boolean,

    DateTime { precision: DateTimePrecision },

    /// Binary data, including binary large objects.
    Binary {
        /// The cursor only carries a placeholder; the true bytes live elsewhere.
        #[serde(default)]
        outside_database: bool,
        #[serde(default)]
        large: bool,
    },

    /// A vendor type with no mapping; decoded as text.
    Unsupported {
        #[serde(default)]
        vendor_name: String,
    },

    /// Array of `element` with `dimensions` levels of nesting.
    Array {
        element: Box<Type>,
        #[serde(default = "default_dimensions")]
        dimensions: u32,
    },

    /// Structured (user-defined) type.
    Structure {
        #[serde(default)]
        name: String,
        fields: Vec<Field>,
    },
}

fn default_dimensions() -> u32 {
    1
}

impl Type {
    /// Plain variable-length character type.
    pub fn string() -> Self {
        Type::String {
            length: None,
            large: false,
        }
    }

    /// Exact numeric without declared precision.
    pub fn numeric() -> Self {
        Type::NumericExact {
            precision: None,
            scale: None,
        }
    }

    pub fn date_time(precision: DateTimePrecision) -> Self {
        Type::DateTime { precision }
    }

    /// In-database binary type.
    pub fn binary() -> Self {
        Type::Binary {
            outside_database: false,
            large: false,
        }
    }

    pub fn array(element: Type, dimensions: u32) -> Self {
        Type::Array {
            element: Box::new(element),
            dimensions,
        }
    }

    /// True for every variant that is not an array or a structure.
    pub fn is_simple(&self) -> bool {
        !matches!(self, Type::Array { .. } | Type::Structure { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Type::Binary { .. })
    }

    /// Declared array dimensionality, 0 for non-array types.
    pub fn dimensions(&self) -> u32 {
        match self {
            Type::Array { dimensions, .. } => *dimensions,
            _ => 0,
        }
    }

    /// Element type of an array, or the type itself otherwise.
    pub fn element(&self) -> &Type {
        match self {
            Type::Array { element, .. } => element,
            other => other,
        }
    }

    /// Map an SQL:2008 type name onto a [`Type`].
    ///
    /// Accepts names as written in archive metadata, for example
    /// `DECIMAL(10,2)`, `TIME(3) WITH TIME ZONE` or `INTEGER ARRAY[4]`.
    /// Anything unrecognized becomes [`Type::Unsupported`].
    pub fn parse_sql(name: &str) -> Type {
        let upper = name.trim().to_uppercase();
        let (base, dimensions) = strip_array_suffix(&upper);
        let element = parse_simple(base, name.trim());
        if dimensions == 0 {
            element
        } else {
            Type::array(element, dimensions)
        }
    }
}

/// Peel `ARRAY` / `ARRAY[n]` suffixes, returning the element name and their count.
fn strip_array_suffix(name: &str) -> (&str, u32) {
    let mut rest = name.trim_end();
    let mut dimensions = 0;
    loop {
        let without_bound = match rest.strip_suffix(']') {
            Some(inner) => match inner.rfind('[') {
                Some(open) if inner[open + 1..].chars().all(|c| c.is_ascii_digit()) => {
                    inner[..open].trim_end()
                }
                _ => break,
            },
            None => rest,
        };
        match without_bound.strip_suffix("ARRAY") {
            Some(head) if head.ends_with(char::is_whitespace) => {
                rest = head.trim_end();
                dimensions += 1;
            }
            _ => break,
        }
    }
    (rest, dimensions)
}

fn parse_simple(upper: &str, original: &str) -> Type {
    let (base, args) = split_arguments(upper);
    let first = args.first().copied();
    let second = args.get(1).copied();

    match base.as_str() {
        "CHARACTER" | "CHAR" | "CHARACTER VARYING" | "CHAR VARYING" | "VARCHAR"
        | "NATIONAL CHARACTER" | "NCHAR" | "NATIONAL CHARACTER VARYING"
        | "NATIONAL CHAR VARYING" | "NCHAR VARYING" | "NVARCHAR" => Type::String {
            length: first,
            large: false,
        },
        "CHARACTER LARGE OBJECT" | "CLOB" | "NATIONAL CHARACTER LARGE OBJECT" | "NCLOB"
        | "XML" => Type::String {
            length: first,
            large: true,
        },
        "INTEGER" | "INT" | "SMALLINT" | "BIGINT" | "DECIMAL" | "DEC" | "NUMERIC" => {
            Type::NumericExact {
                precision: first.map(|p| p as u32),
                scale: second.map(|s| s as u32),
            }
        }
        "REAL" | "FLOAT" | "DOUBLE PRECISION" | "DOUBLE" => Type::NumericApproximate {
            precision: first.map(|p| p as u32),
        },
        "BOOLEAN" => Type::Boolean,
        "DATE" => Type::date_time(DateTimePrecision::Date),
        "TIME" | "TIME WITHOUT TIME ZONE" => Type::date_time(DateTimePrecision::Time),
        "TIME WITH TIME ZONE" => Type::date_time(DateTimePrecision::TimeWithZone),
        "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => {
            Type::date_time(DateTimePrecision::Timestamp)
        }
        "TIMESTAMP WITH TIME ZONE" => Type::date_time(DateTimePrecision::TimestampWithZone),
        "BINARY" | "BINARY VARYING" | "VARBINARY" => Type::binary(),
        "BINARY LARGE OBJECT" | "BLOB" => Type::Binary {
            outside_database: false,
            large: true,
        },
        _ => Type::Unsupported {
            vendor_name: original.to_string(),
        },
    }
}

/// Remove every parenthesized group, returning the collapsed name and the
/// numeric arguments of the first group.
fn split_arguments(name: &str) -> (String, Vec<u64>) {
    let mut base = String::with_capacity(name.len());
    let mut args = Vec::new();
    let mut depth = 0;
    let mut current = String::new();
    let mut first_group_done = false;

    for c in name.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => {
                depth -= 1;
                if depth == 0 && !first_group_done {
                    args = current
                        .split(',')
                        .filter_map(|a| a.trim().parse::<u64>().ok())
                        .collect();
                    first_group_done = true;
                }
                current.clear();
            }
            _ if depth > 0 => current.push(c),
            _ => base.push(c),
        }
    }

    let base = base.split_whitespace().collect::<Vec<_>>().join(" ");
    (base, args)
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::String { large: true, .. } => write!(f, "CHARACTER LARGE OBJECT"),
            Type::String {
                length: Some(n), ..
            } => write!(f, "CHARACTER VARYING({})", n),
            Type::String { .. } => write!(f, "CHARACTER VARYING"),
            Type::NumericExact {
                precision: Some(p),
                scale: Some(s),
            } => write!(f, "DECIMAL({},{})", p, s),
            Type::NumericExact {
                precision: Some(p),
                scale: None,
            } => write!(f, "DECIMAL({})", p),
            Type::NumericExact { .. } => write!(f, "DECIMAL"),
            Type::NumericApproximate { .. } => write!(f, "DOUBLE PRECISION"),
            Type::Boolean => write!(f, "BOOLEAN"),
            Type::DateTime { precision } => match precision {
                DateTimePrecision::Date => write!(f, "DATE"),
                DateTimePrecision::Time => write!(f, "TIME"),
                DateTimePrecision::TimeWithZone => write!(f, "TIME WITH TIME ZONE"),
                DateTimePrecision::Timestamp => write!(f, "TIMESTAMP"),
                DateTimePrecision::TimestampWithZone => write!(f, "TIMESTAMP WITH TIME ZONE"),
            },
            Type::Binary { large: true, .. } => write!(f, "BINARY LARGE OBJECT"),
            Type::Binary { .. } => write!(f, "BINARY VARYING"),
            Type::Unsupported { vendor_name } => write!(f, "UNSUPPORTED({})", vendor_name),
            Type::Array {
                element,
                dimensions,
            } => {
                write!(f, "{}", element)?;
                for _ in 0..*dimensions {
                    write!(f, " ARRAY")?;
                }
                Ok(())
            }
            Type::Structure { name, .. } => write!(f, "STRUCTURE({})", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exact_numerics() {
        assert_eq!(
            Type::parse_sql("DECIMAL(10,2)"),
            Type::NumericExact {
                precision: Some(10),
                scale: Some(2)
            }
        );
        assert_eq!(Type::parse_sql("integer"), Type::numeric());
    }

    #[test]
    fn test_parse_zone_aware_time_with_precision() {
        assert_eq!(
            Type::parse_sql("TIME(3) WITH TIME ZONE"),
            Type::date_time(DateTimePrecision::TimeWithZone)
        );
        assert_eq!(
            Type::parse_sql("TIMESTAMP WITH TIME ZONE"),
            Type::date_time(DateTimePrecision::TimestampWithZone)
        );
    }

    #[test]
    fn test_parse_arrays() {
        assert_eq!(
            Type::parse_sql("INTEGER ARRAY[4]"),
            Type::array(Type::numeric(), 1)
        );
        assert_eq!(
            Type::parse_sql("CHARACTER VARYING(20) ARRAY[2] ARRAY[3]"),
            Type::array(
                Type::String {
                    length: Some(20),
                    large: false
                },
                2
            )
        );
    }

    #[test]
    fn test_parse_large_objects() {
        assert_eq!(
            Type::parse_sql("BINARY LARGE OBJECT"),
            Type::Binary {
                outside_database: false,
                large: true
            }
        );
        assert_eq!(
            Type::parse_sql("CLOB"),
            Type::String {
                length: None,
                large: true
            }
        );
    }

    #[test]
    fn test_parse_unknown_is_unsupported() {
        assert_eq!(
            Type::parse_sql("INTERVAL DAY TO SECOND"),
            Type::Unsupported {
                vendor_name: "INTERVAL DAY TO SECOND".into()
            }
        );
    }

    #[test]
    fn test_precision_flags() {
        assert!(!DateTimePrecision::Date.has_time());
        assert!(!DateTimePrecision::Time.has_date());
        assert!(DateTimePrecision::TimestampWithZone.has_zone());
        assert!(DateTimePrecision::Timestamp.has_date() && DateTimePrecision::Timestamp.has_time());
    }

    #[test]
    fn test_deserialize_structured_type() {
        let ty: Type = serde_yaml::from_str(
            "kind: array\nelement:\n  kind: date_time\n  precision: date\ndimensions: 2\n",
        )
        .unwrap();
        assert_eq!(ty, Type::array(Type::date_time(DateTimePrecision::Date), 2));
        assert_eq!(ty.to_string(), "DATE ARRAY ARRAY");
    }
}
