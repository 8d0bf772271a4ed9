//! Scripted connection and cursor for unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use super::cursor::{ArrayValue, Connection, Cursor};
use crate::error::{CodecError, Result};

#[derive(Debug, Clone)]
pub enum MockValue {
    Null,
    Text(String),
    Array(ArrayValue),
}

impl From<&str> for MockValue {
    fn from(s: &str) -> Self {
        MockValue::Text(s.to_string())
    }
}

/// What happened to cursors opened by a [`ScriptedConnection`].
#[derive(Debug, Default)]
pub struct CursorLog {
    pub fetch_sizes_set: Vec<usize>,
    pub next_calls: usize,
    pub closed: usize,
}

pub struct ScriptedConnection {
    pub rows: Vec<Vec<MockValue>>,
    /// Query execution fails at these fetch sizes.
    pub failing_query_sizes: Vec<usize>,
    /// Advancing fails while the cursor uses one of these fetch sizes.
    pub failing_next_sizes: Vec<usize>,
    /// A failed query also drops the connection.
    pub drop_on_failure: bool,
    pub report_row_numbers: bool,
    pub attempts: Vec<usize>,
    pub reconnects: usize,
    pub closed: bool,
    pub log: Rc<RefCell<CursorLog>>,
}

impl ScriptedConnection {
    pub fn new(rows: Vec<Vec<MockValue>>) -> Self {
        Self {
            rows,
            failing_query_sizes: Vec::new(),
            failing_next_sizes: Vec::new(),
            drop_on_failure: false,
            report_row_numbers: false,
            attempts: Vec::new(),
            reconnects: 0,
            closed: false,
            log: Rc::new(RefCell::new(CursorLog::default())),
        }
    }
}

impl Connection for ScriptedConnection {
    type Cursor = ScriptedCursor;

    fn open_cursor(&mut self, _sql: &str, fetch_size: usize) -> Result<ScriptedCursor> {
        self.attempts.push(fetch_size);
        if self.failing_query_sizes.contains(&fetch_size) {
            if self.drop_on_failure {
                self.closed = true;
            }
            return Err(CodecError::driver(format!(
                "out of memory at fetch size {}",
                fetch_size
            )));
        }
        Ok(ScriptedCursor {
            rows: self.rows.clone(),
            position: None,
            fetch_size,
            failing_next_sizes: self.failing_next_sizes.clone(),
            report_row_numbers: self.report_row_numbers,
            log: Rc::clone(&self.log),
        })
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn reconnect(&mut self) -> Result<()> {
        self.reconnects += 1;
        self.closed = false;
        Ok(())
    }
}

pub struct ScriptedCursor {
    rows: Vec<Vec<MockValue>>,
    position: Option<usize>,
    fetch_size: usize,
    failing_next_sizes: Vec<usize>,
    report_row_numbers: bool,
    log: Rc<RefCell<CursorLog>>,
}

impl ScriptedCursor {
    fn value(&self, column: usize) -> Result<&MockValue> {
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| CodecError::driver("cursor is not on a row"))?;
        row.get(column)
            .ok_or_else(|| CodecError::driver(format!("no column {}", column)))
    }
}

impl Cursor for ScriptedCursor {
    fn column_count(&self) -> usize {
        self.position
            .and_then(|p| self.rows.get(p))
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn row_number(&self) -> Option<u64> {
        if self.report_row_numbers {
            self.position.map(|p| p as u64 + 1)
        } else {
            None
        }
    }

    fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    fn set_fetch_size(&mut self, rows: usize) -> Result<()> {
        self.fetch_size = rows;
        self.log.borrow_mut().fetch_sizes_set.push(rows);
        Ok(())
    }

    fn next_row(&mut self) -> Result<bool> {
        self.log.borrow_mut().next_calls += 1;
        if self.failing_next_sizes.contains(&self.fetch_size) {
            return Err(CodecError::driver("fetch buffer exhausted"));
        }
        let next = self.position.map(|p| p + 1).unwrap_or(0);
        if next < self.rows.len() {
            self.position = Some(next);
            Ok(true)
        } else {
            self.position = Some(self.rows.len());
            Ok(false)
        }
    }

    fn get_text(&self, column: usize) -> Result<Option<String>> {
        match self.value(column)? {
            MockValue::Null => Ok(None),
            MockValue::Text(t) => Ok(Some(t.clone())),
            MockValue::Array(_) => Err(CodecError::driver("value is an array")),
        }
    }

    fn get_array(&self, column: usize) -> Result<Option<ArrayValue>> {
        match self.value(column)? {
            MockValue::Null => Ok(None),
            MockValue::Array(a) => Ok(Some(a.clone())),
            MockValue::Text(_) => Err(CodecError::driver("value is not an array")),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.log.borrow_mut().closed += 1;
        Ok(())
    }
}
