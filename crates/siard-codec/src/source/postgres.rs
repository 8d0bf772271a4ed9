//! PostgreSQL connection and cursor.
//!
//! Tables are read through server-side cursors inside a read-only
//! transaction: `DECLARE` once, then `FETCH FORWARD n` per round trip with the
//! cursor's current fetch size. Values travel in text form over the simple
//! query protocol, which is what the text-parsing defaults of [`Cursor`]
//! expect.
//!
//! The traits are synchronous; every call bridges to the async client with
//! [`Handle::block_on`], so these types must be used from a blocking thread
//! (for example inside `tokio::task::spawn_blocking`).

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage, SimpleQueryRow};
use tracing::{debug, info, warn};

use super::array_literal::parse_array_literal;
use super::cursor::{ArrayValue, Connection, Cursor};
use super::sqlstate::{classify, ErrorClass};
use super::tls::{connector, SslMode};
use crate::config::SourceConfig;
use crate::error::{CodecError, Result};

/// A single PostgreSQL session.
pub struct PgConnection {
    handle: Handle,
    client: Arc<Client>,
    config: SourceConfig,
    cursor_seq: u64,
}

impl PgConnection {
    /// Connect using `handle` to drive the async client.
    pub fn connect(config: &SourceConfig, handle: Handle) -> Result<Self> {
        let client = handle.block_on(connect_client(config))?;
        info!(
            "Connected to PostgreSQL source at {}:{}/{}",
            config.host, config.port, config.database
        );
        Ok(Self {
            handle,
            client: Arc::new(client),
            config: config.clone(),
            cursor_seq: 0,
        })
    }

    /// Round-trip a trivial query and return the server version string.
    pub fn health_check(&self) -> Result<String> {
        let messages = self
            .handle
            .block_on(self.client.simple_query("SELECT version()"))
            .map_err(driver_error)?;
        messages
            .into_iter()
            .find_map(|m| match m {
                SimpleQueryMessage::Row(row) => row.get(0).map(str::to_string),
                _ => None,
            })
            .ok_or_else(|| CodecError::driver("SELECT version() returned no row"))
    }
}

impl Connection for PgConnection {
    type Cursor = PgCursor;

    fn open_cursor(&mut self, sql: &str, fetch_size: usize) -> Result<PgCursor> {
        self.cursor_seq += 1;
        let name = format!("siard_codec_cursor_{}", self.cursor_seq);
        let declare = format!(
            "BEGIN READ ONLY; DECLARE {} SCROLL CURSOR FOR {}",
            name, sql
        );
        debug!("Declaring cursor {}", name);

        if let Err(e) = self.handle.block_on(self.client.batch_execute(&declare)) {
            let err = driver_error(e);
            if !self.client.is_closed() {
                if let Err(rollback) = self.handle.block_on(self.client.batch_execute("ROLLBACK")) {
                    warn!("Rollback after failed DECLARE failed: {}", rollback);
                }
            }
            return Err(err);
        }

        Ok(PgCursor {
            handle: self.handle.clone(),
            client: Arc::clone(&self.client),
            name,
            fetch_size,
            buffer: VecDeque::new(),
            current: None,
            consumed: 0,
            fetched: 0,
            exhausted: false,
            closed: false,
        })
    }

    fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    fn reconnect(&mut self) -> Result<()> {
        warn!(
            "Reconnecting to PostgreSQL source at {}:{}",
            self.config.host, self.config.port
        );
        let client = self.handle.block_on(connect_client(&self.config))?;
        self.client = Arc::new(client);
        Ok(())
    }
}

/// Forward-only reader over a `DECLARE`d cursor.
///
/// The cursor is declared `SCROLL` only so a failed `FETCH` can be undone:
/// each fetch runs under a savepoint, and on failure the savepoint is rolled
/// back and the cursor moved back to the last row handed out.
pub struct PgCursor {
    handle: Handle,
    client: Arc<Client>,
    name: String,
    fetch_size: usize,
    buffer: VecDeque<SimpleQueryRow>,
    current: Option<SimpleQueryRow>,
    /// Rows handed out through `next_row`.
    consumed: u64,
    /// Rows received from the server.
    fetched: u64,
    exhausted: bool,
    closed: bool,
}

impl PgCursor {
    fn fill(&mut self) -> Result<()> {
        let count = match self.fetch_size {
            0 => "ALL".to_string(),
            n => n.to_string(),
        };
        let sql = format!(
            "SAVEPOINT siard_codec_fetch; FETCH FORWARD {} FROM {}; RELEASE SAVEPOINT siard_codec_fetch",
            count, self.name
        );

        let messages = match self.handle.block_on(self.client.simple_query(&sql)) {
            Ok(messages) => messages,
            Err(e) => {
                let err = driver_error(e);
                self.restore_position();
                return Err(err);
            }
        };

        let mut received = 0;
        for message in messages {
            if let SimpleQueryMessage::Row(row) = message {
                self.buffer.push_back(row);
                received += 1;
            }
        }
        self.fetched += received as u64;
        if self.fetch_size == 0 || received < self.fetch_size {
            self.exhausted = true;
        }
        Ok(())
    }

    fn restore_position(&mut self) {
        if self.client.is_closed() {
            return;
        }
        let sql = format!(
            "ROLLBACK TO SAVEPOINT siard_codec_fetch; MOVE ABSOLUTE {} IN {}",
            self.fetched, self.name
        );
        if let Err(e) = self.handle.block_on(self.client.batch_execute(&sql)) {
            warn!("{}: could not restore cursor position: {}", self.name, e);
        }
    }

    fn current(&self) -> Result<&SimpleQueryRow> {
        self.current
            .as_ref()
            .ok_or_else(|| CodecError::driver("cursor is not on a row"))
    }

    fn close_sql(&self) -> String {
        format!("CLOSE {}; COMMIT", self.name)
    }
}

impl Cursor for PgCursor {
    fn column_count(&self) -> usize {
        self.current.as_ref().map(SimpleQueryRow::len).unwrap_or(0)
    }

    fn row_number(&self) -> Option<u64> {
        self.current.as_ref().map(|_| self.consumed)
    }

    fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    fn set_fetch_size(&mut self, rows: usize) -> Result<()> {
        debug!("{}: fetch size {} -> {}", self.name, self.fetch_size, rows);
        self.fetch_size = rows;
        Ok(())
    }

    fn next_row(&mut self) -> Result<bool> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill()?;
        }
        match self.buffer.pop_front() {
            Some(row) => {
                self.current = Some(row);
                self.consumed += 1;
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    fn get_text(&self, column: usize) -> Result<Option<String>> {
        let value = self.current()?.try_get(column).map_err(driver_error)?;
        Ok(value.map(str::to_string))
    }

    fn get_array(&self, column: usize) -> Result<Option<ArrayValue>> {
        self.get_text(column)?
            .map(|text| parse_array_literal(&text))
            .transpose()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffer.clear();
        self.current = None;
        if self.client.is_closed() {
            return Ok(());
        }
        self.handle
            .block_on(self.client.batch_execute(&self.close_sql()))
            .map_err(driver_error)
    }
}

impl Drop for PgCursor {
    fn drop(&mut self) {
        if self.closed || self.client.is_closed() {
            return;
        }
        self.closed = true;
        let sql = self.close_sql();
        // block_on panics on a runtime thread; hand the cleanup to the runtime there.
        if Handle::try_current().is_ok() {
            let client = Arc::clone(&self.client);
            self.handle.spawn(async move {
                if let Err(e) = client.batch_execute(&sql).await {
                    warn!("Closing cursor on drop failed: {}", e);
                }
            });
        } else if let Err(e) = self.handle.block_on(self.client.batch_execute(&sql)) {
            warn!("Closing cursor on drop failed: {}", e);
        }
    }
}

async fn connect_client(config: &SourceConfig) -> Result<Client> {
    let context = format!("{}:{}/{}", config.host, config.port, config.database);
    let pg_config = config.pg_config();

    let client = match connector(SslMode::parse(&config.ssl_mode)?)? {
        Some(tls) => {
            let (client, connection) = pg_config
                .connect(tls)
                .await
                .map_err(|e| CodecError::connection(e.to_string(), context.clone()))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!("PostgreSQL connection error: {}", e);
                }
            });
            client
        }
        None => {
            let (client, connection) = pg_config
                .connect(NoTls)
                .await
                .map_err(|e| CodecError::connection(e.to_string(), context.clone()))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!("PostgreSQL connection error: {}", e);
                }
            });
            client
        }
    };
    Ok(client)
}

/// Map a client error, flagging connection-class failures.
fn driver_error(e: tokio_postgres::Error) -> CodecError {
    if e.is_closed() {
        return CodecError::connection_lost(e.to_string());
    }
    let Some(db) = e.as_db_error() else {
        return CodecError::driver(e.to_string());
    };
    let message = format!("{} (SQLSTATE {})", db.message(), db.code().code());
    match classify(db.code().code()) {
        ErrorClass::Connection => CodecError::connection_lost(message),
        _ => CodecError::driver(message),
    }
}
