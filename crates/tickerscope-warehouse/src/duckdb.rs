//! Pooled `DuckDB` connections split by access mode.
//!
//! Every connection is cloned from one database instance opened lazily per file.
//! Run persistence takes the single writer connection. Ad-hoc SQL uses reader
//! connections and is restricted to read-only statements by the query guard.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use ::duckdb::Connection;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

#[derive(Default)]
struct Idle {
    readers: Vec<Connection>,
    writer: Option<Connection>,
}

struct PoolInner {
    db_path: PathBuf,
    max_idle_readers: usize,
    root: Mutex<Option<Connection>>,
    idle: Mutex<Idle>,
}

impl PoolInner {
    fn idle(&self) -> MutexGuard<'_, Idle> {
        self.idle.lock().expect("duckdb connection pool mutex poisoned")
    }

    fn open(&self) -> Result<Connection, ::duckdb::Error> {
        let mut root = self.root.lock().expect("duckdb root connection mutex poisoned");
        let connection = match root.as_ref() {
            Some(root) => root.try_clone()?,
            None => {
                debug!(path = %self.db_path.display(), "opening duckdb database");
                let opened = Connection::open(&self.db_path)?;
                let connection = opened.try_clone()?;
                *root = Some(opened);
                connection
            }
        };
        configure_connection(&connection)?;
        Ok(connection)
    }
}

/// Connection pool for one database file.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(path: impl Into<PathBuf>, max_idle_readers: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                db_path: path.into(),
                max_idle_readers: max_idle_readers.max(1),
                root: Mutex::new(None),
                idle: Mutex::new(Idle::default()),
            }),
        }
    }

    /// Take an idle connection for `mode`, or open a new one.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let idle = {
            let mut idle = self.inner.idle();
            match mode {
                AccessMode::ReadOnly => idle.readers.pop(),
                AccessMode::ReadWrite => idle.writer.take(),
            }
        };

        let connection = match idle {
            Some(connection) => connection,
            None => self.inner.open()?,
        };

        Ok(PooledConnection {
            mode,
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.inner.db_path
    }
}

/// Connection handed back to its pool on drop.
pub struct PooledConnection {
    mode: AccessMode,
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl PooledConnection {
    pub fn mode(&self) -> AccessMode {
        self.mode
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection unexpectedly missing")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = self.pool.idle();
        match self.mode {
            AccessMode::ReadOnly => {
                if idle.readers.len() < self.pool.max_idle_readers {
                    idle.readers.push(connection);
                }
            }
            AccessMode::ReadWrite => {
                if idle.writer.is_none() {
                    idle.writer = Some(connection);
                }
            }
        }
    }
}

fn configure_connection(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch("PRAGMA disable_progress_bar;")
}
