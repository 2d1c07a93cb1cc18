//! Fixed-size SQLite connection pool.
//!
//! All connections are opened up front. `acquire` blocks on a condition
//! variable until one is returned or the timeout passes; there is no
//! unbounded queue of waiters beyond the threads themselves.

use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use crate::error::{StateError, StateResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub size: usize,
    pub acquire_timeout: Duration,
    /// SQLite's own wait on a locked database, per statement.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 4,
            acquire_timeout: Duration::from_millis(10_000),
            busy_timeout: Duration::from_millis(250),
        }
    }
}

pub struct ConnectionPool {
    idle: Mutex<Vec<Connection>>,
    returned: Condvar,
    size: usize,
    acquire_timeout: Duration,
    db_path: PathBuf,
}

impl ConnectionPool {
    /// Open `config.size` read-write connections to `db_path`.
    pub fn open(db_path: &Path, config: &PoolConfig) -> StateResult<Self> {
        let size = config.size.max(1);
        let mut connections = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                db_path,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            configure_connection(&conn, config.busy_timeout)?;
            connections.push(conn);
        }
        debug!(path = %db_path.display(), size, "state pool opened");
        Ok(Self {
            idle: Mutex::new(connections),
            returned: Condvar::new(),
            size,
            acquire_timeout: config.acquire_timeout,
            db_path: db_path.to_path_buf(),
        })
    }

    /// Borrow a connection, waiting up to the acquire timeout.
    pub fn acquire(&self) -> StateResult<PooledConnection<'_>> {
        let deadline = Instant::now() + self.acquire_timeout;
        let mut idle = self.idle.lock().expect("lock poisoned");
        loop {
            if let Some(conn) = idle.pop() {
                return Ok(PooledConnection {
                    conn: Some(conn),
                    pool: self,
                });
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(timeout = ?self.acquire_timeout, "state pool exhausted");
                return Err(StateError::PoolTimeout(self.acquire_timeout));
            }
            idle = self
                .returned
                .wait_timeout(idle, deadline - now)
                .expect("lock poisoned")
                .0;
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Connections not currently borrowed.
    pub fn available(&self) -> usize {
        self.idle.lock().expect("lock poisoned").len()
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn release(&self, conn: Connection) {
        self.idle.lock().expect("lock poisoned").push(conn);
        self.returned.notify_one();
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("size", &self.size)
            .field("db_path", &self.db_path)
            .finish()
    }
}

fn configure_connection(conn: &Connection, busy_timeout: Duration) -> StateResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(busy_timeout)?;
    Ok(())
}

/// A borrowed connection, returned to the pool on drop.
pub struct PooledConnection<'a> {
    conn: Option<Connection>,
    pool: &'a ConnectionPool,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `None` during drop.
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
