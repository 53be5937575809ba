//! SQLite task store.
//!
//! A single connection guarded by a mutex serves every request; writers are
//! serialized by the lock and by SQLite itself. The `tasks` table is created
//! by the embedded `V1` migration the first time a database is opened.

pub mod stats;
pub mod tasks;

use anyhow::{Context, Result, anyhow};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Pragmas applied to file-backed stores. In-memory stores skip WAL.
const FILE_PRAGMAS: &str = "PRAGMA journal_mode=WAL;
                            PRAGMA busy_timeout=5000;";

/// Shared handle to the task store. Cloning shares the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open the store at `path`, creating the file and the `tasks` table if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("cannot open task store {}", path.display()))?;
        conn.execute_batch(FILE_PRAGMAS)?;
        Self::bootstrap(conn)
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> Result<Self> {
        let report = embedded::migrations::runner()
            .run(&mut conn)
            .context("cannot create tasks table")?;
        match report.applied_migrations().len() {
            0 => debug!("Task store schema already current"),
            applied => info!(applied, "Task store schema created"),
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("task store lock poisoned by a panicked request"))
    }

    /// Run `f` while holding the store lock.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        f(&*self.lock()?)
    }

    /// Like [`with_conn`](Self::with_conn), with the mutable access transactions need.
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        f(&mut *self.lock()?)
    }
}

/// Creation timestamp for new tasks, in Unix milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
