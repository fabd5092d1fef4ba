//! Pooled fixture database connections.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;
use tracing::debug;

use crate::config::DatabaseConfig;

/// Errors raised by fixture databases.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to open database {address}: {source}")]
    Open {
        address: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Script {} failed: {source}", path.display())]
    Script {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Failed to read script {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection to {0} is unusable after a panic")]
    Poisoned(String),
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct ConnectionKey {
    address: String,
    username: String,
    password: String,
}

impl From<&DatabaseConfig> for ConnectionKey {
    fn from(db: &DatabaseConfig) -> Self {
        Self {
            address: db.address.clone(),
            username: db.username.clone(),
            password: db.password.clone(),
        }
    }
}

/// Lazily opened connections, one per (address, username, password).
///
/// A connection is shared by every test using the same descriptor and
/// executes one script at a time.
#[derive(Default)]
pub struct ConnectionPool {
    connections: Mutex<HashMap<ConnectionKey, Arc<Mutex<Connection>>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Connection for a descriptor, opened on first use.
    pub fn connection(&self, db: &DatabaseConfig) -> Result<Arc<Mutex<Connection>>, DbError> {
        let mut connections = self
            .connections
            .lock()
            .map_err(|_| DbError::Poisoned(db.address.clone()))?;

        let key = ConnectionKey::from(db);
        if let Some(connection) = connections.get(&key) {
            return Ok(Arc::clone(connection));
        }

        debug!(address = %db.address, "opening database connection");
        let connection = Arc::new(Mutex::new(open(&db.address)?));
        connections.insert(key, Arc::clone(&connection));
        Ok(connection)
    }

    /// Execute a script as one transaction.
    pub fn execute_script(&self, db: &DatabaseConfig, script: &Path) -> Result<(), DbError> {
        let sql = fs::read_to_string(script).map_err(|source| DbError::Io {
            path: script.to_path_buf(),
            source,
        })?;

        let connection = self.connection(db)?;
        let mut connection = connection
            .lock()
            .map_err(|_| DbError::Poisoned(db.address.clone()))?;

        let script_error = |source| DbError::Script {
            path: script.to_path_buf(),
            source,
        };
        let tx = connection.transaction().map_err(script_error)?;
        tx.execute_batch(&sql).map_err(script_error)?;
        tx.commit().map_err(script_error)
    }
}

/// Open a connection from a JDBC-style or plain SQLite address.
fn open(address: &str) -> Result<Connection, DbError> {
    let path = address
        .strip_prefix("jdbc:sqlite:")
        .or_else(|| address.strip_prefix("sqlite://"))
        .or_else(|| address.strip_prefix("sqlite:"))
        .unwrap_or(address);

    let result = if path == ":memory:" {
        Connection::open_in_memory()
    } else {
        Connection::open(path)
    };

    result.map_err(|source| DbError::Open {
        address: address.to_string(),
        source,
    })
}
