//! Connection handling: connection strings, availability checks and
//! scoped units of work.

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use rusqlite::{Connection, ErrorCode, OpenFlags, Transaction};
use crate::{Error, Result};
use super::vector;

/// Where a connection string points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    Memory,
    File(PathBuf),
    /// SQLite `file:` URI, passed through untouched
    Uri(String),
}

impl ConnectionTarget {
    /// Parse `sqlite::memory:`, `:memory:`, `sqlite://path`, `sqlite:path`,
    /// `file:...` URIs or a bare path.
    pub fn parse(conn_str: &str) -> Result<Self> {
        let s = conn_str.trim();
        if s.is_empty() {
            return Err(Error::Config("connection string is empty".to_string()));
        }

        if matches!(s, "sqlite::memory:" | ":memory:" | "sqlite://:memory:") {
            return Ok(ConnectionTarget::Memory);
        }
        if s.starts_with("file:") {
            return Ok(ConnectionTarget::Uri(s.to_string()));
        }
        if let Some(path) = s.strip_prefix("sqlite://").or_else(|| s.strip_prefix("sqlite:")) {
            if path.is_empty() {
                return Err(Error::Config(format!("connection string {:?} has no database path", s)));
            }
            return Ok(ConnectionTarget::File(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = s.split_once("://") {
            return Err(Error::Config(format!(
                "unsupported connection scheme {:?}; expected sqlite://<path> or sqlite::memory:",
                scheme
            )));
        }
        Ok(ConnectionTarget::File(PathBuf::from(s)))
    }

    /// In-memory databases vanish with their connection and are never reopened
    pub fn is_recyclable(&self) -> bool {
        match self {
            ConnectionTarget::Memory => false,
            ConnectionTarget::File(_) => true,
            ConnectionTarget::Uri(uri) => !(uri.starts_with("file::memory:") || uri.contains("mode=memory")),
        }
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        match self {
            ConnectionTarget::Memory => Connection::open_in_memory(),
            ConnectionTarget::File(path) => Connection::open(path),
            ConnectionTarget::Uri(uri) => {
                Connection::open_with_flags(uri, OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI)
            }
        }
    }
}

impl std::fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionTarget::Memory => write!(f, "sqlite::memory:"),
            ConnectionTarget::File(path) => write!(f, "sqlite://{}", path.display()),
            ConnectionTarget::Uri(uri) => write!(f, "{}", uri),
        }
    }
}

/// Map a failed availability round trip to a configuration-level error
pub fn classify_availability(target: &ConnectionTarget, err: rusqlite::Error) -> Error {
    let target = target.to_string();
    match err.sqlite_error_code() {
        Some(
            ErrorCode::NotADatabase
            | ErrorCode::AuthorizationForStatementDenied
            | ErrorCode::PermissionDenied,
        ) => Error::InvalidCredentials { target, source: err },
        _ => Error::Unavailable { target, source: err },
    }
}

struct Pooled {
    conn: Connection,
    opened_at: Instant,
}

/// A single recycled connection handing out one transaction per operation.
pub struct Engine {
    target: ConnectionTarget,
    recycle: Option<Duration>,
    pooled: Mutex<Pooled>,
    generation: AtomicU64,
}

impl Engine {
    /// Open the target, run the availability check and register SQL functions.
    ///
    /// With `check_vector` the vector functions are exercised as well.
    pub fn connect(conn_str: &str, recycle: Option<Duration>, check_vector: bool) -> Result<Self> {
        let target = ConnectionTarget::parse(conn_str)?;
        let conn = open_connection(&target)?;

        check_availability(&conn, &target, check_vector)?;
        tracing::info!("Connected to {}", target);

        Ok(Self {
            target,
            recycle,
            pooled: Mutex::new(Pooled { conn, opened_at: Instant::now() }),
            generation: AtomicU64::new(1),
        })
    }

    /// Number of connections opened so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }

    /// Run `f` inside a transaction, committing on success.
    ///
    /// On error the transaction is dropped and rolled back.
    pub fn session<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut pooled = self.pooled.lock().map_err(|_| Error::SessionPoisoned)?;
        self.recycle_if_stale(&mut pooled)?;

        let tx = pooled.conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn recycle_if_stale(&self, pooled: &mut Pooled) -> Result<()> {
        let Some(max_age) = self.recycle else {
            return Ok(());
        };
        if !self.target.is_recyclable() || pooled.opened_at.elapsed() < max_age {
            return Ok(());
        }

        tracing::debug!("Recycling connection to {} after {:?}", self.target, pooled.opened_at.elapsed());
        pooled.conn = open_connection(&self.target)?;
        pooled.opened_at = Instant::now();
        self.generation.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn open_connection(target: &ConnectionTarget) -> Result<Connection> {
    let configure = || -> rusqlite::Result<Connection> {
        let conn = target.open()?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        vector::register_functions(&conn)?;
        Ok(conn)
    };
    configure().map_err(|e| classify_availability(target, e))
}

fn check_availability(conn: &Connection, target: &ConnectionTarget, check_vector: bool) -> Result<()> {
    // Touching sqlite_master forces the file header to be read
    conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
        .map_err(|e| classify_availability(target, e))?;

    if check_vector {
        conn.query_row(
            &format!("SELECT {}(?1)", vector::DIMS_FN),
            [vector::encode(&[1.0])],
            |row| row.get::<_, i64>(0),
        )
        .map_err(|e| Error::VectorUnsupported { target: target.to_string(), source: e })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_connection_strings() {
        assert_eq!(ConnectionTarget::parse("sqlite::memory:").unwrap(), ConnectionTarget::Memory);
        assert_eq!(ConnectionTarget::parse(":memory:").unwrap(), ConnectionTarget::Memory);
        assert_eq!(
            ConnectionTarget::parse("sqlite://data/graph.db").unwrap(),
            ConnectionTarget::File(PathBuf::from("data/graph.db"))
        );
        assert_eq!(
            ConnectionTarget::parse("graph.db").unwrap(),
            ConnectionTarget::File(PathBuf::from("graph.db"))
        );
        assert!(matches!(
            ConnectionTarget::parse("file:shared?mode=memory&cache=shared").unwrap(),
            ConnectionTarget::Uri(_)
        ));
    }

    #[test]
    fn test_rejects_foreign_schemes() {
        let err = ConnectionTarget::parse("mysql://root@localhost:4000/test").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(ConnectionTarget::parse("   ").is_err());
        assert!(ConnectionTarget::parse("sqlite://").is_err());
    }

    #[test]
    fn test_not_a_database_is_credentials_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, vec![0x42u8; 4096]).unwrap();

        let err = Engine::connect(path.to_str().unwrap(), None, false).err().unwrap();
        assert!(matches!(err, Error::InvalidCredentials { .. }), "got {err:?}");
    }

    #[test]
    fn test_missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/graph.db");

        let err = Engine::connect(path.to_str().unwrap(), None, false).err().unwrap();
        assert!(matches!(err, Error::Unavailable { .. }), "got {err:?}");
    }

    #[test]
    fn test_session_rolls_back_on_error() {
        let engine = Engine::connect("sqlite::memory:", None, true).unwrap();
        engine.session(|tx| Ok(tx.execute_batch("CREATE TABLE t (x INTEGER)")?)).unwrap();

        let failed: Result<()> = engine.session(|tx| {
            tx.execute("INSERT INTO t (x) VALUES (1)", [])?;
            Err(Error::Unsupported("abort"))
        });
        assert!(failed.is_err());

        let count: i64 = engine
            .session(|tx| Ok(tx.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_file_connections_are_recycled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.db");
        let engine = Engine::connect(path.to_str().unwrap(), Some(Duration::ZERO), false).unwrap();

        engine.session(|tx| Ok(tx.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7)")?)).unwrap();
        let x: i64 = engine
            .session(|tx| Ok(tx.query_row("SELECT x FROM t", [], |r| r.get(0))?))
            .unwrap();

        assert_eq!(x, 7);
        assert!(engine.generation() >= 3);
    }

    #[test]
    fn test_memory_connections_are_not_recycled() {
        let engine = Engine::connect("sqlite::memory:", Some(Duration::ZERO), false).unwrap();
        engine.session(|tx| Ok(tx.execute_batch("CREATE TABLE t (x INTEGER)")?)).unwrap();
        engine.session(|tx| Ok(tx.execute("INSERT INTO t VALUES (1)", [])?)).unwrap();
        assert_eq!(engine.generation(), 1);
    }

    #[test]
    fn test_memory_uris_are_not_recycled() {
        assert!(!ConnectionTarget::parse("file::memory:").unwrap().is_recyclable());
        assert!(!ConnectionTarget::parse("file::memory:?cache=shared").unwrap().is_recyclable());
        assert!(!ConnectionTarget::parse("file:graph?mode=memory&cache=shared").unwrap().is_recyclable());
        assert!(ConnectionTarget::parse("file:graph.db").unwrap().is_recyclable());

        let engine = Engine::connect("file::memory:", Some(Duration::ZERO), false).unwrap();
        engine.session(|tx| Ok(tx.execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (7)")?)).unwrap();
        let x: i64 = engine
            .session(|tx| Ok(tx.query_row("SELECT x FROM t", [], |r| r.get(0))?))
            .unwrap();

        assert_eq!(x, 7);
        assert_eq!(engine.generation(), 1);
    }
}
