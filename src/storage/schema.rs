//! Database schema definitions
//!
//! Table descriptors are built once when a store is constructed and never
//! change afterwards. Every statement is idempotent.

use rusqlite::Connection;
use crate::{Error, Result};

pub const DEFAULT_ENTITY_TABLE: &str = "entities";
pub const DEFAULT_RELATIONSHIP_TABLE: &str = "relationships";

pub const PROPERTY_NODE_TABLE: &str = "pkg_nodes";
pub const PROPERTY_RELATION_TABLE: &str = "pkg_relations";

pub const DEFAULT_EMBEDDING_DIM: usize = 1536;

/// Table names are interpolated into SQL, so only plain identifiers pass.
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTableName(name.to_string()))
    }
}

/// Keeps `updated_at` current on every UPDATE that does not set it itself
fn touch_trigger(table: &str) -> String {
    format!(
        r#"
CREATE TRIGGER IF NOT EXISTS {table}_touch_updated_at
AFTER UPDATE ON {table}
FOR EACH ROW WHEN NEW.updated_at = OLD.updated_at
BEGIN
    UPDATE {table} SET updated_at = CURRENT_TIMESTAMP WHERE rowid = NEW.rowid;
END
"#
    )
}

/// Tables of the simple triplet store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripletSchema {
    entities: String,
    relationships: String,
}

impl Default for TripletSchema {
    fn default() -> Self {
        Self {
            entities: DEFAULT_ENTITY_TABLE.to_string(),
            relationships: DEFAULT_RELATIONSHIP_TABLE.to_string(),
        }
    }
}

impl TripletSchema {
    pub fn new(entities: &str, relationships: &str) -> Result<Self> {
        validate_table_name(entities)?;
        validate_table_name(relationships)?;
        if entities == relationships {
            return Err(Error::Config(format!(
                "entity and relationship tables must differ (both {:?})",
                entities
            )));
        }
        Ok(Self {
            entities: entities.to_string(),
            relationships: relationships.to_string(),
        })
    }

    pub fn entities(&self) -> &str {
        &self.entities
    }

    pub fn relationships(&self) -> &str {
        &self.relationships
    }

    pub fn statements(&self) -> Vec<String> {
        let e = &self.entities;
        let r = &self.relationships;
        vec![
            format!(
                r#"
CREATE TABLE IF NOT EXISTS {e} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#
            ),
            format!(
                r#"
CREATE TABLE IF NOT EXISTS {r} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    description TEXT NOT NULL,
    subject_id INTEGER NOT NULL REFERENCES {e}(id),
    object_id INTEGER NOT NULL REFERENCES {e}(id),
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(description, subject_id, object_id)
)
"#
            ),
            format!("CREATE INDEX IF NOT EXISTS idx_{r}_subject ON {r}(subject_id)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{r}_object ON {r}(object_id)"),
            touch_trigger(e),
            touch_trigger(r),
        ]
    }
}

/// Tables of the property graph store. Names are fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySchema {
    embedding_dim: usize,
}

impl Default for PropertySchema {
    fn default() -> Self {
        Self { embedding_dim: DEFAULT_EMBEDDING_DIM }
    }
}

impl PropertySchema {
    pub fn new(embedding_dim: usize) -> Result<Self> {
        if embedding_dim == 0 {
            return Err(Error::Config("embedding dimension must be positive".to_string()));
        }
        Ok(Self { embedding_dim })
    }

    pub fn nodes(&self) -> &'static str {
        PROPERTY_NODE_TABLE
    }

    pub fn relations(&self) -> &'static str {
        PROPERTY_RELATION_TABLE
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn statements(&self) -> Vec<String> {
        let n = PROPERTY_NODE_TABLE;
        let r = PROPERTY_RELATION_TABLE;
        vec![
            format!(
                r#"
CREATE TABLE IF NOT EXISTS {n} (
    id TEXT PRIMARY KEY,
    text TEXT,
    name TEXT,
    label TEXT NOT NULL DEFAULT 'node',
    properties TEXT NOT NULL DEFAULT '{{}}',
    embedding BLOB,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
)
"#
            ),
            format!(
                r#"
CREATE TABLE IF NOT EXISTS {r} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL,
    source_id TEXT NOT NULL REFERENCES {n}(id),
    target_id TEXT NOT NULL REFERENCES {n}(id),
    properties TEXT NOT NULL DEFAULT '{{}}',
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(label, source_id, target_id)
)
"#
            ),
            format!("CREATE INDEX IF NOT EXISTS idx_{n}_name ON {n}(name)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{n}_label ON {n}(label)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{r}_source ON {r}(source_id)"),
            format!("CREATE INDEX IF NOT EXISTS idx_{r}_target ON {r}(target_id)"),
            touch_trigger(n),
            touch_trigger(r),
        ]
    }
}

/// Create any missing tables, indexes and triggers
pub fn ensure(conn: &Connection, statements: &[String]) -> Result<()> {
    for stmt in statements {
        conn.execute_batch(stmt)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn test_table_name_validation() {
        assert!(validate_table_name("entities").is_ok());
        assert!(validate_table_name("_graph_2").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("2fast").is_err());
        assert!(validate_table_name("x; DROP TABLE y").is_err());
        assert!(TripletSchema::new("same", "same").is_err());
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = TripletSchema::new("people", "links").unwrap();

        ensure(&conn, &schema.statements()).unwrap();
        ensure(&conn, &schema.statements()).unwrap();

        assert!(table_exists(&conn, "people"));
        assert!(table_exists(&conn, "links"));
    }

    #[test]
    fn test_property_schema_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = PropertySchema::default();
        ensure(&conn, &schema.statements()).unwrap();

        assert!(table_exists(&conn, PROPERTY_NODE_TABLE));
        assert!(table_exists(&conn, PROPERTY_RELATION_TABLE));
        assert_eq!(schema.embedding_dim(), 1536);
        assert!(PropertySchema::new(0).is_err());
    }

    #[test]
    fn test_foreign_keys_are_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON").unwrap();
        ensure(&conn, &PropertySchema::default().statements()).unwrap();

        let result = conn.execute(
            "INSERT INTO pkg_relations (label, source_id, target_id) VALUES ('x', 'a', 'b')",
            [],
        );
        assert!(result.is_err());
    }
}
