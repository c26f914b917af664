//! Row-level helpers shared by both stores: get-or-create, row
//! materialisation and SQL fragment builders.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params_from_iter};

use crate::node::{ChunkNode, EntityNode, LabelledNode, NodeKind};
use crate::value::{Properties, decode_properties, remove_empty_values};
use crate::{Error, Result};
use super::vector;

/// Look up a row by exact match on `filter`; insert `filter + defaults` when
/// absent. Returns the rowid and whether the row was created.
///
/// Column names come from schema descriptors, never from callers.
pub fn get_or_create(
    conn: &Connection,
    table: &str,
    filter: &[(&str, Value)],
    defaults: &[(&str, Value)],
) -> Result<(i64, bool)> {
    if filter.is_empty() {
        return Err(Error::Config(format!("get_or_create on {} needs a filter", table)));
    }

    let conditions = filter
        .iter()
        .map(|(column, _)| format!("{} IS ?", column))
        .collect::<Vec<_>>()
        .join(" AND ");
    let existing: Option<i64> = conn
        .query_row(
            &format!("SELECT rowid FROM {} WHERE {} LIMIT 1", table, conditions),
            params_from_iter(filter.iter().map(|(_, v)| v)),
            |row| row.get(0),
        )
        .optional()?;

    if let Some(rowid) = existing {
        return Ok((rowid, false));
    }

    let columns: Vec<&(&str, Value)> = filter.iter().chain(defaults.iter()).collect();
    let names = columns.iter().map(|(c, _)| *c).collect::<Vec<_>>().join(", ");
    conn.execute(
        &format!("INSERT INTO {} ({}) VALUES ({})", table, names, placeholders(columns.len())),
        params_from_iter(columns.iter().map(|(_, v)| v)),
    )?;
    Ok((conn.last_insert_rowid(), true))
}

/// `?, ?, ?` with `n` markers
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// JSON path addressing a single top-level key, quoted so dots and spaces
/// in keys stay literal
pub fn json_key_path(key: &str) -> String {
    format!("$.\"{}\"", key.replace('"', "\\\""))
}

/// `LIMIT` operand, saturating at `i64::MAX`
pub fn sql_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<usize> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Parse timestamp from database - handles both SQLite and RFC3339 formats
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

/// Entity row of the simple triplet store
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    pub id: i64,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const ENTITY_COLUMNS: &str = "id, name, created_at, updated_at";

pub fn row_to_entity(row: &Row) -> rusqlite::Result<EntityRecord> {
    let created: String = row.get(2)?;
    let updated: String = row.get(3)?;
    Ok(EntityRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: parse_timestamp(&created),
        updated_at: parse_timestamp(&updated),
    })
}

/// Node row of the property graph store
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub id: String,
    pub name: Option<String>,
    pub text: Option<String>,
    pub label: String,
    pub properties: Properties,
    pub embedding: Option<Vec<f32>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub const NODE_COLUMNS: &str = "id, name, text, label, properties, embedding, created_at, updated_at";

/// Same columns as `NODE_COLUMNS`, qualified with a table alias
pub fn node_columns(alias: &str) -> String {
    NODE_COLUMNS
        .split(", ")
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read a node starting at column `offset` (layout of `NODE_COLUMNS`)
pub fn row_to_node(row: &Row, offset: usize) -> rusqlite::Result<NodeRecord> {
    let properties_raw: Option<String> = row.get(offset + 4)?;
    let properties = decode_properties(properties_raw.as_deref()).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(offset + 4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let embedding: Option<Vec<u8>> = row.get(offset + 5)?;
    let created: Option<String> = row.get(offset + 6)?;
    let updated: Option<String> = row.get(offset + 7)?;

    Ok(NodeRecord {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        text: row.get(offset + 2)?,
        label: row.get(offset + 3)?,
        properties,
        embedding: embedding.map(|blob| vector::decode(&blob)),
        created_at: created.as_deref().and_then(parse_timestamp),
        updated_at: updated.as_deref().and_then(parse_timestamp),
    })
}

impl NodeRecord {
    /// Chunk rows become `ChunkNode`, everything else `EntityNode`.
    ///
    /// Placeholder rows created as relation endpoints have no name and fall
    /// back to their id. Empty property values are dropped.
    pub fn into_labelled(self) -> LabelledNode {
        let properties = remove_empty_values(self.properties);
        match NodeKind::for_label(&self.label) {
            NodeKind::Chunk => LabelledNode::Chunk(ChunkNode {
                id: self.id,
                text: self.text.unwrap_or_default(),
                label: self.label,
                properties,
                embedding: self.embedding,
            }),
            _ => LabelledNode::Entity(EntityNode {
                name: self.name.unwrap_or(self.id),
                label: self.label,
                properties,
                embedding: self.embedding,
            }),
        }
    }
}
