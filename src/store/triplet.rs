//! Simple triplet store: named entities joined by described relationships

use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use crate::Result;
use crate::config::StoreConfig;
use crate::storage::repo::{self, ENTITY_COLUMNS, EntityRecord};
use crate::storage::schema::{self, TripletSchema};
use crate::storage::{DbStats, Engine};
use crate::traversal::{self, PathRow};
use super::{GraphStore, row_values};

/// Triplet store backed by an entity table and a relationship table.
pub struct SqlGraphStore {
    engine: Engine,
    schema: TripletSchema,
}

impl SqlGraphStore {
    /// Connect with default table names
    pub fn new(conn_str: &str) -> Result<Self> {
        Self::with_config(&StoreConfig::with_database(conn_str))
    }

    /// Connect, check availability and ensure the tables exist
    pub fn with_config(config: &StoreConfig) -> Result<Self> {
        let schema = TripletSchema::new(&config.entity_table, &config.relationship_table)?;
        let engine = Engine::connect(&config.database, config.pool_recycle(), false)?;
        engine.session(|tx| schema::ensure(tx, &schema.statements()))?;

        tracing::info!(
            "Triplet store ready ({} / {})",
            schema.entities(),
            schema.relationships()
        );
        Ok(Self { engine, schema })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn schema(&self) -> &TripletSchema {
        &self.schema
    }

    // ========== Entity Operations ==========

    /// Fetch an entity by name, creating it when absent
    pub fn get_or_create_entity(&self, name: &str) -> Result<(EntityRecord, bool)> {
        self.engine.session(|tx| self.entity_in(tx, name))
    }

    /// Look up an entity by name
    pub fn find_entity(&self, name: &str) -> Result<Option<EntityRecord>> {
        self.engine.session(|tx| {
            let sql = format!("SELECT {} FROM {} WHERE name = ?1", ENTITY_COLUMNS, self.schema.entities());
            Ok(tx.query_row(&sql, [name], repo::row_to_entity).optional()?)
        })
    }

    fn entity_in(&self, conn: &Connection, name: &str) -> Result<(EntityRecord, bool)> {
        let (rowid, created) = repo::get_or_create(
            conn,
            self.schema.entities(),
            &[("name", Value::Text(name.to_string()))],
            &[],
        )?;
        let sql = format!("SELECT {} FROM {} WHERE rowid = ?1", ENTITY_COLUMNS, self.schema.entities());
        let entity = conn.query_row(&sql, [rowid], repo::row_to_entity)?;
        Ok((entity, created))
    }

    // ========== Triplet Operations ==========

    /// Add a triplet. Re-adding an existing triplet changes nothing.
    pub fn upsert_triplet(&self, subj: &str, rel: &str, obj: &str) -> Result<()> {
        self.engine.session(|tx| {
            let (subject, _) = self.entity_in(tx, subj)?;
            let (object, _) = self.entity_in(tx, obj)?;
            let (_, created) = repo::get_or_create(
                tx,
                self.schema.relationships(),
                &[
                    ("description", Value::Text(rel.to_string())),
                    ("subject_id", Value::Integer(subject.id)),
                    ("object_id", Value::Integer(object.id)),
                ],
                &[],
            )?;
            tracing::debug!(subj, rel, obj, created, "Upserted triplet");
            Ok(())
        })
    }

    /// `[description, object]` pairs of every relation whose subject is `subj`
    pub fn get(&self, subj: &str) -> Result<Vec<[String; 2]>> {
        let e = self.schema.entities();
        let r = self.schema.relationships();
        let sql = format!(
            "SELECT r.description, o.name
             FROM {r} r
             JOIN {e} s ON r.subject_id = s.id
             JOIN {e} o ON r.object_id = o.id
             WHERE s.name = ?1
             ORDER BY r.id"
        );

        self.engine.session(|tx| {
            let mut stmt = tx.prepare(&sql)?;
            let rels = stmt
                .query_map([subj], |row| Ok([row.get(0)?, row.get(1)?]))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rels)
        })
    }

    /// Depth-aware rel map: each seed name mapped to the triplets reachable
    /// from it within `depth` hops, at most `limit` rows in total.
    ///
    /// Seeds with nothing reachable are absent from the map.
    pub fn get_rel_map(
        &self,
        subjs: Option<&[String]>,
        depth: u32,
        limit: usize,
    ) -> Result<HashMap<String, Vec<[String; 3]>>> {
        let Some(subjs) = subjs.filter(|s| !s.is_empty()) else {
            return Ok(HashMap::new());
        };

        let sql = traversal::triplet_depth_query(&self.schema, subjs.len());
        let mut params: Vec<Value> = subjs.iter().map(|s| Value::Text(s.clone())).collect();
        params.push(Value::Integer(i64::from(depth)));
        params.push(Value::Integer(repo::sql_limit(limit)));

        let rows = self.engine.session(|tx| {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    let depth: i64 = row.get(0)?;
                    let subject: String = row.get(1)?;
                    let description: String = row.get(2)?;
                    let object: String = row.get(3)?;
                    Ok(PathRow {
                        depth: depth as u32,
                        source: subject.clone(),
                        target: object.clone(),
                        triplet: [subject, description, object],
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        tracing::debug!(seeds = subjs.len(), depth, limit, rows = rows.len(), "Expanded rel map");
        Ok(traversal::build_rel_map(rows))
    }

    /// Delete a triplet, then delete subject and object if no relation
    /// references them any more. Each phase commits on its own.
    pub fn delete(&self, subj: &str, rel: &str, obj: &str) -> Result<()> {
        let e = self.schema.entities();
        let r = self.schema.relationships();

        let deleted = self.engine.session(|tx| {
            let sql = format!(
                "DELETE FROM {r}
                 WHERE description = ?1
                   AND subject_id IN (SELECT id FROM {e} WHERE name = ?2)
                   AND object_id IN (SELECT id FROM {e} WHERE name = ?3)"
            );
            Ok(tx.execute(&sql, params![rel, subj, obj])?)
        })?;

        tracing::debug!(subj, rel, obj, deleted, "Deleted triplet");
        if deleted == 0 {
            return Ok(());
        }

        self.engine.session(|tx| {
            for name in [subj, obj] {
                if !self.entity_is_referenced(tx, name)? {
                    tx.execute(&format!("DELETE FROM {e} WHERE name = ?1"), [name])?;
                    tracing::debug!(entity = name, "Deleted orphaned entity");
                }
            }
            Ok(())
        })
    }

    fn entity_is_referenced(&self, conn: &Connection, name: &str) -> Result<bool> {
        let e = self.schema.entities();
        let r = self.schema.relationships();
        let sql = format!(
            "SELECT EXISTS (
                SELECT 1 FROM {r}
                WHERE subject_id IN (SELECT id FROM {e} WHERE name = ?1)
                   OR object_id IN (SELECT id FROM {e} WHERE name = ?1)
             )"
        );
        let referenced: bool = conn.query_row(&sql, [name], |row| row.get(0))?;
        Ok(referenced)
    }

    /// Run an arbitrary statement with positional parameters
    pub fn query(&self, statement: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        self.engine.session(|tx| {
            let mut stmt = tx.prepare(statement)?;
            let width = stmt.column_count();
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| row_values(row, width))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        self.engine.session(|tx| {
            Ok(DbStats {
                nodes: repo::count_rows(tx, self.schema.entities())?,
                relations: repo::count_rows(tx, self.schema.relationships())?,
                embeddings: 0,
            })
        })
    }
}

impl GraphStore for SqlGraphStore {
    fn upsert_triplet(&self, subj: &str, rel: &str, obj: &str) -> Result<()> {
        SqlGraphStore::upsert_triplet(self, subj, rel, obj)
    }

    fn get(&self, subj: &str) -> Result<Vec<[String; 2]>> {
        SqlGraphStore::get(self, subj)
    }

    fn get_rel_map(
        &self,
        subjs: Option<&[String]>,
        depth: u32,
        limit: usize,
    ) -> Result<HashMap<String, Vec<[String; 3]>>> {
        SqlGraphStore::get_rel_map(self, subjs, depth, limit)
    }

    fn delete(&self, subj: &str, rel: &str, obj: &str) -> Result<()> {
        SqlGraphStore::delete(self, subj, rel, obj)
    }

    fn query(&self, statement: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        SqlGraphStore::query(self, statement, params)
    }
}
