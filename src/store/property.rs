//! Labelled property graph store
//!
//! Nodes live in `pkg_nodes` and relations in `pkg_relations`. Properties
//! are JSON text and embeddings are `f32` BLOBs of a fixed dimension.

use std::collections::{BTreeSet, HashMap};

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::config::StoreConfig;
use crate::node::{DEFAULT_NODE_LABEL, LabelledNode, Relation, Triplet};
use crate::storage::repo::{self, NODE_COLUMNS, NodeRecord, json_key_path, node_columns, placeholders};
use crate::storage::schema::{self, PropertySchema};
use crate::storage::{DbStats, Engine, vector};
use crate::traversal::{self, PathRow};
use crate::value::{Properties, remove_empty_values};
use crate::{Error, Result};
use super::{PropertyGraphStore, TripletFilter, VectorStoreQuery};

/// Columns preceding the two node blocks in a triplet row
const RELATION_COLUMNS: usize = 2;
const NODE_WIDTH: usize = 8;

/// Property graph store over SQLite.
pub struct SqlPropertyGraphStore {
    engine: Engine,
    schema: PropertySchema,
}

impl SqlPropertyGraphStore {
    /// Connect with the default embedding dimension
    pub fn new(conn_str: &str) -> Result<Self> {
        Self::with_config(&StoreConfig::with_database(conn_str))
    }

    /// Connect, check availability including vector support, and ensure the
    /// tables exist
    pub fn with_config(config: &StoreConfig) -> Result<Self> {
        let schema = PropertySchema::new(config.embedding_dim)?;
        let engine = Engine::connect(&config.database, config.pool_recycle(), true)?;
        engine.session(|tx| schema::ensure(tx, &schema.statements()))?;

        tracing::info!(
            "Property graph store ready ({} / {}, dim {})",
            schema.nodes(),
            schema.relations(),
            schema.embedding_dim()
        );
        Ok(Self { engine, schema })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn schema(&self) -> &PropertySchema {
        &self.schema
    }

    fn check_embedding(&self, embedding: Option<&[f32]>) -> Result<()> {
        match embedding {
            Some(v) if v.len() != self.schema.embedding_dim() => Err(Error::DimensionMismatch {
                expected: self.schema.embedding_dim(),
                actual: v.len(),
            }),
            _ => Ok(()),
        }
    }

    // ========== Node Operations ==========

    /// Fetch a node row by id, creating a bare placeholder when absent
    pub fn get_or_create_node(&self, id: &str) -> Result<(NodeRecord, bool)> {
        self.engine.session(|tx| self.node_in(tx, id))
    }

    /// Raw node row including timestamps
    pub fn find_node(&self, id: &str) -> Result<Option<NodeRecord>> {
        self.engine.session(|tx| {
            let sql = format!("SELECT {} FROM {} WHERE id = ?1", NODE_COLUMNS, self.schema.nodes());
            Ok(tx.query_row(&sql, [id], |row| repo::row_to_node(row, 0)).optional()?)
        })
    }

    fn node_in(&self, conn: &Connection, id: &str) -> Result<(NodeRecord, bool)> {
        let (rowid, created) = repo::get_or_create(
            conn,
            self.schema.nodes(),
            &[("id", Value::Text(id.to_string()))],
            &[],
        )?;
        let sql = format!("SELECT {} FROM {} WHERE rowid = ?1", NODE_COLUMNS, self.schema.nodes());
        let record = conn.query_row(&sql, [rowid], |row| repo::row_to_node(row, 0))?;
        Ok((record, created))
    }

    /// Nodes matching every property and, when given, one of `ids`.
    ///
    /// Without filters every node is returned.
    pub fn get(&self, properties: Option<&Properties>, ids: Option<&[String]>) -> Result<Vec<LabelledNode>> {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(properties) = properties {
            for (key, value) in properties {
                conditions.push("json_extract(properties, ?) = ?".to_string());
                params.push(Value::Text(json_key_path(key)));
                params.push(value.to_sql_value());
            }
        }
        if let Some(ids) = ids.filter(|ids| !ids.is_empty()) {
            conditions.push(format!("id IN ({})", placeholders(ids.len())));
            params.extend(ids.iter().map(|id| Value::Text(id.clone())));
        }

        let mut sql = format!("SELECT {} FROM {}", NODE_COLUMNS, self.schema.nodes());
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY rowid");

        self.engine.session(|tx| {
            let mut stmt = tx.prepare(&sql)?;
            let nodes = stmt
                .query_map(params_from_iter(params.iter()), |row| repo::row_to_node(row, 0))?
                .map(|r| r.map(NodeRecord::into_labelled))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(nodes)
        })
    }

    /// Insert or overwrite nodes by id, according to their variant.
    pub fn upsert_nodes(&self, nodes: &[LabelledNode]) -> Result<()> {
        for node in nodes {
            self.check_embedding(node.embedding())?;
        }

        let table = self.schema.nodes();
        self.engine.session(|tx| {
            for node in nodes {
                let (_, created) = repo::get_or_create(tx, table, &[("id", Value::Text(node.id().to_string()))], &[])?;
                let properties = serde_json::to_string(node.properties())?;
                let embedding = node.embedding().map(vector::encode);

                match node {
                    LabelledNode::Entity(entity) => {
                        tx.execute(
                            &format!("UPDATE {table} SET name = ?1, label = ?2, properties = ?3, embedding = ?4 WHERE id = ?5"),
                            params![entity.name, entity.label, properties, embedding, entity.id()],
                        )?;
                    }
                    LabelledNode::Chunk(chunk) => {
                        tx.execute(
                            &format!("UPDATE {table} SET text = ?1, label = ?2, properties = ?3, embedding = ?4 WHERE id = ?5"),
                            params![chunk.text, chunk.label, properties, embedding, chunk.id],
                        )?;
                    }
                    LabelledNode::Other(other) => {
                        tx.execute(
                            &format!("UPDATE {table} SET label = ?1, properties = ?2, embedding = ?3 WHERE id = ?4"),
                            params![other.label, properties, embedding, other.id],
                        )?;
                    }
                }
                tracing::debug!(id = node.id(), kind = node.kind().as_str(), created, "Upserted node");
            }
            Ok(())
        })
    }

    // ========== Relation Operations ==========

    /// Insert or update relations by `(label, source_id, target_id)`.
    ///
    /// Missing endpoints are created as placeholder nodes first.
    pub fn upsert_relations(&self, relations: &[Relation]) -> Result<()> {
        let table = self.schema.relations();
        self.engine.session(|tx| {
            for relation in relations {
                self.node_in(tx, &relation.source_id)?;
                self.node_in(tx, &relation.target_id)?;

                let (rowid, created) = repo::get_or_create(
                    tx,
                    table,
                    &[
                        ("label", Value::Text(relation.label.clone())),
                        ("source_id", Value::Text(relation.source_id.clone())),
                        ("target_id", Value::Text(relation.target_id.clone())),
                    ],
                    &[],
                )?;
                tx.execute(
                    &format!("UPDATE {table} SET properties = ?1 WHERE rowid = ?2"),
                    params![serde_json::to_string(&relation.properties)?, rowid],
                )?;
                tracing::debug!(
                    label = relation.label.as_str(),
                    source = relation.source_id.as_str(),
                    target = relation.target_id.as_str(),
                    created,
                    "Upserted relation"
                );
            }
            Ok(())
        })
    }

    /// Triplets matching every given filter.
    ///
    /// Returns nothing without touching the database when no filter is set.
    pub fn get_triplets(&self, filter: &TripletFilter) -> Result<Vec<Triplet>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }

        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if !filter.ids.is_empty() {
            let ph = placeholders(filter.ids.len());
            conditions.push(format!("(r.source_id IN ({ph}) OR r.target_id IN ({ph}))"));
            push_texts(&mut params, &filter.ids);
            push_texts(&mut params, &filter.ids);
        }
        for (key, value) in &filter.properties {
            conditions.push(
                "(json_extract(r.properties, ?) = ? \
                  OR json_extract(s.properties, ?) = ? \
                  OR json_extract(t.properties, ?) = ?)"
                    .to_string(),
            );
            for _ in 0..3 {
                params.push(Value::Text(json_key_path(key)));
                params.push(value.to_sql_value());
            }
        }
        if !filter.entity_names.is_empty() {
            let ph = placeholders(filter.entity_names.len());
            conditions.push(format!("(s.name IN ({ph}) OR t.name IN ({ph}))"));
            push_texts(&mut params, &filter.entity_names);
            push_texts(&mut params, &filter.entity_names);
        }
        if !filter.relation_names.is_empty() {
            conditions.push(format!("r.label IN ({})", placeholders(filter.relation_names.len())));
            push_texts(&mut params, &filter.relation_names);
        }

        let sql = format!(
            "SELECT r.label, r.properties, {}, {}
             FROM {} r
             JOIN {} s ON r.source_id = s.id
             JOIN {} t ON r.target_id = t.id
             WHERE {}
             ORDER BY r.id",
            node_columns("s"),
            node_columns("t"),
            self.schema.relations(),
            self.schema.nodes(),
            self.schema.nodes(),
            conditions.join(" AND ")
        );

        self.engine.session(|tx| {
            let mut stmt = tx.prepare(&sql)?;
            let triplets = stmt
                .query_map(params_from_iter(params.iter()), |row| row_to_triplet(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(triplets)
        })
    }

    // ========== Traversal ==========

    fn depth_rows(&self, graph_nodes: &[LabelledNode], depth: u32, limit: usize) -> Result<Vec<PathRow<String, Triplet>>> {
        let sql = traversal::property_depth_query(graph_nodes.len());
        let mut params: Vec<Value> = graph_nodes.iter().map(|n| Value::Text(n.id().to_string())).collect();
        params.push(Value::Integer(i64::from(depth)));
        params.push(Value::Integer(repo::sql_limit(limit)));

        self.engine.session(|tx| {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| {
                    let depth: i64 = row.get(0)?;
                    let triplet = row_to_triplet(row, 1)?;
                    Ok(PathRow {
                        depth: depth as u32,
                        source: triplet.relation.source_id.clone(),
                        target: triplet.relation.target_id.clone(),
                        triplet,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Depth-ordered triplets reachable from `graph_nodes` within `depth`
    /// hops, at most `limit` rows, skipping relations labelled in
    /// `ignore_rels`.
    pub fn get_rel_map(
        &self,
        graph_nodes: &[LabelledNode],
        depth: u32,
        limit: usize,
        ignore_rels: &[String],
    ) -> Result<Vec<Triplet>> {
        if graph_nodes.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.depth_rows(graph_nodes, depth, limit)?;
        tracing::debug!(seeds = graph_nodes.len(), depth, limit, rows = rows.len(), "Expanded rel map");

        Ok(rows
            .into_iter()
            .map(|row| row.triplet)
            .filter(|t| !ignore_rels.contains(&t.relation.label))
            .collect())
    }

    /// Same traversal as [`get_rel_map`](Self::get_rel_map), attributed to
    /// the seed node ids the triplets are reachable from.
    pub fn get_rel_map_by_seed(
        &self,
        graph_nodes: &[LabelledNode],
        depth: u32,
        limit: usize,
        ignore_rels: &[String],
    ) -> Result<HashMap<String, Vec<Triplet>>> {
        if graph_nodes.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = self.depth_rows(graph_nodes, depth, limit)?;
        Ok(traversal::build_rel_map_with(rows, |t: &Triplet| {
            !ignore_rels.contains(&t.relation.label)
        }))
    }

    // ========== Deletion ==========

    /// Delete what the filter selects. Each present filter applies on its own:
    /// - `entity_names`: nodes with those names and their relations
    /// - `ids`: nodes with those ids and their relations
    /// - `relation_names`: relations with those labels
    /// - `properties`: relations and nodes whose properties match every key
    ///
    /// Placeholder endpoints left unreferenced are removed as well.
    pub fn delete(&self, filter: &TripletFilter) -> Result<()> {
        if filter.is_empty() {
            return Ok(());
        }

        self.engine.session(|tx| {
            let mut touched = BTreeSet::new();

            if !filter.entity_names.is_empty() {
                let sql = format!(
                    "SELECT id FROM {} WHERE name IN ({})",
                    self.schema.nodes(),
                    placeholders(filter.entity_names.len())
                );
                let ids = select_ids(tx, &sql, &texts(&filter.entity_names))?;
                self.delete_nodes(tx, &ids, &mut touched)?;
            }

            if !filter.ids.is_empty() {
                self.delete_nodes(tx, &filter.ids, &mut touched)?;
            }

            if !filter.relation_names.is_empty() {
                let condition = format!("label IN ({})", placeholders(filter.relation_names.len()));
                self.delete_relations_where(tx, &condition, &texts(&filter.relation_names), &mut touched)?;
            }

            if !filter.properties.is_empty() {
                let mut params = Vec::new();
                let condition = filter
                    .properties
                    .iter()
                    .map(|(key, value)| {
                        params.push(Value::Text(json_key_path(key)));
                        params.push(value.to_sql_value());
                        "json_extract(properties, ?) = ?"
                    })
                    .collect::<Vec<_>>()
                    .join(" AND ");

                self.delete_relations_where(tx, &condition, &params, &mut touched)?;
                let sql = format!("SELECT id FROM {} WHERE {}", self.schema.nodes(), condition);
                let ids = select_ids(tx, &sql, &params)?;
                self.delete_nodes(tx, &ids, &mut touched)?;
            }

            let removed = self.remove_orphaned_placeholders(tx, &touched)?;
            tracing::debug!(?filter, orphans = removed, "Deleted matching graph data");
            Ok(())
        })
    }

    fn delete_relations_where(
        &self,
        conn: &Connection,
        condition: &str,
        params: &[Value],
        touched: &mut BTreeSet<String>,
    ) -> Result<usize> {
        let table = self.schema.relations();
        let mut stmt = conn.prepare(&format!("SELECT source_id, target_id FROM {table} WHERE {condition}"))?;
        let endpoints = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (source, target) in endpoints {
            touched.insert(source);
            touched.insert(target);
        }

        let deleted = conn.execute(&format!("DELETE FROM {table} WHERE {condition}"), params_from_iter(params.iter()))?;
        Ok(deleted)
    }

    fn delete_nodes(&self, conn: &Connection, ids: &[String], touched: &mut BTreeSet<String>) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let ph = placeholders(ids.len());
        let mut params = texts(ids);
        params.extend(texts(ids));

        self.delete_relations_where(conn, &format!("source_id IN ({ph}) OR target_id IN ({ph})"), &params, touched)?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE id IN ({ph})", self.schema.nodes()),
            params_from_iter(texts(ids).iter()),
        )?;
        tracing::debug!(deleted, "Deleted nodes");
        Ok(())
    }

    /// Remove bare endpoint rows no relation points at any more
    fn remove_orphaned_placeholders(&self, conn: &Connection, candidates: &BTreeSet<String>) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {n}
             WHERE id = ?1
               AND name IS NULL AND text IS NULL AND embedding IS NULL
               AND label = ?2 AND properties = '{{}}'
               AND NOT EXISTS (SELECT 1 FROM {r} WHERE source_id = ?1 OR target_id = ?1)",
            n = self.schema.nodes(),
            r = self.schema.relations(),
        );
        let mut removed = 0;
        for id in candidates {
            removed += conn.execute(&sql, params![id, DEFAULT_NODE_LABEL])?;
        }
        Ok(removed)
    }

    // ========== Queries ==========

    /// Structured queries are not supported by this store
    pub fn structured_query(&self, _query: &str, _params: &[Value]) -> Result<Vec<Vec<Value>>> {
        Err(Error::Unsupported("structured queries are not supported by the property graph store"))
    }

    /// Up to `similarity_top_k` named nodes with an embedding, nearest first,
    /// with their cosine distances
    pub fn vector_query(&self, query: &VectorStoreQuery) -> Result<(Vec<LabelledNode>, Vec<f32>)> {
        self.check_embedding(Some(&query.query_embedding))?;
        if query.similarity_top_k == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        let sql = format!(
            "SELECT * FROM (
                SELECT {NODE_COLUMNS}, {}(embedding, ?1) AS embedding_distance
                FROM {}
                WHERE name IS NOT NULL AND embedding IS NOT NULL
             )
             WHERE embedding_distance IS NOT NULL
             ORDER BY embedding_distance ASC
             LIMIT ?2",
            vector::COSINE_DISTANCE_FN,
            self.schema.nodes(),
        );
        let blob = vector::encode(&query.query_embedding);

        let scored = self.engine.session(|tx| {
            let mut stmt = tx.prepare(&sql)?;
            let scored = stmt
                .query_map(params![blob, repo::sql_limit(query.similarity_top_k)], |row| {
                    let node = repo::row_to_node(row, 0)?;
                    let distance: f64 = row.get(NODE_WIDTH)?;
                    Ok((node.into_labelled(), distance as f32))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(scored)
        })?;

        tracing::debug!(top_k = query.similarity_top_k, hits = scored.len(), "Vector query");
        Ok(scored.into_iter().unzip())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        self.engine.session(|tx| {
            let embeddings: i64 = tx.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE embedding IS NOT NULL", self.schema.nodes()),
                [],
                |row| row.get(0),
            )?;
            Ok(DbStats {
                nodes: repo::count_rows(tx, self.schema.nodes())?,
                relations: repo::count_rows(tx, self.schema.relations())?,
                embeddings: embeddings as usize,
            })
        })
    }
}

fn texts(values: &[String]) -> Vec<Value> {
    values.iter().map(|v| Value::Text(v.clone())).collect()
}

fn push_texts(params: &mut Vec<Value>, values: &[String]) {
    params.extend(values.iter().map(|v| Value::Text(v.clone())));
}

fn select_ids(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params_from_iter(params.iter()), |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

/// Relation label and properties at `offset`, then source and target nodes
fn row_to_triplet(row: &Row, offset: usize) -> rusqlite::Result<Triplet> {
    let label: String = row.get(offset)?;
    let raw: Option<String> = row.get(offset + 1)?;
    let properties = crate::value::decode_properties(raw.as_deref()).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(offset + 1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let source = repo::row_to_node(row, offset + RELATION_COLUMNS)?;
    let target = repo::row_to_node(row, offset + RELATION_COLUMNS + NODE_WIDTH)?;

    let relation = Relation {
        label,
        source_id: source.id.clone(),
        target_id: target.id.clone(),
        properties: remove_empty_values(properties),
    };
    Ok(Triplet::new(source.into_labelled(), relation, target.into_labelled()))
}

impl PropertyGraphStore for SqlPropertyGraphStore {
    fn get(&self, properties: Option<&Properties>, ids: Option<&[String]>) -> Result<Vec<LabelledNode>> {
        SqlPropertyGraphStore::get(self, properties, ids)
    }

    fn get_triplets(&self, filter: &TripletFilter) -> Result<Vec<Triplet>> {
        SqlPropertyGraphStore::get_triplets(self, filter)
    }

    fn get_rel_map(
        &self,
        graph_nodes: &[LabelledNode],
        depth: u32,
        limit: usize,
        ignore_rels: &[String],
    ) -> Result<Vec<Triplet>> {
        SqlPropertyGraphStore::get_rel_map(self, graph_nodes, depth, limit, ignore_rels)
    }

    fn upsert_nodes(&self, nodes: &[LabelledNode]) -> Result<()> {
        SqlPropertyGraphStore::upsert_nodes(self, nodes)
    }

    fn upsert_relations(&self, relations: &[Relation]) -> Result<()> {
        SqlPropertyGraphStore::upsert_relations(self, relations)
    }

    fn delete(&self, filter: &TripletFilter) -> Result<()> {
        SqlPropertyGraphStore::delete(self, filter)
    }

    fn structured_query(&self, query: &str, params: &[Value]) -> Result<Vec<Vec<Value>>> {
        SqlPropertyGraphStore::structured_query(self, query, params)
    }

    fn vector_query(&self, query: &VectorStoreQuery) -> Result<(Vec<LabelledNode>, Vec<f32>)> {
        SqlPropertyGraphStore::vector_query(self, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ChunkNode, EntityNode, GenericNode};
    use crate::value::PropertyValue;

    fn store() -> SqlPropertyGraphStore {
        SqlPropertyGraphStore::new("sqlite::memory:").unwrap()
    }

    fn props(pairs: &[(&str, PropertyValue)]) -> Properties {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn entity(name: &str) -> LabelledNode {
        EntityNode::new(name, "PERSON").into()
    }

    /// Default-dimension embedding pointing along `(x, y)` in its first two axes
    fn embedding(x: f32, y: f32) -> Vec<f32> {
        let mut v = vec![0.0; schema::DEFAULT_EMBEDDING_DIM];
        v[0] = x;
        v[1] = y;
        v
    }

    fn names(triplets: &[Triplet]) -> Vec<String> {
        triplets.iter().map(|t| t.to_string()).collect()
    }

    /// Rows within one depth come back in no particular order
    fn sorted_names(triplets: &[Triplet]) -> Vec<String> {
        let mut names = names(triplets);
        names.sort();
        names
    }

    /// A -knows-> B -knows-> C -knows-> D, A -mentions-> E
    fn chain(store: &SqlPropertyGraphStore) {
        store
            .upsert_nodes(&["A", "B", "C", "D", "E"].map(entity))
            .unwrap();
        store
            .upsert_relations(&[
                Relation::new("knows", "A", "B"),
                Relation::new("knows", "B", "C"),
                Relation::new("knows", "C", "D"),
                Relation::new("mentions", "A", "E"),
            ])
            .unwrap();
    }

    #[test]
    fn test_entity_round_trip() {
        let store = store();
        let node = EntityNode::new("Alice", "PERSON")
            .with_properties(props(&[("age", 30i64.into()), ("city", "Paris".into())]))
            .with_embedding(embedding(1.0, 0.0));
        store.upsert_nodes(&[node.clone().into()]).unwrap();

        let found = store.get(None, Some(&["Alice".to_string()][..])).unwrap();
        assert_eq!(found, vec![LabelledNode::Entity(node)]);
    }

    #[test]
    fn test_chunk_is_read_back_as_chunk() {
        let store = store();
        let chunk = ChunkNode::with_id("c1", "Alice met Bob.");
        store.upsert_nodes(&[chunk.clone().into()]).unwrap();

        let found = store.get(None, Some(&["c1".to_string()][..])).unwrap();
        assert_eq!(found.len(), 1);
        match &found[0] {
            LabelledNode::Chunk(c) => {
                assert_eq!(c.text, "Alice met Bob.");
                assert_eq!(c.id, "c1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_generic_node_is_persisted() {
        let store = store();
        let node = GenericNode::new("g1", "TOPIC").with_properties(props(&[("weight", 2i64.into())]));
        store.upsert_nodes(&[node.into()]).unwrap();

        let record = store.find_node("g1").unwrap().unwrap();
        assert_eq!(record.label, "TOPIC");
        assert_eq!(record.name, None);
        assert_eq!(record.properties["weight"], PropertyValue::Int(2));
    }

    #[test]
    fn test_upsert_overwrites_without_duplicating() {
        let store = store();
        let first = EntityNode::new("Alice", "PERSON").with_properties(props(&[("age", 30i64.into())]));
        let second = EntityNode::new("Alice", "PERSON").with_properties(props(&[("age", 31i64.into())]));
        store.upsert_nodes(&[first.into()]).unwrap();
        store.upsert_nodes(&[second.into()]).unwrap();

        let all = store.get(None, None).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].properties()["age"], PropertyValue::Int(31));
        assert_eq!(store.stats().unwrap().nodes, 1);
    }

    #[test]
    fn test_upsert_refreshes_updated_at() {
        let store = store();
        store.upsert_nodes(&[entity("Alice"), entity("Bob")]).unwrap();
        store.upsert_relations(&[Relation::new("knows", "Alice", "Bob")]).unwrap();
        store
            .engine()
            .session(|tx| {
                for table in ["pkg_nodes", "pkg_relations"] {
                    tx.execute_batch(&format!(
                        "UPDATE {table} SET created_at = '2000-01-01 00:00:00', updated_at = '2000-01-01 00:00:00'"
                    ))?;
                }
                Ok(())
            })
            .unwrap();

        store.upsert_nodes(&[entity("Alice")]).unwrap();
        let alice = store.find_node("Alice").unwrap().unwrap();
        assert!(alice.updated_at > alice.created_at);
        let bob = store.find_node("Bob").unwrap().unwrap();
        assert_eq!(bob.updated_at, bob.created_at);

        store
            .upsert_relations(&[Relation::new("knows", "Alice", "Bob").with_properties(props(&[("since", 2020i64.into())]))])
            .unwrap();
        let (created, updated): (String, String) = store
            .engine()
            .session(|tx| Ok(tx.query_row("SELECT created_at, updated_at FROM pkg_relations", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?))
            .unwrap();
        assert_eq!(created, "2000-01-01 00:00:00");
        assert!(updated > created);
    }

    #[test]
    fn test_get_filters_are_conjunctive() {
        let store = store();
        store
            .upsert_nodes(&[
                EntityNode::new("Alice", "PERSON")
                    .with_properties(props(&[("city", "Paris".into()), ("active", true.into())]))
                    .into(),
                EntityNode::new("Bob", "PERSON")
                    .with_properties(props(&[("city", "Paris".into()), ("active", false.into())]))
                    .into(),
                EntityNode::new("Carol", "PERSON")
                    .with_properties(props(&[("city", "Rome".into())]))
                    .into(),
            ])
            .unwrap();

        let paris = props(&[("city", "Paris".into())]);
        assert_eq!(store.get(Some(&paris), None).unwrap().len(), 2);

        let active = props(&[("city", "Paris".into()), ("active", true.into())]);
        let found = store.get(Some(&active), None).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "Alice");

        let ids = vec!["Bob".to_string(), "Carol".to_string()];
        let found = store.get(Some(&paris), Some(ids.as_slice())).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "Bob");

        assert_eq!(store.get(None, Some(&[][..])).unwrap().len(), 3);
    }

    #[test]
    fn test_empty_property_values_are_dropped_on_read() {
        let store = store();
        let node = EntityNode::new("Alice", "PERSON")
            .with_properties(props(&[("note", "".into()), ("missing", PropertyValue::Null), ("age", 3i64.into())]));
        store.upsert_nodes(&[node.into()]).unwrap();

        let found = store.get(None, None).unwrap();
        assert_eq!(found[0].properties().len(), 1);
        assert!(found[0].properties().contains_key("age"));
    }

    #[test]
    fn test_embedding_dimension_is_checked() {
        let store = store();
        let node = EntityNode::new("Alice", "PERSON").with_embedding(vec![1.0, 0.0]);
        let err = store.upsert_nodes(&[node.into()]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 1536, actual: 2 }));
        assert!(store.get(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_relations_create_placeholder_endpoints() {
        let store = store();
        store
            .upsert_relations(&[Relation::new("knows", "A", "B")])
            .unwrap();

        let a = store.find_node("A").unwrap().unwrap();
        assert_eq!(a.name, None);
        assert_eq!(a.label, DEFAULT_NODE_LABEL);

        let triplets = store.get_triplets(&TripletFilter::new().ids(["A"])).unwrap();
        assert_eq!(names(&triplets), vec!["(A)-[knows]->(B)"]);
        assert_eq!(triplets[0].source.display_name(), "A");
    }

    #[test]
    fn test_relation_upsert_updates_properties() {
        let store = store();
        let since_2020 = props(&[("since", 2020i64.into())]);
        let since_2021 = props(&[("since", 2021i64.into())]);
        store
            .upsert_relations(&[Relation::new("knows", "A", "B").with_properties(since_2020)])
            .unwrap();
        store
            .upsert_relations(&[Relation::new("knows", "A", "B").with_properties(since_2021)])
            .unwrap();

        assert_eq!(store.stats().unwrap().relations, 1);
        let triplets = store.get_triplets(&TripletFilter::new().relation_names(["knows"])).unwrap();
        assert_eq!(triplets[0].relation.properties["since"], PropertyValue::Int(2021));
    }

    #[test]
    fn test_get_triplets_without_filters_is_empty() {
        let store = store();
        chain(&store);
        assert!(store.get_triplets(&TripletFilter::new()).unwrap().is_empty());
    }

    #[test]
    fn test_get_triplets_by_each_filter() {
        let store = store();
        chain(&store);

        let by_name = store.get_triplets(&TripletFilter::new().entity_names(["C"])).unwrap();
        assert_eq!(sorted_names(&by_name), vec!["(B)-[knows]->(C)", "(C)-[knows]->(D)"]);

        let by_label = store.get_triplets(&TripletFilter::new().relation_names(["mentions"])).unwrap();
        assert_eq!(names(&by_label), vec!["(A)-[mentions]->(E)"]);

        let combined = store
            .get_triplets(&TripletFilter::new().ids(["A"]).relation_names(["knows"]))
            .unwrap();
        assert_eq!(names(&combined), vec!["(A)-[knows]->(B)"]);
    }

    #[test]
    fn test_get_triplets_property_matches_relation_or_endpoint() {
        let store = store();
        store
            .upsert_nodes(&[
                EntityNode::new("A", "PERSON").with_properties(props(&[("team", "red".into())])).into(),
                entity("B"),
                entity("C"),
            ])
            .unwrap();
        store
            .upsert_relations(&[
                Relation::new("knows", "A", "B"),
                Relation::new("knows", "B", "C").with_properties(props(&[("team", "red".into())])),
                Relation::new("likes", "C", "B"),
            ])
            .unwrap();

        let found = store.get_triplets(&TripletFilter::new().property("team", "red")).unwrap();
        assert_eq!(names(&found), vec!["(A)-[knows]->(B)", "(B)-[knows]->(C)"]);
    }

    #[test]
    fn test_rel_map_depth_and_ignored_labels() {
        let store = store();
        chain(&store);
        let seeds = [entity("A")];

        let depth_two = store.get_rel_map(&seeds, 2, 30, &[]).unwrap();
        assert_eq!(
            sorted_names(&depth_two),
            vec!["(A)-[knows]->(B)", "(A)-[mentions]->(E)", "(B)-[knows]->(C)"]
        );

        let ignored = store.get_rel_map(&seeds, 2, 30, &["mentions".to_string()]).unwrap();
        assert_eq!(sorted_names(&ignored), vec!["(A)-[knows]->(B)", "(B)-[knows]->(C)"]);

        let depth_one = store.get_rel_map(&seeds, 1, 30, &[]).unwrap();
        assert_eq!(depth_one.len(), 2);

        let limited = store.get_rel_map(&seeds, 3, 1, &[]).unwrap();
        assert_eq!(limited.len(), 1);

        assert!(store.get_rel_map(&[], 2, 30, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_rel_map_by_seed() {
        let store = store();
        chain(&store);

        let map = store
            .get_rel_map_by_seed(&[entity("A"), entity("C")], 2, 30, &["mentions".to_string()])
            .unwrap();
        assert_eq!(names(&map["A"]), vec!["(A)-[knows]->(B)", "(B)-[knows]->(C)"]);
        assert_eq!(names(&map["C"]), vec!["(C)-[knows]->(D)"]);
        assert!(!map.contains_key("E"));
    }

    #[test]
    fn test_delete_by_relation_name_drops_orphaned_placeholders() {
        let store = store();
        store.upsert_nodes(&[entity("A")]).unwrap();
        store
            .upsert_relations(&[Relation::new("knows", "A", "stub"), Relation::new("likes", "A", "B")])
            .unwrap();

        store.delete(&TripletFilter::new().relation_names(["knows"])).unwrap();

        assert!(store.find_node("stub").unwrap().is_none());
        assert!(store.find_node("A").unwrap().is_some());
        assert!(store.find_node("B").unwrap().is_some());
        assert_eq!(store.stats().unwrap().relations, 1);
    }

    #[test]
    fn test_delete_by_entity_name_and_id() {
        let store = store();
        chain(&store);

        store.delete(&TripletFilter::new().entity_names(["B"])).unwrap();
        assert!(store.find_node("B").unwrap().is_none());
        assert!(store.get_triplets(&TripletFilter::new().ids(["A", "C"])).unwrap().iter().all(|t| {
            t.relation.source_id != "B" && t.relation.target_id != "B"
        }));

        store.delete(&TripletFilter::new().ids(["E"])).unwrap();
        assert!(store.find_node("E").unwrap().is_none());
        assert_eq!(store.stats().unwrap().relations, 1);
    }

    #[test]
    fn test_delete_by_properties() {
        let store = store();
        store
            .upsert_nodes(&[
                EntityNode::new("A", "PERSON").with_properties(props(&[("doc", "d1".into())])).into(),
                entity("B"),
            ])
            .unwrap();
        store
            .upsert_relations(&[
                Relation::new("knows", "B", "x").with_properties(props(&[("doc", "d1".into())])),
                Relation::new("knows", "B", "y"),
            ])
            .unwrap();

        store.delete(&TripletFilter::new().property("doc", "d1")).unwrap();

        assert!(store.find_node("A").unwrap().is_none());
        assert!(store.find_node("x").unwrap().is_none());
        assert!(store.find_node("y").unwrap().is_some());
        assert_eq!(store.stats().unwrap().relations, 1);
    }

    #[test]
    fn test_delete_without_filters_is_noop() {
        let store = store();
        chain(&store);
        store.delete(&TripletFilter::new()).unwrap();
        assert_eq!(store.stats().unwrap().relations, 4);
    }

    #[test]
    fn test_vector_query_orders_by_distance() {
        let store = store();
        store
            .upsert_nodes(&[
                EntityNode::new("east", "DIR").with_embedding(embedding(1.0, 0.0)).into(),
                EntityNode::new("north", "DIR").with_embedding(embedding(0.0, 1.0)).into(),
                EntityNode::new("northeast", "DIR").with_embedding(embedding(0.7, 0.7)).into(),
                entity("plain"),
                ChunkNode::with_id("c1", "text").with_embedding(embedding(1.0, 0.0)).into(),
            ])
            .unwrap();

        let query = VectorStoreQuery::new(embedding(1.0, 0.1), 2);
        let (nodes, scores) = store.vector_query(&query).unwrap();

        let ids: Vec<&str> = nodes.iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["east", "northeast"]);
        assert_eq!(scores.len(), 2);
        assert!(scores[0] < scores[1]);

        let (all, _) = store.vector_query(&VectorStoreQuery::new(embedding(1.0, 0.0), 10)).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(store.stats().unwrap().embeddings, 4);
    }

    #[test]
    fn test_vector_query_edge_cases() {
        let store = store();
        store
            .upsert_nodes(&[EntityNode::new("east", "DIR").with_embedding(embedding(1.0, 0.0)).into()])
            .unwrap();

        let (nodes, scores) = store.vector_query(&VectorStoreQuery::new(embedding(1.0, 0.0), 0)).unwrap();
        assert!(nodes.is_empty() && scores.is_empty());

        let err = store.vector_query(&VectorStoreQuery::new(vec![1.0], 3)).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
    }

    #[test]
    fn test_custom_dimension() {
        let mut config = StoreConfig::with_database(":memory:");
        config.embedding_dim = 3;
        let store = SqlPropertyGraphStore::with_config(&config).unwrap();
        store
            .upsert_nodes(&[EntityNode::new("a", "X").with_embedding(vec![0.0, 0.0, 1.0]).into()])
            .unwrap();

        let (nodes, scores) = store.vector_query(&VectorStoreQuery::new(vec![0.0, 0.0, 2.0], 1)).unwrap();
        assert_eq!(nodes[0].id(), "a");
        assert!(scores[0].abs() < 1e-6);
    }

    #[test]
    fn test_trait_capabilities() {
        let store = store();
        let dyn_store: &dyn PropertyGraphStore = &store;
        assert!(!dyn_store.supports_structured_queries());
        assert!(dyn_store.supports_vector_queries());
        assert!(matches!(dyn_store.structured_query("MATCH (n) RETURN n", &[]), Err(Error::Unsupported(_))));
    }
}
