//! Graph stores over the relational backend
//!
//! - [`SqlGraphStore`]: subject-relation-object triplets keyed by entity name
//! - [`SqlPropertyGraphStore`]: labelled nodes, typed relations, properties
//!   and embeddings
//!
//! The traits are the seams a retrieval framework programs against.

pub mod property;
pub mod triplet;

use std::collections::HashMap;

use rusqlite::types::Value;
use crate::Result;
use crate::node::{LabelledNode, Relation, Triplet};
use crate::value::{Properties, PropertyValue};

pub use property::SqlPropertyGraphStore;
pub use triplet::SqlGraphStore;

/// Simple triplet graph store
pub trait GraphStore {
    /// Add a triplet, creating both entities when missing
    fn upsert_triplet(&self, subj: &str, rel: &str, obj: &str) -> Result<()>;

    /// `[relation, object]` pairs for a subject
    fn get(&self, subj: &str) -> Result<Vec<[String; 2]>>;

    /// Depth-aware rel map keyed by seed name
    fn get_rel_map(
        &self,
        subjs: Option<&[String]>,
        depth: u32,
        limit: usize,
    ) -> Result<HashMap<String, Vec<[String; 3]>>>;

    /// Delete a triplet and any entity it leaves unreferenced
    fn delete(&self, subj: &str, rel: &str, obj: &str) -> Result<()>;

    /// Run a raw statement
    fn query(&self, statement: &str, params: &[Value]) -> Result<Vec<Vec<Value>>>;
}

/// Labelled property graph store
pub trait PropertyGraphStore {
    fn supports_structured_queries(&self) -> bool {
        false
    }

    fn supports_vector_queries(&self) -> bool {
        true
    }

    fn get(&self, properties: Option<&Properties>, ids: Option<&[String]>) -> Result<Vec<LabelledNode>>;

    fn get_triplets(&self, filter: &TripletFilter) -> Result<Vec<Triplet>>;

    fn get_rel_map(
        &self,
        graph_nodes: &[LabelledNode],
        depth: u32,
        limit: usize,
        ignore_rels: &[String],
    ) -> Result<Vec<Triplet>>;

    fn upsert_nodes(&self, nodes: &[LabelledNode]) -> Result<()>;

    fn upsert_relations(&self, relations: &[Relation]) -> Result<()>;

    fn delete(&self, filter: &TripletFilter) -> Result<()>;

    fn structured_query(&self, query: &str, params: &[Value]) -> Result<Vec<Vec<Value>>>;

    fn vector_query(&self, query: &VectorStoreQuery) -> Result<(Vec<LabelledNode>, Vec<f32>)>;
}

/// Selection for `get_triplets` and `delete`. Absent filters are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripletFilter {
    pub entity_names: Vec<String>,
    pub relation_names: Vec<String>,
    pub properties: Properties,
    pub ids: Vec<String>,
}

impl TripletFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn relation_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.relation_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// True when no filter is set
    pub fn is_empty(&self) -> bool {
        self.entity_names.is_empty()
            && self.relation_names.is_empty()
            && self.properties.is_empty()
            && self.ids.is_empty()
    }
}

/// Nearest-neighbor request over node embeddings
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStoreQuery {
    pub query_embedding: Vec<f32>,
    pub similarity_top_k: usize,
}

impl VectorStoreQuery {
    pub fn new(query_embedding: Vec<f32>, similarity_top_k: usize) -> Self {
        Self { query_embedding, similarity_top_k }
    }
}

/// Convert a result row into owned SQL values
pub(crate) fn row_values(row: &rusqlite::Row, width: usize) -> rusqlite::Result<Vec<Value>> {
    (0..width).map(|i| row.get::<_, Value>(i)).collect()
}
