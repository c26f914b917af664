//! Storage Layer - SQLite-backed persistence
//!
//! Simple triplet store tables (names configurable):
//! - entities(id, name, created_at, updated_at)
//! - relationships(id, description, subject_id, object_id, created_at, updated_at)
//!
//! Property graph store tables (names fixed):
//! - pkg_nodes(id, text, name, label, properties, embedding, created_at, updated_at)
//! - pkg_relations(id, label, source_id, target_id, properties, created_at, updated_at)

pub mod engine;
pub mod repo;
pub mod schema;
pub mod vector;

pub use engine::{ConnectionTarget, Engine};
pub use repo::{EntityRecord, NodeRecord};
pub use schema::{PropertySchema, TripletSchema};

/// Row counts of a store's tables
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DbStats {
    pub nodes: usize,
    pub relations: usize,
    pub embeddings: usize,
}

impl std::fmt::Display for DbStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Nodes: {}", self.nodes)?;
        writeln!(f, "  Relations: {}", self.relations)?;
        writeln!(f, "  Embeddings: {}", self.embeddings)
    }
}
