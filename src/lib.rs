//! # relgraph - Relational Graph Store
//!
//! Graph storage over a relational engine with recursive queries and
//! vector search.
//!
//! relgraph provides:
//! - A simple subject-relation-object triplet store
//! - A labelled property graph with entity, chunk and generic nodes
//! - Depth-bounded multi-hop traversal reconstructed into per-seed rel-maps
//! - Nearest-neighbor lookup over node embeddings by cosine distance
//! - SQLite-backed storage with foreign-key consistency and orphan cleanup

pub mod value;
pub mod node;
pub mod config;
pub mod storage;
pub mod traversal;
pub mod store;
pub mod ui;

// Re-exports for convenient access
pub use value::{PropertyValue, Properties, remove_empty_values};
pub use node::{ChunkNode, EntityNode, GenericNode, LabelledNode, Relation, Triplet};
pub use config::StoreConfig;
pub use store::{
    GraphStore, PropertyGraphStore, SqlGraphStore, SqlPropertyGraphStore, TripletFilter,
    VectorStoreQuery,
};

/// Result type alias for relgraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for relgraph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Could not connect to the database at {target}. Please check if the connection string and credentials are correct.")]
    InvalidCredentials {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("An error occurred while checking the availability of {target}")]
    Unavailable {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Vector search is not available on {target}: `vec_dims` could not be evaluated")]
    VectorUnsupported {
        target: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid table name: {0:?}")]
    InvalidTableName(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("Database session lock poisoned")]
    SessionPoisoned,
}
