//! Node and relation types for the labelled property graph
//!
//! Every stored node is one of three variants:
//! - `Entity`: a named real-world concept, identified by its name
//! - `Chunk`: a span of source text, marked by the reserved `text_chunk` label
//! - `Other`: any other labelled node, identified by an explicit id
//!
//! The `label` column is the discriminant when rows are read back.

use crate::value::Properties;
use serde::{Deserialize, Serialize};

/// Reserved label marking content-chunk rows
pub const CHUNK_LABEL: &str = "text_chunk";

/// Storage default for rows created without a label (relation endpoints)
pub const DEFAULT_NODE_LABEL: &str = "node";

/// Default label for entity nodes
pub const DEFAULT_ENTITY_LABEL: &str = "entity";

/// Node variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Entity,
    Chunk,
    Other,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Entity => "entity",
            NodeKind::Chunk => "chunk",
            NodeKind::Other => "other",
        }
    }

    /// Variant a stored row materializes into, decided by its label
    pub fn for_label(label: &str) -> NodeKind {
        if label == CHUNK_LABEL {
            NodeKind::Chunk
        } else {
            NodeKind::Entity
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named entity. Its id is its name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityNode {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl EntityNode {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            properties: Properties::new(),
            embedding: None,
        }
    }

    /// Entity with the default `entity` label
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_ENTITY_LABEL)
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn id(&self) -> &str {
        &self.name
    }
}

/// A span of source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkNode {
    pub id: String,
    pub text: String,
    pub label: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl ChunkNode {
    /// Create a chunk with a fresh random id
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), text)
    }

    pub fn with_id(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            label: CHUNK_LABEL.to_string(),
            properties: Properties::new(),
            embedding: None,
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// Any other labelled node with an explicit id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericNode {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl GenericNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: Properties::new(),
            embedding: None,
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}

/// A node of the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LabelledNode {
    Entity(EntityNode),
    Chunk(ChunkNode),
    Other(GenericNode),
}

impl LabelledNode {
    pub fn id(&self) -> &str {
        match self {
            LabelledNode::Entity(n) => n.id(),
            LabelledNode::Chunk(n) => &n.id,
            LabelledNode::Other(n) => &n.id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            LabelledNode::Entity(n) => &n.label,
            LabelledNode::Chunk(n) => &n.label,
            LabelledNode::Other(n) => &n.label,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            LabelledNode::Entity(_) => NodeKind::Entity,
            LabelledNode::Chunk(_) => NodeKind::Chunk,
            LabelledNode::Other(_) => NodeKind::Other,
        }
    }

    pub fn properties(&self) -> &Properties {
        match self {
            LabelledNode::Entity(n) => &n.properties,
            LabelledNode::Chunk(n) => &n.properties,
            LabelledNode::Other(n) => &n.properties,
        }
    }

    pub fn embedding(&self) -> Option<&[f32]> {
        match self {
            LabelledNode::Entity(n) => n.embedding.as_deref(),
            LabelledNode::Chunk(n) => n.embedding.as_deref(),
            LabelledNode::Other(n) => n.embedding.as_deref(),
        }
    }

    /// Human-readable name: entity name, chunk text or generic id
    pub fn display_name(&self) -> &str {
        match self {
            LabelledNode::Entity(n) => &n.name,
            LabelledNode::Chunk(n) => &n.text,
            LabelledNode::Other(n) => &n.id,
        }
    }
}

impl From<EntityNode> for LabelledNode {
    fn from(node: EntityNode) -> Self {
        LabelledNode::Entity(node)
    }
}

impl From<ChunkNode> for LabelledNode {
    fn from(node: ChunkNode) -> Self {
        LabelledNode::Chunk(node)
    }
}

impl From<GenericNode> for LabelledNode {
    fn from(node: GenericNode) -> Self {
        LabelledNode::Other(node)
    }
}

/// A typed relation between two node ids.
///
/// Logically identified by `(label, source_id, target_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub label: String,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub properties: Properties,
}

impl Relation {
    pub fn new(
        label: impl Into<String>,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }
}

/// `(source, relation, target)` view produced by queries; never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Triplet {
    pub source: LabelledNode,
    pub relation: Relation,
    pub target: LabelledNode,
}

impl Triplet {
    pub fn new(source: LabelledNode, relation: Relation, target: LabelledNode) -> Self {
        Self { source, relation, target }
    }
}

impl std::fmt::Display for Triplet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({})-[{}]->({})",
            self.source.display_name(),
            self.relation.label,
            self.target.display_name()
        )
    }
}
