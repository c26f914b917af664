use std::collections::HashMap;

use tabled::{Table, Tabled, settings::Style};

use crate::node::{LabelledNode, Triplet};
use crate::storage::DbStats;
use crate::value::Properties;

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn stats_table(stats: &DbStats) -> String {
    let mut builder = TableBuilder::new();
    builder.add_row("Nodes", &stats.nodes.to_string());
    builder.add_row("Relations", &stats.relations.to_string());
    builder.add_row("Embeddings", &stats.embeddings.to_string());
    builder.build()
}

#[derive(Tabled)]
struct TripletRow {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Relation")]
    relation: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Properties")]
    properties: String,
}

pub fn triplet_table(triplets: &[Triplet]) -> String {
    let rows: Vec<TripletRow> = triplets
        .iter()
        .map(|t| TripletRow {
            source: t.source.display_name().to_string(),
            relation: t.relation.label.clone(),
            target: t.target.display_name().to_string(),
            properties: format_properties(&t.relation.properties),
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Properties")]
    properties: String,
    #[tabled(rename = "Embedding")]
    embedding: String,
}

pub fn node_table(nodes: &[LabelledNode], scores: Option<&[f32]>) -> String {
    let rows: Vec<NodeRow> = nodes
        .iter()
        .enumerate()
        .map(|(i, node)| NodeRow {
            id: node.id().to_string(),
            kind: node.kind().to_string(),
            label: node.label().to_string(),
            properties: format_properties(node.properties()),
            embedding: match (scores.and_then(|s| s.get(i)), node.embedding()) {
                (Some(score), _) => format!("distance {:.4}", score),
                (None, Some(v)) => format!("{} dims", v.len()),
                (None, None) => "-".to_string(),
            },
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

#[derive(Tabled)]
struct RelMapRow {
    #[tabled(rename = "Seed")]
    seed: String,
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Relation")]
    relation: String,
    #[tabled(rename = "Object")]
    object: String,
}

/// One row per reachable triplet, seeds in name order
pub fn rel_map_table(rel_map: &HashMap<String, Vec<[String; 3]>>) -> String {
    let mut seeds: Vec<&String> = rel_map.keys().collect();
    seeds.sort();

    let rows: Vec<RelMapRow> = seeds
        .into_iter()
        .flat_map(|seed| {
            rel_map[seed].iter().map(move |[subject, relation, object]| RelMapRow {
                seed: seed.clone(),
                subject: subject.clone(),
                relation: relation.clone(),
                object: object.clone(),
            })
        })
        .collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

fn format_properties(properties: &Properties) -> String {
    properties
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{EntityNode, Relation};

    #[test]
    fn test_stats_table() {
        let table = stats_table(&DbStats { nodes: 3, relations: 2, embeddings: 0 });
        assert!(table.contains("Nodes"));
        assert!(table.contains("Relations"));
        assert!(table.contains('3'));
    }

    #[test]
    fn test_triplet_table_shows_properties() {
        let mut properties = Properties::new();
        properties.insert("since".into(), 2020i64.into());
        let triplet = Triplet::new(
            EntityNode::new("Alice", "PERSON").into(),
            Relation::new("knows", "Alice", "Bob").with_properties(properties),
            EntityNode::new("Bob", "PERSON").into(),
        );
        let table = triplet_table(&[triplet]);
        assert!(table.contains("Alice"));
        assert!(table.contains("since=2020"));
    }

    #[test]
    fn test_rel_map_table_orders_seeds() {
        let mut map = HashMap::new();
        map.insert("B".to_string(), vec![["B".to_string(), "r".to_string(), "C".to_string()]]);
        map.insert("A".to_string(), vec![["A".to_string(), "r".to_string(), "B".to_string()]]);
        let table = rel_map_table(&map);
        let a = table.find("│ A").unwrap();
        let b = table.find("│ B").unwrap();
        assert!(a < b);
    }

    #[test]
    fn test_node_table_prefers_scores() {
        let node: LabelledNode = EntityNode::new("Alice", "PERSON").with_embedding(vec![1.0, 0.0]).into();
        assert!(node_table(std::slice::from_ref(&node), None).contains("2 dims"));
        assert!(node_table(&[node], Some(&[0.25f32][..])).contains("distance 0.2500"));
    }
}
