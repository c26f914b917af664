//! Depth-bounded traversal
//!
//! A single recursive query expands the neighborhood of the seed nodes:
//! the base case selects every relation leaving a seed (depth 1), the
//! recursive step follows the frontier's target into further relations
//! while `depth < D`, and the result is ordered by depth and capped.
//!
//! The store returns a flat, depth-tagged stream that is not grouped by
//! seed. [`build_rel_map`] recovers per-seed attribution in one forward
//! pass with a reverse index `(node, depth) -> {seeds}`. The pass relies on
//! rows arriving in non-decreasing depth order, so rows are stably sorted
//! by depth before it runs.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::storage::repo::{node_columns, placeholders};
use crate::storage::schema::{PROPERTY_NODE_TABLE, PROPERTY_RELATION_TABLE, TripletSchema};

pub const DEFAULT_DEPTH: u32 = 2;
pub const DEFAULT_LIMIT: usize = 30;

/// One row of the flattened traversal result
#[derive(Debug, Clone, PartialEq)]
pub struct PathRow<K, T> {
    /// Hops from the seed that opened this path, starting at 1
    pub depth: u32,
    pub source: K,
    pub target: K,
    pub triplet: T,
}

/// Seed identity to the triplets reachable from it, in traversal order
pub type RelMap<K, T> = HashMap<K, Vec<T>>;

/// Attribute every row to the seeds it is reachable from.
pub fn build_rel_map<K, T>(rows: Vec<PathRow<K, T>>) -> RelMap<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
{
    build_rel_map_with(rows, |_| true)
}

/// Like [`build_rel_map`], but only triplets passing `keep` are recorded.
///
/// Rejected rows still extend reachability, so paths continuing beyond
/// them are attributed as usual.
pub fn build_rel_map_with<K, T, F>(mut rows: Vec<PathRow<K, T>>, keep: F) -> RelMap<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone,
    F: Fn(&T) -> bool,
{
    rows.sort_by_key(|row| row.depth);

    let mut rel_map: RelMap<K, T> = HashMap::new();
    let mut reached: HashMap<(K, u32), HashSet<K>> = HashMap::new();

    for row in rows {
        let visible = keep(&row.triplet);

        if row.depth <= 1 {
            if visible {
                rel_map.entry(row.source.clone()).or_default().push(row.triplet);
            }
            reached.entry((row.target, 1)).or_default().insert(row.source);
            continue;
        }

        let seeds: Vec<K> = match reached.get(&(row.source, row.depth - 1)) {
            Some(seeds) => seeds.iter().cloned().collect(),
            None => {
                tracing::trace!("Row at depth {} has no attributed source, skipping", row.depth);
                continue;
            }
        };

        if visible {
            for seed in &seeds {
                rel_map.entry(seed.clone()).or_default().push(row.triplet.clone());
            }
        }
        reached.entry((row.target, row.depth)).or_default().extend(seeds);
    }

    rel_map
}

/// Recursive query for the simple triplet store.
///
/// Parameters: `seed_count` entity names, then depth, then limit.
/// Columns: depth, subject name, description, object name.
pub fn triplet_depth_query(schema: &TripletSchema, seed_count: usize) -> String {
    let e = schema.entities();
    let r = schema.relationships();
    let seeds = placeholders(seed_count);
    format!(
        r#"
WITH RECURSIVE path(depth, subject_id, object_id, description) AS (
    SELECT 1, r.subject_id, r.object_id, r.description
    FROM {r} r
    WHERE r.subject_id IN (SELECT id FROM {e} WHERE name IN ({seeds}))
    UNION ALL
    SELECT p.depth + 1, r.subject_id, r.object_id, r.description
    FROM path p
    JOIN {r} r ON p.object_id = r.subject_id
    WHERE p.depth < ?
)
SELECT p.depth, e1.name, p.description, e2.name
FROM path p
JOIN {e} e1 ON p.subject_id = e1.id
JOIN {e} e2 ON p.object_id = e2.id
ORDER BY p.depth
LIMIT ?
"#
    )
}

/// Recursive query for the property graph store.
///
/// Parameters: `seed_count` node ids, then depth, then limit.
/// Columns: depth, relation label, relation properties, then the source
/// node and the target node in `NODE_COLUMNS` layout.
pub fn property_depth_query(seed_count: usize) -> String {
    let n = PROPERTY_NODE_TABLE;
    let r = PROPERTY_RELATION_TABLE;
    let seeds = placeholders(seed_count);
    let source_columns = node_columns("e1");
    let target_columns = node_columns("e2");
    format!(
        r#"
WITH RECURSIVE path(depth, source_id, target_id, label, properties) AS (
    SELECT 1, r.source_id, r.target_id, r.label, r.properties
    FROM {r} r
    WHERE r.source_id IN ({seeds})
    UNION ALL
    SELECT p.depth + 1, r.source_id, r.target_id, r.label, r.properties
    FROM path p
    JOIN {r} r ON p.target_id = r.source_id
    WHERE p.depth < ?
)
SELECT p.depth, p.label, p.properties, {source_columns}, {target_columns}
FROM path p
JOIN {n} e1 ON p.source_id = e1.id
JOIN {n} e2 ON p.target_id = e2.id
ORDER BY p.depth
LIMIT ?
"#
    )
}
