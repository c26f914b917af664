//! Terminal presentation for the CLI

pub mod icons;
pub mod output;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{dim, error, header, info, muted, section, success, triplet_line, warn};
pub use table::{TableBuilder, node_table, rel_map_table, stats_table, triplet_table};
pub use theme::{Theme, theme};
