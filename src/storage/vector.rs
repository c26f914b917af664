//! Embedding vectors stored as little-endian `f32` BLOBs
//!
//! Cosine distance is exposed to SQL as `vec_cosine_distance(a, b)` so that
//! nearest-neighbor ordering and `LIMIT` stay inside the query.

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;

pub const COSINE_DISTANCE_FN: &str = "vec_cosine_distance";
pub const DIMS_FN: &str = "vec_dims";

pub fn encode(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

pub fn decode(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance in `[0, 2]`; `None` for mismatched or zero vectors
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        None
    } else {
        Some(1.0 - dot / (norm_a * norm_b))
    }
}

/// Register the vector SQL functions on a connection
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;

    conn.create_scalar_function(COSINE_DISTANCE_FN, 2, flags, |ctx| {
        let a: Option<Vec<u8>> = ctx.get(0)?;
        let b: Option<Vec<u8>> = ctx.get(1)?;
        Ok(match (a, b) {
            (Some(a), Some(b)) => cosine_distance(&decode(&a), &decode(&b)),
            _ => None,
        })
    })?;

    conn.create_scalar_function(DIMS_FN, 1, flags, |ctx| {
        let v: Option<Vec<u8>> = ctx.get(0)?;
        Ok(v.map(|blob| (blob.len() / 4) as i64))
    })?;

    Ok(())
}
