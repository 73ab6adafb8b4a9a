//! Cosine similarity scoring over the flattened verse index.

use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::corpus::{Verse, VerseIndex};

/// A ranked verse.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub verse: Arc<Verse>,
    /// Cosine similarity in [-1, 1]; 1.0 for keyword matches
    pub score: f32,
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    scaled_cosine(a, l2_norm(a), b)
}

/// Assumes `query_norm` is precomputed so a full scan computes it once.
/// Rounding can overshoot the unit range, so the result is clamped.
fn scaled_cosine(query: &[f32], query_norm: f32, target: &[f32]) -> f32 {
    let denominator = query_norm * l2_norm(target);
    if denominator == 0.0 {
        return 0.0;
    }
    (dot(query, target) / denominator).clamp(-1.0, 1.0)
}

/// Score every verse with an embedding against `query` and keep the best `k`.
///
/// Verses without an embedding, or with one of a different length than the
/// query, are skipped. Equal scores keep corpus order.
pub fn top_k(query: &[f32], index: &VerseIndex, k: usize) -> Vec<SearchHit> {
    if k == 0 {
        return Vec::new();
    }

    let query_norm = l2_norm(query);

    // indexed par_iter collects in input order, so the stable sort below
    // sees corpus order for ties
    let mut hits: Vec<SearchHit> = index
        .verses()
        .par_iter()
        .filter_map(|verse| {
            let embedding = verse.embedding.as_deref()?;
            if embedding.len() != query.len() {
                return None;
            }
            Some(SearchHit {
                verse: Arc::clone(verse),
                score: scaled_cosine(query, query_norm, embedding),
            })
        })
        .collect();

    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(k);
    hits
}
