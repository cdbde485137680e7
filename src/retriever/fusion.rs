use crate::types::SearchResult;
use std::collections::HashMap;

/// Standard RRF constant (60.0 is the commonly used value from the RRF paper)
pub const RRF_K_CONSTANT: f32 = 60.0;

/// Per-method multipliers applied to reciprocal-rank contributions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f32,
    pub keyword: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: 0.7,
            keyword: 0.3,
        }
    }
}

/// Weighted Reciprocal Rank Fusion of vector and keyword rankings
///
/// Each hit contributes `weight / (RRF_K_CONSTANT + rank)` with 1-indexed
/// ranks; contributions for the same chunk id add up. The chunk payload is
/// the one seen first, vector list before keyword list. Ties keep that
/// first-seen order.
pub fn reciprocal_rank_fusion(
    vector_results: &[SearchResult],
    keyword_results: &[SearchResult],
    weights: FusionWeights,
    limit: usize,
) -> Vec<SearchResult> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut fused: Vec<SearchResult> = Vec::new();

    let ranked = [
        (vector_results, weights.vector),
        (keyword_results, weights.keyword),
    ];

    for (results, weight) in ranked {
        for (rank, result) in results.iter().enumerate() {
            let contribution = weight / (RRF_K_CONSTANT + (rank + 1) as f32);
            match positions.get(result.chunk.id.as_str()) {
                Some(&pos) => fused[pos].score += contribution,
                None => {
                    positions.insert(result.chunk.id.as_str(), fused.len());
                    fused.push(SearchResult::new(result.chunk.clone(), contribution));
                }
            }
        }
    }

    // stable: equal scores stay in first-seen order
    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused.truncate(limit);
    fused
}
