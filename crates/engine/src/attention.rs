//! Attention retrieval: rank stored records by similarity to a query and
//! blend their remembered outputs with the linear baseline.

use crate::error::EngineError;
use mnemo_memory::math;
use mnemo_memory::{MemoryRecord, MemoryStore};

/// How many records participate in a blend (capped by the store length).
pub const ATTENTION_TOP_K: usize = 3;

/// Fraction of the final output taken from the linear baseline; the rest
/// comes from the memory blend.
pub const LINEAR_BLEND_WEIGHT: f32 = 0.5;

/// Select the `k` records most similar to `query`, scored by negated L2
/// distance (equivalent to cosine ranking once embeddings are unit-norm).
///
/// Single insertion pass, O(len * k) — no full sort. Ties break toward the
/// earliest-inserted record: a later candidate must score strictly higher to
/// displace an earlier one.
pub fn top_k<'a>(
    store: &'a MemoryStore,
    query: &[f32],
    k: usize,
) -> Result<Vec<(&'a MemoryRecord, f32)>, EngineError> {
    let k = k.min(store.len());
    let mut selected: Vec<(&MemoryRecord, f32)> = Vec::with_capacity(k);

    for record in store.iter() {
        let score = -math::l2_distance(query, &record.embedding)?;
        let pos = selected.iter().position(|&(_, s)| score > s);
        match pos {
            Some(p) => {
                selected.insert(p, (record, score));
                selected.truncate(k);
            }
            None => {
                if selected.len() < k {
                    selected.push((record, score));
                }
            }
        }
    }

    Ok(selected)
}

/// Blend the selected records' outputs into the linear baseline.
///
/// Each record is weighted by `max(score, 0)`; since scores are negated
/// distances this is zero except on an exact hit, and the documented
/// fallback — uniform weights over the top-k — carries the usual case.
/// Indices beyond the memory width keep the baseline value alone.
pub fn blend(linear_out: &[f32], selected: &[(&MemoryRecord, f32)]) -> Vec<f32> {
    if selected.is_empty() {
        return linear_out.to_vec();
    }

    let mut weights: Vec<f32> = selected.iter().map(|&(_, s)| s.max(0.0)).collect();
    let sum: f32 = weights.iter().sum();
    if sum <= 0.0 {
        for w in weights.iter_mut() {
            *w = 1.0;
        }
    }
    let sum: f32 = weights.iter().sum();

    let memory_width = selected[0].0.output.len();
    let mut out = linear_out.to_vec();
    for (j, cell) in out.iter_mut().enumerate() {
        if j >= memory_width {
            break;
        }
        let blended: f32 = selected
            .iter()
            .zip(weights.iter())
            .map(|(&(record, _), w)| w * record.output[j])
            .sum::<f32>()
            / sum;
        *cell = LINEAR_BLEND_WEIGHT * *cell + (1.0 - LINEAR_BLEND_WEIGHT) * blended;
    }
    out
}
