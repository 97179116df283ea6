//! Evidence passage assembly for ranked entities.

use crate::types::{EntityAggregate, Evidence, RankedResult};

pub const CONTEXT_SEPARATOR: &str = "\n---\n";
pub const DEFAULT_TOP_M_CHUNKS: usize = 4;

/// Build the externally visible result for one entity from its best
/// `top_m_chunks` chunks, keeping their score order.
pub fn assemble(entity: &EntityAggregate, top_m_chunks: usize) -> RankedResult {
    let top = &entity.ranked_chunks[..top_m_chunks.min(entity.ranked_chunks.len())];
    let context = top.iter().map(|h| h.text.as_str()).collect::<Vec<_>>().join(CONTEXT_SEPARATOR);
    let evidence = top
        .iter()
        .map(|h| Evidence { score: h.score, chunk_index: h.chunk_index, text: h.text.clone() })
        .collect();
    RankedResult {
        entity_id: entity.entity_id.clone(),
        entity_name: entity.entity_name.clone(),
        score: entity.score,
        context,
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::types::ScoredHit;

    fn entity_with(scores: &[f32]) -> EntityAggregate {
        let hits = scores
            .iter()
            .enumerate()
            .map(|(i, &score)| ScoredHit {
                entity_id: "HP:1".to_string(),
                entity_name: "Influenza".to_string(),
                chunk_index: i,
                text: format!("chunk-{i}"),
                score,
            })
            .collect();
        aggregate(hits, 1, 5).remove(0)
    }

    #[test]
    fn keeps_top_four_in_score_order() {
        let entity = entity_with(&[0.1, 0.6, 0.3, 0.9, 0.5, 0.7]);
        let before = entity.clone();
        let result = assemble(&entity, DEFAULT_TOP_M_CHUNKS);

        assert_eq!(result.context, "chunk-3\n---\nchunk-5\n---\nchunk-1\n---\nchunk-4");
        let indices: Vec<usize> = result.evidence.iter().map(|e| e.chunk_index).collect();
        assert_eq!(indices, vec![3, 5, 1, 4]);
        assert!(result.evidence.windows(2).all(|p| p[0].score >= p[1].score));
        assert_eq!(result.score, entity.score);
        assert_eq!(entity, before);
    }

    #[test]
    fn fewer_chunks_than_requested() {
        let result = assemble(&entity_with(&[0.4, 0.8]), 4);
        assert_eq!(result.evidence.len(), 2);
        assert_eq!(result.context, "chunk-1\n---\nchunk-0");
    }

    #[test]
    fn single_chunk_has_no_separator() {
        let result = assemble(&entity_with(&[0.4]), 4);
        assert_eq!(result.context, "chunk-0");
    }
}
