//! Chunk-level hits → entity-level ranking.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::types::{EntityAggregate, ScoredHit};

pub const DEFAULT_TOP_K_SCORES_FOR_MEAN: usize = 5;

struct Accumulator {
    entity_id: String,
    entity_name: String,
    hits: Vec<ScoredHit>,
}

fn by_score_desc(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Mean of the best `min(k, len)` scores of an already descending slice.
fn top_k_mean(ranked: &[ScoredHit], k: usize) -> f32 {
    let take = k.min(ranked.len());
    if take == 0 {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = take as f32;
    ranked[..take].iter().map(|h| h.score).sum::<f32>() / n
}

/// Group `hits` by entity and rank entities by the mean of their best
/// `top_k_scores_for_mean` chunk scores.
///
/// Within an entity, chunks are ordered by score descending and ties keep
/// input order. The entity name is taken from the last hit seen. Entities
/// with equal aggregate scores keep the order in which they first appeared
/// in `hits`. At most `top_n_entities` aggregates are returned.
pub fn aggregate(hits: Vec<ScoredHit>, top_n_entities: usize, top_k_scores_for_mean: usize) -> Vec<EntityAggregate> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Accumulator> = Vec::new();

    for hit in hits {
        let slot = match slots.get(&hit.entity_id) {
            Some(&slot) => slot,
            None => {
                slots.insert(hit.entity_id.clone(), groups.len());
                groups.push(Accumulator { entity_id: hit.entity_id.clone(), entity_name: String::new(), hits: Vec::new() });
                groups.len() - 1
            }
        };
        let group = &mut groups[slot];
        group.entity_name.clone_from(&hit.entity_name);
        group.hits.push(hit);
    }

    let mut entities: Vec<EntityAggregate> = groups
        .into_iter()
        .map(|mut group| {
            group.hits.sort_by(|a, b| by_score_desc(a.score, b.score));
            let score = top_k_mean(&group.hits, top_k_scores_for_mean);
            EntityAggregate { entity_id: group.entity_id, entity_name: group.entity_name, score, ranked_chunks: group.hits }
        })
        .collect();

    entities.sort_by(|a, b| by_score_desc(a.score, b.score));
    entities.truncate(top_n_entities);
    tracing::debug!(entities = entities.len(), "aggregated hits");
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(entity: &str, chunk_index: usize, score: f32) -> ScoredHit {
        ScoredHit {
            entity_id: entity.to_string(),
            entity_name: format!("{entity} name"),
            chunk_index,
            text: format!("{entity} chunk {chunk_index}"),
            score,
        }
    }

    #[test]
    fn mean_of_top_five_scores() {
        let scores = [0.9, 0.8, 0.95, 0.4, 0.3, 0.2];
        let hits = scores.iter().enumerate().map(|(i, &s)| hit("A", i, s)).collect();
        let out = aggregate(hits, 10, DEFAULT_TOP_K_SCORES_FOR_MEAN);
        assert_eq!(out.len(), 1);
        assert!((out[0].score - 0.67).abs() < 1e-6, "score={}", out[0].score);
        let ranked: Vec<f32> = out[0].ranked_chunks.iter().map(|h| h.score).collect();
        assert_eq!(ranked, vec![0.95, 0.9, 0.8, 0.4, 0.3, 0.2]);
    }

    #[test]
    fn fewer_hits_than_k_uses_all() {
        let out = aggregate(vec![hit("A", 0, 0.5), hit("A", 1, 0.7)], 10, 5);
        assert!((out[0].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn sparse_entity_mean_is_not_padded() {
        let hits = vec![hit("single", 0, 0.95), hit("broad", 0, 0.8), hit("broad", 1, 0.8), hit("broad", 2, 0.8)];
        let out = aggregate(hits, 10, 5);
        assert_eq!(out[0].entity_id, "single");
        assert_eq!(out[1].entity_id, "broad");
    }

    #[test]
    fn ranks_entities_and_truncates() {
        let hits = vec![hit("A", 0, 0.2), hit("B", 0, 0.9), hit("C", 0, 0.5), hit("B", 1, 0.7)];
        let out = aggregate(hits, 2, 5);
        let ids: Vec<&str> = out.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);
        assert!(out.windows(2).all(|p| p[0].score >= p[1].score));
    }

    #[test]
    fn equal_scores_keep_first_seen_order() {
        let hits = vec![hit("Z", 0, 0.5), hit("M", 0, 0.5), hit("A", 0, 0.5)];
        let out = aggregate(hits, 10, 5);
        let ids: Vec<&str> = out.iter().map(|e| e.entity_id.as_str()).collect();
        assert_eq!(ids, vec!["Z", "M", "A"]);
    }

    #[test]
    fn equal_chunk_scores_keep_input_order() {
        let out = aggregate(vec![hit("A", 3, 0.5), hit("A", 1, 0.5), hit("A", 2, 0.9)], 10, 5);
        let order: Vec<usize> = out[0].ranked_chunks.iter().map(|h| h.chunk_index).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn last_seen_name_wins() {
        let mut second = hit("A", 1, 0.4);
        second.entity_name = "Renamed".to_string();
        let out = aggregate(vec![hit("A", 0, 0.5), second], 10, 5);
        assert_eq!(out[0].entity_name, "Renamed");
    }

    #[test]
    fn empty_hits_give_empty_ranking() {
        assert!(aggregate(Vec::new(), 5, 5).is_empty());
    }

    #[test]
    fn top_mean_dominates_other_subsets() {
        let scores = [0.31f32, 0.77, 0.12, 0.95, 0.64, 0.58, 0.43];
        let hits: Vec<ScoredHit> = scores.iter().enumerate().map(|(i, &s)| hit("A", i, s)).collect();
        let best = aggregate(hits, 1, 5)[0].score;
        // Any 5 of 7: skip two indices.
        for skip_a in 0..scores.len() {
            for skip_b in (skip_a + 1)..scores.len() {
                let subset: Vec<f32> = scores.iter().enumerate().filter(|(i, _)| *i != skip_a && *i != skip_b).map(|(_, &s)| s).collect();
                let mean = subset.iter().sum::<f32>() / 5.0;
                assert!(best + 1e-6 >= mean);
            }
        }
    }
}
