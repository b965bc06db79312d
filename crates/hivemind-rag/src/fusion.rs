//! Score normalization and weighted fusion.
//!
//! Pure functions, no I/O: the search engine feeds them retrieval
//! results and they return a deterministic ranking with stable
//! tie-breaking by note id.

use std::collections::HashMap;

use hivemind_core::NoteId;

/// Diffusion factor for one-hop graph expansion: a neighbour inherits
/// half of its best keyword source's normalised score.
pub const GRAPH_DIFFUSION: f32 = 0.5;

/// The α/β/γ mix over keyword, graph, and vector signals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub keyword: f32,
    pub graph: f32,
    pub vector: f32,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            keyword: 0.6,
            graph: 0.2,
            vector: 0.2,
        }
    }
}

impl FusionWeights {
    /// Fold the vector weight into keyword and graph proportionally,
    /// used when no vector source is configured.
    pub fn without_vector(self) -> Self {
        if self.vector == 0.0 {
            return self;
        }
        let base = self.keyword + self.graph;
        if base <= 0.0 {
            return Self {
                keyword: self.vector,
                graph: 0.0,
                vector: 0.0,
            };
        }
        Self {
            keyword: self.keyword + self.vector * self.keyword / base,
            graph: self.graph + self.vector * self.graph / base,
            vector: 0.0,
        }
    }
}

/// Normalize scores to [0, 1] by the maximum. Empty input stays empty;
/// a non-positive maximum zeroes everything.
pub fn normalize_by_max(scores: &[(NoteId, f32)]) -> Vec<(NoteId, f32)> {
    let max = scores
        .iter()
        .map(|(_, s)| *s)
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() || max <= 0.0 {
        return scores.iter().map(|(id, _)| (id.clone(), 0.0)).collect();
    }
    scores
        .iter()
        .map(|(id, s)| (id.clone(), (s / max).clamp(0.0, 1.0)))
        .collect()
}

/// Combine the three signals into one ranking.
///
/// `keyword` must already be normalised to [0, 1]. `graph` carries the
/// diffusion scores (`GRAPH_DIFFUSION ×` best source), `vector` the
/// normalised dense scores. Output is sorted score-descending with ties
/// broken by id ascending.
pub fn fuse(
    keyword: &[(NoteId, f32)],
    graph: &[(NoteId, f32)],
    vector: &[(NoteId, f32)],
    weights: FusionWeights,
) -> Vec<(NoteId, f32)> {
    let mut combined: HashMap<NoteId, f32> = HashMap::new();
    for (id, s) in keyword {
        *combined.entry(id.clone()).or_insert(0.0) += weights.keyword * s;
    }
    for (id, s) in graph {
        *combined.entry(id.clone()).or_insert(0.0) += weights.graph * s;
    }
    for (id, s) in vector {
        *combined.entry(id.clone()).or_insert(0.0) += weights.vector * s;
    }

    let mut out: Vec<(NoteId, f32)> = combined.into_iter().collect();
    out.sort_by(|(ida, sa), (idb, sb)| {
        match sb.partial_cmp(sa).unwrap_or(std::cmp::Ordering::Equal) {
            std::cmp::Ordering::Equal => ida.cmp(idb),
            other => other,
        }
    });
    out
}

/// One-hop diffusion: every neighbour of a keyword hit receives
/// `GRAPH_DIFFUSION ×` the hit's normalised score; a node reachable from
/// several hits keeps the best.
pub fn diffuse<F>(keyword: &[(NoteId, f32)], mut neighbors: F) -> Vec<(NoteId, f32)>
where
    F: FnMut(&NoteId) -> Vec<NoteId>,
{
    let mut best: HashMap<NoteId, f32> = HashMap::new();
    for (source, score) in keyword {
        let weight = GRAPH_DIFFUSION * score;
        for neighbor in neighbors(source) {
            let entry = best.entry(neighbor).or_insert(0.0);
            if weight > *entry {
                *entry = weight;
            }
        }
    }
    best.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NoteId {
        NoteId::from(s)
    }

    #[test]
    fn normalize_scales_by_the_maximum() {
        let out = normalize_by_max(&[(id("a"), 2.0), (id("c"), 0.8)]);
        assert_eq!(out, vec![(id("a"), 1.0), (id("c"), 0.4)]);
        assert!(normalize_by_max(&[]).is_empty());
    }

    #[test]
    fn fusion_matches_the_worked_example() {
        // A and C are keyword hits (normalised 1.0 and 0.4); B is A's
        // neighbour. With α=0.6, β=0.2, γ=0:
        //   A = 0.60, B = 0.2·0.5·1.0 = 0.10, C = 0.24 → A, C, B.
        let keyword = vec![(id("a"), 1.0), (id("c"), 0.4)];
        let graph = diffuse(&keyword, |source| {
            if *source == id("a") {
                vec![id("b")]
            } else {
                vec![]
            }
        });
        let weights = FusionWeights {
            keyword: 0.6,
            graph: 0.2,
            vector: 0.0,
        };
        let ranked = fuse(&keyword, &graph, &[], weights);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0, id("a"));
        assert!((ranked[0].1 - 0.60).abs() < 1e-6);
        assert_eq!(ranked[1].0, id("c"));
        assert!((ranked[1].1 - 0.24).abs() < 1e-6);
        assert_eq!(ranked[2].0, id("b"));
        assert!((ranked[2].1 - 0.10).abs() < 1e-6);
    }

    #[test]
    fn diffusion_keeps_the_best_source() {
        let keyword = vec![(id("a"), 1.0), (id("c"), 0.4)];
        let graph = diffuse(&keyword, |_| vec![id("b")]);
        assert_eq!(graph, vec![(id("b"), 0.5)]);
    }

    #[test]
    fn ties_break_by_id_ascending() {
        let ranked = fuse(
            &[(id("zeta"), 0.5), (id("alpha"), 0.5)],
            &[],
            &[],
            FusionWeights::default(),
        );
        assert_eq!(ranked[0].0, id("alpha"));
        assert_eq!(ranked[1].0, id("zeta"));
    }

    #[test]
    fn gamma_redistributes_proportionally() {
        let folded = FusionWeights::default().without_vector();
        assert!((folded.keyword - 0.75).abs() < 1e-6);
        assert!((folded.graph - 0.25).abs() < 1e-6);
        assert_eq!(folded.vector, 0.0);

        let unchanged = FusionWeights {
            keyword: 0.6,
            graph: 0.4,
            vector: 0.0,
        }
        .without_vector();
        assert_eq!(unchanged.keyword, 0.6);
    }

    #[test]
    fn raising_keyword_weight_is_monotone_for_keyword_docs() {
        // A purely keyword-matched doc vs a purely graph-expanded doc:
        // raising α (β fixed) can only improve the keyword doc's rank.
        let keyword = vec![(id("kw"), 0.5)];
        let graph = vec![(id("gr"), 1.0)];

        let rank_of = |alpha: f32| {
            let ranked = fuse(
                &keyword,
                &graph,
                &[],
                FusionWeights {
                    keyword: alpha,
                    graph: 0.2,
                    vector: 0.0,
                },
            );
            ranked.iter().position(|(i, _)| *i == id("kw")).unwrap()
        };
        assert!(rank_of(0.8) <= rank_of(0.3));
    }
}
