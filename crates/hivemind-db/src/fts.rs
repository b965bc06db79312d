//! In-memory BM25 index over node text, maintained by [`crate::Database`].
//!
//! Tokenisation is deliberately plain: case-fold, split on
//! non-alphanumeric boundaries. CJK runs form one token per run.

use bm25::{EmbedderBuilder, Scorer, Tokenizer};
use hivemind_core::NoteId;

const DEFAULT_AVGDL: f32 = 40.0;

/// English-style whitespace-and-punctuation tokenizer.
#[derive(Debug, Default, Clone)]
pub struct VaultTokenizer;

impl VaultTokenizer {
    pub fn split(input: &str) -> Vec<String> {
        input
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

impl Tokenizer for VaultTokenizer {
    fn tokenize(&self, input_text: &str) -> Vec<String> {
        Self::split(input_text)
    }
}

/// BM25 embedder + scorer pair keyed by note id.
pub struct FtsIndex {
    embedder: bm25::Embedder<u32, VaultTokenizer>,
    scorer: Scorer<NoteId, u32>,
}

impl std::fmt::Debug for FtsIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtsIndex").finish_non_exhaustive()
    }
}

impl Default for FtsIndex {
    fn default() -> Self {
        Self::new(DEFAULT_AVGDL)
    }
}

impl FtsIndex {
    /// Create an empty index. `avgdl` is an estimate of the average
    /// document token length; use [`FtsIndex::from_corpus`] when the
    /// corpus is available up front.
    pub fn new(avgdl: f32) -> Self {
        let embedder = EmbedderBuilder::<u32, VaultTokenizer>::with_avgdl(avgdl).build();
        Self {
            embedder,
            scorer: Scorer::new(),
        }
    }

    /// Build from a full corpus, fitting avgdl to the actual documents.
    pub fn from_corpus(corpus: Vec<(NoteId, String)>) -> Self {
        let mut total_tokens = 0usize;
        for (_, text) in &corpus {
            total_tokens += VaultTokenizer::split(text).len();
        }
        let avgdl = if corpus.is_empty() {
            DEFAULT_AVGDL
        } else {
            (total_tokens as f32 / corpus.len() as f32).max(1.0)
        };

        let mut index = Self::new(avgdl);
        for (id, text) in corpus {
            index.upsert(&id, &text);
        }
        index
    }

    pub fn upsert(&mut self, id: &NoteId, text: &str) {
        let embedding = self.embedder.embed(text);
        self.scorer.upsert(id, embedding);
    }

    pub fn remove(&mut self, id: &NoteId) {
        self.scorer.remove(id);
    }

    /// Top-k BM25 matches. An empty or whitespace query matches nothing.
    pub fn search(&self, query: &str, limit: usize) -> Vec<(NoteId, f32)> {
        if query.trim().is_empty() || limit == 0 {
            return Vec::new();
        }
        let query_embedding = self.embedder.embed(query);
        let mut matches = self.scorer.matches(&query_embedding);
        matches.truncate(limit);
        matches.into_iter().map(|d| (d.id, d.score)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_case_folds_and_splits_on_punctuation() {
        let tokens = VaultTokenizer::split("The Castle-of-Glass, rebuilt in 1066!");
        assert_eq!(
            tokens,
            vec!["the", "castle", "of", "glass", "rebuilt", "in", "1066"]
        );
    }

    #[test]
    fn search_ranks_matching_documents_first() {
        let mut index = FtsIndex::new(8.0);
        index.upsert(
            &NoteId::from("alice"),
            "Alice the knight guards the castle",
        );
        index.upsert(&NoteId::from("bob"), "Bob farms turnips in the valley");

        let results = index.search("castle knight", 10);
        assert!(!results.is_empty());
        assert_eq!(results[0].0, NoteId::from("alice"));
    }

    #[test]
    fn empty_query_matches_nothing() {
        let mut index = FtsIndex::new(8.0);
        index.upsert(&NoteId::from("alice"), "Alice");
        assert!(index.search("", 10).is_empty());
        assert!(index.search("   \t", 10).is_empty());
    }

    #[test]
    fn removed_documents_stop_matching() {
        let mut index = FtsIndex::new(8.0);
        index.upsert(&NoteId::from("alice"), "castle guard");
        index.remove(&NoteId::from("alice"));
        assert!(index.search("castle", 10).is_empty());
    }

    #[test]
    fn upsert_replaces_the_document() {
        let mut index = FtsIndex::new(8.0);
        let id = NoteId::from("alice");
        index.upsert(&id, "castle guard");
        index.upsert(&id, "turnip farmer");
        assert!(index.search("castle", 10).is_empty());
        assert_eq!(index.search("turnip", 10)[0].0, id);
    }

    #[test]
    fn from_corpus_fits_avgdl_and_indexes_everything() {
        let corpus = vec![
            (NoteId::from("a"), "short note".to_string()),
            (NoteId::from("b"), "a rather longer note about castles".to_string()),
        ];
        let index = FtsIndex::from_corpus(corpus);
        assert_eq!(index.search("castles", 10).len(), 1);
    }
}
