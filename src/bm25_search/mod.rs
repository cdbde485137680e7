use crate::types::{Chunk, SearchResult};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("identifier pattern is valid")
});

/// BM25 tuning constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation
    pub k1: f64,
    /// Length normalisation strength
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

/// Split text into lower-cased identifier tokens
///
/// Identifiers are split on underscores and camelCase boundaries
/// (`parseHTTPRequest` -> `parse`, `http`, `request`) before lower-casing,
/// and only the parts are emitted. Tokens of one character are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for word in IDENTIFIER.find_iter(text) {
        for part in split_identifier(word.as_str()) {
            push_token(&mut tokens, part);
        }
    }

    tokens
}

fn push_token(tokens: &mut Vec<String>, token: &str) {
    if token.chars().count() > 1 {
        tokens.push(token.to_lowercase());
    }
}

/// Split on `_` and camelCase boundaries, keeping acronyms together
fn split_identifier(word: &str) -> Vec<&str> {
    let mut parts = Vec::new();

    for segment in word.split('_').filter(|s| !s.is_empty()) {
        let chars: Vec<(usize, char)> = segment.char_indices().collect();
        let mut start = 0;

        for i in 1..chars.len() {
            let (idx, current) = chars[i];
            let prev = chars[i - 1].1;
            let next_is_lower = chars.get(i + 1).is_some_and(|(_, c)| c.is_ascii_lowercase());

            let lower_to_upper = (prev.is_ascii_lowercase() || prev.is_ascii_digit())
                && current.is_ascii_uppercase();
            let acronym_end =
                prev.is_ascii_uppercase() && current.is_ascii_uppercase() && next_is_lower;

            if lower_to_upper || acronym_end {
                parts.push(&segment[start..idx]);
                start = idx;
            }
        }
        parts.push(&segment[start..]);
    }

    parts
}

struct Document {
    chunk: Chunk,
    term_freqs: HashMap<String, u32>,
    length: usize,
}

/// Keyword index ranking chunks with Okapi BM25
///
/// Built in one pass over a chunk set; there is no incremental update.
pub struct BM25Search {
    params: Bm25Params,
    documents: Vec<Document>,
    doc_freqs: HashMap<String, usize>,
    avg_doc_len: f64,
}

impl BM25Search {
    /// Build an index over `chunks` (their `content`)
    pub fn build(chunks: &[Chunk], params: Bm25Params) -> Self {
        let mut documents = Vec::with_capacity(chunks.len());
        let mut doc_freqs: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0usize;

        for chunk in chunks {
            let tokens = tokenize(&chunk.content);
            let length = tokens.len();
            total_len += length;

            let mut term_freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *term_freqs.entry(token).or_insert(0) += 1;
            }
            for term in term_freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }

            documents.push(Document {
                chunk: chunk.clone(),
                term_freqs,
                length,
            });
        }

        let avg_doc_len = if documents.is_empty() {
            0.0
        } else {
            total_len as f64 / documents.len() as f64
        };

        tracing::debug!(
            "Built BM25 index: {} chunks, {} terms, avg length {:.1}",
            documents.len(),
            doc_freqs.len(),
            avg_doc_len
        );

        Self {
            params,
            documents,
            doc_freqs,
            avg_doc_len,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    /// Number of distinct terms in the index
    pub fn vocabulary_size(&self) -> usize {
        self.doc_freqs.len()
    }

    fn idf(&self, doc_freq: usize) -> f64 {
        let n = self.documents.len() as f64;
        let df = doc_freq as f64;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// BM25 score of one document, `None` when it shares no token with the query
    fn score(&self, query_tokens: &[String], doc: &Document) -> Option<f64> {
        let Bm25Params { k1, b } = self.params;
        let avg_len = if self.avg_doc_len > 0.0 {
            self.avg_doc_len
        } else {
            1.0
        };
        let len_norm = 1.0 - b + b * (doc.length as f64 / avg_len);

        let mut score = 0.0;
        let mut matched = false;
        for term in query_tokens {
            let Some(&tf) = doc.term_freqs.get(term) else {
                continue;
            };
            let df = self.doc_freqs.get(term).copied().unwrap_or(0);
            if df == 0 {
                continue;
            }

            let tf = tf as f64;
            score += self.idf(df) * (tf * (k1 + 1.0)) / (tf + k1 * len_norm);
            matched = true;
        }

        matched.then_some(score)
    }

    /// Top `limit` chunks for `query`, best first
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        if self.documents.is_empty() || limit == 0 {
            return Vec::new();
        }

        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .documents
            .iter()
            .enumerate()
            .filter_map(|(idx, doc)| self.score(&query_tokens, doc).map(|s| (idx, s)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        scored
            .into_iter()
            .map(|(idx, score)| SearchResult::new(self.documents[idx].chunk.clone(), score as f32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkKind;

    fn chunk(name: &str, content: &str, line: usize) -> Chunk {
        Chunk::new(ChunkKind::Function, "lib.go", "go", name, content, line, line)
    }

    fn corpus() -> Vec<Chunk> {
        vec![
            chunk("ParseConfig", "func ParseConfig(path string) (*Config, error)", 1),
            chunk("OpenStore", "func OpenStore(dir string) (*Store, error) { return nil, nil }", 2),
            chunk("CloseStore", "func CloseStore(s *Store) error { return s.Close() }", 3),
        ]
    }

    #[test]
    fn test_tokenize_splits_identifiers() {
        assert_eq!(
            tokenize("parseHTTPRequest max_retry_count x"),
            ["parse", "http", "request", "max", "retry", "count"]
        );
        assert_eq!(tokenize("max_retry_count"), ["max", "retry", "count"]);
        assert_eq!(tokenize("ComputeChecksum(r)"), ["compute", "checksum"]);
    }

    #[test]
    fn test_split_identifier_adds_no_joined_terms() {
        let chunks = vec![chunk("MaxRetryCount", "const MaxRetryCount = 3", 1)];
        let index = BM25Search::build(&chunks, Bm25Params::default());
        assert!(!index.doc_freqs.contains_key("maxretrycount"));
        // const, max, retry, count
        assert_eq!(index.documents[0].length, 4);
        assert!(index.search("maxretrycount", 5).is_empty());
    }

    #[test]
    fn test_tokenize_drops_single_chars_and_symbols() {
        assert_eq!(tokenize("a + b == c; 42"), Vec::<String>::new());
        assert_eq!(tokenize("Go go GO"), ["go", "go", "go"]);
    }

    #[test]
    fn test_split_identifier_boundaries() {
        assert_eq!(split_identifier("HTTPServer"), ["HTTP", "Server"]);
        assert_eq!(split_identifier("utf8Decode"), ["utf8", "Decode"]);
        assert_eq!(split_identifier("__init__"), ["init"]);
        assert_eq!(split_identifier("plain"), ["plain"]);
    }

    #[test]
    fn test_no_overlap_returns_nothing() {
        let index = BM25Search::build(&corpus(), Bm25Params::default());
        assert!(index.search("kubernetes deployment", 10).is_empty());
        assert!(index.search("", 10).is_empty());
    }

    #[test]
    fn test_unique_token_scores_positive() {
        let index = BM25Search::build(&corpus(), Bm25Params::default());
        let results = index.search("ParseConfig", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.name, "ParseConfig");
        assert!(results[0].score > 0.0);
    }

    #[test]
    fn test_rarer_terms_rank_higher() {
        let index = BM25Search::build(&corpus(), Bm25Params::default());
        // "store" is in two chunks, "close" only in one
        let results = index.search("close store", 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.name, "CloseStore");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_limit_truncates() {
        let index = BM25Search::build(&corpus(), Bm25Params::default());
        assert_eq!(index.search("func", 2).len(), 2);
        assert!(index.search("func", 0).is_empty());
    }

    #[test]
    fn test_document_frequency_counts_chunks_once() {
        let chunks = vec![chunk("A", "store store store", 1), chunk("B", "other", 2)];
        let index = BM25Search::build(&chunks, Bm25Params::default());
        assert_eq!(index.doc_freqs["store"], 1);
        assert_eq!(index.len(), 2);
        assert_eq!(index.vocabulary_size(), 2);
        assert!((index.avg_doc_len - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_matches_formula() {
        let chunks = vec![chunk("A", "alpha beta", 1), chunk("B", "gamma delta", 2)];
        let index = BM25Search::build(&chunks, Bm25Params::default());
        let results = index.search("alpha", 10);

        // N = 2, df = 1, tf = 1, len = avgLen = 2
        let idf = ((2.0 - 1.0 + 0.5) / (1.0 + 0.5) + 1.0f64).ln();
        let tf_norm = (1.0 * 2.5) / (1.0 + 1.5 * (1.0 - 0.75 + 0.75 * 1.0));
        assert!((results[0].score as f64 - idf * tf_norm).abs() < 1e-5);
    }

    #[test]
    fn test_empty_index() {
        let index = BM25Search::build(&[], Bm25Params::default());
        assert!(index.is_empty());
        assert!(index.search("anything", 5).is_empty());
    }
}
