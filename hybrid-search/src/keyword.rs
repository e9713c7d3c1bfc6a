//! Keyword retrieval: BM25-Okapi over the chunk corpus.
//!
//! Suits exact matches (statute numbers, defined terms, party names) that
//! embedding similarity tends to miss. The index is built once per corpus
//! via [`KeywordIndex::index_documents`] and is read-only afterwards, so
//! concurrent query access needs no locking — share it behind an `Arc`.
//!
//! Scoring follows BM25-Okapi: `k1` controls term-frequency saturation,
//! `b` controls document-length normalization, and negative IDF values are
//! clamped to `epsilon * average_idf` so very common terms still contribute
//! a small positive weight.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info};

use crate::errors::{KeywordError, SearchResult};
use crate::models::{Chunk, RankedEntry};

/// BM25 keyword index over an immutable chunk corpus.
pub struct KeywordIndex {
    k1: f64,
    b: f64,
    epsilon: f64,
    min_score: f64,

    chunks: HashMap<String, Chunk>,
    chunk_ids: Vec<String>,
    term_freqs: Vec<HashMap<String, usize>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,

    indexed: bool,
}

impl Default for KeywordIndex {
    fn default() -> Self {
        Self::new(1.5, 0.75, 0.25)
    }
}

impl KeywordIndex {
    /// Creates an empty index with explicit BM25 parameters.
    pub fn new(k1: f64, b: f64, epsilon: f64) -> Self {
        Self {
            k1,
            b,
            epsilon,
            min_score: 0.0,
            chunks: HashMap::new(),
            chunk_ids: Vec::new(),
            term_freqs: Vec::new(),
            doc_lens: Vec::new(),
            avg_doc_len: 0.0,
            idf: HashMap::new(),
            indexed: false,
        }
    }

    /// Builds the index over the given chunks. Replaces any previous corpus.
    pub fn index_documents(&mut self, chunks: Vec<Chunk>) {
        let started = Instant::now();

        self.chunks.clear();
        self.chunk_ids.clear();
        self.term_freqs.clear();
        self.doc_lens.clear();
        self.idf.clear();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for chunk in chunks {
            let tokens = tokenize(&chunk.text);
            let mut freqs: HashMap<String, usize> = HashMap::new();
            for tok in &tokens {
                *freqs.entry(tok.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            self.doc_lens.push(tokens.len());
            self.term_freqs.push(freqs);
            self.chunk_ids.push(chunk.id.clone());
            self.chunks.insert(chunk.id.clone(), chunk);
        }

        let n_docs = self.chunk_ids.len();
        self.avg_doc_len = if n_docs == 0 {
            0.0
        } else {
            self.doc_lens.iter().sum::<usize>() as f64 / n_docs as f64
        };

        // IDF with the Okapi epsilon floor: negative values (terms present in
        // more than half the corpus) are clamped to epsilon * average_idf.
        let mut idf_sum = 0.0;
        let mut negative: Vec<String> = Vec::new();
        for (term, df) in &doc_freq {
            let idf = ((n_docs as f64 - *df as f64 + 0.5) / (*df as f64 + 0.5)).ln();
            idf_sum += idf;
            if idf < 0.0 {
                negative.push(term.clone());
            }
            self.idf.insert(term.clone(), idf);
        }
        if !doc_freq.is_empty() {
            let average_idf = idf_sum / doc_freq.len() as f64;
            let floor = self.epsilon * average_idf;
            for term in negative {
                self.idf.insert(term, floor);
            }
        }

        self.indexed = true;

        info!(
            target: "hybrid_search::keyword",
            documents = n_docs,
            terms = self.idf.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "keyword index built"
        );
    }

    /// Scores the query against every document and returns the top-k ranked
    /// list (rank 1-based, unique, score strictly above `min_score`).
    ///
    /// An empty corpus returns an empty list, not an error; querying an
    /// unbuilt index is a typed error.
    pub fn search(&self, query: &str, top_k: usize) -> SearchResult<Vec<RankedEntry>> {
        if !self.indexed {
            return Err(KeywordError::NotIndexed.into());
        }
        if self.chunk_ids.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let query_tokens = tokenize(query);

        let mut scored: Vec<(usize, f64)> = Vec::with_capacity(self.chunk_ids.len());
        for (doc_idx, freqs) in self.term_freqs.iter().enumerate() {
            let score = self.score_doc(&query_tokens, doc_idx, freqs);
            if score > self.min_score {
                scored.push((doc_idx, score));
            }
        }

        // Score descending, then chunk id ascending for a stable total order.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| self.chunk_ids[a.0].cmp(&self.chunk_ids[b.0]))
        });
        scored.truncate(top_k);

        let results = scored
            .into_iter()
            .enumerate()
            .map(|(i, (doc_idx, score))| RankedEntry {
                chunk_id: self.chunk_ids[doc_idx].clone(),
                rank: i + 1,
                score,
            })
            .collect::<Vec<_>>();

        debug!(
            target: "hybrid_search::keyword",
            hits = results.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "keyword search done"
        );

        Ok(results)
    }

    fn score_doc(&self, query_tokens: &[String], doc_idx: usize, freqs: &HashMap<String, usize>) -> f64 {
        let dl = self.doc_lens[doc_idx] as f64;
        let norm = self.k1 * (1.0 - self.b + self.b * dl / self.avg_doc_len.max(1.0));

        let mut score = 0.0;
        for term in query_tokens {
            let Some(&tf) = freqs.get(term) else { continue };
            let idf = self.idf.get(term).copied().unwrap_or(0.0);
            let tf = tf as f64;
            score += idf * tf * (self.k1 + 1.0) / (tf + norm);
        }
        score
    }

    /// Looks up an indexed chunk by id.
    pub fn get_chunk(&self, chunk_id: &str) -> Option<&Chunk> {
        self.chunks.get(chunk_id)
    }

    pub fn document_count(&self) -> usize {
        self.chunk_ids.len()
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }
}

/// Lowercase alphanumeric tokenization; underscores survive so defined
/// terms like `force_majeure` stay intact.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}
