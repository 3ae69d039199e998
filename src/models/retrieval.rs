//! Supplier retrieval over two-tower embeddings.
//!
//! Each supplier is stored twice: as little-endian f16 bytes for exact scoring and as a
//! packed sign vector for a cheap Hamming prefilter. A search keeps the
//! `rescore_candidates` nearest codes and rescores them with cosine similarity.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use bitvec::prelude::*;
use half::f16;
use rkyv::{Archive, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::data::Interaction;
use crate::ranking::LotQuery;
use crate::storage::SnapshotStore;

use super::error::{ModelError, ModelResult};
use super::metrics::recall_at_k;
use super::two_tower::TwoTowerModel;

#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RetrievalEntry {
    pub post_num: String,
    /// Little-endian f16 components.
    pub embedding: Vec<u8>,
    /// One sign bit per component, LSB first.
    pub code: Vec<u8>,
}

/// Archived form of [`RetrievalIndex`].
#[derive(Archive, Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RetrievalSnapshot {
    pub dim: u32,
    pub entries: Vec<RetrievalEntry>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RetrievalHit {
    pub post_num: String,
    pub score: f32,
    pub hamming: u32,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RetrievalReport {
    pub k: usize,
    pub entries: usize,
    pub lots_evaluated: usize,
    pub recall_at_k: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalIndex {
    dim: usize,
    entries: Vec<RetrievalEntry>,
}

impl RetrievalIndex {
    /// Builds the index; embeddings whose length differs from `dim` are skipped.
    pub fn build(dim: usize, embeddings: Vec<(String, Vec<f32>)>) -> Self {
        let mut entries = Vec::with_capacity(embeddings.len());
        for (post_num, vector) in embeddings {
            if vector.len() != dim {
                warn!(
                    post_num = %post_num,
                    expected_dim = dim,
                    actual_dim = vector.len(),
                    "Skipping supplier: embedding dimension mismatch"
                );
                continue;
            }
            entries.push(RetrievalEntry {
                code: quantize_to_binary(&vector),
                embedding: f32_to_f16_le_bytes(&vector),
                post_num,
            });
        }
        entries.sort_by(|a, b| a.post_num.cmp(&b.post_num));

        debug!(dim, entries = entries.len(), "Retrieval index built");
        Self { dim, entries }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Two-stage nearest-supplier search.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        rescore_candidates: usize,
    ) -> ModelResult<Vec<RetrievalHit>> {
        if query.len() != self.dim {
            return Err(ModelError::DimensionMismatch {
                expected: self.dim,
                actual: query.len(),
            });
        }
        if self.entries.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_code = quantize_to_binary(query);
        let mut prefiltered: Vec<(u32, &RetrievalEntry)> = self
            .entries
            .iter()
            .map(|entry| (hamming_distance(&query_code, &entry.code), entry))
            .collect();
        prefiltered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.post_num.cmp(&b.1.post_num)));
        prefiltered.truncate(rescore_candidates.max(top_k));

        let mut hits: Vec<RetrievalHit> = prefiltered
            .into_iter()
            .filter_map(|(hamming, entry)| {
                let embedding = f16_le_bytes_to_vec(&entry.embedding);
                if embedding.len() != self.dim {
                    warn!(
                        post_num = %entry.post_num,
                        expected_dim = self.dim,
                        actual_dim = embedding.len(),
                        "Dropping candidate: embedding dimension mismatch"
                    );
                    return None;
                }
                Some(RetrievalHit {
                    post_num: entry.post_num.clone(),
                    score: cosine_similarity_f16_f32(&embedding, query),
                    hamming,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.post_num.cmp(&b.post_num))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Builds the index from every supplier embedding of `model`.
    pub fn from_model(model: &TwoTowerModel) -> ModelResult<Self> {
        Ok(Self::build(model.vocab().dim, model.supplier_embeddings()?))
    }

    /// Recall@k of the winning supplier when holdout lots are embedded by `model` and
    /// searched here. Lots whose winner is not indexed are skipped.
    pub fn evaluate(
        &self,
        model: &TwoTowerModel,
        holdout: &[Interaction],
        k: usize,
        rescore_candidates: usize,
    ) -> ModelResult<RetrievalReport> {
        let mut winners: BTreeMap<&str, &Interaction> = BTreeMap::new();
        for row in holdout.iter().filter(|r| r.is_winner) {
            winners.entry(row.pn_lot.as_str()).or_insert(row);
        }

        let mut ranked = Vec::new();
        let mut relevant = Vec::new();
        for winner in winners.values() {
            if !self.contains(&winner.post_num) {
                continue;
            }
            let query = model.lot_embedding(&LotQuery::from_interaction(winner, k))?;
            let hits = self.search(&query, k, rescore_candidates)?;
            ranked.push(hits.into_iter().map(|h| h.post_num).collect::<Vec<_>>());
            relevant.push(winner.post_num.clone());
        }

        let report = RetrievalReport {
            k,
            entries: self.len(),
            lots_evaluated: relevant.len(),
            recall_at_k: recall_at_k(&ranked, &relevant, k),
        };
        info!(
            k,
            entries = report.entries,
            lots = report.lots_evaluated,
            recall = report.recall_at_k,
            "Retrieval index evaluated"
        );
        Ok(report)
    }

    pub fn contains(&self, post_num: &str) -> bool {
        self.entries
            .binary_search_by(|e| e.post_num.as_str().cmp(post_num))
            .is_ok()
    }

    pub fn to_snapshot(&self) -> RetrievalSnapshot {
        RetrievalSnapshot {
            dim: self.dim as u32,
            entries: self.entries.clone(),
        }
    }

    pub fn from_snapshot(snapshot: RetrievalSnapshot) -> Self {
        Self {
            dim: snapshot.dim as usize,
            entries: snapshot.entries,
        }
    }

    pub fn save(&self, store: &SnapshotStore, name: &str) -> ModelResult<()> {
        let path = store.save(name, &self.to_snapshot())?;
        debug!(path = %path.display(), entries = self.len(), "Retrieval index saved");
        Ok(())
    }

    pub fn load(store: &SnapshotStore, name: &str) -> ModelResult<Self> {
        let snapshot: RetrievalSnapshot = store.load(name)?;
        Ok(Self::from_snapshot(snapshot))
    }
}

/// Packs the sign of each component (`> 0` is a set bit).
pub fn quantize_to_binary(vector: &[f32]) -> Vec<u8> {
    let mut bits = BitVec::<u8, Lsb0>::with_capacity(vector.len());
    for &value in vector {
        bits.push(value > 0.0);
    }
    bits.into_vec()
}

/// Number of differing bits; `u32::MAX` for codes of different length.
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    if a.len() != b.len() {
        return u32::MAX;
    }
    a.iter().zip(b).map(|(&x, &y)| (x ^ y).count_ones()).sum()
}

pub fn f32_to_f16_le_bytes(values: &[f32]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|&v| f16::from_f32(v).to_le_bytes())
        .collect()
}

/// Decodes little-endian f16 bytes; a trailing odd byte is ignored.
pub fn f16_le_bytes_to_vec(bytes: &[u8]) -> Vec<f16> {
    bytes
        .chunks_exact(2)
        .map(|pair| f16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[inline]
pub fn cosine_similarity_f16_f32(a: &[f16], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a_sq = 0.0f32;
    let mut norm_b_sq = 0.0f32;
    for (av, &bv) in a.iter().zip(b) {
        let av = av.to_f32();
        dot += av * bv;
        norm_a_sq += av * av;
        norm_b_sq += bv * bv;
    }

    let norm = norm_a_sq.sqrt() * norm_b_sq.sqrt();
    if norm == 0.0 { 0.0 } else { dot / norm }
}
