//! Semantic pairing: which pre-agreed terms does a clause speak to?

use pactum_core::{ClauseBoundary, PairingRules, PreAgreedTerm, Result};
use pactum_llm::Embedding;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a clause-term pairing was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingMethod {
    /// The term's `related_clause_types` named the clause type (authoritative)
    RelatedClauseTypes,
    /// Both sides hit the same keyword-map entry
    Keyword,
    /// Embedding similarity between clause and term category
    Semantic,
}

/// One paired term for a clause.
#[derive(Debug, Clone, PartialEq)]
pub struct PatPairing {
    /// Index into the run's PAT list
    pub pat_index: usize,
    /// How the pairing was established
    pub method: PairingMethod,
    /// Cosine similarity, recorded for semantic pairings only
    pub semantic_confidence: Option<f64>,
    /// Keyword-map entry key, recorded for keyword pairings only
    pub rule_key: Option<String>,
}

/// All pairings for one clause, stable in PAT input order.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticPairingResult {
    /// The clause that was paired
    pub clause_id: Uuid,
    /// Paired terms in input order
    pub pairings: Vec<PatPairing>,
}

impl SemanticPairingResult {
    /// Whether no term was paired.
    pub fn is_empty(&self) -> bool {
        self.pairings.is_empty()
    }
}

/// Pairing engine: authoritative relations, then keywords, then embeddings.
///
/// Identity terms never pair; they are satisfied by string presence and are
/// resolved separately. Keyword matching consults only the term *category*,
/// never the description.
pub struct PairingEngine {
    rules: PairingRules,
    semantic_threshold: f64,
}

impl PairingEngine {
    /// Creates an engine with the given keyword rules and semantic threshold.
    pub fn new(rules: PairingRules, semantic_threshold: f64) -> Self {
        Self {
            rules,
            semantic_threshold,
        }
    }

    /// Runs the authoritative and keyword stages.
    ///
    /// Returns pairings for the first stage that produces any; an empty
    /// result means the caller should attempt the semantic fallback.
    pub fn pair_by_rules(
        &self,
        clause: &ClauseBoundary,
        pats: &[PreAgreedTerm],
    ) -> SemanticPairingResult {
        let mut related = Vec::new();
        for (pat_index, pat) in pats.iter().enumerate() {
            if pat.is_identity() {
                continue;
            }
            if pat.relates_to_clause_type(&clause.clause_type) {
                related.push(PatPairing {
                    pat_index,
                    method: PairingMethod::RelatedClauseTypes,
                    semantic_confidence: None,
                    rule_key: None,
                });
            }
        }
        if !related.is_empty() {
            return SemanticPairingResult {
                clause_id: clause.id,
                pairings: related,
            };
        }

        let mut keyword = Vec::new();
        for (pat_index, pat) in pats.iter().enumerate() {
            if pat.is_identity() {
                continue;
            }
            if let Some(key) = self.rules.pair(&clause.clause_type, &pat.term_category) {
                keyword.push(PatPairing {
                    pat_index,
                    method: PairingMethod::Keyword,
                    semantic_confidence: None,
                    rule_key: Some(key.to_string()),
                });
            }
        }

        SemanticPairingResult {
            clause_id: clause.id,
            pairings: keyword,
        }
    }

    /// Semantic fallback for clauses with no rule-based pairing.
    ///
    /// `category_embeddings` holds one entry per PAT (aligned by index);
    /// identity terms and terms without an embedding are skipped.
    pub fn pair_semantic(
        &self,
        clause: &ClauseBoundary,
        clause_embedding: &Embedding,
        pats: &[PreAgreedTerm],
        category_embeddings: &[Option<Embedding>],
    ) -> Result<SemanticPairingResult> {
        let mut pairings = Vec::new();
        for (pat_index, pat) in pats.iter().enumerate() {
            if pat.is_identity() {
                continue;
            }
            let Some(category_embedding) = category_embeddings.get(pat_index).and_then(Option::as_ref)
            else {
                continue;
            };
            let similarity = f64::from(clause_embedding.cosine_similarity(category_embedding)?);
            if similarity >= self.semantic_threshold {
                pairings.push(PatPairing {
                    pat_index,
                    method: PairingMethod::Semantic,
                    semantic_confidence: Some(similarity),
                    rule_key: None,
                });
            }
        }

        Ok(SemanticPairingResult {
            clause_id: clause.id,
            pairings,
        })
    }
}
