//! Library matching: ranked cosine search over the active clause library.

use pactum_core::{ClauseBoundary, LibraryClause, Result, RiskLevel};
use pactum_llm::Embedding;
use uuid::Uuid;

/// Similarities closer than this are considered tied and fall through to the
/// clause-type and risk-level tie-breaks.
const SIMILARITY_TIE_EPSILON: f64 = 1e-9;

/// One ranked library candidate for a clause.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryCandidate {
    /// Library entry id
    pub template_id: Uuid,
    /// Human-readable clause code
    pub clause_code: String,
    /// Clause type of the template
    pub clause_type: String,
    /// Standard wording, used by the direction validator
    pub standard_text: String,
    /// Risk level of the template
    pub risk_level: RiskLevel,
    /// Cosine similarity clamped to `[0, 1]`
    pub similarity: f64,
}

/// k-NN matcher over the searchable subset of the clause library.
///
/// Built once per run from the tenant-scoped library snapshot; lookups are
/// pure and synchronous.
pub struct LibraryMatcher {
    entries: Vec<(LibraryClause, Embedding)>,
}

impl LibraryMatcher {
    /// Indexes the searchable entries (active, with an embedding).
    pub fn new(library: &[LibraryClause]) -> Self {
        let entries = library
            .iter()
            .filter(|entry| entry.is_searchable())
            .filter_map(|entry| {
                entry
                    .embedding
                    .as_ref()
                    .map(|vector| (entry.clone(), Embedding::new(vector.clone())))
            })
            .collect();
        Self { entries }
    }

    /// Number of searchable entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the top-N candidates for a clause by cosine similarity.
    ///
    /// Ties are broken toward a template of the same clause type, then
    /// toward the higher risk level, so the conservative template wins.
    pub fn top_candidates(
        &self,
        clause: &ClauseBoundary,
        embedding: &Embedding,
        top_n: usize,
    ) -> Result<Vec<LibraryCandidate>> {
        let mut candidates = Vec::with_capacity(self.entries.len());
        for (entry, entry_embedding) in &self.entries {
            let similarity = f64::from(embedding.cosine_similarity(entry_embedding)?);
            candidates.push(LibraryCandidate {
                template_id: entry.id,
                clause_code: entry.clause_code.clone(),
                clause_type: entry.clause_type.clone(),
                standard_text: entry.standard_text.clone(),
                risk_level: entry.risk_level,
                similarity: similarity.clamp(0.0, 1.0),
            });
        }

        candidates.sort_by(|a, b| {
            let delta = b.similarity - a.similarity;
            if delta.abs() > SIMILARITY_TIE_EPSILON {
                return b
                    .similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal);
            }
            let a_same = a.clause_type == clause.clause_type;
            let b_same = b.clause_type == clause.clause_type;
            b_same
                .cmp(&a_same)
                .then_with(|| b.risk_level.cmp(&a.risk_level))
                .then_with(|| a.clause_code.cmp(&b.clause_code))
        });

        candidates.truncate(top_n);
        Ok(candidates)
    }
}
