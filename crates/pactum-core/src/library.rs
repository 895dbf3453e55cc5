//! Curated legal clause library entries.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Functional category of a library clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClauseCategory {
    Legal,
    Operational,
    Creative,
    Financial,
    Compliance,
    Termination,
    Confidentiality,
    Liability,
    Indemnification,
}

/// Risk level of a library clause, ordered from least to most severe.
///
/// The ordering matters: candidate ties during library matching are broken
/// toward the higher risk level, so the conservative template wins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// A curated, embedded standard clause.
///
/// Library clauses are the reference against which contract clauses are
/// matched. An entry participates in vector search only while it is active
/// and carries an embedding; the two travel together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryClause {
    /// Unique identifier
    pub id: Uuid,
    /// Human-readable clause code, unique across the library
    pub clause_code: String,
    /// Clause classification, lowercase snake case
    pub clause_type: String,
    /// The standard clause wording
    pub standard_text: String,
    /// Functional category
    pub category: ClauseCategory,
    /// Risk level, used for conservative tie-breaks
    pub risk_level: RiskLevel,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Fixed-dimension embedding of `standard_text`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Whether this entry participates in matching
    pub active: bool,
}

impl LibraryClause {
    /// Creates a new inactive library clause without an embedding.
    pub fn new(
        clause_code: impl Into<String>,
        clause_type: impl Into<String>,
        standard_text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            clause_code: clause_code.into(),
            clause_type: clause_type.into(),
            standard_text: standard_text.into(),
            category: ClauseCategory::Legal,
            risk_level: RiskLevel::Medium,
            tags: Vec::new(),
            embedding: None,
            active: false,
        }
    }

    /// Sets the functional category.
    pub fn with_category(mut self, category: ClauseCategory) -> Self {
        self.category = category;
        self
    }

    /// Sets the risk level.
    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    /// Adds tags.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Attaches an embedding and activates the entry.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self.active = true;
        self
    }

    /// Whether this entry is eligible for vector search.
    pub fn is_searchable(&self) -> bool {
        self.active && self.embedding.is_some()
    }
}
