//! Contract clause boundaries produced by the extraction subsystem.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A contiguous span of contract text pre-classified as a single clause.
///
/// Boundaries are inputs to the engine and immutable to it. The extraction
/// subsystem guarantees `clause_type` is lowercase snake case; `confidence`
/// reflects extraction quality and boundaries below the configured floor are
/// skipped with a parsing-quality warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseBoundary {
    /// Unique identifier of this boundary
    pub id: Uuid,
    /// Document this boundary was extracted from
    pub document_id: Uuid,
    /// Tenant owning the document
    pub tenant_id: Uuid,
    /// Clause classification, lowercase snake case (e.g. `payment_terms`)
    pub clause_type: String,
    /// The clause text
    pub content: String,
    /// Extraction confidence in `[0, 1]`
    pub confidence: f64,
    /// Character offset of the span start, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_char: Option<usize>,
    /// Character offset of the span end, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_char: Option<usize>,
    /// Page of the span start, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_page: Option<u32>,
    /// Page of the span end, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_page: Option<u32>,
}

impl ClauseBoundary {
    /// Creates a new clause boundary with full extraction confidence.
    pub fn new(
        document_id: Uuid,
        tenant_id: Uuid,
        clause_type: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            tenant_id,
            clause_type: clause_type.into(),
            content: content.into(),
            confidence: 1.0,
            start_char: None,
            end_char: None,
            start_page: None,
            end_page: None,
        }
    }

    /// Sets the extraction confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Sets the character span.
    pub fn with_char_span(mut self, start: usize, end: usize) -> Self {
        self.start_char = Some(start);
        self.end_char = Some(end);
        self
    }

    /// Sets the page span.
    pub fn with_page_span(mut self, start: u32, end: u32) -> Self {
        self.start_page = Some(start);
        self.end_page = Some(end);
        self
    }

    /// Whether the boundary carries analyzable text.
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}
