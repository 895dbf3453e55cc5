//! Pre-agreed terms: the deal-specific commitments a contract must honor.

use crate::text::normalize_text;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Term categories that name a party rather than a commercial commitment.
///
/// Matching is case-insensitive on the trimmed category label. Identity
/// terms are satisfied by string presence in the contract and never reach
/// the LLM comparator.
const IDENTITY_CATEGORIES: &[&str] = &[
    "brand name",
    "brand",
    "talent name",
    "talent",
    "influencer name",
    "influencer",
    "agency",
    "agency name",
    "client name",
    "client",
    "company name",
    "company",
];

/// Returns whether a term category names a contract party.
pub fn is_identity_category(category: &str) -> bool {
    let normalized = normalize_text(category);
    IDENTITY_CATEGORIES.contains(&normalized.as_str())
}

/// A deal-specific commercial or structural requirement.
///
/// Multiple terms may share a `term_category` within the same deal; a single
/// satisfied comparison anywhere in the document satisfies a mandatory
/// category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreAgreedTerm {
    /// Unique identifier
    pub id: Uuid,
    /// Deal this term belongs to
    pub deal_id: Uuid,
    /// Free-text category label (e.g. "Payment Terms", "Brand Name")
    pub term_category: String,
    /// What was agreed
    pub term_description: String,
    /// Concrete expected value, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_value: Option<String>,
    /// Whether the contract must address this term
    pub is_mandatory: bool,
    /// Clause types this term authoritatively pairs with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_clause_types: Option<Vec<String>>,
}

impl PreAgreedTerm {
    /// Creates a new optional term.
    pub fn new(
        deal_id: Uuid,
        term_category: impl Into<String>,
        term_description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            deal_id,
            term_category: term_category.into(),
            term_description: term_description.into(),
            expected_value: None,
            is_mandatory: false,
            related_clause_types: None,
        }
    }

    /// Sets the expected value.
    pub fn with_expected_value(mut self, value: impl Into<String>) -> Self {
        self.expected_value = Some(value.into());
        self
    }

    /// Marks the term mandatory.
    pub fn mandatory(mut self) -> Self {
        self.is_mandatory = true;
        self
    }

    /// Sets the authoritative clause-type pairings.
    pub fn with_related_clause_types(
        mut self,
        clause_types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.related_clause_types = Some(clause_types.into_iter().map(Into::into).collect());
        self
    }

    /// Whether this term names a contract party.
    pub fn is_identity(&self) -> bool {
        is_identity_category(&self.term_category)
    }

    /// Whether this term's `related_clause_types` covers the given clause type.
    pub fn relates_to_clause_type(&self, clause_type: &str) -> bool {
        let normalized = normalize_text(&clause_type.replace('_', " "));
        self.related_clause_types
            .as_deref()
            .unwrap_or_default()
            .iter()
            .any(|ct| normalize_text(&ct.replace('_', " ")) == normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_categories_are_case_insensitive() {
        assert!(is_identity_category("Brand Name"));
        assert!(is_identity_category("  talent "));
        assert!(is_identity_category("AGENCY"));
        assert!(!is_identity_category("Payment Terms"));
        assert!(!is_identity_category("Brand Guidelines"));
    }

    #[test]
    fn related_clause_types_match_across_separators() {
        let pat = PreAgreedTerm::new(Uuid::new_v4(), "Usage Rights", "12 month license")
            .with_related_clause_types(["usage_rights", "intellectual_property"]);

        assert!(pat.relates_to_clause_type("usage_rights"));
        assert!(pat.relates_to_clause_type("Usage Rights"));
        assert!(!pat.relates_to_clause_type("termination"));
    }

    #[test]
    fn builder_round_trip() {
        let deal = Uuid::new_v4();
        let pat = PreAgreedTerm::new(deal, "Payment Terms", "Pay within 30 days")
            .with_expected_value("30 days")
            .mandatory();

        assert!(pat.is_mandatory);
        assert_eq!(pat.expected_value.as_deref(), Some("30 days"));
        assert!(!pat.is_identity());
    }
}
