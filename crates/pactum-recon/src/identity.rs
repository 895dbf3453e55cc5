//! Identity term resolution: party-name terms checked by string presence.

use pactum_core::text::normalize_text;
use pactum_core::{
    ClauseBoundary, ComparisonSeverity, ComparisonSource, PreAgreedComparison, PreAgreedTerm,
    RagColor,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fraction of significant words that must appear for a partial match.
const PARTIAL_MATCH_RATIO: f64 = 0.7;

/// How an identity term's expected value was found in the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMatchType {
    /// Present verbatim in a clause body
    Exact,
    /// Present verbatim in the full contract text
    Normalized,
    /// Most significant words present in the full text
    Partial,
    /// Not found
    Absent,
}

/// Resolution of one identity term against the contract.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityResolution {
    /// The term that was resolved
    pub pat_id: Uuid,
    /// Its category label
    pub term_category: String,
    /// How the expected value was found
    pub match_type: IdentityMatchType,
    /// Resolution confidence in `[0, 1]`
    pub confidence: f64,
    /// The clause containing an exact hit, when there is one
    pub matched_clause_id: Option<Uuid>,
}

impl IdentityResolution {
    /// Whether this resolution satisfies a mandatory category.
    pub fn satisfies_mandate(&self) -> bool {
        self.match_type != IdentityMatchType::Absent
    }

    /// Parsing sub-score contribution for this term row.
    pub fn rag_parsing(&self, is_mandatory: bool) -> RagColor {
        match self.match_type {
            IdentityMatchType::Exact | IdentityMatchType::Normalized => RagColor::Green,
            IdentityMatchType::Partial => RagColor::Amber,
            IdentityMatchType::Absent => {
                if is_mandatory {
                    RagColor::Red
                } else {
                    RagColor::Amber
                }
            }
        }
    }

    /// Builds the comparison record attached to the matched clause.
    pub fn to_comparison(&self) -> PreAgreedComparison {
        PreAgreedComparison {
            pat_id: self.pat_id,
            term_category: self.term_category.clone(),
            matches: self.satisfies_mandate(),
            severity: if self.satisfies_mandate() {
                ComparisonSeverity::None
            } else {
                ComparisonSeverity::Major
            },
            risk_summary: match self.match_type {
                IdentityMatchType::Exact => "expected value present in clause".to_string(),
                IdentityMatchType::Normalized => {
                    "expected value present in contract".to_string()
                }
                IdentityMatchType::Partial => {
                    "expected value partially present in contract".to_string()
                }
                IdentityMatchType::Absent => "expected value absent from contract".to_string(),
            },
            differences: Vec::new(),
            confidence: self.confidence,
            source: ComparisonSource::Identity,
        }
    }
}

/// Short-circuit resolver for party-name terms.
///
/// Identity terms bypass the LLM entirely; the check is normalized string
/// presence, first against each clause body, then against the full contract
/// text, then word-by-word.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTermResolver;

impl IdentityTermResolver {
    /// Resolves one identity term.
    ///
    /// An empty, whitespace-only or `"N/A"` expected value resolves to
    /// absent with zero confidence, without error.
    pub fn resolve(
        pat: &PreAgreedTerm,
        clauses: &[ClauseBoundary],
        full_contract_text: &str,
    ) -> IdentityResolution {
        let absent = IdentityResolution {
            pat_id: pat.id,
            term_category: pat.term_category.clone(),
            match_type: IdentityMatchType::Absent,
            confidence: 0.0,
            matched_clause_id: None,
        };

        let expected = match pat.expected_value.as_deref() {
            Some(value) => normalize_text(value),
            None => return absent,
        };
        if expected.is_empty() || expected == "n/a" {
            return absent;
        }

        for clause in clauses {
            if normalize_text(&clause.content).contains(&expected) {
                return IdentityResolution {
                    match_type: IdentityMatchType::Exact,
                    confidence: 1.0,
                    matched_clause_id: Some(clause.id),
                    ..absent.clone()
                };
            }
        }

        let full_text = normalize_text(full_contract_text);
        if full_text.contains(&expected) {
            return IdentityResolution {
                match_type: IdentityMatchType::Normalized,
                confidence: 0.95,
                ..absent.clone()
            };
        }

        let words: Vec<&str> = expected
            .split_whitespace()
            .filter(|w| w.len() > 2)
            .collect();
        if !words.is_empty() {
            let present = words.iter().filter(|w| full_text.contains(**w)).count();
            let ratio = present as f64 / words.len() as f64;
            if ratio >= PARTIAL_MATCH_RATIO {
                return IdentityResolution {
                    match_type: IdentityMatchType::Partial,
                    confidence: ratio * 0.8,
                    ..absent.clone()
                };
            }
        }

        absent
    }
}
