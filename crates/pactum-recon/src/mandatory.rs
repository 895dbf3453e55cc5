//! Missing-mandatory reporting across the whole document.

use pactum_core::text::normalize_text;
use pactum_core::{Discrepancy, MissingMandatory, PreAgreedTerm};
use std::collections::HashSet;
use uuid::Uuid;

/// Result of the missing-mandatory sweep.
#[derive(Debug, Default)]
pub struct MandatoryReport {
    /// Mandatory categories with no satisfying match, for the run report
    pub missing: Vec<MissingMandatory>,
    /// Deal-level discrepancies to persist
    pub discrepancies: Vec<Discrepancy>,
}

/// Computes which mandatory term categories lack any satisfying match.
///
/// `matched_categories` holds normalized category labels satisfied anywhere
/// in the document. One green comparison (or one non-absent identity
/// resolution) satisfies the whole category, no matter how many adverse
/// comparisons exist alongside it. Categories are deduplicated so a deal
/// with several terms in one category reports it at most once.
pub fn missing_mandatory_report(
    document_id: Uuid,
    pats: &[PreAgreedTerm],
    matched_categories: &HashSet<String>,
) -> MandatoryReport {
    let mut report = MandatoryReport::default();
    let mut seen = HashSet::new();

    for pat in pats {
        if !pat.is_mandatory {
            continue;
        }
        let normalized = normalize_text(&pat.term_category);
        if matched_categories.contains(&normalized) || !seen.insert(normalized) {
            continue;
        }
        report.missing.push(MissingMandatory {
            term_category: pat.term_category.clone(),
            reason: "no clause satisfied this term".to_string(),
        });
        report
            .discrepancies
            .push(Discrepancy::missing_mandatory(document_id, &pat.term_category));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pat(category: &str, mandatory: bool) -> PreAgreedTerm {
        let pat = PreAgreedTerm::new(Uuid::new_v4(), category, "detail");
        if mandatory { pat.mandatory() } else { pat }
    }

    fn matched(categories: &[&str]) -> HashSet<String> {
        categories.iter().map(|c| normalize_text(c)).collect()
    }

    #[test]
    fn one_satisfied_comparison_clears_the_category() {
        let pats = vec![pat("Payment Terms", true)];
        let report =
            missing_mandatory_report(Uuid::new_v4(), &pats, &matched(&["Payment Terms"]));
        assert!(report.missing.is_empty());
        assert!(report.discrepancies.is_empty());
    }

    #[test]
    fn unmatched_mandatory_is_reported_once() {
        let pats = vec![
            pat("Brand Name", true),
            pat("Brand Name", true),
            pat("Usage Rights", false),
        ];
        let report = missing_mandatory_report(Uuid::new_v4(), &pats, &matched(&[]));

        assert_eq!(report.missing.len(), 1);
        assert_eq!(report.missing[0].term_category, "Brand Name");
        assert_eq!(report.discrepancies.len(), 1);
        assert!(report.discrepancies[0].clause_boundary_id.is_none());
    }

    #[test]
    fn category_matching_is_case_insensitive() {
        let pats = vec![pat("Payment Terms", true)];
        let report =
            missing_mandatory_report(Uuid::new_v4(), &pats, &matched(&["payment  terms"]));
        assert!(report.missing.is_empty());
    }

    #[test]
    fn optional_terms_are_never_reported() {
        let pats = vec![pat("Usage Rights", false)];
        let report = missing_mandatory_report(Uuid::new_v4(), &pats, &matched(&[]));
        assert!(report.missing.is_empty());
    }
}
