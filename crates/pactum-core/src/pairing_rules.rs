//! Table-driven keyword rules for pairing clauses with term categories.

use crate::text::ClauseTypeNormalizer;

/// One keyword entry: a clause type and a term category pair only when both
/// hit keywords belonging to the same entry.
#[derive(Debug, Clone)]
pub struct PairingEntry {
    /// Stable entry key, used in pairing diagnostics
    pub key: String,
    /// Keywords; a side hits when its normalized label contains any of them
    pub keywords: Vec<String>,
}

impl PairingEntry {
    fn new(key: &str, keywords: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    fn hits(&self, normalized_label: &str) -> bool {
        self.keywords.iter().any(|k| normalized_label.contains(k.as_str()))
    }
}

/// The keyword map used for fast-path pairing.
///
/// Matching is deliberately tight: a pairing requires the clause type and the
/// term *category* to hit the same entry. Term descriptions are never
/// consulted, which is what keeps "Creative Requirements" from pairing with a
/// termination clause just because the description mentions a deadline.
#[derive(Debug, Clone)]
pub struct PairingRules {
    entries: Vec<PairingEntry>,
}

impl Default for PairingRules {
    fn default() -> Self {
        Self::standard()
    }
}

impl PairingRules {
    /// The built-in keyword map.
    pub fn standard() -> Self {
        Self {
            entries: vec![
                PairingEntry::new(
                    "payment",
                    &["payment", "fee", "compensation", "invoice", "remuneration"],
                ),
                PairingEntry::new(
                    "usage",
                    &["usage", "rights", "license", "licensing", "utilization"],
                ),
                PairingEntry::new(
                    "deliverable",
                    &["deliverable", "delivery", "deadline", "scope", "output"],
                ),
                PairingEntry::new("exclusivity", &["exclusivity", "exclusive", "non-compete"]),
                PairingEntry::new("approval", &["approval", "approve", "review", "consent"]),
                PairingEntry::new(
                    "confidentiality",
                    &["confidential", "nda", "secret", "proprietary"],
                ),
                PairingEntry::new(
                    "termination",
                    &["termination", "terminate", "cancel", "cancellation"],
                ),
                PairingEntry::new(
                    "indemnification",
                    &["indemn", "liability", "warranty", "insurance"],
                ),
                PairingEntry::new(
                    "intellectual",
                    &[
                        "intellectual",
                        "ip",
                        "copyright",
                        "trademark",
                        "ownership",
                        "rights",
                    ],
                ),
                PairingEntry::new(
                    "creative",
                    &["creative", "requirement", "standard", "guideline"],
                ),
                PairingEntry::new("posting", &["posting", "schedule", "publish"]),
                PairingEntry::new("disclosure", &["disclosure", "ftc", "compliance"]),
                PairingEntry::new("analytics", &["analytics", "metric", "report", "data"]),
            ],
        }
    }

    /// Adds an entry, enabling data-only extension of the map.
    pub fn with_entry(mut self, key: &str, keywords: &[&str]) -> Self {
        self.entries.push(PairingEntry::new(key, keywords));
        self
    }

    /// Returns the key of the first entry hit by both the clause type and
    /// the term category, or `None` when no entry is hit by both.
    pub fn pair(&self, clause_type: &str, term_category: &str) -> Option<&str> {
        let clause = ClauseTypeNormalizer::normalize(clause_type);
        let category = ClauseTypeNormalizer::normalize(term_category);
        self.entries
            .iter()
            .find(|entry| entry.hits(&clause) && entry.hits(&category))
            .map(|entry| entry.key.as_str())
    }
}
