//! Traffic-light scoring: sub-scores, composition rules, similarity tiers.

use serde::{Deserialize, Serialize};

/// Sub-score color for parsing quality and substantive risk.
///
/// `Blue` is accepted on `rag_parsing` input (an upstream "informational"
/// marker) but is never produced by this engine; composition treats it as
/// neither green nor red.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagColor {
    Green,
    Amber,
    Red,
    Blue,
}

impl RagColor {
    /// Whether this color is green.
    pub fn is_green(self) -> bool {
        matches!(self, Self::Green)
    }

    /// Whether this color is red.
    pub fn is_red(self) -> bool {
        matches!(self, Self::Red)
    }
}

/// Composite per-clause judgement shown to reviewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RagStatus {
    Green,
    Amber,
    Red,
}

impl RagStatus {
    /// Composes the final status from the two sub-scores and the direction
    /// check.
    ///
    /// The rules, in order:
    /// - a red sub-score is always red (never double-penalized further);
    /// - a direction mismatch downgrades a would-be green to amber, and
    ///   anything weaker to red;
    /// - both sub-scores green is green;
    /// - everything else is amber.
    ///
    /// A direction match never upgrades: amber sub-scores stay amber.
    pub fn compose(parsing: RagColor, risk: RagColor, direction_mismatch: bool) -> Self {
        if parsing.is_red() || risk.is_red() {
            return Self::Red;
        }
        if direction_mismatch {
            return if parsing.is_green() && risk.is_green() {
                Self::Amber
            } else {
                Self::Red
            };
        }
        if parsing.is_green() && risk.is_green() {
            Self::Green
        } else {
            Self::Amber
        }
    }
}

/// Severity of a single clause-vs-term comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonSeverity {
    None,
    Minor,
    Major,
}

/// Derives the per-clause risk sub-score from its comparison severities.
///
/// Any major difference is red; otherwise any minor difference is amber;
/// a clause with no adverse findings is green.
pub fn risk_from_severities<I>(severities: I) -> RagColor
where
    I: IntoIterator<Item = ComparisonSeverity>,
{
    let mut worst = RagColor::Green;
    for severity in severities {
        match severity {
            ComparisonSeverity::Major => return RagColor::Red,
            ComparisonSeverity::Minor => worst = RagColor::Amber,
            ComparisonSeverity::None => {}
        }
    }
    worst
}

/// Maps a library-match cosine similarity to the parsing sub-score tier.
///
/// At or above `green_cutoff` the clause is a candidate green (subject to
/// later downgrade); between `amber_floor` and the cutoff it is amber; below
/// the floor it is red and no template is assigned.
pub fn similarity_tier(similarity: f64, green_cutoff: f64, amber_floor: f64) -> RagColor {
    if similarity >= green_cutoff {
        RagColor::Green
    } else if similarity >= amber_floor {
        RagColor::Amber
    } else {
        RagColor::Red
    }
}
