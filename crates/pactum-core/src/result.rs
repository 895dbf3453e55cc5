//! Persisted reconciliation outputs: match results, analysis records,
//! update history and discrepancies.

use crate::rag::{ComparisonSeverity, RagColor, RagStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The best library template found for a clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopMatch {
    /// Library entry id
    pub template_id: Uuid,
    /// Human-readable clause code of the template
    pub clause_code: String,
    /// Clause type of the template
    pub clause_type: String,
    /// Cosine similarity in `[0, 1]`
    pub similarity: f64,
}

/// Where a clause-vs-term comparison came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonSource {
    /// Produced by the batched LLM comparator
    Llm,
    /// Produced by the identity term resolver (string presence)
    Identity,
    /// Synthesized after adapter degradation
    Degraded,
}

/// Result of comparing one clause against one pre-agreed term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreAgreedComparison {
    /// The term compared against
    pub pat_id: Uuid,
    /// Term category label at comparison time
    pub term_category: String,
    /// Whether the clause honors the term
    pub matches: bool,
    /// Severity of the deviation when `matches` is false
    pub severity: ComparisonSeverity,
    /// One-line risk summary
    pub risk_summary: String,
    /// Specific differences found
    pub differences: Vec<String>,
    /// Comparator confidence in `[0, 1]`
    pub confidence: f64,
    /// Provenance of this comparison
    pub source: ComparisonSource,
}

/// Direction of a rights transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    TalentToBrand,
    BrandToTalent,
    Mutual,
    Unclear,
}

impl TransferDirection {
    /// Direction compatibility policy.
    ///
    /// An unclear direction on either side is compatible (ambiguous signals
    /// never downgrade); otherwise the directions must agree or either must
    /// be mutual.
    pub fn compatible(contract: Self, library: Self) -> bool {
        if contract == Self::Unclear || library == Self::Unclear {
            return true;
        }
        contract == library || contract == Self::Mutual || library == Self::Mutual
    }
}

/// Outcome of validating a rights-transfer direction against the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionValidation {
    /// Whether the directions are compatible
    pub direction_match: bool,
    /// Direction asserted by the contract clause
    pub contract_direction: TransferDirection,
    /// Direction asserted by the library template
    pub library_direction: TransferDirection,
    /// Validator confidence in `[0, 1]`
    pub confidence: f64,
    /// Short rationale
    pub reasoning: String,
}

impl DirectionValidation {
    /// Builds a validation record, deriving `direction_match` from the
    /// compatibility policy rather than trusting the adapter's own flag.
    pub fn resolve(
        contract_direction: TransferDirection,
        library_direction: TransferDirection,
        confidence: f64,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            direction_match: TransferDirection::compatible(contract_direction, library_direction),
            contract_direction,
            library_direction,
            confidence,
            reasoning: reasoning.into(),
        }
    }
}

/// Structured analysis attached to a match result.
///
/// Internally this is a set of tagged records; it is serialized to a JSON
/// column only at the repository boundary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GptAnalysis {
    /// Best library match, when one was assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_match: Option<TopMatch>,
    /// All clause-vs-term comparisons for this clause
    pub pre_agreed_comparisons: Vec<PreAgreedComparison>,
    /// Direction validation, when the clause was direction-sensitive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction_validation: Option<DirectionValidation>,
    /// Degradation or skip reason, when analysis was incomplete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GptAnalysis {
    /// Serializes the analysis for the storage boundary.
    pub fn to_json(&self) -> crate::error::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Whether the direction validator found a mismatch.
    pub fn direction_mismatch(&self) -> bool {
        self.direction_validation
            .as_ref()
            .is_some_and(|v| !v.direction_match)
    }
}

/// Head row of the reconciliation output for one clause boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseMatchResult {
    /// Unique identifier
    pub id: Uuid,
    /// Document the clause belongs to
    pub document_id: Uuid,
    /// The clause this result describes; unique per head row
    pub clause_boundary_id: Uuid,
    /// Assigned library template, when similarity cleared the floor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_template_id: Option<Uuid>,
    /// Best cosine similarity in `[0, 1]`
    pub similarity_score: f64,
    /// Parsing-quality sub-score
    pub rag_parsing: RagColor,
    /// Substantive-risk sub-score
    pub rag_risk: RagColor,
    /// Composed status
    pub rag_status: RagStatus,
    /// Structured analysis
    pub gpt_analysis: GptAnalysis,
    /// Monotonic version, strictly increasing per clause boundary
    pub version: u32,
    /// Status of the previous version, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_rag_status: Option<RagStatus>,
    /// Why this version was written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_reason: Option<String>,
    /// Actor that wrote this version
    pub updated_by: String,
    /// Write timestamp
    pub updated_at: DateTime<Utc>,
}

impl ClauseMatchResult {
    /// Structural equality over the observable analysis fields.
    ///
    /// Versioning metadata (`version`, `previous_rag_status`,
    /// `update_reason`, `updated_by`, `updated_at`) is ignored: two results
    /// that agree here describe the same analysis, and a rerun must not bump
    /// the version for them.
    pub fn observable_eq(&self, other: &Self) -> bool {
        self.clause_boundary_id == other.clause_boundary_id
            && self.matched_template_id == other.matched_template_id
            && self.similarity_score == other.similarity_score
            && self.rag_parsing == other.rag_parsing
            && self.rag_risk == other.rag_risk
            && self.rag_status == other.rag_status
            && self.gpt_analysis == other.gpt_analysis
    }
}

/// Append-only audit row recording a status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseUpdateHistory {
    /// Unique identifier
    pub id: Uuid,
    /// The clause whose result changed
    pub clause_boundary_id: Uuid,
    /// Version that was written
    pub version: u32,
    /// Status before the write, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<RagStatus>,
    /// Status after the write
    pub new_status: RagStatus,
    /// Machine-readable reason for the transition
    pub reason_code: String,
    /// When the transition was recorded
    pub recorded_at: DateTime<Utc>,
}

impl ClauseUpdateHistory {
    /// Builds the history row for an accepted upsert.
    pub fn for_transition(
        result: &ClauseMatchResult,
        old_status: Option<RagStatus>,
        reason_code: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            clause_boundary_id: result.clause_boundary_id,
            version: result.version,
            old_status,
            new_status: result.rag_status,
            reason_code: reason_code.into(),
            recorded_at: result.updated_at,
        }
    }
}

/// Kind of divergence between contract and expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyType {
    Missing,
    Modified,
    Additional,
    Position,
    Conflicting,
}

/// Reviewer-facing severity of a discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancySeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl From<ComparisonSeverity> for DiscrepancySeverity {
    fn from(severity: ComparisonSeverity) -> Self {
        match severity {
            ComparisonSeverity::None => Self::Low,
            ComparisonSeverity::Minor => Self::Medium,
            ComparisonSeverity::Major => Self::High,
        }
    }
}

/// A recorded divergence, bound to a clause or (for missing mandatory terms)
/// to the deal as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Unique identifier
    pub id: Uuid,
    /// Document the discrepancy was found in
    pub document_id: Uuid,
    /// The clause involved; `None` for deal-level discrepancies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause_boundary_id: Option<Uuid>,
    /// Kind of divergence
    pub discrepancy_type: DiscrepancyType,
    /// Severity
    pub severity: DiscrepancySeverity,
    /// Term category involved, when the discrepancy concerns a term
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_category: Option<String>,
    /// Human-readable description
    pub description: String,
}

impl Discrepancy {
    /// Builds a deal-level discrepancy for an unsatisfied mandatory term.
    pub fn missing_mandatory(document_id: Uuid, term_category: impl Into<String>) -> Self {
        let term_category = term_category.into();
        Self {
            id: Uuid::new_v4(),
            document_id,
            clause_boundary_id: None,
            discrepancy_type: DiscrepancyType::Missing,
            severity: DiscrepancySeverity::High,
            description: format!("mandatory term \"{term_category}\" has no matching clause"),
            term_category: Some(term_category),
        }
    }

    /// Builds a clause-level discrepancy for a failed comparison.
    pub fn from_comparison(
        document_id: Uuid,
        clause_boundary_id: Uuid,
        comparison: &PreAgreedComparison,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            clause_boundary_id: Some(clause_boundary_id),
            discrepancy_type: DiscrepancyType::Modified,
            severity: comparison.severity.into(),
            term_category: Some(comparison.term_category.clone()),
            description: comparison.risk_summary.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> ClauseMatchResult {
        ClauseMatchResult {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            clause_boundary_id: Uuid::new_v4(),
            matched_template_id: Some(Uuid::new_v4()),
            similarity_score: 0.88,
            rag_parsing: RagColor::Green,
            rag_risk: RagColor::Green,
            rag_status: RagStatus::Green,
            gpt_analysis: GptAnalysis::default(),
            version: 1,
            previous_rag_status: None,
            update_reason: None,
            updated_by: "reviewer-1".to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn observable_eq_ignores_versioning_metadata() {
        let a = sample_result();
        let mut b = a.clone();
        b.version = 7;
        b.updated_by = "someone-else".to_string();
        b.updated_at = Utc::now();
        b.update_reason = Some("rerun".to_string());
        assert!(a.observable_eq(&b));

        b.rag_status = RagStatus::Amber;
        assert!(!a.observable_eq(&b));
    }

    #[test]
    fn direction_compatibility_policy() {
        use TransferDirection::*;
        assert!(TransferDirection::compatible(Unclear, BrandToTalent));
        assert!(TransferDirection::compatible(TalentToBrand, Unclear));
        assert!(TransferDirection::compatible(Mutual, BrandToTalent));
        assert!(TransferDirection::compatible(TalentToBrand, TalentToBrand));
        assert!(!TransferDirection::compatible(TalentToBrand, BrandToTalent));
    }

    #[test]
    fn resolve_overrides_adapter_flag() {
        let v = DirectionValidation::resolve(
            TransferDirection::TalentToBrand,
            TransferDirection::BrandToTalent,
            0.9,
            "contract grants to brand, template grants to talent",
        );
        assert!(!v.direction_match);
    }

    #[test]
    fn missing_mandatory_is_deal_level() {
        let d = Discrepancy::missing_mandatory(Uuid::new_v4(), "Brand Name");
        assert_eq!(d.discrepancy_type, DiscrepancyType::Missing);
        assert_eq!(d.severity, DiscrepancySeverity::High);
        assert!(d.clause_boundary_id.is_none());
    }

    #[test]
    fn comparison_severity_maps_to_discrepancy_severity() {
        assert_eq!(
            DiscrepancySeverity::from(ComparisonSeverity::Major),
            DiscrepancySeverity::High
        );
        assert_eq!(
            DiscrepancySeverity::from(ComparisonSeverity::Minor),
            DiscrepancySeverity::Medium
        );
    }
}
