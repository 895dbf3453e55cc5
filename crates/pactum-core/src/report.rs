//! Run-level reporting returned by the reconciliation orchestrator.

use crate::rag::RagStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall outcome of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// All clauses were processed and persisted
    Ok,
    /// Some clauses could not be persisted after retries
    Partial,
    /// The document has no clause boundaries
    NoClauses,
    /// The run was cancelled cooperatively
    Cancelled,
}

/// Per-status clause counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RagCounts {
    pub green: usize,
    pub amber: usize,
    pub red: usize,
}

impl RagCounts {
    /// Tallies one composed status.
    pub fn record(&mut self, status: RagStatus) {
        match status {
            RagStatus::Green => self.green += 1,
            RagStatus::Amber => self.amber += 1,
            RagStatus::Red => self.red += 1,
        }
    }

    /// Total clauses counted.
    pub fn total(&self) -> usize {
        self.green + self.amber + self.red
    }
}

/// Machine-readable warning codes surfaced in the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCode {
    /// Boundary confidence below the floor, or empty content; clause skipped
    ParsingQuality,
    /// Adapter retries exhausted; clause degraded to amber
    AnalysisUnavailable,
    /// Comparator response failed schema parsing twice; synthetic results used
    LlmParseError,
    /// The comparator response omitted a batch index
    MissingBatchIndex,
    /// Direction validation unavailable; treated as a conservative match
    DirectionUnavailable,
    /// CAS reject persisted twice; clause result dropped
    VersionConflict,
    /// Repository write failed after retries; run is partial
    PersistenceFailure,
}

/// A warning attached to a run, optionally bound to a clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunWarning {
    /// The clause involved, when the warning is clause-scoped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clause_id: Option<Uuid>,
    /// What went wrong
    pub code: WarningCode,
}

impl RunWarning {
    /// Creates a clause-scoped warning.
    pub fn for_clause(clause_id: Uuid, code: WarningCode) -> Self {
        Self {
            clause_id: Some(clause_id),
            code,
        }
    }

    /// Creates a run-scoped warning.
    pub fn for_run(code: WarningCode) -> Self {
        Self {
            clause_id: None,
            code,
        }
    }
}

/// A mandatory term category with no satisfying match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingMandatory {
    /// The unmatched category label
    pub term_category: String,
    /// Why the category is considered unmatched
    pub reason: String,
}

/// Version persisted for one clause during this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub clause_id: Uuid,
    pub version: u32,
}

/// Complete result of one `reconcile` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Document that was reconciled
    pub document_id: Uuid,
    /// Overall outcome
    pub status: RunStatus,
    /// Per-status clause counts
    pub counts: RagCounts,
    /// Mandatory categories with no satisfying match
    pub missing_mandatory: Vec<MissingMandatory>,
    /// Warnings accumulated during the run
    pub warnings: Vec<RunWarning>,
    /// Wall-clock duration of the run
    pub duration_ms: u64,
    /// Version persisted per clause
    pub version_snapshot: Vec<VersionSnapshot>,
}

impl ReconciliationReport {
    /// Creates an empty report with the given status.
    pub fn empty(document_id: Uuid, status: RunStatus) -> Self {
        Self {
            document_id,
            status,
            counts: RagCounts::default(),
            missing_mandatory: Vec::new(),
            warnings: Vec::new(),
            duration_ms: 0,
            version_snapshot: Vec::new(),
        }
    }
}
