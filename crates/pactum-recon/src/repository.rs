//! Repository seam for reconciliation inputs and outputs.
//!
//! The engine owns all writes to clause match results; monotonicity is
//! enforced here, at the storage boundary, through a compare-and-swap on the
//! per-clause `version`. Application-level ordering is never relied upon.

use async_trait::async_trait;
use pactum_core::{
    ClauseBoundary, ClauseMatchResult, ClauseUpdateHistory, Discrepancy, LibraryClause,
    PreAgreedTerm, Result,
};
use uuid::Uuid;

/// Bulk-loaded inputs for one reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationInputs {
    /// Pre-extracted clause boundaries of the document
    pub clauses: Vec<ClauseBoundary>,
    /// Pre-agreed terms of the deal; may legitimately be empty
    pub pats: Vec<PreAgreedTerm>,
    /// Library clauses visible to the document's tenant
    pub library: Vec<LibraryClause>,
    /// Full text of the contract, for identity resolution
    pub full_contract_text: String,
}

/// Result of a compare-and-swap upsert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Whether the candidate was written
    pub accepted: bool,
    /// The head version after the attempt
    pub current_version: u32,
}

/// Typed access to reconciliation state.
///
/// Implementations back onto a relational + vector store; the in-memory
/// [`MemoryRepository`](crate::MemoryRepository) serves tests and embedded
/// hosts. Transient backend failures must surface as retryable
/// `ReconError::Repository` values so the orchestrator's backoff ladder can
/// do its job.
#[async_trait]
pub trait ReconRepository: Send + Sync {
    /// Bulk-fetches everything a run needs for one document.
    ///
    /// Returns an input error for an unknown document. The PAT list is
    /// returned even when empty; the orchestrator uses that to decide
    /// whether the comparison stages run at all.
    async fn load_reconciliation_inputs(&self, document_id: Uuid) -> Result<ReconciliationInputs>;

    /// Reads the head match result for a clause boundary.
    async fn get_clause_result(
        &self,
        clause_boundary_id: Uuid,
    ) -> Result<Option<ClauseMatchResult>>;

    /// Compare-and-swap on the head row.
    ///
    /// Accepts iff `candidate.version` is strictly greater than the stored
    /// version; on reject the stored row is untouched and its version is
    /// returned. This is the sole monotonicity gate in the system.
    async fn upsert_match_result(&self, candidate: &ClauseMatchResult) -> Result<UpsertOutcome>;

    /// Appends an audit row for an accepted upsert.
    ///
    /// Backends couple this to the upsert in one transaction.
    async fn append_history(&self, row: &ClauseUpdateHistory) -> Result<()>;

    /// Replaces the discrepancy set recorded for a document.
    async fn write_discrepancies(&self, document_id: Uuid, rows: &[Discrepancy]) -> Result<()>;

    /// Lists the discrepancies recorded for a document.
    async fn list_discrepancies(&self, document_id: Uuid) -> Result<Vec<Discrepancy>>;
}
