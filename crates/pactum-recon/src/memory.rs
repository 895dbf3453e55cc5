//! In-memory repository for tests and embedded hosts.

use crate::repository::{ReconRepository, ReconciliationInputs, UpsertOutcome};
use async_trait::async_trait;
use pactum_core::{
    ClauseMatchResult, ClauseUpdateHistory, Discrepancy, ReconError, Result,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    documents: HashMap<Uuid, ReconciliationInputs>,
    results: HashMap<Uuid, ClauseMatchResult>,
    history: Vec<ClauseUpdateHistory>,
    discrepancies: HashMap<Uuid, Vec<Discrepancy>>,
}

/// Repository backed by process memory.
///
/// Enforces exactly the invariants a SQL implementation would: the version
/// CAS on head rows and append-only history. Useful for integration tests
/// and single-process deployments.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds (or replaces) a document's reconciliation inputs.
    pub async fn insert_document(&self, document_id: Uuid, inputs: ReconciliationInputs) {
        let mut state = self.state.write().await;
        state.documents.insert(document_id, inputs);
    }

    /// All history rows recorded for a clause boundary, in append order.
    pub async fn history_for(&self, clause_boundary_id: Uuid) -> Vec<ClauseUpdateHistory> {
        let state = self.state.read().await;
        state
            .history
            .iter()
            .filter(|row| row.clause_boundary_id == clause_boundary_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ReconRepository for MemoryRepository {
    async fn load_reconciliation_inputs(&self, document_id: Uuid) -> Result<ReconciliationInputs> {
        let state = self.state.read().await;
        state
            .documents
            .get(&document_id)
            .cloned()
            .ok_or_else(|| ReconError::input(format!("unknown document {document_id}")))
    }

    async fn get_clause_result(
        &self,
        clause_boundary_id: Uuid,
    ) -> Result<Option<ClauseMatchResult>> {
        let state = self.state.read().await;
        Ok(state.results.get(&clause_boundary_id).cloned())
    }

    async fn upsert_match_result(&self, candidate: &ClauseMatchResult) -> Result<UpsertOutcome> {
        let mut state = self.state.write().await;
        match state.results.get(&candidate.clause_boundary_id) {
            Some(current) if candidate.version <= current.version => Ok(UpsertOutcome {
                accepted: false,
                current_version: current.version,
            }),
            _ => {
                state
                    .results
                    .insert(candidate.clause_boundary_id, candidate.clone());
                Ok(UpsertOutcome {
                    accepted: true,
                    current_version: candidate.version,
                })
            }
        }
    }

    async fn append_history(&self, row: &ClauseUpdateHistory) -> Result<()> {
        let mut state = self.state.write().await;
        state.history.push(row.clone());
        Ok(())
    }

    async fn write_discrepancies(&self, document_id: Uuid, rows: &[Discrepancy]) -> Result<()> {
        let mut state = self.state.write().await;
        state.discrepancies.insert(document_id, rows.to_vec());
        Ok(())
    }

    async fn list_discrepancies(&self, document_id: Uuid) -> Result<Vec<Discrepancy>> {
        let state = self.state.read().await;
        Ok(state
            .discrepancies
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }
}
