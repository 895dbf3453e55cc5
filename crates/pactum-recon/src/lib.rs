//! Pactum-Recon: the reconciliation engine.
//!
//! Given a document's pre-extracted clause boundaries, the deal's
//! pre-agreed terms and the curated clause library, the engine produces a
//! traffic-light assessment per clause and a missing-mandatory report per
//! deal, persisted with monotonic versioning.
//!
//! The pipeline, in dependency order:
//!
//! 1. [`LibraryMatcher`]: ranked cosine search over the active library;
//! 2. [`PairingEngine`]: which terms does each clause speak to;
//! 3. [`IdentityTermResolver`]: party-name terms checked by string presence;
//! 4. [`BatchComparator`]: batched LLM comparison of clause-term pairs;
//! 5. [`DirectionValidator`]: rights-transfer direction for sensitive types;
//! 6. [`RagStatus::compose`](pactum_core::RagStatus::compose): sub-score
//!    composition;
//! 7. [`missing_mandatory_report`]: the per-deal mandate sweep;
//! 8. [`ReconciliationOrchestrator`]: ties the stages together with bounded
//!    concurrency, retries, degradation and the version CAS.
//!
//! Storage sits behind [`ReconRepository`]; [`MemoryRepository`] is the
//! in-process implementation used by tests and embedded hosts.

mod comparator;
mod direction;
mod identity;
mod mandatory;
mod matcher;
mod memory;
mod orchestrator;
mod pairing;
mod repository;

pub use comparator::{
    BatchComparator, BatchOutcome, BatchRow, ComparisonBatch, ComparisonTask, build_batches,
};
pub use direction::{
    DirectionOutcome, DirectionTask, DirectionValidator, SENSITIVE_TOKENS, is_direction_sensitive,
};
pub use identity::{IdentityMatchType, IdentityResolution, IdentityTermResolver};
pub use mandatory::{MandatoryReport, missing_mandatory_report};
pub use matcher::{LibraryCandidate, LibraryMatcher};
pub use memory::MemoryRepository;
pub use orchestrator::ReconciliationOrchestrator;
pub use pairing::{PairingEngine, PairingMethod, PatPairing, SemanticPairingResult};
pub use repository::{ReconRepository, ReconciliationInputs, UpsertOutcome};
