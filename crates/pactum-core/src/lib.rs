//! Pactum-Core: types and scoring rules for the Pactum reconciliation engine.
//!
//! This crate defines the data model shared by the whole workspace (clause
//! boundaries, the legal clause library, pre-agreed terms, match results,
//! discrepancies) together with the pure scoring rules: traffic-light
//! composition, similarity tiers, keyword pairing and text normalization.
//!
//! Everything here is synchronous and side-effect free. Adapter traits live
//! in `pactum-llm`; the pipeline that ties them together lives in
//! `pactum-recon`.
//!
//! ## Design notes
//!
//! - Analysis payloads ([`GptAnalysis`] and its records) are tagged structs,
//!   not free-form JSON; serialization happens only at the repository
//!   boundary via [`GptAnalysis::to_json`].
//! - All normalization goes through [`ClauseTypeNormalizer`] and
//!   [`text::normalize_text`], so pairing, identity resolution and prompts
//!   agree on label shape.
//! - Calibrated thresholds are fields on [`ReconcileConfig`] with the
//!   production values as defaults, never inline constants.

mod clause;
mod config;
mod error;
mod library;
mod pairing_rules;
mod rag;
mod report;
mod result;
mod terms;
pub mod text;

pub use clause::ClauseBoundary;
pub use config::ReconcileConfig;
pub use error::{ReconError, Result};
pub use library::{ClauseCategory, LibraryClause, RiskLevel};
pub use pairing_rules::{PairingEntry, PairingRules};
pub use rag::{ComparisonSeverity, RagColor, RagStatus, risk_from_severities, similarity_tier};
pub use report::{
    MissingMandatory, RagCounts, ReconciliationReport, RunStatus, RunWarning, VersionSnapshot,
    WarningCode,
};
pub use result::{
    ClauseMatchResult, ClauseUpdateHistory, ComparisonSource, Discrepancy, DiscrepancySeverity,
    DiscrepancyType, DirectionValidation, GptAnalysis, PreAgreedComparison, TopMatch,
    TransferDirection,
};
pub use terms::{PreAgreedTerm, is_identity_category};
pub use text::ClauseTypeNormalizer;
