//! End-to-end reconciliation scenarios against the in-memory repository
//! with scripted adapters.

use pactum_core::{
    ClauseBoundary, ClauseCategory, LibraryClause, PreAgreedTerm, RagColor, RagStatus,
    ReconError, ReconcileConfig, RiskLevel, RunStatus, WarningCode,
};
use pactum_llm::testing::{HashEmbedder, ScriptedLlm};
use pactum_llm::RetryConfig;
use pactum_recon::{
    MemoryRepository, ReconRepository, ReconciliationInputs, ReconciliationOrchestrator,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Substring present in every comparison prompt.
const COMPARISON_PROMPT_KEY: &str = "honors the pre-agreed term";
/// Substring present in every direction prompt.
const DIRECTION_PROMPT_KEY: &str = "rights are transferred";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .with_initial_delay(Duration::from_millis(1))
        .with_max_delay(Duration::from_millis(2))
        .with_jitter(0.0)
}

/// Unit vector along the first axis; clause embeddings are pinned to this.
fn axis() -> Vec<f32> {
    vec![1.0, 0.0, 0.0, 0.0]
}

/// A unit vector whose cosine with [`axis`] is exactly `target`.
fn vector_with_cosine(target: f32) -> Vec<f32> {
    vec![target, (1.0 - target * target).sqrt(), 0.0, 0.0]
}

fn library_entry(code: &str, clause_type: &str, text: &str, cosine: f32) -> LibraryClause {
    LibraryClause::new(code, clause_type, text)
        .with_category(ClauseCategory::Financial)
        .with_risk_level(RiskLevel::Medium)
        .with_embedding(vector_with_cosine(cosine))
}

async fn seeded_repo(document_id: Uuid, inputs: ReconciliationInputs) -> Arc<MemoryRepository> {
    let repo = Arc::new(MemoryRepository::new());
    repo.insert_document(document_id, inputs).await;
    repo
}

fn orchestrator(
    repo: Arc<MemoryRepository>,
    embedder: HashEmbedder,
    llm: ScriptedLlm,
) -> ReconciliationOrchestrator<MemoryRepository, HashEmbedder, ScriptedLlm> {
    init_tracing();
    ReconciliationOrchestrator::new(repo, Arc::new(embedder), Arc::new(llm))
        .with_retry(fast_retry())
}

#[tokio::test]
async fn payment_happy_path_is_green() {
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    let deal_id = Uuid::new_v4();

    let content = "Payable within 30 days of valid invoice.";
    let clause = ClauseBoundary::new(document_id, tenant_id, "payment_terms", content);
    let pat = PreAgreedTerm::new(deal_id, "Payment Terms", "Pay within 30 days").mandatory();
    let template = library_entry(
        "PAY-001",
        "payment_terms",
        "Payment shall be made within thirty days of receipt of a valid invoice.",
        0.88,
    );
    let template_id = template.id;

    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: vec![clause.clone()],
            pats: vec![pat],
            library: vec![template],
            full_contract_text: content.to_string(),
        },
    )
    .await;

    let embedder = HashEmbedder::new(4).with_vector(content, axis());
    let llm = ScriptedLlm::new()
        .with_response_for(
            COMPARISON_PROMPT_KEY,
            json!([{
                "idx": 0,
                "matches": true,
                "severity": "none",
                "risk_summary": "",
                "differences": [],
                "confidence": 0.95
            }]),
        )
        .with_response_for(
            DIRECTION_PROMPT_KEY,
            json!([{
                "idx": 0,
                "contract_direction": "mutual",
                "library_direction": "mutual",
                "confidence": 0.9,
                "reasoning": "payment obligations run both ways"
            }]),
        );

    let engine = orchestrator(Arc::clone(&repo), embedder, llm);
    let report = engine.reconcile(document_id, "reviewer-1", None).await.unwrap();

    assert_eq!(report.status, RunStatus::Ok);
    assert_eq!(report.counts.green, 1);
    assert_eq!(report.counts.total(), 1);
    assert!(report.missing_mandatory.is_empty());
    assert!(report.warnings.is_empty());

    let result = repo.get_clause_result(clause.id).await.unwrap().unwrap();
    assert_eq!(result.rag_parsing, RagColor::Green);
    assert_eq!(result.rag_risk, RagColor::Green);
    assert_eq!(result.rag_status, RagStatus::Green);
    assert_eq!(result.matched_template_id, Some(template_id));
    assert!(result.similarity_score > 0.87 && result.similarity_score < 0.89);
    assert_eq!(result.version, 1);
    assert!(!result.gpt_analysis.direction_mismatch());
    assert_eq!(result.gpt_analysis.pre_agreed_comparisons.len(), 1);
    assert!(result.gpt_analysis.pre_agreed_comparisons[0].matches);

    let history = repo.history_for(clause.id).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version, 1);
    assert_eq!(history[0].new_status, RagStatus::Green);
}

#[tokio::test]
async fn one_green_comparison_satisfies_the_mandatory_category() {
    // One mandatory term paired with eleven clauses; the LLM finds a single
    // match. The category must not be reported missing, while every
    // non-matching clause still goes red.
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    let deal_id = Uuid::new_v4();

    let clauses: Vec<ClauseBoundary> = (0..11)
        .map(|i| {
            ClauseBoundary::new(
                document_id,
                tenant_id,
                // Not a direction-sensitive type; keeps this scenario on C6 only.
                "payment_schedule",
                format!("Payment schedule variant {i} with bespoke wording."),
            )
        })
        .collect();
    let pat = PreAgreedTerm::new(deal_id, "Payment Terms", "Pay within 30 days").mandatory();
    let template = library_entry(
        "PAY-002",
        "payment_schedule",
        "Standard payment schedule clause.",
        1.0,
    );

    let mut embedder = HashEmbedder::new(4);
    for clause in &clauses {
        embedder = embedder.with_vector(clause.content.clone(), axis());
    }

    // idx 3 matches; everything else conflicts.
    let rows: Vec<_> = (0..11)
        .map(|idx| {
            if idx == 3 {
                json!({"idx": idx, "matches": true, "severity": "none", "confidence": 0.9})
            } else {
                json!({
                    "idx": idx,
                    "matches": false,
                    "severity": "major",
                    "risk_summary": "conflicts with agreed payment terms",
                    "differences": ["payment window"],
                    "confidence": 0.85
                })
            }
        })
        .collect();
    let llm = ScriptedLlm::new().with_response_for(COMPARISON_PROMPT_KEY, json!(rows));

    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: clauses.clone(),
            pats: vec![pat],
            library: vec![template],
            full_contract_text: "full text".to_string(),
        },
    )
    .await;

    let engine = orchestrator(Arc::clone(&repo), embedder, llm);
    let report = engine.reconcile(document_id, "reviewer-1", None).await.unwrap();

    assert_eq!(report.status, RunStatus::Ok);
    assert!(
        report.missing_mandatory.is_empty(),
        "one green comparison must satisfy the category"
    );
    assert_eq!(report.counts.green, 1);
    assert_eq!(report.counts.red, 10);

    let green = repo.get_clause_result(clauses[3].id).await.unwrap().unwrap();
    assert_eq!(green.rag_status, RagStatus::Green);
    let red = repo.get_clause_result(clauses[0].id).await.unwrap().unwrap();
    assert_eq!(red.rag_status, RagStatus::Red);
    assert_eq!(red.rag_risk, RagColor::Red);
}

#[tokio::test]
async fn direction_mismatch_downgrades_green_to_amber() {
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();

    let content = "Talent grants Brand irrevocable usage rights to all content.";
    let clause = ClauseBoundary::new(document_id, tenant_id, "usage_rights", content);
    let template = library_entry(
        "USE-001",
        "usage_rights",
        "Brand grants Talent a limited license to approved content.",
        0.86,
    );

    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: vec![clause.clone()],
            pats: Vec::new(),
            library: vec![template],
            full_contract_text: content.to_string(),
        },
    )
    .await;

    let embedder = HashEmbedder::new(4).with_vector(content, axis());
    let llm = ScriptedLlm::new().with_response_for(
        DIRECTION_PROMPT_KEY,
        json!([{
            "idx": 0,
            "contract_direction": "talent_to_brand",
            "library_direction": "brand_to_talent",
            "confidence": 0.92,
            "reasoning": "contract grants to brand, template grants to talent"
        }]),
    );

    let engine = orchestrator(Arc::clone(&repo), embedder, llm);
    let report = engine.reconcile(document_id, "reviewer-1", None).await.unwrap();

    assert_eq!(report.counts.amber, 1);
    assert_eq!(report.counts.green, 0);

    let result = repo.get_clause_result(clause.id).await.unwrap().unwrap();
    // Similarity alone would be green; the direction check downgrades.
    assert_eq!(result.rag_parsing, RagColor::Green);
    assert_eq!(result.rag_risk, RagColor::Green);
    assert_eq!(result.rag_status, RagStatus::Amber);
    assert!(result.gpt_analysis.direction_mismatch());
    let validation = result.gpt_analysis.direction_validation.unwrap();
    assert!(!validation.direction_match);
}

#[tokio::test]
async fn absent_mandatory_identity_term_is_reported_missing() {
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    let deal_id = Uuid::new_v4();

    let clause = ClauseBoundary::new(
        document_id,
        tenant_id,
        "parties",
        "This agreement is made between Nike and the Talent.",
    );
    let pat = PreAgreedTerm::new(deal_id, "Brand Name", "the contracting brand")
        .with_expected_value("Adidas")
        .mandatory();

    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: vec![clause],
            pats: vec![pat],
            library: Vec::new(),
            full_contract_text: "This agreement is made between Nike and the Talent.".to_string(),
        },
    )
    .await;

    let llm = ScriptedLlm::new();
    let engine = orchestrator(Arc::clone(&repo), HashEmbedder::new(4), llm);
    let report = engine.reconcile(document_id, "reviewer-1", None).await.unwrap();

    assert_eq!(report.missing_mandatory.len(), 1);
    assert_eq!(report.missing_mandatory[0].term_category, "Brand Name");

    let discrepancies = repo.list_discrepancies(document_id).await.unwrap();
    assert!(discrepancies.iter().any(|d| {
        d.term_category.as_deref() == Some("Brand Name") && d.clause_boundary_id.is_none()
    }));
}

#[tokio::test]
async fn identity_terms_never_reach_the_llm() {
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    let deal_id = Uuid::new_v4();

    let content = "This agreement is made between Acme Corp and the Talent.";
    let clause = ClauseBoundary::new(document_id, tenant_id, "parties", content);
    let pat = PreAgreedTerm::new(deal_id, "Brand Name", "the contracting brand")
        .with_expected_value("Acme Corp")
        .mandatory();

    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: vec![clause],
            pats: vec![pat],
            library: Vec::new(),
            full_contract_text: content.to_string(),
        },
    )
    .await;

    let llm = Arc::new(ScriptedLlm::new());
    let engine = ReconciliationOrchestrator::new(
        Arc::clone(&repo),
        Arc::new(HashEmbedder::new(4)),
        Arc::clone(&llm),
    )
    .with_retry(fast_retry());
    let report = engine.reconcile(document_id, "reviewer-1", None).await.unwrap();

    // The identity hit satisfies the mandate without any LLM traffic.
    assert!(llm.prompts().is_empty());
    assert!(report.missing_mandatory.is_empty());
    let result = engine.get_clause_result(report.version_snapshot[0].clause_id)
        .await
        .unwrap()
        .unwrap();
    let identity = &result.gpt_analysis.pre_agreed_comparisons[0];
    assert!(identity.matches);
    assert_eq!(identity.confidence, 1.0);
}

#[tokio::test]
async fn termination_clause_is_never_paired_with_creative_requirements() {
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    let deal_id = Uuid::new_v4();

    let content = "Either party may terminate with thirty days written notice.";
    let clause = ClauseBoundary::new(document_id, tenant_id, "termination", content);
    let pat = PreAgreedTerm::new(
        deal_id,
        "Creative Requirements",
        "Include on-screen text for the full duration",
    );

    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: vec![clause.clone()],
            pats: vec![pat],
            library: Vec::new(),
            full_contract_text: content.to_string(),
        },
    )
    .await;

    // Orthogonal embeddings keep the semantic fallback below threshold too.
    let embedder = HashEmbedder::new(4)
        .with_vector(content, axis())
        .with_vector("Creative Requirements", vec![0.0, 1.0, 0.0, 0.0]);
    let llm = Arc::new(ScriptedLlm::new());

    let engine = ReconciliationOrchestrator::new(
        Arc::clone(&repo),
        Arc::new(embedder),
        Arc::clone(&llm),
    )
    .with_retry(fast_retry());
    let report = engine.reconcile(document_id, "reviewer-1", None).await.unwrap();
    assert_eq!(report.status, RunStatus::Ok);

    let result = repo.get_clause_result(clause.id).await.unwrap().unwrap();
    // No pairing, no comparison, no LLM call; the clause's risk is untouched
    // by the unrelated term.
    assert!(llm.prompts().is_empty());
    assert!(result.gpt_analysis.pre_agreed_comparisons.is_empty());
    assert_eq!(result.rag_risk, RagColor::Green);
}

#[tokio::test]
async fn llm_outage_degrades_only_the_affected_batch() {
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    let deal_id = Uuid::new_v4();

    let contents = [
        "Alpha invoice clause payable promptly.",
        "Beta invoice clause payable promptly.",
        "Gamma invoice clause payable promptly.",
    ];
    let clauses: Vec<ClauseBoundary> = contents
        .iter()
        .map(|content| {
            ClauseBoundary::new(document_id, tenant_id, "payment_schedule", *content)
        })
        .collect();
    let pat = PreAgreedTerm::new(deal_id, "Payment Terms", "Pay within 30 days").mandatory();
    let template = library_entry("PAY-003", "payment_schedule", "Standard invoice clause.", 1.0);

    let mut embedder = HashEmbedder::new(4);
    for content in contents {
        embedder = embedder.with_vector(content, axis());
    }

    let ok_row = json!([{"idx": 0, "matches": true, "severity": "none", "confidence": 0.9}]);
    let llm = ScriptedLlm::new()
        .with_response_for("Alpha invoice", ok_row.clone())
        .with_transient_error_for("Beta invoice")
        .with_response_for("Gamma invoice", ok_row);

    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: clauses.clone(),
            pats: vec![pat],
            library: vec![template],
            full_contract_text: "full text".to_string(),
        },
    )
    .await;

    // One pair per batch, so the outage hits exactly one clause.
    let config = ReconcileConfig::default().with_max_pairs_per_batch(1);
    let engine = orchestrator(Arc::clone(&repo), embedder, llm).with_config(config);
    let report = engine.reconcile(document_id, "reviewer-1", None).await.unwrap();

    assert_eq!(report.status, RunStatus::Ok, "adapter outage never fails the run");
    assert_eq!(report.counts.green, 2);
    assert_eq!(report.counts.amber, 1);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.clause_id == Some(clauses[1].id)
            && w.code == WarningCode::AnalysisUnavailable));

    let degraded = repo.get_clause_result(clauses[1].id).await.unwrap().unwrap();
    assert_eq!(degraded.rag_parsing, RagColor::Amber);
    assert_eq!(degraded.rag_status, RagStatus::Amber);
    assert_eq!(
        degraded.gpt_analysis.reason.as_deref(),
        Some("analysis_unavailable")
    );

    let untouched = repo.get_clause_result(clauses[0].id).await.unwrap().unwrap();
    assert_eq!(untouched.rag_status, RagStatus::Green);
}

#[tokio::test]
async fn rerun_with_identical_inputs_does_not_bump_versions() {
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    let deal_id = Uuid::new_v4();

    let content = "Payable within 30 days of valid invoice.";
    let clause = ClauseBoundary::new(document_id, tenant_id, "payment_schedule", content);
    let pat = PreAgreedTerm::new(deal_id, "Payment Terms", "Pay within 30 days").mandatory();
    let template = library_entry("PAY-004", "payment_schedule", "Standard payment clause.", 0.9);

    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: vec![clause.clone()],
            pats: vec![pat],
            library: vec![template],
            full_contract_text: content.to_string(),
        },
    )
    .await;

    let embedder = HashEmbedder::new(4).with_vector(content, axis());
    // Keyed responses are reusable, so both runs see identical adapter output.
    let llm = ScriptedLlm::new().with_response_for(
        COMPARISON_PROMPT_KEY,
        json!([{"idx": 0, "matches": true, "severity": "none", "confidence": 0.9}]),
    );

    let engine = orchestrator(Arc::clone(&repo), embedder, llm);
    let first = engine.reconcile(document_id, "reviewer-1", None).await.unwrap();
    let second = engine.reconcile(document_id, "reviewer-2", None).await.unwrap();

    assert_eq!(first.counts, second.counts);
    assert_eq!(first.version_snapshot, second.version_snapshot);

    let result = repo.get_clause_result(clause.id).await.unwrap().unwrap();
    assert_eq!(result.version, 1, "no observable change, no version bump");
    assert_eq!(result.updated_by, "reviewer-1");
    assert_eq!(repo.history_for(clause.id).await.len(), 1);
}

#[tokio::test]
async fn empty_document_reports_no_clauses() {
    let document_id = Uuid::new_v4();
    let repo = seeded_repo(document_id, ReconciliationInputs::default()).await;

    let engine = orchestrator(repo, HashEmbedder::new(4), ScriptedLlm::new());
    let report = engine.reconcile(document_id, "reviewer-1", None).await.unwrap();
    assert_eq!(report.status, RunStatus::NoClauses);
    assert_eq!(report.counts.total(), 0);
}

#[tokio::test]
async fn unknown_document_is_an_input_error() {
    let repo = Arc::new(MemoryRepository::new());
    let engine = orchestrator(repo, HashEmbedder::new(4), ScriptedLlm::new());

    let err = engine
        .reconcile(Uuid::new_v4(), "reviewer-1", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ReconError::Input(_)));
}

#[tokio::test]
async fn low_confidence_boundaries_are_skipped_with_a_warning() {
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();

    let weak = ClauseBoundary::new(document_id, tenant_id, "payment_terms", "garbled text")
        .with_confidence(0.2);
    let weak_id = weak.id;

    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: vec![weak],
            pats: Vec::new(),
            library: Vec::new(),
            full_contract_text: "garbled text".to_string(),
        },
    )
    .await;

    let engine = orchestrator(Arc::clone(&repo), HashEmbedder::new(4), ScriptedLlm::new());
    let report = engine.reconcile(document_id, "reviewer-1", None).await.unwrap();

    assert_eq!(report.counts.total(), 0);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.clause_id == Some(weak_id) && w.code == WarningCode::ParsingQuality));
    assert!(repo.get_clause_result(weak_id).await.unwrap().is_none());
}

#[tokio::test]
async fn cancellation_stops_the_run_before_persistence() {
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();

    let clause = ClauseBoundary::new(
        document_id,
        tenant_id,
        "payment_terms",
        "Payable within 30 days.",
    );
    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: vec![clause.clone()],
            pats: Vec::new(),
            library: Vec::new(),
            full_contract_text: "Payable within 30 days.".to_string(),
        },
    )
    .await;

    let token = CancellationToken::new();
    token.cancel();

    let engine = orchestrator(Arc::clone(&repo), HashEmbedder::new(4), ScriptedLlm::new());
    let report = engine
        .reconcile(document_id, "reviewer-1", Some(token))
        .await
        .unwrap();

    assert_eq!(report.status, RunStatus::Cancelled);
    assert!(repo.get_clause_result(clause.id).await.unwrap().is_none());
}

#[tokio::test]
async fn green_status_always_carries_a_template() {
    // Without any library entry the best similarity is 0, so the clause can
    // never be green even when every comparison agrees.
    let document_id = Uuid::new_v4();
    let tenant_id = Uuid::new_v4();
    let deal_id = Uuid::new_v4();

    let content = "Payable within 30 days of valid invoice.";
    let clause = ClauseBoundary::new(document_id, tenant_id, "payment_schedule", content);
    let pat = PreAgreedTerm::new(deal_id, "Payment Terms", "Pay within 30 days");

    let repo = seeded_repo(
        document_id,
        ReconciliationInputs {
            clauses: vec![clause.clone()],
            pats: vec![pat],
            library: Vec::new(),
            full_contract_text: content.to_string(),
        },
    )
    .await;

    let llm = ScriptedLlm::new().with_response_for(
        COMPARISON_PROMPT_KEY,
        json!([{"idx": 0, "matches": true, "severity": "none", "confidence": 0.9}]),
    );
    let engine = orchestrator(Arc::clone(&repo), HashEmbedder::new(4), llm);
    engine.reconcile(document_id, "reviewer-1", None).await.unwrap();

    let result = repo.get_clause_result(clause.id).await.unwrap().unwrap();
    assert!(result.matched_template_id.is_none());
    assert_eq!(result.rag_parsing, RagColor::Red);
    assert_eq!(result.rag_status, RagStatus::Red);
}
