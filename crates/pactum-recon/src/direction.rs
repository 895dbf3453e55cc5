//! Direction validation for rights-transfer clauses.
//!
//! High-similarity matches on sensitive clause types get one extra check:
//! does the matched template transfer the right in the same direction as the
//! contract clause? An unclear reading on either side never downgrades.

use pactum_core::{
    ClauseTypeNormalizer, DirectionValidation, RunWarning, TransferDirection, WarningCode,
    ReconError, ReconcileConfig,
};
use pactum_llm::{CallOutcome, LlmOptions, LlmProvider, RetryConfig, run_adapter_call};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Clause-type tokens that make a clause direction-sensitive.
///
/// `grant` is known to over-match clauses mentioning unrelated grants; it is
/// kept here so tightening the list is a data-only change.
pub const SENSITIVE_TOKENS: &[&str] = &[
    "intellectual_property",
    "usage_rights",
    "exclusivity",
    "payment_terms",
    "indemnification",
    "license",
    "grant",
    "ip_rights",
    "content_rights",
    "media_rights",
];

/// Whether a clause type is subject to direction validation.
///
/// The comparison ignores separators, so `usage_rights`, `usage rights` and
/// `usagerights` all qualify.
pub fn is_direction_sensitive(clause_type: &str) -> bool {
    let compact = ClauseTypeNormalizer::normalize_compact(clause_type);
    SENSITIVE_TOKENS
        .iter()
        .any(|token| compact.contains(&token.replace('_', "")))
}

/// One clause queued for direction validation.
#[derive(Debug, Clone)]
pub struct DirectionTask {
    /// Index into the run's clause list
    pub clause_index: usize,
    /// The clause boundary id
    pub clause_id: Uuid,
    /// Clause type, for the prompt
    pub clause_type: String,
    /// Contract clause text
    pub clause_excerpt: String,
    /// Matched template wording
    pub template_text: String,
    /// Matched template code, for diagnostics
    pub template_code: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DirectionRow {
    idx: usize,
    contract_direction: TransferDirection,
    library_direction: TransferDirection,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    reasoning: String,
}

/// Outcome of one direction batch.
#[derive(Debug)]
pub struct DirectionOutcome {
    /// One validation per task, aligned with the batch's task order
    pub validations: Vec<(usize, DirectionValidation)>,
    /// Warnings to surface in the run report
    pub warnings: Vec<RunWarning>,
}

/// Batched direction validator.
///
/// Failure discipline mirrors the comparator, but degradation here is always
/// conservative: an unavailable or unparseable validation resolves to
/// unclear-vs-unclear, which is a match and downgrades nothing.
pub struct DirectionValidator<'a, L> {
    llm: &'a L,
    retry: &'a RetryConfig,
    config: &'a ReconcileConfig,
}

impl<'a, L: LlmProvider> DirectionValidator<'a, L> {
    /// Creates a validator borrowing the run's adapter and configuration.
    pub fn new(llm: &'a L, retry: &'a RetryConfig, config: &'a ReconcileConfig) -> Self {
        Self { llm, retry, config }
    }

    /// Splits tasks into batches under the pair cap.
    pub fn build_batches(&self, tasks: Vec<DirectionTask>) -> Vec<Vec<DirectionTask>> {
        let cap = self.config.max_pairs_per_batch.max(1);
        let mut batches = Vec::new();
        let mut iter = tasks.into_iter().peekable();
        while iter.peek().is_some() {
            batches.push(iter.by_ref().take(cap).collect());
        }
        batches
    }

    /// Runs one batch to completion.
    pub async fn run(&self, batch: &[DirectionTask]) -> DirectionOutcome {
        let prompt = render_prompt(batch);
        let options = LlmOptions::new();
        let llm = self.llm;
        let prompt_ref = &prompt;
        let options_ref = &options;

        let outcome = run_adapter_call(
            "direction_validation",
            self.retry,
            self.config.direction_deadline,
            move || llm.complete_structured::<Vec<DirectionRow>>(prompt_ref, options_ref),
        )
        .await;

        match outcome {
            CallOutcome::Done { value: rows, .. } => collect(batch, rows),
            CallOutcome::Degraded { error, .. } => {
                tracing::warn!(%error, "direction batch degraded; treating as conservative match");
                let reasoning = match error {
                    ReconError::AdapterPermanent { .. } => "llm_parse_error",
                    _ => "analysis_unavailable",
                };
                let validations = batch
                    .iter()
                    .map(|task| (task.clause_index, unclear_validation(reasoning)))
                    .collect();
                let warnings = batch
                    .iter()
                    .map(|task| {
                        RunWarning::for_clause(task.clause_id, WarningCode::DirectionUnavailable)
                    })
                    .collect();
                DirectionOutcome {
                    validations,
                    warnings,
                }
            }
        }
    }
}

fn collect(batch: &[DirectionTask], rows: Vec<DirectionRow>) -> DirectionOutcome {
    let mut by_idx: HashMap<usize, DirectionRow> = HashMap::new();
    for row in rows {
        if row.idx < batch.len() {
            by_idx.entry(row.idx).or_insert(row);
        }
    }

    let mut validations = Vec::with_capacity(batch.len());
    let mut warnings = Vec::new();
    for (idx, task) in batch.iter().enumerate() {
        match by_idx.remove(&idx) {
            Some(row) => {
                let validation = DirectionValidation::resolve(
                    row.contract_direction,
                    row.library_direction,
                    row.confidence.clamp(0.0, 1.0),
                    row.reasoning,
                );
                validations.push((task.clause_index, validation));
            }
            None => {
                tracing::warn!(idx, clause = %task.clause_id, "direction response missing idx");
                warnings.push(RunWarning::for_clause(
                    task.clause_id,
                    WarningCode::DirectionUnavailable,
                ));
                validations.push((task.clause_index, unclear_validation("no result returned")));
            }
        }
    }

    DirectionOutcome {
        validations,
        warnings,
    }
}

fn unclear_validation(reasoning: &str) -> DirectionValidation {
    DirectionValidation::resolve(
        TransferDirection::Unclear,
        TransferDirection::Unclear,
        0.0,
        reasoning,
    )
}

fn render_prompt(batch: &[DirectionTask]) -> String {
    let mut pairs = String::new();
    for (idx, task) in batch.iter().enumerate() {
        pairs.push_str(&format!(
            "### Pair {idx}\n\
             Clause type: {}\n\
             Contract clause:\n{}\n\
             Library template ({}):\n{}\n\n",
            task.clause_type, task.clause_excerpt, task.template_code, task.template_text,
        ));
    }

    format!(
        r#"For each pair below, identify the direction in which rights are transferred by the contract clause and by the library template.

{pairs}Respond with a JSON array containing one object per pair, echoing every idx from 0 to {last}:
[
    {{
        "idx": 0,
        "contract_direction": "talent_to_brand | brand_to_talent | mutual | unclear",
        "library_direction": "talent_to_brand | brand_to_talent | mutual | unclear",
        "confidence": 0.9,
        "reasoning": "one-line rationale"
    }}
]

Rules:
- "talent_to_brand" means the talent grants rights to the brand; "brand_to_talent" is the reverse.
- Use "mutual" when both parties grant rights, "unclear" when the text does not say.
- Echo every idx exactly once. Return only the JSON array."#,
        last = batch.len().saturating_sub(1),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pactum_llm::testing::ScriptedLlm;
    use serde_json::json;
    use std::time::Duration;

    fn fast_retry() -> RetryConfig {
        RetryConfig::new()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(2))
            .with_jitter(0.0)
    }

    fn task(clause_index: usize) -> DirectionTask {
        DirectionTask {
            clause_index,
            clause_id: Uuid::new_v4(),
            clause_type: "usage_rights".to_string(),
            clause_excerpt: "Talent grants Brand irrevocable usage rights.".to_string(),
            template_text: "Brand grants Talent a limited license.".to_string(),
            template_code: "USE-001".to_string(),
        }
    }

    #[test]
    fn sensitivity_ignores_separators() {
        assert!(is_direction_sensitive("usage_rights"));
        assert!(is_direction_sensitive("Usage Rights"));
        assert!(is_direction_sensitive("exclusivity"));
        assert!(is_direction_sensitive("content_rights_grant"));
        assert!(!is_direction_sensitive("termination"));
        assert!(!is_direction_sensitive("confidentiality"));
    }

    #[tokio::test]
    async fn mismatch_is_detected() {
        let llm = ScriptedLlm::new();
        llm.push_json(json!([
            {"idx": 0, "contract_direction": "talent_to_brand", "library_direction": "brand_to_talent", "confidence": 0.9, "reasoning": "opposite grants"}
        ]));

        let retry = fast_retry();
        let config = ReconcileConfig::default();
        let validator = DirectionValidator::new(&llm, &retry, &config);

        let outcome = validator.run(&[task(0)]).await;
        assert_eq!(outcome.validations.len(), 1);
        let (_, validation) = &outcome.validations[0];
        assert!(!validation.direction_match);
        assert_eq!(
            validation.contract_direction,
            TransferDirection::TalentToBrand
        );
    }

    #[tokio::test]
    async fn unclear_direction_is_a_conservative_match() {
        let llm = ScriptedLlm::new();
        llm.push_json(json!([
            {"idx": 0, "contract_direction": "unclear", "library_direction": "brand_to_talent", "confidence": 0.4, "reasoning": "ambiguous"}
        ]));

        let retry = fast_retry();
        let config = ReconcileConfig::default();
        let validator = DirectionValidator::new(&llm, &retry, &config);

        let outcome = validator.run(&[task(0)]).await;
        assert!(outcome.validations[0].1.direction_match);
    }

    #[tokio::test]
    async fn degraded_batch_never_downgrades() {
        let llm = ScriptedLlm::new();
        for _ in 0..3 {
            llm.push_transient_error("down");
        }

        let retry = fast_retry();
        let config = ReconcileConfig::default();
        let validator = DirectionValidator::new(&llm, &retry, &config);

        let outcome = validator.run(&[task(0), task(1)]).await;
        assert_eq!(outcome.validations.len(), 2);
        for (_, validation) in &outcome.validations {
            assert!(validation.direction_match);
            assert_eq!(validation.contract_direction, TransferDirection::Unclear);
        }
        assert_eq!(outcome.warnings.len(), 2);
    }

    #[test]
    fn batches_split_at_cap() {
        let config = ReconcileConfig::default().with_max_pairs_per_batch(2);
        let retry = RetryConfig::default();
        let llm = ScriptedLlm::new();
        let validator = DirectionValidator::new(&llm, &retry, &config);

        let batches = validator.build_batches((0..5).map(task).collect());
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[2].len(), 1);
    }
}
