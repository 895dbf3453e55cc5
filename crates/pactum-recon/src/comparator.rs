//! Batched LLM comparison of clause-term pairs.
//!
//! Pairs are grouped into deterministic batches and each batch goes to the
//! LLM in a single structured prompt. The comparator never fails a run:
//! schema failures degrade to synthetic adverse results, transient outages
//! surface as per-clause unavailability the orchestrator turns into amber.

use pactum_core::text::truncate_at_sentence;
use pactum_core::{
    ClauseBoundary, ComparisonSeverity, ComparisonSource, PreAgreedComparison, PreAgreedTerm,
    ReconError, ReconcileConfig, RunWarning, WarningCode,
};
use pactum_llm::{CallOutcome, LlmOptions, LlmProvider, RetryConfig, run_adapter_call};
use serde::Deserialize;
use std::collections::HashMap;
use uuid::Uuid;

/// One prepared clause-term comparison.
#[derive(Debug, Clone)]
pub struct ComparisonTask {
    /// Index into the run's clause list
    pub clause_index: usize,
    /// Index into the run's PAT list
    pub pat_index: usize,
    /// The clause boundary id
    pub clause_id: Uuid,
    /// The term id
    pub pat_id: Uuid,
    /// Clause type, for the prompt
    pub clause_type: String,
    /// Term category, for the prompt and the matched-category set
    pub term_category: String,
    /// What was agreed
    pub term_description: String,
    /// Concrete expected value, when one exists
    pub expected_value: Option<String>,
    /// Clause text, truncated to the per-pair budget
    pub clause_excerpt: String,
    /// Whether the excerpt was truncated
    pub truncated: bool,
}

impl ComparisonTask {
    /// Prepares a task, truncating the clause at a sentence boundary when it
    /// exceeds the per-pair budget.
    pub fn prepare(
        clause_index: usize,
        clause: &ClauseBoundary,
        pat_index: usize,
        pat: &PreAgreedTerm,
        per_pair_char_budget: usize,
    ) -> Self {
        let (clause_excerpt, truncated) =
            truncate_at_sentence(&clause.content, per_pair_char_budget);
        Self {
            clause_index,
            pat_index,
            clause_id: clause.id,
            pat_id: pat.id,
            clause_type: clause.clause_type.clone(),
            term_category: pat.term_category.clone(),
            term_description: pat.term_description.clone(),
            expected_value: pat.expected_value.clone(),
            clause_excerpt,
            truncated,
        }
    }

    fn prompt_chars(&self) -> usize {
        self.clause_excerpt.len() + self.term_description.len() + self.term_category.len()
    }
}

/// A group of tasks sent in one prompt.
#[derive(Debug, Clone)]
pub struct ComparisonBatch {
    /// Ordinal of this batch within the run, for diagnostics
    pub batch_index: usize,
    /// Tasks in input order; a task's position is its prompt `idx`
    pub tasks: Vec<ComparisonTask>,
}

/// Groups tasks into batches under the pair-count and character caps.
///
/// Composition is deterministic: tasks are taken in input order and a batch
/// closes when adding the next task would exceed either cap.
pub fn build_batches(
    tasks: Vec<ComparisonTask>,
    max_pairs_per_batch: usize,
    max_prompt_chars: usize,
) -> Vec<ComparisonBatch> {
    let mut batches = Vec::new();
    let mut current: Vec<ComparisonTask> = Vec::new();
    let mut current_chars = 0usize;

    for task in tasks {
        let task_chars = task.prompt_chars();
        let over_pairs = current.len() >= max_pairs_per_batch;
        let over_chars = !current.is_empty() && current_chars + task_chars > max_prompt_chars;
        if over_pairs || over_chars {
            batches.push(ComparisonBatch {
                batch_index: batches.len(),
                tasks: std::mem::take(&mut current),
            });
            current_chars = 0;
        }
        current_chars += task_chars;
        current.push(task);
    }
    if !current.is_empty() {
        batches.push(ComparisonBatch {
            batch_index: batches.len(),
            tasks: current,
        });
    }
    batches
}

/// Row returned by the LLM for one comparison in a batch.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchRow {
    /// Index of the comparison within the batch
    pub idx: usize,
    /// Whether the clause honors the term
    pub matches: bool,
    /// Severity of any deviation
    #[serde(default = "default_severity")]
    pub severity: ComparisonSeverity,
    /// One-line risk summary
    #[serde(default)]
    pub risk_summary: String,
    /// Specific differences found
    #[serde(default)]
    pub differences: Vec<String>,
    /// Comparator confidence
    #[serde(default)]
    pub confidence: f64,
}

fn default_severity() -> ComparisonSeverity {
    ComparisonSeverity::None
}

/// Outcome of running one batch.
#[derive(Debug)]
pub struct BatchOutcome {
    /// One comparison per task, aligned with the batch's task order.
    /// Empty when the batch was unavailable.
    pub comparisons: Vec<(ComparisonTask, PreAgreedComparison)>,
    /// Clauses in this batch could not be analyzed at all (transient outage
    /// survived the retry ladder); the orchestrator degrades them to amber.
    pub unavailable: bool,
    /// Warnings to surface in the run report
    pub warnings: Vec<RunWarning>,
}

/// Batched LLM comparator.
pub struct BatchComparator<'a, L> {
    llm: &'a L,
    retry: &'a RetryConfig,
    config: &'a ReconcileConfig,
}

impl<'a, L: LlmProvider> BatchComparator<'a, L> {
    /// Creates a comparator borrowing the run's adapter and configuration.
    pub fn new(llm: &'a L, retry: &'a RetryConfig, config: &'a ReconcileConfig) -> Self {
        Self { llm, retry, config }
    }

    /// Runs one batch to completion.
    ///
    /// Results are buffered and returned whole; there is no partial write.
    /// A missing `idx` in the response is treated as an adverse finding and
    /// warned about. After the retry ladder is exhausted, a schema failure
    /// yields synthetic minor findings (`llm_parse_error`) while a transient
    /// failure marks the batch unavailable.
    pub async fn run(&self, batch: &ComparisonBatch) -> BatchOutcome {
        let prompt = self.render_prompt(batch);
        let options = LlmOptions::new();
        let llm = self.llm;
        let prompt_ref = &prompt;
        let options_ref = &options;

        let outcome = run_adapter_call(
            "batch_comparison",
            self.retry,
            self.config.llm_batch_deadline,
            move || llm.complete_structured::<Vec<BatchRow>>(prompt_ref, options_ref),
        )
        .await;

        match outcome {
            CallOutcome::Done { value: rows, .. } => self.collect(batch, rows),
            CallOutcome::Degraded { error, .. } => match error {
                ReconError::AdapterPermanent { .. } => {
                    tracing::warn!(
                        batch = batch.batch_index,
                        "comparison batch failed schema parsing; synthesizing adverse results"
                    );
                    let comparisons = batch
                        .tasks
                        .iter()
                        .map(|task| (task.clone(), synthetic_parse_error(task)))
                        .collect();
                    let warnings = batch
                        .tasks
                        .iter()
                        .map(|task| {
                            RunWarning::for_clause(task.clause_id, WarningCode::LlmParseError)
                        })
                        .collect();
                    BatchOutcome {
                        comparisons,
                        unavailable: false,
                        warnings,
                    }
                }
                _ => {
                    tracing::warn!(
                        batch = batch.batch_index,
                        %error,
                        "comparison batch unavailable"
                    );
                    BatchOutcome {
                        comparisons: Vec::new(),
                        unavailable: true,
                        warnings: Vec::new(),
                    }
                }
            },
        }
    }

    fn collect(&self, batch: &ComparisonBatch, rows: Vec<BatchRow>) -> BatchOutcome {
        let mut by_idx: HashMap<usize, BatchRow> = HashMap::new();
        for row in rows {
            if row.idx < batch.tasks.len() {
                by_idx.entry(row.idx).or_insert(row);
            } else {
                tracing::warn!(
                    batch = batch.batch_index,
                    idx = row.idx,
                    "comparison response contains unknown idx"
                );
            }
        }

        let mut comparisons = Vec::with_capacity(batch.tasks.len());
        let mut warnings = Vec::new();
        for (idx, task) in batch.tasks.iter().enumerate() {
            let comparison = match by_idx.remove(&idx) {
                Some(row) => PreAgreedComparison {
                    pat_id: task.pat_id,
                    term_category: task.term_category.clone(),
                    matches: row.matches,
                    severity: row.severity,
                    risk_summary: row.risk_summary,
                    differences: row.differences,
                    confidence: row.confidence.clamp(0.0, 1.0),
                    source: ComparisonSource::Llm,
                },
                None => {
                    tracing::warn!(
                        batch = batch.batch_index,
                        idx,
                        clause = %task.clause_id,
                        "comparison response missing idx"
                    );
                    warnings.push(RunWarning::for_clause(
                        task.clause_id,
                        WarningCode::MissingBatchIndex,
                    ));
                    PreAgreedComparison {
                        pat_id: task.pat_id,
                        term_category: task.term_category.clone(),
                        matches: false,
                        severity: ComparisonSeverity::Major,
                        risk_summary: "no result returned for this comparison".to_string(),
                        differences: Vec::new(),
                        confidence: 0.0,
                        source: ComparisonSource::Degraded,
                    }
                }
            };
            comparisons.push((task.clone(), comparison));
        }

        BatchOutcome {
            comparisons,
            unavailable: false,
            warnings,
        }
    }

    fn render_prompt(&self, batch: &ComparisonBatch) -> String {
        let mut pairs = String::new();
        for (idx, task) in batch.tasks.iter().enumerate() {
            let expected = task.expected_value.as_deref().unwrap_or("(none stated)");
            pairs.push_str(&format!(
                "### Comparison {idx}\n\
                 Clause type: {}\n\
                 Clause text:\n{}\n\
                 Agreed term category: {}\n\
                 Agreed term: {}\n\
                 Expected value: {expected}\n\n",
                task.clause_type, task.clause_excerpt, task.term_category, task.term_description,
            ));
        }

        format!(
            r#"You are reviewing an influencer-marketing contract. For each numbered comparison below, decide whether the clause honors the pre-agreed term.

{pairs}Respond with a JSON array containing one object per comparison, echoing every idx from 0 to {last}:
[
    {{
        "idx": 0,
        "matches": true,
        "severity": "none | minor | major",
        "risk_summary": "one-line summary of any risk",
        "differences": ["specific difference"],
        "confidence": 0.9
    }}
]

Rules:
- "matches" is true only if the clause substantively honors the term.
- "severity" reflects how far the clause deviates: "none" when it matches, "minor" for cosmetic gaps, "major" for commercial or legal conflicts.
- Echo every idx exactly once. Return only the JSON array."#,
            last = batch.tasks.len().saturating_sub(1),
        )
    }
}

fn synthetic_parse_error(task: &ComparisonTask) -> PreAgreedComparison {
    PreAgreedComparison {
        pat_id: task.pat_id,
        term_category: task.term_category.clone(),
        matches: false,
        severity: ComparisonSeverity::Minor,
        risk_summary: "llm_parse_error".to_string(),
        differences: Vec::new(),
        confidence: 0.0,
        source: ComparisonSource::Degraded,
    }
}
