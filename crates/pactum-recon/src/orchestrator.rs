//! The reconciliation orchestrator: public entry point of the engine.
//!
//! One run is logically a single task with bounded parallel fan-out for
//! I/O-bound adapter calls. Adapter failures degrade individual clauses;
//! repository failures degrade the run to `partial`; cancellation is
//! cooperative and observed between stages and between batches. The
//! monotonic version CAS at the repository is the only cross-run ordering
//! guarantee.

use crate::comparator::{BatchComparator, ComparisonBatch, ComparisonTask, build_batches};
use crate::direction::{DirectionTask, DirectionValidator, is_direction_sensitive};
use crate::identity::IdentityTermResolver;
use crate::mandatory::missing_mandatory_report;
use crate::matcher::LibraryMatcher;
use crate::pairing::{PairingEngine, PatPairing};
use crate::repository::{ReconRepository, ReconciliationInputs};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use pactum_core::text::{normalize_text, truncate_at_sentence};
use pactum_core::{
    ClauseMatchResult, ClauseUpdateHistory, Discrepancy, DirectionValidation, GptAnalysis,
    PairingRules, PreAgreedComparison, PreAgreedTerm, RagColor, RagCounts, RagStatus, ReconError,
    ReconcileConfig, ReconciliationReport, Result, RunStatus, RunWarning, TopMatch,
    VersionSnapshot, WarningCode, risk_from_severities, similarity_tier,
};
use pactum_llm::{
    CallOutcome, CancellationContext, Embedding, EmbeddingCache, EmbeddingProvider, LlmProvider,
    RetryConfig, embed_chunked, run_adapter_call,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Deadline for a single repository round trip.
const REPOSITORY_DEADLINE: Duration = Duration::from_secs(30);

/// Default capacity of the embedding cache.
const EMBEDDING_CACHE_CAPACITY: usize = 4_096;

/// Per-clause working state accumulated across pipeline stages.
#[derive(Debug, Default)]
struct ClauseWork {
    embedding: Option<Embedding>,
    /// Adapter retries exhausted for this clause; degrade to amber
    unavailable: bool,
    candidates: Vec<crate::matcher::LibraryCandidate>,
    /// Comparisons keyed by PAT index, for deterministic ordering
    comparisons: Vec<(usize, PreAgreedComparison)>,
    direction: Option<DirectionValidation>,
}

/// Outcome of persisting one clause result.
enum PersistOutcome {
    /// A new version was written
    Written { version: u32 },
    /// Nothing observable changed; the existing version stands
    Unchanged { version: u32 },
    /// The CAS rejected twice; the clause was dropped
    Conflict,
    /// The repository failed after retries
    Failed,
}

/// Public entry point for reconciliation runs.
///
/// Generic over the repository and both adapters so hosts wire in their
/// production providers and tests wire in scripted ones. The orchestrator
/// owns all in-memory run state and is the sole writer of match results.
pub struct ReconciliationOrchestrator<R, E, L> {
    repository: Arc<R>,
    embedder: Arc<E>,
    llm: Arc<L>,
    config: ReconcileConfig,
    retry: RetryConfig,
    rules: PairingRules,
    cache: EmbeddingCache,
    quota: Semaphore,
}

impl<R, E, L> ReconciliationOrchestrator<R, E, L>
where
    R: ReconRepository,
    E: EmbeddingProvider,
    L: LlmProvider,
{
    /// Creates an orchestrator with default configuration.
    pub fn new(repository: Arc<R>, embedder: Arc<E>, llm: Arc<L>) -> Self {
        let config = ReconcileConfig::default();
        let quota = Semaphore::new(config.max_concurrent_embeds + config.max_concurrent_batches);
        Self {
            repository,
            embedder,
            llm,
            config,
            retry: RetryConfig::default(),
            rules: PairingRules::standard(),
            cache: EmbeddingCache::new(EMBEDDING_CACHE_CAPACITY),
            quota,
        }
    }

    /// Replaces the engine configuration.
    pub fn with_config(mut self, config: ReconcileConfig) -> Self {
        self.quota = Semaphore::new(config.max_concurrent_embeds + config.max_concurrent_batches);
        self.config = config;
        self
    }

    /// Replaces the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the keyword pairing rules.
    pub fn with_pairing_rules(mut self, rules: PairingRules) -> Self {
        self.rules = rules;
        self
    }

    /// Reads the head match result for a clause boundary.
    pub async fn get_clause_result(
        &self,
        clause_boundary_id: Uuid,
    ) -> Result<Option<ClauseMatchResult>> {
        self.repository.get_clause_result(clause_boundary_id).await
    }

    /// Lists the discrepancies recorded for a document.
    pub async fn list_discrepancies(&self, document_id: Uuid) -> Result<Vec<Discrepancy>> {
        self.repository.list_discrepancies(document_id).await
    }

    /// Reconciles one document against its deal's terms and the library.
    ///
    /// Never fails for adapter trouble: affected clauses degrade to amber
    /// and the run completes. Input errors (unknown document) and
    /// configuration errors surface to the caller.
    pub async fn reconcile(
        &self,
        document_id: Uuid,
        actor: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<ReconciliationReport> {
        let started = Instant::now();
        let cancel = cancel
            .map(CancellationContext::from_token)
            .unwrap_or_default();
        tracing::info!(%document_id, actor, "reconciliation run started");

        // Step 1: bulk load.
        let repository = self.repository.as_ref();
        let inputs = run_adapter_call("load_inputs", &self.retry, REPOSITORY_DEADLINE, move || {
            repository.load_reconciliation_inputs(document_id)
        })
        .await
        .into_result()?;

        if inputs.clauses.is_empty() {
            tracing::info!(%document_id, "document has no clause boundaries");
            let mut report = ReconciliationReport::empty(document_id, RunStatus::NoClauses);
            report.duration_ms = started.elapsed().as_millis() as u64;
            return Ok(report);
        }

        let mut warnings: Vec<RunWarning> = Vec::new();
        let mut partial = false;

        // Weak or empty boundaries are skipped with a parsing-quality issue.
        let mut eligible: Vec<usize> = Vec::new();
        for (index, clause) in inputs.clauses.iter().enumerate() {
            if clause.has_content() && clause.confidence >= self.config.min_boundary_confidence {
                eligible.push(index);
            } else {
                tracing::debug!(
                    clause = %clause.id,
                    confidence = clause.confidence,
                    "boundary skipped for parsing quality"
                );
                warnings.push(RunWarning::for_clause(clause.id, WarningCode::ParsingQuality));
            }
        }

        let mut work: HashMap<usize, ClauseWork> = eligible
            .iter()
            .map(|&index| (index, ClauseWork::default()))
            .collect();

        // Step 2: embed clauses and rank library candidates.
        if cancel.is_cancelled() {
            return Ok(cancelled_report(document_id, warnings, started));
        }
        self.embed_clauses(&inputs, &eligible, &mut work, &cancel, &mut warnings)
            .await;

        let matcher = LibraryMatcher::new(&inputs.library);
        for &index in &eligible {
            let Some(entry) = work.get_mut(&index) else {
                continue;
            };
            if let Some(embedding) = entry.embedding.clone() {
                entry.candidates = matcher.top_candidates(
                    &inputs.clauses[index],
                    &embedding,
                    self.config.library_top_n,
                )?;
            }
        }

        // Step 3: pairing.
        if cancel.is_cancelled() {
            return Ok(cancelled_report(document_id, warnings, started));
        }
        let pairings = self.pair_clauses(&inputs, &eligible, &work).await?;

        // Step 4: identity terms.
        let clause_index_by_id: HashMap<Uuid, usize> = eligible
            .iter()
            .map(|&index| (inputs.clauses[index].id, index))
            .collect();
        let mut matched_categories: HashSet<String> = HashSet::new();
        for (pat_index, pat) in inputs.pats.iter().enumerate() {
            if !pat.is_identity() {
                continue;
            }
            let resolution =
                IdentityTermResolver::resolve(pat, &inputs.clauses, &inputs.full_contract_text);
            tracing::debug!(
                category = %pat.term_category,
                match_type = ?resolution.match_type,
                rag = ?resolution.rag_parsing(pat.is_mandatory),
                "identity term resolved"
            );
            if resolution.satisfies_mandate() {
                matched_categories.insert(normalize_text(&pat.term_category));
            }
            if let Some(clause_id) = resolution.matched_clause_id {
                if let Some(entry) = clause_index_by_id
                    .get(&clause_id)
                    .and_then(|index| work.get_mut(index))
                {
                    entry.comparisons.push((pat_index, resolution.to_comparison()));
                }
            }
        }

        // Step 5: batched comparison of the remaining pairs.
        if cancel.is_cancelled() {
            return Ok(cancelled_report(document_id, warnings, started));
        }
        let mut tasks: Vec<ComparisonTask> = Vec::new();
        for &index in &eligible {
            let Some(clause_pairings) = pairings.get(&index) else {
                continue;
            };
            for pairing in clause_pairings {
                tasks.push(ComparisonTask::prepare(
                    index,
                    &inputs.clauses[index],
                    pairing.pat_index,
                    &inputs.pats[pairing.pat_index],
                    self.config.per_pair_char_budget,
                ));
            }
        }
        let batches = build_batches(
            tasks,
            self.config.max_pairs_per_batch,
            self.config.max_prompt_chars,
        );
        tracing::debug!(
            batches = batches.len(),
            pairs = batches.iter().map(|b| b.tasks.len()).sum::<usize>(),
            "dispatching comparison batches"
        );

        let comparator = BatchComparator::new(self.llm.as_ref(), &self.retry, &self.config);
        let outcomes: Vec<_> = stream::iter(batches.iter().map(|batch| {
            let comparator = &comparator;
            let cancel = &cancel;
            let quota = &self.quota;
            async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let Ok(_permit) = quota.acquire().await else {
                    return None;
                };
                Some((batch, comparator.run(batch).await))
            }
        }))
        .buffer_unordered(self.config.max_concurrent_batches)
        .collect()
        .await;

        for (batch, outcome) in outcomes.into_iter().flatten() {
            warnings.extend(outcome.warnings);
            if outcome.unavailable {
                mark_batch_unavailable(batch, &mut work, &mut warnings);
                continue;
            }
            for (task, comparison) in outcome.comparisons {
                if comparison.matches {
                    matched_categories.insert(normalize_text(&comparison.term_category));
                }
                if let Some(entry) = work.get_mut(&task.clause_index) {
                    entry.comparisons.push((task.pat_index, comparison));
                }
            }
        }

        // Step 6: direction validation for sensitive high-similarity matches.
        if cancel.is_cancelled() {
            return Ok(cancelled_report(document_id, warnings, started));
        }
        let mut direction_tasks = Vec::new();
        for &index in &eligible {
            let Some(entry) = work.get(&index) else {
                continue;
            };
            let Some(top) = entry.candidates.first() else {
                continue;
            };
            let clause = &inputs.clauses[index];
            if top.similarity >= self.config.green_similarity
                && is_direction_sensitive(&clause.clause_type)
            {
                let (clause_excerpt, _) =
                    truncate_at_sentence(&clause.content, self.config.per_pair_char_budget);
                direction_tasks.push(DirectionTask {
                    clause_index: index,
                    clause_id: clause.id,
                    clause_type: clause.clause_type.clone(),
                    clause_excerpt,
                    template_text: top.standard_text.clone(),
                    template_code: top.clause_code.clone(),
                });
            }
        }

        let validator = DirectionValidator::new(self.llm.as_ref(), &self.retry, &self.config);
        let direction_batches = validator.build_batches(direction_tasks);
        let direction_outcomes: Vec<_> = stream::iter(direction_batches.iter().map(|batch| {
            let validator = &validator;
            let cancel = &cancel;
            let quota = &self.quota;
            async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let Ok(_permit) = quota.acquire().await else {
                    return None;
                };
                Some(validator.run(batch).await)
            }
        }))
        .buffer_unordered(self.config.max_concurrent_batches)
        .collect()
        .await;

        for outcome in direction_outcomes.into_iter().flatten() {
            warnings.extend(outcome.warnings);
            for (clause_index, validation) in outcome.validations {
                if let Some(entry) = work.get_mut(&clause_index) {
                    entry.direction = Some(validation);
                }
            }
        }

        // Steps 7-8: compose and persist through the version CAS.
        if cancel.is_cancelled() {
            return Ok(cancelled_report(document_id, warnings, started));
        }
        let mut counts = RagCounts::default();
        let mut snapshot: Vec<VersionSnapshot> = Vec::new();
        let mut discrepancies: Vec<Discrepancy> = Vec::new();

        for &index in &eligible {
            let clause = &inputs.clauses[index];
            let Some(entry) = work.remove(&index) else {
                continue;
            };

            let mut candidate = self.compose(document_id, index, &inputs, entry, actor);
            discrepancies.extend(
                candidate
                    .gpt_analysis
                    .pre_agreed_comparisons
                    .iter()
                    .filter(|comparison| !comparison.matches)
                    .map(|comparison| {
                        Discrepancy::from_comparison(document_id, clause.id, comparison)
                    }),
            );

            match self.persist(&mut candidate).await {
                PersistOutcome::Written { version } | PersistOutcome::Unchanged { version } => {
                    counts.record(candidate.rag_status);
                    snapshot.push(VersionSnapshot {
                        clause_id: clause.id,
                        version,
                    });
                }
                PersistOutcome::Conflict => {
                    warnings.push(RunWarning::for_clause(
                        clause.id,
                        WarningCode::VersionConflict,
                    ));
                    partial = true;
                }
                PersistOutcome::Failed => {
                    warnings.push(RunWarning::for_clause(
                        clause.id,
                        WarningCode::PersistenceFailure,
                    ));
                    partial = true;
                }
            }
        }

        // Step 9: missing-mandatory sweep and discrepancy write.
        let mandatory = missing_mandatory_report(document_id, &inputs.pats, &matched_categories);
        discrepancies.extend(mandatory.discrepancies);

        let discrepancies_ref = &discrepancies;
        let write = run_adapter_call(
            "write_discrepancies",
            &self.retry,
            REPOSITORY_DEADLINE,
            move || repository.write_discrepancies(document_id, discrepancies_ref),
        )
        .await;
        if let CallOutcome::Degraded { error, .. } = write {
            tracing::warn!(%error, "failed to persist discrepancies");
            warnings.push(RunWarning::for_run(WarningCode::PersistenceFailure));
            partial = true;
        }

        // Step 10: assemble the report.
        let status = if partial { RunStatus::Partial } else { RunStatus::Ok };
        let report = ReconciliationReport {
            document_id,
            status,
            counts,
            missing_mandatory: mandatory.missing,
            warnings,
            duration_ms: started.elapsed().as_millis() as u64,
            version_snapshot: snapshot,
        };
        tracing::info!(
            %document_id,
            status = ?report.status,
            green = report.counts.green,
            amber = report.counts.amber,
            red = report.counts.red,
            duration_ms = report.duration_ms,
            "reconciliation run finished"
        );
        Ok(report)
    }

    /// Embeds eligible clauses with bounded fan-out, consulting the cache.
    async fn embed_clauses(
        &self,
        inputs: &ReconciliationInputs,
        eligible: &[usize],
        work: &mut HashMap<usize, ClauseWork>,
        cancel: &CancellationContext,
        warnings: &mut Vec<RunWarning>,
    ) {
        let model_version = self.embedder.model_version().to_string();
        let mut uncached: Vec<usize> = Vec::new();
        for &index in eligible {
            let content = &inputs.clauses[index].content;
            if let Some(hit) = self.cache.get(content, &model_version) {
                if let Some(entry) = work.get_mut(&index) {
                    entry.embedding = Some(hit);
                }
            } else {
                uncached.push(index);
            }
        }

        let results: Vec<(usize, Option<CallOutcome<Embedding>>)> =
            stream::iter(uncached.into_iter().map(|index| {
                let clause = &inputs.clauses[index];
                let quota = &self.quota;
                async move {
                    if cancel.is_cancelled() {
                        return (index, None);
                    }
                    let Ok(_permit) = quota.acquire().await else {
                        return (index, None);
                    };
                    let texts = vec![clause.content.clone()];
                    let texts_ref = &texts;
                    let outcome = run_adapter_call(
                        "embed_clause",
                        &self.retry,
                        self.config.embed_deadline,
                        || async move {
                            let batch = self.embedder.embed(texts_ref).await?;
                            batch.vectors.into_iter().next().ok_or_else(|| {
                                ReconError::adapter_permanent(
                                    self.embedder.provider_name(),
                                    "empty embedding batch",
                                )
                            })
                        },
                    )
                    .await;
                    (index, Some(outcome))
                }
            }))
            .buffer_unordered(self.config.max_concurrent_embeds)
            .collect()
            .await;

        for (index, outcome) in results {
            let Some(entry) = work.get_mut(&index) else {
                continue;
            };
            match outcome {
                Some(CallOutcome::Done { value, .. }) => {
                    self.cache
                        .put(&inputs.clauses[index].content, &model_version, value.clone());
                    entry.embedding = Some(value);
                }
                Some(CallOutcome::Degraded { error, .. }) => {
                    tracing::warn!(
                        clause = %inputs.clauses[index].id,
                        %error,
                        "clause embedding degraded"
                    );
                    entry.unavailable = true;
                    warnings.push(RunWarning::for_clause(
                        inputs.clauses[index].id,
                        WarningCode::AnalysisUnavailable,
                    ));
                }
                None => {}
            }
        }
    }

    /// Pairs every eligible clause: rules first, semantic fallback second.
    async fn pair_clauses(
        &self,
        inputs: &ReconciliationInputs,
        eligible: &[usize],
        work: &HashMap<usize, ClauseWork>,
    ) -> Result<HashMap<usize, Vec<PatPairing>>> {
        let engine =
            PairingEngine::new(self.rules.clone(), self.config.semantic_pairing_threshold);
        let mut pairings: HashMap<usize, Vec<PatPairing>> = HashMap::new();
        if inputs.pats.is_empty() {
            return Ok(pairings);
        }

        let mut needs_semantic: Vec<usize> = Vec::new();
        for &index in eligible {
            let result = engine.pair_by_rules(&inputs.clauses[index], &inputs.pats);
            if result.is_empty() {
                needs_semantic.push(index);
            } else {
                pairings.insert(index, result.pairings);
            }
        }

        let any_comparable = inputs.pats.iter().any(|pat| !pat.is_identity());
        if needs_semantic.is_empty() || !any_comparable {
            return Ok(pairings);
        }

        let category_embeddings = self.embed_pat_categories(&inputs.pats).await;
        for index in needs_semantic {
            let Some(embedding) = work.get(&index).and_then(|w| w.embedding.as_ref()) else {
                continue;
            };
            let result = engine.pair_semantic(
                &inputs.clauses[index],
                embedding,
                &inputs.pats,
                &category_embeddings,
            )?;
            if !result.is_empty() {
                pairings.insert(index, result.pairings);
            }
        }

        Ok(pairings)
    }

    /// Embeds the category label of every comparable term, via the cache.
    ///
    /// On adapter degradation the semantic fallback is skipped entirely; the
    /// affected clauses keep their empty rule-based pairing and nothing
    /// downgrades.
    async fn embed_pat_categories(&self, pats: &[PreAgreedTerm]) -> Vec<Option<Embedding>> {
        let model_version = self.embedder.model_version().to_string();
        let mut embeddings: Vec<Option<Embedding>> = vec![None; pats.len()];
        let mut to_fetch: Vec<(usize, String)> = Vec::new();

        for (index, pat) in pats.iter().enumerate() {
            if pat.is_identity() {
                continue;
            }
            match self.cache.get(&pat.term_category, &model_version) {
                Some(hit) => embeddings[index] = Some(hit),
                None => to_fetch.push((index, pat.term_category.clone())),
            }
        }
        if to_fetch.is_empty() {
            return embeddings;
        }

        let texts: Vec<String> = to_fetch.iter().map(|(_, text)| text.clone()).collect();
        let texts_ref = &texts;
        let outcome = run_adapter_call(
            "embed_pat_categories",
            &self.retry,
            self.config.embed_deadline,
            || async move {
                let Ok(_permit) = self.quota.acquire().await else {
                    return Err(ReconError::internal("adapter quota closed"));
                };
                embed_chunked(self.embedder.as_ref(), texts_ref).await
            },
        )
        .await;

        match outcome {
            CallOutcome::Done { value, .. } => {
                for ((index, text), embedding) in to_fetch.into_iter().zip(value.vectors) {
                    self.cache.put(&text, &model_version, embedding.clone());
                    embeddings[index] = Some(embedding);
                }
            }
            CallOutcome::Degraded { error, .. } => {
                tracing::warn!(
                    %error,
                    "term category embedding degraded; skipping semantic fallback"
                );
            }
        }

        embeddings
    }

    /// Composes the candidate match result for one clause.
    fn compose(
        &self,
        document_id: Uuid,
        index: usize,
        inputs: &ReconciliationInputs,
        mut entry: ClauseWork,
        actor: &str,
    ) -> ClauseMatchResult {
        let clause = &inputs.clauses[index];

        entry.comparisons.sort_by_key(|(pat_index, _)| *pat_index);
        let comparisons: Vec<PreAgreedComparison> =
            entry.comparisons.into_iter().map(|(_, c)| c).collect();

        let top = entry.candidates.first();
        let similarity = top.map(|t| t.similarity).unwrap_or(0.0);
        let template = top.filter(|t| t.similarity >= self.config.amber_similarity);

        let (rag_parsing, reason) = if entry.unavailable {
            (RagColor::Amber, Some("analysis_unavailable".to_string()))
        } else {
            let tier = similarity_tier(
                similarity,
                self.config.green_similarity,
                self.config.amber_similarity,
            );
            (tier, None)
        };
        let rag_risk = risk_from_severities(comparisons.iter().map(|c| c.severity));
        let direction_mismatch = entry
            .direction
            .as_ref()
            .is_some_and(|v| !v.direction_match);
        let rag_status = RagStatus::compose(rag_parsing, rag_risk, direction_mismatch);

        ClauseMatchResult {
            id: Uuid::new_v4(),
            document_id,
            clause_boundary_id: clause.id,
            matched_template_id: template.map(|t| t.template_id),
            similarity_score: similarity,
            rag_parsing,
            rag_risk,
            rag_status,
            gpt_analysis: GptAnalysis {
                top_match: template.map(|t| TopMatch {
                    template_id: t.template_id,
                    clause_code: t.clause_code.clone(),
                    clause_type: t.clause_type.clone(),
                    similarity: t.similarity,
                }),
                pre_agreed_comparisons: comparisons,
                direction_validation: entry.direction,
                reason,
            },
            version: 1,
            previous_rag_status: None,
            update_reason: Some("initial".to_string()),
            updated_by: actor.to_string(),
            updated_at: Utc::now(),
        }
    }

    /// Persists one candidate through the version CAS.
    ///
    /// Reruns that change nothing observable skip the write entirely and do
    /// not bump the version. A CAS reject is retried once after re-reading
    /// the head; a second reject drops the clause.
    async fn persist(&self, candidate: &mut ClauseMatchResult) -> PersistOutcome {
        let clause_id = candidate.clause_boundary_id;
        let repository = self.repository.as_ref();
        for attempt in 0..2 {
            let prior = match run_adapter_call(
                "get_clause_result",
                &self.retry,
                REPOSITORY_DEADLINE,
                move || repository.get_clause_result(clause_id),
            )
            .await
            {
                CallOutcome::Done { value, .. } => value,
                CallOutcome::Degraded { error, .. } => {
                    tracing::warn!(clause = %clause_id, %error, "head read failed");
                    return PersistOutcome::Failed;
                }
            };

            if let Some(prior) = prior {
                if candidate.observable_eq(&prior) {
                    tracing::debug!(
                        clause = %clause_id,
                        version = prior.version,
                        "result unchanged, version not bumped"
                    );
                    return PersistOutcome::Unchanged {
                        version: prior.version,
                    };
                }
                candidate.id = prior.id;
                candidate.version = prior.version + 1;
                candidate.previous_rag_status = Some(prior.rag_status);
                candidate.update_reason = Some("reanalysis".to_string());
            } else {
                candidate.version = 1;
                candidate.previous_rag_status = None;
                candidate.update_reason = Some("initial".to_string());
            }

            let snapshot = candidate.clone();
            let snapshot_ref = &snapshot;
            let upsert = match run_adapter_call(
                "upsert_match_result",
                &self.retry,
                REPOSITORY_DEADLINE,
                move || repository.upsert_match_result(snapshot_ref),
            )
            .await
            {
                CallOutcome::Done { value, .. } => value,
                CallOutcome::Degraded { error, .. } => {
                    tracing::warn!(clause = %clause_id, %error, "upsert failed");
                    return PersistOutcome::Failed;
                }
            };

            if upsert.accepted {
                let history = ClauseUpdateHistory::for_transition(
                    candidate,
                    candidate.previous_rag_status,
                    candidate
                        .update_reason
                        .clone()
                        .unwrap_or_else(|| "initial".to_string()),
                );
                let history_ref = &history;
                let appended = run_adapter_call(
                    "append_history",
                    &self.retry,
                    REPOSITORY_DEADLINE,
                    move || repository.append_history(history_ref),
                )
                .await;
                if let CallOutcome::Degraded { error, .. } = appended {
                    tracing::warn!(clause = %clause_id, %error, "history append failed");
                    return PersistOutcome::Failed;
                }
                return PersistOutcome::Written {
                    version: candidate.version,
                };
            }

            tracing::debug!(
                clause = %clause_id,
                attempt,
                current = upsert.current_version,
                "version CAS rejected, re-reading head"
            );
        }

        PersistOutcome::Conflict
    }
}

/// Marks every clause in an unavailable batch as degraded.
fn mark_batch_unavailable(
    batch: &ComparisonBatch,
    work: &mut HashMap<usize, ClauseWork>,
    warnings: &mut Vec<RunWarning>,
) {
    let mut seen: HashSet<usize> = HashSet::new();
    for task in &batch.tasks {
        if !seen.insert(task.clause_index) {
            continue;
        }
        if let Some(entry) = work.get_mut(&task.clause_index) {
            entry.unavailable = true;
        }
        warnings.push(RunWarning::for_clause(
            task.clause_id,
            WarningCode::AnalysisUnavailable,
        ));
    }
}

fn cancelled_report(
    document_id: Uuid,
    warnings: Vec<RunWarning>,
    started: Instant,
) -> ReconciliationReport {
    tracing::info!(%document_id, "reconciliation run cancelled");
    let mut report = ReconciliationReport::empty(document_id, RunStatus::Cancelled);
    report.warnings = warnings;
    report.duration_ms = started.elapsed().as_millis() as u64;
    report
}
