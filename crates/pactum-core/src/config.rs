//! Engine configuration.

use std::time::Duration;

/// Tunable thresholds and limits for a reconciliation run.
///
/// Defaults are the calibrated production values (manual calibration against
/// a labeled review set); hosts override individual fields through the
/// builder setters rather than editing constants.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Similarity at or above which a library match is a candidate green
    pub green_similarity: f64,
    /// Similarity floor below which no template is assigned
    pub amber_similarity: f64,
    /// Cosine threshold for semantic pairing fallback
    pub semantic_pairing_threshold: f64,
    /// Boundary confidence floor; weaker boundaries are skipped
    pub min_boundary_confidence: f64,
    /// Number of ranked library candidates to consider per clause
    pub library_top_n: usize,
    /// Maximum clause-term pairs per comparator prompt
    pub max_pairs_per_batch: usize,
    /// Maximum input characters per comparator prompt
    pub max_prompt_chars: usize,
    /// Per-pair clause excerpt budget before sentence truncation
    pub per_pair_char_budget: usize,
    /// Maximum concurrent embedding requests
    pub max_concurrent_embeds: usize,
    /// Maximum concurrent LLM batch requests
    pub max_concurrent_batches: usize,
    /// Deadline for one embedding request
    pub embed_deadline: Duration,
    /// Deadline for one comparator batch request
    pub llm_batch_deadline: Duration,
    /// Deadline for one direction-validation request
    pub direction_deadline: Duration,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            green_similarity: 0.75,
            amber_similarity: 0.55,
            semantic_pairing_threshold: 0.72,
            min_boundary_confidence: 0.3,
            library_top_n: 5,
            max_pairs_per_batch: 12,
            max_prompt_chars: 12_000,
            per_pair_char_budget: 2_000,
            max_concurrent_embeds: 8,
            max_concurrent_batches: 4,
            embed_deadline: Duration::from_secs(30),
            llm_batch_deadline: Duration::from_secs(60),
            direction_deadline: Duration::from_secs(60),
        }
    }
}

impl ReconcileConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the green similarity cutoff.
    pub fn with_green_similarity(mut self, cutoff: f64) -> Self {
        self.green_similarity = cutoff.clamp(0.0, 1.0);
        self
    }

    /// Sets the amber similarity floor.
    pub fn with_amber_similarity(mut self, floor: f64) -> Self {
        self.amber_similarity = floor.clamp(0.0, 1.0);
        self
    }

    /// Sets the semantic pairing threshold.
    pub fn with_semantic_pairing_threshold(mut self, threshold: f64) -> Self {
        self.semantic_pairing_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Sets the boundary confidence floor.
    pub fn with_min_boundary_confidence(mut self, floor: f64) -> Self {
        self.min_boundary_confidence = floor.clamp(0.0, 1.0);
        self
    }

    /// Sets the number of ranked library candidates.
    pub fn with_library_top_n(mut self, top_n: usize) -> Self {
        self.library_top_n = top_n.max(1);
        self
    }

    /// Sets the comparator batch size.
    pub fn with_max_pairs_per_batch(mut self, pairs: usize) -> Self {
        self.max_pairs_per_batch = pairs.max(1);
        self
    }

    /// Sets the comparator prompt character cap.
    pub fn with_max_prompt_chars(mut self, chars: usize) -> Self {
        self.max_prompt_chars = chars.max(1);
        self
    }

    /// Sets the per-pair clause excerpt budget.
    pub fn with_per_pair_char_budget(mut self, chars: usize) -> Self {
        self.per_pair_char_budget = chars.max(1);
        self
    }

    /// Sets the embedding concurrency cap.
    pub fn with_max_concurrent_embeds(mut self, cap: usize) -> Self {
        self.max_concurrent_embeds = cap.max(1);
        self
    }

    /// Sets the LLM batch concurrency cap.
    pub fn with_max_concurrent_batches(mut self, cap: usize) -> Self {
        self.max_concurrent_batches = cap.max(1);
        self
    }

    /// Sets the embedding deadline.
    pub fn with_embed_deadline(mut self, deadline: Duration) -> Self {
        self.embed_deadline = deadline;
        self
    }

    /// Sets the comparator batch deadline.
    pub fn with_llm_batch_deadline(mut self, deadline: Duration) -> Self {
        self.llm_batch_deadline = deadline;
        self
    }

    /// Sets the direction-validation deadline.
    pub fn with_direction_deadline(mut self, deadline: Duration) -> Self {
        self.direction_deadline = deadline;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_calibration() {
        let config = ReconcileConfig::default();
        assert!((config.green_similarity - 0.75).abs() < f64::EPSILON);
        assert!((config.amber_similarity - 0.55).abs() < f64::EPSILON);
        assert!((config.semantic_pairing_threshold - 0.72).abs() < f64::EPSILON);
        assert_eq!(config.library_top_n, 5);
        assert_eq!(config.max_pairs_per_batch, 12);
        assert_eq!(config.max_concurrent_embeds, 8);
        assert_eq!(config.max_concurrent_batches, 4);
    }

    #[test]
    fn builder_clamps_thresholds() {
        let config = ReconcileConfig::new()
            .with_green_similarity(1.4)
            .with_library_top_n(0);
        assert!((config.green_similarity - 1.0).abs() < f64::EPSILON);
        assert_eq!(config.library_top_n, 1);
    }
}
