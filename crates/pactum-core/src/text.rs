//! Text normalization shared across the reconciliation pipeline.
//!
//! All case folding and whitespace collapsing used by pairing, identity
//! resolution and prompt assembly lives here so that the rest of the engine
//! never re-implements its own variant.

/// Normalizer for clause types and term categories.
///
/// Clause types arrive as lowercase snake case (`payment_terms`); term
/// categories arrive as free text (`"Payment Terms"`). Both are folded into
/// the same shape: lowercase, underscores replaced by spaces, runs of
/// whitespace collapsed to a single space, trimmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClauseTypeNormalizer;

impl ClauseTypeNormalizer {
    /// Normalizes a clause type or term category label.
    pub fn normalize(label: &str) -> String {
        collapse_whitespace(&label.to_lowercase().replace('_', " "))
    }

    /// Normalizes a label and strips the remaining spaces, for substring
    /// checks that must be insensitive to `usage_rights` vs `usage rights`.
    pub fn normalize_compact(label: &str) -> String {
        Self::normalize(label).replace(' ', "")
    }
}

/// Lowercases free text and collapses all whitespace runs to single spaces.
pub fn normalize_text(text: &str) -> String {
    collapse_whitespace(&text.to_lowercase())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates `text` to at most `max_chars`, preferring a sentence boundary.
///
/// Returns the (possibly shortened) text and whether truncation happened.
/// The cut point is the last `.`, `!`, `?` or newline within the budget; if
/// none exists, the text is cut at the last character boundary within the
/// budget.
pub fn truncate_at_sentence(text: &str, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        return (text.to_string(), false);
    }

    let window: String = text.chars().take(max_chars).collect();
    let boundary = window
        .rmatch_indices(['.', '!', '?', '\n'])
        .next()
        .map(|(idx, sep)| idx + sep.len());

    let cut = match boundary {
        // A boundary in the first few chars would leave nothing useful.
        Some(idx) if idx > max_chars / 4 => idx,
        _ => window.len(),
    };

    (window[..cut].trim_end().to_string(), true)
}
