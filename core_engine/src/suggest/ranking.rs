use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::trie::TrieNode;

/// Hard cap on how many suggestions a single query can return.
pub const MAX_NUMBER_OF_SUGGESTIONS: usize = 10;

/// How a matched prefix node is turned into a suggestion list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionPolicy {
    /// Only the typed term itself, and only once it has been folded in.
    ExactMatch,
    /// The typed term first (if folded in), then the most frequent terms
    /// under the prefix.
    #[default]
    TopCompletions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedTerm {
    pub term: String,
    pub frequency: u64,
}

impl RankedTerm {
    pub fn new(term: String, frequency: u64) -> Self {
        Self { term, frequency }
    }
}

impl Ord for RankedTerm {
    // Higher frequency sorts first; ties fall back to the term text.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .frequency
            .cmp(&self.frequency)
            .then_with(|| self.term.cmp(&other.term))
    }
}

impl PartialOrd for RankedTerm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn rank(candidates: &mut Vec<RankedTerm>, limit: usize) {
    candidates.sort_unstable();
    candidates.truncate(limit);
}

/// Clamps a configured suggestion count into `1..=MAX_NUMBER_OF_SUGGESTIONS`.
pub fn clamp_limit(requested: usize) -> usize {
    requested.clamp(1, MAX_NUMBER_OF_SUGGESTIONS)
}

/// Builds the answer for `term`, whose walk ended at `node`.
pub fn select(
    node: &TrieNode,
    term: &str,
    policy: SuggestionPolicy,
    limit: usize,
) -> Vec<String> {
    let limit = clamp_limit(limit);
    let mut out = Vec::with_capacity(limit);
    if node.frequency() > 0 {
        out.push(term.to_string());
    }

    if policy == SuggestionPolicy::TopCompletions {
        out.extend(
            node.top_suggestions()
                .iter()
                .filter(|ranked| ranked.term != term)
                .map(|ranked| ranked.term.clone())
                .take(limit.saturating_sub(out.len())),
        );
    }

    out.truncate(limit);
    out
}
