mod ranking;
mod trie;

use std::mem;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::{FrequencyMap, FrequencyStore, StoreError};

pub use ranking::{clamp_limit, RankedTerm, SuggestionPolicy, MAX_NUMBER_OF_SUGGESTIONS};
pub use trie::TrieNode;

/// Longest term, in characters, that is counted or folded into the trie.
///
/// Trie depth equals term length and the per-node caches copy the term at
/// every level, so longer input is dropped rather than stored.
pub const MAX_TERM_LENGTH: usize = 256;

fn is_recordable(term: &str) -> bool {
    !term.is_empty() && term.chars().nth(MAX_TERM_LENGTH).is_none()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieOptions {
    pub policy: SuggestionPolicy,
    pub max_suggestions: usize,
}

impl Default for TrieOptions {
    fn default() -> Self {
        Self {
            policy: SuggestionPolicy::default(),
            max_suggestions: MAX_NUMBER_OF_SUGGESTIONS,
        }
    }
}

/// Summary of one [`SuggestionTrie::rebuild`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    pub folded_terms: usize,
    pub folded_queries: u64,
    pub skipped_entries: usize,
    pub node_count: usize,
    pub term_count: usize,
    pub elapsed_ms: u64,
}

/// Frequency-ranked autocomplete over a trie that is replaced wholesale on
/// every rebuild.
///
/// Queries only bump the pending counter and read whichever root is currently
/// published. `rebuild` drains the pending counter in one critical section,
/// folds it into a deep copy of the published root, and swaps the copy in.
pub struct SuggestionTrie {
    root: ArcSwap<TrieNode>,
    pending: Mutex<FrequencyMap>,
    // Serialises rebuilds so two of them never copy the same old root.
    maintain_lock: Mutex<()>,
    store: Box<dyn FrequencyStore>,
    options: TrieOptions,
}

impl SuggestionTrie {
    /// Loads pending counts from `store` and runs the startup rebuild.
    pub fn open(store: impl FrequencyStore + 'static, options: TrieOptions) -> Self {
        let pending = store.load();
        info!(pending_terms = pending.len(), "loaded pending term frequencies");

        let trie = Self {
            root: ArcSwap::from_pointee(TrieNode::root()),
            pending: Mutex::new(pending),
            maintain_lock: Mutex::new(()),
            store: Box::new(store),
            options: TrieOptions {
                policy: options.policy,
                max_suggestions: clamp_limit(options.max_suggestions),
            },
        };
        if let Err(error) = trie.rebuild() {
            warn!("startup rebuild could not clear the frequency store: {error}");
        }
        trie
    }

    pub fn options(&self) -> TrieOptions {
        self.options
    }

    /// Counts one query for `term` and persists the whole pending map before
    /// returning. The live trie is untouched until the next rebuild.
    ///
    /// Empty terms and terms longer than [`MAX_TERM_LENGTH`] are not counted.
    pub fn record_query(&self, term: &str) -> Result<(), StoreError> {
        if term.is_empty() {
            return Ok(());
        }
        if !is_recordable(term) {
            warn!(max = MAX_TERM_LENGTH, "ignoring over-long term");
            return Ok(());
        }
        let mut pending = self.pending.lock();
        let count = pending.entry(term.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        self.store.save(&pending)
    }

    /// Records `term`, then answers from the currently published trie.
    pub fn query(&self, term: &str) -> Vec<String> {
        if let Err(error) = self.record_query(term) {
            warn!(term = %term, "query not persisted: {error}");
        }
        if !is_recordable(term) {
            return Vec::new();
        }

        let root = self.root.load();
        match root.find(term) {
            Some(node) => {
                ranking::select(node, term, self.options.policy, self.options.max_suggestions)
            }
            None => Vec::new(),
        }
    }

    /// Folds every pending count into a fresh copy of the trie and publishes
    /// it.
    ///
    /// The new trie is published even when clearing the store fails; the
    /// error is returned afterwards.
    pub fn rebuild(&self) -> Result<RebuildReport, StoreError> {
        let _maintain = self.maintain_lock.lock();
        let started = Instant::now();
        debug!("start rebuilding trie");

        let mut next = TrieNode::clone(&self.root.load());

        let (drained, cleared) = {
            let mut pending = self.pending.lock();
            let drained = mem::take(&mut *pending);
            let cleared = self.store.save(&pending);
            (drained, cleared)
        };

        let mut report = RebuildReport::default();
        for (term, count) in drained {
            if count == 0 || !is_recordable(&term) {
                debug!(chars = term.chars().count(), count, "skipping malformed pending entry");
                report.skipped_entries += 1;
                continue;
            }
            next.add_frequency(&term, count);
            report.folded_terms += 1;
            report.folded_queries = report.folded_queries.saturating_add(count);
        }

        next.refresh_top_suggestions(self.options.max_suggestions);
        report.node_count = next.node_count();
        report.term_count = next.term_count();

        self.root.store(Arc::new(next));
        report.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            folded_terms = report.folded_terms,
            folded_queries = report.folded_queries,
            skipped = report.skipped_entries,
            nodes = report.node_count,
            elapsed_ms = report.elapsed_ms,
            "finished rebuilding trie"
        );

        cleared.map(|()| report)
    }

    /// The currently published root.
    pub fn snapshot(&self) -> Arc<TrieNode> {
        self.root.load_full()
    }

    pub fn pending(&self) -> FrequencyMap {
        self.pending.lock().clone()
    }

    pub fn pending_count(&self, term: &str) -> u64 {
        self.pending.lock().get(term).copied().unwrap_or(0)
    }
}

impl std::fmt::Debug for SuggestionTrie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionTrie")
            .field("options", &self.options)
            .field("pending_terms", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}
