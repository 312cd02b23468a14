//! Autocomplete engine ranked by how often each exact term has been queried.
//!
//! [`SuggestionTrie`] serves lookups from an immutable, atomically published
//! trie while query counts accumulate in a pending map backed by a
//! [`FrequencyStore`]. Periodic rebuilds fold the pending counts into a fresh
//! trie.

pub mod store;
pub mod suggest;

pub use store::{FrequencyMap, FrequencyStore, JsonFileStore, MemoryStore, StoreError};
pub use suggest::{
    clamp_limit, RankedTerm, RebuildReport, SuggestionPolicy, SuggestionTrie, TrieNode,
    TrieOptions, MAX_NUMBER_OF_SUGGESTIONS, MAX_TERM_LENGTH,
};
