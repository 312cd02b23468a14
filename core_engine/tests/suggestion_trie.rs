use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use core_engine::{
    FrequencyMap, FrequencyStore, JsonFileStore, MemoryStore, StoreError, SuggestionPolicy,
    SuggestionTrie, TrieOptions, MAX_NUMBER_OF_SUGGESTIONS, MAX_TERM_LENGTH,
};
use tempfile::TempDir;

/// Shares one `MemoryStore` between the trie and the test body.
#[derive(Clone, Default)]
struct SharedStore(Arc<MemoryStore>);

impl FrequencyStore for SharedStore {
    fn load(&self) -> FrequencyMap {
        self.0.load()
    }

    fn save(&self, frequencies: &FrequencyMap) -> Result<(), StoreError> {
        self.0.save(frequencies)
    }
}

/// Rejects writes while `failing` is set.
#[derive(Clone, Default)]
struct FlakyStore {
    failing: Arc<AtomicBool>,
    inner: Arc<MemoryStore>,
}

impl FrequencyStore for FlakyStore {
    fn load(&self) -> FrequencyMap {
        self.inner.load()
    }

    fn save(&self, frequencies: &FrequencyMap) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Write {
                path: "flaky".into(),
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.save(frequencies)
    }
}

fn fresh(policy: SuggestionPolicy) -> SuggestionTrie {
    SuggestionTrie::open(
        MemoryStore::new(),
        TrieOptions {
            policy,
            max_suggestions: MAX_NUMBER_OF_SUGGESTIONS,
        },
    )
}

// ---------------------------------------------------------------------------
// Query / record basics
// ---------------------------------------------------------------------------

#[test]
fn never_queried_term_has_no_suggestions() {
    let trie = fresh(SuggestionPolicy::ExactMatch);
    assert!(trie.query("ab").is_empty());
    assert!(trie.query("zzz").is_empty());

    trie.record_query("xyz").unwrap();
    trie.rebuild().unwrap();
    assert!(trie.query("xy").is_empty(), "prefix-only path is not a term");
}

#[test]
fn recorded_term_is_suggested_after_rebuild() {
    for policy in [SuggestionPolicy::ExactMatch, SuggestionPolicy::TopCompletions] {
        let trie = fresh(policy);
        trie.record_query("hello").unwrap();
        assert!(
            trie.snapshot().find("hello").is_none(),
            "recording must not touch the live trie"
        );

        trie.rebuild().unwrap();
        assert!(trie.query("hello").contains(&"hello".to_string()));
    }
}

#[test]
fn query_counts_toward_ranking_even_without_results() {
    let trie = fresh(SuggestionPolicy::TopCompletions);
    assert!(trie.query("miss").is_empty());
    assert_eq!(trie.pending_count("miss"), 1);

    trie.rebuild().unwrap();
    assert_eq!(trie.query("miss"), vec!["miss"]);
}

#[test]
fn record_query_counts_exactly_n() {
    let trie = fresh(SuggestionPolicy::TopCompletions);
    for _ in 0..7 {
        trie.record_query("same").unwrap();
    }
    trie.record_query("other").unwrap();

    assert_eq!(trie.pending_count("same"), 7);
    assert_eq!(trie.pending_count("other"), 1);
    assert_eq!(trie.pending().len(), 2);
}

#[test]
fn empty_term_is_ignored() {
    let trie = fresh(SuggestionPolicy::TopCompletions);
    trie.record_query("a").unwrap();
    trie.rebuild().unwrap();

    assert!(trie.query("").is_empty());
    assert!(trie.pending().is_empty());
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

#[test]
fn completions_are_ranked_by_frequency() {
    let trie = fresh(SuggestionPolicy::TopCompletions);
    for (term, times) in [("work", 3), ("world", 5), ("would", 2), ("word", 5)] {
        for _ in 0..times {
            trie.record_query(term).unwrap();
        }
    }
    trie.rebuild().unwrap();

    assert_eq!(trie.query("wor"), vec!["word", "world", "work"]);
    assert_eq!(trie.query("wo"), vec!["word", "world", "work", "would"]);
}

#[test]
fn suggestions_never_exceed_cap() {
    let trie = fresh(SuggestionPolicy::TopCompletions);
    for i in 0..40 {
        trie.record_query(&format!("pre{i}")).unwrap();
    }
    trie.record_query("pre").unwrap();
    trie.rebuild().unwrap();

    let out = trie.query("pre");
    assert_eq!(out.len(), MAX_NUMBER_OF_SUGGESTIONS);
    assert_eq!(out[0], "pre");
}

#[test]
fn configured_limit_is_respected() {
    let trie = SuggestionTrie::open(
        MemoryStore::new(),
        TrieOptions {
            policy: SuggestionPolicy::TopCompletions,
            max_suggestions: 2,
        },
    );
    for term in ["aa", "ab", "ac"] {
        trie.record_query(term).unwrap();
    }
    trie.rebuild().unwrap();
    assert_eq!(trie.query("a").len(), 2);
}

#[test]
fn frequencies_accumulate_across_rebuilds() {
    let trie = fresh(SuggestionPolicy::TopCompletions);
    trie.record_query("rare").unwrap();
    for _ in 0..3 {
        trie.record_query("rank").unwrap();
    }
    trie.rebuild().unwrap();
    assert_eq!(trie.query("ra"), vec!["rank", "rare"]);

    // The "ra" lookup above was recorded too and is folded here.
    for _ in 0..5 {
        trie.record_query("rare").unwrap();
    }
    trie.rebuild().unwrap();
    assert_eq!(trie.snapshot().find("rare").unwrap().frequency(), 6);
    assert_eq!(trie.query("ra"), vec!["ra", "rare", "rank"]);
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

#[test]
fn rebuild_clears_pending_and_store() {
    let store = SharedStore::default();
    let trie = SuggestionTrie::open(store.clone(), TrieOptions::default());
    trie.record_query("cat").unwrap();
    trie.record_query("dog").unwrap();
    assert_eq!(store.0.snapshot().len(), 2);

    trie.rebuild().unwrap();
    assert!(trie.pending().is_empty());
    assert!(store.0.snapshot().is_empty());
}

#[test]
fn every_record_is_persisted_before_returning() {
    let store = SharedStore::default();
    let trie = SuggestionTrie::open(store.clone(), TrieOptions::default());
    trie.record_query("cat").unwrap();
    trie.record_query("cat").unwrap();
    assert_eq!(
        store.0.snapshot(),
        FrequencyMap::from([("cat".to_string(), 2)])
    );
}

#[test]
fn restart_reloads_last_saved_counts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("terms_frequency.json");

    let trie = SuggestionTrie::open(JsonFileStore::new(&path), TrieOptions::default());
    assert!(trie.query("ab").is_empty());
    for _ in 0..3 {
        trie.record_query("ab").unwrap();
    }
    trie.rebuild().unwrap();
    assert_eq!(trie.query("ab"), vec!["ab"]);
    trie.record_query("cd").unwrap();
    drop(trie);

    let reloaded = JsonFileStore::new(&path).load();
    assert_eq!(
        reloaded,
        FrequencyMap::from([("ab".to_string(), 1), ("cd".to_string(), 1)])
    );

    let restarted = SuggestionTrie::open(JsonFileStore::new(&path), TrieOptions::default());
    assert_eq!(restarted.snapshot().find("ab").unwrap().frequency(), 1);
    assert!(JsonFileStore::new(&path).load().is_empty());
}

#[test]
fn store_failures_degrade_durability_not_availability() {
    let store = FlakyStore::default();
    let trie = SuggestionTrie::open(store.clone(), TrieOptions::default());

    store.failing.store(true, Ordering::SeqCst);
    assert!(trie.record_query("kept").is_err());
    assert_eq!(trie.pending_count("kept"), 1, "in-memory count survives");
    assert!(trie.query("kept").is_empty());
    assert_eq!(trie.pending_count("kept"), 2);

    assert!(trie.rebuild().is_err());
    assert_eq!(
        trie.query("kept"),
        vec!["kept"],
        "rebuild still publishes when the store cannot be cleared"
    );

    store.failing.store(false, Ordering::SeqCst);
    trie.rebuild().unwrap();
    assert!(store.inner.snapshot().is_empty());
}

#[test]
fn pasted_line_does_not_exhaust_a_blocking_thread_stack() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("terms_frequency.json");
    let huge = "a".repeat(50_000);

    // Same stack size as tokio's blocking pool.
    let worker = {
        let path = path.clone();
        let huge = huge.clone();
        thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || {
                let trie = SuggestionTrie::open(JsonFileStore::new(&path), TrieOptions::default());
                assert!(trie.query(&huge).is_empty());
                trie.record_query(&huge).unwrap();
                trie.record_query("ok").unwrap();
                let report = trie.rebuild().unwrap();
                assert_eq!(report.folded_terms, 1);
                assert_eq!(trie.query("ok"), vec!["ok"]);
            })
            .unwrap()
    };
    worker.join().unwrap();

    // A long term that reached the store anyway is skipped on restart.
    let store = JsonFileStore::new(&path);
    store
        .save(&FrequencyMap::from([(huge, 3), ("ok".to_string(), 1)]))
        .unwrap();
    let restarted = thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(move || {
            let trie = SuggestionTrie::open(store, TrieOptions::default());
            let root = trie.snapshot();
            assert_eq!(root.find("ok").unwrap().frequency(), 1);
            assert_eq!(root.term_count(), 1);
            assert!(root.find(&"a".repeat(MAX_TERM_LENGTH + 1)).is_none());
        })
        .unwrap();
    restarted.join().unwrap();
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_records_are_never_lost_or_doubled() {
    const WRITERS: usize = 4;
    const PER_WRITER: u64 = 500;

    let trie = Arc::new(fresh(SuggestionPolicy::TopCompletions));
    let done = Arc::new(AtomicBool::new(false));

    let rebuilder = {
        let trie = trie.clone();
        let done = done.clone();
        thread::spawn(move || {
            let mut rebuilds = 0usize;
            while !done.load(Ordering::SeqCst) {
                trie.rebuild().unwrap();
                rebuilds += 1;
            }
            rebuilds
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|_| {
            let trie = trie.clone();
            thread::spawn(move || {
                for _ in 0..PER_WRITER {
                    trie.record_query("x").unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }
    done.store(true, Ordering::SeqCst);
    let rebuilds = rebuilder.join().unwrap();
    assert!(rebuilds > 0);

    trie.rebuild().unwrap();
    let root = trie.snapshot();
    assert_eq!(
        root.find("x").unwrap().frequency(),
        WRITERS as u64 * PER_WRITER
    );
    assert!(trie.pending().is_empty());
}

#[test]
fn concurrent_rebuilds_do_not_drop_folded_counts() {
    let trie = Arc::new(fresh(SuggestionPolicy::TopCompletions));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let trie = trie.clone();
            thread::spawn(move || {
                for _ in 0..50 {
                    trie.record_query(&format!("t{i}")).unwrap();
                    trie.rebuild().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let root = trie.snapshot();
    for i in 0..4 {
        assert_eq!(root.find(&format!("t{i}")).unwrap().frequency(), 50);
    }
}

#[test]
fn readers_always_see_a_complete_trie() {
    let trie = Arc::new(fresh(SuggestionPolicy::TopCompletions));
    for _ in 0..3 {
        trie.record_query("stable").unwrap();
    }
    trie.rebuild().unwrap();

    let reader = {
        let trie = trie.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let root = trie.snapshot();
                assert!(root.find("stable").unwrap().frequency() >= 3);
            }
        })
    };
    for i in 0..50 {
        trie.record_query(&format!("noise{i}")).unwrap();
        trie.rebuild().unwrap();
    }
    reader.join().unwrap();
}
