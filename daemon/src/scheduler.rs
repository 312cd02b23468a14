use std::sync::Arc;
use std::time::Duration;

use core_engine::SuggestionTrie;
use tokio::task::{self, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, warn};

/// Runs `SuggestionTrie::rebuild` on a fixed period. The startup rebuild is
/// done by `SuggestionTrie::open`, so the first tick fires one period in.
pub struct RebuildScheduler {
    trie: Arc<SuggestionTrie>,
    period: Duration,
}

impl RebuildScheduler {
    pub fn new(trie: Arc<SuggestionTrie>, period: Duration) -> Self {
        Self { trie, period }
    }

    /// Starts the timer. Abort the handle at shutdown to stop it.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.rebuild_once().await;
        }
    }

    async fn rebuild_once(&self) {
        let trie = self.trie.clone();
        match task::spawn_blocking(move || trie.rebuild()).await {
            Ok(Ok(report)) => debug!(
                folded_terms = report.folded_terms,
                elapsed_ms = report.elapsed_ms,
                "scheduled rebuild done"
            ),
            Ok(Err(error)) => warn!("scheduled rebuild could not clear the frequency store: {error}"),
            Err(error) => error!("scheduled rebuild panicked: {error}"),
        }
    }
}
