mod config;
mod protocol;
mod scheduler;
mod server;
mod shell;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::DaemonConfig;
use core_engine::{JsonFileStore, SuggestionTrie};
use scheduler::RebuildScheduler;
use server::SuggestionServer;
use shell::InteractiveShell;
use tokio::io::{self, BufReader};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = DaemonConfig::load()?;
    let options = config.suggest.trie_options();
    info!(
        store = %config.store.path.display(),
        rebuild_interval_secs = config.rebuild.interval().as_secs(),
        policy = ?options.policy,
        max_suggestions = options.max_suggestions,
        shell_enabled = config.shell.enable,
        server_enabled = config.server.enable,
        "loaded trie-suggest config"
    );

    let store = JsonFileStore::new(config.store.path.clone());
    let trie = tokio::task::spawn_blocking(move || SuggestionTrie::open(store, options))
        .await
        .context("trie initialisation panicked")?;
    let trie = Arc::new(trie);

    let rebuilds = RebuildScheduler::new(trie.clone(), config.rebuild.interval()).spawn();
    let server = config.server.enable.then(|| {
        let server = SuggestionServer::new(config.server.clone(), trie.clone());
        tokio::spawn(async move {
            if let Err(error) = server.run().await {
                error!("suggestion server stopped: {error:#}");
            }
        })
    });

    let interrupted = if config.shell.enable {
        let shell = InteractiveShell::new(trie.clone(), config.shell.prompt.clone());
        tokio::select! {
            res = shell.run(BufReader::new(io::stdin()), io::stdout()) => {
                res?;
                false
            }
            res = signal::ctrl_c() => {
                res.context("failed to listen for interrupt")?;
                true
            }
        }
    } else {
        false
    };
    // Without a shell, or once stdin closes, keep serving until interrupted.
    if !interrupted && (server.is_some() || !config.shell.enable) {
        signal::ctrl_c()
            .await
            .context("failed to listen for interrupt")?;
    }

    info!("shutting down");
    rebuilds.abort();
    if let Some(server) = server {
        server.abort();
    }
    Ok(())
}
