use std::sync::Arc;

use anyhow::{Context, Result};
use core_engine::SuggestionTrie;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task;
use tracing::debug;

pub struct InteractiveShell {
    trie: Arc<SuggestionTrie>,
    prompt: String,
}

impl InteractiveShell {
    pub fn new(trie: Arc<SuggestionTrie>, prompt: impl Into<String>) -> Self {
        Self {
            trie,
            prompt: prompt.into(),
        }
    }

    /// Prompts, reads one term per line and prints its suggestions until the
    /// reader is exhausted.
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        loop {
            writer.write_all(self.prompt.as_bytes()).await?;
            writer.flush().await?;

            let Some(line) = lines.next_line().await.context("failed to read term")? else {
                debug!("input closed");
                break;
            };
            let term = line.trim().to_string();
            let trie = self.trie.clone();
            let suggestions = task::spawn_blocking(move || trie.query(&term)).await?;

            let mut rendered = serde_json::to_string(&suggestions)?;
            rendered.push('\n');
            writer.write_all(rendered.as_bytes()).await?;
        }
        writer.flush().await?;
        Ok(())
    }
}
