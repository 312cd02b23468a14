use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use core_engine::SuggestionTrie;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::protocol::{
    DaemonRequest, DaemonResponse, ErrorCode, ErrorResponse, RequestBody, ResponseBody,
    SuggestResponse,
};

/// JSONL over a Unix socket, one request per line.
pub struct SuggestionServer {
    socket_path: PathBuf,
    session: Session,
}

impl SuggestionServer {
    pub fn new(config: ServerConfig, trie: Arc<SuggestionTrie>) -> Self {
        Self {
            socket_path: config.socket_path,
            session: Session {
                trie,
                suggest_timeout: Duration::from_millis(config.request_timeout_ms.max(1)),
            },
        }
    }

    pub async fn run(&self) -> Result<()> {
        let listener = bind_fresh(&self.socket_path).await?;
        info!(socket = %self.socket_path.display(), "serving suggestions");

        loop {
            let (stream, _) = listener
                .accept()
                .await
                .context("failed to accept connection")?;
            let session = self.session.clone();
            tokio::spawn(async move {
                if let Err(error) = session.serve(stream).await {
                    warn!("connection closed with error: {error:#}");
                }
            });
        }
    }
}

/// Binds `path`, replacing a socket file left behind by an earlier run.
async fn bind_fresh(path: &Path) -> Result<UnixListener> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create socket directory {}", dir.display()))?;
    }
    match fs::remove_file(path).await {
        Ok(()) => debug!(socket = %path.display(), "removed stale socket"),
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to cleanup stale socket {}", path.display()));
        }
    }
    UnixListener::bind(path)
        .with_context(|| format!("failed to bind unix socket at {}", path.display()))
}

/// Per-connection request handling.
#[derive(Clone)]
struct Session {
    trie: Arc<SuggestionTrie>,
    suggest_timeout: Duration,
}

impl Session {
    async fn serve(self, stream: UnixStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            if reader.read_line(&mut line).await? == 0 {
                return Ok(());
            }
            let raw = line.trim();
            if raw.is_empty() {
                continue;
            }
            let mut payload = serde_json::to_vec(&self.respond(raw).await)?;
            payload.push(b'\n');
            writer.write_all(&payload).await?;
        }
    }

    async fn respond(&self, raw: &str) -> DaemonResponse {
        let request = match serde_json::from_str::<DaemonRequest>(raw) {
            Ok(request) => request,
            Err(error) => {
                warn!("invalid request JSON: {error}");
                return error_response(
                    String::new(),
                    ErrorCode::InvalidRequest,
                    format!("invalid JSON payload: {error}"),
                );
            }
        };

        let id = request.id;
        match request.body {
            RequestBody::Ping => DaemonResponse {
                id,
                body: ResponseBody::Pong,
            },
            RequestBody::Suggest(suggest) => self.suggest(id, suggest.term.trim()).await,
            RequestBody::Rebuild => self.rebuild(id).await,
        }
    }

    // A lookup that outlives the timeout keeps running and is still counted.
    async fn suggest(&self, id: String, term: &str) -> DaemonResponse {
        let started = Instant::now();
        let lookup = {
            let trie = self.trie.clone();
            let term = term.to_string();
            task::spawn_blocking(move || trie.query(&term))
        };
        match timeout(self.suggest_timeout, lookup).await {
            Ok(Ok(suggestions)) => DaemonResponse {
                id,
                body: ResponseBody::Suggestions(SuggestResponse {
                    term: term.to_string(),
                    suggestions,
                    elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                }),
            },
            Ok(Err(error)) => error_response(id, ErrorCode::Internal, error.to_string()),
            Err(_) => error_response(
                id,
                ErrorCode::Timeout,
                format!("lookup exceeded {}ms", self.suggest_timeout.as_millis()),
            ),
        }
    }

    // Rebuilds always run to completion, so the reply reports what was published.
    async fn rebuild(&self, id: String) -> DaemonResponse {
        let trie = self.trie.clone();
        match task::spawn_blocking(move || trie.rebuild()).await {
            Ok(Ok(report)) => DaemonResponse {
                id,
                body: ResponseBody::Rebuilt(report),
            },
            Ok(Err(error)) => error_response(id, ErrorCode::Internal, error.to_string()),
            Err(error) => error_response(id, ErrorCode::Internal, error.to_string()),
        }
    }
}

fn error_response(id: String, code: ErrorCode, message: String) -> DaemonResponse {
    DaemonResponse {
        id,
        body: ResponseBody::Error(ErrorResponse { code, message }),
    }
}
