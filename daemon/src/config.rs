use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use core_engine::{clamp_limit, SuggestionPolicy, TrieOptions, MAX_NUMBER_OF_SUGGESTIONS};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub rebuild: RebuildConfig,
    #[serde(default)]
    pub suggest: SuggestConfig,
    #[serde(default)]
    pub shell: ShellConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl DaemonConfig {
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path();
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config file {}", config_path.display()))?;
            return Self::parse(&raw)
                .with_context(|| format!("failed to parse TOML from {}", config_path.display()));
        }

        Ok(DaemonConfig::default())
    }

    fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

fn resolve_config_path() -> PathBuf {
    if let Ok(path) = env::var("TRIE_SUGGEST_CONFIG") {
        return Path::new(&path).to_path_buf();
    }

    if let Some(base) = dirs::config_dir() {
        return base.join("trie-suggest").join("config.toml");
    }

    Path::new("/tmp/trie-suggest.toml").to_path_buf()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    Path::new("terms_frequency.json").to_path_buf()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RebuildConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl RebuildConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuggestConfig {
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
    #[serde(default)]
    pub policy: SuggestionPolicy,
}

impl SuggestConfig {
    pub fn trie_options(&self) -> TrieOptions {
        TrieOptions {
            policy: self.policy,
            max_suggestions: clamp_limit(self.max_suggestions),
        }
    }
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            max_suggestions: default_max_suggestions(),
            policy: SuggestionPolicy::default(),
        }
    }
}

fn default_max_suggestions() -> usize {
    MAX_NUMBER_OF_SUGGESTIONS
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_shell_enabled")]
    pub enable: bool,
    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            enable: default_shell_enabled(),
            prompt: default_prompt(),
        }
    }
}

fn default_shell_enabled() -> bool {
    true
}

fn default_prompt() -> String {
    "Enter term: ".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enable: false,
            socket_path: default_socket_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    Path::new("/tmp/trie-suggest.sock").to_path_buf()
}

fn default_request_timeout_ms() -> u64 {
    120
}
