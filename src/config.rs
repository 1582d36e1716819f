//! Harness configuration
//!
//! Settings are resolved once at startup, in this order:
//! 1. Built-in defaults
//! 2. `~/.harness/config.json` (flat JSON object)
//! 3. Environment variables (how Kubernetes ConfigMaps inject settings)
//!
//! The resulting `Config` is never mutated during a session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

/// Resolved harness settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ollama model used for chat completions
    pub chat_model: String,
    /// Ollama model used for embeddings (semantic search and indexing)
    pub embed_model: String,
    /// Maximum completion/dispatch rounds per task
    pub max_steps: usize,
    /// Context budget shown by `/context`; not enforced
    pub max_context_tokens: usize,
    /// Reserved: streaming has no effect on the agent loop
    pub stream: bool,
    /// Base URL of the Ollama server
    pub ollama_host: String,
    /// Base URL of the Qdrant REST API
    pub qdrant_url: String,
    /// Qdrant collection holding code chunks
    pub collection: String,
    /// Workspace root for the filesystem and command tools
    pub filesystem_root: PathBuf,
    /// Timeout for chat completion requests in seconds
    pub request_timeout_secs: u64,
    /// External MCP servers whose tools join the registry
    pub mcp_servers: Vec<McpServerConfig>,
}

/// An MCP server started as a child process speaking JSON-RPC on stdio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Variables passed to the Contrast MCP server when `CONTRAST_API_KEY` is set
const CONTRAST_ENV: &[&str] = &[
    "CONTRAST_HOST_NAME",
    "CONTRAST_API_KEY",
    "CONTRAST_ORG_ID",
    "CONTRAST_SERVICE_KEY",
    "CONTRAST_USERNAME",
];

impl Default for Config {
    fn default() -> Self {
        Self {
            chat_model: "codestral:22b-v0.1-q8_0".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            max_steps: 20,
            // Leaves headroom in a 32k window
            max_context_tokens: 28000,
            stream: false,
            ollama_host: "http://localhost:11434".to_string(),
            qdrant_url: "http://localhost:6333".to_string(),
            collection: "code".to_string(),
            filesystem_root: PathBuf::from("/tmp"),
            request_timeout_secs: 300,
            mcp_servers: Vec::new(),
        }
    }
}

impl Config {
    /// Directory holding the persisted settings (`~/.harness`)
    pub fn dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".harness"))
    }

    /// Path of the persisted settings file (`~/.harness/config.json`)
    pub fn path() -> Option<PathBuf> {
        Self::dir().map(|dir| dir.join("config.json"))
    }

    /// Load defaults, then the settings file, then environment overrides.
    ///
    /// A missing or malformed settings file is not fatal: it is logged and
    /// the defaults are used instead.
    pub fn load() -> Self {
        let mut config = match Self::path() {
            Some(path) if path.exists() => match Self::from_file(&path) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                    Self::default()
                }
            },
            _ => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Parse a settings file. Keys that are absent keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// Numeric values that fail to parse are ignored with a warning.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CHAT_MODEL") {
            self.chat_model = v;
        }
        if let Some(v) = lookup("EMBED_MODEL") {
            self.embed_model = v;
        }
        if let Some(v) = parse_env(&lookup, "MAX_STEPS") {
            self.max_steps = v;
        }
        if let Some(v) = parse_env(&lookup, "MAX_CONTEXT_TOKENS") {
            self.max_context_tokens = v;
        }
        if let Some(v) = parse_env(&lookup, "HARNESS_STREAM") {
            self.stream = v;
        }
        if let Some(v) = lookup("OLLAMA_HOST") {
            self.ollama_host = normalize_url(&v);
        }
        if let Some(v) = lookup("QDRANT_URL") {
            self.qdrant_url = normalize_url(&v);
        } else if let Some(host) = lookup("QDRANT_HOST") {
            let port = lookup("QDRANT_PORT").unwrap_or_else(|| "6333".to_string());
            self.qdrant_url = normalize_url(&format!("{}:{}", host, port));
        }
        if let Some(v) = lookup("QDRANT_COLLECTION") {
            self.collection = v;
        }
        if let Some(v) = lookup("FILESYSTEM_ROOT") {
            self.filesystem_root = PathBuf::from(v);
        }
        if let Some(v) = parse_env(&lookup, "REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = v;
        }
        let has_contrast = self.mcp_servers.iter().any(|s| s.name == "contrast");
        if lookup("CONTRAST_API_KEY").is_some() && !has_contrast {
            self.mcp_servers.push(McpServerConfig {
                name: "contrast".to_string(),
                command: "java".to_string(),
                args: ["-jar", "/opt/mcp-contrast.jar", "-t", "stdio"]
                    .iter()
                    .map(|a| a.to_string())
                    .collect(),
                env: CONTRAST_ENV
                    .iter()
                    .map(|key| (key.to_string(), lookup(key).unwrap_or_default()))
                    .collect(),
            });
        }
    }

    /// Persist the current settings to `~/.harness/config.json`
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let dir = Self::dir().ok_or(ConfigError::NoHome)?;
        self.save_to(&dir.join("config.json"))
    }

    /// Persist the current settings to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(path.to_path_buf())
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

/// Accept bare `host:port` values (as K8s service env vars provide them)
fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chat_model, "codestral:22b-v0.1-q8_0");
        assert_eq!(config.embed_model, "nomic-embed-text");
        assert_eq!(config.max_steps, 20);
        assert_eq!(config.max_context_tokens, 28000);
        assert!(!config.stream);
        assert_eq!(config.collection, "code");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("CHAT_MODEL", "qwen2.5-coder"),
            ("MAX_STEPS", "5"),
            ("OLLAMA_HOST", "ollama.default.svc:11434"),
            ("QDRANT_HOST", "qdrant"),
        ]));

        assert_eq!(config.chat_model, "qwen2.5-coder");
        assert_eq!(config.max_steps, 5);
        assert_eq!(config.ollama_host, "http://ollama.default.svc:11434");
        assert_eq!(config.qdrant_url, "http://qdrant:6333");
    }

    #[test]
    fn test_bad_numeric_env_is_ignored() {
        let mut config = Config::default();
        config.apply_env(env(&[("MAX_STEPS", "lots")]));
        assert_eq!(config.max_steps, 20);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"chat_model": "llama3.2", "max_steps": 8, "unknown": 1}"#).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.chat_model, "llama3.2");
        assert_eq!(config.max_steps, 8);
        assert_eq!(config.max_context_tokens, 28000);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            max_steps: 3,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::from_file(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_mcp_servers_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"mcp_servers": [{"name": "git", "command": "uvx", "args": ["mcp-server-git"]}]}"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.mcp_servers.len(), 1);
        assert_eq!(config.mcp_servers[0].command, "uvx");
        assert_eq!(config.mcp_servers[0].args, vec!["mcp-server-git"]);
        assert!(config.mcp_servers[0].env.is_empty());
    }

    #[test]
    fn test_contrast_server_added_with_api_key() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("CONTRAST_API_KEY", "key"),
            ("CONTRAST_ORG_ID", "org"),
        ]));

        assert_eq!(config.mcp_servers.len(), 1);
        let contrast = &config.mcp_servers[0];
        assert_eq!(contrast.name, "contrast");
        assert_eq!(contrast.command, "java");
        assert_eq!(contrast.args, vec!["-jar", "/opt/mcp-contrast.jar", "-t", "stdio"]);
        assert_eq!(contrast.env["CONTRAST_API_KEY"], "key");
        assert_eq!(contrast.env["CONTRAST_ORG_ID"], "org");
        assert_eq!(contrast.env["CONTRAST_USERNAME"], "");

        // Applying twice never duplicates it
        config.apply_env(env(&[("CONTRAST_API_KEY", "key")]));
        assert_eq!(config.mcp_servers.len(), 1);
    }

    #[test]
    fn test_no_mcp_servers_by_default() {
        let mut config = Config::default();
        config.apply_env(env(&[]));
        assert!(config.mcp_servers.is_empty());
    }
}
