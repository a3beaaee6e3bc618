//! Store and engine configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use paperforge_core::balancer::BalanceOptions;
use paperforge_core::engine::{EngineConfig, SelectionStrategy};
use paperforge_core::traits::{DiscardSink, QuestionRepository, ResultSink};

use crate::file::{FileStore, JsonlResultSink};
use crate::http::HttpStore;
use crate::memory::InMemoryStore;

/// Where questions, blueprints and results live.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Empty in-process store.
    Memory,
    /// JSON question bank on disk; results are appended to `results` when set.
    File {
        path: PathBuf,
        #[serde(default)]
        results: Option<PathBuf>,
    },
    /// Remote document store.
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_timeout")]
        timeout_secs: u64,
    },
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Memory => f.write_str("Memory"),
            StoreConfig::File { path, results } => f
                .debug_struct("File")
                .field("path", path)
                .field("results", results)
                .finish(),
            StoreConfig::Http {
                base_url,
                api_key,
                timeout_secs,
            } => f
                .debug_struct("Http")
                .field("base_url", base_url)
                .field("api_key", &api_key.as_ref().map(|_| "***"))
                .field("timeout_secs", timeout_secs)
                .finish(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: PathBuf::from("questions.json"),
            results: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// Engine tuning as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub strategy: SelectionStrategy,
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default = "default_max_swaps")]
    pub max_swaps: u32,
    #[serde(default = "default_topic_pool")]
    pub topic_pool_limit: usize,
    #[serde(default = "default_pool_factor")]
    pub pool_factor: u32,
}

fn default_tolerance() -> f64 {
    0.30
}
fn default_parallelism() -> usize {
    4
}
fn default_max_swaps() -> u32 {
    50
}
fn default_topic_pool() -> usize {
    50
}
fn default_pool_factor() -> u32 {
    5
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            strategy: SelectionStrategy::default(),
            parallelism: default_parallelism(),
            max_swaps: default_max_swaps(),
            topic_pool_limit: default_topic_pool(),
            pool_factor: default_pool_factor(),
        }
    }
}

impl EngineSection {
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            tolerance: self.tolerance,
            strategy: self.strategy,
            parallelism: self.parallelism,
            topic_pool_limit: self.topic_pool_limit,
            pool_factor: self.pool_factor,
            balance: BalanceOptions {
                max_swaps: self.max_swaps,
                ..BalanceOptions::default()
            },
            ..EngineConfig::default()
        }
    }
}

/// Top-level paperforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperforgeConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub engine: EngineSection,
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Unset variables resolve to the empty string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

fn resolve_path(path: &Path) -> PathBuf {
    PathBuf::from(resolve_env_vars(&path.to_string_lossy()))
}

fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Memory => StoreConfig::Memory,
        StoreConfig::File { path, results } => StoreConfig::File {
            path: resolve_path(path),
            results: results.as_deref().map(resolve_path),
        },
        StoreConfig::Http {
            base_url,
            api_key,
            timeout_secs,
        } => StoreConfig::Http {
            base_url: resolve_env_vars(base_url),
            api_key: api_key.as_deref().map(resolve_env_vars),
            timeout_secs: *timeout_secs,
        },
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `paperforge.toml` in the current directory
/// 2. `~/.config/paperforge/config.toml`
///
/// Environment variable overrides: `PAPERFORGE_STORE_URL`, `PAPERFORGE_API_KEY`.
pub fn load_config() -> Result<PaperforgeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<PaperforgeConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("paperforge.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|home| home.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loading config");
            toml::from_str::<PaperforgeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => PaperforgeConfig::default(),
    };

    apply_env_overrides(&mut config);
    config.store = resolve_store_config(&config.store);
    Ok(config)
}

fn apply_env_overrides(config: &mut PaperforgeConfig) {
    if let Ok(url) = std::env::var("PAPERFORGE_STORE_URL") {
        let api_key = match &config.store {
            StoreConfig::Http { api_key, .. } => api_key.clone(),
            _ => None,
        };
        config.store = StoreConfig::Http {
            base_url: url,
            api_key,
            timeout_secs: default_timeout(),
        };
    }

    if let Ok(key) = std::env::var("PAPERFORGE_API_KEY") {
        if let StoreConfig::Http { api_key, .. } = &mut config.store {
            *api_key = Some(key);
        }
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("paperforge"))
}

/// A repository together with the sink graded results go to.
pub struct Store {
    pub repository: Arc<dyn QuestionRepository>,
    pub sink: Arc<dyn ResultSink>,
}

/// Create the configured store.
pub fn create_store(config: &StoreConfig) -> Result<Store> {
    match config {
        StoreConfig::Memory => {
            let store = Arc::new(InMemoryStore::new());
            Ok(Store {
                repository: store.clone(),
                sink: store,
            })
        }
        StoreConfig::File { path, results } => {
            let store = FileStore::open(path.clone())?;
            let sink: Arc<dyn ResultSink> = match results {
                Some(results) => Arc::new(JsonlResultSink::new(results.clone())),
                None => Arc::new(DiscardSink),
            };
            Ok(Store {
                repository: Arc::new(store),
                sink,
            })
        }
        StoreConfig::Http {
            base_url,
            api_key,
            timeout_secs,
        } => {
            let store = Arc::new(HttpStore::with_timeout(base_url, api_key.clone(), *timeout_secs)?);
            Ok(Store {
                repository: store.clone(),
                sink: store,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_PAPERFORGE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_PAPERFORGE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_PAPERFORGE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${_PAPERFORGE_UNSET_VAR}"), "");
        assert_eq!(resolve_env_vars("no ${closing"), "no ${closing");
        std::env::remove_var("_PAPERFORGE_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = PaperforgeConfig::default();
        assert!(matches!(config.store, StoreConfig::File { .. }));
        assert_eq!(config.engine.parallelism, 4);
        assert_eq!(config.engine.strategy, SelectionStrategy::MarksOnly);

        let engine = config.engine.to_engine_config();
        assert_eq!(engine.tolerance, 0.30);
        assert_eq!(engine.balance.max_swaps, 50);
        assert_eq!(engine.compensation_pool_limit, 100);
    }

    #[test]
    fn parse_store_config() {
        let toml_str = r#"
[store]
type = "http"
base_url = "https://questions.example.com/v1"
api_key = "sk-test"

[engine]
strategy = "balanced"
max_swaps = 20
"#;
        let config: PaperforgeConfig = toml::from_str(toml_str).unwrap();
        assert!(matches!(
            &config.store,
            StoreConfig::Http { timeout_secs: 30, .. }
        ));
        assert_eq!(config.engine.strategy, SelectionStrategy::Balanced);
        assert_eq!(config.engine.max_swaps, 20);
        assert_eq!(config.engine.tolerance, 0.30);

        let file: PaperforgeConfig = toml::from_str("[store]\ntype = \"file\"\npath = \"bank.json\"\n").unwrap();
        assert!(matches!(file.store, StoreConfig::File { results: None, .. }));
    }

    #[test]
    fn debug_masks_api_key() {
        let config = StoreConfig::Http {
            base_url: "https://questions.example.com".into(),
            api_key: Some("sk-secret".into()),
            timeout_secs: 30,
        };
        let text = format!("{config:?}");
        assert!(!text.contains("sk-secret"));
        assert!(text.contains("***"));
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = load_config_from(Some(Path::new("/nonexistent/paperforge.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn explicit_path_is_loaded_and_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paperforge.toml");
        std::env::set_var("_PAPERFORGE_BANK_DIR", "/srv/banks");
        std::fs::write(
            &path,
            "[store]\ntype = \"file\"\npath = \"${_PAPERFORGE_BANK_DIR}/maths.json\"\n",
        )
        .unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        std::env::remove_var("_PAPERFORGE_BANK_DIR");
        match config.store {
            StoreConfig::File { path, .. } => assert_eq!(path, PathBuf::from("/srv/banks/maths.json")),
            other => panic!("unexpected store {other:?}"),
        }
    }

    #[test]
    fn memory_store_is_created() {
        let store = create_store(&StoreConfig::Memory).unwrap();
        assert_eq!(store.repository.name(), "memory");
    }
}
