//! Configuration for skywatch.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SKYWATCH_HOME, SKYWATCH_BIND_ADDR, secrets, ...)
//! 2. Config file (.skywatch/config.yaml)
//! 3. Defaults (~/.skywatch, built-in source list)
//!
//! Config file discovery:
//! - Searches current directory and parents for .skywatch/config.yaml
//! - `paths.home` in the config file is relative to the .skywatch/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::generation::{GeneratorConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::core::event_store::DEFAULT_STORE_CAPACITY;
use crate::core::registry::DEFAULT_REGISTRY_CAPACITY;
use crate::ingest::source::{default_sources, SourceDescriptor, DEFAULT_MAX_ITEMS, DEFAULT_SUMMARY_CHARS};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Scheduled watch interval for `serve` (15 minutes)
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 900;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub limits: LimitsSection,
    /// Replaces the built-in source list when present
    #[serde(default)]
    pub sources: Option<Vec<SourceDescriptor>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .skywatch/)
    pub home: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerSection {
    pub bind_addr: Option<String>,
    pub production: Option<bool>,
    pub watch_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitsSection {
    pub store_capacity: Option<usize>,
    pub registry_capacity: Option<usize>,
    pub items_per_feed: Option<usize>,
    pub summary_chars: Option<usize>,
}

/// Effective bounds on the pipeline's collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub store_capacity: usize,
    pub registry_capacity: usize,
    pub items_per_feed: usize,
    pub summary_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            store_capacity: DEFAULT_STORE_CAPACITY,
            registry_capacity: DEFAULT_REGISTRY_CAPACITY,
            items_per_feed: DEFAULT_MAX_ITEMS,
            summary_chars: DEFAULT_SUMMARY_CHARS,
        }
    }
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to skywatch home (file store)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub bind_addr: String,
    /// Production mode disables unauthenticated manual watch triggers
    pub production: bool,
    /// Zero disables the scheduled watch
    pub watch_interval: Duration,
    pub generation: GeneratorConfig,
    pub ops_secret: Option<String>,
    pub cron_secret: Option<String>,
    pub limits: Limits,
    pub sources: Vec<SourceDescriptor>,
}

impl ResolvedConfig {
    /// Snapshot file used by the CLI
    pub fn events_path(&self) -> PathBuf {
        self.home.join("events.json")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".skywatch").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let config_file = find_config_file();
    let file = match config_file {
        Some(ref path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(file, config_file, |key| std::env::var(key).ok())
}

/// Merge a parsed file with environment lookups
fn resolve<F>(file: ConfigFile, config_file: Option<PathBuf>, env: F) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let home = if let Some(env_home) = lookup("SKYWATCH_HOME") {
        PathBuf::from(env_home)
    } else if let (Some(home_path), Some(config_path)) = (&file.paths.home, &config_file) {
        let skywatch_dir = config_path.parent().unwrap_or(Path::new("."));
        resolve_path(skywatch_dir, home_path)
    } else {
        dirs::home_dir()
            .context("Failed to determine home directory")?
            .join(".skywatch")
    };

    let bind_addr = lookup("SKYWATCH_BIND_ADDR")
        .or(file.server.bind_addr)
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

    let production = match lookup("SKYWATCH_ENV") {
        Some(mode) => mode.eq_ignore_ascii_case("production"),
        None => file.server.production.unwrap_or(false),
    };

    let watch_interval_seconds = match lookup("SKYWATCH_WATCH_INTERVAL_SECS") {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("Invalid SKYWATCH_WATCH_INTERVAL_SECS: {}", raw))?,
        None => file
            .server
            .watch_interval_seconds
            .unwrap_or(DEFAULT_WATCH_INTERVAL_SECS),
    };

    let generation = GeneratorConfig {
        api_key: lookup("SKYWATCH_LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY")),
        base_url: lookup("SKYWATCH_LLM_BASE_URL")
            .or(file.generation.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        model: lookup("SKYWATCH_LLM_MODEL")
            .or(file.generation.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        timeout: file
            .generation
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(GeneratorConfig::default().timeout),
    };

    let defaults = Limits::default();
    let limits = Limits {
        store_capacity: file.limits.store_capacity.unwrap_or(defaults.store_capacity),
        registry_capacity: file
            .limits
            .registry_capacity
            .unwrap_or(defaults.registry_capacity),
        items_per_feed: file.limits.items_per_feed.unwrap_or(defaults.items_per_feed),
        summary_chars: file.limits.summary_chars.unwrap_or(defaults.summary_chars),
    };

    Ok(ResolvedConfig {
        home,
        config_file,
        bind_addr,
        production,
        watch_interval: Duration::from_secs(watch_interval_seconds),
        generation,
        ops_secret: lookup("SKYWATCH_OPS_SECRET"),
        cron_secret: lookup("SKYWATCH_CRON_SECRET"),
        limits,
        sources: file.sources.unwrap_or_else(default_sources),
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::source::SourceKind;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(ConfigFile::default(), None, env_from(&[])).unwrap();

        assert_eq!(config.home, dirs::home_dir().unwrap().join(".skywatch"));
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert!(!config.production);
        assert!(config.ops_secret.is_none());
        assert!(config.generation.api_key.is_none());
        assert_eq!(config.generation.model, "gpt-4o-mini");
        assert_eq!(config.limits, Limits::default());
        assert_eq!(config.sources, default_sources());
    }

    #[test]
    fn test_env_overrides() {
        let env = env_from(&[
            ("SKYWATCH_HOME", "/srv/skywatch"),
            ("SKYWATCH_ENV", "Production"),
            ("OPENAI_API_KEY", "sk-fallback"),
            ("SKYWATCH_OPS_SECRET", "  ops  "),
            ("SKYWATCH_CRON_SECRET", ""),
            ("SKYWATCH_WATCH_INTERVAL_SECS", "0"),
        ]);
        let config = resolve(ConfigFile::default(), None, env).unwrap();

        assert_eq!(config.home, PathBuf::from("/srv/skywatch"));
        assert_eq!(config.events_path(), PathBuf::from("/srv/skywatch/events.json"));
        assert!(config.production);
        assert_eq!(config.generation.api_key.as_deref(), Some("sk-fallback"));
        assert_eq!(config.ops_secret.as_deref(), Some("ops"));
        assert!(config.cron_secret.is_none());
        assert!(config.watch_interval.is_zero());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let skywatch_dir = temp.path().join(".skywatch");
        std::fs::create_dir_all(&skywatch_dir).unwrap();

        let config_path = skywatch_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
paths:
  home: ./state
server:
  bind_addr: 127.0.0.1:9000
limits:
  store_capacity: 50
  items_per_feed: 5
sources:
  - id: esa
    name: ESA News
    url: https://www.esa.int/rssfeed/Our_Activities/Space_News
    kind: rss
    category: official
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        let config = resolve(parsed, Some(config_path), env_from(&[])).unwrap();

        assert_eq!(config.home, skywatch_dir.join("state"));
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.limits.store_capacity, 50);
        assert_eq!(config.limits.items_per_feed, 5);
        assert_eq!(config.limits.registry_capacity, DEFAULT_REGISTRY_CAPACITY);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].kind, SourceKind::Rss);
    }

    #[test]
    fn test_bad_interval_is_an_error() {
        let env = env_from(&[("SKYWATCH_WATCH_INTERVAL_SECS", "soon")]);
        assert!(resolve(ConfigFile::default(), None, env).is_err());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/subdir")
        );
    }
}
