//! Configuration loading and parsing for Vigil
//!
//! Provides functionality to load and parse `vigil.toml` configuration files.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_TTL;
use crate::database::{DEFAULT_FETCH_TIMEOUT, DatabaseSource};
use crate::finding::Severity;

pub const CONFIG_FILENAME: &str = "vigil.toml";

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["include", "exclude", "scan", "database", "cache", "rules"];
const KNOWN_SCAN_KEYS: &[&str] = &[
    "min_severity",
    "workers",
    "parallel",
    "include_dev_dependencies",
];
const KNOWN_DATABASE_KEYS: &[&str] = &["path", "url", "timeout_secs"];
const KNOWN_CACHE_KEYS: &[&str] = &["dir", "ttl_secs"];
const KNOWN_RULES_KEYS: &[&str] = &["path", "custom"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML in '{path}': {message}")]
    ParseError { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigResult {
    pub config: Config,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Reserved; not used for filtering yet.
    pub include: Vec<String>,
    /// Directory or file names skipped while walking the project.
    pub exclude: Vec<String>,
    pub scan: ScanConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScanConfig {
    pub min_severity: Option<Severity>,
    pub workers: Option<usize>,
    pub parallel: Option<bool>,
    pub include_dev_dependencies: Option<bool>,
}

impl ScanConfig {
    pub fn min_severity(&self) -> Severity {
        self.min_severity.unwrap_or(Severity::Low)
    }

    pub fn parallel(&self) -> bool {
        self.parallel.unwrap_or(true)
    }

    pub fn include_dev_dependencies(&self) -> bool {
        self.include_dev_dependencies.unwrap_or(true)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl DatabaseConfig {
    /// `url` takes precedence over `path`.
    pub fn source(&self) -> Option<DatabaseSource> {
        match (&self.url, &self.path) {
            (Some(url), _) => Some(DatabaseSource::Url(url.clone())),
            (None, Some(path)) => Some(DatabaseSource::File(path.clone())),
            (None, None) => None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_FETCH_TIMEOUT)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: Option<PathBuf>,
    pub ttl_secs: Option<u64>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        self.ttl_secs.map(Duration::from_secs).unwrap_or(DEFAULT_TTL)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct RulesConfig {
    pub path: Option<PathBuf>,
    pub custom: Option<PathBuf>,
}

impl Config {
    /// Makes relative paths relative to `base`, the directory holding the config file.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |path: &mut Option<PathBuf>| {
            if let Some(p) = path.as_mut().filter(|p| p.is_relative()) {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.database.path);
        resolve(&mut self.cache.dir);
        resolve(&mut self.rules.path);
        resolve(&mut self.rules.custom);
    }
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    Ok(load_config_with_warnings(path)?.config)
}

pub fn load_config_with_warnings(path: &Path) -> Result<ConfigResult, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;

    if let Some(base) = path.parent() {
        config.resolve_paths(base);
    }

    let warnings = detect_unknown_keys(&content);

    Ok(ConfigResult { config, warnings })
}

fn detect_unknown_keys(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(_) => return warnings,
    };

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL_KEYS.iter().copied().collect();
    for key in table.keys() {
        if !known_top.contains(key.as_str()) {
            warnings.push(format!("Unknown config option: '{}'", key));
        }
    }

    let sections = [
        ("scan", KNOWN_SCAN_KEYS),
        ("database", KNOWN_DATABASE_KEYS),
        ("cache", KNOWN_CACHE_KEYS),
        ("rules", KNOWN_RULES_KEYS),
    ];
    for (section, known) in sections {
        if let Some(toml::Value::Table(entries)) = table.get(section) {
            for key in entries.keys() {
                if !known.contains(&key.as_str()) {
                    warnings.push(format!("Unknown config option in [{}]: '{}'", section, key));
                }
            }
        }
    }

    warnings
}

pub fn load_config_or_default_with_warnings(start_dir: &Path) -> Result<ConfigResult, ConfigError> {
    match find_config_file(start_dir) {
        Some(path) => load_config_with_warnings(&path),
        None => Ok(ConfigResult::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn create_temp_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("Failed to create temp dir")
    }

    #[test]
    fn load_config_from_file() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &config_path,
            r#"
exclude = ["dist", "coverage"]

[scan]
min_severity = "high"
workers = 4
parallel = false
include_dev_dependencies = false

[database]
url = "https://example.com/db.json"
timeout_secs = 5

[cache]
ttl_secs = 60

[rules]
custom = "/abs/custom.json"
"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();

        assert_eq!(config.exclude, vec!["dist", "coverage"]);
        assert_eq!(config.scan.min_severity(), Severity::High);
        assert_eq!(config.scan.workers, Some(4));
        assert!(!config.scan.parallel());
        assert!(!config.scan.include_dev_dependencies());
        assert_eq!(
            config.database.source(),
            Some(DatabaseSource::Url("https://example.com/db.json".to_string()))
        );
        assert_eq!(config.database.timeout(), Duration::from_secs(5));
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert_eq!(config.rules.custom, Some(PathBuf::from("/abs/custom.json")));
    }

    #[test]
    fn defaults_when_sections_missing() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.scan.min_severity(), Severity::Low);
        assert!(config.scan.parallel());
        assert!(config.scan.include_dev_dependencies());
        assert_eq!(config.database.source(), None);
        assert_eq!(config.database.timeout(), DEFAULT_FETCH_TIMEOUT);
        assert_eq!(config.cache.ttl(), DEFAULT_TTL);
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &config_path,
            "[database]\npath = \"db/vulns.json\"\n[rules]\npath = \"rules.json\"\n",
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();

        assert_eq!(
            config.database.source(),
            Some(DatabaseSource::File(dir.path().join("db/vulns.json")))
        );
        assert_eq!(config.rules.path, Some(dir.path().join("rules.json")));
    }

    #[test]
    fn invalid_severity_is_a_parse_error() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "[scan]\nmin_severity = \"severe\"\n").unwrap();

        let result = load_config(&config_path);

        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn error_on_invalid_toml() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "this is not valid { toml }").unwrap();

        let result = load_config(&config_path);

        match result {
            Err(ConfigError::ParseError { path, message }) => {
                assert_eq!(path, config_path);
                assert!(!message.is_empty());
            }
            other => panic!("Expected ParseError, got {:?}", other),
        }
    }

    #[test]
    fn find_config_walks_up_directories() {
        let dir = create_temp_dir();
        let nested = dir.path().join("packages").join("web");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "").unwrap();

        let found = find_config_file(&nested);

        assert_eq!(found, Some(dir.path().join(CONFIG_FILENAME)));
    }

    #[test]
    fn missing_config_yields_defaults() {
        let dir = create_temp_dir();

        let result = load_config_or_default_with_warnings(dir.path()).unwrap();

        assert_eq!(result.config, Config::default());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn unknown_keys_produce_warnings() {
        let dir = create_temp_dir();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &config_path,
            r#"
verbose = true

[scan]
threads = 2

[cache]
dir = "cache"
"#,
        )
        .unwrap();

        let result = load_config_with_warnings(&config_path).unwrap();

        assert_eq!(
            result.warnings,
            vec![
                "Unknown config option: 'verbose'".to_string(),
                "Unknown config option in [scan]: 'threads'".to_string(),
            ]
        );
        assert_eq!(result.config.cache.dir, Some(dir.path().join("cache")));
    }
}
