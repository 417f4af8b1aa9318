//! Vulnerability database: records, loading, and conditional revalidation
//!
//! The database maps a package name to its known vulnerabilities. It is
//! loaded once per scan from a local file or a remote URL, always through a
//! [`CacheStore`], and then shared read-only.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ETAG, IF_NONE_MATCH};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::finding::Severity;
use crate::version::{Version, VersionRange};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to read vulnerability database '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Invalid vulnerability database '{origin}': {message}")]
    Parse { origin: String, message: String },
    #[error("Failed to fetch vulnerability database '{url}': {source}")]
    Network { url: String, source: reqwest::Error },
    #[error("Vulnerability database request '{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Server answered 304 Not Modified for '{url}' but nothing is cached")]
    NotModifiedWithoutCache { url: String },
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifiers {
    #[serde(rename = "CVE", default, skip_serializing_if = "Vec::is_empty")]
    pub cve: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub severity: Severity,
    pub summary: String,
    #[serde(default)]
    pub ranges: Vec<VersionRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cwe: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifiers: Option<Identifiers>,
}

impl VulnerabilityRecord {
    pub fn affects(&self, version: &Version) -> bool {
        self.ranges.iter().any(|range| range.contains(version))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PackageEntry {
    #[serde(default)]
    vulnerabilities: Vec<VulnerabilityRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VulnerabilityDatabase {
    packages: HashMap<String, Vec<VulnerabilityRecord>>,
}

impl VulnerabilityDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, PackageEntry> = serde_json::from_str(content)?;
        let packages = raw
            .into_iter()
            .map(|(name, entry)| (name, entry.vulnerabilities))
            .collect();
        Ok(Self { packages })
    }

    pub fn get(&self, package: &str) -> &[VulnerabilityRecord] {
        self.packages
            .get(package)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Records of `package` whose ranges contain `version`. Unparseable versions match nothing.
    pub fn matching(&self, package: &str, version: &str) -> Vec<&VulnerabilityRecord> {
        let Some(version) = Version::parse(version) else {
            return Vec::new();
        };

        self.get(package)
            .iter()
            .filter(|record| record.affects(&version))
            .collect()
    }

    /// Replaces the record with the same summary, or appends it.
    pub fn upsert(&mut self, package: &str, record: VulnerabilityRecord) {
        let records = self.packages.entry(package.to_string()).or_default();
        match records.iter_mut().find(|r| r.summary == record.summary) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    pub fn record_count(&self) -> usize {
        self.packages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseSource {
    File(PathBuf),
    Url(String),
}

impl DatabaseSource {
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            DatabaseSource::Url(value.to_string())
        } else {
            DatabaseSource::File(PathBuf::from(value))
        }
    }

    pub fn cache_key(&self) -> String {
        match self {
            DatabaseSource::File(path) => path.display().to_string(),
            DatabaseSource::Url(url) => url.clone(),
        }
    }
}

impl fmt::Display for DatabaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResponse {
    NotModified,
    Fresh { body: String, etag: Option<String> },
}

pub trait HttpFetcher: Send + Sync {
    /// Performs a GET, sending `If-None-Match` when `etag` is present.
    fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchResponse, DatabaseError>;
}

pub struct ReqwestFetcher {
    client: reqwest::blocking::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Result<Self, DatabaseError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DatabaseError::Client)?;
        Ok(Self { client })
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn fetch(&self, url: &str, etag: Option<&str>) -> Result<FetchResponse, DatabaseError> {
        let mut request = self.client.get(url);
        if let Some(etag) = etag {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().map_err(|source| DatabaseError::Network {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchResponse::NotModified);
        }
        if !status.is_success() {
            return Err(DatabaseError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().map_err(|source| DatabaseError::Network {
            url: url.to_string(),
            source,
        })?;

        Ok(FetchResponse::Fresh { body, etag })
    }
}

pub struct DatabaseLoader<'a> {
    cache: &'a dyn CacheStore,
    fetcher: &'a dyn HttpFetcher,
}

impl<'a> DatabaseLoader<'a> {
    pub fn new(cache: &'a dyn CacheStore, fetcher: &'a dyn HttpFetcher) -> Self {
        Self { cache, fetcher }
    }

    pub fn load(&self, source: &DatabaseSource) -> Result<VulnerabilityDatabase, DatabaseError> {
        let database = match source {
            DatabaseSource::File(path) => self.load_file(path, &source.cache_key())?,
            DatabaseSource::Url(url) => self.load_url(url)?,
        };

        info!(
            source = %source,
            packages = database.package_count(),
            records = database.record_count(),
            "vulnerability database loaded"
        );
        Ok(database)
    }

    fn load_file(&self, path: &Path, key: &str) -> Result<VulnerabilityDatabase, DatabaseError> {
        if let Some(entry) = self.cache.get(key) {
            match VulnerabilityDatabase::from_json(&entry.data) {
                Ok(database) => {
                    debug!(path = %path.display(), "using cached vulnerability database");
                    return Ok(database);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "cached database unreadable"),
            }
        }

        let content = std::fs::read_to_string(path).map_err(|source| DatabaseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let database = parse_database(&content, key)?;
        self.store(key, &content, None);
        Ok(database)
    }

    fn load_url(&self, url: &str) -> Result<VulnerabilityDatabase, DatabaseError> {
        let cached = self.cache.get(url);
        let etag = cached.as_ref().and_then(|entry| entry.etag.as_deref());

        match self.fetcher.fetch(url, etag)? {
            FetchResponse::NotModified => {
                let entry = cached.ok_or_else(|| DatabaseError::NotModifiedWithoutCache {
                    url: url.to_string(),
                })?;
                debug!(url, "vulnerability database not modified, reusing cache");
                parse_database(&entry.data, url)
            }
            FetchResponse::Fresh { body, etag } => {
                let database = parse_database(&body, url)?;
                self.store(url, &body, etag.as_deref());
                Ok(database)
            }
        }
    }

    fn store(&self, key: &str, data: &str, etag: Option<&str>) {
        if let Err(e) = self.cache.set(key, data, etag) {
            warn!(key, error = %e, "failed to cache vulnerability database");
        }
    }
}

fn parse_database(content: &str, origin: &str) -> Result<VulnerabilityDatabase, DatabaseError> {
    VulnerabilityDatabase::from_json(content).map_err(|e| DatabaseError::Parse {
        origin: origin.to_string(),
        message: e.to_string(),
    })
}
