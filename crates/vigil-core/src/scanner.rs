//! Project scan orchestration
//!
//! A project scan loads the vulnerability database, checks the dependency
//! manifest against it, then analyzes every source file under the root,
//! sequentially or through [`ParallelScanner`]. Only the database is
//! required; rules and the manifest degrade to "no findings" when they
//! cannot be loaded.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::analyzer::{AnalysisError, FileAnalyzer};
use crate::config::Config;
use crate::database::{DatabaseError, DatabaseLoader, DatabaseSource, VulnerabilityDatabase};
use crate::finding::{ScanFinding, Severity, filter_by_severity};
use crate::manifest::{MANIFEST_FILENAME, ManifestError, PackageManifest};
use crate::parallel::{ParallelScanner, ScanProgress};
use crate::parser::SUPPORTED_EXTENSIONS;
use crate::patterns::PatternSet;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Path does not exist: {0}")]
    MissingPath(PathBuf),
    #[error("Scan worker {worker} crashed: {message}")]
    WorkerCrashed { worker: usize, message: String },
    #[error("Failed to start scan worker {worker}: {source}")]
    WorkerSpawn {
        worker: usize,
        source: std::io::Error,
    },
}

/// A file that could not be analyzed. Recorded, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

impl FileError {
    pub fn new(path: &Path, error: &AnalysisError) -> Self {
        Self {
            path: path.to_path_buf(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub min_severity: Severity,
    pub include_dev_dependencies: bool,
    pub parallel: bool,
    pub workers: usize,
    pub exclude: Vec<String>,
    /// Base rule file; the built-in rules when unset.
    pub rules: Option<PathBuf>,
    pub custom_rules: Option<PathBuf>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            min_severity: Severity::Low,
            include_dev_dependencies: true,
            parallel: true,
            workers: num_cpus::get(),
            exclude: Vec::new(),
            rules: None,
            custom_rules: None,
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            min_severity: config.scan.min_severity(),
            include_dev_dependencies: config.scan.include_dev_dependencies(),
            parallel: config.scan.parallel(),
            workers: config.scan.workers.unwrap_or(defaults.workers),
            exclude: config.exclude.clone(),
            rules: config.rules.path.clone(),
            custom_rules: config.rules.custom.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub findings: Vec<ScanFinding>,
    pub file_errors: Vec<FileError>,
    pub files_scanned: usize,
    pub dependencies_scanned: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Scanner {
    options: ScanOptions,
}

impl Scanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn scan_project<F>(
        &self,
        root: &Path,
        loader: &DatabaseLoader<'_>,
        source: &DatabaseSource,
        on_progress: F,
    ) -> Result<ScanReport, ScanError>
    where
        F: FnMut(&ScanProgress),
    {
        let database = loader.load(source)?;
        let files = self.discover_files(root)?;

        let manifest = self.load_manifest(root);
        let dependencies_scanned = manifest
            .as_ref()
            .map(|m| m.dependencies(self.options.include_dev_dependencies).len())
            .unwrap_or(0);
        let mut findings = manifest
            .map(|m| self.scan_dependencies(&database, &m))
            .unwrap_or_default();

        let patterns = self.load_patterns();
        let (source_findings, file_errors) = if self.options.parallel && files.len() > 1 {
            let mut scanner = ParallelScanner::new(patterns, self.options.workers);
            if let Some(custom) = &self.options.custom_rules {
                scanner = scanner.with_custom_rules(custom.clone());
            }
            let report = scanner.scan(&files, on_progress)?;
            (report.findings, report.file_errors)
        } else {
            let analyzer = FileAnalyzer::new(self.with_custom_rules(patterns));
            self.scan_sources(&analyzer, &files, on_progress)
        };
        findings.extend(source_findings);

        let findings = filter_by_severity(findings, self.options.min_severity);
        info!(
            root = %root.display(),
            files = files.len(),
            dependencies = dependencies_scanned,
            findings = findings.len(),
            file_errors = file_errors.len(),
            "scan complete"
        );

        Ok(ScanReport {
            findings,
            file_errors,
            files_scanned: files.len(),
            dependencies_scanned,
        })
    }

    /// One finding per (dependency, matching record), in manifest order.
    pub fn scan_dependencies(
        &self,
        database: &VulnerabilityDatabase,
        manifest: &PackageManifest,
    ) -> Vec<ScanFinding> {
        manifest
            .dependencies(self.options.include_dev_dependencies)
            .into_iter()
            .flat_map(|dep| {
                database
                    .matching(dep.name, dep.version)
                    .into_iter()
                    .map(move |record| ScanFinding::for_package(dep.name, dep.version, record.clone()))
            })
            .collect()
    }

    /// Analyzes `files` one after another. Failed files are recorded, not fatal.
    pub fn scan_sources<F>(
        &self,
        analyzer: &FileAnalyzer,
        files: &[PathBuf],
        mut on_progress: F,
    ) -> (Vec<ScanFinding>, Vec<FileError>)
    where
        F: FnMut(&ScanProgress),
    {
        let mut findings = Vec::new();
        let mut errors = Vec::new();

        for (index, path) in files.iter().enumerate() {
            match analyzer.analyze_path(path) {
                Ok(file_findings) => findings.extend(file_findings),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to analyze file");
                    errors.push(FileError::new(path, &e));
                }
            }
            on_progress(&ScanProgress {
                completed: index + 1,
                total: files.len(),
                path: path.clone(),
            });
        }

        (findings, errors)
    }

    pub fn discover_files(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root.exists() {
            return Err(ScanError::MissingPath(root.to_path_buf()));
        }

        if root.is_file() {
            return Ok(if is_supported_file(root) {
                vec![root.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let files = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !self.is_skipped(e))
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| is_supported_file(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();

        Ok(files)
    }

    /// The base rule set. An unreadable rule file yields an empty set.
    pub fn load_patterns(&self) -> PatternSet {
        let loaded = match &self.options.rules {
            Some(path) => PatternSet::load(path),
            None => PatternSet::builtin(),
        };
        loaded.unwrap_or_else(|e| {
            warn!(error = %e, "rules unavailable, continuing without pattern findings");
            PatternSet::default()
        })
    }

    fn with_custom_rules(&self, mut patterns: PatternSet) -> PatternSet {
        if let Some(path) = &self.options.custom_rules {
            if let Err(e) = patterns.extend_from_file(path) {
                warn!(error = %e, "custom rules unavailable");
            }
        }
        patterns
    }

    fn load_manifest(&self, root: &Path) -> Option<PackageManifest> {
        if !root.is_dir() {
            return None;
        }
        let path = root.join(MANIFEST_FILENAME);
        match PackageManifest::load(&path) {
            Ok(manifest) => Some(manifest),
            Err(ManifestError::Read { .. }) if !path.exists() => {
                debug!(path = %path.display(), "no dependency manifest");
                None
            }
            Err(e) => {
                warn!(error = %e, "skipping dependency scan");
                None
            }
        }
    }

    fn is_skipped(&self, entry: &walkdir::DirEntry) -> bool {
        if entry.depth() == 0 {
            return false;
        }
        entry
            .file_name()
            .to_str()
            .map(|name| {
                name.starts_with('.')
                    || name == "node_modules"
                    || self.options.exclude.iter().any(|excluded| excluded == name)
            })
            .unwrap_or(false)
    }
}

fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}
