//! End-to-end project scans over fixture trees on disk.

use std::fs;
use std::path::Path;

use insta::assert_json_snapshot;
use tempfile::TempDir;

use vigil_core::cache::{FileCache, MemoryCache};
use vigil_core::database::{
    DatabaseError, DatabaseLoader, DatabaseSource, FetchResponse, HttpFetcher,
};
use vigil_core::finding::FindingLocation;
use vigil_core::{ScanOptions, Scanner, Severity, sort_findings};

const DATABASE: &str = r#"{
    "jquery": {
        "vulnerabilities": [
            {
                "severity": "medium",
                "summary": "Selector XSS",
                "ranges": [{ "atOrAbove": "1.5.0", "below": "1.8.0" }],
                "cwe": ["CWE-79"],
                "identifiers": { "CVE": ["CVE-2012-6708"] }
            },
            {
                "severity": "high",
                "summary": "Prototype pollution in extend",
                "ranges": [{ "below": "1.5.0" }, { "atOrAbove": "3.0.0", "below": "3.4.0" }]
            }
        ]
    }
}"#;

struct NoNetwork;

impl HttpFetcher for NoNetwork {
    fn fetch(&self, url: &str, _etag: Option<&str>) -> Result<FetchResponse, DatabaseError> {
        panic!("unexpected network request to {url}");
    }
}

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    for (name, content) in files {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
    dir
}

fn database_in(dir: &Path) -> DatabaseSource {
    let path = dir.join("vulnerabilities.json");
    fs::write(&path, DATABASE).unwrap();
    DatabaseSource::File(path)
}

#[test]
fn vulnerable_jquery_dependency_is_reported_once() {
    let dir = project(&[("package.json", r#"{"dependencies":{"jquery":"1.7.1"}}"#)]);
    let source = database_in(dir.path());
    let cache = MemoryCache::default();
    let loader = DatabaseLoader::new(&cache, &NoNetwork);

    let report = Scanner::default()
        .scan_project(dir.path(), &loader, &source, |_| {})
        .unwrap();

    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(
        finding.location,
        FindingLocation::Package {
            package_name: "jquery".to_string(),
            version: "1.7.1".to_string(),
        }
    );
    assert_eq!(finding.severity(), Severity::Medium);

    assert_json_snapshot!(report.findings, @r#"
    [
      {
        "location": {
          "kind": "package",
          "packageName": "jquery",
          "version": "1.7.1"
        },
        "vulnerability": {
          "kind": "record",
          "severity": "medium",
          "summary": "Selector XSS",
          "ranges": [
            {
              "atOrAbove": "1.5.0",
              "below": "1.8.0"
            }
          ],
          "cwe": [
            "CWE-79"
          ],
          "identifiers": {
            "CVE": [
              "CVE-2012-6708"
            ]
          }
        }
      }
    ]
    "#);
}

#[test]
fn patched_jquery_is_clean() {
    let dir = project(&[("package.json", r#"{"dependencies":{"jquery":"^1.8.0"}}"#)]);
    let source = database_in(dir.path());
    let cache = MemoryCache::default();
    let loader = DatabaseLoader::new(&cache, &NoNetwork);

    let report = Scanner::default()
        .scan_project(dir.path(), &loader, &source, |_| {})
        .unwrap();

    assert!(report.findings.is_empty());
    assert_eq!(report.dependencies_scanned, 1);
}

#[test]
fn parallel_project_scan_isolates_broken_files() {
    let dir = project(&[
        ("package.json", r#"{"devDependencies":{"jquery":"3.3.1"}}"#),
        ("src/render.js", "const html = location.hash;\nel.innerHTML = html;\n"),
        ("src/broken.js", "function ( {"),
        ("src/exec.js", "exec(`ls ${dir}`);\n"),
        ("src/util.ts", "export const add = (a: number, b: number) => a + b;\n"),
        ("node_modules/lib/index.js", "eval(x);"),
    ]);
    let source = database_in(dir.path());
    let cache = MemoryCache::default();
    let loader = DatabaseLoader::new(&cache, &NoNetwork);
    let scanner = Scanner::new(ScanOptions {
        workers: 2,
        ..ScanOptions::default()
    });
    let mut last_progress = None;

    let mut report = scanner
        .scan_project(dir.path(), &loader, &source, |p| {
            last_progress = Some((p.completed, p.total))
        })
        .unwrap();
    sort_findings(&mut report.findings);

    let summary: Vec<_> = report
        .findings
        .iter()
        .map(|f| match &f.location {
            FindingLocation::Package { package_name, .. } => package_name.clone(),
            FindingLocation::Source {
                file_path, line, ..
            } => format!(
                "{}:{}:{}",
                Path::new(file_path).file_name().unwrap().to_string_lossy(),
                line,
                f.matched_pattern_id.as_deref().unwrap_or_default()
            ),
        })
        .collect();

    assert_eq!(
        summary,
        vec![
            "jquery",
            "exec.js:1:node-child-process-exec",
            "render.js:2:dom-inner-html",
        ]
    );
    assert_eq!(report.files_scanned, 4);
    assert_eq!(report.file_errors.len(), 1);
    assert!(report.file_errors[0].path.ends_with("broken.js"));
    assert_eq!(last_progress, Some((4, 4)));
}

#[test]
fn file_cache_serves_database_after_source_is_removed() {
    let dir = project(&[("package.json", r#"{"dependencies":{"jquery":"1.6.0"}}"#)]);
    let source = database_in(dir.path());
    let cache = FileCache::new(dir.path().join(".cache"), vigil_core::cache::DEFAULT_TTL);
    let loader = DatabaseLoader::new(&cache, &NoNetwork);
    let scanner = Scanner::default();

    let first = scanner
        .scan_project(dir.path(), &loader, &source, |_| {})
        .unwrap();
    fs::remove_file(dir.path().join("vulnerabilities.json")).unwrap();
    let second = scanner
        .scan_project(dir.path(), &loader, &source, |_| {})
        .unwrap();

    assert_eq!(first.findings, second.findings);
    assert_eq!(second.findings.len(), 1);
}

#[test]
fn min_severity_applies_to_dependency_and_source_findings() {
    let dir = project(&[
        ("package.json", r#"{"dependencies":{"jquery":"1.4.2"}}"#),
        ("app.js", "document.write(msg);\nconst id = Math.random();\n"),
    ]);
    let source = database_in(dir.path());
    let cache = MemoryCache::default();
    let loader = DatabaseLoader::new(&cache, &NoNetwork);
    let scanner = Scanner::new(ScanOptions {
        min_severity: Severity::High,
        parallel: false,
        ..ScanOptions::default()
    });

    let report = scanner
        .scan_project(dir.path(), &loader, &source, |_| {})
        .unwrap();

    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].package_name(), Some("jquery"));
    assert_eq!(report.findings[0].severity(), Severity::High);
}
