//! `package.json` dependency manifest

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const MANIFEST_FILENAME: &str = "package.json";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid manifest '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Runtime,
    Development,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
}

impl PackageManifest {
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Runtime dependencies, followed by dev dependencies when `include_dev` is set.
    pub fn dependencies(&self, include_dev: bool) -> Vec<Dependency<'_>> {
        let runtime = self.dependencies.iter().map(|(name, version)| Dependency {
            name,
            version,
            kind: DependencyKind::Runtime,
        });
        let dev = self
            .dev_dependencies
            .iter()
            .filter(|_| include_dev)
            .map(|(name, version)| Dependency {
                name,
                version,
                kind: DependencyKind::Development,
            });

        runtime.chain(dev).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "name": "demo",
        "version": "1.0.0",
        "dependencies": { "jquery": "1.7.1", "express": "^4.18.2" },
        "devDependencies": { "mocha": "~10.0.0" },
        "scripts": { "test": "mocha" }
    }"#;

    #[test]
    fn parses_dependencies_and_ignores_other_fields() {
        let manifest = PackageManifest::from_json(MANIFEST).unwrap();

        assert_eq!(manifest.name.as_deref(), Some("demo"));
        assert_eq!(manifest.dependencies.len(), 2);
        assert_eq!(manifest.dev_dependencies["mocha"], "~10.0.0");
    }

    #[test]
    fn dev_dependencies_are_optional() {
        let manifest = PackageManifest::from_json(r#"{"dependencies":{"a":"1.0.0"}}"#).unwrap();

        assert!(manifest.dev_dependencies.is_empty());
        assert_eq!(manifest.dependencies(true).len(), 1);
    }

    #[test]
    fn dependencies_include_dev_on_request() {
        let manifest = PackageManifest::from_json(MANIFEST).unwrap();

        let names: Vec<_> = manifest.dependencies(true).iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["express", "jquery", "mocha"]);

        let runtime: Vec<_> = manifest.dependencies(false).iter().map(|d| d.name).collect();
        assert_eq!(runtime, vec!["express", "jquery"]);
    }

    #[test]
    fn load_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILENAME);
        std::fs::write(&path, "{ nope").unwrap();

        let err = PackageManifest::load(&path).unwrap_err();

        assert!(matches!(err, ManifestError::Parse { .. }));
        assert!(err.to_string().contains("package.json"));
    }
}
