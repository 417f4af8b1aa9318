//! Scan findings and severity filtering
//!
//! Findings are produced by the dependency scan and by file analysis, then
//! pass through [`filter_by_severity`] before reaching a reporter.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::database::VulnerabilityRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn index(&self) -> u8 {
        match self {
            Severity::Low => 0,
            Severity::Medium => 1,
            Severity::High => 2,
            Severity::Critical => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid severity '{0}'. Valid values: low, medium, high, critical")]
pub struct InvalidSeverity(pub String);

impl FromStr for Severity {
    type Err = InvalidSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(InvalidSeverity(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FindingLocation {
    #[serde(rename_all = "camelCase")]
    Source {
        file_path: String,
        line: usize,
        column: usize,
    },
    #[serde(rename_all = "camelCase")]
    Package {
        package_name: String,
        version: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FindingVulnerability {
    Record(VulnerabilityRecord),
    Pattern {
        severity: Severity,
        summary: String,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        cwe: Vec<String>,
    },
}

impl FindingVulnerability {
    pub fn severity(&self) -> Severity {
        match self {
            FindingVulnerability::Record(record) => record.severity,
            FindingVulnerability::Pattern { severity, .. } => *severity,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            FindingVulnerability::Record(record) => &record.summary,
            FindingVulnerability::Pattern { summary, .. } => summary,
        }
    }

    pub fn cwe(&self) -> &[String] {
        match self {
            FindingVulnerability::Record(record) => &record.cwe,
            FindingVulnerability::Pattern { cwe, .. } => cwe,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataFlowSummary {
    pub sources: Vec<String>,
    pub sinks: Vec<String>,
}

impl DataFlowSummary {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.sinks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanFinding {
    pub location: FindingLocation,
    pub vulnerability: FindingVulnerability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_flow: Option<DataFlowSummary>,
}

impl ScanFinding {
    pub fn for_package(
        package_name: impl Into<String>,
        version: impl Into<String>,
        record: VulnerabilityRecord,
    ) -> Self {
        Self {
            location: FindingLocation::Package {
                package_name: package_name.into(),
                version: version.into(),
            },
            vulnerability: FindingVulnerability::Record(record),
            matched_pattern_id: None,
            code_snippet: None,
            fix: None,
            data_flow: None,
        }
    }

    pub fn severity(&self) -> Severity {
        self.vulnerability.severity()
    }

    pub fn file_path(&self) -> Option<&str> {
        match &self.location {
            FindingLocation::Source { file_path, .. } => Some(file_path),
            FindingLocation::Package { .. } => None,
        }
    }

    pub fn package_name(&self) -> Option<&str> {
        match &self.location {
            FindingLocation::Package { package_name, .. } => Some(package_name),
            FindingLocation::Source { .. } => None,
        }
    }

    fn sort_key(&self) -> (u8, &str, usize, usize) {
        match &self.location {
            FindingLocation::Package { package_name, .. } => (0, package_name.as_str(), 0, 0),
            FindingLocation::Source {
                file_path,
                line,
                column,
            } => (1, file_path.as_str(), *line, *column),
        }
    }
}

/// Keeps findings at or above `min`, preserving their relative order.
pub fn filter_by_severity(findings: Vec<ScanFinding>, min: Severity) -> Vec<ScanFinding> {
    findings
        .into_iter()
        .filter(|finding| finding.severity().index() >= min.index())
        .collect()
}

/// Orders package findings first, then source findings by `(file, line, column)`.
///
/// Parallel scans return findings in worker completion order; callers that
/// need reproducible output sort with this.
pub fn sort_findings(findings: &mut [ScanFinding]) {
    findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
