//! JSON output formatter for scan reports

use serde::Serialize;
use vigil_core::finding::ScanFinding;
use vigil_core::{FileError, ScanReport, Severity};

#[derive(Serialize)]
pub struct JsonOutput<'a> {
    pub version: &'static str,
    pub metadata: JsonMetadata,
    pub summary: JsonSummary,
    pub findings: &'a [ScanFinding],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub file_errors: &'a [FileError],
}

#[derive(Serialize)]
pub struct JsonMetadata {
    pub vigil_version: &'static str,
    pub analyzed_path: String,
}

#[derive(Serialize)]
pub struct JsonSummary {
    pub files_scanned: usize,
    pub dependencies_scanned: usize,
    pub total_findings: usize,
    pub by_severity: SeverityCounts,
}

#[derive(Serialize, Default)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn tally(findings: &[ScanFinding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity() {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }
}

#[derive(Default)]
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(&self, report: &ScanReport, analyzed_path: &str) -> String {
        let output = self.build_output(report, analyzed_path);
        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }

    fn build_output<'a>(&self, report: &'a ScanReport, analyzed_path: &str) -> JsonOutput<'a> {
        JsonOutput {
            version: "1.0",
            metadata: JsonMetadata {
                vigil_version: env!("CARGO_PKG_VERSION"),
                analyzed_path: analyzed_path.to_string(),
            },
            summary: JsonSummary {
                files_scanned: report.files_scanned,
                dependencies_scanned: report.dependencies_scanned,
                total_findings: report.findings.len(),
                by_severity: SeverityCounts::tally(&report.findings),
            },
            findings: &report.findings,
            file_errors: &report.file_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vigil_core::finding::{FindingLocation, FindingVulnerability};

    fn source_finding(severity: Severity) -> ScanFinding {
        ScanFinding {
            location: FindingLocation::Source {
                file_path: "src/app.js".to_string(),
                line: 3,
                column: 5,
            },
            vulnerability: FindingVulnerability::Pattern {
                severity,
                summary: "Use of eval".to_string(),
                cwe: vec!["CWE-95".to_string()],
            },
            matched_pattern_id: Some("js-eval".to_string()),
            code_snippet: Some("eval(input);".to_string()),
            fix: None,
            data_flow: None,
        }
    }

    #[test]
    fn json_output_has_summary_and_findings() {
        let report = ScanReport {
            findings: vec![source_finding(Severity::High), source_finding(Severity::Low)],
            file_errors: Vec::new(),
            files_scanned: 4,
            dependencies_scanned: 2,
        };

        let output = JsonFormatter::new().format(&report, "./app");
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["version"], "1.0");
        assert_eq!(value["metadata"]["analyzed_path"], "./app");
        assert_eq!(value["summary"]["files_scanned"], 4);
        assert_eq!(value["summary"]["total_findings"], 2);
        assert_eq!(value["summary"]["by_severity"]["high"], 1);
        assert_eq!(value["summary"]["by_severity"]["low"], 1);
        assert_eq!(value["findings"][0]["matchedPatternId"], "js-eval");
        assert_eq!(value["findings"][0]["location"]["kind"], "source");
        assert!(value.get("file_errors").is_none());
    }

    #[test]
    fn file_errors_are_included_when_present() {
        let report = ScanReport {
            file_errors: vec![FileError {
                path: PathBuf::from("src/broken.js"),
                message: "Parse error".to_string(),
            }],
            ..ScanReport::default()
        };

        let output = JsonFormatter::new().format(&report, ".");
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["file_errors"][0]["path"], "src/broken.js");
        assert_eq!(value["summary"]["total_findings"], 0);
    }
}
