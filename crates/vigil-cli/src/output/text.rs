//! Human-readable output for scan reports

use colored::{ColoredString, Colorize};
use std::io::{self, Write};
use vigil_core::finding::{DataFlowSummary, FindingLocation, FindingVulnerability, ScanFinding};
use vigil_core::{ScanReport, Severity};

use super::json::SeverityCounts;

#[derive(Default)]
pub struct TextFormatter;

impl TextFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn write<W: Write>(&self, report: &ScanReport, writer: &mut W) -> io::Result<()> {
        for finding in &report.findings {
            self.write_finding(finding, writer)?;
        }

        for file_error in &report.file_errors {
            writeln!(
                writer,
                "{} {}: {}",
                "skipped:".yellow().bold(),
                file_error.path.display(),
                file_error.message
            )?;
        }

        if !report.findings.is_empty() || !report.file_errors.is_empty() {
            writeln!(writer)?;
        }
        self.write_summary(report, writer)
    }

    fn write_finding<W: Write>(&self, finding: &ScanFinding, writer: &mut W) -> io::Result<()> {
        let severity = severity_label(finding.severity());
        let summary = finding.vulnerability.summary();

        match &finding.location {
            FindingLocation::Package {
                package_name,
                version,
            } => {
                writeln!(
                    writer,
                    "{}: {} [{}]: {}",
                    "package.json".bold(),
                    severity,
                    format!("{package_name}@{version}").dimmed(),
                    summary
                )?;
            }
            FindingLocation::Source {
                file_path,
                line,
                column,
            } => {
                let rule = finding.matched_pattern_id.as_deref().unwrap_or("pattern");
                writeln!(
                    writer,
                    "{}:{}:{}: {} [{}]: {}",
                    file_path,
                    line,
                    column,
                    severity,
                    rule.dimmed(),
                    summary
                )?;
            }
        }

        if let Some(references) = references(&finding.vulnerability) {
            writeln!(writer, "  {} {}", "refs:".blue(), references)?;
        }
        if let Some(snippet) = &finding.code_snippet {
            writeln!(writer, "  {} {}", "code:".dimmed(), snippet)?;
        }
        if let Some(fix) = &finding.fix {
            writeln!(writer, "  {} {}", "fix:".green(), fix)?;
        }
        if let Some(flow) = &finding.data_flow {
            writeln!(writer, "  {} {}", "flow:".cyan(), describe_flow(flow))?;
        }
        Ok(())
    }

    fn write_summary<W: Write>(&self, report: &ScanReport, writer: &mut W) -> io::Result<()> {
        let scanned = format!(
            "Scanned {} file(s) and {} dependenc{}",
            report.files_scanned,
            report.dependencies_scanned,
            if report.dependencies_scanned == 1 { "y" } else { "ies" }
        );

        if report.findings.is_empty() {
            return writeln!(writer, "{}: {}", scanned, "no vulnerabilities found".green());
        }

        let counts = SeverityCounts::tally(&report.findings);
        writeln!(
            writer,
            "{}: {} finding(s) ({} critical, {} high, {} medium, {} low)",
            scanned,
            report.findings.len().to_string().bold(),
            counts.critical,
            counts.high,
            counts.medium,
            counts.low
        )
    }
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => "critical".magenta().bold(),
        Severity::High => "high".red().bold(),
        Severity::Medium => "medium".yellow().bold(),
        Severity::Low => "low".cyan().bold(),
    }
}

fn references(vulnerability: &FindingVulnerability) -> Option<String> {
    let mut refs: Vec<&str> = vulnerability.cwe().iter().map(String::as_str).collect();
    if let FindingVulnerability::Record(record) = vulnerability {
        if let Some(identifiers) = &record.identifiers {
            refs.extend(identifiers.cve.iter().map(String::as_str));
        }
    }
    (!refs.is_empty()).then(|| refs.join(", "))
}

fn describe_flow(flow: &DataFlowSummary) -> String {
    let mut parts = Vec::new();
    if !flow.sources.is_empty() {
        parts.push(format!("from {}", flow.sources.join(", ")));
    }
    if !flow.sinks.is_empty() {
        parts.push(format!("into {}", flow.sinks.join(", ")));
    }
    parts.join("; ")
}
