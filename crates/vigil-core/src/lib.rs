//! Vigil core - vulnerability scanning engine for JavaScript/TypeScript projects
//!
//! Detects vulnerable dependencies by version-range lookup and vulnerable code
//! shapes by structural matching over swc ASTs enriched with a per-file data
//! flow graph.

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod database;
pub mod dataflow;
pub mod finding;
pub mod manifest;
pub mod parallel;
pub mod parser;
pub mod patterns;
pub mod scanner;
pub mod version;
pub mod visitor;

pub use analyzer::{AnalysisError, FileAnalyzer};
pub use finding::{ScanFinding, Severity, filter_by_severity, sort_findings};
pub use parallel::{ParallelScanReport, ParallelScanner, ScanProgress};
pub use patterns::{CodePattern, ExpressionPattern, PatternSet};
pub use scanner::{FileError, ScanError, ScanOptions, ScanReport, Scanner};
pub use version::{Version, VersionRange, is_vulnerable};
