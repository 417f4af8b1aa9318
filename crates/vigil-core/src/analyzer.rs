//! Pattern analysis of a single source file
//!
//! Builds the file's data flow graph, then walks the AST in document order
//! and reports every expression a loaded rule applies to.

use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use swc_common::Spanned;
use swc_ecma_ast::{BindingIdent, Expr, MemberExpr};
use tracing::debug;

use crate::dataflow::{DataFlowGraph, callee_flow_id, flow_id, target_flow_id};
use crate::finding::{DataFlowSummary, FindingLocation, FindingVulnerability, ScanFinding};
use crate::parser::{ParseError, ParsedFile};
use crate::patterns::{CodePattern, NodeKind, PatternSet};
use crate::visitor::{AstVisitor, VisitorContext, walk_ast};

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Failed to read '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Failed to parse '{path}': {error}")]
    Parse { path: String, error: ParseError },
}

#[derive(Debug, Clone, Default)]
pub struct FileAnalyzer {
    patterns: PatternSet,
}

impl FileAnalyzer {
    pub fn new(patterns: PatternSet) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn analyze_path(&self, path: &Path) -> Result<Vec<ScanFinding>, AnalysisError> {
        let source = std::fs::read_to_string(path).map_err(|source| AnalysisError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = ParsedFile::from_source(&path.display().to_string(), &source);
        self.analyze(&parsed)
    }

    /// Findings for `file` in document order. A file with any syntax error is rejected.
    pub fn analyze(&self, file: &ParsedFile) -> Result<Vec<ScanFinding>, AnalysisError> {
        let path = &file.metadata().filename;
        let module = match (file.module(), file.errors().first()) {
            (Some(module), None) => module,
            (_, first_error) => {
                let error = first_error.cloned().unwrap_or_else(|| ParseError {
                    line: 1,
                    column: 1,
                    message: "no module produced".to_string(),
                });
                return Err(AnalysisError::Parse {
                    path: path.clone(),
                    error,
                });
            }
        };

        let ctx = VisitorContext::new(file);
        let graph = DataFlowGraph::build(module, &ctx);

        let mut collector = MatchCollector {
            patterns: &self.patterns,
            graph: &graph,
            file_path: path,
            findings: Vec::new(),
        };
        walk_ast(module, &mut collector, &ctx);

        debug!(
            file = %path,
            flow_nodes = graph.len(),
            findings = collector.findings.len(),
            "analyzed file"
        );
        Ok(collector.findings)
    }
}

struct MatchCollector<'a> {
    patterns: &'a PatternSet,
    graph: &'a DataFlowGraph,
    file_path: &'a str,
    findings: Vec<ScanFinding>,
}

impl MatchCollector<'_> {
    fn finding(&self, expr: &Expr, pattern: &CodePattern, ctx: &VisitorContext) -> ScanFinding {
        let (line, column) = ctx.span_to_location(expr.span());
        let code_snippet = ctx
            .file()
            .get_line(line)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty());

        ScanFinding {
            location: FindingLocation::Source {
                file_path: self.file_path.to_string(),
                line,
                column,
            },
            vulnerability: FindingVulnerability::Pattern {
                severity: pattern.severity,
                summary: pattern.description.clone(),
                cwe: pattern.cwe.clone(),
            },
            matched_pattern_id: Some(pattern.id.clone()),
            code_snippet,
            fix: pattern.fix.clone(),
            data_flow: self.data_flow(expr),
        }
    }

    fn data_flow(&self, expr: &Expr) -> Option<DataFlowSummary> {
        let id = match expr {
            Expr::Call(call) => callee_flow_id(call),
            Expr::Assign(assign) => target_flow_id(&assign.left),
            _ => flow_id(expr),
        }?;

        let summary = DataFlowSummary {
            sources: self.graph.sources(&id),
            sinks: self.graph.sinks(&id),
        };
        (!summary.is_empty()).then_some(summary)
    }
}

impl MatchCollector<'_> {
    fn check(&mut self, node: &Expr, ctx: &VisitorContext) -> ControlFlow<()> {
        for pattern in self.patterns {
            if pattern.applies_to(node) {
                let finding = self.finding(node, pattern, ctx);
                self.findings.push(finding);
            }
        }
        ControlFlow::Continue(())
    }

    fn has_rules_for(&self, kind: NodeKind) -> bool {
        self.patterns.iter().any(|pattern| pattern.node_kind == kind)
    }
}

impl AstVisitor for MatchCollector<'_> {
    fn visit_expr(&mut self, node: &Expr, ctx: &VisitorContext) -> ControlFlow<()> {
        self.check(node, ctx)
    }

    // Written members and bound names are not `Expr` nodes in swc; rules see them as one.
    fn visit_member_target(
        &mut self,
        node: &MemberExpr,
        ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        if !self.has_rules_for(NodeKind::MemberExpression) {
            return ControlFlow::Continue(());
        }
        self.check(&Expr::Member(node.clone()), ctx)
    }

    fn visit_binding_ident(
        &mut self,
        node: &BindingIdent,
        ctx: &VisitorContext,
    ) -> ControlFlow<()> {
        if !self.has_rules_for(NodeKind::Identifier) {
            return ControlFlow::Continue(());
        }
        self.check(&Expr::Ident(node.id.clone()), ctx)
    }
}
