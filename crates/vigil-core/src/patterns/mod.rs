//! Code patterns: structural rules over one AST node kind
//!
//! Rules are loaded from JSON, either the built-in set shipped with the crate
//! or a rule file, optionally extended by a custom rules file whose invalid
//! records are dropped.

pub mod matcher;

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use swc_ecma_ast::Expr;
use tracing::{debug, warn};

use crate::finding::Severity;

pub use matcher::matches;

const BUILTIN_RULES: &str = include_str!("../../rules/patterns.json");

#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Failed to read rule file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid rule file '{origin}': {source}")]
    Parse {
        origin: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Identifier,
    Literal,
    TemplateLiteral,
    ObjectExpression,
    ArrayExpression,
    MemberExpression,
    AssignmentExpression,
    CallExpression,
}

impl NodeKind {
    /// Kind of an expression node, `None` for kinds no pattern can describe.
    pub fn of(expr: &Expr) -> Option<NodeKind> {
        match expr {
            Expr::Ident(_) => Some(NodeKind::Identifier),
            Expr::Lit(_) => Some(NodeKind::Literal),
            Expr::Tpl(_) => Some(NodeKind::TemplateLiteral),
            Expr::Object(_) => Some(NodeKind::ObjectExpression),
            Expr::Array(_) => Some(NodeKind::ArrayExpression),
            Expr::Member(_) => Some(NodeKind::MemberExpression),
            Expr::Assign(_) => Some(NodeKind::AssignmentExpression),
            Expr::Call(_) => Some(NodeKind::CallExpression),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Identifier => "Identifier",
            NodeKind::Literal => "Literal",
            NodeKind::TemplateLiteral => "TemplateLiteral",
            NodeKind::ObjectExpression => "ObjectExpression",
            NodeKind::ArrayExpression => "ArrayExpression",
            NodeKind::MemberExpression => "MemberExpression",
            NodeKind::AssignmentExpression => "AssignmentExpression",
            NodeKind::CallExpression => "CallExpression",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A regex compiled when its rule is deserialized.
#[derive(Debug, Clone)]
pub struct PatternRegex(Regex);

impl PatternRegex {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(PatternRegex)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for PatternRegex {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl<'de> Deserialize<'de> for PatternRegex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        PatternRegex::new(&source).map_err(serde::de::Error::custom)
    }
}

impl Serialize for PatternRegex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyPattern {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ExpressionPattern>,
}

/// Callee of a call pattern: a bare function name, or a nested pattern
/// (typically a `MemberExpression`) for method calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalleePattern {
    Name(String),
    Pattern(Box<ExpressionPattern>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExpressionPattern {
    Identifier {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        regex: Option<PatternRegex>,
    },
    Literal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        regex: Option<PatternRegex>,
    },
    TemplateLiteral {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        regex: Option<PatternRegex>,
    },
    /// Matches when any listed property is present. An empty `properties` list
    /// matches every object, the same as leaving it out.
    ObjectExpression {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<Vec<PropertyPattern>>,
    },
    ArrayExpression {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        elements: Option<Vec<ExpressionPattern>>,
    },
    MemberExpression {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        property: Option<String>,
    },
    AssignmentExpression {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        operator: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        left: Option<Box<ExpressionPattern>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        right: Option<Box<ExpressionPattern>>,
    },
    CallExpression {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        callee: Option<CalleePattern>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        arguments: Option<Vec<ExpressionPattern>>,
    },
}

impl ExpressionPattern {
    pub fn kind(&self) -> NodeKind {
        match self {
            ExpressionPattern::Identifier { .. } => NodeKind::Identifier,
            ExpressionPattern::Literal { .. } => NodeKind::Literal,
            ExpressionPattern::TemplateLiteral { .. } => NodeKind::TemplateLiteral,
            ExpressionPattern::ObjectExpression { .. } => NodeKind::ObjectExpression,
            ExpressionPattern::ArrayExpression { .. } => NodeKind::ArrayExpression,
            ExpressionPattern::MemberExpression { .. } => NodeKind::MemberExpression,
            ExpressionPattern::AssignmentExpression { .. } => NodeKind::AssignmentExpression,
            ExpressionPattern::CallExpression { .. } => NodeKind::CallExpression,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodePattern {
    pub id: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cwe: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix: Option<String>,
    pub node_kind: NodeKind,
    pub pattern: ExpressionPattern,
}

impl CodePattern {
    /// Whether this rule fires on `expr`.
    pub fn applies_to(&self, expr: &Expr) -> bool {
        NodeKind::of(expr) == Some(self.node_kind) && matches(expr, &self.pattern)
    }
}

/// The active rule set of a scan. Duplicate ids are kept and fire independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternSet {
    patterns: Vec<CodePattern>,
}

impl PatternSet {
    pub fn new(patterns: Vec<CodePattern>) -> Self {
        Self { patterns }
    }

    /// The rule set embedded in the crate.
    pub fn builtin() -> Result<Self, PatternError> {
        Self::from_json(BUILTIN_RULES, "<builtin>")
    }

    pub fn from_json(content: &str, origin: &str) -> Result<Self, PatternError> {
        let patterns: Vec<CodePattern> =
            serde_json::from_str(content).map_err(|source| PatternError::Parse {
                origin: origin.to_string(),
                source,
            })?;
        debug!(origin, count = patterns.len(), "loaded rules");
        Ok(Self { patterns })
    }

    pub fn load(path: &Path) -> Result<Self, PatternError> {
        let content = read_rule_file(path)?;
        Self::from_json(&content, &path.display().to_string())
    }

    /// Appends the valid records of a custom rules file, returning how many were added.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<usize, PatternError> {
        let custom = load_custom_rules(path)?;
        let added = custom.len();
        self.patterns.extend(custom);
        Ok(added)
    }

    pub fn push(&mut self, pattern: CodePattern) {
        self.patterns.push(pattern);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CodePattern> {
        self.patterns.iter()
    }

    pub fn as_slice(&self) -> &[CodePattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl<'a> IntoIterator for &'a PatternSet {
    type Item = &'a CodePattern;
    type IntoIter = std::slice::Iter<'a, CodePattern>;

    fn into_iter(self) -> Self::IntoIter {
        self.patterns.iter()
    }
}

/// Loads a custom rules file, validating each record on its own.
///
/// The file must be a JSON array. Records that do not deserialize, or whose
/// `id` or `description` is blank, are dropped with a warning.
pub fn load_custom_rules(path: &Path) -> Result<Vec<CodePattern>, PatternError> {
    let content = read_rule_file(path)?;
    let origin = path.display().to_string();
    let records: Vec<serde_json::Value> =
        serde_json::from_str(&content).map_err(|source| PatternError::Parse {
            origin: origin.clone(),
            source,
        })?;

    let mut valid = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        match validate_record(record) {
            Ok(pattern) => valid.push(pattern),
            Err(reason) => {
                warn!(file = %origin, index, reason = %reason, "dropping invalid custom rule")
            }
        }
    }

    debug!(file = %origin, count = valid.len(), "loaded custom rules");
    Ok(valid)
}

fn validate_record(record: serde_json::Value) -> Result<CodePattern, String> {
    let pattern: CodePattern = serde_json::from_value(record).map_err(|e| e.to_string())?;
    if pattern.id.trim().is_empty() {
        return Err("empty id".to_string());
    }
    if pattern.description.trim().is_empty() {
        return Err(format!("rule '{}' has an empty description", pattern.id));
    }
    Ok(pattern)
}

fn read_rule_file(path: &Path) -> Result<String, PatternError> {
    std::fs::read_to_string(path).map_err(|source| PatternError::Read {
        path: path.to_path_buf(),
        source,
    })
}
