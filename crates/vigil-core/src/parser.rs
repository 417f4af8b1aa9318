//! Parser front-end for JavaScript/TypeScript sources
//!
//! swc produces the AST; this module picks the syntax from the file
//! extension and keeps the source text around for locations and snippets.

use std::ops::Range;
use std::sync::OnceLock;

use swc_common::sync::Lrc;
use swc_common::{FileName, SourceMap, Spanned};
use swc_ecma_parser::{EsSyntax, Syntax, TsSyntax, parse_file_as_module};

pub use swc_ecma_ast::{EsVersion, Module};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs", "mts", "cts"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
}

pub fn detect_language(filename: &str) -> Language {
    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();

    match ext.as_str() {
        "ts" | "mts" | "cts" => Language::TypeScript,
        "tsx" => Language::Tsx,
        "jsx" => Language::Jsx,
        _ => Language::JavaScript,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message} at {line}:{column}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug)]
pub struct ParseResult {
    pub module: Option<Module>,
    pub errors: Vec<ParseError>,
    /// Byte position swc assigned to the first character of the source.
    pub start_pos: u32,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.module.is_some()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub filename: String,
    pub language: Language,
    pub line_count: usize,
    pub has_errors: bool,
}

pub struct ParsedFile {
    source: String,
    metadata: FileMetadata,
    ast_module: Option<Module>,
    errors: Vec<ParseError>,
    start_pos: u32,
    line_ranges: OnceLock<Vec<Range<usize>>>,
}

impl std::fmt::Debug for ParsedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedFile")
            .field("metadata", &self.metadata)
            .field("has_module", &self.ast_module.is_some())
            .field("error_count", &self.errors.len())
            .finish()
    }
}

impl ParsedFile {
    pub fn from_source(filename: &str, source: &str) -> Self {
        let language = detect_language(filename);
        let parser = Parser::for_language(language);
        let parse_result = parser.parse_module_recovering(source);

        let line_count = if source.is_empty() {
            0
        } else {
            source.lines().count()
        };

        let metadata = FileMetadata {
            filename: filename.to_string(),
            language,
            line_count,
            has_errors: parse_result.has_errors(),
        };

        Self {
            source: source.to_string(),
            metadata,
            ast_module: parse_result.module,
            errors: parse_result.errors,
            start_pos: parse_result.start_pos,
            line_ranges: OnceLock::new(),
        }
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    pub fn module(&self) -> Option<&Module> {
        self.ast_module.as_ref()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Converts an absolute swc byte position into an offset into [`Self::source`].
    pub fn offset_of(&self, pos: u32) -> usize {
        pos.saturating_sub(self.start_pos) as usize
    }

    pub fn get_line(&self, line_number: usize) -> Option<&str> {
        if line_number == 0 {
            return None;
        }

        let ranges = self.line_ranges.get_or_init(|| self.build_line_ranges());
        let index = line_number - 1;

        ranges.get(index).map(|range| &self.source[range.clone()])
    }

    fn build_line_ranges(&self) -> Vec<Range<usize>> {
        let mut ranges = Vec::new();
        let mut start = 0;

        for (i, c) in self.source.char_indices() {
            if c == '\n' {
                ranges.push(start..i);
                start = i + 1;
            }
        }

        if start < self.source.len() {
            ranges.push(start..self.source.len());
        }

        ranges
    }
}

#[derive(Debug, Clone)]
pub struct Parser {
    syntax: Syntax,
}

impl Parser {
    pub fn for_language(language: Language) -> Self {
        let syntax = match language {
            Language::JavaScript => Syntax::Es(EsSyntax::default()),
            Language::Jsx => Syntax::Es(EsSyntax {
                jsx: true,
                ..Default::default()
            }),
            Language::TypeScript => Syntax::Typescript(TsSyntax::default()),
            Language::Tsx => Syntax::Typescript(TsSyntax {
                tsx: true,
                ..Default::default()
            }),
        };

        Self { syntax }
    }

    pub fn for_file(filename: &str) -> Self {
        Self::for_language(detect_language(filename))
    }

    pub fn parse_module_recovering(&self, code: &str) -> ParseResult {
        let source_map: Lrc<SourceMap> = Default::default();
        let fm = source_map
            .new_source_file(FileName::Custom("input.js".into()).into(), code.to_string());

        let mut recovered_errors = Vec::new();

        let result = parse_file_as_module(
            &fm,
            self.syntax,
            EsVersion::latest(),
            None,
            &mut recovered_errors,
        );

        let to_parse_error = |e: swc_ecma_parser::error::Error| {
            let span = e.span();
            let loc = source_map.lookup_char_pos(span.lo);
            ParseError {
                line: loc.line,
                column: loc.col_display,
                message: e.kind().msg().to_string(),
            }
        };

        let mut errors: Vec<ParseError> = recovered_errors.into_iter().map(to_parse_error).collect();

        let module = match result {
            Ok(module) => Some(module),
            Err(e) => {
                errors.push(to_parse_error(e));
                None
            }
        };

        ParseResult {
            module,
            errors,
            start_pos: fm.start_pos.0,
        }
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::for_language(Language::JavaScript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_language_from_extension() {
        assert_eq!(detect_language("file.js"), Language::JavaScript);
        assert_eq!(detect_language("file.mjs"), Language::JavaScript);
        assert_eq!(detect_language("file.cjs"), Language::JavaScript);
        assert_eq!(detect_language("file.jsx"), Language::Jsx);
        assert_eq!(detect_language("file.ts"), Language::TypeScript);
        assert_eq!(detect_language("file.mts"), Language::TypeScript);
        assert_eq!(detect_language("file.tsx"), Language::Tsx);
        assert_eq!(detect_language("unknown"), Language::JavaScript);
    }

    #[test]
    fn parse_valid_module_has_no_errors() {
        let result = Parser::default().parse_module_recovering("const x = 1;\nfoo(x);");

        assert!(result.is_ok());
        assert!(!result.has_errors());
        assert_eq!(result.module.unwrap().body.len(), 2);
    }

    #[test]
    fn parse_incomplete_code_reports_errors() {
        let result = Parser::default().parse_module_recovering("const x =");

        assert!(result.has_errors());
        assert!(!result.errors[0].message.is_empty());
    }

    #[test]
    fn parse_typescript_annotations() {
        let result = Parser::for_file("app.ts").parse_module_recovering("const x: number = 1;");

        assert!(result.is_ok());
        assert!(!result.has_errors());
    }

    #[test]
    fn parse_tsx_element() {
        let result =
            Parser::for_file("app.tsx").parse_module_recovering("const App = () => <div />;");

        assert!(!result.has_errors());
    }

    #[test]
    fn parsed_file_metadata() {
        let parsed = ParsedFile::from_source("test.ts", "const x = 1;\nconst y = 2;");

        assert_eq!(parsed.metadata().filename, "test.ts");
        assert_eq!(parsed.metadata().language, Language::TypeScript);
        assert_eq!(parsed.metadata().line_count, 2);
        assert!(!parsed.metadata().has_errors);
    }

    #[test]
    fn parsed_file_flags_syntax_errors() {
        let parsed = ParsedFile::from_source("test.js", "const = ;");

        assert!(parsed.metadata().has_errors);
        assert!(!parsed.errors().is_empty());
    }

    #[test]
    fn parsed_file_get_line() {
        let parsed = ParsedFile::from_source("test.js", "const x = 1;\n\nconst y = 2;\n");

        assert_eq!(parsed.get_line(0), None);
        assert_eq!(parsed.get_line(1), Some("const x = 1;"));
        assert_eq!(parsed.get_line(2), Some(""));
        assert_eq!(parsed.get_line(3), Some("const y = 2;"));
        assert_eq!(parsed.get_line(4), None);
    }

    #[test]
    fn offset_of_is_relative_to_source_start() {
        let parsed = ParsedFile::from_source("test.js", "foo();");
        let module = parsed.module().unwrap();

        let offset = parsed.offset_of(module.body[0].span().lo.0);

        assert_eq!(offset, 0);
    }
}
