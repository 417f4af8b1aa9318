//! Visitor context providing file information during AST traversal.

use swc_common::Span;

use crate::parser::ParsedFile;

pub struct VisitorContext<'a> {
    file: &'a ParsedFile,
}

impl<'a> VisitorContext<'a> {
    pub fn new(file: &'a ParsedFile) -> Self {
        Self { file }
    }

    pub fn file(&self) -> &ParsedFile {
        self.file
    }

    /// One-based `(line, column)` of the start of `span`.
    pub fn span_to_location(&self, span: Span) -> (usize, usize) {
        let source = self.file.source();
        let lo = self.file.offset_of(span.lo.0).min(source.len());

        let prefix = &source[..lo];
        let line = prefix.matches('\n').count() + 1;
        let last_newline = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = prefix[last_newline..].chars().count() + 1;

        (line, column)
    }

    pub fn get_source_text(&self, span: Span) -> Option<&str> {
        let source = self.file.source();
        let lo = self.file.offset_of(span.lo.0);
        let hi = self.file.offset_of(span.hi.0);

        if lo <= hi && hi <= source.len() {
            source.get(lo..hi)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use swc_common::Spanned;

    use super::*;

    fn first_item_span(parsed: &ParsedFile, index: usize) -> Span {
        parsed.module().unwrap().body[index].span()
    }

    #[test]
    fn context_provides_file_reference() {
        let parsed = ParsedFile::from_source("test.js", "const x = 1;");
        let ctx = VisitorContext::new(&parsed);

        assert_eq!(ctx.file().metadata().filename, "test.js");
    }

    #[test]
    fn span_to_location_first_statement() {
        let parsed = ParsedFile::from_source("test.js", "const x = 1;\nconst y = 2;");
        let ctx = VisitorContext::new(&parsed);

        assert_eq!(ctx.span_to_location(first_item_span(&parsed, 0)), (1, 1));
    }

    #[test]
    fn span_to_location_second_line_with_indent() {
        let parsed = ParsedFile::from_source("test.js", "const x = 1;\n  const y = 2;");
        let ctx = VisitorContext::new(&parsed);

        assert_eq!(ctx.span_to_location(first_item_span(&parsed, 1)), (2, 3));
    }

    #[test]
    fn get_source_text_returns_span_content() {
        let parsed = ParsedFile::from_source("test.js", "eval(input);\nfoo();");
        let ctx = VisitorContext::new(&parsed);

        let text = ctx.get_source_text(first_item_span(&parsed, 1));

        assert_eq!(text, Some("foo();"));
    }
}
