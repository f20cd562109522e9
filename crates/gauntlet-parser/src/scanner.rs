//! Template string scanner.
//!
//! Splits a config string into literal runs, `{{ expression }}` blocks,
//! and `[~ body ~sep]` repeat sections, parsing each expression body as it
//! is found. Escape rules: a backslash run immediately before `{{`, `[~`,
//! or `~` drops one backslash and makes the marker literal text; all other
//! backslashes pass through verbatim. A string may not end in an odd
//! number of backslashes.

use crate::error::{ParseError, ParseErrorKind};
use crate::expr;
use crate::stream::TokenStream;
use gauntlet_ast::{
    Expr, ExprKind, FormatSpec, RepeatBlock, Span, Template, TemplateItem,
};

/// Scan a full template string.
pub(crate) fn scan(source: &str) -> Result<Template, ParseError> {
    let mut scanner = Scanner { src: source, pos: 0 };
    let (items, end) = scanner.scan_items(false)?;
    debug_assert_eq!(end, EndReason::Eof, "top-level scan ends only at EOF");
    Ok(Template {
        items,
        source: source.to_string(),
    })
}

/// Why an item scan stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndReason {
    Eof,
    /// An unescaped `~` inside a repeat body: the separator begins.
    Separator,
}

struct Scanner<'src> {
    src: &'src str,
    pos: usize,
}

impl<'src> Scanner<'src> {
    fn rest(&self) -> &'src str {
        &self.src[self.pos..]
    }

    fn span_here(&self, len: usize) -> Span {
        Span::new(self.pos as u32, (self.pos + len) as u32)
    }

    /// Scan a sequence of literals, expression blocks, and (at top level)
    /// repeat sections.
    fn scan_items(&mut self, in_repeat: bool) -> Result<(Vec<TemplateItem>, EndReason), ParseError> {
        let mut items = Vec::new();
        let mut literal = String::new();

        macro_rules! flush {
            () => {
                if !literal.is_empty() {
                    items.push(TemplateItem::Literal(std::mem::take(&mut literal)));
                }
            };
        }

        loop {
            let rest = self.rest();

            if rest.is_empty() {
                flush!();
                return Ok((items, EndReason::Eof));
            }

            if rest.starts_with('\\') {
                self.scan_backslashes(&mut literal)?;
                continue;
            }

            if rest.starts_with("{{") {
                flush!();
                items.push(TemplateItem::Expr(self.scan_expr_block()?));
                continue;
            }

            if rest.starts_with("}}") {
                return Err(ParseError::new(
                    ParseErrorKind::UnmatchedCloseExpr,
                    "'}}' without a matching '{{'",
                    self.span_here(2),
                ));
            }

            if rest.starts_with("[~") {
                if in_repeat {
                    return Err(ParseError::new(
                        ParseErrorKind::NestedRepeat,
                        "repeat sections cannot nest",
                        self.span_here(2),
                    ));
                }
                flush!();
                items.push(TemplateItem::Repeat(self.scan_repeat()?));
                continue;
            }

            if rest.starts_with('~') {
                if in_repeat {
                    flush!();
                    return Ok((items, EndReason::Separator));
                }
                return Err(ParseError::new(
                    ParseErrorKind::UnescapedTilde,
                    "'~' must be escaped outside a repeat section",
                    self.span_here(1),
                ));
            }

            // Ordinary character.
            let c = rest.chars().next().expect("rest is non-empty");
            literal.push(c);
            self.pos += c.len_utf8();
        }
    }

    /// Handle a backslash run in literal text.
    ///
    /// `n` backslashes before `{{`, `[~`, or `~` become `n-1` backslashes
    /// plus the literal marker text; anywhere else they pass through. An
    /// odd run at end of input is an error (it would escape whatever
    /// terminates the string).
    fn scan_backslashes(&mut self, literal: &mut String) -> Result<(), ParseError> {
        let rest = self.rest();
        let n = rest.chars().take_while(|&c| c == '\\').count();
        let after = &rest[n..];

        let marker: Option<&str> = if after.starts_with("{{") {
            Some("{{")
        } else if after.starts_with("[~") {
            Some("[~")
        } else if after.starts_with('~') {
            Some("~")
        } else {
            None
        };

        if let Some(marker) = marker {
            for _ in 0..n - 1 {
                literal.push('\\');
            }
            literal.push_str(marker);
            self.pos += n + marker.len();
            return Ok(());
        }

        if after.is_empty() && n % 2 == 1 {
            return Err(ParseError::new(
                ParseErrorKind::TrailingBackslash,
                "string ends in an unescaped backslash",
                Span::at((self.pos + n - 1) as u32),
            ));
        }

        for _ in 0..n {
            literal.push('\\');
        }
        self.pos += n;
        Ok(())
    }

    /// Scan a `{{ expression[:format] }}` block. `self.pos` is at `{{`.
    fn scan_expr_block(&mut self) -> Result<gauntlet_ast::ExprBlock, ParseError> {
        let block_start = self.pos;
        self.pos += 2;
        let body_start = self.pos;

        let mut in_string = false;
        let mut format_colon: Option<usize> = None;

        loop {
            let rest = self.rest();

            if rest.is_empty() {
                return Err(ParseError::new(
                    ParseErrorKind::UnmatchedOpenExpr,
                    "'{{' without a matching '}}'",
                    Span::new(block_start as u32, (block_start + 2) as u32),
                ));
            }

            if in_string {
                if rest.starts_with('\\') && rest.len() > 1 {
                    self.pos += 1;
                    let c = self.rest().chars().next().expect("checked len");
                    self.pos += c.len_utf8();
                } else {
                    if rest.starts_with('"') {
                        in_string = false;
                    }
                    let c = rest.chars().next().expect("rest is non-empty");
                    self.pos += c.len_utf8();
                }
                continue;
            }

            if rest.starts_with('"') {
                in_string = true;
                self.pos += 1;
                continue;
            }

            if rest.starts_with("}}") {
                break;
            }

            if rest.starts_with("{{") {
                return Err(ParseError::new(
                    ParseErrorKind::NestedExpr,
                    "expression blocks cannot nest",
                    self.span_here(2),
                ));
            }

            if rest.starts_with(':') && format_colon.is_none() {
                format_colon = Some(self.pos);
            }

            let c = rest.chars().next().expect("rest is non-empty");
            self.pos += c.len_utf8();
        }

        let body_end = self.pos;
        self.pos += 2; // past }}

        let (expr_end, format) = match format_colon {
            Some(colon) => {
                // Trailing whitespace before `}}` is layout, not part of
                // the spec. Leading whitespace stays: it can be a fill.
                let spec_src = self.src[colon + 1..body_end].trim_end();
                let spec = FormatSpec::parse(spec_src).map_err(|err| {
                    ParseError::new(
                        ParseErrorKind::BadFormatSpec,
                        err.to_string(),
                        Span::new(colon as u32, body_end as u32),
                    )
                })?;
                (colon, Some(spec))
            }
            None => (body_end, None),
        };

        let body = &self.src[body_start..expr_end];
        let expr = parse_expr_body(body, body_start as u32)?;

        Ok(gauntlet_ast::ExprBlock {
            expr,
            format,
            span: Span::new(block_start as u32, self.pos as u32),
        })
    }

    /// Scan a `[~ body ~sep]` repeat section. `self.pos` is at `[~`.
    fn scan_repeat(&mut self) -> Result<RepeatBlock, ParseError> {
        let repeat_start = self.pos;
        self.pos += 2;

        let (items, end) = self.scan_items(true)?;
        if end == EndReason::Eof {
            return Err(ParseError::new(
                ParseErrorKind::UnmatchedOpenRepeat,
                "'[~' without a terminating '~<sep>]'",
                Span::new(repeat_start as u32, (repeat_start + 2) as u32),
            ));
        }

        // self.pos is at the separator tilde.
        let sep_start = self.pos;
        self.pos += 1;
        let separator = self.scan_separator(sep_start)?;

        Ok(RepeatBlock {
            items,
            separator,
            span: Span::new(repeat_start as u32, self.pos as u32),
        })
    }

    /// Scan the separator text between `~` and the closing `]`.
    ///
    /// `\]` embeds a literal bracket, same backslash rule as literal text.
    fn scan_separator(&mut self, sep_start: usize) -> Result<String, ParseError> {
        let mut sep = String::new();

        loop {
            let rest = self.rest();

            if rest.is_empty() {
                return Err(ParseError::new(
                    ParseErrorKind::UnmatchedSeparator,
                    "separator is missing its closing ']'",
                    Span::at(sep_start as u32),
                ));
            }

            if rest.starts_with('\\') {
                let n = rest.chars().take_while(|&c| c == '\\').count();
                let after = &rest[n..];
                if after.starts_with(']') {
                    for _ in 0..n - 1 {
                        sep.push('\\');
                    }
                    sep.push(']');
                    self.pos += n + 1;
                } else {
                    for _ in 0..n {
                        sep.push('\\');
                    }
                    self.pos += n;
                }
                continue;
            }

            if rest.starts_with(']') {
                self.pos += 1;
                return Ok(sep);
            }

            let c = rest.chars().next().expect("rest is non-empty");
            sep.push(c);
            self.pos += c.len_utf8();
        }
    }
}

/// Parse an expression body at the given byte offset in the template.
///
/// All spans in the returned tree are re-anchored to the full template
/// string, so evaluation errors can point into the original value.
fn parse_expr_body(body: &str, offset: u32) -> Result<Expr, ParseError> {
    // An empty block resolves to the empty string.
    if body.trim().is_empty() {
        return Ok(Expr::new(
            ExprKind::StringLiteral(String::new()),
            Span::at(offset),
        ));
    }

    let tokens = gauntlet_lexer::lex(body).map_err(|err| {
        ParseError::invalid_syntax(
            "unrecognized character in expression",
            Span::new(err.span.start as u32, err.span.end as u32),
        )
        .with_offset(offset)
    })?;

    let mut stream = TokenStream::new(&tokens, body.len() as u32);
    let mut parsed = expr::parse_expr(&mut stream).map_err(|err| err.with_offset(offset))?;
    stream
        .expect_end()
        .map_err(|err| err.with_offset(offset))?;

    offset_spans(&mut parsed, offset);
    Ok(parsed)
}

/// Shift every span in an expression tree right by `offset` bytes.
fn offset_spans(expr: &mut Expr, offset: u32) {
    expr.span = expr.span.offset(offset);
    match &mut expr.kind {
        ExprKind::Unary { operand, .. } => offset_spans(operand, offset),
        ExprKind::Binary { left, right, .. } => {
            offset_spans(left, offset);
            offset_spans(right, offset);
        }
        ExprKind::Compare { first, rest } => {
            offset_spans(first, offset);
            for (_, e) in rest {
                offset_spans(e, offset);
            }
        }
        ExprKind::Call { args, .. } => {
            for arg in args {
                offset_spans(arg, offset);
            }
        }
        ExprKind::ListLiteral(items) => {
            for item in items {
                offset_spans(item, offset);
            }
        }
        ExprKind::IntLiteral(_)
        | ExprKind::FloatLiteral(_)
        | ExprKind::BoolLiteral(_)
        | ExprKind::StringLiteral(_)
        | ExprKind::Var(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gauntlet_ast::TemplateItem;

    fn scan_ok(src: &str) -> Template {
        scan(src).expect("scan failed")
    }

    #[test]
    fn test_plain_string() {
        let tmpl = scan_ok("echo hello world");
        assert_eq!(
            tmpl.items,
            vec![TemplateItem::Literal("echo hello world".to_string())]
        );
        assert!(!tmpl.has_substitutions());
    }

    #[test]
    fn test_empty_string() {
        let tmpl = scan_ok("");
        assert!(tmpl.items.is_empty());
    }

    #[test]
    fn test_expr_block() {
        let tmpl = scan_ok("n = {{ nodes }}");
        assert_eq!(tmpl.items.len(), 2);
        assert!(matches!(tmpl.items[0], TemplateItem::Literal(ref s) if s == "n = "));
        assert!(matches!(tmpl.items[1], TemplateItem::Expr(_)));
    }

    #[test]
    fn test_escaped_open() {
        let tmpl = scan_ok(r"literal \{{ braces");
        assert_eq!(
            tmpl.items,
            vec![TemplateItem::Literal("literal {{ braces".to_string())]
        );
    }

    #[test]
    fn test_double_backslash_before_marker() {
        let tmpl = scan_ok(r"\\~");
        assert_eq!(tmpl.items, vec![TemplateItem::Literal(r"\~".to_string())]);
    }

    #[test]
    fn test_plain_backslashes_pass_through() {
        let tmpl = scan_ok(r"a\b\\c");
        assert_eq!(tmpl.items, vec![TemplateItem::Literal(r"a\b\\c".to_string())]);
    }

    #[test]
    fn test_repeat_section() {
        let tmpl = scan_ok("[~{{people}} ~]");
        match &tmpl.items[0] {
            TemplateItem::Repeat(repeat) => {
                assert_eq!(repeat.separator, "");
                assert_eq!(repeat.items.len(), 2);
                assert!(matches!(repeat.items[1], TemplateItem::Literal(ref s) if s == " "));
            }
            other => panic!("expected repeat, got {:?}", other),
        }
    }

    #[test]
    fn test_repeat_with_separator() {
        let tmpl = scan_ok("[~{{people}}~, ]");
        match &tmpl.items[0] {
            TemplateItem::Repeat(repeat) => assert_eq!(repeat.separator, ", "),
            other => panic!("expected repeat, got {:?}", other),
        }
    }

    #[test]
    fn test_format_spec() {
        let tmpl = scan_ok("{{ 3.14159:.2f }}");
        match &tmpl.items[0] {
            TemplateItem::Expr(block) => {
                let format = block.format.as_ref().expect("format spec parsed");
                assert_eq!(format.precision, Some(2));
            }
            other => panic!("expected expr, got {:?}", other),
        }
    }

    #[test]
    fn test_unmatched_open() {
        let err = scan("{{ 9").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnmatchedOpenExpr);
        assert_eq!(err.span, Span::new(0, 2));
    }

    #[test]
    fn test_unmatched_close() {
        let err = scan("baz }}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnmatchedCloseExpr);
    }

    #[test]
    fn test_nested_expr() {
        let err = scan("{{ foo {{ bar }} }}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NestedExpr);
    }

    #[test]
    fn test_nested_repeat() {
        let err = scan("[~ foo [~ bar ~] ~]").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::NestedRepeat);
    }

    #[test]
    fn test_unescaped_tilde() {
        let err = scan("~unescaped tilde").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnescapedTilde);
    }

    #[test]
    fn test_trailing_backslash() {
        let err = scan("trailing backslash\\").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::TrailingBackslash);
    }

    #[test]
    fn test_unmatched_repeat() {
        let err = scan("[~ hello").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnmatchedOpenRepeat);
    }

    #[test]
    fn test_braces_inside_string_literal() {
        // A close marker inside a quoted string does not end the block.
        let tmpl = scan_ok(r#"{{ "}}" }}"#);
        assert_eq!(tmpl.items.len(), 1);
        assert!(matches!(tmpl.items[0], TemplateItem::Expr(_)));
    }

    #[test]
    fn test_error_offset_into_template() {
        // The bad token is at byte 9 of the full string.
        let err = scan("prefix {{ @ }}").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
        assert_eq!(err.span.start, 10);
    }
}
