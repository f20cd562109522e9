//! Template-level error handling and diagnostic rendering.

use gauntlet_parser::{parse_template, ParseErrorKind};

#[test]
fn test_classic_authoring_mistakes() {
    let cases: &[(&str, ParseErrorKind)] = &[
        ("{{ 9", ParseErrorKind::UnmatchedOpenExpr),
        ("{{", ParseErrorKind::UnmatchedOpenExpr),
        ("[~ {{ ~]", ParseErrorKind::UnmatchedOpenExpr),
        ("baz }}", ParseErrorKind::UnmatchedCloseExpr),
        ("}}", ParseErrorKind::UnmatchedCloseExpr),
        ("[~ hello }} ~]", ParseErrorKind::UnmatchedCloseExpr),
        ("{{ foo {{ bar }} }}", ParseErrorKind::NestedExpr),
        ("[~ hello", ParseErrorKind::UnmatchedOpenRepeat),
        ("[~", ParseErrorKind::UnmatchedOpenRepeat),
        ("[~ foo [~ bar ~] ~]", ParseErrorKind::NestedRepeat),
        ("~unescaped tilde", ParseErrorKind::UnescapedTilde),
        ("trailing backslash\\", ParseErrorKind::TrailingBackslash),
    ];

    for (source, expected) in cases {
        let err = parse_template(source)
            .expect_err(&format!("'{}' should fail to parse", source));
        assert_eq!(&err.kind, expected, "wrong kind for '{}'", source);
    }
}

#[test]
fn test_expression_errors_surface_through_templates() {
    for source in [
        "{{a+}}",
        "{{a or}}",
        "{{not}}",
        "{{(a+b}}",
        "{{funky(}}",
        "{{a + [1, 2}}",
        "{{a + [,1,2]}}",
        "{{1 2}}",
    ] {
        let err = parse_template(source).expect_err(source);
        assert!(
            matches!(
                err.kind,
                ParseErrorKind::UnexpectedToken
                    | ParseErrorKind::UnexpectedEof
                    | ParseErrorKind::InvalidSyntax
            ),
            "wrong kind {:?} for '{}'",
            err.kind,
            source
        );
    }
}

#[test]
fn test_unclosed_string_is_unmatched_block() {
    // The open quote swallows the }} so the block never closes.
    let err = parse_template(r#"{{a + "hell}}"#).unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::UnmatchedOpenExpr);
}

#[test]
fn test_caret_context_format() {
    // The caret line is part of the user-facing contract: two-space
    // indent, the offending line, then a caret under the error column.
    let source = "run {{ foo + }} now";
    let err = parse_template(source).unwrap_err();
    let context = err.context(source);
    let lines: Vec<&str> = context.lines().collect();

    // message, source line, caret line
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "  run {{ foo + }} now");
    let caret_col = lines[2].find('^').expect("caret present");
    // Two-space indent, then the caret sits at the error column ({{'s
    // closing braces, where the missing operand was expected).
    assert_eq!(caret_col - 2, err.span.start as usize);
}

#[test]
fn test_valid_templates_parse() {
    for source in [
        "",
        "plain text",
        "{{ x }}",
        "{{x.1.a}} and {{y.*}}",
        "[~{{x}}~, ]",
        "pre [~a{{x}}b~-]{{ y }} post",
        r"escaped \{{ and \~ text",
        "{{ len([1, 2, 3]) }}",
        "{{ x:>8 }}",
    ] {
        assert!(
            parse_template(source).is_ok(),
            "'{}' should parse cleanly",
            source
        );
    }
}
