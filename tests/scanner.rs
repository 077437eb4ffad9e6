use blang::diagnostics::AsStr;
use blang::syntax::scanner::{LexErrorKind, Lexer, analyze};
use blang::syntax::token::TokenKind;

fn kinds(src: &str) -> Vec<TokenKind> {
    analyze(src).unwrap().into_iter().map(|t| t.kind).collect()
}

#[test]
fn test_declarations_and_calls() {
    use TokenKind::*;
    assert_eq!(
        kinds("var x = 10; const y = x % 3\nprintln(x, y)"),
        vec![
            Var, Identifier, Assign, Integer, Semicolon, Const, Identifier, Assign, Identifier,
            Percent, Integer, Identifier, LParen, Identifier, Comma, Identifier, RParen, Eof
        ]
    );
}

#[test]
fn test_lambda_and_array_literal() {
    use TokenKind::*;
    assert_eq!(
        kinds("array_filter([1, 2], fn(x) => x >= 2)"),
        vec![
            Identifier, LParen, LBracket, Integer, Comma, Integer, RBracket, Comma, Fn, LParen,
            Identifier, RParen, Arrow, Identifier, GreaterEq, Integer, RParen, Eof
        ]
    );
}

#[test]
fn test_identifiers_keep_their_text() {
    let tokens = analyze("array_filter _tmp x1 functional").unwrap();
    let texts: Vec<_> = tokens.iter().take(4).map(|t| (t.kind, t.text)).collect();
    assert_eq!(
        texts,
        vec![
            (TokenKind::Identifier, "array_filter"),
            (TokenKind::Identifier, "_tmp"),
            (TokenKind::Identifier, "x1"),
            (TokenKind::Identifier, "functional"),
        ]
    );
}

#[test]
fn test_both_quote_styles() {
    let tokens = analyze(r#""double" 'single'"#).unwrap();
    assert_eq!(tokens[0].text, "double");
    assert_eq!(tokens[1].text, "single");
    assert!(tokens[..2].iter().all(|t| t.kind == TokenKind::Str));
}

#[test]
fn test_comments_between_tokens() {
    use TokenKind::*;
    assert_eq!(kinds("1 /* two\nlines */ + // rest\n2"), vec![Integer, Plus, Integer, Eof]);
}

#[test]
fn test_line_numbers_after_comments() {
    let tokens = analyze("// header\r\n/* a\nb */ x").unwrap();
    assert_eq!((tokens[0].line_start, tokens[0].column_start), (3, 6));
}

#[test]
fn test_unterminated_string_fails() {
    let err = analyze("var s = \"never closed;").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    assert_eq!(err.to_string(), LexErrorKind::UnterminatedString.as_str());
    assert_eq!((err.line, err.column), (1, 9));
}

#[test]
fn test_unexpected_character_is_reported_with_position() {
    let err = analyze("var a = 1;\nvar b = 2 @ 3;").unwrap_err();
    assert_eq!(err.kind, LexErrorKind::UnexpectedChar('@'));
    assert_eq!((err.line, err.column), (2, 11));
}

#[test]
fn test_lexer_yields_eof_forever() {
    let mut lexer = Lexer::new("x");
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Identifier);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);
}
