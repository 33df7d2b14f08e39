//! Tokenizer for bound expressions.

use std::fmt;

use chumsky::prelude::*;

use super::{ExprError, ExprErrorKind};

pub type Span = SimpleSpan;
pub type LexError<'src> = Rich<'src, char, Span>;

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'src> {
    /// Numeric literal as written. Member segments (`todos.0`) use the text.
    Number(&'src str),
    Str(String),
    Ident(&'src str),
    Punct(&'static str),
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Number(text) | Token::Ident(text) => f.write_str(text),
            Token::Str(text) => write!(f, "'{text}'"),
            Token::Punct(symbol) => f.write_str(symbol),
        }
    }
}

#[inline]
fn is_ident_start(c: &char) -> bool {
    c.is_ascii_alphabetic() || *c == '_' || *c == '$'
}

#[inline]
fn is_ident_continue(c: &char) -> bool {
    c.is_ascii_alphanumeric() || *c == '_' || *c == '$'
}

/// Whether `src` (already trimmed) is exactly one identifier.
pub fn is_identifier(src: &str) -> bool {
    let mut chars = src.chars();
    chars.next().is_some_and(|c| is_ident_start(&c)) && chars.all(|c| is_ident_continue(&c))
}

fn punct<'src>(
    symbol: &'static str,
) -> impl Parser<'src, &'src str, Token<'src>, extra::Err<LexError<'src>>> + Clone {
    just(symbol).to(Token::Punct(symbol))
}

pub fn lexer<'src>()
-> impl Parser<'src, &'src str, Vec<(Token<'src>, Span)>, extra::Err<LexError<'src>>> {
    // Longest first so `===` wins over `==` and `=`
    let compound = choice((
        punct("==="),
        punct("!=="),
        punct("=="),
        punct("!="),
        punct("<="),
        punct(">="),
        punct("&&"),
        punct("||"),
        punct("??"),
        punct("++"),
        punct("--"),
        punct("+="),
        punct("-="),
        punct("*="),
        punct("/="),
    ));

    let single = choice((
        punct("+"),
        punct("-"),
        punct("*"),
        punct("/"),
        punct("%"),
        punct("<"),
        punct(">"),
        punct("!"),
        punct("="),
        punct("?"),
        punct(":"),
        punct("."),
        punct(","),
        punct(";"),
        punct("("),
        punct(")"),
        punct("["),
        punct("]"),
        punct("{"),
        punct("}"),
    ));

    // No leading-dot literals: `.5` would swallow the dot in `todos.0.done`
    let exponent = one_of("eE")
        .then(one_of("+-").or_not())
        .then(text::digits(10));
    let number = text::int(10)
        .then(just('.').then(text::digits(10)).or_not())
        .then(exponent.or_not())
        .to_slice()
        .map(Token::Number);

    let escape = just('\\').ignore_then(any().map(|c| match c {
        'n' => '\n',
        't' => '\t',
        'r' => '\r',
        '0' => '\0',
        other => other,
    }));
    let single_quoted = just('\'')
        .ignore_then(
            none_of("'\\")
                .or(escape.clone())
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('\''));
    let double_quoted = just('"')
        .ignore_then(none_of("\"\\").or(escape).repeated().collect::<String>())
        .then_ignore(just('"'));
    let string = single_quoted.or(double_quoted).map(Token::Str);

    let identifier = any()
        .filter(is_ident_start)
        .then(any().filter(is_ident_continue).repeated())
        .to_slice()
        .map(Token::Ident);

    let token = choice((number, string, identifier, compound, single));

    token
        .map_with(|token, extra| (token, extra.span()))
        .padded()
        .repeated()
        .collect()
        .padded()
        .then_ignore(end())
}

pub fn tokenize(src: &str) -> Result<Vec<(Token<'_>, Span)>, ExprError> {
    lexer()
        .parse(src)
        .into_result()
        .map_err(|errors| syntax_error(&errors))
}

/// Collapse parser errors into one syntax error naming the first.
pub(super) fn syntax_error<T: fmt::Display>(errors: &[Rich<'_, T, Span>]) -> ExprError {
    let message = errors
        .first()
        .map(|error| format!("{} at offset {}", error.reason(), error.span().start))
        .unwrap_or_else(|| "malformed expression".to_string());
    ExprError::new(ExprErrorKind::Syntax, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token<'_>> {
        tokenize(src)
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn test_longest_punctuator_wins() {
        assert_eq!(kinds("a === b")[1], Token::Punct("==="));
        assert_eq!(kinds("count++")[1], Token::Punct("++"));
        assert_eq!(kinds("a !== b")[1], Token::Punct("!=="));
    }

    #[test]
    fn test_numeric_member_segment_is_not_a_fraction() {
        assert_eq!(
            kinds("todos.0.done"),
            vec![
                Token::Ident("todos"),
                Token::Punct("."),
                Token::Number("0"),
                Token::Punct("."),
                Token::Ident("done"),
            ]
        );
    }

    #[test]
    fn test_number_forms() {
        assert_eq!(kinds("3.25"), vec![Token::Number("3.25")]);
        assert_eq!(kinds("1e3"), vec![Token::Number("1e3")]);
        assert_eq!(kinds("2E-2"), vec![Token::Number("2E-2")]);
        // An exponent marker without digits is an identifier
        assert_eq!(kinds("4e"), vec![Token::Number("4"), Token::Ident("e")]);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = kinds(r#"'it\'s' + "a\nb""#);
        assert_eq!(tokens[0], Token::Str("it's".into()));
        assert_eq!(tokens[2], Token::Str("a\nb".into()));
    }

    #[test]
    fn test_spans_cover_source() {
        let tokens = tokenize("  ab + 1 ").unwrap();
        assert_eq!(tokens[0].1.into_range(), 2..4);
        assert_eq!(tokens[2].1.into_range(), 7..8);
    }

    #[test]
    fn test_blank_source_has_no_tokens() {
        assert!(tokenize("   ").unwrap().is_empty());
    }

    #[test]
    fn test_unterminated_string_is_syntax_error() {
        let err = tokenize("'open").unwrap_err();
        assert_eq!(err.kind, ExprErrorKind::Syntax);
    }

    #[test]
    fn test_unknown_character_is_syntax_error() {
        let err = tokenize("a # b").unwrap_err();
        assert_eq!(err.kind, ExprErrorKind::Syntax);
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("count"));
        assert!(is_identifier("$event"));
        assert!(!is_identifier("count + 1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
    }
}
