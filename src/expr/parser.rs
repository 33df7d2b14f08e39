//! Token-stream parser for bound expressions.
//!
//! Grammar (lowest to highest binding):
//!
//! ```text
//! program     := expression (';' expression)* ';'?        (statement mode)
//! expression  := conditional (('=' | '+=' | '-=' | '*=' | '/=') expression)?
//! conditional := binary ('?' expression ':' expression)?
//! binary      := pratt over operand:  ?? < || < && < equality < relational
//!                < additive < multiplicative < prefix ('!' '-' '+' 'typeof')
//! operand     := ('++' | '--') postfix | postfix
//! postfix     := call ('++' | '--')?
//! call        := primary ('.' name | '[' expression ']' | '(' args ')')*
//! primary     := number | string | identifier | literal keyword
//!              | '(' expression ')' | '[' elements ']' | '{' properties '}'
//! ```

use chumsky::{input::ValueInput, pratt::*, prelude::*};

use super::ast::{AssignOp, BinaryOp, Expr, LogicalOp, Program, Prop, UnaryOp};
use super::lexer::{syntax_error, tokenize, Span, Token};
use super::ExprError;
use crate::types::Value;

pub type ParseError<'src> = Rich<'src, Token<'src>, Span>;

/// Parse one expression; trailing input is a syntax error.
pub fn parse_expression(src: &str) -> Result<Program, ExprError> {
    let tokens = tokenize(src)?;
    expression()
        .then_ignore(end())
        .map(|expr| Program(vec![expr]))
        .parse(token_input(&tokens, src.len()))
        .into_result()
        .map_err(|errors| syntax_error(&errors))
}

/// Parse a `;`-separated statement list.
pub fn parse_statements(src: &str) -> Result<Program, ExprError> {
    let tokens = tokenize(src)?;
    expression()
        .separated_by(just(Token::Punct(";")).repeated().at_least(1))
        .allow_leading()
        .allow_trailing()
        .collect::<Vec<_>>()
        .then_ignore(end())
        .map(Program)
        .parse(token_input(&tokens, src.len()))
        .into_result()
        .map_err(|errors| syntax_error(&errors))
}

fn token_input<'src>(
    tokens: &'src [(Token<'src>, Span)],
    len: usize,
) -> impl ValueInput<'src, Token = Token<'src>, Span = Span> {
    tokens.map(Span::from(len..len), |(token, span)| (token, span))
}

/// Member selector, call or index trailing a primary.
enum Suffix {
    Names(Vec<String>),
    Index(Expr),
    Call(Vec<Expr>),
}

fn apply_suffix(target: Expr, suffix: Suffix) -> Expr {
    match suffix {
        Suffix::Names(names) => names.into_iter().fold(target, |target, name| {
            Expr::Member(Box::new(target), Prop::Named(name))
        }),
        Suffix::Index(index) => Expr::Member(Box::new(target), Prop::Computed(Box::new(index))),
        Suffix::Call(args) => Expr::Call(Box::new(target), args),
    }
}

/// `0` or `0.1` after a dot: one index segment per digit run.
fn index_segments(text: &str) -> Option<Vec<String>> {
    text.split('.')
        .map(|part| {
            (!part.is_empty() && part.bytes().all(|b| b.is_ascii_digit())).then(|| part.to_string())
        })
        .collect()
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary(op, Box::new(left), Box::new(right))
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical(op, Box::new(left), Box::new(right))
}

fn expression<'src, I>() -> impl Parser<'src, I, Expr, extra::Err<ParseError<'src>>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    recursive(|expression| {
        let punct = |symbol: &'static str| just(Token::Punct(symbol));

        let identifier = select! { Token::Ident(name) => name };
        let number = select! { Token::Number(text) => text }.try_map(|text: &str, span| {
            text.parse::<f64>()
                .map_err(|_| Rich::custom(span, format!("invalid number `{text}`")))
        });
        let string = select! { Token::Str(text) => text };

        let items = expression
            .clone()
            .separated_by(punct(","))
            .allow_trailing()
            .collect::<Vec<_>>();

        let name_or_keyword = identifier.clone().map(|name: &str| match name {
            "true" => Expr::Literal(Value::Bool(true)),
            "false" => Expr::Literal(Value::Bool(false)),
            "null" => Expr::Literal(Value::Null),
            "undefined" => Expr::Literal(Value::Undefined),
            _ => Expr::Ident(name.to_string()),
        });

        let array = items
            .clone()
            .delimited_by(punct("["), punct("]"))
            .map(Expr::Array);

        let key = choice((
            identifier.clone().map(|name: &str| name.to_string()),
            string.clone(),
            number.clone().map(|n| Value::Number(n).to_display()),
        ));
        // Shorthand `{ done }` reads the same-named variable
        let property = key
            .then(punct(":").ignore_then(expression.clone()).or_not())
            .map(|(key, value)| {
                let value = value.unwrap_or_else(|| Expr::Ident(key.clone()));
                (key, value)
            });
        let object = property
            .separated_by(punct(","))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(punct("{"), punct("}"))
            .map(Expr::Object);

        let primary = choice((
            number.clone().map(|n| Expr::Literal(Value::Number(n))),
            string.map(|text| Expr::Literal(Value::String(text))),
            name_or_keyword,
            expression.clone().delimited_by(punct("("), punct(")")),
            array,
            object,
        ));

        let segment = choice((
            identifier.map(|name: &str| vec![name.to_string()]),
            select! { Token::Number(text) => text }.try_map(|text: &str, span| {
                index_segments(text)
                    .ok_or_else(|| Rich::custom(span, format!("invalid member `{text}`")))
            }),
        ));
        let suffix = choice((
            punct(".").ignore_then(segment).map(Suffix::Names),
            expression
                .clone()
                .delimited_by(punct("["), punct("]"))
                .map(Suffix::Index),
            items.delimited_by(punct("("), punct(")")).map(Suffix::Call),
        ));
        let call = primary
            .then(suffix.repeated().collect::<Vec<_>>())
            .map(|(head, suffixes)| suffixes.into_iter().fold(head, apply_suffix));

        let update = choice((punct("++").to(1.0), punct("--").to(-1.0)));
        let postfix = call
            .then(update.clone().or_not())
            .try_map(|(target, delta), span| match delta {
                None => Ok(target),
                Some(delta) if target.is_assignable() => Ok(Expr::Update {
                    target: Box::new(target),
                    delta,
                    prefix: false,
                }),
                Some(_) => Err(Rich::custom(span, "invalid operand for postfix update")),
            });
        let prefixed = update
            .then(postfix.clone())
            .try_map(|(delta, target), span| {
                if target.is_assignable() {
                    Ok(Expr::Update {
                        target: Box::new(target),
                        delta,
                        prefix: true,
                    })
                } else {
                    Err(Rich::custom(span, "invalid operand for prefix update"))
                }
            });
        let operand = prefixed.or(postfix);

        let unary = choice((
            punct("!").to(UnaryOp::Not),
            punct("-").to(UnaryOp::Neg),
            punct("+").to(UnaryOp::Plus),
            just(Token::Ident("typeof")).to(UnaryOp::TypeOf),
        ));
        let multiplicative = choice((
            punct("*").to(BinaryOp::Mul),
            punct("/").to(BinaryOp::Div),
            punct("%").to(BinaryOp::Rem),
        ));
        let additive = choice((punct("+").to(BinaryOp::Add), punct("-").to(BinaryOp::Sub)));
        let relational = choice((
            punct("<=").to(BinaryOp::Le),
            punct(">=").to(BinaryOp::Ge),
            punct("<").to(BinaryOp::Lt),
            punct(">").to(BinaryOp::Gt),
        ));
        let equality = choice((
            punct("===").to(BinaryOp::StrictEq),
            punct("!==").to(BinaryOp::StrictNe),
            punct("==").to(BinaryOp::LooseEq),
            punct("!=").to(BinaryOp::LooseNe),
        ));

        let operators = operand.pratt((
            prefix(8, unary, |op, operand, _| Expr::Unary(op, Box::new(operand))),
            infix(left(7), multiplicative, |l, op, r, _| binary(op, l, r)),
            infix(left(6), additive, |l, op, r, _| binary(op, l, r)),
            infix(left(5), relational, |l, op, r, _| binary(op, l, r)),
            infix(left(4), equality, |l, op, r, _| binary(op, l, r)),
            infix(left(3), punct("&&"), |l, _, r, _| logical(LogicalOp::And, l, r)),
            infix(left(2), punct("||"), |l, _, r, _| logical(LogicalOp::Or, l, r)),
            infix(left(1), punct("??"), |l, _, r, _| logical(LogicalOp::Coalesce, l, r)),
        ));

        let conditional = operators
            .then(
                punct("?")
                    .ignore_then(expression.clone())
                    .then_ignore(punct(":"))
                    .then(expression.clone())
                    .or_not(),
            )
            .map(|(test, branches)| match branches {
                Some((consequent, alternate)) => Expr::Conditional(
                    Box::new(test),
                    Box::new(consequent),
                    Box::new(alternate),
                ),
                None => test,
            });

        let assign = choice((
            punct("=").to(AssignOp::Set),
            punct("+=").to(AssignOp::Add),
            punct("-=").to(AssignOp::Sub),
            punct("*=").to(AssignOp::Mul),
            punct("/=").to(AssignOp::Div),
        ));

        // Right-associative: `a = b = 1` assigns `b` first
        conditional
            .then(assign.then(expression).or_not())
            .try_map(|(target, assignment), span| match assignment {
                None => Ok(target),
                Some((op, value)) if target.is_assignable() => {
                    Ok(Expr::Assign(op, Box::new(target), Box::new(value)))
                }
                Some(_) => Err(Rich::custom(span, "invalid assignment target")),
            })
    })
}
