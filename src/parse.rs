//! Parser of the definition language.
//!
//! ```text
//! streams <name>(<var>,...) = { "<description>", <expr> };
//! chart   <name>(<var>,...) = { "<title>", (<streamsRef>, <yAxisRef>), ... };
//! yaxis   <name>(<var>,...) = { <label>, "integer"|"double", <lower>, <upper> };
//! yaxis   <name>(<var>,...) = { <label> [, "integer"|"double"] };
//! report  <name>(<var>,...) = { "<title>", <chartRef>, ... };
//! ```
//!
//! Arithmetic operators in stream expressions are desugared into calls of the
//! `Add`, `Sub`, `Mul` and `Div` functions. A call of a stock function becomes a
//! function call, any other call is dispatched to a reducer.

use std::sync::Arc;

use logos::Logos;
use smallvec::SmallVec;

use crate::{
    definition::*,
    domain::ItemName,
    expr::{Constant, Expression, Parameter, Variable},
    function,
    span::{Span, Spanned},
    value::Number,
};

pub mod lex;

use lex::Token;

/// Iterator over lexical elements.
type LexIter<'a> = logos::SpannedIter<'a, Token>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Unexpected end of input, expected {expected}")]
    UnexpectedEnd { expected: &'static str },

    #[error("Unrecognized input `{text}` at {span}")]
    UnknownToken { text: String, span: Span },

    #[error("Expected {expected} at {span}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
        span: Span,
    },

    #[error("Unknown axis number type \"{found}\" at {span}, expected \"integer\" or \"double\"")]
    NumberType { found: String, span: Span },

    #[error("Unexpected input after the definition at {span}")]
    TrailingInput { span: Span },
}

impl ParseError {
    /// Location of the error in the source, if it is known.
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::UnexpectedEnd { .. } => None,
            ParseError::UnknownToken { span, .. }
            | ParseError::Unexpected { span, .. }
            | ParseError::NumberType { span, .. }
            | ParseError::TrailingInput { span } => Some(*span),
        }
    }

    /// Render the error with the offending line of `source` and a marker
    /// under the offending text.
    pub fn explain(&self, source: &str) -> String {
        let mut out = format!("error: {self}");
        let Some(span) = self.span() else {
            return out;
        };

        let (line, col) = span.line_col(source);
        let text = source.lines().nth(line - 1).unwrap_or_default();
        let width = span
            .slice(source)
            .chars()
            .take_while(|c| *c != '\n')
            .count()
            .max(1);
        let gutter = line.to_string().len();
        out.push_str(&format!(
            "\n{:gutter$}--> {line}:{col}\n{:gutter$} |\n{line} | {text}\n{:gutter$} | {}{}",
            "",
            "",
            "",
            " ".repeat(col - 1),
            "^".repeat(width),
        ));
        out
    }
}

/// Parse lexemes into a structure.
trait Parse: Sized {
    fn parse(tokens: &mut LexIter) -> Result<Self, ParseError>;

    /// Parse with span.
    fn parse_span(tokens: &mut LexIter) -> Result<Spanned<Self>, ParseError> {
        let start = next_start(tokens);
        let v = Self::parse(tokens)?;
        let end = tokens.span().end;
        Ok(Span::from(start..end.max(start)).with(v))
    }
}

/// Create a guarded context for running a parser to restore the original state if parsing fails.
trait Guard<'lex> {
    fn guard<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E>;
}

impl<'lex> Guard<'lex> for LexIter<'lex> {
    fn guard<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E> {
        let original = self.clone();
        match f(self) {
            Ok(v) => Ok(v),
            Err(e) => {
                *self = original;
                Err(e)
            }
        }
    }
}

/// Byte offset of the next token, or of the end of input.
fn next_start(iter: &LexIter) -> usize {
    let mut peek = iter.clone();
    match peek.next() {
        Some((_, range)) => range.start,
        None => peek.span().end,
    }
}

/// Take the next token, turning lexer failures and end of input into errors.
fn next_token(iter: &mut LexIter, expected: &'static str) -> Result<Spanned<Token>, ParseError> {
    match iter.next() {
        Some((Ok(token), range)) => Ok(Span::from(range).with(token)),
        Some((Err(()), range)) => Err(ParseError::UnknownToken {
            text: iter.slice().to_owned(),
            span: range.into(),
        }),
        None => Err(ParseError::UnexpectedEnd { expected }),
    }
}

fn unexpected(expected: &'static str, found: Spanned<Token>) -> ParseError {
    let (found, span) = found.split();
    ParseError::Unexpected {
        expected,
        found: found.to_string(),
        span,
    }
}

impl Token {
    /// Expect next token to be the same as this one.
    fn expect(&self, iter: &mut LexIter, expected: &'static str) -> Result<Span, ParseError> {
        iter.guard(|iter| {
            let next = next_token(iter, expected)?;
            if *next == *self {
                Ok(next.span())
            } else {
                Err(unexpected(expected, next))
            }
        })
    }

    /// Check if next token is the same as this one. If so, advance the iterator and return true.
    fn probe(&self, iter: &mut LexIter) -> bool {
        self.spanprobe(iter).is_some()
    }

    /// Check if next token is the same as this one. If so, advance the iterator and return [Span].
    fn spanprobe(&self, iter: &mut LexIter) -> Option<Span> {
        let backup = iter.clone();

        if let Some((Ok(next), range)) = iter.next() {
            if next == *self {
                return Some(Span::from(range));
            }
        }

        *iter = backup;
        None
    }

    /// Expect next token to be an identifier.
    fn expect_ident(
        iter: &mut LexIter,
        expected: &'static str,
    ) -> Result<Spanned<ItemName>, ParseError> {
        iter.guard(|iter| {
            let next = next_token(iter, expected)?;
            let span = next.span();
            match next.into_inner() {
                Token::Ident(name) => Ok(span.with(name)),
                other => Err(unexpected(expected, span.with(other))),
            }
        })
    }

    /// Expect next token to be a string literal.
    fn expect_str(iter: &mut LexIter, expected: &'static str) -> Result<Spanned<String>, ParseError> {
        iter.guard(|iter| {
            let next = next_token(iter, expected)?;
            let span = next.span();
            match next.into_inner() {
                Token::StrLit(s) => Ok(span.with(s)),
                other => Err(unexpected(expected, span.with(other))),
            }
        })
    }

    /// Parse a list of elements separated by commas into a small vector, up to
    /// the closing token, which is consumed. The list may be empty.
    fn comma_smallvec<const N: usize, T>(
        iter: &mut LexIter,
        close: Token,
        expected_close: &'static str,
        mut f: impl FnMut(&mut LexIter) -> Result<T, ParseError>,
    ) -> Result<SmallVec<[T; N]>, ParseError> {
        let mut vec: SmallVec<[T; N]> = SmallVec::new();
        if close.probe(iter) {
            return Ok(vec);
        }
        loop {
            vec.push(f(iter)?);
            if Token::Comma.probe(iter) {
                continue;
            }
            close.expect(iter, expected_close)?;
            return Ok(vec);
        }
    }
}

impl Parse for Variable {
    fn parse(tokens: &mut LexIter) -> Result<Variable, ParseError> {
        Token::expect_ident(tokens, "variable name").map(|name| Variable::new(name.into_inner()))
    }
}

/// Numeric literal, with an optional leading minus.
fn parse_number(iter: &mut LexIter, expected: &'static str) -> Result<Number, ParseError> {
    iter.guard(|iter| {
        let neg = Token::Minus.probe(iter);
        let next = next_token(iter, expected)?;
        let span = next.span();
        let n = match next.into_inner() {
            Token::IntLit(i) => Number::Int(i),
            Token::FloatLit(f) => Number::Float(f),
            other => return Err(unexpected(expected, span.with(other))),
        };
        Ok(if neg { negate(n) } else { n })
    })
}

fn negate(n: Number) -> Number {
    match n {
        Number::Int(i) => Number::Int(i.wrapping_neg()),
        Number::Float(f) => Number::Float(-f),
    }
}

impl Parse for Parameter {
    fn parse(tokens: &mut LexIter) -> Result<Parameter, ParseError> {
        const EXPECTED: &str = "string, number or variable";

        let mut peek = tokens.clone();
        match next_token(&mut peek, EXPECTED)?.into_inner() {
            Token::StrLit(s) => {
                *tokens = peek;
                Ok(Parameter::Constant(Constant::Str(s)))
            }
            Token::Ident(name) => {
                *tokens = peek;
                Ok(Parameter::Variable(Variable::new(name)))
            }
            _ => parse_number(tokens, EXPECTED).map(|n| Parameter::Constant(Constant::Num(n))),
        }
    }
}

impl Parse for DefinitionRef {
    fn parse(tokens: &mut LexIter) -> Result<DefinitionRef, ParseError> {
        use Token::*;

        tokens.guard(|iter| {
            let name = Token::expect_ident(iter, "definition reference")?.into_inner();
            OpenParen.expect(iter, "`(`")?;
            let arguments: SmallVec<[_; 4]> =
                Token::comma_smallvec(iter, CloseParen, "`,` or `)`", Parameter::parse)?;
            Ok(DefinitionRef {
                name,
                arguments: arguments.into_vec(),
            })
        })
    }
}

impl Parse for ChartEntry {
    fn parse(tokens: &mut LexIter) -> Result<ChartEntry, ParseError> {
        use Token::*;

        tokens.guard(|iter| {
            OpenParen.expect(iter, "`(` opening a chart entry")?;
            let streams = DefinitionRef::parse(iter)?;
            Comma.expect(iter, "`,`")?;
            let y_axis = DefinitionRef::parse(iter)?;
            CloseParen.expect(iter, "`)` closing a chart entry")?;
            Ok(ChartEntry { streams, y_axis })
        })
    }
}

impl Parse for Expression {
    fn parse(tokens: &mut LexIter) -> Result<Expression, ParseError> {
        tokens.guard(parse_sum)
    }
}

fn binary(name: &str, lhs: Expression, rhs: Expression) -> Expression {
    Expression::FunctionCall {
        name: ItemName::trusted(name),
        args: vec![lhs, rhs],
    }
}

fn parse_sum(iter: &mut LexIter) -> Result<Expression, ParseError> {
    let mut lhs = parse_product(iter)?;
    loop {
        let op = if Token::Plus.probe(iter) {
            "Add"
        } else if Token::Minus.probe(iter) {
            "Sub"
        } else {
            return Ok(lhs);
        };
        let rhs = parse_product(iter)?;
        lhs = binary(op, lhs, rhs);
    }
}

fn parse_product(iter: &mut LexIter) -> Result<Expression, ParseError> {
    let mut lhs = parse_factor(iter)?;
    loop {
        let op = if Token::Star.probe(iter) {
            "Mul"
        } else if Token::Slash.probe(iter) {
            "Div"
        } else {
            return Ok(lhs);
        };
        let rhs = parse_factor(iter)?;
        lhs = binary(op, lhs, rhs);
    }
}

fn parse_factor(iter: &mut LexIter) -> Result<Expression, ParseError> {
    use Token::*;
    const EXPECTED: &str = "expression";

    let next = next_token(iter, EXPECTED)?;
    let span = next.span();
    match next.into_inner() {
        Minus => {
            // Negative literals fold into the constant, anything else is scaled by -1.
            match parse_factor(iter)? {
                Expression::Constant(Constant::Num(n)) => {
                    Ok(Expression::Constant(Constant::Num(negate(n))))
                }
                other => Ok(binary(
                    "Mul",
                    Expression::Constant(Constant::Num(Number::Int(-1))),
                    other,
                )),
            }
        }
        IntLit(i) => Ok(Expression::Constant(Constant::Num(Number::Int(i)))),
        FloatLit(f) => Ok(Expression::Constant(Constant::Num(Number::Float(f)))),
        StrLit(s) => Ok(Expression::Constant(Constant::Str(s))),
        OpenParen => {
            let inner = parse_sum(iter)?;
            CloseParen.expect(iter, "`)`")?;
            Ok(inner)
        }
        Ident(name) => {
            if !OpenParen.probe(iter) {
                return Ok(Expression::Variable(Variable::new(name)));
            }
            let args: SmallVec<[_; 4]> =
                Token::comma_smallvec(iter, CloseParen, "`,` or `)`", parse_sum)?;
            let args = args.into_vec();
            if function::is_stock_function(&name) {
                Ok(Expression::FunctionCall { name, args })
            } else {
                Ok(Expression::ReducerCall { name, args })
            }
        }
        other => Err(unexpected(EXPECTED, span.with(other))),
    }
}

fn parse_number_type(iter: &mut LexIter) -> Result<NumberType, ParseError> {
    let s = Token::expect_str(iter, "\"integer\" or \"double\"")?;
    let (s, span) = s.split();
    match s.to_ascii_lowercase().as_str() {
        "integer" => Ok(NumberType::Integer),
        "double" => Ok(NumberType::Double),
        _ => Err(ParseError::NumberType { found: s, span }),
    }
}

impl Parse for DefinitionAst {
    fn parse(tokens: &mut LexIter) -> Result<DefinitionAst, ParseError> {
        use Token::*;

        tokens.guard(|iter| {
            const KEYWORD: &str = "`streams`, `chart`, `yaxis` or `report`";
            let keyword = next_token(iter, KEYWORD)?;
            let kind = match *keyword {
                Streams => Some(DefinitionKind::Streams),
                Chart => Some(DefinitionKind::Chart),
                YAxis => Some(DefinitionKind::YAxis),
                Report => Some(DefinitionKind::Report),
                _ => None,
            };
            let Some(kind) = kind else {
                return Err(unexpected(KEYWORD, keyword));
            };

            let name = Token::expect_ident(iter, "definition name")?.into_inner();
            OpenParen.expect(iter, "`(`")?;
            let variables: SmallVec<[_; 4]> =
                Token::comma_smallvec(iter, CloseParen, "`,` or `)`", Variable::parse)?;
            let variables = variables.into_vec();
            Assign.expect(iter, "`=`")?;
            OpenBrace.expect(iter, "`{`")?;

            let ast = match kind {
                DefinitionKind::Streams => {
                    let description = Token::expect_str(iter, "description string")?.into_inner();
                    Comma.expect(iter, "`,`")?;
                    let expression = Expression::parse(iter)?;
                    DefinitionAst::Streams(Arc::new(StreamsDefinition {
                        name,
                        variables,
                        description,
                        expression,
                    }))
                }
                DefinitionKind::Chart => {
                    let title = Token::expect_str(iter, "chart title")?.into_inner();
                    let mut entries = Vec::new();
                    while Comma.probe(iter) {
                        entries.push(ChartEntry::parse(iter)?);
                    }
                    DefinitionAst::Chart(Arc::new(ChartDefinition {
                        name,
                        variables,
                        title,
                        entries,
                    }))
                }
                DefinitionKind::YAxis => {
                    let label = Parameter::parse(iter)?;
                    let mut number_type = NumberType::Double;
                    let mut bounds = None;
                    if Comma.probe(iter) {
                        number_type = parse_number_type(iter)?;
                        if Comma.probe(iter) {
                            let lower = Parameter::parse(iter)?;
                            Comma.expect(iter, "`,`")?;
                            let upper = Parameter::parse(iter)?;
                            bounds = Some((lower, upper));
                        }
                    }
                    DefinitionAst::YAxis(Arc::new(YAxisDefinition {
                        name,
                        variables,
                        label,
                        number_type,
                        bounds,
                    }))
                }
                DefinitionKind::Report => {
                    let title = Token::expect_str(iter, "report title")?.into_inner();
                    let mut charts = Vec::new();
                    while Comma.probe(iter) {
                        charts.push(DefinitionRef::parse(iter)?);
                    }
                    DefinitionAst::Report(Arc::new(ReportDefinition {
                        name,
                        variables,
                        title,
                        charts,
                    }))
                }
            };

            CloseBrace.expect(iter, "`,` or `}`")?;
            Semicolon.expect(iter, "`;`")?;
            Ok(ast)
        })
    }
}

/// Parse source text holding exactly one definition.
pub fn parse_definition(source: &str) -> Result<DefinitionAst, ParseError> {
    let mut iter = Token::lexer(source).spanned();
    let ast = DefinitionAst::parse(&mut iter)?;
    match iter.next() {
        None => Ok(ast),
        Some((_, range)) => Err(ParseError::TrailingInput { span: range.into() }),
    }
}

/// Parse source text holding any number of definitions. A definition that
/// fails to parse is reported and skipped up to its terminating `;` or the
/// keyword of the next definition, so the following definitions are still parsed.
pub fn parse_definitions(source: &str) -> Vec<Result<Spanned<DefinitionAst>, ParseError>> {
    let mut iter = Token::lexer(source).spanned();
    let mut out = Vec::new();

    while iter.clone().next().is_some() {
        match DefinitionAst::parse_span(&mut iter) {
            Ok(ast) => out.push(Ok(ast)),
            Err(e) => {
                out.push(Err(e));
                skip_definition(&mut iter);
            }
        }
    }

    out
}

/// Skip the first token of a broken definition and everything up to the
/// next `;` (consumed) or definition keyword (kept).
fn skip_definition(iter: &mut LexIter) {
    iter.next();
    while let Some((token, _)) = iter.clone().next() {
        match token {
            Ok(Token::Streams | Token::Chart | Token::YAxis | Token::Report) => return,
            Ok(Token::Semicolon) => {
                iter.next();
                return;
            }
            _ => {
                iter.next();
            }
        }
    }
}
