use logos::Logos;

use crate::domain::ItemName;

/// Lexical element of the definition language.
#[derive(Debug, Logos, PartialEq, Clone)]
#[logos(skip r"([ \t\r\n\f]+|//[^\n]*)")]
pub enum Token {
    #[token("streams", priority = 100)]
    Streams,

    #[token("chart", priority = 100)]
    Chart,

    #[token("yaxis", priority = 100)]
    YAxis,

    #[token("report", priority = 100)]
    Report,

    #[regex("[a-zA-Z_][a-zA-Z0-9_]*", lex_to_item_name)]
    Ident(ItemName),

    #[regex("[0-9]+", lex_int)]
    IntLit(i64),

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+", lex_float)]
    FloatLit(f64),

    #[regex(r#""([^\\"]|\\.)*""#, lex_to_str_lit)]
    StrLit(String),

    #[token("(")]
    OpenParen,

    #[token(")")]
    CloseParen,

    #[token("{")]
    OpenBrace,

    #[token("}")]
    CloseBrace,

    #[token(",")]
    Comma,

    #[token(";")]
    Semicolon,

    #[token("=")]
    Assign,

    #[token("+")]
    Plus,

    #[token("-")]
    Minus,

    #[token("*")]
    Star,

    #[token("/")]
    Slash,
}

/// Identifiers longer than an [ItemName] allows are rejected as unknown tokens.
fn lex_to_item_name(lex: &mut logos::Lexer<Token>) -> Option<ItemName> {
    ItemName::new(lex.slice().to_string()).ok()
}

/// Literals that do not fit into `i64` are rejected as unknown tokens.
fn lex_int(lex: &mut logos::Lexer<Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

fn lex_float(lex: &mut logos::Lexer<Token>) -> Option<f64> {
    lex.slice().parse().ok()
}

fn lex_to_str_lit(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();

    if cfg!(debug_assertions) {
        // Check start and end to be quotes.
        assert_eq!(slice.chars().next(), Some('"'));
        assert_eq!(slice.chars().last(), Some('"'));
    }

    let unquoted = &slice[1..slice.len() - 1];

    // Apply escape sequences. Unknown escapes keep the escaped character.
    let mut out = String::with_capacity(unquoted.len());
    let mut chars = unquoted.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Token::*;

        match self {
            Streams => f.write_str("`streams`"),
            Chart => f.write_str("`chart`"),
            YAxis => f.write_str("`yaxis`"),
            Report => f.write_str("`report`"),
            Ident(name) => write!(f, "identifier `{name}`"),
            IntLit(i) => write!(f, "number `{i}`"),
            FloatLit(v) => write!(f, "number `{v:?}`"),
            StrLit(s) => write!(f, "string \"{s}\""),
            OpenParen => f.write_str("`(`"),
            CloseParen => f.write_str("`)`"),
            OpenBrace => f.write_str("`{`"),
            CloseBrace => f.write_str("`}`"),
            Comma => f.write_str("`,`"),
            Semicolon => f.write_str("`;`"),
            Assign => f.write_str("`=`"),
            Plus => f.write_str("`+`"),
            Minus => f.write_str("`-`"),
            Star => f.write_str("`*`"),
            Slash => f.write_str("`/`"),
        }
    }
}
