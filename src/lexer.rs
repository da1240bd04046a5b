use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::{map, value},
    multi::many0,
    sequence::preceded,
};

use crate::ast::{IntegerType, RealType, Symbol};

/// A lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftParen,
    RightParen,
    Symbol(Symbol),
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::LeftParen => write!(f, "("),
            Token::RightParen => write!(f, ")"),
            Token::Symbol(symbol) => write!(f, "{symbol}"),
        }
    }
}

fn is_delimiter(c: char) -> bool {
    c == '(' || c == ')' || c.is_whitespace()
}

/// Classify a word fragment: integer first, then real, then identifier
fn classify_word(word: &str) -> Token {
    if let Ok(n) = word.parse::<IntegerType>() {
        return Token::Symbol(Symbol::Integer(n));
    }

    // f64 parsing also accepts "inf", "nan" and "infinity"; those stay identifiers
    if word.chars().any(|c| c.is_ascii_digit())
        && let Ok(r) = word.parse::<RealType>()
    {
        return Token::Symbol(Symbol::Real(r));
    }

    Token::Symbol(Symbol::Identifier(word.to_owned()))
}

/// Parse a maximal run of non-delimiter characters
fn parse_word(input: &str) -> IResult<&str, Token> {
    map(take_while1(|c: char| !is_delimiter(c)), classify_word).parse(input)
}

/// Parse one token after any leading whitespace
fn parse_token(input: &str) -> IResult<&str, Token> {
    preceded(
        take_while(|c: char| c.is_whitespace()),
        alt((
            value(Token::LeftParen, char('(')),
            value(Token::RightParen, char(')')),
            parse_word,
        )),
    )
    .parse(input)
}

/// Convert source text into a flat token sequence.
///
/// Every `(` and `)` is its own token, whitespace only separates, and every other run
/// of characters becomes one symbol token. This never fails; text with no tokens
/// yields an empty sequence.
pub fn tokenize(text: &str) -> Vec<Token> {
    // parse_token accepts any non-whitespace character, so many0 only stops at
    // trailing whitespace or end of input
    many0(parse_token)
        .parse(text)
        .map(|(_, tokens)| tokens)
        .unwrap_or_default()
}
