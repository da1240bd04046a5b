use crate::ast::{Expression, nil};
use crate::lexer::Token;
use crate::{MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Parser settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParseConfig {
    /// Deepest list nesting accepted before [`ParseErrorKind::TooDeeplyNested`]
    pub max_depth: usize,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

/// Append `expr` to the accumulator of the current nesting level
///
/// Appending to nothing yields `expr` itself, appending to a list pushes onto it, and
/// appending to a bare atom pairs the two into a new list. The last rule is what lets
/// a run of top-level atoms coalesce into a list.
fn append(expr: Expression, node: Option<Expression>) -> Expression {
    match node {
        None => expr,
        Some(Expression::List(mut elements)) => {
            elements.push(expr);
            Expression::List(elements)
        }
        Some(atom @ Expression::Atom(_)) => Expression::List(vec![atom, expr]),
    }
}

/// Parse one nesting level, starting from the accumulator `node`
///
/// Returns the level's expression and the tokens following it. A `)` at the top level
/// has nothing to close, so it is left at the front of the returned tokens.
fn parse_level<'t>(
    mut tokens: &'t [Token],
    mut node: Option<Expression>,
    depth: usize,
    config: &ParseConfig,
) -> Result<(Expression, &'t [Token]), ParseError> {
    if depth > config.max_depth {
        return Err(ParseError::from_message(
            ParseErrorKind::TooDeeplyNested,
            format!(
                "Expression too deeply nested (max depth: {})",
                config.max_depth
            ),
        ));
    }

    while let Some((token, tail)) = tokens.split_first() {
        match token {
            Token::LeftParen => {
                let (expr, rest) = parse_level(tail, Some(nil()), depth + 1, config)?;
                tokens = rest;
                node = Some(append(expr, Some(node.unwrap_or_else(nil))));
            }
            Token::RightParen if depth == 0 => break,
            Token::RightParen => {
                // nested levels always start from an empty list, so a node exists here
                return Ok((node.unwrap_or_else(nil), tail));
            }
            Token::Symbol(symbol) => {
                tokens = tail;
                node = Some(append(Expression::Atom(symbol.clone()), node));
            }
        }
    }

    if depth > 0 {
        tracing::debug!(depth, "input ended inside an open list");
    }

    let expr = match node {
        Some(Expression::List(mut elements)) if elements.len() == 1 => elements.remove(0),
        Some(expr) => expr,
        None => nil(),
    };
    Ok((expr, tokens))
}

/// Parse tokens into an expression, returning the tokens left unconsumed.
///
/// Parsing stops at the end of input or at a `)` with no matching `(`; in the latter
/// case the returned tokens start with that `)`. A single top-level form parses to
/// itself, several top-level forms parse to the list of forms, and no forms parse to
/// nil.
pub fn parse(tokens: &[Token]) -> Result<(Expression, &[Token]), ParseError> {
    parse_with_config(tokens, &ParseConfig::default())
}

/// [`parse`] with explicit settings
pub fn parse_with_config<'t>(
    tokens: &'t [Token],
    config: &ParseConfig,
) -> Result<(Expression, &'t [Token]), ParseError> {
    parse_level(tokens, None, 0, config)
}

/// Parse the whole token sequence into a single expression.
///
/// Fails with [`ParseErrorKind::UnmatchedClose`] if a `)` has no matching `(`.
/// Input that ends inside an open list is accepted as written so far.
pub fn parse_all(tokens: &[Token]) -> Result<Expression, ParseError> {
    parse_all_with_config(tokens, &ParseConfig::default())
}

/// [`parse_all`] with explicit settings
pub fn parse_all_with_config(
    tokens: &[Token],
    config: &ParseConfig,
) -> Result<Expression, ParseError> {
    let (expr, rest) = parse_with_config(tokens, config)?;
    if rest.is_empty() {
        Ok(expr)
    } else {
        Err(ParseError::unmatched_close(tokens.len() - rest.len()))
    }
}
