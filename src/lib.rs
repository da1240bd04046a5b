//! SExpr - a minimal embeddable symbolic-expression language
//!
//! This crate provides a tiny Lisp-like scripting layer for host programs: a tokenizer,
//! a recursive-descent parser, and a tree-walking evaluator over a small dynamic
//! environment.
//!
//! ```text
//! (+ 1 2)                      ; binary arithmetic
//! (quote (a b c))              ; literal data
//! (define x 1)                 ; value binding
//! (define (f x) (* x x))       ; procedure binding
//! (lambda (x) x) 1             ; anonymous procedure applied by the next pass
//! ```
//!
//! ## Evaluation model
//!
//! Evaluation never fails. Every arity mismatch, type mismatch or unresolved identifier
//! produces the empty list, which doubles as `nil`, the "no result" value. When a list
//! is evaluated as a sequence of forms, nil results are dropped and only the surviving
//! results are carried forward, so a program such as
//!
//! ```text
//! (define (square x) (* x x))
//! (square 4)
//! ```
//!
//! evaluates to `16`.
//!
//! Environments have value semantics: each procedure call works on its own copy, and
//! bindings made inside a call are not visible to the caller.
//!
//! ## Modules
//!
//! - `ast`: symbols, expressions and their textual rendering
//! - `lexer`: source text to tokens
//! - `parser`: tokens to expression trees
//! - `evaluator`: environments, bindings and the evaluation rules
//! - `builtinops`: registry of the primitive procedures

use std::fmt;

/// Maximum list nesting accepted by the parser
/// Deeper input is rejected with [`ParseErrorKind::TooDeeplyNested`]
pub const MAX_PARSE_DEPTH: usize = 64;

/// Maximum evaluation depth
/// Set well above the parse depth so that nested procedure applications have room;
/// evaluation that reaches it yields nil instead of overflowing the stack
pub const MAX_EVAL_DEPTH: usize = 256;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// A closing parenthesis with no matching opening parenthesis
    UnmatchedClose,
    /// List nesting exceeded the configured maximum parse depth
    TooDeeplyNested,
}

/// A structured error describing why a token sequence could not be parsed.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Index of the offending token in the parsed token sequence, if known
    pub position: Option<usize>,
    /// The problematic token, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        position: Option<usize>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            position,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no location
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    pub(crate) fn unmatched_close(position: usize) -> Self {
        Self::new(
            ParseErrorKind::UnmatchedClose,
            "Unmatched ')'",
            Some(position),
            Some(")".to_owned()),
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ParseError: {}", self.message)?;
        if let Some(position) = self.position {
            write!(f, " at token {position}")?;
        }
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod lexer;
pub mod parser;

pub use ast::{Expression, Symbol};
pub use evaluator::{
    Binding, Environment, Procedure, ProcedureKind, default_environment, eval, evaluate,
};
pub use parser::ParseConfig;

/// Tokenize and parse `text`, reporting malformed input.
pub fn try_parse_and_build(text: &str) -> Result<Expression, ParseError> {
    let tokens = lexer::tokenize(text);
    parser::parse_all(&tokens)
}

/// Tokenize and parse `text`.
///
/// This never fails. A `)` with no matching `(` ends the parse, and the forms read
/// before it are kept. Input nested deeper than [`MAX_PARSE_DEPTH`] degrades to nil.
/// Both cases are logged; use [`try_parse_and_build`] to see the [`ParseError`].
pub fn parse_and_build(text: &str) -> Expression {
    let tokens = lexer::tokenize(text);
    match parser::parse(&tokens) {
        Ok((expr, rest)) => {
            if !rest.is_empty() {
                let err = ParseError::unmatched_close(tokens.len() - rest.len());
                tracing::warn!(%err, "ignoring input after unmatched ')'");
            }
            expr
        }
        Err(err) => {
            tracing::warn!(%err, "input rejected by parser, using nil");
            ast::nil()
        }
    }
}
