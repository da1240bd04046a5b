//! This module defines the expression tree shared by the parser and the evaluator.
//! A [`Symbol`] is a leaf payload (integer, real or identifier) and an [`Expression`]
//! is either an atom holding one symbol or a list of expressions. The empty list is
//! the canonical nil value. Ergonomic helpers such as [`int`], [`real`], [`ident`] and
//! [`nil`] plus `From` conversions from Rust literals, arrays and vectors make trees easy
//! to build in code and tests. `Display` produces the textual rendering a front end
//! prints for a result.

/// Type alias for integer values in the interpreter
pub type IntegerType = i64;

/// Type alias for real values in the interpreter
pub type RealType = f64;

/// Leaf payload of an expression tree
///
/// Equality is structural and exact: `Integer(1)` and `Real(1.0)` are different
/// symbols, and reals compare with `==` without tolerance.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    Integer(IntegerType),
    Real(RealType),
    Identifier(String),
}

/// Core tree type in the interpreter
///
/// Trees are immutable values. Every transformation builds a new tree; nothing is
/// shared or mutated in place.
///
/// To build a tree, use the ergonomic helper functions:
/// - `int(42)`, `real(1.5)` for numbers, `ident("name")` for identifiers, `nil()` for
///   the empty list
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![ident("op"), int(42)])` for mixed lists
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Atom(Symbol),
    List(Vec<Expression>),
}

impl Expression {
    /// Check if an expression is nil (the empty list)
    pub fn is_nil(&self) -> bool {
        matches!(self, Expression::List(list) if list.is_empty())
    }

    /// The identifier name of an identifier atom
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expression::Atom(Symbol::Identifier(name)) => Some(name),
            _ => None,
        }
    }

    /// The elements of a list
    pub fn as_list(&self) -> Option<&[Expression]> {
        match self {
            Expression::List(elements) => Some(elements),
            Expression::Atom(_) => None,
        }
    }
}

// From trait implementations - enables .into() conversion
impl From<Symbol> for Expression {
    fn from(symbol: Symbol) -> Self {
        Expression::Atom(symbol)
    }
}

impl From<&str> for Expression {
    fn from(name: &str) -> Self {
        Expression::Atom(Symbol::Identifier(name.to_owned()))
    }
}

impl From<String> for Expression {
    fn from(name: String) -> Self {
        Expression::Atom(Symbol::Identifier(name))
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Expression {
            fn from(n: $int_type) -> Self {
                Expression::Atom(Symbol::Integer(IntegerType::from(n)))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(IntegerType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl From<f32> for Expression {
    fn from(r: f32) -> Self {
        Expression::Atom(Symbol::Real(RealType::from(r)))
    }
}

impl From<RealType> for Expression {
    fn from(r: RealType) -> Self {
        Expression::Atom(Symbol::Real(r))
    }
}

impl<T: Into<Expression>> From<Vec<T>> for Expression {
    fn from(v: Vec<T>) -> Self {
        Expression::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Expression>, const N: usize> From<[T; N]> for Expression {
    fn from(arr: [T; N]) -> Self {
        Expression::List(arr.into_iter().map(Into::into).collect())
    }
}

/// Helper function for creating integer atoms
pub fn int(n: IntegerType) -> Expression {
    Expression::Atom(Symbol::Integer(n))
}

/// Helper function for creating real atoms
pub fn real(r: RealType) -> Expression {
    Expression::Atom(Symbol::Real(r))
}

/// Helper function for creating identifier atoms
/// Accepts both &str and String
pub fn ident<S: AsRef<str>>(name: S) -> Expression {
    Expression::Atom(Symbol::Identifier(name.as_ref().to_owned()))
}

/// Helper function for creating expressions from anything convertible
pub fn val<T: Into<Expression>>(value: T) -> Expression {
    value.into()
}

/// Helper function for creating the empty list (nil)
pub fn nil() -> Expression {
    Expression::List(vec![])
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::Integer(n) => write!(f, "{n}"),
            // integral reals keep a ".0" so that they read back as reals
            Symbol::Real(r) if r.is_finite() && r.fract() == 0.0 => write!(f, "{r:.1}"),
            Symbol::Real(r) => write!(f, "{r}"),
            Symbol::Identifier(name) => write!(f, "{name}"),
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Atom(symbol) => write!(f, "{symbol}"),
            Expression::List(elements) if elements.is_empty() => write!(f, "nil"),
            Expression::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
        }
    }
}
