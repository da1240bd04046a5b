//! Built-in operations registry.
//!
//! Every procedure in a [`default_environment`](crate::default_environment) comes from
//! this registry. Each entry has an identifier, a [`ProcedureKind`] and a fixed arity.
//!
//! ```text
//! (quote (a b))        ; special form, returns its argument as written
//! (define x 1)         ; special form, binds a value
//! (define (f x) x)     ; special form, binds a procedure
//! (lambda (x) x)       ; special form, binds a procedure under a synthetic name
//! (+ 1 2)              ; arithmetic on two numbers of the same kind
//! ```
//!
//! ## Functions vs Special Forms
//!
//! - **Applicative** procedures get their arguments evaluated first (`+ - * /`)
//! - **Special forms** get their arguments as written (`quote`, `define`, `lambda`)
//!
//! ## No Error Channel
//!
//! Builtins never fail. A call with the wrong number of arguments, operands that are
//! not numbers, operands of different numeric kinds, integer overflow and division by
//! zero all produce nil. There is no widening: `(+ 1 2.0)` is nil.

use crate::MAX_EVAL_DEPTH;
use crate::ast::{Expression, IntegerType, RealType, Symbol, int, nil, real};
use crate::evaluator::{
    Environment, Procedure, ProcedureKind, eval_define, eval_lambda, eval_quote,
    eval_with_depth_tracking,
};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Signature of a builtin implementation
pub type BuiltinFn = fn(&[Expression], &mut Environment, usize) -> Expression;

/// Definition of a built-in operation
#[derive(Debug, Clone)]
pub struct BuiltinOp {
    /// The identifier the operation is bound to
    pub id: &'static str,
    pub kind: ProcedureKind,
    /// Exact number of arguments
    pub arity: usize,
    pub func: BuiltinFn,
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // The id uniquely identifies an operation
        self.id == other.id
    }
}

impl BuiltinOp {
    pub fn is_special_form(&self) -> bool {
        self.kind == ProcedureKind::SpecialForm
    }

    /// Wrap the operation as a procedure that yields nil on an arity mismatch
    pub fn to_procedure(&self) -> Procedure {
        let (id, arity, func) = (self.id, self.arity, self.func);
        Procedure::new(id, self.kind, move |args, env, depth| {
            if args.len() == arity {
                func(args, env, depth)
            } else {
                tracing::debug!(
                    op = id,
                    expected = arity,
                    got = args.len(),
                    "arity mismatch"
                );
                nil()
            }
        })
    }
}

//
// Builtin Function Implementations
//

/// Reduce an operand to a numeric symbol.
///
/// Numbers are taken as is. An identifier must be bound to a value, which is resolved
/// in turn. Any other non-empty list is evaluated in the caller's environment, where it
/// may install bindings, and the result resolved unless evaluation left it unchanged.
fn resolve_operand(expr: &Expression, env: &mut Environment, depth: usize) -> Option<Symbol> {
    if depth >= MAX_EVAL_DEPTH {
        tracing::warn!(max = MAX_EVAL_DEPTH, %expr, "operand resolution too deep");
        return None;
    }

    match expr {
        Expression::Atom(symbol @ (Symbol::Integer(_) | Symbol::Real(_))) => Some(symbol.clone()),
        Expression::Atom(Symbol::Identifier(name)) => {
            let value = env.value(name).cloned()?;
            resolve_operand(&value, env, depth + 1)
        }
        Expression::List(elements) if elements.is_empty() => None,
        Expression::List(_) => {
            let value = eval_with_depth_tracking(expr, env, depth + 1);
            if value == *expr {
                None
            } else {
                resolve_operand(&value, env, depth + 1)
            }
        }
    }
}

fn binary_arithmetic(
    op: &'static str,
    args: &[Expression],
    env: &mut Environment,
    depth: usize,
    int_op: fn(IntegerType, IntegerType) -> Option<IntegerType>,
    real_op: fn(RealType, RealType) -> Option<RealType>,
) -> Expression {
    let [lhs, rhs] = args else {
        return nil();
    };

    let result = match (
        resolve_operand(lhs, env, depth),
        resolve_operand(rhs, env, depth),
    ) {
        (Some(Symbol::Integer(a)), Some(Symbol::Integer(b))) => int_op(a, b).map(int),
        (Some(Symbol::Real(a)), Some(Symbol::Real(b))) => real_op(a, b).map(real),
        _ => {
            tracing::debug!(op, %lhs, %rhs, "operands are not numbers of one kind");
            return nil();
        }
    };

    result.unwrap_or_else(|| {
        tracing::debug!(op, %lhs, %rhs, "no arithmetic result (overflow or division by zero)");
        nil()
    })
}

// Macro to generate the arithmetic builtins
macro_rules! arithmetic_op {
    ($name:ident, $op:literal, $int_op:expr, $real_op:expr) => {
        fn $name(args: &[Expression], env: &mut Environment, depth: usize) -> Expression {
            binary_arithmetic($op, args, env, depth, $int_op, $real_op)
        }
    };
}

arithmetic_op!(builtin_add, "+", IntegerType::checked_add, |a, b| Some(a + b));
arithmetic_op!(builtin_sub, "-", IntegerType::checked_sub, |a, b| Some(a - b));
arithmetic_op!(builtin_mul, "*", IntegerType::checked_mul, |a, b| Some(a * b));
// checked_div covers both a zero divisor and MIN / -1
arithmetic_op!(builtin_div, "/", IntegerType::checked_div, |a, b| {
    (b != 0.0).then(|| a / b)
});

/// Global registry of all built-in operations.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    vec![
        // Special forms for language constructs
        BuiltinOp {
            id: "quote",
            kind: ProcedureKind::SpecialForm,
            arity: 1,
            func: eval_quote,
        },
        BuiltinOp {
            id: "define",
            kind: ProcedureKind::SpecialForm,
            arity: 2,
            func: eval_define,
        },
        BuiltinOp {
            id: "lambda",
            kind: ProcedureKind::SpecialForm,
            arity: 2,
            func: eval_lambda,
        },
        // Arithmetic operations
        BuiltinOp {
            id: "+",
            kind: ProcedureKind::Applicative,
            arity: 2,
            func: builtin_add,
        },
        BuiltinOp {
            id: "-",
            kind: ProcedureKind::Applicative,
            arity: 2,
            func: builtin_sub,
        },
        BuiltinOp {
            id: "*",
            kind: ProcedureKind::Applicative,
            arity: 2,
            func: builtin_mul,
        },
        BuiltinOp {
            id: "/",
            kind: ProcedureKind::Applicative,
            arity: 2,
            func: builtin_div,
        },
    ]
});

/// Lazy static map from id to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| {
        let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
        ops.iter().map(|op| (op.id, op)).collect()
    });

/// Get all builtin operations
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by its identifier
pub fn find_builtin_op(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}
