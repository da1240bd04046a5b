//! Evaluator for the expression language.
//!
//! An [`Environment`] maps identifiers to [`Binding`]s, either plain values or
//! [`Procedure`]s. [`evaluate`] takes an environment by value and hands back the one it
//! produced, while [`eval`] works on a borrowed environment in place. Evaluation never
//! fails: anything without a result is nil, and nesting deeper than
//! [`MAX_EVAL_DEPTH`](crate::MAX_EVAL_DEPTH) is cut off with a warning.
//!
//! The special forms `quote`, `define` and `lambda` live here as well, since they
//! manipulate environments directly. The arithmetic builtins are in
//! [`builtinops`](crate::builtinops).

use crate::MAX_EVAL_DEPTH;
use crate::ast::{Expression, Symbol, ident, nil};
use crate::builtinops::get_builtin_ops;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Signature shared by every callable binding: arguments, the caller's environment
/// and the current evaluation depth
pub type ProcedureFn = dyn Fn(&[Expression], &mut Environment, usize) -> Expression;

/// How a procedure receives its arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    /// Arguments are passed exactly as written
    SpecialForm,
    /// Arguments are evaluated left to right before the call
    Applicative,
}

/// A callable binding
#[derive(Clone)]
pub struct Procedure {
    id: String,
    kind: ProcedureKind,
    func: Rc<ProcedureFn>,
}

impl Procedure {
    pub fn new<F>(id: impl Into<String>, kind: ProcedureKind, func: F) -> Self
    where
        F: Fn(&[Expression], &mut Environment, usize) -> Expression + 'static,
    {
        Procedure {
            id: id.into(),
            kind,
            func: Rc::new(func),
        }
    }

    /// Name the procedure was created under
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ProcedureKind {
        self.kind
    }

    pub fn is_special_form(&self) -> bool {
        self.kind == ProcedureKind::SpecialForm
    }

    /// Invoke the procedure on `args`, which must already be evaluated for
    /// applicative procedures
    pub fn call(&self, args: &[Expression], env: &mut Environment, depth: usize) -> Expression {
        (self.func)(args, env, depth)
    }
}

impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Procedure")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Procedures compare by name and kind only.
///
/// Closures can't be compared, so two procedures defined under the same name with
/// different bodies are equal. This is meant for comparing [`Binding`]s in tests.
impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.kind == other.kind
    }
}

/// What an identifier is bound to
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Value(Expression),
    Procedure(Procedure),
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(value) => write!(f, "{value}"),
            Binding::Procedure(procedure) if procedure.is_special_form() => {
                write!(f, "#<special form {}>", procedure.id)
            }
            Binding::Procedure(procedure) => write!(f, "#<procedure {}>", procedure.id),
        }
    }
}

/// Environment for identifier bindings
///
/// Environments are values: cloning is O(1) thanks to the persistent map, and a clone
/// evolves independently of the original. The only state shared between clones is the
/// counter behind [`Environment::gensym`], so synthetic names never collide within one
/// session.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    bindings: im::HashMap<String, Binding>,
    gensym: Rc<Cell<u64>>,
}

impl Environment {
    /// An environment with no bindings at all; see [`default_environment`] for one
    /// with the builtins installed
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// The procedure bound to `name`, if `name` is bound to one
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        match self.bindings.get(name) {
            Some(Binding::Procedure(procedure)) => Some(procedure),
            _ => None,
        }
    }

    /// The value bound to `name`, if `name` is bound to one
    pub fn value(&self, name: &str) -> Option<&Expression> {
        match self.bindings.get(name) {
            Some(Binding::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Bind `name`, replacing any previous binding
    pub fn define(&mut self, name: impl Into<String>, binding: Binding) {
        self.bindings.insert(name.into(), binding);
    }

    pub fn define_value(&mut self, name: impl Into<String>, value: Expression) {
        self.define(name, Binding::Value(value));
    }

    /// Register a host procedure under `name`.
    ///
    /// Applicative procedures receive their arguments evaluated, special forms receive
    /// them as written. Either way the procedure gets the caller's environment and the
    /// current depth, and must not fail: return nil for "no result".
    ///
    /// # Example
    /// ```
    /// use sexpr::ast::{Expression, Symbol, int, nil};
    /// use sexpr::{ProcedureKind, default_environment, evaluate, parse_and_build};
    ///
    /// let mut env = default_environment();
    /// env.register_procedure("negate", ProcedureKind::Applicative, |args, _env, _depth| {
    ///     match args {
    ///         [Expression::Atom(Symbol::Integer(n))] => n.checked_neg().map_or_else(nil, int),
    ///         _ => nil(),
    ///     }
    /// });
    ///
    /// let (result, _) = evaluate(&parse_and_build("(negate 5)"), env);
    /// assert_eq!(result, int(-5));
    /// ```
    pub fn register_procedure<F>(&mut self, name: &str, kind: ProcedureKind, func: F)
    where
        F: Fn(&[Expression], &mut Environment, usize) -> Expression + 'static,
    {
        self.define(name, Binding::Procedure(Procedure::new(name, kind, func)));
    }

    /// A fresh identifier of the form `$<n>` that is not bound in this environment
    pub fn gensym(&self) -> String {
        loop {
            let n = self.gensym.get();
            self.gensym.set(n + 1);
            let name = format!("${n}");
            if !self.bindings.contains_key(&name) {
                return name;
            }
        }
    }

    /// Get all bindings in this environment
    /// Returns a Vec of (name, binding) pairs sorted by name
    pub fn get_all_bindings(&self) -> Vec<(String, Binding)> {
        let mut result: Vec<_> = self
            .bindings
            .iter()
            .map(|(name, binding)| (name.clone(), binding.clone()))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

/// Evaluate `expr` in `environment`, returning the result and the environment as
/// updated by any bindings the evaluation installed
pub fn evaluate(expr: &Expression, environment: Environment) -> (Expression, Environment) {
    let mut env = environment;
    let result = eval(expr, &mut env);
    (result, env)
}

/// Evaluate an expression in place
pub fn eval(expr: &Expression, env: &mut Environment) -> Expression {
    eval_with_depth_tracking(expr, env, 0)
}

/// Evaluate an expression with depth tracking to prevent stack overflow
pub(crate) fn eval_with_depth_tracking(
    expr: &Expression,
    env: &mut Environment,
    depth: usize,
) -> Expression {
    if depth >= MAX_EVAL_DEPTH {
        tracing::warn!(
            max = MAX_EVAL_DEPTH,
            "evaluation depth limit reached, yielding nil"
        );
        return nil();
    }

    match expr {
        // A bound value is returned as is, never re-evaluated. Unbound identifiers and
        // identifiers naming procedures evaluate to themselves.
        Expression::Atom(Symbol::Identifier(name)) => match env.value(name) {
            Some(value) => value.clone(),
            None => expr.clone(),
        },
        Expression::Atom(_) => expr.clone(),
        Expression::List(elements) => eval_list(elements, env, depth),
    }
}

fn eval_list(elements: &[Expression], env: &mut Environment, depth: usize) -> Expression {
    let Some((head, rest)) = elements.split_first() else {
        return nil();
    };

    if let Some(name) = head.as_identifier()
        && let Some(procedure) = env.procedure(name).cloned()
    {
        return apply(&procedure, rest, env, depth);
    }

    eval_sequence(elements, env, depth)
}

fn apply(
    procedure: &Procedure,
    rest: &[Expression],
    env: &mut Environment,
    depth: usize,
) -> Expression {
    tracing::trace!(procedure = procedure.id(), args = rest.len(), "apply");
    match procedure.kind() {
        ProcedureKind::SpecialForm => procedure.call(rest, env, depth + 1),
        ProcedureKind::Applicative => {
            let args: Vec<Expression> = rest
                .iter()
                .map(|arg| eval_with_depth_tracking(arg, env, depth + 1))
                .collect();
            procedure.call(&args, env, depth + 1)
        }
    }
}

/// Evaluate a list whose head is not a procedure as a sequence of forms.
///
/// Nil results are dropped. A single survivor is evaluated once more, so that for
/// example a lambda's synthetic name followed by its arguments gets applied on the
/// next pass. A list that comes back unchanged is returned as is.
fn eval_sequence(elements: &[Expression], env: &mut Environment, depth: usize) -> Expression {
    let results: Vec<Expression> = elements
        .iter()
        .map(|element| eval_with_depth_tracking(element, env, depth + 1))
        .filter(|result| !result.is_nil())
        .collect();

    if let [single] = results.as_slice() {
        return eval_with_depth_tracking(single, env, depth + 1);
    }
    if results.is_empty() {
        return nil();
    }
    if results.as_slice() == elements {
        return Expression::List(results);
    }
    eval_with_depth_tracking(&Expression::List(results), env, depth + 1)
}

/// Build the procedure installed by `(define (name params...) body)` and `lambda`
///
/// Parameters are bound to arguments pairwise inside a copy of the caller's
/// environment; surplus parameters stay unbound and surplus arguments are ignored.
fn user_procedure(id: &str, params: &[Expression], body: &Expression) -> Procedure {
    let params = params.to_vec();
    let body = body.clone();
    Procedure::new(id, ProcedureKind::Applicative, move |args, env, depth| {
        let mut scope = env.clone();
        for (param, arg) in params.iter().zip(args) {
            if let Some(name) = param.as_identifier() {
                scope.define_value(name, arg.clone());
            }
        }
        eval_with_depth_tracking(&body, &mut scope, depth)
    })
}

/// Evaluate quote special form
pub(crate) fn eval_quote(
    args: &[Expression],
    _env: &mut Environment,
    _depth: usize,
) -> Expression {
    match args {
        [expr] => expr.clone(),
        _ => nil(),
    }
}

/// Evaluate define special form
pub(crate) fn eval_define(
    args: &[Expression],
    env: &mut Environment,
    depth: usize,
) -> Expression {
    match args {
        [signature @ Expression::List(target), body] => match target.split_first() {
            Some((Expression::Atom(Symbol::Identifier(name)), params)) => {
                tracing::debug!(%name, params = params.len(), "define procedure");
                let procedure = user_procedure(name, params, body);
                env.define(name.clone(), Binding::Procedure(procedure));
            }
            _ => tracing::debug!(%signature, "define target has no name, ignored"),
        },
        [Expression::Atom(Symbol::Identifier(name)), body] => {
            let mut scope = env.clone();
            let value = eval_with_depth_tracking(body, &mut scope, depth + 1);
            tracing::debug!(%name, %value, "define value");
            env.define_value(name.clone(), value);
        }
        _ => tracing::debug!(args = args.len(), "malformed define ignored"),
    }
    nil()
}

/// Evaluate lambda special form
///
/// The procedure is installed under a synthetic name, and that name is the result.
pub(crate) fn eval_lambda(
    args: &[Expression],
    env: &mut Environment,
    _depth: usize,
) -> Expression {
    match args {
        [Expression::List(params), body] => {
            let name = env.gensym();
            tracing::debug!(%name, params = params.len(), "install lambda");
            let procedure = user_procedure(&name, params, body);
            env.define(name.clone(), Binding::Procedure(procedure));
            ident(name)
        }
        _ => nil(),
    }
}

/// Create an environment with the builtin procedures installed
pub fn default_environment() -> Environment {
    let mut env = Environment::new();
    for builtin_op in get_builtin_ops() {
        env.define(builtin_op.id, Binding::Procedure(builtin_op.to_procedure()));
    }
    env
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{int, real, val};
    use crate::parse_and_build;

    /// Test environment containing test cases that share state
    struct TestEnvironment(Vec<(&'static str, Expression)>);

    /// Micro-helper for expected results in data-driven tests
    fn success<T: Into<Expression>>(value: T) -> Expression {
        value.into()
    }

    /// Run tests in isolated environments with shared state
    fn run_tests_in_environment(test_environments: Vec<TestEnvironment>) {
        for (env_idx, TestEnvironment(test_cases)) in test_environments.iter().enumerate() {
            let mut env = default_environment();
            for (test_idx, (input, expected)) in test_cases.iter().enumerate() {
                let test_id = format!("Environment #{} test #{}", env_idx + 1, test_idx + 1);
                execute_test_case(input, expected, &mut env, &test_id);
            }
        }
    }

    fn execute_test_case(input: &str, expected: &Expression, env: &mut Environment, test_id: &str) {
        let expr = parse_and_build(input);
        let actual = eval(&expr, env);
        assert_eq!(
            actual, *expected,
            "{test_id}: {input:?} expected {expected}, got {actual}"
        );
    }

    /// Each test case runs in its own fresh environment
    fn run_comprehensive_tests(test_cases: Vec<(&str, Expression)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let mut env = default_environment();
            let test_id = format!("#{}", i + 1);
            execute_test_case(input, expected, &mut env, &test_id);
        }
    }

    #[test]
    fn test_comprehensive_evaluation_data_driven() {
        let test_cases = vec![
            // === SELF-EVALUATING ATOMS ===
            ("42", success(42)),
            ("-271", success(-271)),
            ("2.5", success(real(2.5))),
            ("unbound", success(ident("unbound"))),
            // identifiers bound to procedures evaluate to themselves
            ("+", success(ident("+"))),
            ("quote", success(ident("quote"))),
            // === NIL ===
            ("", nil()),
            ("()", nil()),
            ("(() ())", nil()),
            // === QUOTE ===
            ("(quote a)", success(ident("a"))),
            ("(quote 1)", success(1)),
            ("(quote ())", nil()),
            (
                "(quote (this is a quoted list))",
                success(["this", "is", "a", "quoted", "list"]),
            ),
            ("(quote (+ 1 2))", success(vec![ident("+"), int(1), int(2)])),
            ("(quote)", nil()),
            ("(quote a b)", nil()),
            // === ARITHMETIC ===
            ("(+ 1 1)", success(2)),
            ("(+ (+ 1 1) (+ 1 1))", success(4)),
            ("(- 5 7)", success(-2)),
            ("(* 3 4)", success(12)),
            ("(/ 7 2)", success(3)),
            ("(/ -7 2)", success(-3)),
            ("(+ 1.5 2.25)", success(real(3.75))),
            ("(- 1.0 0.5)", success(real(0.5))),
            ("(* 2.0 0.25)", success(real(0.5))),
            ("(/ 1.0 4.0)", success(real(0.25))),
            ("(* (+ 1 2) (- 5 2))", success(9)),
            // no numeric widening
            ("(+ 1 2.0)", nil()),
            ("(* 2.0 3)", nil()),
            // non-numbers
            ("(+ \"a\" \"b\")", nil()),
            ("(+ x 1)", nil()),
            ("(+ (quote (1 2)) 1)", nil()),
            ("(+ () 1)", nil()),
            // arity
            ("(+)", nil()),
            ("(+ 1)", nil()),
            ("(+ 1 2 3)", nil()),
            // division by zero and overflow
            ("(/ 1 0)", nil()),
            ("(/ 1.0 0.0)", nil()),
            ("(+ 9223372036854775807 1)", nil()),
            ("(- -9223372036854775808 1)", nil()),
            ("(* 4611686018427387904 2)", nil()),
            ("(/ -9223372036854775808 -1)", nil()),
            // === SEQUENCES ===
            ("1 2", success([1, 2])),
            ("(a b)", success(["a", "b"])),
            ("(+ 1 1) (+ 2 2)", success([2, 4])),
            ("(define a 1) a", success(1)),
            ("(define a 1) (define b 2)", nil()),
            (
                "(define x 1)\n(define (f x) x)\n(f 2)",
                success(2),
            ),
            (
                "(define (square x) (* x x))\n(square 4)",
                success(16),
            ),
            // === LAMBDA ===
            ("(lambda (x) x) 1", success(1)),
            ("(lambda (x y) (+ x y)) 3 4", success(7)),
            ("(lambda () 42) 0", success(42)),
            ("(lambda (x) x)", success(ident("$0"))),
            ("(lambda x x)", nil()),
            ("(lambda (x))", nil()),
        ];

        run_comprehensive_tests(test_cases);
    }

    #[test]
    fn test_environment_sensitive_evaluation() {
        let environment_test_cases = vec![
            // === DEFINE AND LOOKUP ===
            TestEnvironment(vec![
                ("(define x 1)", nil()),
                ("x", success(1)),
                ("(+ x 2)", success(3)),
                ("(define x 5)", nil()),
                ("x", success(5)),
                ("y", success(ident("y"))),
            ]),
            // === PROCEDURES ===
            TestEnvironment(vec![
                ("(define (square x) (* x x))", nil()),
                ("(square 4)", success(16)),
                ("(square 1.5)", success(real(2.25))),
                ("(square (square 2))", success(16)),
                // missing arguments leave parameters unbound
                ("(square)", nil()),
                // surplus arguments are ignored
                ("(square 3 100)", success(9)),
            ]),
            // === PARAMETER SHADOWING ===
            TestEnvironment(vec![
                ("(define x 10)", nil()),
                ("(define (f x) (+ x 1))", nil()),
                ("(f 1)", success(2)),
                ("x", success(10)),
                ("(f x)", success(11)),
            ]),
            // === BODIES SEE THE CALL-TIME ENVIRONMENT ===
            TestEnvironment(vec![
                ("(define (get) n)", nil()),
                ("(get)", success(ident("n"))),
                ("(define n 5)", nil()),
                ("(get)", success(5)),
            ]),
            // === BINDINGS MADE IN A CALL STAY IN THE CALL ===
            TestEnvironment(vec![
                ("(define (g y) (define z y))", nil()),
                ("(g 3)", nil()),
                ("z", success(ident("z"))),
            ]),
            // === A VALUE DEFINE EVALUATES ITS BODY IN A PRIVATE COPY ===
            TestEnvironment(vec![
                ("(define x (define y 1))", nil()),
                ("x", nil()),
                ("y", success(ident("y"))),
                ("(define g (lambda (n) n))", nil()),
                ("g", success(ident("$0"))),
                // $0 was installed in the copy only, so this is a plain list
                ("($0 5)", success(val(vec![ident("$0"), int(5)]))),
                // but the copy drew from the shared counter
                ("(lambda (n) n)", success(ident("$1"))),
            ]),
            // === RECURSION IS CUT OFF BY THE DEPTH LIMIT ===
            TestEnvironment(vec![
                ("(define (spin x) (spin x))", nil()),
                ("(spin 1)", nil()),
                ("(+ (spin 1) 1)", nil()),
                ("(+ 1 1)", success(2)),
            ]),
            // === SELF-REFERENTIAL VALUES TERMINATE ===
            TestEnvironment(vec![
                ("(define x x)", nil()),
                ("x", success(ident("x"))),
                ("(+ x 1)", nil()),
            ]),
            // === IDENTIFIER OPERANDS RESOLVE THROUGH VALUE BINDINGS ===
            TestEnvironment(vec![
                ("(define y 3)", nil()),
                ("(define x (quote y))", nil()),
                ("x", success(ident("y"))),
                ("(+ x 1)", success(4)),
            ]),
            // === MALFORMED DEFINES ARE IGNORED ===
            TestEnvironment(vec![
                ("(define 1 2)", nil()),
                ("(define)", nil()),
                ("(define x)", nil()),
                ("(define (1 x) x)", nil()),
                ("x", success(ident("x"))),
            ]),
            // === REBINDING A BUILTIN AS A VALUE ===
            TestEnvironment(vec![
                ("(define + 1)", nil()),
                ("+", success(1)),
                ("(+ 1 2)", success([1, 1, 2])),
            ]),
            // === LAMBDAS PASSED AS ARGUMENTS ===
            TestEnvironment(vec![
                ("(define (call f x) (f x))", nil()),
                ("(call (lambda (n) (* n 10)) 4)", success(40)),
            ]),
        ];

        run_tests_in_environment(environment_test_cases);
    }

    #[test]
    fn test_quote_identity() {
        let test_cases = vec![
            int(7),
            real(-0.5),
            ident("anything"),
            nil(),
            val(["define", "x", "x"]),
            val(vec![ident("lambda"), val(["x"]), ident("x")]),
            val(vec![val([1, 2]), nil(), val([val(["deep"])])]),
        ];

        for (i, expr) in test_cases.into_iter().enumerate() {
            let quoted = val(vec![ident("quote"), expr.clone()]);
            let (result, _) = evaluate(&quoted, default_environment());
            assert_eq!(result, expr, "Test case {} failed", i + 1);
        }
    }

    #[test]
    fn test_reduced_atoms_are_fixpoints() {
        let env = default_environment();
        for expr in [int(3), real(1.25), ident("free"), nil()] {
            let (once, env) = evaluate(&expr, env.clone());
            let (twice, _) = evaluate(&once, env);
            assert_eq!(once, twice);
            assert_eq!(once, expr);
        }
    }

    #[test]
    fn test_evaluate_threads_environment() {
        let (result, env) = evaluate(&parse_and_build("(define x 1)"), default_environment());
        assert_eq!(result, nil());
        assert_eq!(env.get("x"), Some(&Binding::Value(int(1))));

        let (result, env) = evaluate(&parse_and_build("(define (f) x)"), env);
        assert_eq!(result, nil());
        assert_eq!(env.procedure("f").unwrap().kind(), ProcedureKind::Applicative);

        let (result, _) = evaluate(&parse_and_build("(f)"), env);
        assert_eq!(result, int(1));
    }

    #[test]
    fn test_environment_copies_are_independent() {
        let mut original = default_environment();
        original.define_value("x", int(1));

        let mut copy = original.clone();
        copy.define_value("x", int(2));
        copy.define_value("y", int(3));

        assert_eq!(original.value("x"), Some(&int(1)));
        assert_eq!(original.get("y"), None);
        assert_eq!(copy.value("x"), Some(&int(2)));
    }

    #[test]
    fn test_value_define_does_not_leak_bindings() {
        let mut env = default_environment();
        eval(&parse_and_build("(define x (define y 1))"), &mut env);
        eval(&parse_and_build("(define g (lambda (n) n))"), &mut env);

        assert_eq!(env.value("x"), Some(&nil()));
        assert_eq!(env.get("y"), None);
        assert_eq!(env.value("g"), Some(&ident("$0")));
        assert!(env.get("$0").is_none());
    }

    #[test]
    fn test_gensym_is_unique_across_copies() {
        let mut env = default_environment();
        env.define_value("$1", int(0));

        let copy = env.clone();
        assert_eq!(env.gensym(), "$0");
        // $1 is taken, and the counter is shared with the copy
        assert_eq!(copy.gensym(), "$2");
        assert_eq!(env.gensym(), "$3");

        // a fresh session starts its own counter
        assert_eq!(default_environment().gensym(), "$0");
    }

    #[test]
    fn test_lambda_installs_synthetic_binding() {
        let mut env = default_environment();
        env.define_value("$0", int(7));

        let result = eval(&parse_and_build("(lambda (x) x)"), &mut env);
        assert_eq!(result, ident("$1"));

        let procedure = env.procedure("$1").unwrap();
        assert_eq!(procedure.id(), "$1");
        assert!(!procedure.is_special_form());
        assert_eq!(env.value("$0"), Some(&int(7)));
    }

    #[test]
    fn test_procedure_equality_ignores_body() {
        let mut first = default_environment();
        eval(&parse_and_build("(define (f x) x)"), &mut first);
        let mut second = default_environment();
        eval(&parse_and_build("(define (f x) (* x 2))"), &mut second);

        assert_eq!(first.get("f"), second.get("f"));
        assert_eq!(eval(&parse_and_build("(f 3)"), &mut first), int(3));
        assert_eq!(eval(&parse_and_build("(f 3)"), &mut second), int(6));

        let special = Procedure::new("f", ProcedureKind::SpecialForm, |_, _, _| nil());
        assert_ne!(first.procedure("f"), Some(&special));
    }

    #[test]
    fn test_register_procedure() {
        let mut env = default_environment();
        env.register_procedure("twice", ProcedureKind::Applicative, |args, _env, _depth| {
            match args {
                [Expression::Atom(Symbol::Integer(n))] => n.checked_mul(2).map_or_else(nil, int),
                _ => nil(),
            }
        });
        env.register_procedure("first-raw", ProcedureKind::SpecialForm, |args, _env, _depth| {
            args.first().cloned().unwrap_or_else(nil)
        });

        let test_cases = vec![
            ("(twice 21)", success(42)),
            ("(twice (+ 1 2))", success(6)),
            ("(twice 1.5)", nil()),
            ("(first-raw (+ 1 2))", success(vec![ident("+"), int(1), int(2)])),
            ("(first-raw)", nil()),
        ];

        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let result = eval(&parse_and_build(input), &mut env);
            assert_eq!(result, *expected, "Test case {} failed for {input:?}", i + 1);
        }
    }

    #[test]
    fn test_get_all_bindings_sorted() {
        let mut env = default_environment();
        env.define_value("answer", int(42));

        let names: Vec<String> = env
            .get_all_bindings()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            vec!["*", "+", "-", "/", "answer", "define", "lambda", "quote"]
        );

        let bindings = env.get_all_bindings();
        let rendered: Vec<String> = bindings.iter().map(|(_, b)| b.to_string()).collect();
        assert!(rendered.contains(&"42".to_owned()));
        assert!(rendered.contains(&"#<procedure +>".to_owned()));
        assert!(rendered.contains(&"#<special form quote>".to_owned()));
    }

    #[test]
    fn test_evaluation_depth_limit() {
        let nested = |levels: usize| {
            (0..levels).fold(int(1), |expr, _| val(vec![ident("+"), expr, int(1)]))
        };

        let (shallow, _) = evaluate(&nested(10), default_environment());
        assert_eq!(shallow, int(11));

        let (deep, _) = evaluate(&nested(MAX_EVAL_DEPTH + 10), default_environment());
        assert_eq!(deep, nil());
    }
}
