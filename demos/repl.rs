use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use sexpr::evaluator::{self, Binding, Environment};
use sexpr::{default_environment, try_parse_and_build};
use std::panic;
use std::process;

const PROMPT: &str = "λ ";
const CONTINUATION_PROMPT: &str = "… ";

fn main() {
    init_tracing();

    let result = panic::catch_unwind(|| match std::env::args().nth(1) {
        Some(path) => run_file(&path),
        None => run_repl(),
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// Install a subscriber only if RUST_LOG is set, e.g. `RUST_LOG=sexpr=trace`
fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(EnvFilter::from_default_env())
            .init();
    }
}

/// Outcome of feeding one line to a [`PendingInput`]
enum Feed {
    /// Parentheses are still open
    Incomplete,
    /// The buffered text is a balanced unit ready to evaluate
    Complete(String),
    /// The line closed more parentheses than were open; the buffer was discarded
    Unbalanced,
}

/// Lines collected until their parentheses balance
#[derive(Default)]
struct PendingInput {
    text: String,
    depth: i64,
}

impl PendingInput {
    fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn push(&mut self, line: &str) -> Feed {
        for c in line.chars() {
            match c {
                '(' => self.depth += 1,
                ')' => self.depth -= 1,
                _ => {}
            }
            if self.depth < 0 {
                *self = PendingInput::default();
                return Feed::Unbalanced;
            }
        }

        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(line);

        if self.depth > 0 {
            Feed::Incomplete
        } else {
            Feed::Complete(std::mem::take(&mut self.text))
        }
    }
}

fn evaluate_and_print(source: &str, env: &mut Environment) {
    match try_parse_and_build(source) {
        Ok(expr) => println!("⇨ {}", evaluator::eval(&expr, env)),
        Err(err) => println!("{err}"),
    }
}

fn run_repl() {
    println!("SExpr - a minimal symbolic-expression language");
    println!("Enter expressions like: (+ 1 2)");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            return;
        }
    };
    let mut env = default_environment();
    let mut pending = PendingInput::default();

    loop {
        let prompt = if pending.is_empty() {
            PROMPT
        } else {
            CONTINUATION_PROMPT
        };

        match rl.readline(prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                // Add the line to history
                let _ = rl.add_history_entry(trimmed);

                // Commands are only recognized outside a multi-line expression
                if pending.is_empty() {
                    match trimmed {
                        ":help" => {
                            print_help();
                            continue;
                        }
                        ":env" => {
                            print_environment(&env);
                            continue;
                        }
                        ":reset" => {
                            env = default_environment();
                            println!("Environment reset.");
                            continue;
                        }
                        ":quit" | ":exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        _ => {}
                    }
                }

                match pending.push(&line) {
                    Feed::Incomplete => {}
                    Feed::Complete(source) => evaluate_and_print(&source, &mut env),
                    Feed::Unbalanced => println!("Too many ')', input discarded."),
                }
            }

            Err(ReadlineError::Interrupted) => {
                // Ctrl+C abandons a partial expression, or exits on an empty one
                if pending.is_empty() {
                    println!("Goodbye!");
                    break;
                }
                pending = PendingInput::default();
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn run_file(path: &str) {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read {path}: {err}");
            process::exit(1);
        }
    };

    let mut env = default_environment();
    let mut pending = PendingInput::default();

    for (line_number, line) in source.lines().enumerate() {
        if line.trim().is_empty() && pending.is_empty() {
            continue;
        }
        match pending.push(line) {
            Feed::Incomplete => {}
            Feed::Complete(form) => evaluate_and_print(&form, &mut env),
            Feed::Unbalanced => {
                eprintln!("{path}:{}: too many ')', form skipped", line_number + 1);
            }
        }
    }

    if !pending.is_empty() {
        eprintln!("{path}: input ended inside an open list");
    }
}

fn print_help() {
    println!("SExpr commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :reset     - Start over with a fresh environment");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+D     - Exit the interpreter");
    println!();
    println!("An expression may span several lines; it is evaluated once its");
    println!("parentheses balance.");
    println!();
    println!("Language:");
    println!("  Numbers: 42, -5, 2.5");
    println!("  Arithmetic: (+ a b), (- a b), (* a b), (/ a b) on two numbers of one kind");
    println!("  Quoting: (quote (a b c))");
    println!("  Values: (define x 1)");
    println!("  Procedures: (define (square x) (* x x))");
    println!("  Anonymous procedures: (lambda (x) (* x 2)) 21");
    println!();
    println!("Anything without a result evaluates to nil.");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate builtins from user-defined bindings
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, binding) in bindings {
        match binding {
            Binding::Procedure(_) if sexpr::builtinops::find_builtin_op(&name).is_some() => {
                builtins.push(name);
            }
            _ => user_defined.push((name, binding)),
        }
    }

    if !builtins.is_empty() {
        println!("Built-in procedures ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<10}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined bindings ({}):", user_defined.len());
        for (name, binding) in user_defined {
            println!("  {name} = {binding}");
        }
    }
}
