use sable_lang::diagnostics;
use sable_lang::language::lexer::lex;
use sable_lang::language::parser::parse_source;
use sable_lang::runtime::frame::Frame;
use sable_lang::runtime::interpreter::{DebugListener, Interpreter};
use sable_lang::runtime::scope::LexicalScope;
use std::env;
use std::fs;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let (command, filename) = match (args.get(1), args.get(2)) {
        (Some(command), Some(filename)) => (command.as_str(), filename.as_str()),
        _ => {
            eprintln!("Usage: sable-lang [run|tokens|scopes] <filename.sable> [offset]");
            return ExitCode::from(2);
        }
    };

    if !filename.ends_with(".sable") {
        eprintln!("Invalid file extension. Only .sable files are allowed.");
        return ExitCode::from(2);
    }

    let path = Path::new(filename);
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            diagnostics::report_io_error(path, &err);
            return ExitCode::from(1);
        }
    };

    match command {
        "run" => run(path, &source),
        "tokens" => tokens(path, &source),
        "scopes" => {
            let offset = match args.get(3).map(|raw| raw.parse::<usize>()) {
                Some(Ok(offset)) => offset,
                _ => {
                    eprintln!("Usage: sable-lang scopes <filename.sable> <byte offset>");
                    return ExitCode::from(2);
                }
            };
            scopes(path, &source, offset)
        }
        _ => {
            eprintln!("Unknown command `{command}`. Expected run, tokens, or scopes.");
            ExitCode::from(2)
        }
    }
}

fn run(path: &Path, source: &str) -> ExitCode {
    let program = match parse_source(source) {
        Ok(program) => program,
        Err(errors) => {
            diagnostics::emit_syntax_errors(path, source, &errors);
            return ExitCode::from(1);
        }
    };

    let mut interpreter = Interpreter::new();
    interpreter.install_program(&program);
    interpreter.set_debug_listener(Box::new(PrintScopes));
    match interpreter.run() {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            diagnostics::report_runtime_error(&err);
            ExitCode::from(1)
        }
    }
}

fn tokens(path: &Path, source: &str) -> ExitCode {
    match lex(source) {
        Ok(tokens) => {
            for token in tokens {
                println!(
                    "{:>5}..{:<5} {:?}",
                    token.span.start, token.span.end, token.kind
                );
            }
            ExitCode::SUCCESS
        }
        Err(errors) => {
            for err in errors {
                eprintln!(
                    "{}: lex error at {}..{}: {}",
                    path.display(),
                    err.span.start,
                    err.span.end,
                    err.message
                );
            }
            ExitCode::from(1)
        }
    }
}

/// Static inspection: show the scope chain visible at a byte offset,
/// without running anything. Values are unavailable, so only names are
/// printed.
fn scopes(path: &Path, source: &str, offset: usize) -> ExitCode {
    let program = match parse_source(source) {
        Ok(program) => program,
        Err(errors) => {
            diagnostics::emit_syntax_errors(path, source, &errors);
            return ExitCode::from(1);
        }
    };

    let Some(node) = program.ast.node_at(offset) else {
        eprintln!("No syntax node covers byte offset {offset}.");
        return ExitCode::from(1);
    };

    let scope = LexicalScope::locate(program.ast.as_ref(), node);
    let mut current = Some(&scope);
    while let Some(level) = current {
        let variables = level.variables(None);
        let names: Vec<&str> = variables.names().collect();
        println!("scope [{}]: {}", level.name(), render_names(&names));
        if level.is_function_scope() {
            let arguments = level.arguments(None);
            let names: Vec<&str> = arguments.names().collect();
            println!("  arguments: {}", render_names(&names));
        }
        current = level.parent();
    }
    ExitCode::SUCCESS
}

fn render_names(names: &[&str]) -> String {
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

/// Default `debugger;` behavior for `run`: dump every visible scope with
/// the current values from the paused activation record.
struct PrintScopes;

impl DebugListener for PrintScopes {
    fn on_halt(&mut self, scope: &LexicalScope<'_>, frame: &mut Frame) {
        println!("debugger halt in `{}`:", scope.name());
        let mut current = Some(scope);
        while let Some(level) = current {
            let view = level.variables(Some(&mut *frame));
            let rendered: Vec<String> = view
                .names()
                .map(|name| match view.read(name) {
                    Ok(value) => format!("{name} = {value}"),
                    Err(err) => format!("{name} = <{err}>"),
                })
                .collect();
            if rendered.is_empty() {
                println!("  [{}] (no variables)", level.name());
            } else {
                println!("  [{}] {}", level.name(), rendered.join(", "));
            }
            current = level.parent();
        }
    }
}
