//! Interactive shell for the entmoot compiler core
//!
//! Each submitted line is compiled against the current context; on success
//! the resulting context becomes current, on failure the previous one is
//! kept.

use std::fs;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use entmoot::{Compiler, CompilerConfig, Context, Symbol, Value};
use rustyline::error::ReadlineError;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "entmoot", version, about = "Interactive entmoot shell")]
struct Args {
    /// Namespace to start in
    #[arg(long, default_value = entmoot::CORE_NS)]
    namespace: String,

    /// Evaluate expanded forms without optimizing them
    #[arg(long)]
    no_optimize: bool,

    /// Evaluate this code and exit (after FILE, if both are given)
    #[arg(long, short)]
    eval: Option<String>,

    /// Source file to load before the prompt
    file: Option<PathBuf>,
}

enum Command<'a> {
    Quit,
    Deps(&'a str),
    Dependents(&'a str),
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let rest = line.strip_prefix(':')?;
    let mut parts = rest.split_whitespace();
    let command = match (parts.next(), parts.next()) {
        (Some("quit"), _) | (Some("q"), _) => Command::Quit,
        (Some("deps"), Some(sym)) => Command::Deps(sym),
        (Some("dependents"), Some(sym)) => Command::Dependents(sym),
        _ => Command::Unknown(line),
    };
    Some(command)
}

fn print_symbols(title: &str, symbols: impl IntoIterator<Item = Symbol>) {
    let mut symbols: Vec<Symbol> = symbols.into_iter().collect();
    symbols.sort();
    if symbols.is_empty() {
        println!("{}: none", title);
        return;
    }
    println!("{}:", title);
    for sym in symbols {
        println!("  {}", sym);
    }
}

// Compile `source`, returning the context to continue with.
fn run_input(compiler: &Compiler, context: Context, source: &str, print_result: bool) -> Context {
    match compiler.eval(&context, source) {
        Ok(result) => {
            if print_result && !matches!(result.value, Value::Nil) {
                println!("{:?}", result.value);
            }
            result.context
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            context
        }
    }
}

fn run_repl(compiler: &Compiler, mut context: Context) -> anyhow::Result<()> {
    let mut readline = rustyline::DefaultEditor::new()?;
    println!("entmoot {} (:quit to exit)", entmoot::VERSION);

    loop {
        let prompt = format!("{}=> ", context.namespace());
        match readline.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = readline.add_history_entry(line);
                match parse_command(line) {
                    Some(Command::Quit) => break,
                    Some(Command::Deps(sym)) => {
                        print_symbols("depends on", context.get_dependencies(&Symbol::parse(sym)))
                    }
                    Some(Command::Dependents(sym)) => {
                        print_symbols("dependents", context.calc_dependents(&Symbol::parse(sym)))
                    }
                    Some(Command::Unknown(text)) => eprintln!("Unknown command: {}", text),
                    None => context = run_input(compiler, context, line, true),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = CompilerConfig::new()
        .with_namespace(&args.namespace)
        .with_optimize(!args.no_optimize);
    let compiler = Compiler::new(config);
    let mut context = compiler
        .initial_context()
        .context("failed to build the initial context")?;

    if let Some(path) = &args.file {
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        context = compiler
            .eval_named(&context, &source, &path.display().to_string())
            .with_context(|| format!("failed to load {}", path.display()))?
            .context;
        info!(file = %path.display(), "loaded");
    }

    if let Some(code) = &args.eval {
        let result = compiler.eval(&context, code)?;
        println!("{:?}", result.value);
        return Ok(());
    }
    if args.file.is_some() {
        return Ok(());
    }

    run_repl(&compiler, context)
}
