//! The command line interface for the blang interpreter.

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use blang::diagnostics::Diagnostics;
use blang::runtime::{Interpreter, Options};
use blang::value::Value;
use blang::{Error, print_error, print_info, print_warn};
use clap::{CommandFactory, Parser as ClapParser};
use clap_cargo::style::CLAP_STYLING;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

/// Command line arguments for the blang interpreter.
#[derive(Debug, ClapParser)]
#[command(about = "Run blang scripts, one-liners or an interactive session", version, styles = CLAP_STYLING)]
struct Cli {
    /// Script to run, e.g. `bl hello.bl`; `-` reads the script from stdin
    script: Option<String>,
    /// Code to run directly, e.g. `bl -e 'println(1 + 2)'`
    #[arg(short, long, conflicts_with = "script")]
    eval: Option<String>,
    /// Start an interactive session
    #[arg(short, long)]
    interactive: bool,
    /// Deepest allowed nesting of function calls
    #[arg(long, value_name = "N", default_value_t = Options::default().max_call_depth)]
    max_depth: usize,
}

/// Entry point for the blang CLI.
///
/// Parses command line arguments and dispatches to the appropriate mode (eval, script, REPL, stdin).
fn main() -> ExitCode {
    let cli = Cli::parse();
    let options = Options { max_call_depth: cli.max_depth };

    if let Some(code) = cli.eval {
        run_source("<eval>", &code, options)
    } else if let Some(script) = cli.script {
        if script == "-" { run_stdin(options) } else { run_file(&script, options) }
    } else if cli.interactive {
        run_repl(options)
    } else if !io::stdin().is_terminal() {
        run_stdin(options)
    } else {
        // Nothing to run: same as `--help`, but a failure.
        let _ = Cli::command().print_help();
        ExitCode::FAILURE
    }
}

/// Runs a whole program and prints its final value unless it is `null`.
fn run_source(filename: &str, src: &str, options: Options) -> ExitCode {
    let mut itp = Interpreter::new(options);
    match itp.eval_source(src) {
        Ok(Value::Null) => ExitCode::SUCCESS,
        Ok(value) => {
            println!("{value}");
            ExitCode::SUCCESS
        }
        Err(err) => report(&err, src, filename),
    }
}

/// Turns an error into the process status, printing a diagnostic unless the
/// script asked to exit.
fn report(err: &Error, src: &str, filename: &str) -> ExitCode {
    if let Some(code) = err.exit_code() {
        return ExitCode::from(code as u8);
    }
    Diagnostics::from(err.to_diagnostic()).report(src, filename);
    ExitCode::FAILURE
}

/// Runs a script file from disk.
fn run_file(script: &str, options: Options) -> ExitCode {
    if !script.ends_with(".bl") {
        print_warn!("`{script}` does not have the .bl extension");
    }
    match fs::read_to_string(script) {
        Ok(source) => run_source(script, &source, options),
        Err(err) => {
            print_error!("cannot read `{script}`: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Reads code from standard input and runs it as a script.
fn run_stdin(options: Options) -> ExitCode {
    let mut buffer = String::new();
    if let Err(err) = io::stdin().read_to_string(&mut buffer) {
        print_error!("cannot read from stdin: {err}");
        return ExitCode::FAILURE;
    }
    run_source("<stdin>", &buffer, options)
}

fn history_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join("blang").join("history"))
}

/// Starts the interactive Read-Eval-Print Loop (REPL).
///
/// Every line runs in the same interpreter, so declarations and closures
/// carry over. Errors are reported and the session goes on.
fn run_repl(options: Options) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            print_error!("cannot start the line editor: {err}");
            return ExitCode::FAILURE;
        }
    };
    let history = history_path();
    if let Some(path) = &history {
        // A missing history file just means a first session.
        let _ = editor.load_history(path);
    }

    print_info!("blang {} (Ctrl+D to quit)", env!("CARGO_PKG_VERSION"));
    let mut itp = Interpreter::new(options);
    let status = loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                match itp.eval_source(line) {
                    Ok(Value::Null) => {}
                    Ok(value) => println!("{}", value.repr()),
                    Err(err) => {
                        if let Some(code) = err.exit_code() {
                            break ExitCode::from(code as u8);
                        }
                        Diagnostics::from(err.to_diagnostic()).report(line, "<repl>");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break ExitCode::SUCCESS,
            Err(err) => {
                print_error!("{err}");
                break ExitCode::FAILURE;
            }
        }
    };

    if let Some(path) = &history {
        if let Some(dir) = path.parent() {
            let _ = fs::create_dir_all(dir);
        }
        if let Err(err) = editor.save_history(path) {
            print_warn!("cannot save history to {}: {err}", path.display());
        }
    }
    status
}

#[test]
fn verify_cli() {
    Cli::command().debug_assert();
}
