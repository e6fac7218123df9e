use std::fs;
use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};

use ocl_script::interpreter::Interpreter;
use ocl_script::lexer;
use ocl_script::parser;

const HELP: &str = "\
OCL Interpreter

Usage: ocl-script [options] [filename]

Options:
  --help      Display this help message and exit
  --debug     Dump tokens and the AST, and show progress lines

Arguments:
  filename    Path to the OCL script file to execute

If no filename is provided, enters interactive mode:
  - Type 'exit' to quit
  - Type 'help' for interactive commands
  - Press Enter on a blank line to execute the buffer
";

fn main() -> Result<()> {
    let mut debug = false;
    let mut script: Option<String> = None;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print!("{HELP}");
                return Ok(());
            }
            "--debug" => debug = true,
            _ if arg.starts_with('-') => bail!("Unknown option '{arg}' (see --help)"),
            _ => {
                if script.is_some() {
                    bail!("Only one script file is supported");
                }
                script = Some(arg);
            }
        }
    }

    match script {
        Some(path) => run_file(&path, debug),
        None => repl(debug),
    }
}

/// Decodes script bytes: UTF-8 with an optional BOM, falling back to Latin-1
/// so legacy editors' files still load.
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

fn run_file(path: &str, debug: bool) -> Result<()> {
    let mut interpreter = Interpreter::new(io::stdout());
    interpreter.set_debug_mode(debug);
    let bytes = fs::read(path).with_context(|| format!("Reading {path}"))?;
    let source = decode(&bytes);
    interpreter.mark_progress("Script loaded");

    execute(&source, &mut interpreter, debug);

    if let Some(report) = interpreter.last_error() {
        let line = report
            .line
            .map_or("unknown".to_string(), |line| line.to_string());
        eprintln!("Execution finished with an error at line {line}: {}", report.message);
        std::process::exit(1);
    }
    Ok(())
}

/// One lex/parse/run round. Syntax errors are reported here; runtime errors
/// are the interpreter's own business.
fn execute(source: &str, interpreter: &mut Interpreter<io::Stdout>, debug: bool) {
    let tokens = match lexer::tokenize(source) {
        Ok(tokens) => tokens,
        Err(err) => {
            println!("Syntax Error: {err}");
            return;
        }
    };
    if debug {
        println!("Tokens:");
        for (i, token) in tokens.iter().enumerate() {
            println!("  {}. {token:?}", i + 1);
        }
    }
    interpreter.mark_progress("Tokenization successful");

    let parsed = parser::parse_tokens(&tokens);
    for err in &parsed.errors {
        println!("Syntax Error: {err}");
    }
    if debug {
        println!("AST:\n{:#?}", parsed.program);
    }
    interpreter.mark_progress("Parsing successful");

    interpreter.run(&parsed.program);
    interpreter.mark_progress("Interpretation successful");
}

const REPL_HELP: &str = "\
Available commands:
  exit     - Exit the interpreter
  help     - Show this help message
  clear    - Clear the current code buffer
  debug    - Toggle debug mode
  errors   - Show the last recorded error

Enter OCL code and press Enter on a blank line to execute.
";

fn repl(mut debug: bool) -> Result<()> {
    let mut interpreter = Interpreter::new(io::stdout());
    interpreter.set_debug_mode(debug);
    println!("OCL Interpreter - Interactive Mode");
    println!("Type 'exit' to quit, 'help' for commands, or enter OCL code.");
    println!("Press Enter on a blank line to execute.");

    let stdin = io::stdin();
    let mut buffer: Vec<String> = Vec::new();
    loop {
        if buffer.is_empty() {
            print!("OCL>>> ");
        } else {
            print!("...    ");
        }
        io::stdout().flush().context("Flushing prompt")?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("Reading input")? == 0 {
            println!();
            return Ok(());
        }
        let line = line.trim_end_matches(['\n', '\r']);

        if buffer.is_empty() {
            match line.trim().to_ascii_lowercase().as_str() {
                "exit" => {
                    println!("Goodbye!");
                    return Ok(());
                }
                "help" => {
                    println!("{REPL_HELP}");
                    continue;
                }
                "clear" => {
                    println!("Code buffer cleared");
                    continue;
                }
                "debug" => {
                    debug = !debug;
                    interpreter.set_debug_mode(debug);
                    println!(
                        "Debug mode {}",
                        if debug { "enabled" } else { "disabled" }
                    );
                    continue;
                }
                "errors" => {
                    match interpreter.last_error() {
                        None => println!("No errors recorded yet."),
                        Some(report) => {
                            let line = report
                                .line
                                .map_or("unknown".to_string(), |line| line.to_string());
                            println!("Last error (line {line}): {}", report.message);
                            if let Some(detail) = &report.detail {
                                println!("  {detail}");
                            }
                        }
                    }
                    continue;
                }
                _ => {}
            }
        }

        if line.trim().is_empty() {
            if !buffer.is_empty() {
                let source = buffer.join("\n");
                buffer.clear();
                println!("--- Executing ---");
                execute(&source, &mut interpreter, debug);
                println!("--- Done ---");
            }
            continue;
        }
        buffer.push(line.to_string());
    }
}
