//! Fixture harness: runs every program under `tests/programs/` and compares
//! the combined syntax-error and interpreter output against the `.out` file
//! next to it.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{ensure, Context, Result};

use crate::interpreter::Interpreter;
use crate::{lexer, parser};

fn normalize_output(output: &str) -> String {
    output.replace("\r\n", "\n").trim_end().to_string()
}

fn run_program(source: &str) -> Result<String> {
    let mut output = Vec::new();
    match lexer::tokenize(source) {
        Err(err) => writeln!(output, "Syntax Error: {err}")?,
        Ok(tokens) => {
            let parsed = parser::parse_tokens(&tokens);
            for err in &parsed.errors {
                writeln!(output, "Syntax Error: {err}")?;
            }
            let mut interpreter = Interpreter::with_input(output, Box::new(io::empty()));
            interpreter.run(&parsed.program);
            output = interpreter.into_output();
        }
    }
    Ok(String::from_utf8(output).context("Interpreter output was not UTF-8")?)
}

#[test]
fn runs_fixture_programs() -> Result<()> {
    let programs_dir = Path::new("tests/programs");
    let mut programs = Vec::new();
    for entry in
        fs::read_dir(programs_dir).with_context(|| format!("Reading {}", programs_dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some("ocl") {
            programs.push(path);
        }
    }
    ensure!(
        !programs.is_empty(),
        "No .ocl programs found in {}",
        programs_dir.display()
    );
    programs.sort();

    for path in programs {
        let source =
            fs::read_to_string(&path).with_context(|| format!("Reading {}", path.display()))?;
        let expected_path = path.with_extension("out");
        let expected = fs::read_to_string(&expected_path)
            .with_context(|| format!("Reading {}", expected_path.display()))?;
        let actual = run_program(&source)?;
        assert_eq!(
            normalize_output(&actual),
            normalize_output(&expected),
            "Output mismatch for {}",
            path.display()
        );
    }
    Ok(())
}
