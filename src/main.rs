//! Jack compiler CLI - compiles Jack files to VM code.
//!
//! Usage:
//!     jack2vm <file.jack | directory>
//!     jack2vm <directory> --output <dir>

use clap::Parser;
use jack2vm::{Diagnostic, compile_directory, compile_file, write_result};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "jack2vm")]
#[command(version = "0.1.0")]
#[command(about = "Single-pass Jack to VM code compiler")]
struct Args {
    /// Input file (.jack) or directory containing .jack files
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output directory (defaults to input directory)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let (results, output_dir) = if args.input.is_file() {
        let result = compile_file(&args.input);
        let output_dir = args
            .output
            .unwrap_or_else(|| args.input.parent().unwrap_or(&args.input).to_path_buf());
        (vec![result], output_dir)
    } else if args.input.is_dir() {
        let results = compile_directory(&args.input);
        let output_dir = args.output.unwrap_or_else(|| args.input.clone());
        (results, output_dir)
    } else {
        eprintln!("Error: Input path does not exist: {}", args.input.display());
        return ExitCode::from(2);
    };

    if results.is_empty() {
        eprintln!("Error: No .jack files found in {}", args.input.display());
        return ExitCode::from(2);
    }

    let mut has_errors = false;

    for result in &results {
        if let Some(error) = &result.error {
            has_errors = true;
            let filename = format!("{}.jack", result.filename);
            eprint!(
                "{}",
                Diagnostic::new(error)
                    .with_source(&result.source)
                    .with_filename(&filename)
            );
        } else if let Err(e) = write_result(result, &output_dir) {
            eprintln!("Error writing {}.vm: {}", result.filename, e);
            has_errors = true;
        } else {
            println!(
                "Compiled {}.jack -> {}.vm",
                result.filename, result.filename
            );
        }
    }

    if has_errors {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
