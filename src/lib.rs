//! Jack to VM compiler.
//!
//! This crate compiles Jack source code to VM code for the nand2tetris
//! virtual machine in a single pass: the recursive-descent parser emits VM
//! commands while it parses, with no syntax tree in between. It supports:
//!
//! - Complete Jack language compilation
//! - Streaming, comment-stripping tokenization
//! - Two-scope symbol management with shadowing
//! - Parallel file processing for directories
//!
//! # Usage
//!
//! ```no_run
//! use jack2vm::{compile_file, compile_directory};
//! use std::path::Path;
//!
//! // Compile a single file
//! let result = compile_file(Path::new("Main.jack"));
//!
//! // Compile every .jack file in a directory
//! let results = compile_directory(Path::new("Square/"));
//! ```

pub mod compiler;
pub mod error;
pub mod reader;
pub mod symbol_table;
pub mod token;
pub mod tokenizer;
pub mod vm_writer;

use rayon::prelude::*;
use std::fs;
use std::path::Path;

// Re-export key types
pub use compiler::Compiler;
pub use error::{CompileError, Diagnostic};
pub use symbol_table::{Symbol, SymbolKind, SymbolTable, VarType};
pub use token::{Keyword, Span, SpannedToken, Token};
pub use tokenizer::Tokenizer;
pub use vm_writer::{VmOp, VmWriter};

/// Result of compiling a single Jack file.
///
/// The source text is retained so callers can render diagnostics with
/// context. Errors are fatal per file, so at most one is reported.
#[derive(Debug)]
pub struct CompileResult {
    /// The file stem that was compiled (e.g. "Main" for Main.jack).
    pub filename: String,
    /// The source that was compiled (empty if it could not be read).
    pub source: String,
    /// The generated VM code (empty if an error occurred).
    pub vm_code: String,
    /// The error that aborted compilation, if any.
    pub error: Option<CompileError>,
}

impl CompileResult {
    /// Check if the compilation was successful.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Compile Jack source code directly.
pub fn compile_source(source: &str, filename: &str) -> CompileResult {
    match Compiler::new(source).compile() {
        Ok(vm_code) => CompileResult {
            filename: filename.to_string(),
            source: source.to_string(),
            vm_code,
            error: None,
        },
        Err(error) => CompileResult {
            filename: filename.to_string(),
            source: source.to_string(),
            vm_code: String::new(),
            error: Some(error),
        },
    }
}

/// Compile a single Jack file.
pub fn compile_file(path: &Path) -> CompileResult {
    let filename = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string();

    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            return CompileResult {
                filename,
                source: String::new(),
                vm_code: String::new(),
                error: Some(CompileError::io(path, e)),
            };
        }
    };

    compile_source(&source, &filename)
}

/// Compile all Jack files in a directory.
///
/// Entries without a `.jack` extension are skipped silently. Files are
/// compiled in parallel; every worker owns its own compiler state.
pub fn compile_directory(dir: &Path) -> Vec<CompileResult> {
    let jack_files: Vec<_> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jack"))
            .collect(),
        Err(e) => {
            return vec![CompileResult {
                filename: dir.to_string_lossy().to_string(),
                source: String::new(),
                vm_code: String::new(),
                error: Some(CompileError::io(dir, e)),
            }];
        }
    };

    if jack_files.is_empty() {
        return Vec::new();
    }

    jack_files
        .par_iter()
        .map(|path| compile_file(path))
        .collect()
}

/// Write a compile result's VM code to `<output_dir>/<filename>.vm`.
pub fn write_result(result: &CompileResult, output_dir: &Path) -> Result<(), CompileError> {
    let vm_path = output_dir.join(format!("{}.vm", result.filename));
    fs::write(&vm_path, &result.vm_code).map_err(|e| CompileError::io(&vm_path, e))
}
