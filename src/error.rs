//! Error types and diagnostics for the Jack compiler.

use crate::token::Span;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while compiling a Jack file.
///
/// All errors are fatal for the file being compiled; the orchestration layer
/// decides whether to continue with the next file.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Unknown character sequence, unterminated string or block comment.
    #[error("Lexical error at {span}: {message}")]
    Lexical { span: Span, message: String },

    /// Token did not match the grammar.
    #[error("Syntax error at {span}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },

    /// Integer literal outside the 16-bit machine-word range.
    #[error("Integer constant {value} at {span} exceeds maximum value 32767")]
    IntegerRange { value: u32, span: Span },

    /// Variable used but not declared.
    #[error("Undefined variable '{name}' at {span}")]
    UndefinedVariable { name: String, span: Span },

    /// Variable declared twice in the same scope.
    #[error("Duplicate definition of '{name}' at {span}")]
    DuplicateDefinition { name: String, span: Span },

    /// String constant character that does not fit in 8 bits.
    #[error("Character '{ch}' at {span} does not fit in a string constant")]
    UnsupportedCharacter { ch: char, span: Span },

    /// File I/O error.
    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    /// Create a lexical error.
    pub fn lexical(span: Span, message: impl Into<String>) -> Self {
        Self::Lexical {
            span,
            message: message.into(),
        }
    }

    /// Create a syntax error.
    pub fn syntax(span: Span, message: impl Into<String>) -> Self {
        Self::Syntax {
            span,
            message: message.into(),
            expected: Vec::new(),
        }
    }

    /// Create a syntax error with expected tokens.
    pub fn syntax_expected(span: Span, message: impl Into<String>, expected: Vec<String>) -> Self {
        Self::Syntax {
            span,
            message: message.into(),
            expected,
        }
    }

    /// Create an integer range error.
    pub fn integer_range(value: u32, span: Span) -> Self {
        Self::IntegerRange { value, span }
    }

    /// Create an undefined variable error.
    pub fn undefined_variable(name: impl Into<String>, span: Span) -> Self {
        Self::UndefinedVariable {
            name: name.into(),
            span,
        }
    }

    /// Create a duplicate definition error.
    pub fn duplicate_definition(name: impl Into<String>, span: Span) -> Self {
        Self::DuplicateDefinition {
            name: name.into(),
            span,
        }
    }

    /// Create an unsupported character error.
    pub fn unsupported_character(ch: char, span: Span) -> Self {
        Self::UnsupportedCharacter { ch, span }
    }

    /// Create an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the span of this error, if any.
    pub fn span(&self) -> Option<&Span> {
        match self {
            CompileError::Lexical { span, .. } => Some(span),
            CompileError::Syntax { span, .. } => Some(span),
            CompileError::IntegerRange { span, .. } => Some(span),
            CompileError::UndefinedVariable { span, .. } => Some(span),
            CompileError::DuplicateDefinition { span, .. } => Some(span),
            CompileError::UnsupportedCharacter { span, .. } => Some(span),
            CompileError::Io { .. } => None,
        }
    }
}

/// Diagnostic formatter for rich error output.
///
/// Renders the error message, its source location, and the offending line
/// with a caret when the source text is available.
pub struct Diagnostic<'a> {
    error: &'a CompileError,
    source: Option<&'a str>,
    filename: Option<&'a str>,
}

impl<'a> Diagnostic<'a> {
    pub fn new(error: &'a CompileError) -> Self {
        Self {
            error,
            source: None,
            filename: None,
        }
    }

    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_filename(mut self, filename: &'a str) -> Self {
        self.filename = Some(filename);
        self
    }
}

impl fmt::Display for Diagnostic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filename = self.filename.unwrap_or("<input>");

        writeln!(f, "error: {}", self.error)?;

        if let Some(span) = self.error.span() {
            writeln!(f, "  --> {}:{}:{}", filename, span.line, span.column)?;

            if let Some(source) = self.source
                && let Some(line) = source.lines().nth(span.line - 1)
            {
                writeln!(f, "   |")?;
                writeln!(f, "{:3} | {}", span.line, line)?;
                writeln!(f, "   | {:>width$}^", "", width = span.column - 1)?;
            }
        }

        if let CompileError::Syntax { expected, .. } = self.error
            && !expected.is_empty()
        {
            writeln!(f, "   = expected: {}", expected.join(", "))?;
        }

        Ok(())
    }
}
