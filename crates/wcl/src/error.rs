/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for parsing, lookup and substitution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while reading or evaluating WCL.
#[derive(Debug, Error)]
pub enum WclError {
    /// Malformed section nesting, a missing close or a malformed directive.
    #[error("File {file}{} - {message}{}", format_line(.line), format_stack(.stack))]
    Structural {
        file: String,
        line: Option<usize>,
        message: String,
        /// Keys of the sections open when the error was found, outermost first.
        stack: Vec<String>,
    },

    /// A required key or variable could not be found.
    #[error("Could not find value for {key}")]
    Lookup { key: String },

    /// A value could not be interpreted (bad width, non-integer value, ...).
    #[error("Invalid value '{input}': {message}")]
    Value { input: String, message: String },

    /// A fixed-point loop did not settle within its iteration bound.
    #[error("Aborting after {limit} iterations, probable circular reference in '{input}'")]
    NonTermination { input: String, limit: usize },

    /// A substitution expected exactly one result but expanded to several.
    #[error("Expected a single value but '{input}' expanded to {count} values")]
    Ambiguous { input: String, count: usize },

    /// `$FUNC` or `<<inclfunc>>` named a function that was never registered.
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },

    /// A registered function reported a failure.
    #[error("Function '{name}' failed: {message}")]
    Function { name: String, message: String },

    /// The header reader could not produce a value.
    #[error("Header lookup in {} failed: {message}", .path.display())]
    Header { path: PathBuf, message: String },

    /// A WCL file (top-level or included) could not be read.
    #[error("Could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WclError {
    pub(crate) fn lookup(key: impl Into<String>) -> Self {
        Self::Lookup { key: key.into() }
    }

    pub(crate) fn value(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Value {
            input: input.into(),
            message: message.into(),
        }
    }
}

fn format_line(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" Line {}", n),
        None => String::new(),
    }
}

fn format_stack(stack: &[String]) -> String {
    if stack.is_empty() {
        String::new()
    } else {
        format!(" (open sections: {})", stack.join(" > "))
    }
}

/// Result type for WCL operations.
pub type WclResult<T> = Result<T, WclError>;
