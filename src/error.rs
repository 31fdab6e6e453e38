//! # Error Handling
//!
//! This module defines the centralized error type for configcrunch. It uses
//! `thiserror` to produce a single `Error` enum covering every failure mode
//! the document algebra can surface, with enough context (offending path,
//! document label, contributing source file) to diagnose a bad configuration
//! tree without re-running anything.
//!
//! ## Key Components
//!
//! - **`Error`**: the exhaustive error enum. Each variant corresponds to one
//!   category from the document algebra: malformed documents, missing or
//!   cyclic references, misplaced remove-markers, failed schema validation,
//!   and template rendering failures. Collaborator errors (`serde_yaml`,
//!   `jsonschema`, `minijinja`, `std::io`) are wrapped rather than
//!   stringified, so callers retain the ability to match on them.
//!
//! - **`Result<T>`**: a type alias for `std::result::Result<T, Error>`, used
//!   throughout the crate.

use thiserror::Error as ThisError;

/// The error type returned by every fallible configcrunch operation.
#[derive(ThisError, Debug)]
pub enum Error {
    /// A YAML document did not parse to the shape a configuration document
    /// requires (e.g. the top level was not a mapping).
    #[error("invalid document{}: {message}", label_suffix(.label))]
    InvalidDocument { label: Option<String>, message: String },

    /// The top-level mapping's single key did not match the expected header
    /// for this document kind.
    #[error("invalid header{}: expected `{expected}`, found `{found}`", label_suffix(.label))]
    InvalidHeader {
        label: Option<String>,
        expected: String,
        found: String,
    },

    /// A `$remove` or `$remove::<payload>` sentinel was found in a position
    /// the final sweep cannot act on (e.g. as a whole document body).
    #[error("invalid `$remove` marker{}: {message}", label_suffix(.label))]
    InvalidRemove { label: Option<String>, message: String },

    /// A `$ref` path did not resolve to any file across the configured
    /// repository roots.
    #[error("referenced document not found: `{reference}`{}", source_suffix(.source_path))]
    ReferencedDocumentNotFound {
        reference: String,
        source_path: Option<String>,
    },

    /// A `$ref` chain revisited a document already present in its own
    /// resolution chain.
    #[error("circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// Rendering a template string failed, or the resolver's fixed-point
    /// iteration bound was exceeded.
    #[error("variable processing error in `{template}`{}: {message}", label_suffix(.label))]
    VariableProcessingError {
        label: Option<String>,
        template: String,
        message: String,
    },

    /// The kind's JSON Schema rejected a document body.
    #[cfg(feature = "schema-validation")]
    #[error("schema validation failed{}: {message}", label_suffix(.label))]
    SchemaValidation { label: Option<String>, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A template engine error, wrapped from `minijinja::Error`.
    #[cfg(feature = "variables")]
    #[error("template engine error: {0}")]
    Template(#[from] minijinja::Error),
}

fn label_suffix(label: &Option<String>) -> String {
    match label {
        Some(l) => format!(" in `{l}`"),
        None => String::new(),
    }
}

fn source_suffix(path: &Option<String>) -> String {
    match path {
        Some(p) => format!(" (referenced from {p})"),
        None => String::new(),
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
