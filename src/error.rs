//! Error types for sparqlate.
//!
//! All errors that can occur while compiling or executing a query are
//! represented by [`SparqlateError`]. Errors are propagated via
//! `Result<T, SparqlateError>` throughout the crate and surfaced unchanged to
//! the caller; nothing is retried or recovered internally.
//!
//! # Error Classification
//!
//! Errors are classified into categories for callers that want to react to
//! them differently:
//! - **Compile** — an expression or result-operator shape outside the
//!   supported grammar. Raised before any store round-trip.
//! - **Syntax** — query text that the preprocessor cannot tokenize.
//! - **Resolution** — a member or ordering that cannot be mapped to a
//!   predicate or variable.
//! - **Cardinality** — a single-result request that received zero or several
//!   rows.
//! - **Configuration** — invalid configuration input.
//! - **Store** — failures reported by the store client or malformed result sets.
//! - **Internal** — bugs.

use std::fmt;

/// Primary error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum SparqlateError {
    // ── Compile-time errors ──────────────────────────────────────────────
    /// An expression node kind or combination outside the supported grammar.
    #[error("unsupported query shape: {0}")]
    UnsupportedShape(String),

    /// An ordering or projection refers to something that has no variable,
    /// or a member that the mapping layer cannot resolve to a predicate.
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),

    // ── Query text errors ────────────────────────────────────────────────
    /// The preprocessor could not tokenize the query text.
    #[error("malformed query text at offset {offset}: {message}")]
    MalformedTokenStream { offset: usize, message: String },

    // ── Result errors ────────────────────────────────────────────────────
    /// A single-result request received the wrong number of rows.
    #[error("expected {expected} but the query returned {found} row(s)")]
    CardinalityMismatch { expected: &'static str, found: usize },

    /// A result set returned by the store could not be parsed.
    #[error("malformed result set: {0}")]
    Results(String),

    /// The store client reported a failure.
    #[error("store error: {0}")]
    Store(String),

    // ── Configuration errors ─────────────────────────────────────────────
    /// The configuration could not be parsed or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    // ── Internal errors (should not happen) ──────────────────────────────
    /// An unexpected internal error. Indicates a bug.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for SparqlateError {
    fn from(err: serde_json::Error) -> Self {
        SparqlateError::Results(err.to_string())
    }
}

impl From<toml::de::Error> for SparqlateError {
    fn from(err: toml::de::Error) -> Self {
        SparqlateError::Config(err.to_string())
    }
}

/// Classification of errors for callers and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparqlateErrorKind {
    Compile,
    Syntax,
    Resolution,
    Cardinality,
    Configuration,
    Store,
    Internal,
}

impl fmt::Display for SparqlateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SparqlateErrorKind::Compile => write!(f, "COMPILE"),
            SparqlateErrorKind::Syntax => write!(f, "SYNTAX"),
            SparqlateErrorKind::Resolution => write!(f, "RESOLUTION"),
            SparqlateErrorKind::Cardinality => write!(f, "CARDINALITY"),
            SparqlateErrorKind::Configuration => write!(f, "CONFIGURATION"),
            SparqlateErrorKind::Store => write!(f, "STORE"),
            SparqlateErrorKind::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl SparqlateError {
    /// Classify the error.
    pub fn kind(&self) -> SparqlateErrorKind {
        match self {
            SparqlateError::UnsupportedShape(_) => SparqlateErrorKind::Compile,
            SparqlateError::MalformedTokenStream { .. } => SparqlateErrorKind::Syntax,
            SparqlateError::UnresolvedReference(_) => SparqlateErrorKind::Resolution,
            SparqlateError::CardinalityMismatch { .. } => SparqlateErrorKind::Cardinality,
            SparqlateError::Config(_) => SparqlateErrorKind::Configuration,
            SparqlateError::Results(_) | SparqlateError::Store(_) => SparqlateErrorKind::Store,
            SparqlateError::InternalError(_) => SparqlateErrorKind::Internal,
        }
    }

    /// Whether the error is raised while building query text, i.e. before
    /// anything is sent to the store.
    pub fn raised_before_execution(&self) -> bool {
        matches!(
            self.kind(),
            SparqlateErrorKind::Compile
                | SparqlateErrorKind::Syntax
                | SparqlateErrorKind::Resolution
                | SparqlateErrorKind::Configuration
        )
    }

    /// Shorthand used by the compiler for unsupported constructs.
    pub(crate) fn unsupported(what: impl Into<String>) -> Self {
        SparqlateError::UnsupportedShape(what.into())
    }
}

pub type Result<T> = std::result::Result<T, SparqlateError>;
