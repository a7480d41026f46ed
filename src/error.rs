//! Unified error types for the metsrw library.
//!
//! All fallible operations in this crate return [`Result`], with one error
//! enum covering parse failures, tree mutation rejections and lookup misses.
//! No operation retries internally; failures are synchronous, and mutating
//! operations reject before touching any state.
use thiserror::Error;

/// Main error type for metsrw operations.
#[derive(Error, Debug)]
pub enum MetsError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Low-level XML syntax error from the parser
    #[error("XML error: {0}")]
    Xml(String),

    /// Structurally invalid input: dangling references, missing mandatory sections
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// Unrecognized document root or namespace
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Tree mutation would create a cycle or self-parent
    #[error("Cycle in entry tree: {0}")]
    Cycle(String),

    /// Operation invalid for the entry kind, e.g. adding a child to an item
    #[error("Invalid entry kind: {0}")]
    InvalidEntryType(String),

    /// Identifier lookup matched more than one entry
    #[error("Ambiguous identifier: {0}")]
    AmbiguousIdentifier(String),

    /// Entry, section or subsection not present in the document
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not valid in the current state, e.g. replacing a superseded revision
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// PREMIS content that the adapter cannot interpret
    #[error("Malformed PREMIS record: {0}")]
    MalformedRecord(String),

    /// Invalid value passed by the caller
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for metsrw operations.
pub type Result<T> = std::result::Result<T, MetsError>;
