//! Error types for the catalog engine.

use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by the catalog engine.
///
/// Lookup misses are not errors (they come back as `Option`/`bool` on the
/// query surface); this type covers structural failures only: unreadable
/// storage, malformed documents, bad configuration.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Persisted storage could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document text is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The document parsed but does not have the expected shape.
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    /// A required file is missing.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The configuration file could not be parsed.
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
