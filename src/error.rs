//! Error types shared across the crate.
//!
//! Only malformed interventions and invalid configuration surface to callers.
//! Reference-data and sensor failures are recovered where they happen and
//! only show up in logs, but they still get typed errors so the recovery
//! sites can say what went wrong.

use std::path::PathBuf;

/// A structured intervention that cannot be applied as written.
#[derive(Debug, thiserror::Error)]
pub enum InterventionError {
    /// The payload is not valid JSON or does not match the intervention shape.
    #[error("intervention payload is malformed: {0}")]
    Malformed(String),

    /// A modification carries a `type` the engine does not know.
    #[error("modification #{index} has unknown type '{kind}'")]
    UnknownKind {
        /// Position of the modification in the list.
        index: usize,
        /// The unrecognised type tag.
        kind: String,
    },

    /// A modification omits the `type` tag entirely.
    #[error("modification #{index} is missing its 'type' field")]
    MissingKind {
        /// Position of the modification in the list.
        index: usize,
    },

    /// A modification omits a field its type requires.
    #[error("modification #{index} ({kind}) is missing required field '{field}'")]
    MissingField {
        /// Position of the modification in the list.
        index: usize,
        /// The modification type.
        kind: &'static str,
        /// The missing field name.
        field: &'static str,
    },

    /// A numeric field is not finite or lies outside its accepted range.
    #[error("modification #{index} ({kind}) has out-of-range '{field}': {value}")]
    OutOfRange {
        /// Position of the modification in the list.
        index: usize,
        /// The modification type.
        kind: &'static str,
        /// The offending field name.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// Failure loading static reference data (boundaries, hotspot tables).
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file was read but its contents were unusable.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

/// Failure acquiring sensor measurements.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// HTTP transport failure or non-success status.
    #[error("measurement request failed: {0}")]
    Transport(String),

    /// The response body did not have the expected shape.
    #[error("measurement payload malformed: {0}")]
    Payload(String),

    /// The fetch did not finish within the configured timeout.
    #[error("measurement fetch timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Reading a local measurement file failed.
    #[error("failed to read measurement file {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Configuration that loaded but cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field holds a value outside its valid range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
