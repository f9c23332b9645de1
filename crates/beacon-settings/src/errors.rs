//! Settings error types.
//!
//! Every variant names the file, section, or field at fault so the binary can
//! report a problem and keep the rest of the configuration.

use std::path::PathBuf;

use thiserror::Error;

/// A problem found while loading or validating settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The settings file is not valid JSON.
    #[error("{} is not valid JSON: {source}", .path.display())]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Parser error, with line and column.
        #[source]
        source: serde_json::Error,
    },
    /// The settings file holds JSON, but not an object.
    #[error("{} must contain a JSON object", .path.display())]
    NotAnObject {
        /// File that failed.
        path: PathBuf,
    },
    /// A section has the wrong shape, e.g. a string where a number belongs.
    #[error("settings section `{section}` is malformed: {source}")]
    Section {
        /// Top-level key such as `server`.
        section: &'static str,
        /// Decoding error.
        #[source]
        source: serde_json::Error,
    },
    /// A value the server cannot run with.
    #[error("{field} {reason}")]
    InvalidValue {
        /// Dotted camelCase path, e.g. `presence.presenceTtlMs`.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl SettingsError {
    /// Shorthand for [`SettingsError::InvalidValue`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// The dotted field this error is about, when it concerns one value.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidValue { field, .. } => Some(*field),
            _ => None,
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
