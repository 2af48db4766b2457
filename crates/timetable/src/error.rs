//! Error types for timetable extraction and calendar compilation.

use thiserror::Error;

/// Errors that discard a single candidate table.
///
/// These never abort a run. The extraction loop logs them and moves on to the
/// next candidate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// One field could not be parsed from the notice string
    #[error("Unable to parse {field}: {reason}")]
    FieldExtractionFailed { field: &'static str, reason: String },

    /// The table has too many rows to be a single schedule entry
    #[error("Table has {children} child elements (limit {limit}), not a schedule entry")]
    StructuralRejection { children: usize, limit: usize },
}

impl ExtractionError {
    pub(crate) fn field(field: &'static str, reason: impl Into<String>) -> Self {
        ExtractionError::FieldExtractionFailed {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the field that failed, if this was a field failure.
    pub fn field_name(&self) -> Option<&'static str> {
        match self {
            ExtractionError::FieldExtractionFailed { field, .. } => Some(field),
            ExtractionError::StructuralRejection { .. } => None,
        }
    }
}

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum TimetableError {
    /// The input is neither a parsed document nor a readable stream
    #[error("Unsupported source: {message}")]
    UnsupportedSourceKind { message: String },

    /// The document contains no `<table>` elements at all
    #[error("No candidate tables found in the timetable document")]
    NoCandidatesFound,

    /// A course carries an interval tag we have no recurrence semantics for
    #[error("Unknown interval: {0}")]
    UnknownIntervalTag(String),

    /// The portal rejected the login
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// Reading the timetable failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl TimetableError {
    /// Returns true if this error means the parsed data itself cannot be
    /// represented, as opposed to the input never having been acquired.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            TimetableError::NoCandidatesFound | TimetableError::UnknownIntervalTag(_)
        )
    }

    /// Returns true if this error happened while acquiring the document.
    pub fn is_acquisition_error(&self) -> bool {
        matches!(
            self,
            TimetableError::AuthenticationFailed { .. }
                | TimetableError::Network { .. }
                | TimetableError::UnsupportedSourceKind { .. }
                | TimetableError::Io(_)
        )
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        TimetableError::Config {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TimetableError {
    fn from(err: reqwest::Error) -> Self {
        TimetableError::Network {
            message: err.to_string(),
        }
    }
}

impl From<url::ParseError> for TimetableError {
    fn from(err: url::ParseError) -> Self {
        TimetableError::Config {
            message: format!("invalid portal URL: {}", err),
        }
    }
}

impl From<serde_json::Error> for TimetableError {
    fn from(err: serde_json::Error) -> Self {
        TimetableError::Config {
            message: err.to_string(),
        }
    }
}
