//! Error taxonomy for the diary engine.
//!
//! Validation problems never reach storage; storage problems never touch the
//! previously persisted collection; lookup problems never touch diary state.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("diary entry cannot be empty, please put data")]
    EmptyEntry,

    #[error("{field} must be a number, got '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field} is required for every reading")]
    MissingField { field: &'static str },

    #[error("one of your glucose readings was {lowest} mmol/L, please explain why")]
    HypoReasonRequired { lowest: f64 },

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    #[error("invalid time '{0}'")]
    InvalidTime(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend failed: {0:#}")]
    Backend(#[source] anyhow::Error),

    #[error("storage call for '{key}' did not complete within {after_ms} ms")]
    Timeout { key: String, after_ms: u64 },

    /// A write timed out and the store could not be read back to tell
    /// whether it landed. Reload before saving again.
    #[error("could not confirm whether the write to '{key}' was applied")]
    Unconfirmed { key: String },

    #[error("stored value under '{key}' is not valid: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<anyhow::Error> for StorageError {
    fn from(err: anyhow::Error) -> Self {
        StorageError::Backend(err)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LookupError {
    #[error("Error - no product found in database for barcode {barcode}")]
    NotFound { barcode: String },

    #[error("'{0}' is not an EAN/GTIN barcode")]
    InvalidBarcode(String),

    #[error("lookup request failed: {0}")]
    Transport(String),

    #[error("lookup response could not be read: {0}")]
    Malformed(String),
}

/// Result of every diary save.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("a save for this diary is already in progress")]
    SaveInFlight,
}

impl PersistError {
    /// Validation failures are fixed by the user editing the form; everything
    /// else is reported and the form is left as it was.
    pub fn is_validation(&self) -> bool {
        matches!(self, PersistError::Validation(_))
    }
}
