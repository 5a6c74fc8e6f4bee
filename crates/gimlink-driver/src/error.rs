use std::path::PathBuf;

/// Errors that can occur in driver operations.
///
/// Per-command delivery results are reported through
/// [`SendOutcome`](crate::SendOutcome), not through this type.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// Link-level error.
    #[error("transport error: {0}")]
    Transport(#[from] gimlink_transport::TransportError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A command table file could not be read.
    #[error("failed to read command table {path}: {source}")]
    CommandTable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The command name is not in the command table.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;
