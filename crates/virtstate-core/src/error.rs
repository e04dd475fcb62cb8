//! Error types for virtstate-core.

use thiserror::Error;
use virtstate_driver::DriverError;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while reconciling a request.
///
/// Caller-input errors (`InvalidState`, `ConflictingFlags`,
/// `MissingIdentity`, `UnrecognizedCommand`, `MissingXml`, `XmlNameMissing`,
/// `MissingAction`) are raised before any mutating driver call. Everything
/// is fatal; no retries happen at this layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Failure from the hypervisor driver
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// Desired-state token not recognized
    #[error("unexpected state: {0}")]
    InvalidState(String),

    /// `nvram` and `keep_nvram` requested together
    #[error("flags 'nvram' and 'keep_nvram' are mutually exclusive")]
    ConflictingFlags,

    /// A VM-scoped operation was requested without a VM name
    #[error("{0} requires a VM name")]
    MissingIdentity(String),

    /// Command token not recognized
    #[error("command {0} not recognized")]
    UnrecognizedCommand(String),

    /// Undefine-flag token not recognized
    #[error("unknown undefine flag: {0}")]
    UnknownFlag(String),

    /// `define` was requested without an XML descriptor
    #[error("define requires xml argument")]
    MissingXml,

    /// The XML descriptor carries no domain name
    #[error("could not find domain 'name' in xml")]
    XmlNameMissing,

    /// Neither a desired state nor a command was supplied
    #[error("expected state or command parameter to be specified")]
    MissingAction,

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
