//! Error types for virtstate-driver.

use thiserror::Error;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, DriverError>;

/// Hypervisor error code for "domain already exists", returned by some
/// hypervisors when defining a domain whose name is already registered.
pub const ERR_DOMAIN_EXISTS: i32 = 9;

/// Errors surfaced by a hypervisor driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Hypervisor unreachable or connection dropped
    #[error("hypervisor connection failure: {0}")]
    Connection(String),

    /// No VM with the given name on this connection
    #[error("virtual machine {0} not found")]
    VmNotFound(String),

    /// Raw hypervisor API failure, carrying the hypervisor's error code
    #[error("hypervisor error {code}: {message}")]
    Api {
        /// Hypervisor-native error code
        code: i32,
        /// Hypervisor-native error message
        message: String,
    },

    /// Operation not supported by this backend
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

impl DriverError {
    /// True if this is the benign "domain already exists" API failure.
    pub fn is_domain_exists(&self) -> bool {
        matches!(
            self,
            DriverError::Api {
                code: ERR_DOMAIN_EXISTS,
                ..
            }
        )
    }
}
