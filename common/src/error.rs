//! # Error Taxonomy
//!
//! Every public operation of the printer subsystem reports failure through
//! [`PrinterError`]. Collaborator seams (vendor connection, USB host, renderer)
//! speak `anyhow` and are folded into one of these variants at the boundary.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrinterError {
    /// Malformed IP, MAC or CIDR input. Always a caller error.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A parameter other than an address failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No attached USB device matches the requested identity.
    #[error("USB device not found: {0}")]
    DeviceNotFound(String),

    /// USB permission has not been granted for the device.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection interrupted: {0}")]
    ConnectionInterrupted(String),

    /// A bounded wait expired.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The vendor collaborator raised an unexpected error while sending or reading.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Disconnect was requested for an identity with no live connection.
    #[error("no active connection for {0}")]
    NotConnected(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl PrinterError {
    /// Transport-level failures that a bounded retry may recover from.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PrinterError::ConnectionFailed(_)
                | PrinterError::ConnectionInterrupted(_)
                | PrinterError::Timeout(_)
                | PrinterError::DeviceNotFound(_)
        )
    }

    pub fn protocol(err: anyhow::Error) -> Self {
        PrinterError::Protocol(format!("{err:#}"))
    }
}

pub type PrinterResult<T> = Result<T, PrinterError>;

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
