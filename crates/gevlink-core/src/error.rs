//! Error types surfaced by the control session.

use thiserror::Error;

/// Convenience alias for results carrying a [`DeviceError`].
pub type Result<T> = std::result::Result<T, DeviceError>;

/// Errors surfaced to callers of the control session.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A caller-supplied value could not be used (bad address family,
    /// unparsable string, out-of-range size).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// No conclusive acknowledge arrived within the full retry budget.
    #[error("GigEVision {operation} timeout")]
    Timeout {
        /// The operation that timed out, e.g. `read_register`.
        operation: &'static str,
    },
    /// The device answered with an error acknowledge.
    #[error("GigEVision {operation} error ({message})")]
    Protocol {
        /// The operation the device rejected.
        operation: &'static str,
        /// Decoded protocol status text.
        message: String,
    },
    /// The device reports zero stream channels.
    #[error("no stream channel found")]
    NoStreamChannel,
    /// Stream creation was attempted without control privilege.
    #[error("controller privilege required for streaming control")]
    NotController,
    /// Both XML URL slots failed or decompression yielded nothing.
    #[error("no usable Genicam data: {0}")]
    GenicamNotFound(String),
    /// Socket or allocation failure during session construction.
    #[error("{0}")]
    Unknown(String),
}

impl DeviceError {
    /// True when the error is the timeout kind.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DeviceError::Timeout { .. })
    }
}
