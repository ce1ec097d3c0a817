//! Error taxonomy for capture operations.

use thiserror::Error;

/// Errors that can occur while recording.
///
/// Every variant carries enough context to be surfaced to a host
/// application as-is. Variants compare equal by kind and payload, which
/// lets delegates and tests match on them directly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// The OS denied access to a capture device.
    #[error("permission denied")]
    PermissionDenied,

    /// The requested capture device does not exist or cannot be opened.
    #[error("device not available")]
    DeviceNotAvailable,

    /// Invalid configuration, or an operation issued in the wrong state.
    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    /// PCM conversion or container encoding failed.
    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    /// A chunk could not be sealed or opened by the configured cipher.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// File system failure while writing or finalizing a recording.
    #[error("storage error: {0}")]
    StorageError(String),

    /// An operation did not complete in time.
    #[error("timeout")]
    Timeout,

    /// Anything the other variants do not cover.
    #[error("unknown error: {0}")]
    Unknown(String),
}
