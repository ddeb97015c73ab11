//! Error types for adapter discovery and capability probing
//!
//! Discovery errors are structural: they mean the job cannot use hardware
//! acceleration at all. Probe errors are per-call and never escape the
//! probe; they only leave a capability flag unset.

use thiserror::Error;

use super::Codec;

/// Errors raised while building or querying the adapter registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    // =========================================================================
    // Fatal Errors
    // =========================================================================
    /// The vendor runtime loader could not be created
    #[error("Vendor runtime loader unavailable: {reason}")]
    LoaderUnavailable { reason: String },

    /// Enumeration finished without recording a single adapter
    #[error("No hardware adapters found: {reason}")]
    NoAdapters { reason: String },

    // =========================================================================
    // Usage Errors
    // =========================================================================
    /// Discovery was run twice on the same registry
    #[error("Adapter registry already initialized")]
    AlreadyInitialized,

    /// The requested adapter index was never discovered
    #[error("Adapter {index} not found")]
    AdapterNotFound { index: u32 },
}

impl DiscoveryError {
    /// Check if this error means hardware encoding is unavailable for the
    /// whole process (vs a caller mistake)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DiscoveryError::LoaderUnavailable { .. } | DiscoveryError::NoAdapters { .. }
        )
    }
}

/// Errors from a single vendor call made during probing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The vendor call returned an error status
    #[error("{call}() failed with status {status}")]
    CallFailed { call: &'static str, status: i32 },

    /// The runtime answered for a different codec than the one requested
    #[error("Query returned codec {returned:?}, expected {expected}")]
    CodecMismatch {
        expected: Codec,
        returned: Option<Codec>,
    },

    /// No session could be opened for the request
    #[error("Session unavailable: {0}")]
    SessionUnavailable(String),
}

impl ProbeError {
    /// Vendor status carried by this error, if any
    pub fn status(&self) -> Option<i32> {
        match self {
            ProbeError::CallFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for discovery operations
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

/// Result type for single probe calls
pub type ProbeResult<T> = std::result::Result<T, ProbeError>;

/// Wrap a raw vendor status code
///
/// The vendor layer reports success as any status `>= 0`; negative values
/// are errors and positive values are warnings.
pub fn check_status(call: &'static str, status: i32) -> ProbeResult<()> {
    if status >= 0 {
        Ok(())
    } else {
        Err(ProbeError::CallFailed { call, status })
    }
}
