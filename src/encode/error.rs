//! Error types for option parsing and parameter resolution
//!
//! Option errors are local to one `key=value` pair and never abort a job.
//! Resolve errors stop the job from producing an encoder configuration.

use thiserror::Error;

use crate::hardware::Codec;

use super::resolver::ResolveState;

/// Outcome of applying a single encoder option
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionError {
    /// Empty or unrecognized option key
    #[error("bad key {key:?}")]
    BadName { key: String },

    /// The key is known but the value does not parse
    #[error("bad value {value:?} for key {key}")]
    BadValue { key: String, value: String },

    /// The adapter or codec cannot honour this option
    #[error("unsupported option {key}")]
    Unsupported { key: String },
}

impl OptionError {
    pub fn bad_value(key: &str, value: &str) -> Self {
        OptionError::BadValue {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn unsupported(key: &str) -> Self {
        OptionError::Unsupported {
            key: key.to_string(),
        }
    }

    /// Key the error refers to
    pub fn key(&self) -> &str {
        match self {
            OptionError::BadName { key }
            | OptionError::BadValue { key, .. }
            | OptionError::Unsupported { key } => key,
        }
    }
}

/// Errors that prevent an encode job from resolving
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    // =========================================================================
    // Job Errors
    // =========================================================================
    /// Neither a usable quality nor a bitrate was given
    #[error("invalid rate control (quality {quality}, bitrate {bitrate} kbps)")]
    InvalidRateControl { quality: f64, bitrate: u32 },

    /// The selected adapter has no working encoder for the codec
    #[error("{codec} encoder unavailable on the selected adapter")]
    Unavailable { codec: Codec },

    // =========================================================================
    // Usage Errors
    // =========================================================================
    /// A resolution step was called out of order
    #[error("cannot move from {from:?} to {to:?}")]
    InvalidTransition { from: ResolveState, to: ResolveState },
}

impl ResolveError {
    /// Check if retrying with different job parameters could succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ResolveError::InvalidRateControl { .. })
    }
}

/// Result type for parameter resolution
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
