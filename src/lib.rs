//! # lamco-qsv
//!
//! Intel Quick Sync adapter discovery, capability probing and encoder
//! parameter resolution.
//!
//! # Architecture
//!
//! ```text
//! lamco-qsv
//!   ├─> hardware   adapters, generation tiers, capability probe, reports
//!   ├─> encode     option registry, job setup, parameter resolver
//!   ├─> config     TOML configuration for the CLI
//!   └─> utils      user-facing error formatting
//! ```
//!
//! # Data Flow
//!
//! **Discovery:** DeviceRuntime → AdapterRegistry → CodecCapabilityProfile per codec
//!
//! **Encode job:** JobParameters → EncodeJob (options, sanitize, resolve) → ResolvedEncode
//!
//! The vendor runtime sits behind the [`hardware::DeviceRuntime`] and
//! [`hardware::DeviceSession`] traits. [`hardware::scripted::ScriptedRuntime`]
//! implements them from a TOML fixture.

#![warn(clippy::all)]

/// Configuration
pub mod config;

/// Encoder parameter resolution
pub mod encode;

/// Adapter discovery and capability probing
pub mod hardware;

/// Utility functions
pub mod utils;
