//! Quick Sync adapter discovery and capability probing
//!
//! This module owns everything that talks to the vendor runtime: enumerating
//! adapters, classifying their hardware generation, and probing what each
//! codec/implementation combination can really do.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        AdapterRegistry                           │
//! │  discover() ─► enumerate ─► platform query ─► classify()         │
//! │                     │                                            │
//! │                     ▼                                            │
//! │        per adapter: software pass, hardware pass                 │
//! │                     │                                            │
//! │                     ▼                                            │
//! │              CapabilityProbe::probe()                            │
//! │   availability (query + init) ─► gates ─► isolated queries       │
//! └─────────────────────┬────────────────────────────────────────────┘
//!                       │ DeviceRuntime / DeviceSession / DisplayProvider
//!                       ▼
//!              vendor runtime (real or scripted)
//! ```
//!
//! The vendor API is unreliable: a successful capability query does not mean
//! the encoder will initialize, and some flags are reported on hardware that
//! cannot honour them. The probe therefore cross-checks availability with a
//! real init/close cycle and gates several flags on [`GenerationTier`].
//!
//! # Adapter selection
//!
//! There is no process-wide "current adapter". Jobs obtain an
//! [`AdapterContext`] from the registry and pass it explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod adapters;
pub mod capabilities;
pub mod error;
pub mod generation;
pub mod probe;
pub mod report;
pub mod scripted;
pub mod session;

pub use adapters::{
    AdapterContext, AdapterDescriptor, AdapterDetails, AdapterRegistry, ImplementationPreference,
};
pub use capabilities::{CapabilityFlag, CapabilitySet};
pub use error::{DiscoveryError, DiscoveryResult, ProbeError, ProbeResult};
pub use generation::{classify, CpuPlatform, DecodeSupport, GenerationTier, PlatformCode};
pub use probe::{probe, CodecCapabilityProfile, ProbeTarget};
pub use session::{DeviceRuntime, DeviceSession, DisplayHandle, DisplayProvider};

/// Minimum vendor API version accepted for any implementation
pub const MINIMUM_API_VERSION: ApiVersion = ApiVersion::new(1, 3);

/// PCI vendor id used to filter enumerated implementations
pub const INTEL_VENDOR_ID: u32 = 0x8086;

/// Video codecs the encoder can be probed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    Avc,
    Hevc,
    Av1,
}

impl Codec {
    /// All codecs, in probing order
    pub const ALL: [Codec; 3] = [Codec::Avc, Codec::Hevc, Codec::Av1];

    /// Human-readable codec name
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Avc => "H.264",
            Codec::Hevc => "H.265",
            Codec::Av1 => "AV1",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Software (CPU) or hardware-accelerated codec path
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImplementationKind {
    Software,
    Hardware,
}

impl ImplementationKind {
    pub fn is_hardware(&self) -> bool {
        matches!(self, ImplementationKind::Hardware)
    }

    /// The other implementation kind
    pub fn other(&self) -> Self {
        match self {
            ImplementationKind::Software => ImplementationKind::Hardware,
            ImplementationKind::Hardware => ImplementationKind::Software,
        }
    }
}

impl fmt::Display for ImplementationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImplementationKind::Software => write!(f, "software"),
            ImplementationKind::Hardware => write!(f, "hardware"),
        }
    }
}

impl FromStr for ImplementationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "software" | "sw" => Ok(ImplementationKind::Software),
            "hardware" | "hw" => Ok(ImplementationKind::Hardware),
            other => Err(format!("unknown implementation kind: {other}")),
        }
    }
}

/// Job-facing encoder identity (codec plus bit depth)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    H264,
    H265,
    H265_10bit,
    Av1,
    Av1_10bit,
}

impl EncoderKind {
    pub const ALL: [EncoderKind; 5] = [
        EncoderKind::H264,
        EncoderKind::H265,
        EncoderKind::H265_10bit,
        EncoderKind::Av1,
        EncoderKind::Av1_10bit,
    ];

    pub fn codec(&self) -> Codec {
        match self {
            EncoderKind::H264 => Codec::Avc,
            EncoderKind::H265 | EncoderKind::H265_10bit => Codec::Hevc,
            EncoderKind::Av1 | EncoderKind::Av1_10bit => Codec::Av1,
        }
    }

    pub fn is_10bit(&self) -> bool {
        matches!(self, EncoderKind::H265_10bit | EncoderKind::Av1_10bit)
    }

    /// Short encoder identifier
    pub fn name(&self) -> &'static str {
        match self {
            EncoderKind::H264 => "qsv_h264",
            EncoderKind::H265 => "qsv_h265",
            EncoderKind::H265_10bit => "qsv_h265_10bit",
            EncoderKind::Av1 => "qsv_av1",
            EncoderKind::Av1_10bit => "qsv_av1_10bit",
        }
    }
}

impl fmt::Display for EncoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EncoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        let name = lower.strip_prefix("qsv_").unwrap_or(&lower);
        match name {
            "h264" | "avc" => Ok(EncoderKind::H264),
            "h265" | "hevc" => Ok(EncoderKind::H265),
            "h265_10bit" | "hevc10" | "hevc_10bit" => Ok(EncoderKind::H265_10bit),
            "av1" => Ok(EncoderKind::Av1),
            "av1_10bit" | "av1_10" => Ok(EncoderKind::Av1_10bit),
            _ => Err(format!("unknown encoder: {s}")),
        }
    }
}

/// Vendor API version pair
///
/// Compared the way the vendor runtime does it: `major * 1000 + minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
}

impl ApiVersion {
    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub const fn as_number(&self) -> u32 {
        self.major as u32 * 1000 + self.minor as u32
    }

    /// True if this version is `major.minor` or newer
    pub const fn at_least(&self, major: u16, minor: u16) -> bool {
        self.as_number() >= major as u32 * 1000 + minor as u32
    }

    pub const fn is_minimum_supported(&self) -> bool {
        self.at_least(MINIMUM_API_VERSION.major, MINIMUM_API_VERSION.minor)
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_number().cmp(&other.as_number())
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for ApiVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| format!("invalid API version '{s}' (expected MAJOR.MINOR)"))?;
        let major = major
            .parse()
            .map_err(|_| format!("invalid API major version in '{s}'"))?;
        let minor = minor
            .parse()
            .map_err(|_| format!("invalid API minor version in '{s}'"))?;
        Ok(Self::new(major, minor))
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ApiVersion> for String {
    fn from(version: ApiVersion) -> Self {
        version.to_string()
    }
}
