//! Hardware generation classification
//!
//! Vendor platform codes are mapped to a CPU platform family, then to an
//! ordered [`GenerationTier`]. Every "is feature X supported on this
//! hardware" decision in the crate is a comparison against a tier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vendor-reported platform code name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformCode(pub u16);

impl PlatformCode {
    pub const UNKNOWN: Self = Self(0);
    pub const SANDYBRIDGE: Self = Self(1);
    pub const IVYBRIDGE: Self = Self(2);
    pub const HASWELL: Self = Self(3);
    pub const BAYTRAIL: Self = Self(4);
    pub const BROADWELL: Self = Self(5);
    pub const CHERRYTRAIL: Self = Self(6);
    pub const SKYLAKE: Self = Self(7);
    pub const APOLLOLAKE: Self = Self(8);
    pub const KABYLAKE: Self = Self(9);
    pub const GEMINILAKE: Self = Self(10);
    pub const COFFEELAKE: Self = Self(11);
    pub const CANNONLAKE: Self = Self(20);
    pub const ICELAKE: Self = Self(30);
    pub const JASPERLAKE: Self = Self(32);
    pub const ELKHARTLAKE: Self = Self(33);
    pub const TIGERLAKE: Self = Self(40);
    pub const ROCKETLAKE: Self = Self(42);
    pub const ALDERLAKE_S: Self = Self(43);
    pub const ALDERLAKE_P: Self = Self(44);
    pub const ARCTICSOUND_P: Self = Self(45);
    pub const DG2: Self = Self(46);
    pub const KEEMBAY: Self = Self(50);
    pub const METEORLAKE: Self = Self(51);
    pub const BATTLEMAGE: Self = Self(52);
    pub const LUNARLAKE: Self = Self(53);
    pub const ARROWLAKE: Self = Self(54);
    pub const ALDERLAKE_N: Self = Self(55);

    const NAMES: [(Self, &'static str); 28] = [
        (Self::UNKNOWN, "unknown"),
        (Self::SANDYBRIDGE, "sandybridge"),
        (Self::IVYBRIDGE, "ivybridge"),
        (Self::HASWELL, "haswell"),
        (Self::BAYTRAIL, "baytrail"),
        (Self::BROADWELL, "broadwell"),
        (Self::CHERRYTRAIL, "cherrytrail"),
        (Self::SKYLAKE, "skylake"),
        (Self::APOLLOLAKE, "apollolake"),
        (Self::KABYLAKE, "kabylake"),
        (Self::GEMINILAKE, "geminilake"),
        (Self::COFFEELAKE, "coffeelake"),
        (Self::CANNONLAKE, "cannonlake"),
        (Self::ICELAKE, "icelake"),
        (Self::JASPERLAKE, "jasperlake"),
        (Self::ELKHARTLAKE, "elkhartlake"),
        (Self::TIGERLAKE, "tigerlake"),
        (Self::ROCKETLAKE, "rocketlake"),
        (Self::ALDERLAKE_S, "alderlake-s"),
        (Self::ALDERLAKE_P, "alderlake-p"),
        (Self::ARCTICSOUND_P, "arcticsound-p"),
        (Self::DG2, "dg2"),
        (Self::KEEMBAY, "keembay"),
        (Self::METEORLAKE, "meteorlake"),
        (Self::BATTLEMAGE, "battlemage"),
        (Self::LUNARLAKE, "lunarlake"),
        (Self::ARROWLAKE, "arrowlake"),
        (Self::ALDERLAKE_N, "alderlake-n"),
    ];

    /// Look up a platform by its code name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_lowercase().replace('_', "-");
        Self::NAMES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(code, _)| *code)
    }

    /// Code name, if the platform is known
    pub fn code_name(&self) -> Option<&'static str> {
        Self::NAMES
            .iter()
            .find(|(code, _)| code == self)
            .map(|(_, n)| *n)
    }
}

impl fmt::Display for PlatformCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code_name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "platform-{}", self.0),
        }
    }
}

/// CPU platform family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuPlatform {
    Unspecified,
    Bnl,
    Snb,
    Ivb,
    Slm,
    Cht,
    Hsw,
    Bdw,
    Skl,
    Kbl,
    Cml,
    Icl,
    Tgl,
    Adl,
    Dg2,
    Lnl,
}

impl CpuPlatform {
    pub fn from_platform_code(code: PlatformCode) -> Self {
        match code {
            PlatformCode::SANDYBRIDGE => CpuPlatform::Snb,
            PlatformCode::IVYBRIDGE => CpuPlatform::Ivb,
            PlatformCode::HASWELL => CpuPlatform::Hsw,
            PlatformCode::BAYTRAIL | PlatformCode::BROADWELL => CpuPlatform::Bdw,
            PlatformCode::CHERRYTRAIL => CpuPlatform::Cht,
            PlatformCode::SKYLAKE => CpuPlatform::Skl,
            // Coffee Lake and friends share the Kaby Lake media engine
            PlatformCode::APOLLOLAKE
            | PlatformCode::KABYLAKE
            | PlatformCode::GEMINILAKE
            | PlatformCode::COFFEELAKE
            | PlatformCode::CANNONLAKE => CpuPlatform::Kbl,
            PlatformCode::ICELAKE => CpuPlatform::Icl,
            PlatformCode::ELKHARTLAKE
            | PlatformCode::JASPERLAKE
            | PlatformCode::TIGERLAKE
            | PlatformCode::ROCKETLAKE => CpuPlatform::Tgl,
            PlatformCode::ALDERLAKE_S | PlatformCode::ALDERLAKE_P => CpuPlatform::Adl,
            PlatformCode::ARCTICSOUND_P
            | PlatformCode::DG2
            | PlatformCode::ALDERLAKE_N
            | PlatformCode::KEEMBAY
            | PlatformCode::METEORLAKE
            | PlatformCode::BATTLEMAGE
            | PlatformCode::ARROWLAKE => CpuPlatform::Dg2,
            PlatformCode::LUNARLAKE => CpuPlatform::Lnl,
            _ => CpuPlatform::Unspecified,
        }
    }
}

/// Ordered hardware generation
///
/// `Unspecified` is the bottom sentinel: platforms the table does not know
/// about compare below every real generation and so fail every gate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum GenerationTier {
    #[default]
    Unspecified,
    G0,
    G1,
    G2,
    G3,
    G4,
    G5,
    G6,
    G7,
    G8,
    G9,
    G10,
}

impl GenerationTier {
    pub fn from_cpu_platform(platform: CpuPlatform) -> Self {
        match platform {
            CpuPlatform::Bnl => GenerationTier::G0,
            CpuPlatform::Snb => GenerationTier::G1,
            CpuPlatform::Ivb | CpuPlatform::Slm | CpuPlatform::Cht => GenerationTier::G2,
            CpuPlatform::Hsw => GenerationTier::G3,
            CpuPlatform::Bdw => GenerationTier::G4,
            CpuPlatform::Skl => GenerationTier::G5,
            CpuPlatform::Kbl | CpuPlatform::Cml => GenerationTier::G6,
            CpuPlatform::Icl => GenerationTier::G7,
            CpuPlatform::Tgl | CpuPlatform::Adl => GenerationTier::G8,
            CpuPlatform::Dg2 => GenerationTier::G9,
            CpuPlatform::Lnl => GenerationTier::G10,
            CpuPlatform::Unspecified => GenerationTier::Unspecified,
        }
    }
}

impl fmt::Display for GenerationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            GenerationTier::Unspecified => return write!(f, "unspecified"),
            GenerationTier::G0 => 0,
            GenerationTier::G1 => 1,
            GenerationTier::G2 => 2,
            GenerationTier::G3 => 3,
            GenerationTier::G4 => 4,
            GenerationTier::G5 => 5,
            GenerationTier::G6 => 6,
            GenerationTier::G7 => 7,
            GenerationTier::G8 => 8,
            GenerationTier::G9 => 9,
            GenerationTier::G10 => 10,
        };
        write!(f, "G{n}")
    }
}

/// Classify a vendor platform code. Never fails.
pub fn classify(code: PlatformCode) -> GenerationTier {
    GenerationTier::from_cpu_platform(CpuPlatform::from_platform_code(code))
}

/// Hardware decode support implied by a generation tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DecodeSupport {
    pub h264: bool,
    pub hevc: bool,
    pub hevc_10bit: bool,
    pub av1: bool,
    pub vvc: bool,
}

impl DecodeSupport {
    pub fn for_tier(tier: GenerationTier) -> Self {
        Self {
            h264: tier >= GenerationTier::G1,
            hevc: tier >= GenerationTier::G5,
            hevc_10bit: tier >= GenerationTier::G6,
            av1: tier >= GenerationTier::G8,
            vvc: tier > GenerationTier::G9,
        }
    }
}
