//! Per-job setup helpers
//!
//! Everything a caller needs before building an [`EncodeJob`]: picking the
//! adapter from the `gpu` option, async depth and memory type defaults,
//! profile names, and the quality scale shown to users.
//!
//! [`EncodeJob`]: super::resolver::EncodeJob

use serde::Serialize;
use tracing::{info, warn};

use crate::hardware::session::MemoryType;
use crate::hardware::{
    AdapterContext, AdapterRegistry, CapabilityFlag, CapabilitySet, Codec, EncoderKind,
    GenerationTier,
};

use super::config::{CodecProfile, EncodeConfiguration, JobParameters, ScalingMode};
use super::error::OptionError;
use super::options::parse_int;

/// Async depth below [`GenerationTier::G7`]
pub const DEFAULT_ASYNC_DEPTH: u16 = 4;

/// Async depth from [`GenerationTier::G7`] on
pub const MODERN_ASYNC_DEPTH: u16 = 6;

// =============================================================================
// Profiles
// =============================================================================

const AVC_PROFILES: &[(&str, CodecProfile)] = &[
    ("baseline", CodecProfile::AvcBaseline),
    ("main", CodecProfile::AvcMain),
    ("extended", CodecProfile::AvcExtended),
    ("high", CodecProfile::AvcHigh),
    ("high422", CodecProfile::AvcHigh422),
    ("constrained-baseline", CodecProfile::AvcConstrainedBaseline),
    ("constrained-high", CodecProfile::AvcConstrainedHigh),
    ("progressive-high", CodecProfile::AvcProgressiveHigh),
];

const HEVC_PROFILES: &[(&str, CodecProfile)] = &[
    ("main", CodecProfile::HevcMain),
    ("main10", CodecProfile::HevcMain10),
    ("mainstillpicture", CodecProfile::HevcMainStillPicture),
];

const AV1_PROFILES: &[(&str, CodecProfile)] = &[
    ("main", CodecProfile::Av1Main),
    ("high", CodecProfile::Av1High),
    ("professional", CodecProfile::Av1Professional),
];

/// Profile names accepted for an encoder, `auto` first
pub fn profile_names(encoder: EncoderKind) -> Vec<&'static str> {
    let names: Vec<&'static str> = match encoder {
        EncoderKind::H264 => AVC_PROFILES.iter().map(|(k, _)| *k).collect(),
        EncoderKind::H265 => vec!["main", "mainstillpicture"],
        EncoderKind::H265_10bit => vec!["main10"],
        EncoderKind::Av1 | EncoderKind::Av1_10bit => vec!["main"],
    };
    std::iter::once("auto").chain(names).collect()
}

/// Resolve a profile name into `config.profile`
///
/// `auto` (or no name) leaves the driver to choose, except that 10-bit HEVC
/// on G6+ defaults to Main 10 and 10-bit AV1 past G8 defaults to Main.
pub fn parse_profile(
    config: &mut EncodeConfiguration,
    profile_name: Option<&str>,
    encoder: EncoderKind,
    tier: GenerationTier,
) -> Result<(), OptionError> {
    let name = profile_name.filter(|n| !n.is_empty() && !n.eq_ignore_ascii_case("auto"));

    let Some(name) = name else {
        config.profile = match encoder {
            EncoderKind::H265_10bit if tier >= GenerationTier::G6 => Some(CodecProfile::HevcMain10),
            EncoderKind::Av1_10bit if tier > GenerationTier::G8 => Some(CodecProfile::Av1Main),
            _ => config.profile,
        };
        return Ok(());
    };

    let table = match encoder.codec() {
        Codec::Avc => AVC_PROFILES,
        Codec::Hevc => HEVC_PROFILES,
        Codec::Av1 => AV1_PROFILES,
    };
    let bad_value = || OptionError::bad_value("profile", name);
    let profile = table
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, profile)| *profile)
        .ok_or_else(bad_value)?;

    if profile == CodecProfile::HevcMain10 && tier < GenerationTier::G6 {
        info!("HEVC Main10 is not supported on this platform");
        return Err(bad_value());
    }
    if profile.codec() == Codec::Av1 && tier <= GenerationTier::G8 {
        info!("AV1 is not supported on this platform");
        return Err(bad_value());
    }

    config.profile = Some(profile);
    Ok(())
}

// =============================================================================
// Quality scale and presets
// =============================================================================

/// Quality slider range for a codec
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityLimits {
    pub low: f32,
    pub high: f32,
    pub granularity: f32,
    /// 1 when lower values mean better quality
    pub direction: i32,
}

/// Name of the quality scale: ICQ when supported, plain QP otherwise
pub fn quality_name(caps: &CapabilitySet) -> &'static str {
    if caps.contains(CapabilityFlag::RateControlIcq) {
        "ICQ"
    } else {
        "QP"
    }
}

pub fn quality_limits(caps: &CapabilitySet) -> QualityLimits {
    QualityLimits {
        low: if caps.contains(CapabilityFlag::RateControlIcq) {
            1.0
        } else {
            0.0
        },
        high: 51.0,
        granularity: 1.0,
        direction: 1,
    }
}

/// Map a user-facing preset to an encoder preset name
pub fn map_preset_name(preset: Option<&str>) -> &'static str {
    match preset {
        Some("speed") => "veryfast",
        Some("quality") => "veryslow",
        _ => "medium",
    }
}

// =============================================================================
// Async depth
// =============================================================================

pub fn default_async_depth(tier: GenerationTier) -> u16 {
    if tier >= GenerationTier::G7 {
        MODERN_ASYNC_DEPTH
    } else {
        DEFAULT_ASYNC_DEPTH
    }
}

/// Requested depth, or the generation default when not positive
pub fn clamp_async_depth(requested: i64, tier: GenerationTier) -> u16 {
    if requested <= 0 {
        default_async_depth(tier)
    } else {
        requested.min(u16::MAX as i64) as u16
    }
}

// =============================================================================
// Option strings
// =============================================================================

/// Split `key=value:key2=value2` into ordered pairs
///
/// A key without `=` gets an empty value, which options treat as `true`.
pub fn split_option_string(options: &str) -> Vec<(String, String)> {
    options
        .split(':')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (item.to_string(), String::new()),
        })
        .collect()
}

// =============================================================================
// Job setup
// =============================================================================

/// Adapter and session settings decided before encoding starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSetup {
    pub context: AdapterContext,
    pub async_depth: u16,
    pub memory_type: MemoryType,
    pub scaling_mode: ScalingMode,
}

impl JobSetup {
    /// Carry the session settings into the job before resolution
    pub fn apply_to(&self, job: &mut JobParameters) {
        job.async_depth = Some(self.async_depth);
        job.memory_type = self.memory_type;
    }
}

/// Read the session-level options (`gpu`, `async-depth`, `memory-type`,
/// `scalingmode`) of a job
///
/// Bad values are logged and the defaults kept; the same options are
/// reported again when applied to the encoder configuration.
pub fn setup_job(registry: &AdapterRegistry, job: &JobParameters) -> JobSetup {
    let requested = job.option_value("gpu").and_then(|value| {
        let index = parse_int(value).and_then(|index| u32::try_from(index).ok());
        if index.is_none() {
            warn!("Ignoring invalid gpu option {:?}", value);
        }
        index
    });
    let context = registry.context_for(requested);
    if context.explicit {
        info!("Adapter {} selected for this job", context.index);
    }

    let async_depth = match job.option_value("async-depth") {
        Some(value) => match parse_int(value) {
            Some(depth) => clamp_async_depth(depth, context.tier),
            None => {
                warn!("Ignoring invalid async-depth option {:?}", value);
                job.async_depth
                    .unwrap_or_else(|| default_async_depth(context.tier))
            }
        },
        None => job
            .async_depth
            .unwrap_or_else(|| default_async_depth(context.tier)),
    };

    let memory_type = job
        .option_value("memory-type")
        .and_then(|value| {
            value
                .parse::<MemoryType>()
                .map_err(|e| warn!("Ignoring memory-type option: {}", e))
                .ok()
        })
        .unwrap_or(job.memory_type);

    let scaling_mode = ["scalingmode", "vpp-sm"]
        .iter()
        .find_map(|key| job.option_value(key))
        .and_then(|value| {
            value
                .parse::<ScalingMode>()
                .map_err(|e| warn!("Ignoring scaling mode option: {}", e))
                .ok()
        })
        .unwrap_or_default();

    JobSetup {
        context,
        async_depth,
        memory_type,
        scaling_mode,
    }
}
