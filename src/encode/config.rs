//! Encoder configuration and job input types
//!
//! [`EncodeConfiguration`] starts from the vendor defaults, is mutated by
//! encoder options, and is finalized by the resolver. Fields that are
//! `Option` are passed through to the encoder only when set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::hardware::session::{HyperMode, MemoryType, PicStruct, RateControlMethod};
use crate::hardware::{Codec, EncoderKind};

/// Sentinel meaning "no target quality"
pub const INVALID_QUALITY: f64 = -1000.0;

/// Lookahead depth before options and memory caps are applied
pub const DEFAULT_LOOKAHEAD_DEPTH: u16 = 40;

/// Default QP offsets for I, P and B frames in CQP mode
pub const DEFAULT_CQP_OFFSETS: [i16; 3] = [0, 2, 4];

// =============================================================================
// Profiles and modes
// =============================================================================

/// Codec profile chosen for the bitstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CodecProfile {
    AvcBaseline,
    AvcMain,
    AvcExtended,
    AvcHigh,
    AvcHigh422,
    AvcConstrainedBaseline,
    AvcConstrainedHigh,
    AvcProgressiveHigh,
    HevcMain,
    HevcMain10,
    HevcMainStillPicture,
    Av1Main,
    Av1High,
    Av1Professional,
}

impl CodecProfile {
    pub fn codec(&self) -> Codec {
        match self {
            CodecProfile::HevcMain
            | CodecProfile::HevcMain10
            | CodecProfile::HevcMainStillPicture => Codec::Hevc,
            CodecProfile::Av1Main | CodecProfile::Av1High | CodecProfile::Av1Professional => {
                Codec::Av1
            }
            _ => Codec::Avc,
        }
    }

    /// Display name, e.g. `Constrained High`
    pub fn name(&self) -> &'static str {
        match self {
            CodecProfile::AvcBaseline => "Baseline",
            CodecProfile::AvcMain => "Main",
            CodecProfile::AvcExtended => "Extended",
            CodecProfile::AvcHigh => "High",
            CodecProfile::AvcHigh422 => "High 4:2:2",
            CodecProfile::AvcConstrainedBaseline => "Constrained Baseline",
            CodecProfile::AvcConstrainedHigh => "Constrained High",
            CodecProfile::AvcProgressiveHigh => "Progressive High",
            CodecProfile::HevcMain => "Main",
            CodecProfile::HevcMain10 => "Main 10",
            CodecProfile::HevcMainStillPicture => "Main Still Picture",
            CodecProfile::Av1Main => "Main",
            CodecProfile::Av1High => "High",
            CodecProfile::Av1Professional => "Professional",
        }
    }
}

impl fmt::Display for CodecProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Frame scaling mode for the video post-processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    #[default]
    Auto,
    LowPower,
    Hq,
    Compute,
    Vd,
    Ve,
}

impl ScalingMode {
    pub fn key(&self) -> &'static str {
        match self {
            ScalingMode::Auto => "auto",
            ScalingMode::LowPower => "low_power",
            ScalingMode::Hq => "hq",
            ScalingMode::Compute => "compute",
            ScalingMode::Vd => "vd",
            ScalingMode::Ve => "ve",
        }
    }
}

impl FromStr for ScalingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ScalingMode::Auto),
            "low_power" => Ok(ScalingMode::LowPower),
            "hq" => Ok(ScalingMode::Hq),
            "compute" => Ok(ScalingMode::Compute),
            "vd" => Ok(ScalingMode::Vd),
            "ve" => Ok(ScalingMode::Ve),
            other => Err(format!("unknown scaling mode: {other}")),
        }
    }
}

impl fmt::Display for ScalingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// Configuration groups
// =============================================================================

/// Rate control inputs
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateControlSettings {
    /// Prefer ICQ over CQP in quality mode
    pub icq: bool,
    pub lookahead: bool,
    pub cqp_offsets: [i16; 3],
    /// VBV maximum bitrate in kbps
    pub vbv_max_bitrate: u32,
    /// VBV buffer size in kbit
    pub vbv_buffer_size: u32,
    /// Initial fill; values up to 1.0 are a fraction of the buffer size
    pub vbv_buffer_init: f32,
}

impl Default for RateControlSettings {
    fn default() -> Self {
        Self {
            icq: true,
            lookahead: false,
            cqp_offsets: DEFAULT_CQP_OFFSETS,
            vbv_max_bitrate: 0,
            vbv_buffer_size: 0,
            vbv_buffer_init: 0.0,
        }
    }
}

/// GOP structure; negative sizes mean "pick automatically"
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GopSettings {
    pub pic_size: i32,
    pub ref_dist: i32,
    /// B-pyramid strategy (-1 auto, 0 off, 1 on)
    pub b_pyramid: Option<i8>,
    /// Disable scene-change I frames
    pub strict: bool,
    pub idr_interval: Option<u16>,
}

impl Default for GopSettings {
    fn default() -> Self {
        Self {
            pic_size: -1,
            ref_dist: -1,
            b_pyramid: None,
            strict: false,
            idr_interval: None,
        }
    }
}

/// Coding option toggles passed through to the encoder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodingOptions {
    pub lookahead_depth: u16,
    pub lookahead_downsampling: Option<u8>,
    pub mbbrc: Option<bool>,
    pub extbrc: Option<bool>,
    pub trellis: Option<i32>,
    pub repeat_pps: Option<bool>,
    pub adaptive_i: Option<bool>,
    pub adaptive_b: Option<bool>,
    pub cavlc: Option<bool>,
}

impl Default for CodingOptions {
    fn default() -> Self {
        Self {
            lookahead_depth: DEFAULT_LOOKAHEAD_DEPTH,
            lookahead_downsampling: None,
            mbbrc: None,
            extbrc: None,
            trellis: None,
            repeat_pps: None,
            adaptive_i: None,
            adaptive_b: None,
            cavlc: None,
        }
    }
}

/// Video usability information, as table indices
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VuiSettings {
    pub colour_primaries: Option<u16>,
    pub transfer: Option<u16>,
    pub matrix: Option<u16>,
}

/// AV1 screen content coding tools
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScreenContent {
    pub palette: bool,
    pub intra_block_copy: bool,
}

/// Values computed by the resolver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateControlOutput {
    pub method: Option<RateControlMethod>,
    pub target_kbps: u16,
    pub max_kbps: u16,
    pub buffer_size_kb: u16,
    pub initial_delay_kb: u16,
    /// Scale applied to every BRC value; 0 when unset
    pub brc_multiplier: u16,
    pub icq_quality: u16,
    pub qp_i: u16,
    pub qp_p: u16,
    pub qp_b: u16,
}

// =============================================================================
// EncodeConfiguration
// =============================================================================

/// Complete encoder configuration for one job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodeConfiguration {
    pub encoder: EncoderKind,
    pub profile: Option<CodecProfile>,
    pub rate: RateControlSettings,
    pub gop: GopSettings,
    pub coding: CodingOptions,
    pub vui: VuiSettings,
    pub screen_content: ScreenContent,
    pub low_power: bool,
    pub hyper_mode: HyperMode,
    pub async_depth: u16,
    pub memory_type: MemoryType,
    pub pic_struct: PicStruct,
    /// Target usage 1 (best quality) to 7 (best speed)
    pub target_usage: Option<u16>,
    pub ref_frames: Option<u16>,
    pub scaling_mode: Option<ScalingMode>,
    pub output: RateControlOutput,
}

impl EncodeConfiguration {
    /// Vendor defaults for `encoder`
    pub fn new(encoder: EncoderKind, async_depth: u16) -> Self {
        Self {
            encoder,
            profile: None,
            rate: RateControlSettings::default(),
            gop: GopSettings::default(),
            coding: CodingOptions::default(),
            vui: VuiSettings::default(),
            screen_content: ScreenContent::default(),
            low_power: false,
            hyper_mode: HyperMode::Off,
            async_depth,
            memory_type: MemoryType::System,
            pic_struct: PicStruct::Progressive,
            target_usage: None,
            ref_frames: None,
            scaling_mode: None,
            output: RateControlOutput::default(),
        }
    }

    pub fn codec(&self) -> Codec {
        self.encoder.codec()
    }
}

/// Preset name for a target usage value
pub fn target_usage_preset(target_usage: u16) -> &'static str {
    match target_usage {
        1 => "veryslow",
        2 => "slower",
        3 => "slow",
        5 => "fast",
        6 => "faster",
        7 => "veryfast",
        _ => "medium",
    }
}

/// Target usage for a preset name
pub fn preset_target_usage(preset: &str) -> Option<u16> {
    match preset {
        "veryslow" => Some(1),
        "slower" => Some(2),
        "slow" => Some(3),
        "medium" => Some(4),
        "fast" => Some(5),
        "faster" => Some(6),
        "veryfast" => Some(7),
        _ => None,
    }
}

// =============================================================================
// JobParameters
// =============================================================================

/// What the caller wants encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobParameters {
    pub encoder: EncoderKind,
    /// Target quality, or [`INVALID_QUALITY`] for bitrate mode
    pub quality: f64,
    /// Target bitrate; clipped to `i32::MAX` when resolved
    pub bitrate_kbps: u32,
    pub frame_rate_num: u32,
    pub frame_rate_den: u32,
    pub pic_struct: PicStruct,
    pub memory_type: MemoryType,
    pub profile: Option<String>,
    /// Async depth; the generation default when unset
    pub async_depth: Option<u16>,
    /// Encoder options in the order given
    pub options: Vec<(String, String)>,
}

impl Default for JobParameters {
    fn default() -> Self {
        Self {
            encoder: EncoderKind::H264,
            quality: INVALID_QUALITY,
            bitrate_kbps: 0,
            frame_rate_num: 30,
            frame_rate_den: 1,
            pic_struct: PicStruct::Progressive,
            memory_type: MemoryType::System,
            profile: None,
            async_depth: None,
            options: Vec::new(),
        }
    }
}

impl JobParameters {
    pub fn with_quality(encoder: EncoderKind, quality: f64) -> Self {
        Self {
            encoder,
            quality,
            ..Self::default()
        }
    }

    pub fn with_bitrate(encoder: EncoderKind, bitrate_kbps: u32) -> Self {
        Self {
            encoder,
            bitrate_kbps,
            ..Self::default()
        }
    }

    /// Append an encoder option
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    pub fn has_quality(&self) -> bool {
        self.quality > INVALID_QUALITY
    }

    /// Last value given for `key`, compared case-insensitively
    pub fn option_value(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}
