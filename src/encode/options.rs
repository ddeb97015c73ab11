//! Encoder option keys
//!
//! Every `key=value` option a job may carry is described by one
//! [`OptionBinding`] in a static table. A binding names the capability the
//! adapter must have, which codecs accept it, how its value parses and
//! clips, and which configuration field it sets.
//!
//! Applying an option never aborts a job: each option yields its own
//! [`OptionError`] and leaves the configuration untouched on failure.

use crate::hardware::session::{HyperMode, MemoryType, PicStruct};
use crate::hardware::{CapabilityFlag, Codec, CodecCapabilityProfile};

use super::config::{EncodeConfiguration, ScalingMode};
use super::error::OptionError;

// =============================================================================
// Value parsing
// =============================================================================

/// How an option value is parsed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueKind {
    /// `1/yes/true` or `0/no/false`
    Bool,
    /// C-style integer (decimal, `0x` hex, leading-zero octal), clipped
    Int { min: i64, max: i64 },
    /// Floating point, clipped
    Float { min: f64, max: f64 },
    /// One of a fixed set of names
    Keyword,
    /// Value is not inspected
    Ignored,
}

/// A parsed option value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Bool(bool),
    Int(i64),
    Float(f64),
    Keyword(&'a str),
    Ignored,
}

/// Rejection from a setter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidValue;

impl Value<'_> {
    fn as_bool(&self) -> Result<bool, InvalidValue> {
        match self {
            Value::Bool(v) => Ok(*v),
            _ => Err(InvalidValue),
        }
    }

    fn as_int(&self) -> Result<i64, InvalidValue> {
        match self {
            Value::Int(v) => Ok(*v),
            _ => Err(InvalidValue),
        }
    }

    fn as_float(&self) -> Result<f64, InvalidValue> {
        match self {
            Value::Float(v) => Ok(*v),
            _ => Err(InvalidValue),
        }
    }

    fn as_keyword(&self) -> Result<&str, InvalidValue> {
        match self {
            Value::Keyword(v) => Ok(v),
            _ => Err(InvalidValue),
        }
    }
}

impl ValueKind {
    fn parse<'a>(&self, value: &'a str) -> Option<Value<'a>> {
        match *self {
            ValueKind::Bool => parse_bool(value).map(Value::Bool),
            ValueKind::Int { min, max } => parse_int(value).map(|v| Value::Int(v.clamp(min, max))),
            ValueKind::Float { min, max } => {
                parse_float(value).map(|v| Value::Float(v.clamp(min, max)))
            }
            ValueKind::Keyword => Some(Value::Keyword(value)),
            ValueKind::Ignored => Some(Value::Ignored),
        }
    }
}

/// Parse a boolean the way x264-style option strings spell them
pub fn parse_bool(value: &str) -> Option<bool> {
    if ["1", "yes", "true"].iter().any(|v| value.eq_ignore_ascii_case(v)) {
        Some(true)
    } else if ["0", "no", "false"].iter().any(|v| value.eq_ignore_ascii_case(v)) {
        Some(false)
    } else {
        None
    }
}

/// Parse an integer with C `strtol(.., 0)` rules; trailing garbage is rejected
/// and out-of-range values saturate
pub fn parse_int(value: &str) -> Option<i64> {
    let trimmed = value.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let (radix, body) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };

    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    // Only overflow can fail once every digit is valid
    Some(match i64::from_str_radix(body, radix) {
        Ok(magnitude) if negative => -magnitude,
        Ok(magnitude) => magnitude,
        Err(_) if negative => i64::MIN,
        Err(_) => i64::MAX,
    })
}

pub fn parse_float(value: &str) -> Option<f64> {
    value
        .trim_start()
        .parse::<f64>()
        .ok()
        .filter(|v| !v.is_nan())
}

// =============================================================================
// VUI name tables (index = table value)
// =============================================================================

const AVC_COLOUR_PRIMARIES: &[&str] = &[
    "", "bt709", "undef", "", "bt470m", "bt470bg", "smpte170m", "smpte240m", "film", "bt2020",
];

const HEVC_COLOUR_PRIMARIES: &[&str] = &[
    "", "bt709", "undef", "", "bt470m", "bt470bg", "smpte170m", "smpte240m", "film", "bt2020",
    "smpte428", "smpte431", "smpte432",
];

const AVC_TRANSFER: &[&str] = &[
    "",
    "bt709",
    "undef",
    "",
    "bt470m",
    "bt470bg",
    "smpte170m",
    "smpte240m",
    "linear",
    "log100",
    "log316",
    "iec61966-2-4",
    "bt1361e",
    "iec61966-2-1",
    "bt2020-10",
    "bt2020-12",
];

const HEVC_TRANSFER: &[&str] = &[
    "",
    "bt709",
    "undef",
    "",
    "bt470m",
    "bt470bg",
    "smpte170m",
    "smpte240m",
    "linear",
    "log100",
    "log316",
    "iec61966-2-4",
    "bt1361e",
    "iec61966-2-1",
    "bt2020-10",
    "bt2020-12",
    "smpte2084",
    "smpte428",
    "arib-std-b67",
];

const AVC_MATRIX: &[&str] = &[
    "GBR", "bt709", "undef", "", "fcc", "bt470bg", "smpte170m", "smpte240m", "YCgCo", "bt2020nc",
    "bt2020c",
];

const HEVC_MATRIX: &[&str] = &[
    "GBR",
    "bt709",
    "undef",
    "",
    "fcc",
    "bt470bg",
    "smpte170m",
    "smpte240m",
    "YCgCo",
    "bt2020nc",
    "bt2020c",
    "smpte2085",
    "chroma-derived-nc",
    "chroma-derived-c",
    "ICtCp",
];

fn name_index(table: &[&str], name: &str) -> Result<u16, InvalidValue> {
    table
        .iter()
        .position(|entry| entry.eq_ignore_ascii_case(name))
        .map(|i| i as u16)
        .ok_or(InvalidValue)
}

fn vui_table(
    codec: Codec,
    avc: &'static [&'static str],
    hevc: &'static [&'static str],
) -> &'static [&'static str] {
    match codec {
        Codec::Hevc => hevc,
        _ => avc,
    }
}

// =============================================================================
// Bindings
// =============================================================================

type SetResult = Result<(), InvalidValue>;

type Setter = fn(&mut EncodeConfiguration, Codec, Value<'_>) -> SetResult;

const ANY_CODEC: &[Codec] = &[];
const AVC_ONLY: &[Codec] = &[Codec::Avc];
const AVC_HEVC: &[Codec] = &[Codec::Avc, Codec::Hevc];
const AV1_ONLY: &[Codec] = &[Codec::Av1];

const I16_RANGE: ValueKind = ValueKind::Int {
    min: i16::MIN as i64,
    max: i16::MAX as i64,
};
const NON_NEGATIVE_I32: ValueKind = ValueKind::Int {
    min: 0,
    max: i32::MAX as i64,
};

/// One recognized option key
pub struct OptionBinding {
    pub key: &'static str,
    pub aliases: &'static [&'static str],
    /// Capability the adapter must report
    pub requires: Option<CapabilityFlag>,
    /// Codecs accepting the option; empty means all
    pub codecs: &'static [Codec],
    pub kind: ValueKind,
    set: Setter,
}

impl OptionBinding {
    pub fn matches(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(key))
    }

    pub fn accepts_codec(&self, codec: Codec) -> bool {
        self.codecs.is_empty() || self.codecs.contains(&codec)
    }
}

impl std::fmt::Debug for OptionBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionBinding")
            .field("key", &self.key)
            .field("aliases", &self.aliases)
            .field("requires", &self.requires)
            .field("codecs", &self.codecs)
            .field("kind", &self.kind)
            .finish()
    }
}

static BINDINGS: &[OptionBinding] = &[
    OptionBinding {
        key: "target-usage",
        aliases: &["tu"],
        requires: None,
        codecs: ANY_CODEC,
        kind: ValueKind::Int { min: 1, max: 7 },
        set: set_target_usage,
    },
    OptionBinding {
        key: "num-ref-frame",
        aliases: &["ref"],
        requires: None,
        codecs: ANY_CODEC,
        kind: ValueKind::Int { min: 0, max: 16 },
        set: set_ref_frames,
    },
    OptionBinding {
        key: "gop-ref-dist",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: ValueKind::Int { min: -1, max: 32 },
        set: set_gop_ref_dist,
    },
    OptionBinding {
        key: "gop-pic-size",
        aliases: &["keyint"],
        requires: None,
        codecs: ANY_CODEC,
        kind: ValueKind::Int {
            min: -1,
            max: u16::MAX as i64,
        },
        set: set_gop_pic_size,
    },
    OptionBinding {
        key: "b-pyramid",
        aliases: &[],
        requires: Some(CapabilityFlag::BRefPyramid),
        codecs: ANY_CODEC,
        kind: ValueKind::Int { min: -1, max: 1 },
        set: set_b_pyramid,
    },
    OptionBinding {
        key: "scenecut",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: ValueKind::Bool,
        set: set_scenecut,
    },
    OptionBinding {
        key: "adaptive-i",
        aliases: &["i-adapt"],
        requires: Some(CapabilityFlag::AdaptiveIB),
        codecs: ANY_CODEC,
        kind: ValueKind::Bool,
        set: set_adaptive_i,
    },
    OptionBinding {
        key: "adaptive-b",
        aliases: &["b-adapt"],
        requires: Some(CapabilityFlag::AdaptiveIB),
        codecs: ANY_CODEC,
        kind: ValueKind::Bool,
        set: set_adaptive_b,
    },
    OptionBinding {
        key: "force-cqp",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: ValueKind::Bool,
        set: set_force_cqp,
    },
    OptionBinding {
        key: "cqp-offset-i",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: I16_RANGE,
        set: set_cqp_offset_i,
    },
    OptionBinding {
        key: "cqp-offset-p",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: I16_RANGE,
        set: set_cqp_offset_p,
    },
    OptionBinding {
        key: "cqp-offset-b",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: I16_RANGE,
        set: set_cqp_offset_b,
    },
    OptionBinding {
        key: "vbv-init",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: ValueKind::Float {
            min: 0.0,
            max: i32::MAX as f64,
        },
        set: set_vbv_init,
    },
    OptionBinding {
        key: "vbv-bufsize",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: NON_NEGATIVE_I32,
        set: set_vbv_bufsize,
    },
    OptionBinding {
        key: "vbv-maxrate",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: NON_NEGATIVE_I32,
        set: set_vbv_maxrate,
    },
    OptionBinding {
        key: "cavlc",
        aliases: &[],
        requires: Some(CapabilityFlag::CodingOption1),
        codecs: AVC_ONLY,
        kind: ValueKind::Bool,
        set: set_cavlc,
    },
    OptionBinding {
        key: "cabac",
        aliases: &[],
        requires: Some(CapabilityFlag::CodingOption1),
        codecs: AVC_ONLY,
        kind: ValueKind::Bool,
        set: set_cabac,
    },
    OptionBinding {
        key: "colorprim",
        aliases: &[],
        requires: Some(CapabilityFlag::VuiSignalInfo),
        codecs: AVC_HEVC,
        kind: ValueKind::Keyword,
        set: set_colour_primaries,
    },
    OptionBinding {
        key: "transfer",
        aliases: &[],
        requires: Some(CapabilityFlag::VuiSignalInfo),
        codecs: AVC_HEVC,
        kind: ValueKind::Keyword,
        set: set_transfer,
    },
    OptionBinding {
        key: "colormatrix",
        aliases: &[],
        requires: Some(CapabilityFlag::VuiSignalInfo),
        codecs: AVC_HEVC,
        kind: ValueKind::Keyword,
        set: set_matrix,
    },
    OptionBinding {
        key: "tff",
        aliases: &["interlaced"],
        requires: None,
        codecs: AVC_ONLY,
        kind: ValueKind::Bool,
        set: set_tff,
    },
    OptionBinding {
        key: "bff",
        aliases: &[],
        requires: None,
        codecs: AVC_ONLY,
        kind: ValueKind::Bool,
        set: set_bff,
    },
    OptionBinding {
        key: "mbbrc",
        aliases: &[],
        requires: Some(CapabilityFlag::Mbbrc),
        codecs: ANY_CODEC,
        kind: ValueKind::Bool,
        set: set_mbbrc,
    },
    OptionBinding {
        key: "extbrc",
        aliases: &[],
        requires: Some(CapabilityFlag::ExtBrc),
        codecs: ANY_CODEC,
        kind: ValueKind::Bool,
        set: set_extbrc,
    },
    OptionBinding {
        key: "lookahead",
        aliases: &["la"],
        requires: Some(CapabilityFlag::RateControlLa),
        codecs: ANY_CODEC,
        kind: ValueKind::Bool,
        set: set_lookahead,
    },
    OptionBinding {
        key: "lookahead-depth",
        aliases: &["la-depth"],
        requires: Some(CapabilityFlag::RateControlLa),
        codecs: ANY_CODEC,
        kind: ValueKind::Int { min: 10, max: 100 },
        set: set_lookahead_depth,
    },
    OptionBinding {
        key: "lookahead-ds",
        aliases: &["la-ds"],
        requires: Some(CapabilityFlag::LookaheadDownsampling),
        codecs: ANY_CODEC,
        kind: ValueKind::Int { min: 0, max: 3 },
        set: set_lookahead_ds,
    },
    OptionBinding {
        key: "trellis",
        aliases: &[],
        requires: Some(CapabilityFlag::Trellis),
        codecs: ANY_CODEC,
        kind: ValueKind::Int {
            min: i32::MIN as i64,
            max: i32::MAX as i64,
        },
        set: set_trellis,
    },
    OptionBinding {
        key: "repeatpps",
        aliases: &[],
        requires: Some(CapabilityFlag::RepeatPps),
        codecs: ANY_CODEC,
        kind: ValueKind::Bool,
        set: set_repeat_pps,
    },
    OptionBinding {
        key: "lowpower",
        aliases: &[],
        requires: Some(CapabilityFlag::LowPower),
        codecs: ANY_CODEC,
        kind: ValueKind::Bool,
        set: set_low_power,
    },
    OptionBinding {
        key: "gpu",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: ValueKind::Ignored,
        set: set_nothing,
    },
    OptionBinding {
        key: "memory-type",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: ValueKind::Keyword,
        set: set_memory_type,
    },
    OptionBinding {
        key: "scalingmode",
        aliases: &["vpp-sm"],
        requires: Some(CapabilityFlag::VppScaling),
        codecs: ANY_CODEC,
        kind: ValueKind::Keyword,
        set: set_scaling_mode,
    },
    OptionBinding {
        key: "hyperencode",
        aliases: &[],
        requires: Some(CapabilityFlag::HyperEncode),
        codecs: ANY_CODEC,
        kind: ValueKind::Keyword,
        set: set_hyper_mode,
    },
    OptionBinding {
        key: "palette",
        aliases: &[],
        requires: Some(CapabilityFlag::Av1ScreenContent),
        codecs: AV1_ONLY,
        kind: ValueKind::Bool,
        set: set_palette,
    },
    OptionBinding {
        key: "intrabc",
        aliases: &[],
        requires: Some(CapabilityFlag::Av1ScreenContent),
        codecs: AV1_ONLY,
        kind: ValueKind::Bool,
        set: set_intrabc,
    },
    OptionBinding {
        key: "async-depth",
        aliases: &[],
        requires: None,
        codecs: ANY_CODEC,
        kind: ValueKind::Int {
            min: 0,
            max: u16::MAX as i64,
        },
        set: set_async_depth,
    },
];

// =============================================================================
// Setters
// =============================================================================

fn set_target_usage(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.target_usage = Some(v.as_int()? as u16);
    Ok(())
}

fn set_ref_frames(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.ref_frames = Some(v.as_int()? as u16);
    Ok(())
}

fn set_gop_ref_dist(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.gop.ref_dist = v.as_int()? as i32;
    Ok(())
}

fn set_gop_pic_size(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.gop.pic_size = v.as_int()? as i32;
    Ok(())
}

fn set_b_pyramid(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.gop.b_pyramid = Some(v.as_int()? as i8);
    Ok(())
}

fn set_scenecut(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.gop.strict = !v.as_bool()?;
    Ok(())
}

fn set_adaptive_i(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.coding.adaptive_i = Some(v.as_bool()?);
    Ok(())
}

fn set_adaptive_b(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.coding.adaptive_b = Some(v.as_bool()?);
    Ok(())
}

fn set_force_cqp(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.rate.icq = !v.as_bool()?;
    Ok(())
}

fn set_cqp_offset_i(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.rate.cqp_offsets[0] = v.as_int()? as i16;
    Ok(())
}

fn set_cqp_offset_p(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.rate.cqp_offsets[1] = v.as_int()? as i16;
    Ok(())
}

fn set_cqp_offset_b(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.rate.cqp_offsets[2] = v.as_int()? as i16;
    Ok(())
}

fn set_vbv_init(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.rate.vbv_buffer_init = v.as_float()? as f32;
    Ok(())
}

fn set_vbv_bufsize(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.rate.vbv_buffer_size = v.as_int()? as u32;
    Ok(())
}

fn set_vbv_maxrate(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.rate.vbv_max_bitrate = v.as_int()? as u32;
    Ok(())
}

fn set_cavlc(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.coding.cavlc = Some(v.as_bool()?);
    Ok(())
}

fn set_cabac(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.coding.cavlc = Some(!v.as_bool()?);
    Ok(())
}

fn set_colour_primaries(c: &mut EncodeConfiguration, codec: Codec, v: Value<'_>) -> SetResult {
    let table = vui_table(codec, AVC_COLOUR_PRIMARIES, HEVC_COLOUR_PRIMARIES);
    c.vui.colour_primaries = Some(name_index(table, v.as_keyword()?)?);
    Ok(())
}

fn set_transfer(c: &mut EncodeConfiguration, codec: Codec, v: Value<'_>) -> SetResult {
    let table = vui_table(codec, AVC_TRANSFER, HEVC_TRANSFER);
    c.vui.transfer = Some(name_index(table, v.as_keyword()?)?);
    Ok(())
}

fn set_matrix(c: &mut EncodeConfiguration, codec: Codec, v: Value<'_>) -> SetResult {
    let table = vui_table(codec, AVC_MATRIX, HEVC_MATRIX);
    c.vui.matrix = Some(name_index(table, v.as_keyword()?)?);
    Ok(())
}

fn set_tff(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.pic_struct = if v.as_bool()? {
        PicStruct::FieldTff
    } else {
        PicStruct::Progressive
    };
    Ok(())
}

fn set_bff(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.pic_struct = if v.as_bool()? {
        PicStruct::FieldBff
    } else {
        PicStruct::Progressive
    };
    Ok(())
}

fn set_mbbrc(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.coding.mbbrc = Some(v.as_bool()?);
    Ok(())
}

fn set_extbrc(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.coding.extbrc = Some(v.as_bool()?);
    Ok(())
}

fn set_lookahead(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.rate.lookahead = v.as_bool()?;
    Ok(())
}

fn set_lookahead_depth(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.coding.lookahead_depth = v.as_int()? as u16;
    Ok(())
}

fn set_lookahead_ds(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.coding.lookahead_downsampling = Some(v.as_int()? as u8);
    Ok(())
}

fn set_trellis(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.coding.trellis = Some(v.as_int()? as i32);
    Ok(())
}

fn set_repeat_pps(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.coding.repeat_pps = Some(v.as_bool()?);
    Ok(())
}

fn set_low_power(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.low_power = v.as_bool()?;
    Ok(())
}

/// `gpu` is consumed by job setup before options reach the encoder
fn set_nothing(_: &mut EncodeConfiguration, _: Codec, _: Value<'_>) -> SetResult {
    Ok(())
}

fn set_memory_type(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.memory_type = v.as_keyword()?.parse::<MemoryType>().map_err(|_| InvalidValue)?;
    Ok(())
}

fn set_scaling_mode(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.scaling_mode = Some(v.as_keyword()?.parse::<ScalingMode>().map_err(|_| InvalidValue)?);
    Ok(())
}

fn set_hyper_mode(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.hyper_mode = HyperMode::from_key(v.as_keyword()?).ok_or(InvalidValue)?;
    Ok(())
}

fn set_palette(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.screen_content.palette = v.as_bool()?;
    Ok(())
}

fn set_intrabc(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.screen_content.intra_block_copy = v.as_bool()?;
    Ok(())
}

fn set_async_depth(c: &mut EncodeConfiguration, _: Codec, v: Value<'_>) -> SetResult {
    c.async_depth = v.as_int()? as u16;
    Ok(())
}

// =============================================================================
// OptionKeyRegistry
// =============================================================================

/// Lookup and application of encoder options
pub struct OptionKeyRegistry;

impl OptionKeyRegistry {
    pub fn bindings() -> &'static [OptionBinding] {
        BINDINGS
    }

    /// Find the binding for a key or alias, ignoring case
    pub fn lookup(key: &str) -> Option<&'static OptionBinding> {
        BINDINGS.iter().find(|binding| binding.matches(key))
    }

    /// Apply one `key=value` option to `config`
    ///
    /// An empty value means `true` and a leading `=` is dropped. A `no-`
    /// prefix inverts a boolean value. The configuration is only modified
    /// when `Ok(())` is returned.
    pub fn apply(
        config: &mut EncodeConfiguration,
        profile: &CodecCapabilityProfile,
        key: &str,
        value: &str,
    ) -> Result<(), OptionError> {
        let value = match value {
            "" => "true",
            v => v.strip_prefix('=').unwrap_or(v),
        };
        if key.is_empty() {
            return Err(OptionError::BadName { key: String::new() });
        }

        let (name, value) = match strip_negation(key) {
            Some(rest) => {
                let inverted = parse_bool(value).ok_or_else(|| OptionError::bad_value(key, value))?;
                (rest, if inverted { "false" } else { "true" })
            }
            None => (key, value),
        };

        let binding = Self::lookup(name).ok_or_else(|| OptionError::BadName {
            key: key.to_string(),
        })?;

        if let Some(flag) = binding.requires {
            if !profile.has(flag) {
                return Err(OptionError::unsupported(key));
            }
        }
        let codec = profile.codec();
        if !binding.accepts_codec(codec) {
            return Err(OptionError::unsupported(key));
        }

        let parsed = binding
            .kind
            .parse(value)
            .ok_or_else(|| OptionError::bad_value(key, value))?;

        // Setters validate before assigning
        (binding.set)(config, codec, parsed).map_err(|_| OptionError::bad_value(key, value))
    }
}

fn strip_negation(key: &str) -> Option<&str> {
    match key.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("no-") => Some(&key[3..]),
        _ => None,
    }
}
